//! `recollect topics`: Topic extraction and usage.

use crate::commands::store;
use recollect_core::message::OwnerId;
use recollect_engine::TopicExtractor;
use std::path::PathBuf;

pub fn extract(text: &str, top_n: usize) {
    let hits = TopicExtractor::extract_scored(text);
    if hits.is_empty() {
        println!("No topics found.");
        return;
    }
    for hit in hits.iter().take(top_n) {
        println!("  {:<14} {:.1}", hit.topic, hit.score);
    }
}

pub async fn usage(db: Option<PathBuf>, owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, stores) = store::open(db).await?;
    let owner = OwnerId::from(owner);
    let mut usage = stores.topics.usage(&owner).await?;
    usage.sort_by(|a, b| b.message_count.cmp(&a.message_count));

    println!("🏷️  Topics for {owner}");
    if usage.is_empty() {
        println!("   None yet.");
    }
    for u in &usage {
        println!(
            "  {:<14} {:>4} messages, last {}",
            u.topic.name,
            u.message_count,
            u.last_mentioned.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
