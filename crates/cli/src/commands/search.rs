//! `recollect search`: Full-text search over stored messages.

use crate::commands::store;
use recollect_core::message::OwnerId;
use std::path::PathBuf;

pub async fn run(
    db: Option<PathBuf>,
    owner: &str,
    query: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_config, stores) = store::open(db).await?;
    let results = stores
        .messages
        .search(&OwnerId::from(owner), query, limit)
        .await?;

    println!("🔍 Searching messages for: \"{query}\"");
    println!();
    if results.is_empty() {
        println!("   No messages found.");
    }
    for (i, (message, score)) in results.iter().enumerate() {
        let preview: String = message.content.chars().take(80).collect();
        println!(
            "  {:>2}. [score: {score:.2}] {} {}: {preview}",
            i + 1,
            message.timestamp.format("%Y-%m-%d %H:%M"),
            message.role.as_str()
        );
    }
    Ok(())
}
