//! `recollect ingest`: Store a message and derive memory from it.

use crate::commands::store;
use recollect_core::message::{ConversationId, Message, OwnerId};
use recollect_engine::MemoryIngestor;
use std::path::PathBuf;

pub async fn run(
    db: Option<PathBuf>,
    owner: &str,
    conversation: &str,
    assistant: bool,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, stores) = store::open(db).await?;
    let ingestor = MemoryIngestor::new(stores.messages, stores.facts, stores.topics, &config);

    let owner = OwnerId::from(owner);
    let conversation = ConversationId::from(conversation);
    let message = if assistant {
        Message::assistant(owner, conversation, text)
    } else {
        Message::user(owner, conversation, text)
    };

    let report = ingestor.ingest(message).await?;

    println!("📥 Stored message {}", report.message.id);
    if report.facts.is_empty() {
        println!("   No new facts");
    } else {
        for fact in &report.facts {
            println!("   + {}: {}", fact.category.label(), fact.value);
        }
    }
    if !report.topics.is_empty() {
        let names: Vec<&str> = report.topics.iter().map(|t| t.name.as_str()).collect();
        println!("   Topics: {}", names.join(", "));
    }
    Ok(())
}
