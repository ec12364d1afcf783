//! `recollect facts`: List or rank an owner's facts.

use crate::commands::store;
use recollect_core::message::OwnerId;
use recollect_engine::MemoryContextAssembler;
use std::path::PathBuf;

pub async fn run(
    db: Option<PathBuf>,
    owner: &str,
    query: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, stores) = store::open(db).await?;
    let owner = OwnerId::from(owner);

    let Some(query) = query else {
        let facts = stores.facts.list(&owner).await?;
        println!("🧠 {} facts for {owner}", facts.len());
        for fact in facts.iter().take(limit) {
            println!(
                "  {:<12} {}  ({})",
                fact.category.label(),
                fact.value,
                fact.created_at.format("%Y-%m-%d")
            );
        }
        return Ok(());
    };

    let assembler =
        MemoryContextAssembler::new(stores.facts, stores.messages, stores.topics, &config);
    let ranked = assembler.search_facts(&owner, query, limit).await?;
    println!("🔍 Facts for \"{query}\"");
    if ranked.is_empty() {
        println!("   No relevant facts.");
    }
    for (i, scored) in ranked.iter().enumerate() {
        println!(
            "  {:>2}. [{:>3}%] {}: {}",
            i + 1,
            scored.confidence,
            scored.fact.category.label(),
            scored.fact.value
        );
    }
    Ok(())
}
