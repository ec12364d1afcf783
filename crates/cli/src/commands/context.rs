//! `recollect context`: Assemble and render memory for a query.

use crate::commands::store;
use recollect_core::message::OwnerId;
use recollect_engine::{ContextBudget, MemoryContextAssembler, format_memory_context};
use std::path::PathBuf;

pub async fn run(
    db: Option<PathBuf>,
    owner: &str,
    query: &str,
    max_chars: Option<usize>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (config, stores) = store::open(db).await?;
    let assembler =
        MemoryContextAssembler::new(stores.facts, stores.messages, stores.topics, &config);

    let context = assembler.assemble(&OwnerId::from(owner), query).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&context)?);
        return Ok(());
    }

    let mut budget = ContextBudget::from_config(&config.context);
    if let Some(max_chars) = max_chars {
        budget.max_chars = max_chars;
    }
    for failure in &context.degraded {
        eprintln!("⚠️  {} tier unavailable: {}", failure.tier, failure.reason);
    }

    let rendered = format_memory_context(&context, &budget);
    if rendered.is_empty() {
        println!("(no memory context)");
    } else {
        println!("{rendered}");
    }
    Ok(())
}
