//! `recollect classify`: Show how a query is analyzed.

use recollect_engine::analyze_query;

pub fn run(query: &str, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let analysis = analyze_query(query, 3);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("  Memory query: {}", if analysis.is_memory_query { "yes" } else { "no" });
    if let Some(kind) = analysis.kind {
        println!("  Kind:         {kind}");
    }
    if analysis.topics.is_empty() {
        println!("  Topics:       (none)");
    } else {
        println!("  Topics:       {}", analysis.topics.join(", "));
    }
    Ok(())
}
