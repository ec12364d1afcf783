//! The Recollect memory engine.
//!
//! Turns a stream of conversation messages into three tiers of memory and
//! assembles them into a bounded prompt context on demand:
//!
//! 1. **Ingest**: store the message, extract typed facts, tag topics
//!    ([`MemoryIngestor`])
//! 2. **Analyze** the query: memory-query detection, subtype, topics
//!    ([`analyze_query`])
//! 3. **Assemble**: concurrent per-tier retrieval and scoring
//!    ([`MemoryContextAssembler::assemble`])
//! 4. **Format**: subtype-specific layout within a size budget
//!    ([`format_memory_context`])
//!
//! Nothing here talks to a database directly; storage comes in through the
//! traits in `recollect-core`.

pub mod context;
pub mod extract;
pub mod ingest;
pub mod query;
pub mod scoring;
pub mod tagger;

pub use context::{
    ContextBudget, MemoryContext, MemoryContextAssembler, Tier, TierFailure, TopicMemory,
    format_memory_context,
};
pub use extract::{FactExtractor, TopicExtractor, TopicHit};
pub use ingest::{IngestReport, MemoryIngestor};
pub use query::{analyze_query, classify_memory_query, is_memory_query};
pub use scoring::{ScoredFact, ScoredMessage, ScoredTopic, ScoringContext};
pub use tagger::TopicTagger;

/// Topic categories mentioned in a query, best first.
pub fn extract_topics_from_query(text: &str, top_n: usize) -> Vec<String> {
    TopicExtractor::extract_topics_from_query(text, top_n)
}
