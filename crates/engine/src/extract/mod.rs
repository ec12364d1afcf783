//! Extraction from message text: typed facts and topic categories.

pub mod facts;
pub mod topics;

pub use facts::{FactExtractor, FACT_RULES};
pub use topics::{TopicExtractor, TopicHit, FALLBACK_CATALOG, TOPIC_CATALOG};
