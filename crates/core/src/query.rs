//! Memory-query vocabulary shared by the engine and its callers.

use serde::{Deserialize, Serialize};

/// The subtype of a memory-referential query.
///
/// Variants are listed in resolution precedence: when a query matches the
/// patterns of several subtypes, the earliest variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryQueryKind {
    /// "What do you know about my …"
    KnowledgeQuery,
    /// "Have we ever discussed …"
    ExistenceVerification,
    /// Explicit time or recency framing: "last time …", "when did I …"
    TemporalRecall,
    /// Yes/no-framed recollection checks: "Do you remember …"
    RecallVerification,
    /// Catch-all default
    ContentRecall,
}

impl MemoryQueryKind {
    /// All subtypes, in precedence order.
    pub const PRECEDENCE: [MemoryQueryKind; 5] = [
        Self::KnowledgeQuery,
        Self::ExistenceVerification,
        Self::TemporalRecall,
        Self::RecallVerification,
        Self::ContentRecall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KnowledgeQuery => "knowledge_query",
            Self::ExistenceVerification => "existence_verification",
            Self::TemporalRecall => "temporal_recall",
            Self::RecallVerification => "recall_verification",
            Self::ContentRecall => "content_recall",
        }
    }
}

impl std::fmt::Display for MemoryQueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ephemeral Query object: lives for one context-assembly call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    /// Raw query text
    pub text: String,

    pub is_memory_query: bool,

    /// Present iff `is_memory_query`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MemoryQueryKind>,

    /// Topic categories extracted from the query, best first
    #[serde(default)]
    pub topics: Vec<String>,
}
