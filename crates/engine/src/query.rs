//! Memory-query detection and classification.
//!
//! Detection decides whether a query refers to previously shared
//! information. Classification resolves a detected query to exactly one
//! [`MemoryQueryKind`] using a fixed precedence:
//!
//! | # | Kind | Triggers |
//! |---|------|----------|
//! | 1 | `knowledge_query` | "what do/did you know about", "tell me what you know about" |
//! | 2 | `existence_verification` | "have we/I (ever) talked/discussed/mentioned/spoken", a sentence opening "did we/I (ever) talk/discuss/mention", "have I told you" |
//! | 3 | `temporal_recall` | "when did", "last time/week/month", "previously", "earlier", "the other day", "yesterday", "before", "ago" |
//! | 4 | `recall_verification` | "do/can you remember/recall", "didn't I", a sentence opening "did I tell you", "am I right/correct" |
//! | 5 | `content_recall` | anything else that was detected |
//!
//! A query matching several rows takes the first one. This order is part of
//! the public contract.

use crate::extract::TopicExtractor;
use recollect_core::query::{MemoryQueryKind, QueryAnalysis};
use recollect_core::text::tokenize;
use regex_lite::Regex;
use std::sync::LazyLock;
use tracing::debug;

const DETECTION_PATTERNS: &[&str] = &[
    r"(?i)\bdo\s+you\s+remember\s+(?:when|what|how|where|why|who|if|that|about|our|my|the)\b",
    r"(?i)\bwhat\s+did\s+(?:i|we|you)\s+(?:say|tell|ask|talk|mention)\s+(?:about|regarding|concerning)\b",
    r"(?i)\b(?:what|when)\s+did\s+(?:i|we)\s+(?:discuss|talk\s+about|mention|say)\b",
    r"(?i)\bhave\s+(?:i|we)\s+(?:ever\s+)?(?:talked|spoken|discussed|mentioned)\s+(?:about|regarding)\b",
    r"(?i)\b(?:tell|remind)\s+me\s+(?:about|what|when|how|where|why)\s+(?:i|we|you)\s+(?:said|mentioned|talked\s+about)\b",
    r"(?i)\b(?:recall|remember|recollect)\s+(?:our|the|that|when|what|how|where|why|who)\b",
    r"(?i)\b(?:bring\s+up|reference)\s+(?:what|when|how|where|why|who|that|our|the)\b",
    r"(?i)\bwhat\s+(?:did|do)\s+you\s+know\s+about\s+my\b",
    r"(?i)\bwhat\s+(?:have|did)\s+(?:i|we)\s+(?:say|tell\s+you|mention)\s+about\s+(?:my|our|the)\b",
    r"(?i)\b(?:last\s+time|previously|earlier|before)\s+(?:we|you|i)\s+(?:talked|spoke|discussed|mentioned|said)\b",
    r"(?i)\b(?:in|during)\s+(?:our|a)\s+(?:previous|past|last|earlier|recent)\s+(?:conversation|discussion|chat)\b",
    r"(?i)\b(?:didn't|did)\s+(?:i|we)\s+(?:talk|speak|discuss|mention|tell\s+you)\s+(?:about|that|how|when|where|why)\b",
    r"(?i)\bam\s+i\s+(?:right|correct)\s+(?:that|when\s+i\s+say)\s+(?:you|we|i)\b",
    r"(?i)\bwhat\s+do\s+you\s+know\s+about\s+(?:my|our|the)\b",
    r"(?i)\btell\s+me\s+what\s+you\s+know\s+about\s+(?:my|our|the)\b",
];

/// Single words that mark a memory reference on their own.
const MEMORY_KEYWORDS: &[&str] = &[
    "remember", "recall", "forget", "memory", "mentioned", "told", "said", "discussed",
    "conversation",
];

/// Multi-word markers, matched on contiguous tokens.
const MEMORY_PHRASES: &[&[&str]] = &[&["talked", "about"]];

/// Classifier patterns per subtype. `ContentRecall` has none: it is what a
/// detected query falls back to.
///
/// "did I/we ..." only counts as yes/no framing at the start of a sentence;
/// after a wh-word ("What did I tell you ...") it asks for content.
fn kind_patterns(kind: MemoryQueryKind) -> &'static [&'static str] {
    match kind {
        MemoryQueryKind::KnowledgeQuery => &[
            r"(?i)\bwhat\s+(?:do|did)\s+you\s+know\s+about\b",
            r"(?i)\btell\s+me\s+what\s+you\s+know\s+about\b",
        ],
        MemoryQueryKind::ExistenceVerification => &[
            r"(?i)\b(?:have|has)\s+(?:we|i)\s+(?:ever\s+|already\s+|previously\s+)?(?:talked|discussed|mentioned|spoken)\b",
            r"(?i)(?:^|[.!?;]\s*)did\s+(?:we|i)\s+(?:ever\s+|already\s+|previously\s+)?(?:talk|discuss|mention|speak)\b",
            r"(?i)\bhave\s+i\s+(?:ever\s+)?told\s+you\b",
        ],
        MemoryQueryKind::TemporalRecall => &[
            r"(?i)\bwhen\s+did\b",
            r"(?i)\blast\s+(?:time|week|month|year|night)\b",
            r"(?i)\b(?:previously|earlier|yesterday|before|ago)\b",
            r"(?i)\bthe\s+other\s+day\b",
        ],
        MemoryQueryKind::RecallVerification => &[
            r"(?i)\b(?:do|can|could)\s+you\s+(?:still\s+)?(?:remember|recall)\b",
            r"(?i)\bdidn't\s+(?:i|we)\b",
            r"(?i)(?:^|[.!?;]\s*)did\s+i\s+(?:ever\s+)?tell\s+you\b",
            r"(?i)\bam\s+i\s+(?:right|correct)\b",
        ],
        MemoryQueryKind::ContentRecall => &[],
    }
}

static DETECTORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    DETECTION_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("static detection pattern must compile"))
        .collect()
});

/// Compiled in [`MemoryQueryKind::PRECEDENCE`] order, so the first kind
/// that matches is the one that wins.
static CLASSIFIERS: LazyLock<Vec<(MemoryQueryKind, Vec<Regex>)>> = LazyLock::new(|| {
    MemoryQueryKind::PRECEDENCE
        .iter()
        .map(|kind| {
            let compiled = kind_patterns(*kind)
                .iter()
                .map(|p| Regex::new(p).expect("static classifier pattern must compile"))
                .collect();
            (*kind, compiled)
        })
        .collect()
});

/// Typographic apostrophes would otherwise defeat "didn't" patterns.
fn normalize(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

/// Whether `text` refers to previously shared information.
pub fn is_memory_query(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let text = normalize(text);
    if DETECTORS.iter().any(|re| re.is_match(&text)) {
        return true;
    }

    let tokens = tokenize(&text);
    tokens.iter().any(|t| MEMORY_KEYWORDS.contains(&t.as_str()))
        || MEMORY_PHRASES.iter().any(|phrase| {
            tokens
                .windows(phrase.len())
                .any(|w| w.iter().zip(phrase.iter()).all(|(t, p)| t == p))
        })
}

/// The subtype of a memory query, or `None` when `text` is not one.
pub fn classify_memory_query(text: &str) -> Option<MemoryQueryKind> {
    if !is_memory_query(text) {
        return None;
    }
    let text = normalize(text);

    let matched: Vec<MemoryQueryKind> = CLASSIFIERS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|re| re.is_match(&text)))
        .map(|(kind, _)| *kind)
        .collect();

    if matched.len() > 1 {
        debug!(?matched, chosen = %matched[0], "Ambiguous memory query resolved by precedence");
    }
    Some(matched.first().copied().unwrap_or(MemoryQueryKind::ContentRecall))
}

/// Detection, classification and topic extraction in one pass.
pub fn analyze_query(text: &str, top_n: usize) -> QueryAnalysis {
    let kind = classify_memory_query(text);
    QueryAnalysis {
        text: text.to_string(),
        is_memory_query: kind.is_some(),
        kind,
        topics: TopicExtractor::extract_topics_from_query(text, top_n),
    }
}
