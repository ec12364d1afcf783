//! Text normalization shared by extractors, scorers and in-process stores.

/// Function words that carry no retrieval signal.
const STOPWORDS: &[&str] = &[
    "a", "about", "again", "am", "an", "and", "any", "are", "as", "at", "be", "been", "before",
    "but", "by", "can", "could", "did", "didn't", "do", "does", "for", "from", "had", "has",
    "have", "how", "i", "i'm", "i've", "if", "in", "is", "it", "it's", "know", "me", "mentioned",
    "my", "of", "on", "or", "our", "recall", "remember", "said", "say", "so", "tell", "that",
    "the", "their", "them", "there", "this", "to", "told", "us", "was", "we", "were", "what",
    "when", "where", "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Split text into lower-cased word tokens. Apostrophes inside words are
/// kept ("didn't"); every other non-alphanumeric character separates words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Tokens with stopwords removed, deduplicated, first occurrence order.
pub fn content_terms(text: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(text) {
        if !is_stopword(&token) && !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Fraction of `terms` that occur as whole words in `text` (0.0 when
/// `terms` is empty).
pub fn term_coverage(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let words = tokenize(text);
    let hits = terms.iter().filter(|t| words.contains(t)).count();
    hits as f32 / terms.len() as f32
}
