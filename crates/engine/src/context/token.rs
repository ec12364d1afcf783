//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. Good enough
//! to keep a rendered memory context under a model's prompt allowance.

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 bytes. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Character length as the budget counts it (Unicode scalar values, not
/// bytes), so "★" costs one.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Cut `text` to at most `max_chars` characters, ending with "…" when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if char_len(text) <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}
