//! Rule-based fact extraction (Tier 1 write path).
//!
//! Each category owns a static list of patterns. A pattern's numbered
//! capture groups are candidate values; an optional `rel` group names the
//! relation ("wife", "dog", "favorite food") and is kept next to the value
//! so that "Sarah is my wife" and "Sarah is my sister" stay distinct facts.

use recollect_core::error::StoreError;
use recollect_core::fact::{normalize_value, Fact, FactCategory};
use recollect_core::message::OwnerId;
use recollect_core::store::FactStore;
use recollect_core::text::content_terms;
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Values longer than this are almost always a runaway capture.
const MAX_VALUE_CHARS: usize = 80;

/// Phrases that end the clause a capture belongs to.
const CLAUSE_BREAKS: &[&str] = &[
    " but ", " because ", " so ", " and i ", " and i'm ", " and my ", " where ", " which ",
    " who ", " though ",
];

/// Separators between atomic values inside one capture.
const VALUE_SEPARATORS: &[&str] = &[" and ", " & "];

/// Leading words stripped from a value ("to cook" → "cook").
const LEADING_FILLER: &[&str] = &["to ", "at "];

const FAMILY_RELATIONS: &str =
    "wife|husband|partner|son|daughter|brother|sister|mom|dad|mother|father";
const PET_KINDS: &str = "dog|cat|pet|puppy|kitten";

/// Category → pattern table. `{fam}` and `{pet}` expand to the relation
/// alternations above.
pub const FACT_RULES: &[(FactCategory, &[&str])] = &[
    (
        FactCategory::Job,
        &[
            r"(?i)\b(?:i|we)\s+work\s+(?:at|for)\s+([^,.!?;]+)",
            r"(?i)\bmy\s+job\s+(?:is\s+)?at\s+([^,.!?;]+)",
            r"(?i)\b(?:i'm\s+|i\s+am\s+)?working\s+(?:at|for)\s+([^,.!?;]+)",
            r"(?i)\b(?:i|me)\s+work\s+as\s+(?:an?\s+)?([^,.!?;]+)",
            r"(?i)\b(?:i\s+am|i'm)\s+an?\s+([^,.!?;]+?\s+at\s+[^,.!?;]+)",
            r"(?i)\b(?:i\s+am|i'm)\s+(?:an?\s+)?([^,.!?;]+?)\s+by\s+(?:profession|trade)",
        ],
    ),
    (
        FactCategory::Location,
        &[
            r"(?i)\b(?:i|we)\s+live\s+in\s+([^,.!?;]+)",
            r"(?i)\b(?:i\s+am|i'm)\s+(?:originally\s+)?from\s+([^,.!?;]+)",
            r"(?i)\bmy\s+home\s+(?:is\s+)?in\s+([^,.!?;]+)",
            r"(?i)\b(?:i|we)\s+(?:just\s+)?moved\s+to\s+([^,.!?;]+)",
        ],
    ),
    (
        FactCategory::Family,
        &[
            r"(?i)\bmy\s+(?P<rel>{fam})(?:'s\s+name|\s+name)?\s+is\s+(?:named\s+|called\s+)?([^,.!?;]+)",
            r"\b([A-Z][a-z'-]+)\s+(?i:is\s+my)\s+(?P<rel>(?i:{fam}))\b",
            r"(?i)\bi\s+have\s+an?\s+(?P<rel>{fam})\s+(?:named|called)\s+([^,.!?;]+)",
        ],
    ),
    (
        FactCategory::Hobby,
        &[
            r"(?i)\bi\s+(?:really\s+)?(?:like|love|enjoy)\s+([^,.!?;]+)",
            r"(?i)\bmy\s+hobby\s+is\s+([^,.!?;]+)",
            r"(?i)\bmy\s+hobbies\s+are\s+([^,.!?;]+)",
            r"(?i)\b(?:i'm|i\s+am)\s+(?:really\s+)?interested\s+in\s+([^,.!?;]+)",
        ],
    ),
    (
        FactCategory::Pets,
        &[
            r"(?i)\bmy\s+(?P<rel>{pet})(?:'s\s+name|\s+name)?\s+is\s+(?:named\s+|called\s+)?([^,.!?;]+)",
            r"\b([A-Z][a-z'-]+)\s+(?i:is\s+my)\s+(?P<rel>(?i:{pet}))\b",
            r"(?i)\bi\s+have\s+an?\s+(?P<rel>{pet})\s+(?:named|called)\s+([^,.!?;]+)",
        ],
    ),
    (
        FactCategory::Preferences,
        &[
            r"(?i)\bi\s+(?:really\s+)?prefer\s+([^,.!?;]+)",
            r"(?i)\bmy\s+(?P<rel>(?:favorite|favourite)\s+(?:food|color|colour|movie|book|song|band|drink|sport|game|show))\s+is\s+([^,.!?;]+)",
            r"(?i)\bi\s+(?:really\s+)?(?P<rel>hate|dislike|can't\s+stand|cannot\s+stand)\s+([^,.!?;]+)",
        ],
    ),
    (
        FactCategory::Education,
        &[
            r"(?i)\b(?:i|i'm|i\s+am)\s+(?:study|studied|studying|majored\s+in|majoring\s+in)\s+([^,.!?;]+)",
            r"(?i)\bi\s+graduated\s+from\s+([^,.!?;]+)",
            r"(?i)\bi\s+(?:go|went)\s+to\s+([^,.!?;]*\b(?:university|college|school)\b[^,.!?;]*)",
            r"(?i)\bi\s+(?:have|got|earned)\s+an?\s+([^,.!?;]*\bdegree\b[^,.!?;]*)",
        ],
    ),
];

struct CompiledRule {
    category: FactCategory,
    regex: Regex,
    rel_index: Option<usize>,
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    FACT_RULES
        .iter()
        .flat_map(|(category, patterns)| {
            patterns.iter().map(move |pattern| {
                let expanded = pattern
                    .replace("{fam}", FAMILY_RELATIONS)
                    .replace("{pet}", PET_KINDS);
                let regex = Regex::new(&expanded).expect("static fact rule must compile");
                let rel_index = regex.capture_names().position(|n| n == Some("rel"));
                CompiledRule {
                    category: *category,
                    regex,
                    rel_index,
                }
            })
        })
        .collect()
});

/// Stateless fact extractor over the static rule table.
pub struct FactExtractor;

impl FactExtractor {
    /// Every (category, value) candidate in `text`, deduplicated by
    /// normalized value within the message. Pure; touches no store.
    pub fn candidates(text: &str) -> Vec<(FactCategory, String)> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut seen: HashSet<(FactCategory, String)> = HashSet::new();
        let mut out = Vec::new();

        for rule in COMPILED_RULES.iter() {
            for caps in rule.regex.captures_iter(text) {
                let relation = rule
                    .rel_index
                    .and_then(|i| caps.get(i))
                    .map(|m| normalize_value(m.as_str()));

                for index in 1..caps.len() {
                    if Some(index) == rule.rel_index {
                        continue;
                    }
                    let Some(group) = caps.get(index) else {
                        continue;
                    };
                    for value in atomic_values(group.as_str()) {
                        let value = match &relation {
                            Some(rel) => format!("{value} ({rel})"),
                            None => value,
                        };
                        if seen.insert((rule.category, normalize_value(&value))) {
                            out.push((rule.category, value));
                        }
                    }
                }
            }
        }
        out
    }

    /// Extract facts from `text` and store the new ones for `owner`.
    ///
    /// Returns only facts created by this call. Values already known for the
    /// owner are skipped, and so is a value another writer stored between
    /// our check and our insert (the store reports it as a duplicate).
    pub async fn extract_and_store(
        store: &dyn FactStore,
        owner: &OwnerId,
        text: &str,
    ) -> Result<Vec<Fact>, StoreError> {
        if !owner.is_valid() {
            debug!("Skipping fact extraction: invalid owner id");
            return Ok(Vec::new());
        }
        let candidates = Self::candidates(text);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let known: HashSet<(FactCategory, String)> = store
            .list(owner)
            .await?
            .iter()
            .map(|f| (f.category, f.value_key()))
            .collect();

        let mut created = Vec::new();
        for (category, value) in candidates {
            if known.contains(&(category, normalize_value(&value))) {
                continue;
            }
            match store.create(owner, category, &value).await {
                Ok(fact) => created.push(fact),
                Err(e) if e.is_duplicate() => {
                    debug!(category = %category, "Fact already stored by a concurrent writer");
                }
                Err(e) => return Err(e),
            }
        }

        if !created.is_empty() {
            debug!(owner = %owner, count = created.len(), "Stored new facts");
        }
        Ok(created)
    }
}

/// Cut a capture at its clause boundary, split on conjunctions, clean up.
fn atomic_values(capture: &str) -> Vec<String> {
    // ASCII lowercasing keeps byte offsets aligned with `capture`.
    let lower = capture.to_ascii_lowercase();
    let end = CLAUSE_BREAKS
        .iter()
        .filter_map(|b| lower.find(b))
        .min()
        .unwrap_or(capture.len());
    let clause = &capture[..end];

    let mut parts = vec![clause.to_string()];
    for sep in VALUE_SEPARATORS {
        parts = parts
            .iter()
            .flat_map(|p| split_ascii_case_insensitive(p, sep))
            .collect();
    }

    parts
        .into_iter()
        .filter_map(|p| clean_value(&p))
        .collect()
}

fn split_ascii_case_insensitive(text: &str, sep: &str) -> Vec<String> {
    let lower = text.to_ascii_lowercase();
    let mut out = Vec::new();
    let mut start = 0;
    while let Some(pos) = lower[start..].find(sep) {
        out.push(text[start..start + pos].to_string());
        start += pos + sep.len();
    }
    out.push(text[start..].to_string());
    out
}

fn clean_value(raw: &str) -> Option<String> {
    let mut value = raw
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ':' | '(' | ')'))
        .to_string();

    for filler in LEADING_FILLER {
        let stripped = value
            .get(..filler.len())
            .filter(|head| head.eq_ignore_ascii_case(filler))
            .and_then(|_| value.get(filler.len()..))
            .map(|rest| rest.trim_start().to_string());
        if let Some(rest) = stripped.filter(|r| !r.is_empty()) {
            value = rest;
        }
    }

    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() || value.chars().count() > MAX_VALUE_CHARS {
        return None;
    }
    // "I love you" or "This is my dog" carry nothing worth remembering.
    if content_terms(&value).is_empty() {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recollect_memory::InMemoryStore;

    fn values(text: &str, category: FactCategory) -> Vec<String> {
        FactExtractor::candidates(text)
            .into_iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, v)| v)
            .collect()
    }

    #[test]
    fn all_rules_compile() {
        let total: usize = FACT_RULES.iter().map(|(_, p)| p.len()).sum();
        assert_eq!(COMPILED_RULES.len(), total);
    }

    #[test]
    fn job_stops_at_clause_break() {
        let text = "I work at Google and I love hiking and cooking.";
        assert_eq!(values(text, FactCategory::Job), vec!["Google"]);
        assert_eq!(values(text, FactCategory::Hobby), vec!["hiking", "cooking"]);
    }

    #[test]
    fn role_at_company() {
        let text = "I'm a software engineer at Acme Corp";
        assert_eq!(values(text, FactCategory::Job), vec!["software engineer at Acme Corp"]);
    }

    #[test]
    fn locations_split_on_punctuation() {
        let text = "I live in Lisbon, but I'm from Porto.";
        assert_eq!(values(text, FactCategory::Location), vec!["Lisbon", "Porto"]);
    }

    #[test]
    fn family_and_pets_keep_relation() {
        let text = "My wife is Sarah and my dog is Rex.";
        assert_eq!(values(text, FactCategory::Family), vec!["Sarah (wife)"]);
        assert_eq!(values(text, FactCategory::Pets), vec!["Rex (dog)"]);
    }

    #[test]
    fn named_relation_before_verb() {
        let text = "Tom is my brother.";
        assert_eq!(values(text, FactCategory::Family), vec!["Tom (brother)"]);
    }

    #[test]
    fn pronoun_only_values_dropped() {
        assert!(values("This is my dog", FactCategory::Pets).is_empty());
        assert!(values("I love you", FactCategory::Hobby).is_empty());
    }

    #[test]
    fn preferences_and_education() {
        let text = "My favorite food is pizza. I studied at Stanford";
        assert_eq!(
            values(text, FactCategory::Preferences),
            vec!["pizza (favorite food)"]
        );
        assert_eq!(values(text, FactCategory::Education), vec!["Stanford"]);
    }

    #[test]
    fn leading_to_is_stripped() {
        assert_eq!(values("I love to cook", FactCategory::Hobby), vec!["cook"]);
    }

    #[test]
    fn non_ascii_values() {
        assert_eq!(values("I live in Москва", FactCategory::Location), vec!["Москва"]);
        assert_eq!(values("I love ελληνικά", FactCategory::Hobby), vec!["ελληνικά"]);
        assert_eq!(values("I work at Tō", FactCategory::Job), vec!["Tō"]);
    }

    #[test]
    fn empty_and_patternless_text() {
        assert!(FactExtractor::candidates("").is_empty());
        assert!(FactExtractor::candidates("   ").is_empty());
        assert!(FactExtractor::candidates("What's the weather like today?").is_empty());
    }

    #[test]
    fn overlong_values_dropped() {
        let long = "x".repeat(100);
        assert!(values(&format!("I live in {long}"), FactCategory::Location).is_empty());
    }

    #[tokio::test]
    async fn extraction_is_idempotent() {
        let store = InMemoryStore::new();
        let owner = OwnerId::from("alice");
        let text = "I work at Google and I live in Lisbon.";

        let first = FactExtractor::extract_and_store(&store, &owner, text).await.unwrap();
        assert_eq!(first.len(), 2);

        let second = FactExtractor::extract_and_store(&store, &owner, text).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(store.fact_count().await, 2);
    }

    #[tokio::test]
    async fn case_variants_are_duplicates() {
        let store = InMemoryStore::new();
        let owner = OwnerId::from("alice");
        FactExtractor::extract_and_store(&store, &owner, "I live in Lisbon")
            .await
            .unwrap();
        let again = FactExtractor::extract_and_store(&store, &owner, "i live in LISBON")
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn blank_owner_yields_nothing() {
        let store = InMemoryStore::new();
        let created =
            FactExtractor::extract_and_store(&store, &OwnerId::from("  "), "I live in Lisbon")
                .await
                .unwrap();
        assert!(created.is_empty());
    }
}
