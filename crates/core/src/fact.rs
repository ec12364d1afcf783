//! User facts: Tier 1 of the memory model.
//!
//! A fact is a typed, durable statement about the user ("works at Google",
//! "lives in Lisbon") extracted from a message by rule-based pattern
//! matching. Facts are unique per (owner, category, normalized value) and
//! are never mutated once stored.

use crate::message::OwnerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of fact categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    Job,
    Location,
    Family,
    #[serde(alias = "interests", alias = "hobbies")]
    Hobby,
    Pets,
    Preferences,
    Education,
}

impl FactCategory {
    /// Every category, in declaration order.
    pub const ALL: [FactCategory; 7] = [
        Self::Job,
        Self::Location,
        Self::Family,
        Self::Hobby,
        Self::Pets,
        Self::Preferences,
        Self::Education,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Location => "location",
            Self::Family => "family",
            Self::Hobby => "hobby",
            Self::Pets => "pets",
            Self::Preferences => "preferences",
            Self::Education => "education",
        }
    }

    /// Parse a category name. Accepts the legacy `interests` spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "job" | "work" => Some(Self::Job),
            "location" => Some(Self::Location),
            "family" => Some(Self::Family),
            "hobby" | "hobbies" | "interests" => Some(Self::Hobby),
            "pets" | "pet" => Some(Self::Pets),
            "preferences" | "preference" => Some(Self::Preferences),
            "education" => Some(Self::Education),
            _ => None,
        }
    }

    /// Words that, when present in a query, name this category.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Job => &[
                "job", "work", "career", "occupation", "profession", "employer", "company",
            ],
            Self::Location => &["location", "live", "living", "city", "hometown"],
            Self::Family => &[
                "family", "kids", "children", "wife", "husband", "son", "daughter", "brother",
                "sister", "parents", "mom", "dad",
            ],
            Self::Hobby => &["hobby", "hobbies", "interests", "interest", "enjoy", "fun"],
            Self::Pets => &["pet", "pets", "dog", "cat"],
            Self::Preferences => &["favorite", "favourite", "prefer", "preferences", "hate"],
            Self::Education => &[
                "education", "school", "study", "studied", "degree", "university", "college",
            ],
        }
    }

    /// Topic-catalog categories this fact category is evidence for.
    pub fn related_topics(&self) -> &'static [&'static str] {
        match self {
            Self::Job => &["work"],
            Self::Location => &["housing", "travel"],
            Self::Family => &["family", "relationships"],
            Self::Hobby => &["hobbies", "entertainment"],
            Self::Pets => &["family", "personal"],
            Self::Preferences => &["food", "hobbies", "entertainment"],
            Self::Education => &["education"],
        }
    }

    /// Human-readable label for rendering.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Job => "Job",
            Self::Location => "Location",
            Self::Family => "Family",
            Self::Hobby => "Hobby",
            Self::Pets => "Pets",
            Self::Preferences => "Preferences",
            Self::Education => "Education",
        }
    }
}

impl std::fmt::Display for FactCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored user fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique ID for this fact
    pub id: String,

    /// The user the fact is about
    pub owner: OwnerId,

    pub category: FactCategory,

    /// Display value, original casing preserved
    pub value: String,

    pub created_at: DateTime<Utc>,
}

impl Fact {
    /// The comparison key used for deduplication.
    pub fn value_key(&self) -> String {
        normalize_value(&self.value)
    }
}

/// Normalize a fact value for comparison: trim, lower-case, collapse inner
/// whitespace. Display values keep their original casing.
pub fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_ignores_case_and_spacing() {
        assert_eq!(normalize_value("  Software   Engineer "), "software engineer");
        assert_eq!(normalize_value("GOOGLE"), normalize_value("google"));
    }

    #[test]
    fn category_parse_accepts_legacy_names() {
        assert_eq!(FactCategory::parse("interests"), Some(FactCategory::Hobby));
        assert_eq!(FactCategory::parse("Job"), Some(FactCategory::Job));
        assert_eq!(FactCategory::parse("astrology"), None);
    }

    #[test]
    fn category_serde_uses_snake_case() {
        let json = serde_json::to_string(&FactCategory::Preferences).unwrap();
        assert_eq!(json, "\"preferences\"");
        let legacy: FactCategory = serde_json::from_str("\"interests\"").unwrap();
        assert_eq!(legacy, FactCategory::Hobby);
    }

    #[test]
    fn every_category_roundtrips_through_parse() {
        for category in FactCategory::ALL {
            assert_eq!(FactCategory::parse(category.as_str()), Some(category));
        }
    }
}
