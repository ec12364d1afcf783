//! Topics: Tier 3 of the memory model.
//!
//! A topic is a named subject ("work", "health") shared across owners.
//! Messages are associated with topics through append-only
//! [`MessageTopic`] records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A topic, unique per case-insensitive name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,

    /// Display name
    pub name: String,

    /// Normalized lookup key (lower-cased, trimmed)
    pub key: String,
}

impl Topic {
    pub fn key_for(name: &str) -> String {
        name.trim().to_lowercase()
    }
}

/// Association between a stored message and a topic. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTopic {
    pub message_id: String,
    pub topic_id: String,

    /// Extractor score for this association, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,

    pub created_at: DateTime<Utc>,
}

/// A topic reference to attach to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicTag {
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
}

/// Per-owner usage of a topic, the raw inputs for topic scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicUsage {
    pub topic: Topic,

    /// Number of the owner's messages tagged with this topic
    pub message_count: usize,

    /// Timestamp of the owner's most recent tagged message
    pub last_mentioned: DateTime<Utc>,
}
