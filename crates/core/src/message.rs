//! Message and identity domain types.
//!
//! Messages are the raw material of every memory tier: facts are extracted
//! from them, topics are tagged onto them, and recent history is a
//! recency-windowed view of them. A stored message is never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the user whose memories are being stored or retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An owner id must contain at least one non-whitespace character.
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI companion
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A single stored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// The user this message belongs to
    pub owner: OwnerId,

    /// Conversation the message was sent in
    pub conversation_id: ConversationId,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was sent
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message, timestamped now.
    pub fn user(
        owner: OwnerId,
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> Self {
        Self::new(owner, conversation_id, Role::User, content)
    }

    /// Create a new assistant message, timestamped now.
    pub fn assistant(
        owner: OwnerId,
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> Self {
        Self::new(owner, conversation_id, Role::Assistant, content)
    }

    pub fn new(
        owner: OwnerId,
        conversation_id: ConversationId,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner,
            conversation_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp (used when importing history).
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
