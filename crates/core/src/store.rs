//! Storage collaborator traits.
//!
//! The engine never talks to a database directly. It consumes three narrow
//! contracts, one per memory tier:
//! - [`FactStore`]: typed user facts (Tier 1)
//! - [`MessageStore`]: raw conversation messages (Tier 2)
//! - [`TopicStore`]: topics and message/topic associations (Tier 3)
//!
//! Relevance scores returned by `search*` methods are backend-specific and
//! only comparable within one result set; higher is better.

use crate::error::StoreError;
use crate::fact::{Fact, FactCategory};
use crate::message::{ConversationId, Message, OwnerId};
use crate::topic::{Topic, TopicTag, TopicUsage};
use async_trait::async_trait;

/// Tier 1 storage.
///
/// Implementations: SQLite, in-memory (for testing), none (no-op).
#[async_trait]
pub trait FactStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    /// Create a fact.
    ///
    /// The uniqueness check on (owner, category, normalized value) and the
    /// insert must be atomic. A duplicate is reported as
    /// [`StoreError::Duplicate`], never as a second record.
    async fn create(
        &self,
        owner: &OwnerId,
        category: FactCategory,
        value: &str,
    ) -> Result<Fact, StoreError>;

    /// All facts for an owner, oldest first.
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Fact>, StoreError>;

    /// Full-text search over fact values.
    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Fact, f32)>, StoreError>;
}

/// Tier 2 storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist a message. Messages are immutable once stored.
    async fn append(&self, message: Message) -> Result<Message, StoreError>;

    /// Most recent messages for an owner, newest first, optionally limited
    /// to one conversation.
    async fn recent(
        &self,
        owner: &OwnerId,
        conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;

    /// Full-text search over message content.
    async fn search(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError>;
}

/// Tier 3 storage.
#[async_trait]
pub trait TopicStore: Send + Sync {
    fn name(&self) -> &str;

    /// Look up a topic by case-insensitive name, creating it if absent.
    async fn get_or_create(&self, name: &str) -> Result<Topic, StoreError>;

    /// Associate a message with topics. Existing associations are left
    /// untouched. Returns the number of new associations.
    async fn tag(&self, message_id: &str, topics: &[TopicTag]) -> Result<usize, StoreError>;

    /// Topics whose tagged messages (of this owner) match the query text.
    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Topic, f32)>, StoreError>;

    /// Every topic the owner has messages in, with usage statistics.
    async fn usage(&self, owner: &OwnerId) -> Result<Vec<TopicUsage>, StoreError>;

    /// The owner's messages tagged with a topic, newest first.
    async fn messages_for_topic(
        &self,
        owner: &OwnerId,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError>;
}
