//! No-op store: disables persistent memory entirely.
//!
//! Writes are accepted and forgotten; every read is empty.

use async_trait::async_trait;
use chrono::Utc;
use recollect_core::error::StoreError;
use recollect_core::fact::{Fact, FactCategory};
use recollect_core::message::{ConversationId, Message, OwnerId};
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use recollect_core::topic::{Topic, TopicTag, TopicUsage};
use uuid::Uuid;

/// A no-op store that remembers nothing.
pub struct NoopStore;

#[async_trait]
impl FactStore for NoopStore {
    fn name(&self) -> &str { "none" }

    async fn create(
        &self,
        owner: &OwnerId,
        category: FactCategory,
        value: &str,
    ) -> Result<Fact, StoreError> {
        Ok(Fact {
            id: Uuid::new_v4().to_string(),
            owner: owner.clone(),
            category,
            value: value.trim().to_string(),
            created_at: Utc::now(),
        })
    }

    async fn list(&self, _owner: &OwnerId) -> Result<Vec<Fact>, StoreError> {
        Ok(Vec::new())
    }

    async fn search_with_relevance(
        &self,
        _owner: &OwnerId,
        _query_text: &str,
        _limit: usize,
    ) -> Result<Vec<(Fact, f32)>, StoreError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl MessageStore for NoopStore {
    fn name(&self) -> &str { "none" }

    async fn append(&self, message: Message) -> Result<Message, StoreError> {
        Ok(message)
    }

    async fn recent(
        &self,
        _owner: &OwnerId,
        _conversation: Option<&ConversationId>,
        _limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(Vec::new())
    }

    async fn search(
        &self,
        _owner: &OwnerId,
        _query_text: &str,
        _limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl TopicStore for NoopStore {
    fn name(&self) -> &str { "none" }

    async fn get_or_create(&self, name: &str) -> Result<Topic, StoreError> {
        Ok(Topic {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            key: Topic::key_for(name),
        })
    }

    async fn tag(&self, _message_id: &str, _topics: &[TopicTag]) -> Result<usize, StoreError> {
        Ok(0)
    }

    async fn search_with_relevance(
        &self,
        _owner: &OwnerId,
        _query_text: &str,
        _limit: usize,
    ) -> Result<Vec<(Topic, f32)>, StoreError> {
        Ok(Vec::new())
    }

    async fn usage(&self, _owner: &OwnerId) -> Result<Vec<TopicUsage>, StoreError> {
        Ok(Vec::new())
    }

    async fn messages_for_topic(
        &self,
        _owner: &OwnerId,
        _topic_id: &str,
        _limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        Ok(Vec::new())
    }
}
