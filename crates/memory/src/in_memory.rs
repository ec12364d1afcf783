//! In-memory store: useful for testing and ephemeral sessions.
//!
//! Implements all three tier stores over plain vectors. Full-text relevance
//! is approximated by query-term coverage.

use async_trait::async_trait;
use chrono::Utc;
use recollect_core::error::StoreError;
use recollect_core::fact::{normalize_value, Fact, FactCategory};
use recollect_core::message::{ConversationId, Message, OwnerId};
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use recollect_core::text::{content_terms, term_coverage};
use recollect_core::topic::{MessageTopic, Topic, TopicTag, TopicUsage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// An in-memory store. Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    facts: Arc<RwLock<Vec<Fact>>>,
    messages: Arc<RwLock<Vec<Message>>>,
    topics: Arc<RwLock<Vec<Topic>>>,
    associations: Arc<RwLock<Vec<MessageTopic>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored facts across all owners.
    pub async fn fact_count(&self) -> usize {
        self.facts.read().await.len()
    }

    /// Total number of message/topic associations.
    pub async fn association_count(&self) -> usize {
        self.associations.read().await.len()
    }
}

#[async_trait]
impl FactStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn create(
        &self,
        owner: &OwnerId,
        category: FactCategory,
        value: &str,
    ) -> Result<Fact, StoreError> {
        let key = normalize_value(value);
        // Check and insert under one write lock so concurrent creators
        // cannot both pass the check.
        let mut facts = self.facts.write().await;
        if facts
            .iter()
            .any(|f| &f.owner == owner && f.category == category && f.value_key() == key)
        {
            return Err(StoreError::Duplicate(format!("{category}:{key}")));
        }

        let fact = Fact {
            id: Uuid::new_v4().to_string(),
            owner: owner.clone(),
            category,
            value: value.trim().to_string(),
            created_at: Utc::now(),
        };
        facts.push(fact.clone());
        Ok(fact)
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Fact>, StoreError> {
        let facts = self.facts.read().await;
        Ok(facts.iter().filter(|f| &f.owner == owner).cloned().collect())
    }

    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Fact, f32)>, StoreError> {
        let terms = content_terms(query_text);
        let facts = self.facts.read().await;

        let mut results: Vec<(Fact, f32)> = facts
            .iter()
            .filter(|f| &f.owner == owner)
            .map(|f| {
                let haystack = format!("{} {}", f.category.as_str(), f.value);
                (f.clone(), term_coverage(&terms, &haystack))
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn append(&self, message: Message) -> Result<Message, StoreError> {
        let mut messages = self.messages.write().await;
        if messages.iter().any(|m| m.id == message.id) {
            return Err(StoreError::Duplicate(format!("message {}", message.id)));
        }
        messages.push(message.clone());
        Ok(message)
    }

    async fn recent(
        &self,
        owner: &OwnerId,
        conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;
        let mut results: Vec<Message> = messages
            .iter()
            .filter(|m| &m.owner == owner)
            .filter(|m| conversation.is_none_or(|c| &m.conversation_id == c))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);
        Ok(results)
    }

    async fn search(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        let terms = content_terms(query_text);
        let messages = self.messages.read().await;

        let mut results: Vec<(Message, f32)> = messages
            .iter()
            .filter(|m| &m.owner == owner)
            .map(|m| (m.clone(), term_coverage(&terms, &m.content)))
            .filter(|(_, score)| *score > 0.0)
            .collect();

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.timestamp.cmp(&a.0.timestamp))
        });
        results.truncate(limit);
        Ok(results)
    }
}

impl InMemoryStore {
    /// The owner's messages grouped by topic id.
    async fn owner_messages_by_topic(&self, owner: &OwnerId) -> HashMap<String, Vec<Message>> {
        let messages = self.messages.read().await;
        let associations = self.associations.read().await;

        let owned: HashMap<&str, &Message> = messages
            .iter()
            .filter(|m| &m.owner == owner)
            .map(|m| (m.id.as_str(), m))
            .collect();

        let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
        for assoc in associations.iter() {
            if let Some(message) = owned.get(assoc.message_id.as_str()) {
                grouped
                    .entry(assoc.topic_id.clone())
                    .or_default()
                    .push((*message).clone());
            }
        }
        grouped
    }

    async fn topic_by_id(&self, id: &str) -> Option<Topic> {
        self.topics.read().await.iter().find(|t| t.id == id).cloned()
    }
}

#[async_trait]
impl TopicStore for InMemoryStore {
    fn name(&self) -> &str { "in_memory" }

    async fn get_or_create(&self, name: &str) -> Result<Topic, StoreError> {
        let key = Topic::key_for(name);
        if key.is_empty() {
            return Err(StoreError::QueryFailed("topic name is empty".into()));
        }

        let mut topics = self.topics.write().await;
        if let Some(existing) = topics.iter().find(|t| t.key == key) {
            return Ok(existing.clone());
        }

        let topic = Topic {
            id: Uuid::new_v4().to_string(),
            name: key.clone(),
            key,
        };
        topics.push(topic.clone());
        Ok(topic)
    }

    async fn tag(&self, message_id: &str, topics: &[TopicTag]) -> Result<usize, StoreError> {
        let mut associations = self.associations.write().await;
        let mut created = 0;
        for tag in topics {
            let exists = associations
                .iter()
                .any(|a| a.message_id == message_id && a.topic_id == tag.topic_id);
            if !exists {
                associations.push(MessageTopic {
                    message_id: message_id.to_string(),
                    topic_id: tag.topic_id.clone(),
                    relevance: tag.relevance,
                    created_at: Utc::now(),
                });
                created += 1;
            }
        }
        Ok(created)
    }

    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Topic, f32)>, StoreError> {
        let terms = content_terms(query_text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for (topic_id, messages) in self.owner_messages_by_topic(owner).await {
            let score: f32 = messages
                .iter()
                .map(|m| term_coverage(&terms, &m.content))
                .sum();
            if score > 0.0 {
                if let Some(topic) = self.topic_by_id(&topic_id).await {
                    results.push((topic, score));
                }
            }
        }

        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.key.cmp(&b.0.key))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn usage(&self, owner: &OwnerId) -> Result<Vec<TopicUsage>, StoreError> {
        let mut usage = Vec::new();
        for (topic_id, messages) in self.owner_messages_by_topic(owner).await {
            let Some(last_mentioned) = messages.iter().map(|m| m.timestamp).max() else {
                continue;
            };
            if let Some(topic) = self.topic_by_id(&topic_id).await {
                usage.push(TopicUsage {
                    topic,
                    message_count: messages.len(),
                    last_mentioned,
                });
            }
        }
        usage.sort_by(|a, b| a.topic.key.cmp(&b.topic.key));
        Ok(usage)
    }

    async fn messages_for_topic(
        &self,
        owner: &OwnerId,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let mut messages = self
            .owner_messages_by_topic(owner)
            .await
            .remove(topic_id)
            .unwrap_or_default();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }
}
