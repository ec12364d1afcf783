//! The write path: store a message, then derive facts and topics from it.

use crate::extract::FactExtractor;
use crate::tagger::TopicTagger;
use recollect_config::RecollectConfig;
use recollect_core::error::{Result, ValidationError};
use recollect_core::fact::Fact;
use recollect_core::message::{Message, Role};
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use recollect_core::topic::Topic;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// What one ingested message added to memory.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub message: Message,
    /// Facts newly created by this message (already-known facts excluded).
    pub facts: Vec<Fact>,
    pub topics: Vec<Topic>,
}

pub struct MemoryIngestor {
    messages: Arc<dyn MessageStore>,
    facts: Arc<dyn FactStore>,
    tagger: TopicTagger,
    extract_from_assistant: bool,
}

impl MemoryIngestor {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        facts: Arc<dyn FactStore>,
        topics: Arc<dyn TopicStore>,
        config: &RecollectConfig,
    ) -> Self {
        Self {
            messages,
            facts,
            tagger: TopicTagger::new(topics, config.extraction.topic_top_n),
            extract_from_assistant: config.extraction.extract_from_assistant,
        }
    }

    pub fn from_store<S>(store: Arc<S>, config: &RecollectConfig) -> Self
    where
        S: FactStore + MessageStore + TopicStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    /// Append `message`, extract facts (user messages only unless
    /// configured otherwise) and tag its topics.
    ///
    /// Concurrent ingestion of messages that yield the same fact stores it
    /// once; the loser sees no new fact, not an error.
    pub async fn ingest(&self, message: Message) -> Result<IngestReport> {
        if !message.owner.is_valid() {
            return Err(ValidationError::InvalidOwner(message.owner.0.clone()).into());
        }
        if message.content.trim().is_empty() {
            return Err(ValidationError::EmptyInput.into());
        }

        let message = self.messages.append(message).await?;

        // The message is already stored; a fact-store failure must not keep
        // it from being tagged.
        let facts = if message.role == Role::User || self.extract_from_assistant {
            FactExtractor::extract_and_store(self.facts.as_ref(), &message.owner, &message.content)
                .await
                .unwrap_or_else(|e| {
                    warn!(
                        owner = %message.owner,
                        message_id = %message.id,
                        error = %e,
                        "Fact extraction failed, continuing with topic tagging"
                    );
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        let topics = self.tagger.tag_message(&message).await?;

        info!(
            owner = %message.owner,
            message_id = %message.id,
            facts = facts.len(),
            topics = topics.len(),
            "Ingested message"
        );
        Ok(IngestReport {
            message,
            facts,
            topics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use recollect_core::error::{Error, StoreError};
    use recollect_core::fact::FactCategory;
    use recollect_core::message::{ConversationId, OwnerId};
    use recollect_memory::InMemoryStore;

    fn ingestor(store: &Arc<InMemoryStore>) -> MemoryIngestor {
        MemoryIngestor::from_store(store.clone(), &RecollectConfig::default())
    }

    #[tokio::test]
    async fn user_message_yields_facts_and_topics() {
        let store = Arc::new(InMemoryStore::new());
        let report = ingestor(&store)
            .ingest(Message::user(
                OwnerId::from("alice"),
                ConversationId::from("c1"),
                "I live in Lisbon and my dog is Rex. My sister visits often.",
            ))
            .await
            .unwrap();

        assert_eq!(report.facts.len(), 2);
        assert!(report.topics.iter().any(|t| t.key == "family"));
        assert_eq!(store.fact_count().await, 2);
    }

    #[tokio::test]
    async fn assistant_messages_skip_fact_extraction() {
        let store = Arc::new(InMemoryStore::new());
        let report = ingestor(&store)
            .ingest(Message::assistant(
                OwnerId::from("alice"),
                ConversationId::from("c1"),
                "I live in the cloud and I work at Anthropic.",
            ))
            .await
            .unwrap();
        assert!(report.facts.is_empty());
        assert_eq!(store.fact_count().await, 0);
    }

    #[tokio::test]
    async fn rejects_empty_and_ownerless_messages() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store);
        let conv = ConversationId::from("c1");

        let err = ingestor
            .ingest(Message::user(OwnerId::from("alice"), conv.clone(), "   "))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyInput)));

        let err = ingestor
            .ingest(Message::user(OwnerId::from(""), conv, "I live in Lisbon"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::InvalidOwner(_))));
    }

    #[tokio::test]
    async fn repeated_message_adds_no_facts() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = ingestor(&store);
        let text = "I work at Google";
        let owner = OwnerId::from("alice");
        let conv = ConversationId::from("c1");

        let first = ingestor
            .ingest(Message::user(owner.clone(), conv.clone(), text))
            .await
            .unwrap();
        let second = ingestor
            .ingest(Message::user(owner, conv, text))
            .await
            .unwrap();
        assert_eq!(first.facts.len(), 1);
        assert!(second.facts.is_empty());
        assert_eq!(store.fact_count().await, 1);
    }

    struct DownFacts;

    #[async_trait]
    impl FactStore for DownFacts {
        fn name(&self) -> &str {
            "down"
        }
        async fn create(&self, _: &OwnerId, _: FactCategory, _: &str) -> std::result::Result<Fact, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn list(&self, _: &OwnerId) -> std::result::Result<Vec<Fact>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn search_with_relevance(
            &self,
            _: &OwnerId,
            _: &str,
            _: usize,
        ) -> std::result::Result<Vec<(Fact, f32)>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn fact_store_failure_still_tags_topics() {
        let store = Arc::new(InMemoryStore::new());
        let ingestor = MemoryIngestor::new(
            store.clone(),
            Arc::new(DownFacts),
            store.clone(),
            &RecollectConfig::default(),
        );

        let report = ingestor
            .ingest(Message::user(
                OwnerId::from("alice"),
                ConversationId::from("c1"),
                "I work at Google and my boss moved the deadline",
            ))
            .await
            .unwrap();

        assert!(report.facts.is_empty());
        assert!(report.topics.iter().any(|t| t.key == "work"));
        assert_eq!(store.association_count().await, report.topics.len());
    }
}
