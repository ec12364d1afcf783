//! Topic tagging: attach extracted topic categories to stored messages.
//!
//! Topic rows are shared across owners and deduplicated case-insensitively
//! by the store; associations are append-only.

use crate::extract::TopicExtractor;
use recollect_core::error::StoreError;
use recollect_core::message::Message;
use recollect_core::store::TopicStore;
use recollect_core::topic::{Topic, TopicTag};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct TopicTagger {
    store: Arc<dyn TopicStore>,
    top_n: usize,
}

impl TopicTagger {
    pub fn new(store: Arc<dyn TopicStore>, top_n: usize) -> Self {
        Self { store, top_n }
    }

    /// Tag one message with its top topics and return them.
    ///
    /// Messages with no recognizable topic are left untagged.
    pub async fn tag_message(&self, message: &Message) -> Result<Vec<Topic>, StoreError> {
        let hits: Vec<_> = TopicExtractor::extract_scored(&message.content)
            .into_iter()
            .take(self.top_n)
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let mut topics = Vec::with_capacity(hits.len());
        let mut tags = Vec::with_capacity(hits.len());
        for hit in hits {
            let topic = self.store.get_or_create(hit.topic).await?;
            tags.push(TopicTag {
                topic_id: topic.id.clone(),
                relevance: Some(hit.score),
            });
            topics.push(topic);
        }

        let created = self.store.tag(&message.id, &tags).await?;
        debug!(
            message_id = %message.id,
            topics = topics.len(),
            created,
            "Tagged message"
        );
        Ok(topics)
    }

    /// Tag many messages. Returns message id → topics for every message that
    /// received at least one topic.
    pub async fn tag_messages(
        &self,
        messages: &[Message],
    ) -> Result<HashMap<String, Vec<Topic>>, StoreError> {
        let mut tagged = HashMap::new();
        for message in messages {
            let topics = self.tag_message(message).await?;
            if !topics.is_empty() {
                tagged.insert(message.id.clone(), topics);
            }
        }
        Ok(tagged)
    }
}
