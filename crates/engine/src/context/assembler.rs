//! Memory context assembly: the three-tier retrieval orchestrator.
//!
//! For one (owner, query) pair the assembler:
//!
//! 1. Analyzes the query (memory-query detection, subtype, topics)
//! 2. Fans out to the three tiers concurrently:
//!    - **Facts**: every fact for the owner, scored and cut to `fact_limit`
//!    - **Recent**: recency-windowed messages, relevance-ranked for memory queries
//!    - **Topics**: topic scores from full-text hits and usage, plus each
//!      topic's latest messages
//! 3. Fans in to a [`MemoryContext`], recording any tier that failed or
//!    timed out in `degraded` instead of failing the call
//!
//! Rendering happens separately in [`super::format`].

use crate::context::format::{ContextBudget, format_memory_context};
use crate::query::analyze_query;
use crate::scoring::{
    ScoredFact, ScoredMessage, ScoredTopic, ScoringContext, rank_facts, rank_recent, rank_topics,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use recollect_config::{RecollectConfig, RetrievalConfig, ScoringConfig};
use recollect_core::error::StoreError;
use recollect_core::message::{ConversationId, Message, OwnerId};
use recollect_core::query::QueryAnalysis;
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ── Types ─────────────────────────────────────────────────────────────────

/// One of the three memory tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Facts,
    Recent,
    Topics,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facts => "facts",
            Self::Recent => "recent",
            Self::Topics => "topics",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier that contributed nothing because its store failed or was slow.
#[derive(Debug, Clone, Serialize)]
pub struct TierFailure {
    pub tier: Tier,
    pub reason: String,
}

/// A scored topic together with its most recent tagged messages.
#[derive(Debug, Clone, Serialize)]
pub struct TopicMemory {
    #[serde(flatten)]
    pub scored: ScoredTopic,
    /// Newest first.
    pub messages: Vec<Message>,
}

/// Everything retrieved for one query, before rendering.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryContext {
    pub owner: OwnerId,
    pub query: QueryAnalysis,
    pub facts: Vec<ScoredFact>,
    pub recent: Vec<ScoredMessage>,
    pub topics: Vec<TopicMemory>,
    /// Tiers treated as empty because retrieval failed.
    pub degraded: Vec<TierFailure>,
    pub generated_at: DateTime<Utc>,
}

impl MemoryContext {
    /// A context with nothing in it.
    pub fn empty(owner: OwnerId, query: QueryAnalysis) -> Self {
        Self {
            owner,
            query,
            facts: Vec::new(),
            recent: Vec::new(),
            topics: Vec::new(),
            degraded: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    /// True when no tier produced anything.
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.recent.is_empty() && self.topics.is_empty()
    }
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The memory context assembler. Cheap to share; holds only store handles
/// and configuration.
#[derive(Clone)]
pub struct MemoryContextAssembler {
    facts: Arc<dyn FactStore>,
    messages: Arc<dyn MessageStore>,
    topics: Arc<dyn TopicStore>,
    retrieval: RetrievalConfig,
    scoring: ScoringConfig,
    budget: ContextBudget,
    topic_top_n: usize,
}

impl MemoryContextAssembler {
    pub fn new(
        facts: Arc<dyn FactStore>,
        messages: Arc<dyn MessageStore>,
        topics: Arc<dyn TopicStore>,
        config: &RecollectConfig,
    ) -> Self {
        Self {
            facts,
            messages,
            topics,
            retrieval: config.retrieval.clone(),
            scoring: config.scoring.clone(),
            budget: ContextBudget::from_config(&config.context),
            topic_top_n: config.extraction.topic_top_n,
        }
    }

    /// Build an assembler over one store that serves all three tiers.
    pub fn from_store<S>(store: Arc<S>, config: &RecollectConfig) -> Self
    where
        S: FactStore + MessageStore + TopicStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, config)
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    /// Retrieve and score memory for a query across all conversations.
    pub async fn assemble(&self, owner: &OwnerId, query: &str) -> MemoryContext {
        self.assemble_in(owner, None, query).await
    }

    /// Like [`assemble`](Self::assemble), with tier 2 limited to one
    /// conversation when `conversation` is given.
    ///
    /// Never fails: an invalid owner yields an empty context and a failing
    /// or slow tier is recorded in [`MemoryContext::degraded`].
    pub async fn assemble_in(
        &self,
        owner: &OwnerId,
        conversation: Option<&ConversationId>,
        query: &str,
    ) -> MemoryContext {
        let analysis = analyze_query(query, self.topic_top_n);
        if !owner.is_valid() {
            debug!(owner = %owner.as_str(), "Invalid owner, returning empty memory context");
            return MemoryContext::empty(owner.clone(), analysis);
        }

        let ctx = ScoringContext::from_analysis(&analysis);
        let now = Utc::now();

        let (facts, recent, topics) = tokio::join!(
            self.run_tier(Tier::Facts, owner, self.fetch_facts(owner, &ctx)),
            self.run_tier(Tier::Recent, owner, self.fetch_recent(owner, conversation, &analysis, &ctx, now)),
            self.run_tier(Tier::Topics, owner, self.fetch_topics(owner, &analysis, &ctx, now)),
        );

        let degraded: Vec<TierFailure> = [&facts.1, &recent.1, &topics.1]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        let context = MemoryContext {
            owner: owner.clone(),
            query: analysis,
            facts: facts.0,
            recent: recent.0,
            topics: topics.0,
            degraded,
            generated_at: now,
        };

        debug!(
            owner = %owner.as_str(),
            kind = ?context.query.kind,
            facts = context.facts.len(),
            recent = context.recent.len(),
            topics = context.topics.len(),
            degraded = context.degraded.len(),
            "Assembled memory context"
        );
        context
    }

    /// Assemble and render with the configured budget.
    pub async fn assemble_formatted(&self, owner: &OwnerId, query: &str) -> String {
        let context = self.assemble(owner, query).await;
        format_memory_context(&context, &self.budget)
    }

    /// Facts the store finds for `query`, re-scored for confidence.
    ///
    /// Unlike tier 1 this only considers facts sharing a term with the
    /// query, and store errors are returned rather than degraded.
    pub async fn search_facts(
        &self,
        owner: &OwnerId,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredFact>, StoreError> {
        if !owner.is_valid() || limit == 0 {
            return Ok(Vec::new());
        }
        let analysis = analyze_query(query, self.topic_top_n);
        let hits = self
            .facts
            .search_with_relevance(owner, query, limit * 4)
            .await?;
        let candidates = hits.into_iter().map(|(fact, _)| fact).collect();
        Ok(rank_facts(
            candidates,
            &ScoringContext::from_analysis(&analysis),
            &self.scoring,
            limit,
        ))
    }

    /// Run one tier under the per-tier timeout. Errors and timeouts become
    /// an empty result plus a [`TierFailure`].
    async fn run_tier<T, F>(&self, tier: Tier, owner: &OwnerId, fut: F) -> (Vec<T>, Option<TierFailure>)
    where
        F: Future<Output = Result<Vec<T>, StoreError>>,
    {
        let millis = self.retrieval.tier_timeout_ms;
        let outcome = match tokio::time::timeout(Duration::from_millis(millis), fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout { millis }),
        };

        match outcome {
            Ok(items) => (items, None),
            Err(e) => {
                warn!(
                    tier = tier.as_str(),
                    owner = %owner.as_str(),
                    error = %e,
                    "Memory tier unavailable, continuing without it"
                );
                (
                    Vec::new(),
                    Some(TierFailure {
                        tier,
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }

    // ── Tier 1 ────────────────────────────────────────────────────────

    async fn fetch_facts(
        &self,
        owner: &OwnerId,
        ctx: &ScoringContext,
    ) -> Result<Vec<ScoredFact>, StoreError> {
        let facts = self.facts.list(owner).await?;
        Ok(rank_facts(facts, ctx, &self.scoring, self.retrieval.fact_limit))
    }

    // ── Tier 2 ────────────────────────────────────────────────────────

    async fn fetch_recent(
        &self,
        owner: &OwnerId,
        conversation: Option<&ConversationId>,
        analysis: &QueryAnalysis,
        ctx: &ScoringContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredMessage>, StoreError> {
        let limit = self.retrieval.recent_limit;
        let mut candidates = self.messages.recent(owner, conversation, limit).await?;

        if analysis.is_memory_query {
            // Older but on-point messages compete with the newest ones.
            let mut seen: HashSet<String> = candidates.iter().map(|m| m.id.clone()).collect();
            for (message, _) in self.messages.search(owner, &analysis.text, limit).await? {
                let in_scope = conversation.is_none_or(|c| *c == message.conversation_id);
                if in_scope && seen.insert(message.id.clone()) {
                    candidates.push(message);
                }
            }
        }

        let terms = analysis.is_memory_query.then_some(ctx.terms.as_slice());
        Ok(rank_recent(
            candidates,
            terms,
            self.retrieval.recency_window_days,
            now,
            limit,
        ))
    }

    // ── Tier 3 ────────────────────────────────────────────────────────

    async fn fetch_topics(
        &self,
        owner: &OwnerId,
        analysis: &QueryAnalysis,
        ctx: &ScoringContext,
        now: DateTime<Utc>,
    ) -> Result<Vec<TopicMemory>, StoreError> {
        let limit = self.retrieval.topic_limit;
        let (hits, usage) = tokio::try_join!(
            self.topics.search_with_relevance(owner, &analysis.text, limit * 4),
            self.topics.usage(owner),
        )?;

        let ranked = rank_topics(usage, &hits, ctx, &self.scoring, now, limit);
        let per_topic = self.retrieval.messages_per_topic;
        let messages = try_join_all(
            ranked
                .iter()
                .map(|t| self.topics.messages_for_topic(owner, &t.topic.id, per_topic)),
        )
        .await?;

        Ok(ranked
            .into_iter()
            .zip(messages)
            .map(|(scored, messages)| TopicMemory { scored, messages })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::MemoryIngestor;
    use async_trait::async_trait;
    use recollect_core::fact::{Fact, FactCategory};
    use recollect_core::query::MemoryQueryKind;
    use recollect_core::topic::{Topic, TopicTag, TopicUsage};
    use recollect_memory::InMemoryStore;

    fn alice() -> OwnerId {
        OwnerId::from("alice")
    }

    async fn seeded() -> (Arc<InMemoryStore>, MemoryContextAssembler) {
        let store = Arc::new(InMemoryStore::new());
        let config = RecollectConfig::default();
        let ingestor = MemoryIngestor::from_store(store.clone(), &config);
        let conv = ConversationId::from("c1");
        for text in [
            "I work at Google as a software engineer",
            "My boss moved the project deadline again",
            "We went on vacation to Lisbon last spring",
        ] {
            ingestor
                .ingest(Message::user(alice(), conv.clone(), text))
                .await
                .unwrap();
        }
        let assembler = MemoryContextAssembler::from_store(store.clone(), &config);
        (store, assembler)
    }

    #[tokio::test]
    async fn knowledge_query_surfaces_job_fact() {
        let (_, assembler) = seeded().await;
        let context = assembler
            .assemble(&alice(), "What do you know about my job?")
            .await;

        assert_eq!(context.query.kind, Some(MemoryQueryKind::KnowledgeQuery));
        assert_eq!(context.facts[0].fact.category, FactCategory::Job);
        assert!(context.facts[0].confidence > 0);
        assert_eq!(context.topics[0].scored.topic.key, "work");
        assert!(!context.topics[0].messages.is_empty());
        assert!(context.degraded.is_empty());
    }

    #[tokio::test]
    async fn ordinary_query_injects_no_facts() {
        let (_, assembler) = seeded().await;
        let context = assembler.assemble(&alice(), "Tell me a joke.").await;
        assert!(!context.query.is_memory_query);
        assert!(context.facts.is_empty());
        assert_eq!(context.recent.len(), 3);
    }

    #[tokio::test]
    async fn other_owner_sees_nothing() {
        let (_, assembler) = seeded().await;
        let context = assembler
            .assemble(&OwnerId::from("bob"), "What do you know about my job?")
            .await;
        assert!(context.is_empty());
        assert_eq!(assembler.assemble_formatted(&OwnerId::from("bob"), "hi").await, "");
    }

    #[tokio::test]
    async fn invalid_owner_is_empty() {
        let (_, assembler) = seeded().await;
        let context = assembler.assemble(&OwnerId::from("  "), "remember my job?").await;
        assert!(context.is_empty());
        assert!(context.degraded.is_empty());
    }

    #[tokio::test]
    async fn fact_search_goes_through_the_store() {
        let (_, assembler) = seeded().await;
        let hits = assembler.search_facts(&alice(), "google", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].fact.value.contains("Google"));
        assert_eq!(hits[0].confidence, 100);

        assert!(assembler.search_facts(&alice(), "pizza", 5).await.unwrap().is_empty());
        assert!(assembler.search_facts(&OwnerId::from(""), "google", 5).await.unwrap().is_empty());
    }

    struct BrokenFacts;

    #[async_trait]
    impl FactStore for BrokenFacts {
        fn name(&self) -> &str {
            "broken"
        }
        async fn create(&self, _: &OwnerId, _: FactCategory, _: &str) -> Result<Fact, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn list(&self, _: &OwnerId) -> Result<Vec<Fact>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn search_with_relevance(
            &self,
            _: &OwnerId,
            _: &str,
            _: usize,
        ) -> Result<Vec<(Fact, f32)>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    struct StalledTopics;

    #[async_trait]
    impl TopicStore for StalledTopics {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn get_or_create(&self, _: &str) -> Result<Topic, StoreError> {
            std::future::pending().await
        }
        async fn tag(&self, _: &str, _: &[TopicTag]) -> Result<usize, StoreError> {
            std::future::pending().await
        }
        async fn search_with_relevance(
            &self,
            _: &OwnerId,
            _: &str,
            _: usize,
        ) -> Result<Vec<(Topic, f32)>, StoreError> {
            std::future::pending().await
        }
        async fn usage(&self, _: &OwnerId) -> Result<Vec<TopicUsage>, StoreError> {
            std::future::pending().await
        }
        async fn messages_for_topic(
            &self,
            _: &OwnerId,
            _: &str,
            _: usize,
        ) -> Result<Vec<Message>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_and_slow_tiers_degrade() {
        let (store, _) = seeded().await;
        let assembler = MemoryContextAssembler::new(
            Arc::new(BrokenFacts),
            store,
            Arc::new(StalledTopics),
            &RecollectConfig::default(),
        );

        let context = assembler
            .assemble(&alice(), "Do you remember my project deadline?")
            .await;

        assert!(context.facts.is_empty());
        assert!(context.topics.is_empty());
        assert!(!context.recent.is_empty());
        let tiers: Vec<Tier> = context.degraded.iter().map(|d| d.tier).collect();
        assert_eq!(tiers, vec![Tier::Facts, Tier::Topics]);
        assert!(context.degraded[1].reason.contains("timed out"));

        let err = assembler.search_facts(&alice(), "google", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
