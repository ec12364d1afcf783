//! Relevance scoring for the three memory tiers.
//!
//! Every function here is pure: candidates and query context in, scores
//! out. Weights come from [`ScoringConfig`] so they can be tuned without a
//! rebuild. All scores are monotonic in exact keyword matches: adding a
//! query word to a candidate never lowers its score.

use chrono::{DateTime, Duration, Utc};
use recollect_config::ScoringConfig;
use recollect_core::fact::Fact;
use recollect_core::message::Message;
use recollect_core::query::QueryAnalysis;
use recollect_core::text::{content_terms, tokenize};
use recollect_core::topic::{Topic, TopicUsage};
use serde::Serialize;
use std::collections::HashMap;

/// Credit for a query term that only shares a prefix with a candidate word.
const PARTIAL_CREDIT: f32 = 0.5;
/// Shorter side of a prefix match must be at least this long ("car" never
/// partially matches "cartography").
const MIN_PREFIX_LEN: usize = 4;

/// Query-side inputs shared by every scorer, computed once per query.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Content terms of the query (stopwords removed).
    pub terms: Vec<String>,
    /// Every query token, stopwords included.
    pub tokens: Vec<String>,
    /// Topic categories extracted from the query.
    pub topics: Vec<String>,
    pub is_memory_query: bool,
}

impl ScoringContext {
    pub fn from_analysis(analysis: &QueryAnalysis) -> Self {
        Self {
            terms: content_terms(&analysis.text),
            tokens: tokenize(&analysis.text),
            topics: analysis.topics.clone(),
            is_memory_query: analysis.is_memory_query,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredFact {
    pub fact: Fact,
    /// Raw weighted score.
    pub score: f32,
    /// Score relative to the best fact in the set, 1–100.
    pub confidence: u8,
    /// Whether the query actually referenced this fact (as opposed to the
    /// memory-query floor keeping it alive).
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredTopic {
    pub topic: Topic,
    pub score: f32,
    /// Score relative to the best topic in the set, 0–100.
    pub relevance: u8,
    pub message_count: usize,
    pub last_mentioned: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredMessage {
    pub message: Message,
    /// Query coverage 0–100; `None` when ranked by recency alone.
    pub relevance: Option<u8>,
}

/// Fraction of query terms found in `text`. Whole-word matches earn full
/// credit; prefix matches ("job" / "jobs", "engineer" / "engineering")
/// earn [`PARTIAL_CREDIT`].
pub fn query_coverage(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let words = tokenize(text);
    let credit: f32 = terms
        .iter()
        .map(|term| {
            if words.iter().any(|w| w == term) {
                1.0
            } else if words.iter().any(|w| is_prefix_match(w, term)) {
                PARTIAL_CREDIT
            } else {
                0.0
            }
        })
        .sum();
    credit / terms.len() as f32
}

fn is_prefix_match(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.chars().count() >= MIN_PREFIX_LEN && long.starts_with(short)
}

/// Raw score of one fact, or `None` if it should not surface at all.
///
/// `importance × (similarity_weight × coverage + boosts)`, where boosts
/// are: the query names the fact's category, the query contains every
/// word of the fact's value, and (memory queries only) the query's topics
/// overlap the category's related topics. A fact with no signal is
/// dropped for ordinary queries and kept at the floor for memory queries.
pub fn score_fact(fact: &Fact, ctx: &ScoringContext, weights: &ScoringConfig) -> Option<(f32, bool)> {
    let importance = weights.category_weights.weight(fact.category);
    let coverage = query_coverage(&ctx.terms, &fact.value);

    let mut boosts = 0.0;
    if fact
        .category
        .aliases()
        .iter()
        .any(|alias| ctx.tokens.iter().any(|t| t == alias))
    {
        boosts += weights.category_mention_boost;
    }

    let value_terms = content_terms(&fact.value);
    if !value_terms.is_empty() && value_terms.iter().all(|v| ctx.tokens.contains(v)) {
        boosts += weights.value_mention_boost;
    }

    if ctx.is_memory_query
        && fact
            .category
            .related_topics()
            .iter()
            .any(|t| ctx.topics.iter().any(|q| q == t))
    {
        boosts += weights.topic_overlap_boost;
    }

    let raw = importance * (weights.similarity_weight * coverage + boosts);
    if raw > 0.0 {
        Some((raw, true))
    } else if ctx.is_memory_query {
        Some((importance * weights.memory_query_floor, false))
    } else {
        None
    }
}

/// Score, filter and rank facts; keep the best `limit`.
pub fn rank_facts(
    facts: Vec<Fact>,
    ctx: &ScoringContext,
    weights: &ScoringConfig,
    limit: usize,
) -> Vec<ScoredFact> {
    let mut scored: Vec<(Fact, f32, bool)> = facts
        .into_iter()
        .filter_map(|f| score_fact(&f, ctx, weights).map(|(s, m)| (f, s, m)))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.0.created_at.cmp(&a.0.created_at))
    });
    scored.truncate(limit);

    let max = scored.first().map(|(_, s, _)| *s).unwrap_or(0.0);
    scored
        .into_iter()
        .map(|(fact, score, matched)| ScoredFact {
            confidence: confidence(score, max),
            fact,
            score,
            matched,
        })
        .collect()
}

/// `round(100 × score / max)` clamped to 1–100.
pub fn confidence(score: f32, max: f32) -> u8 {
    if max <= 0.0 {
        return 1;
    }
    ((100.0 * score / max).round() as i64).clamp(1, 100) as u8
}

/// Recency multiplier in `[floor, 1]`: halves the decaying part every
/// `half_life_days`.
pub fn recency_multiplier(last: DateTime<Utc>, now: DateTime<Utc>, weights: &ScoringConfig) -> f32 {
    let days = ((now - last).num_seconds().max(0) as f32) / 86_400.0;
    let floor = weights.recency_floor.clamp(0.0, 1.0);
    floor + (1.0 - floor) * 0.5_f32.powf(days / weights.recency_half_life_days)
}

/// Score and rank the owner's topics against the query.
///
/// `fts_hits` are the topic store's full-text scores for the query.
/// Topics with neither a full-text hit nor a direct keyword match are
/// dropped.
pub fn rank_topics(
    usage: Vec<TopicUsage>,
    fts_hits: &[(Topic, f32)],
    ctx: &ScoringContext,
    weights: &ScoringConfig,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<ScoredTopic> {
    let fts: HashMap<&str, f32> = fts_hits.iter().map(|(t, s)| (t.id.as_str(), *s)).collect();
    let max_fts = fts.values().copied().fold(0.0_f32, f32::max);
    let max_count = usage.iter().map(|u| u.message_count).max().unwrap_or(0);

    let mut scored: Vec<ScoredTopic> = usage
        .into_iter()
        .filter_map(|u| {
            let fts_raw = fts.get(u.topic.id.as_str()).copied().unwrap_or(0.0);
            let overlap = keyword_overlap(&u.topic, ctx);
            if fts_raw <= 0.0 && overlap <= 0.0 {
                return None;
            }

            let fts_norm = if max_fts > 0.0 { fts_raw / max_fts } else { 0.0 };
            let frequency = if max_count > 0 {
                (1.0 + u.message_count as f32).ln() / (1.0 + max_count as f32).ln()
            } else {
                0.0
            };
            let score = recency_multiplier(u.last_mentioned, now, weights)
                * (weights.fts_weight * fts_norm
                    + weights.frequency_weight * frequency
                    + weights.keyword_weight * overlap);

            Some(ScoredTopic {
                topic: u.topic,
                score,
                relevance: 0,
                message_count: u.message_count,
                last_mentioned: u.last_mentioned,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.topic.key.cmp(&b.topic.key))
    });
    scored.truncate(limit);

    let max = scored.first().map(|t| t.score).unwrap_or(0.0);
    for topic in &mut scored {
        topic.relevance = if max > 0.0 {
            (100.0 * topic.score / max).round().clamp(0.0, 100.0) as u8
        } else {
            0
        };
    }
    scored
}

/// 1.0 when the query names the topic (as a word or an extracted topic).
fn keyword_overlap(topic: &Topic, ctx: &ScoringContext) -> f32 {
    let named = ctx.tokens.iter().any(|t| *t == topic.key)
        || ctx.topics.iter().any(|q| q.eq_ignore_ascii_case(&topic.key));
    if named { 1.0 } else { 0.0 }
}

/// Window and rank recent messages.
///
/// Messages older than `window_days` are dropped. With query terms the rest
/// are ranked by coverage (ties newest first); without, newest first.
pub fn rank_recent(
    messages: Vec<Message>,
    terms: Option<&[String]>,
    window_days: i64,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<ScoredMessage> {
    // A window reaching past the representable range keeps everything.
    let cutoff = Duration::try_days(window_days).and_then(|w| now.checked_sub_signed(w));
    let mut in_window: Vec<Message> = messages
        .into_iter()
        .filter(|m| cutoff.is_none_or(|c| m.timestamp >= c))
        .collect();
    in_window.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut ranked: Vec<ScoredMessage> = match terms.filter(|t| !t.is_empty()) {
        Some(terms) => {
            let mut scored: Vec<(Message, f32)> = in_window
                .into_iter()
                .map(|m| {
                    let c = query_coverage(terms, &m.content);
                    (m, c)
                })
                .collect();
            // Stable: equal coverage keeps newest-first order.
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored
                .into_iter()
                .map(|(message, c)| ScoredMessage {
                    message,
                    relevance: Some((c * 100.0).round().clamp(0.0, 100.0) as u8),
                })
                .collect()
        }
        None => in_window
            .into_iter()
            .map(|message| ScoredMessage { message, relevance: None })
            .collect(),
    };
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze_query;
    use recollect_core::fact::FactCategory;
    use recollect_core::message::{ConversationId, OwnerId};

    fn fact(category: FactCategory, value: &str) -> Fact {
        Fact {
            id: value.to_string(),
            owner: OwnerId::from("alice"),
            category,
            value: value.to_string(),
            created_at: Utc::now(),
        }
    }

    fn ctx(query: &str) -> ScoringContext {
        ScoringContext::from_analysis(&analyze_query(query, 5))
    }

    fn topic(key: &str) -> Topic {
        Topic {
            id: key.to_string(),
            name: key.to_string(),
            key: key.to_string(),
        }
    }

    #[test]
    fn coverage_full_partial_none() {
        let terms = vec!["engineer".to_string(), "google".to_string()];
        assert_eq!(query_coverage(&terms, "Engineer at Google"), 1.0);
        assert_eq!(query_coverage(&terms, "engineering at Google"), 0.75);
        assert_eq!(query_coverage(&terms, "baker"), 0.0);
        assert_eq!(query_coverage(&["car".to_string()], "cartography"), 0.0);
    }

    #[test]
    fn job_fact_matches_job_question() {
        let weights = ScoringConfig::default();
        let c = ctx("What do you know about my job?");
        let f = fact(FactCategory::Job, "Software Engineer at Google");
        let (score, matched) = score_fact(&f, &c, &weights).unwrap();
        assert!(matched);
        assert!(score > 0.0);
    }

    #[test]
    fn unrelated_fact_dropped_for_ordinary_query() {
        let weights = ScoringConfig::default();
        let f = fact(FactCategory::Job, "Software Engineer at Google");
        assert!(score_fact(&f, &ctx("Tell me a joke."), &weights).is_none());
    }

    #[test]
    fn unrelated_fact_floored_for_memory_query() {
        let weights = ScoringConfig::default();
        let f = fact(FactCategory::Pets, "Rex (dog)");
        let (score, matched) =
            score_fact(&f, &ctx("Do you remember what I said about the weather?"), &weights).unwrap();
        assert!(!matched);
        assert!((score - weights.memory_query_floor).abs() < 1e-6);
    }

    #[test]
    fn exact_match_never_lowers_score() {
        let weights = ScoringConfig::default();
        let c = ctx("Is my sister Sarah still in Lisbon?");
        let without = fact(FactCategory::Family, "Sarah");
        let with = fact(FactCategory::Family, "Sarah Lisbon");
        let a = score_fact(&without, &c, &weights).unwrap().0;
        let b = score_fact(&with, &c, &weights).unwrap().0;
        assert!(b >= a, "{b} < {a}");
    }

    #[test]
    fn category_importance_orders_equal_matches() {
        let weights = ScoringConfig::default();
        let c = ctx("Do you remember Porto?");
        let ranked = rank_facts(
            vec![fact(FactCategory::Hobby, "Porto"), fact(FactCategory::Job, "Porto")],
            &c,
            &weights,
            5,
        );
        assert_eq!(ranked[0].fact.category, FactCategory::Job);
        assert_eq!(ranked[0].confidence, 100);
        assert!(ranked[1].confidence < 100);
    }

    #[test]
    fn confidence_bounds() {
        assert_eq!(confidence(0.0, 0.0), 1);
        assert_eq!(confidence(0.001, 10.0), 1);
        assert_eq!(confidence(5.0, 5.0), 100);
        assert_eq!(confidence(2.5, 5.0), 50);
    }

    #[test]
    fn recency_decays_toward_floor() {
        let weights = ScoringConfig::default();
        let now = Utc::now();
        let fresh = recency_multiplier(now, now, &weights);
        let half = recency_multiplier(now - Duration::days(14), now, &weights);
        let ancient = recency_multiplier(now - Duration::days(3650), now, &weights);
        assert!((fresh - 1.0).abs() < 1e-6);
        assert!((half - 0.65).abs() < 1e-3);
        assert!(ancient >= weights.recency_floor && ancient < 0.31);
    }

    #[test]
    fn topics_need_a_signal() {
        let weights = ScoringConfig::default();
        let now = Utc::now();
        let usage = vec![
            TopicUsage { topic: topic("work"), message_count: 4, last_mentioned: now },
            TopicUsage { topic: topic("food"), message_count: 9, last_mentioned: now },
        ];
        let ranked = rank_topics(usage, &[], &ctx("How is work going?"), &weights, now, 3);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].topic.key, "work");
        assert_eq!(ranked[0].relevance, 100);
    }

    #[test]
    fn fresher_topic_wins_on_equal_signal() {
        let weights = ScoringConfig::default();
        let now = Utc::now();
        let usage = vec![
            TopicUsage {
                topic: topic("travel"),
                message_count: 2,
                last_mentioned: now - Duration::days(60),
            },
            TopicUsage { topic: topic("health"), message_count: 2, last_mentioned: now },
        ];
        let fts = vec![(topic("travel"), 1.0), (topic("health"), 1.0)];
        let ranked = rank_topics(usage, &fts, &ctx("anything"), &weights, now, 3);
        assert_eq!(ranked[0].topic.key, "health");
        assert!(ranked[1].relevance < 100);
    }

    #[test]
    fn recent_window_and_ranking() {
        let now = Utc::now();
        let owner = OwnerId::from("alice");
        let conv = ConversationId::from("c1");
        let messages = vec![
            Message::user(owner.clone(), conv.clone(), "old news about my job")
                .at(now - Duration::days(45)),
            Message::user(owner.clone(), conv.clone(), "lunch was great").at(now - Duration::hours(1)),
            Message::user(owner.clone(), conv.clone(), "new job starts monday")
                .at(now - Duration::days(2)),
        ];

        let by_recency = rank_recent(messages.clone(), None, 30, now, 10);
        assert_eq!(by_recency.len(), 2);
        assert_eq!(by_recency[0].message.content, "lunch was great");
        assert_eq!(by_recency[0].relevance, None);

        let terms = vec!["job".to_string()];
        let by_relevance = rank_recent(messages, Some(&terms), 30, now, 10);
        assert_eq!(by_relevance[0].message.content, "new job starts monday");
        assert_eq!(by_relevance[0].relevance, Some(100));
        assert_eq!(by_relevance[1].relevance, Some(0));
    }

    #[test]
    fn oversized_window_keeps_everything() {
        let now = Utc::now();
        let old = Message::user(OwnerId::from("alice"), ConversationId::from("c1"), "hello")
            .at(now - Duration::days(3650));
        for window in [i64::MAX, i64::MAX / 86_400_000] {
            let ranked = rank_recent(vec![old.clone()], None, window, now, 10);
            assert_eq!(ranked.len(), 1, "window {window}");
        }
    }
}
