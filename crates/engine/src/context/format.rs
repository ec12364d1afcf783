//! Rendering a [`MemoryContext`] into one bounded text block.
//!
//! The query subtype picks the layout through a single `match`; every
//! layout is a list of sections holding ranked items. Budget enforcement
//! is layout-agnostic: while the render is over budget, the globally
//! lowest-ranked item is removed and the block re-rendered.
//!
//! Item ranks live in `[0, 1]` so tiers compete on one scale:
//! - facts rank by confidence
//! - relevance-scored messages rank by relevance
//! - recency-only messages rank by position, capped at 0.5

use crate::context::assembler::{MemoryContext, TopicMemory};
use crate::context::token::{char_len, estimate_tokens, truncate_chars};
use crate::scoring::{ScoredFact, ScoredMessage};
use chrono::{DateTime, Utc};
use recollect_config::ContextConfig;
use recollect_core::message::Message;
use recollect_core::query::MemoryQueryKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

pub const HEADER: &str = "### Memory Context ###";

/// Longest single message line before it is cut.
const MAX_ITEM_CHARS: usize = 280;
/// Topics and messages below this relevance are left out of recall layouts.
const RECALL_MIN_RELEVANCE: u8 = 30;
/// Relevance that counts as evidence of an earlier discussion.
const EVIDENCE_RELEVANCE: u8 = 50;

const RECALL_RECENT_MAX: usize = 5;
const DEFAULT_TOPICS_MAX: usize = 3;
const DEFAULT_MESSAGES_PER_TOPIC: usize = 2;
const DEFAULT_RECENT_MAX: usize = 3;
const TIMELINE_MAX: usize = 10;

/// Size limit for a rendered context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    /// Maximum characters (Unicode scalar values).
    pub max_chars: usize,
    /// Optional maximum in estimated tokens.
    pub max_tokens: Option<usize>,
}

impl ContextBudget {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            max_chars: config.max_chars,
            max_tokens: config.max_tokens,
        }
    }

    pub fn fits(&self, text: &str) -> bool {
        char_len(text) <= self.max_chars
            && self.max_tokens.is_none_or(|t| estimate_tokens(text) <= t)
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

// ── Section model ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct Item {
    line: String,
    rank: f32,
}

#[derive(Debug)]
struct Group {
    heading: Option<String>,
    items: Vec<Item>,
}

#[derive(Debug)]
struct Section {
    heading: String,
    intro: Option<String>,
    groups: Vec<Group>,
    /// Render even with no items left.
    always: bool,
}

impl Section {
    fn new(heading: &str) -> Self {
        Self {
            heading: heading.to_string(),
            intro: None,
            groups: Vec::new(),
            always: false,
        }
    }

    fn always(mut self) -> Self {
        self.always = true;
        self
    }

    fn intro(mut self, intro: &str) -> Self {
        self.intro = Some(intro.to_string());
        self
    }

    fn items(mut self, items: Vec<Item>) -> Self {
        self.groups.push(Group {
            heading: None,
            items,
        });
        self
    }

    fn groups(mut self, groups: Vec<Group>) -> Self {
        self.groups.extend(groups);
        self
    }

    fn has_items(&self) -> bool {
        self.groups.iter().any(|g| !g.items.is_empty())
    }

    fn render(&self) -> Option<String> {
        if !self.always && !self.has_items() {
            return None;
        }
        let mut out = format!("{}\n", self.heading);
        if let Some(intro) = &self.intro {
            out.push_str(intro);
            out.push('\n');
        }
        for group in self.groups.iter().filter(|g| !g.items.is_empty()) {
            if let Some(heading) = &group.heading {
                out.push_str(heading);
                out.push('\n');
            }
            for item in &group.items {
                out.push_str("- ");
                out.push_str(&item.line);
                out.push('\n');
            }
        }
        Some(out)
    }
}

fn render(sections: &[Section]) -> String {
    let blocks: Vec<String> = sections.iter().filter_map(Section::render).collect();
    if blocks.is_empty() {
        return String::new();
    }
    let mut out = format!("{HEADER}\n\n{}", blocks.join("\n"));
    out.truncate(out.trim_end().len());
    out
}

/// Remove the lowest-ranked item; on ties the one rendered last goes.
/// Returns false when there was nothing left to remove.
fn drop_lowest(sections: &mut [Section]) -> bool {
    let mut lowest: Option<(usize, usize, usize, f32)> = None;
    for (s, section) in sections.iter().enumerate() {
        for (g, group) in section.groups.iter().enumerate() {
            for (i, item) in group.items.iter().enumerate() {
                if lowest.is_none_or(|(.., rank)| item.rank <= rank) {
                    lowest = Some((s, g, i, item.rank));
                }
            }
        }
    }
    match lowest {
        Some((s, g, i, _)) => {
            sections[s].groups[g].items.remove(i);
            true
        }
        None => false,
    }
}

// ── Entry point ───────────────────────────────────────────────────────────

/// Render `context` within `budget`.
///
/// Returns `""` when every tier is empty or when not even the section
/// scaffolding fits.
pub fn format_memory_context(context: &MemoryContext, budget: &ContextBudget) -> String {
    if context.is_empty() {
        return String::new();
    }

    let mut sections = match context.query.kind {
        Some(MemoryQueryKind::KnowledgeQuery) => knowledge_layout(context),
        Some(MemoryQueryKind::ExistenceVerification) => existence_layout(context),
        Some(MemoryQueryKind::TemporalRecall) => temporal_layout(context),
        Some(MemoryQueryKind::RecallVerification) => recall_layout(context),
        Some(MemoryQueryKind::ContentRecall) | None => default_layout(context),
    };

    let mut dropped = 0usize;
    loop {
        let text = render(&sections);
        if budget.fits(&text) {
            if dropped > 0 {
                debug!(dropped, chars = char_len(&text), "Trimmed memory context to budget");
            }
            return text;
        }
        if !drop_lowest(&mut sections) {
            debug!(max_chars = budget.max_chars, "Memory context scaffolding exceeds budget");
            return String::new();
        }
        dropped += 1;
    }
}

// ── Layouts ───────────────────────────────────────────────────────────────

fn default_layout(context: &MemoryContext) -> Vec<Section> {
    vec![
        facts_section(&context.facts),
        Section::new("## Relevant Topics").groups(topic_groups(
            context.topics.iter().take(DEFAULT_TOPICS_MAX),
            "###",
            DEFAULT_MESSAGES_PER_TOPIC,
        )),
        Section::new("## Recent Conversation")
            .items(recent_items(&context.recent, DEFAULT_RECENT_MAX, None)),
    ]
}

fn recall_layout(context: &MemoryContext) -> Vec<Section> {
    vec![facts_section(&context.facts)]
        .into_iter()
        .chain(recall_sections(context))
        .collect()
}

fn recall_sections(context: &MemoryContext) -> Vec<Section> {
    vec![
        Section::new("## Topic-Related Memories").groups(topic_groups(
            context
                .topics
                .iter()
                .filter(|t| t.scored.relevance >= RECALL_MIN_RELEVANCE),
            "###",
            usize::MAX,
        )),
        Section::new("## Recent Conversation History").items(recent_items(
            &context.recent,
            RECALL_RECENT_MAX,
            Some(RECALL_MIN_RELEVANCE),
        )),
    ]
}

fn existence_layout(context: &MemoryContext) -> Vec<Section> {
    let verification = Section::new("## Memory Verification").always();
    let mut sections = vec![facts_section(&context.facts)];

    if context.topics.is_empty() && context.recent.is_empty() {
        sections.push(verification.intro("No relevant memories found about this topic."));
        return sections;
    }

    let query_topics = &context.query.topics;
    let evidence = context.topics.iter().any(|t| {
        t.scored.relevance >= EVIDENCE_RELEVANCE
            || query_topics.iter().any(|q| q.eq_ignore_ascii_case(&t.scored.topic.key))
    }) || context
        .recent
        .iter()
        .any(|m| m.relevance.is_some_and(|r| r >= EVIDENCE_RELEVANCE));

    if evidence {
        sections.push(verification.intro(
            "Yes, we have discussed this topic before. Here are the relevant memories:",
        ));
        sections.extend(recall_sections(context));
    } else {
        sections.push(verification.intro("No, we haven't discussed this topic in detail before."));
    }
    sections
}

fn temporal_layout(context: &MemoryContext) -> Vec<Section> {
    let now = context.generated_at;
    let mut seen = HashSet::new();
    let mut entries: Vec<(&Message, Option<&str>)> = Vec::new();
    for m in &context.recent {
        if seen.insert(m.message.id.as_str()) {
            entries.push((&m.message, None));
        }
    }
    for t in &context.topics {
        for m in &t.messages {
            if seen.insert(m.id.as_str()) {
                entries.push((m, Some(t.scored.topic.name.as_str())));
            }
        }
    }
    entries.sort_by(|a, b| b.0.timestamp.cmp(&a.0.timestamp));
    entries.truncate(TIMELINE_MAX);

    let n = entries.len().max(1) as f32;
    let items = entries
        .into_iter()
        .enumerate()
        .map(|(i, (m, topic))| {
            let topic = topic.map(|t| format!(" (Topic: {t})")).unwrap_or_default();
            Item {
                line: format!(
                    "{} ({}){}: {}",
                    format_timestamp(m.timestamp),
                    relative_age(m.timestamp, now),
                    topic,
                    message_line(&m.content)
                ),
                rank: 1.0 - i as f32 / n,
            }
        })
        .collect();

    vec![
        facts_section(&context.facts),
        Section::new("## Conversation Timeline").items(items),
    ]
}

fn knowledge_layout(context: &MemoryContext) -> Vec<Section> {
    let query_topics = &context.query.topics;
    let facts: Vec<&ScoredFact> = context
        .facts
        .iter()
        .filter(|f| {
            query_topics.is_empty()
                || f.matched
                || f.fact
                    .category
                    .related_topics()
                    .iter()
                    .any(|t| query_topics.iter().any(|q| q == t))
        })
        .collect();

    let topics: Vec<&TopicMemory> = context
        .topics
        .iter()
        .filter(|t| {
            t.scored.relevance >= RECALL_MIN_RELEVANCE
                || query_topics.iter().any(|q| q.eq_ignore_ascii_case(&t.scored.topic.key))
        })
        .collect();

    let mut overview = Section::new("## Knowledge About User").always();
    if facts.is_empty() && topics.iter().all(|t| t.messages.is_empty()) {
        overview = overview.intro("I don't have much information about this topic yet.");
    }

    vec![
        overview,
        Section::new("### Known Facts").items(facts.into_iter().map(fact_item).collect()),
        Section::new("### Related Conversations").groups(topic_groups(
            topics.into_iter(),
            "####",
            usize::MAX,
        )),
    ]
}

// ── Items ─────────────────────────────────────────────────────────────────

fn facts_section(facts: &[ScoredFact]) -> Section {
    Section::new("## User Facts").items(facts.iter().map(fact_item).collect())
}

fn fact_item(f: &ScoredFact) -> Item {
    Item {
        line: format!(
            "{}: {} {}",
            f.fact.category.label(),
            f.fact.value,
            stars(f.confidence)
        ),
        rank: f32::from(f.confidence) / 100.0,
    }
}

fn topic_groups<'a>(
    topics: impl Iterator<Item = &'a TopicMemory>,
    level: &str,
    per_topic: usize,
) -> Vec<Group> {
    topics
        .map(|t| {
            let base = f32::from(t.scored.relevance) / 100.0;
            Group {
                heading: Some(format!("{level} {}", t.scored.topic.name)),
                items: t
                    .messages
                    .iter()
                    .take(per_topic)
                    .enumerate()
                    .map(|(i, m)| Item {
                        line: message_line(&m.content),
                        rank: (base - 0.01 * i as f32).max(0.0),
                    })
                    .collect(),
            }
        })
        .collect()
}

/// Recent messages as items. With `min_relevance`, messages scored below
/// it are skipped (recency-only messages always pass).
fn recent_items(recent: &[ScoredMessage], max: usize, min_relevance: Option<u8>) -> Vec<Item> {
    let kept: Vec<&ScoredMessage> = recent
        .iter()
        .filter(|m| match (m.relevance, min_relevance) {
            (Some(r), Some(min)) => r >= min,
            _ => true,
        })
        .take(max)
        .collect();

    let n = kept.len().max(1) as f32;
    kept.into_iter()
        .enumerate()
        .map(|(i, m)| Item {
            line: message_line(&m.message.content),
            rank: match m.relevance {
                Some(r) => f32::from(r) / 100.0,
                None => 0.5 * (1.0 - i as f32 / n),
            },
        })
        .collect()
}

fn message_line(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, MAX_ITEM_CHARS)
}

/// One to five stars: one plus one per full 20 points of confidence.
pub fn stars(confidence: u8) -> String {
    "★".repeat(1 + usize::from(confidence / 20).min(4))
}

/// "Mar 05, 2026 at 02:30 PM"
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%b %d, %Y at %I:%M %p").to_string()
}

/// Coarse age of `ts` relative to `now`.
pub fn relative_age(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - ts).num_days();
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };
    match days {
        i64::MIN..=0 => "today".to_string(),
        1 => "yesterday".to_string(),
        2..=6 => plural(days, "day"),
        7..=29 => plural(days / 7, "week"),
        30..=364 => plural(days / 30, "month"),
        _ => plural(days / 365, "year"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::analyze_query;
    use crate::scoring::ScoredTopic;
    use chrono::{Duration, TimeZone};
    use recollect_core::fact::{Fact, FactCategory};
    use recollect_core::message::{ConversationId, OwnerId};
    use recollect_core::topic::Topic;

    fn owner() -> OwnerId {
        OwnerId::from("alice")
    }

    fn scored_fact(category: FactCategory, value: &str, confidence: u8) -> ScoredFact {
        ScoredFact {
            fact: Fact {
                id: value.to_string(),
                owner: owner(),
                category,
                value: value.to_string(),
                created_at: Utc::now(),
            },
            score: f32::from(confidence),
            confidence,
            matched: true,
        }
    }

    fn message(content: &str, age: Duration) -> Message {
        Message::user(owner(), ConversationId::from("c1"), content).at(Utc::now() - age)
    }

    fn topic_memory(key: &str, relevance: u8, messages: Vec<Message>) -> TopicMemory {
        TopicMemory {
            scored: ScoredTopic {
                topic: Topic {
                    id: key.to_string(),
                    name: key.to_string(),
                    key: key.to_string(),
                },
                score: f32::from(relevance),
                relevance,
                message_count: messages.len(),
                last_mentioned: Utc::now(),
            },
            messages,
        }
    }

    fn context(query: &str) -> MemoryContext {
        MemoryContext::empty(owner(), analyze_query(query, 3))
    }

    #[test]
    fn empty_context_renders_nothing() {
        let ctx = context("What do you know about my job?");
        assert_eq!(format_memory_context(&ctx, &ContextBudget::default()), "");
    }

    #[test]
    fn knowledge_layout_lists_known_facts() {
        let mut ctx = context("What do you know about my job?");
        ctx.facts = vec![scored_fact(FactCategory::Job, "Software Engineer at Google", 100)];
        ctx.topics = vec![topic_memory(
            "work",
            100,
            vec![message("My boss moved the deadline", Duration::hours(2))],
        )];

        let out = format_memory_context(&ctx, &ContextBudget::default());
        assert!(out.starts_with(HEADER));
        assert!(out.contains("## Knowledge About User"));
        assert!(out.contains("### Known Facts\n- Job: Software Engineer at Google ★★★★★"));
        assert!(out.contains("### Related Conversations\n#### work\n- My boss moved the deadline"));
        assert!(!out.contains("I don't have much information"));
    }

    #[test]
    fn default_layout_for_ordinary_queries() {
        let mut ctx = context("Tell me a joke.");
        ctx.recent = vec![ScoredMessage {
            message: message("hello there", Duration::minutes(5)),
            relevance: None,
        }];
        let out = format_memory_context(&ctx, &ContextBudget::default());
        assert_eq!(out, format!("{HEADER}\n\n## Recent Conversation\n- hello there"));
    }

    #[test]
    fn existence_yes_and_no() {
        let mut ctx = context("Have we talked about my health before?");
        ctx.topics = vec![topic_memory(
            "health",
            80,
            vec![message("My doctor said I need more sleep", Duration::days(3))],
        )];
        let out = format_memory_context(&ctx, &ContextBudget::default());
        assert!(out.contains("Yes, we have discussed this topic before."));
        assert!(out.contains("### health\n- My doctor said I need more sleep"));

        let mut ctx = context("Have we talked about my health before?");
        ctx.recent = vec![ScoredMessage {
            message: message("lunch was fine", Duration::hours(1)),
            relevance: Some(0),
        }];
        let out = format_memory_context(&ctx, &ContextBudget::default());
        assert!(out.contains("No, we haven't discussed this topic in detail before."));
        assert!(!out.contains("lunch"));
    }

    #[test]
    fn recall_layout_filters_weak_items() {
        let mut ctx = context("Do you remember my dog?");
        ctx.topics = vec![
            topic_memory("family", 100, vec![message("Rex chewed my shoe", Duration::days(1))]),
            topic_memory("food", 10, vec![message("pizza night", Duration::days(1))]),
        ];
        ctx.recent = vec![
            ScoredMessage {
                message: message("my dog Rex is sick", Duration::hours(3)),
                relevance: Some(100),
            },
            ScoredMessage {
                message: message("nice weather", Duration::hours(1)),
                relevance: Some(0),
            },
        ];
        let out = format_memory_context(&ctx, &ContextBudget::default());
        assert!(out.contains("## Topic-Related Memories\n### family\n- Rex chewed my shoe"));
        assert!(!out.contains("pizza"));
        assert!(out.contains("## Recent Conversation History\n- my dog Rex is sick"));
        assert!(!out.contains("nice weather"));
    }

    #[test]
    fn temporal_layout_renders_timestamps_newest_first() {
        let mut ctx = context("What did I say last week?");
        let older = message("planning the road trip", Duration::days(6));
        let newer = message("booked the hotel", Duration::days(1));
        ctx.generated_at = Utc::now();
        ctx.recent = vec![ScoredMessage {
            message: newer,
            relevance: Some(0),
        }];
        ctx.topics = vec![topic_memory("travel", 100, vec![older])];

        let out = format_memory_context(&ctx, &ContextBudget::default());
        let hotel = out.find("booked the hotel").unwrap();
        let trip = out.find("(Topic: travel): planning the road trip").unwrap();
        assert!(out.contains("## Conversation Timeline"));
        assert!(hotel < trip);
        assert!(out.contains("(yesterday)"));
        assert!(out.contains("(6 days ago)"));
    }

    #[test]
    fn tight_budget_drops_lowest_first() {
        let mut ctx = context("Do you remember Lisbon?");
        ctx.facts = (1..=10u8)
            .map(|i| scored_fact(FactCategory::Location, &format!("place number {i}"), i * 10))
            .collect();

        let full = format_memory_context(&ctx, &ContextBudget::new(10_000));
        let budget = ContextBudget::new(char_len(&full) / 2);
        let out = format_memory_context(&ctx, &budget);

        assert!(char_len(&out) <= budget.max_chars);
        assert!(out.contains("place number 10 "));
        assert!(!out.contains("place number 1 "));
        assert!(!out.contains("place number 2 "));
    }

    #[test]
    fn token_budget_is_respected() {
        let mut ctx = context("Tell me a joke.");
        ctx.recent = (0..20)
            .map(|i| ScoredMessage {
                message: message(&format!("message {i} with some padding text"), Duration::minutes(i)),
                relevance: None,
            })
            .collect();
        let budget = ContextBudget::new(10_000).with_max_tokens(30);
        let out = format_memory_context(&ctx, &budget);
        assert!(estimate_tokens(&out) <= 30);
        assert!(out.contains("message 0 "));
    }

    #[test]
    fn budget_below_scaffolding_yields_empty() {
        let mut ctx = context("What do you know about my job?");
        ctx.facts = vec![scored_fact(FactCategory::Job, "Baker", 100)];
        assert_eq!(format_memory_context(&ctx, &ContextBudget::new(10)), "");
    }

    #[test]
    fn long_messages_are_cut() {
        let line = message_line(&"word ".repeat(200));
        assert_eq!(char_len(&line), MAX_ITEM_CHARS);
        assert!(line.ends_with('…'));
    }

    #[test]
    fn star_scale() {
        assert_eq!(stars(1), "★");
        assert_eq!(stars(19), "★");
        assert_eq!(stars(20), "★★");
        assert_eq!(stars(79), "★★★★");
        assert_eq!(stars(100), "★★★★★");
    }

    #[test]
    fn timestamps() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
        assert_eq!(format_timestamp(ts), "Mar 05, 2026 at 02:30 PM");
        assert_eq!(relative_age(ts, ts), "today");
        assert_eq!(relative_age(ts, ts + Duration::days(1)), "yesterday");
        assert_eq!(relative_age(ts, ts + Duration::days(14)), "2 weeks ago");
        assert_eq!(relative_age(ts, ts + Duration::days(31)), "1 month ago");
        assert_eq!(relative_age(ts, ts + Duration::days(800)), "2 years ago");
    }
}
