//! SQLite store with FTS5 full-text search over messages.
//!
//! Tables:
//! - `facts`: one row per (owner, category, normalized value)
//! - `messages`: raw conversation messages
//! - `messages_fts`: FTS5 virtual table for ranked keyword search (BM25)
//! - `topics`: topic catalog, unique by lower-cased name
//! - `message_topics`: many-to-many message/topic associations
//!
//! Triggers keep the FTS index in sync on insert/delete/update.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use recollect_core::error::StoreError;
use recollect_core::fact::{normalize_value, Fact, FactCategory};
use recollect_core::message::{ConversationId, Message, OwnerId, Role};
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use recollect_core::text::{content_terms, term_coverage};
use recollect_core::topic::{Topic, TopicTag, TopicUsage};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite store implementing the fact, message and topic tiers.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: &[(&str, &str)] = &[
            (
                "facts table",
                r#"
                CREATE TABLE IF NOT EXISTS facts (
                    id          TEXT PRIMARY KEY,
                    owner_id    TEXT NOT NULL,
                    category    TEXT NOT NULL,
                    value       TEXT NOT NULL,
                    value_key   TEXT NOT NULL,
                    created_at  TEXT NOT NULL,
                    UNIQUE(owner_id, category, value_key)
                )
                "#,
            ),
            (
                "messages table",
                r#"
                CREATE TABLE IF NOT EXISTS messages (
                    iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                    id              TEXT UNIQUE NOT NULL,
                    owner_id        TEXT NOT NULL,
                    conversation_id TEXT NOT NULL,
                    role            TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    timestamp       TEXT NOT NULL
                )
                "#,
            ),
            (
                "FTS5 table",
                r#"
                CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
                    content,
                    content='messages',
                    content_rowid='iid',
                    tokenize='porter unicode61'
                )
                "#,
            ),
            (
                "insert trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
                    INSERT INTO messages_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "delete trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
                    INSERT INTO messages_fts(messages_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                END
                "#,
            ),
            (
                "update trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
                    INSERT INTO messages_fts(messages_fts, rowid, content)
                    VALUES ('delete', old.iid, old.content);
                    INSERT INTO messages_fts(rowid, content) VALUES (new.iid, new.content);
                END
                "#,
            ),
            (
                "topics table",
                r#"
                CREATE TABLE IF NOT EXISTS topics (
                    id    TEXT PRIMARY KEY,
                    name  TEXT NOT NULL,
                    key   TEXT UNIQUE NOT NULL
                )
                "#,
            ),
            (
                "message_topics table",
                r#"
                CREATE TABLE IF NOT EXISTS message_topics (
                    message_id  TEXT NOT NULL,
                    topic_id    TEXT NOT NULL REFERENCES topics(id),
                    relevance   REAL,
                    created_at  TEXT NOT NULL,
                    PRIMARY KEY (message_id, topic_id)
                )
                "#,
            ),
            (
                "messages owner index",
                "CREATE INDEX IF NOT EXISTS idx_messages_owner_ts ON messages(owner_id, timestamp DESC)",
            ),
            (
                "facts owner index",
                "CREATE INDEX IF NOT EXISTS idx_facts_owner ON facts(owner_id)",
            ),
        ];

        for (label, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{label}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    /// Fixed-width timestamps so text ordering matches time ordering.
    fn format_ts(ts: &DateTime<Utc>) -> String {
        ts.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn column<T>(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    fn row_to_fact(row: &sqlx::sqlite::SqliteRow) -> Result<Fact, StoreError> {
        let category: String = Self::column(row, "category")?;
        let category = FactCategory::parse(&category)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown category '{category}'")))?;
        let created_at: String = Self::column(row, "created_at")?;

        Ok(Fact {
            id: Self::column(row, "id")?,
            owner: OwnerId(Self::column(row, "owner_id")?),
            category,
            value: Self::column(row, "value")?,
            created_at: Self::parse_ts(&created_at),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let role: String = Self::column(row, "role")?;
        let role = Role::parse(&role)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown role '{role}'")))?;
        let timestamp: String = Self::column(row, "timestamp")?;

        Ok(Message {
            id: Self::column(row, "id")?,
            owner: OwnerId(Self::column(row, "owner_id")?),
            conversation_id: ConversationId(Self::column(row, "conversation_id")?),
            role,
            content: Self::column(row, "content")?,
            timestamp: Self::parse_ts(&timestamp),
        })
    }

    fn row_to_topic(row: &sqlx::sqlite::SqliteRow) -> Result<Topic, StoreError> {
        Ok(Topic {
            id: Self::column(row, "id")?,
            name: Self::column(row, "name")?,
            key: Self::column(row, "key")?,
        })
    }

    /// Build a safe FTS5 query from user text.
    ///
    /// Content terms are quoted to prevent injection and OR-joined so any
    /// matching term contributes to the BM25 rank. Whole tokens only.
    fn sanitize_fts_query(text: &str) -> String {
        content_terms(text)
            .into_iter()
            .map(|w| {
                let clean: String = w.chars().filter(|c| c.is_alphanumeric()).collect();
                clean
            })
            .filter(|w| !w.is_empty())
            .map(|w| format!("\"{w}\""))
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Owner-scoped FTS hits as (message id, positive score).
    async fn fts_hits(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(sqlx::sqlite::SqliteRow, f32)>, StoreError> {
        let fts_query = Self::sanitize_fts_query(query_text);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT m.*, bm25(messages_fts) AS rank
            FROM messages_fts f
            JOIN messages m ON m.iid = f.rowid
            WHERE messages_fts MATCH ?1 AND m.owner_id = ?2
            ORDER BY rank
            LIMIT ?3
            "#,
        )
        .bind(&fts_query)
        .bind(owner.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FTS5 search: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                // bm25() is negative (lower = better); flip it and keep it
                // strictly positive so every match counts as a signal.
                let rank: f64 = row.try_get("rank").unwrap_or(0.0);
                let score = ((-rank) as f32).max(f32::MIN_POSITIVE);
                (row, score)
            })
            .collect())
    }

    /// Total number of stored facts across all owners.
    pub async fn fact_count(&self) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM facts")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("COUNT: {e}")))?;
        let cnt: i64 = Self::column(&row, "cnt")?;
        Ok(cnt as usize)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl FactStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(
        &self,
        owner: &OwnerId,
        category: FactCategory,
        value: &str,
    ) -> Result<Fact, StoreError> {
        let fact = Fact {
            id: Uuid::new_v4().to_string(),
            owner: owner.clone(),
            category,
            value: value.trim().to_string(),
            created_at: Utc::now(),
        };
        let key = normalize_value(value);

        // The UNIQUE constraint arbitrates concurrent creators.
        sqlx::query(
            r#"
            INSERT INTO facts (id, owner_id, category, value, value_key, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&fact.id)
        .bind(owner.as_str())
        .bind(category.as_str())
        .bind(&fact.value)
        .bind(&key)
        .bind(Self::format_ts(&fact.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("{category}:{key}"))
            } else {
                StoreError::QueryFailed(format!("INSERT fact failed: {e}"))
            }
        })?;

        debug!(category = %category, "Stored fact {}", fact.id);
        Ok(fact)
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Fact>, StoreError> {
        let rows = sqlx::query("SELECT * FROM facts WHERE owner_id = ?1 ORDER BY created_at")
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list facts: {e}")))?;
        rows.iter().map(Self::row_to_fact).collect()
    }

    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Fact, f32)>, StoreError> {
        // Fact sets are small per owner; rank in process.
        let terms = content_terms(query_text);
        let mut results: Vec<(Fact, f32)> = self
            .list(owner)
            .await?
            .into_iter()
            .map(|f| {
                let haystack = format!("{} {}", f.category.as_str(), f.value);
                let score = term_coverage(&terms, &haystack);
                (f, score)
            })
            .filter(|(_, score)| *score > 0.0)
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, message: Message) -> Result<Message, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, owner_id, conversation_id, role, content, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&message.id)
        .bind(message.owner.as_str())
        .bind(message.conversation_id.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(Self::format_ts(&message.timestamp))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Duplicate(format!("message {}", message.id))
            } else {
                StoreError::QueryFailed(format!("INSERT message failed: {e}"))
            }
        })?;

        debug!("Stored message {}", message.id);
        Ok(message)
    }

    async fn recent(
        &self,
        owner: &OwnerId,
        conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = match conversation {
            Some(conv) => {
                sqlx::query(
                    r#"
                    SELECT * FROM messages
                    WHERE owner_id = ?1 AND conversation_id = ?2
                    ORDER BY timestamp DESC, iid DESC
                    LIMIT ?3
                    "#,
                )
                .bind(owner.as_str())
                .bind(conv.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT * FROM messages
                    WHERE owner_id = ?1
                    ORDER BY timestamp DESC, iid DESC
                    LIMIT ?2
                    "#,
                )
                .bind(owner.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| StoreError::QueryFailed(format!("recent messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn search(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Message, f32)>, StoreError> {
        self.fts_hits(owner, query_text, limit)
            .await?
            .iter()
            .map(|(row, score)| Ok((Self::row_to_message(row)?, *score)))
            .collect()
    }
}

#[async_trait]
impl TopicStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_or_create(&self, name: &str) -> Result<Topic, StoreError> {
        let key = Topic::key_for(name);
        if key.is_empty() {
            return Err(StoreError::QueryFailed("topic name is empty".into()));
        }

        sqlx::query("INSERT INTO topics (id, name, key) VALUES (?1, ?2, ?3) ON CONFLICT(key) DO NOTHING")
            .bind(Uuid::new_v4().to_string())
            .bind(&key)
            .bind(&key)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("INSERT topic failed: {e}")))?;

        let row = sqlx::query("SELECT * FROM topics WHERE key = ?1")
            .bind(&key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET topic: {e}")))?;
        Self::row_to_topic(&row)
    }

    async fn tag(&self, message_id: &str, topics: &[TopicTag]) -> Result<usize, StoreError> {
        let now = Self::format_ts(&Utc::now());
        let mut created = 0;
        for tag in topics {
            let result = sqlx::query(
                r#"
                INSERT INTO message_topics (message_id, topic_id, relevance, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(message_id, topic_id) DO NOTHING
                "#,
            )
            .bind(message_id)
            .bind(&tag.topic_id)
            .bind(tag.relevance)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("INSERT message_topic failed: {e}")))?;
            created += result.rows_affected() as usize;
        }
        Ok(created)
    }

    async fn search_with_relevance(
        &self,
        owner: &OwnerId,
        query_text: &str,
        limit: usize,
    ) -> Result<Vec<(Topic, f32)>, StoreError> {
        // Over-fetch message hits, then sum their scores per topic.
        let hits = self.fts_hits(owner, query_text, limit.max(1) * 20).await?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_message: HashMap<String, f32> = HashMap::new();
        for (row, score) in &hits {
            let id: String = Self::column(row, "id")?;
            per_message.insert(id, *score);
        }

        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.key, mt.message_id
            FROM message_topics mt
            JOIN topics t ON t.id = mt.topic_id
            JOIN messages m ON m.id = mt.message_id
            WHERE m.owner_id = ?1
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("topic associations: {e}")))?;

        let mut totals: HashMap<String, (Topic, f32)> = HashMap::new();
        for row in &rows {
            let message_id: String = Self::column(row, "message_id")?;
            let Some(score) = per_message.get(&message_id) else {
                continue;
            };
            let topic = Self::row_to_topic(row)?;
            totals
                .entry(topic.id.clone())
                .or_insert_with(|| (topic, 0.0))
                .1 += *score;
        }

        let mut results: Vec<(Topic, f32)> = totals.into_values().collect();
        results.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.key.cmp(&b.0.key))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn usage(&self, owner: &OwnerId) -> Result<Vec<TopicUsage>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.key,
                   COUNT(m.id) AS message_count,
                   MAX(m.timestamp) AS last_mentioned
            FROM message_topics mt
            JOIN topics t ON t.id = mt.topic_id
            JOIN messages m ON m.id = mt.message_id
            WHERE m.owner_id = ?1
            GROUP BY t.id, t.name, t.key
            ORDER BY t.key
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("topic usage: {e}")))?;

        rows.iter()
            .map(|row| {
                let count: i64 = Self::column(row, "message_count")?;
                let last: String = Self::column(row, "last_mentioned")?;
                Ok(TopicUsage {
                    topic: Self::row_to_topic(row)?,
                    message_count: count as usize,
                    last_mentioned: Self::parse_ts(&last),
                })
            })
            .collect()
    }

    async fn messages_for_topic(
        &self,
        owner: &OwnerId,
        topic_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT m.*
            FROM message_topics mt
            JOIN messages m ON m.id = mt.message_id
            WHERE m.owner_id = ?1 AND mt.topic_id = ?2
            ORDER BY m.timestamp DESC, m.iid DESC
            LIMIT ?3
            "#,
        )
        .bind(owner.as_str())
        .bind(topic_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("topic messages: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }
}
