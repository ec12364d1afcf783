//! Configuration loading, validation, and management for Recollect.
//!
//! Loads configuration from `~/.recollect/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Every scoring weight is a tunable parameter, not a derived constant:
//! the defaults are a reasonable starting point to be validated against
//! representative data.

use recollect_core::fact::FactCategory;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.recollect/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecollectConfig {
    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-tier retrieval limits and timeouts
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Relevance scoring weights
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Rendered context budget
    #[serde(default)]
    pub context: ContextConfig,

    /// Write-path extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite", "memory" or "none"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// SQLite database path. Defaults to `~/.recollect/recollect.sqlite`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Tier 1: maximum facts in the context
    #[serde(default = "default_fact_limit")]
    pub fact_limit: usize,

    /// Tier 2: maximum recent messages in the context
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Tier 3: maximum topics in the context
    #[serde(default = "default_topic_limit")]
    pub topic_limit: usize,

    /// Tier 3: messages shown per topic
    #[serde(default = "default_messages_per_topic")]
    pub messages_per_topic: usize,

    /// Tier 2 recency window
    #[serde(default = "default_recency_window_days")]
    pub recency_window_days: i64,

    /// Per-tier storage timeout; a timed-out tier is treated as empty
    #[serde(default = "default_tier_timeout_ms")]
    pub tier_timeout_ms: u64,
}

fn default_fact_limit() -> usize {
    5
}
fn default_recent_limit() -> usize {
    10
}
fn default_topic_limit() -> usize {
    3
}
fn default_messages_per_topic() -> usize {
    3
}
/// Upper bound for `retrieval.recency_window_days`, in days.
pub const MAX_RECENCY_WINDOW_DAYS: i64 = 36_500;

fn default_recency_window_days() -> i64 {
    30
}
fn default_tier_timeout_ms() -> u64 {
    1500
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fact_limit: default_fact_limit(),
            recent_limit: default_recent_limit(),
            topic_limit: default_topic_limit(),
            messages_per_topic: default_messages_per_topic(),
            recency_window_days: default_recency_window_days(),
            tier_timeout_ms: default_tier_timeout_ms(),
        }
    }
}

/// Static importance weight per fact category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_job_weight")]
    pub job: f32,
    #[serde(default = "default_family_weight")]
    pub family: f32,
    #[serde(default = "default_location_weight")]
    pub location: f32,
    #[serde(default = "default_education_weight")]
    pub education: f32,
    #[serde(default = "default_hobby_weight")]
    pub hobby: f32,
    #[serde(default = "default_preferences_weight")]
    pub preferences: f32,
    #[serde(default = "default_pets_weight")]
    pub pets: f32,
}

fn default_job_weight() -> f32 {
    1.5
}
fn default_family_weight() -> f32 {
    1.4
}
fn default_location_weight() -> f32 {
    1.3
}
fn default_education_weight() -> f32 {
    1.25
}
fn default_hobby_weight() -> f32 {
    1.2
}
fn default_preferences_weight() -> f32 {
    1.1
}
fn default_pets_weight() -> f32 {
    1.0
}

impl CategoryWeights {
    pub fn weight(&self, category: FactCategory) -> f32 {
        match category {
            FactCategory::Job => self.job,
            FactCategory::Family => self.family,
            FactCategory::Location => self.location,
            FactCategory::Education => self.education,
            FactCategory::Hobby => self.hobby,
            FactCategory::Preferences => self.preferences,
            FactCategory::Pets => self.pets,
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            job: default_job_weight(),
            family: default_family_weight(),
            location: default_location_weight(),
            education: default_education_weight(),
            hobby: default_hobby_weight(),
            preferences: default_preferences_weight(),
            pets: default_pets_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub category_weights: CategoryWeights,

    // --- Fact scoring ---
    #[serde(default = "default_similarity_weight")]
    pub similarity_weight: f32,

    /// Added when the query names the fact's category
    #[serde(default = "default_category_mention_boost")]
    pub category_mention_boost: f32,

    /// Added when the query contains the fact's value
    #[serde(default = "default_value_mention_boost")]
    pub value_mention_boost: f32,

    /// Added for memory queries when the fact relates to a query topic
    #[serde(default = "default_topic_overlap_boost")]
    pub topic_overlap_boost: f32,

    /// Relevance given to otherwise unmatched facts on memory queries
    #[serde(default = "default_memory_query_floor")]
    pub memory_query_floor: f32,

    // --- Topic scoring ---
    #[serde(default = "default_fts_weight")]
    pub fts_weight: f32,

    #[serde(default = "default_frequency_weight")]
    pub frequency_weight: f32,

    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Days after which a topic's recency multiplier has decayed halfway
    #[serde(default = "default_recency_half_life_days")]
    pub recency_half_life_days: f32,

    /// Lower bound of the recency multiplier
    #[serde(default = "default_recency_floor")]
    pub recency_floor: f32,
}

fn default_similarity_weight() -> f32 {
    1.0
}
fn default_category_mention_boost() -> f32 {
    1.0
}
fn default_value_mention_boost() -> f32 {
    1.5
}
fn default_topic_overlap_boost() -> f32 {
    0.5
}
fn default_memory_query_floor() -> f32 {
    0.1
}
fn default_fts_weight() -> f32 {
    0.5
}
fn default_frequency_weight() -> f32 {
    0.2
}
fn default_keyword_weight() -> f32 {
    0.3
}
fn default_recency_half_life_days() -> f32 {
    14.0
}
fn default_recency_floor() -> f32 {
    0.3
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            category_weights: CategoryWeights::default(),
            similarity_weight: default_similarity_weight(),
            category_mention_boost: default_category_mention_boost(),
            value_mention_boost: default_value_mention_boost(),
            topic_overlap_boost: default_topic_overlap_boost(),
            memory_query_floor: default_memory_query_floor(),
            fts_weight: default_fts_weight(),
            frequency_weight: default_frequency_weight(),
            keyword_weight: default_keyword_weight(),
            recency_half_life_days: default_recency_half_life_days(),
            recency_floor: default_recency_floor(),
        }
    }
}

impl ScoringConfig {
    fn weights(&self) -> impl Iterator<Item = (&'static str, f32)> {
        let c = &self.category_weights;
        [
            ("category_weights.job", c.job),
            ("category_weights.family", c.family),
            ("category_weights.location", c.location),
            ("category_weights.education", c.education),
            ("category_weights.hobby", c.hobby),
            ("category_weights.preferences", c.preferences),
            ("category_weights.pets", c.pets),
            ("similarity_weight", self.similarity_weight),
            ("category_mention_boost", self.category_mention_boost),
            ("value_mention_boost", self.value_mention_boost),
            ("topic_overlap_boost", self.topic_overlap_boost),
            ("memory_query_floor", self.memory_query_floor),
            ("fts_weight", self.fts_weight),
            ("frequency_weight", self.frequency_weight),
            ("keyword_weight", self.keyword_weight),
            ("recency_floor", self.recency_floor),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard cap on the rendered context, in characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Optional additional cap in estimated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_max_chars() -> usize {
    2000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Topics tagged onto each ingested message
    #[serde(default = "default_topic_top_n")]
    pub topic_top_n: usize,

    /// Run fact extraction on assistant messages too
    #[serde(default)]
    pub extract_from_assistant: bool,
}

fn default_topic_top_n() -> usize {
    3
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            topic_top_n: default_topic_top_n(),
            extract_from_assistant: false,
        }
    }
}

impl RecollectConfig {
    /// Load configuration from the default location.
    ///
    /// `RECOLLECT_CONFIG` overrides the file path. Environment variables
    /// override individual settings:
    /// - `RECOLLECT_DB_PATH`
    /// - `RECOLLECT_CONTEXT_MAX_CHARS`
    /// - `RECOLLECT_TIER_TIMEOUT_MS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var("RECOLLECT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"));
        let mut config = Self::load_from(&config_path)?;

        if let Ok(path) = std::env::var("RECOLLECT_DB_PATH") {
            config.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(raw) = std::env::var("RECOLLECT_CONTEXT_MAX_CHARS") {
            config.context.max_chars = parse_env("RECOLLECT_CONTEXT_MAX_CHARS", &raw)?;
        }

        if let Ok(raw) = std::env::var("RECOLLECT_TIER_TIMEOUT_MS") {
            config.retrieval.tier_timeout_ms = parse_env("RECOLLECT_TIER_TIMEOUT_MS", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".recollect")
    }

    /// The SQLite database path, explicit or defaulted.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("recollect.sqlite"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.storage.backend.as_str(), "sqlite" | "memory" | "none") {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be \"sqlite\", \"memory\" or \"none\", got {:?}",
                self.storage.backend
            )));
        }

        let r = &self.retrieval;
        if r.fact_limit == 0 || r.recent_limit == 0 || r.topic_limit == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval limits must be > 0".into(),
            ));
        }
        if !(1..=MAX_RECENCY_WINDOW_DAYS).contains(&r.recency_window_days) {
            return Err(ConfigError::ValidationError(format!(
                "retrieval.recency_window_days must be between 1 and {MAX_RECENCY_WINDOW_DAYS}"
            )));
        }
        if r.tier_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.tier_timeout_ms must be > 0".into(),
            ));
        }

        if let Some((name, value)) = self
            .scoring
            .weights()
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "scoring.{name} must be a non-negative number, got {value}"
            )));
        }
        if self.scoring.recency_floor > 1.0 {
            return Err(ConfigError::ValidationError(
                "scoring.recency_floor must be <= 1.0".into(),
            ));
        }
        if !(self.scoring.recency_half_life_days > 0.0) {
            return Err(ConfigError::ValidationError(
                "scoring.recency_half_life_days must be > 0".into(),
            ));
        }

        if self.context.max_chars == 0 || self.context.max_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "context budget must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::ValidationError(format!("{name} has invalid value {raw:?}")))
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RecollectConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.recency_window_days, 30);
        assert_eq!(config.retrieval.fact_limit, 5);
        assert_eq!(config.context.max_chars, 2000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = RecollectConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: RecollectConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.storage.backend, config.storage.backend);
        assert_eq!(parsed.retrieval.tier_timeout_ms, config.retrieval.tier_timeout_ms);
        assert_eq!(parsed.scoring.category_weights.job, 1.5);
    }

    #[test]
    fn job_outranks_hobby_by_default() {
        let weights = CategoryWeights::default();
        assert!(weights.weight(FactCategory::Job) > weights.weight(FactCategory::Hobby));
        assert!(weights.weight(FactCategory::Family) > weights.weight(FactCategory::Hobby));
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = RecollectConfig::default();
        config.scoring.keyword_weight = -0.1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keyword_weight"));
    }

    #[test]
    fn zero_budget_rejected() {
        let mut config = RecollectConfig::default();
        config.context.max_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn recency_window_bounds() {
        let mut config = RecollectConfig::default();
        config.retrieval.recency_window_days = MAX_RECENCY_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        config.retrieval.recency_window_days = i64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("recency_window_days"));

        config.retrieval.recency_window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = RecollectConfig::default();
        config.storage.backend = "postgres".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = RecollectConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().storage.backend, "sqlite");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[retrieval]
fact_limit = 8

[scoring.category_weights]
pets = 2.0
"#,
        )
        .unwrap();

        let config = RecollectConfig::load_from(&path).unwrap();
        assert_eq!(config.retrieval.fact_limit, 8);
        assert_eq!(config.retrieval.recent_limit, 10);
        assert_eq!(config.scoring.category_weights.pets, 2.0);
        assert_eq!(config.scoring.category_weights.job, 1.5);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retrieval = 3").unwrap();
        let err = RecollectConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = RecollectConfig::default_toml();
        assert!(toml_str.contains("recency_window_days = 30"));
        assert!(toml_str.contains("[scoring.category_weights]"));
    }
}
