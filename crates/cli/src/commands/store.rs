//! Opening the configured store for a command.

use recollect_config::RecollectConfig;
use recollect_core::store::{FactStore, MessageStore, TopicStore};
use recollect_memory::{InMemoryStore, NoopStore, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// The three tier handles, usually backed by one store.
pub struct Stores {
    pub facts: Arc<dyn FactStore>,
    pub messages: Arc<dyn MessageStore>,
    pub topics: Arc<dyn TopicStore>,
}

impl Stores {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: FactStore + MessageStore + TopicStore + 'static,
    {
        Self {
            facts: store.clone(),
            messages: store.clone(),
            topics: store,
        }
    }
}

/// Load config (applying a `--db` override) and open its store.
pub async fn open(db: Option<PathBuf>) -> Result<(RecollectConfig, Stores), Box<dyn std::error::Error>> {
    let mut config = RecollectConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(path) = db {
        config.storage.path = Some(path);
    }

    let stores = match config.storage.backend.as_str() {
        "none" => {
            info!("Memory disabled; reads are empty and writes are discarded");
            Stores::shared(Arc::new(NoopStore))
        }
        "memory" => {
            info!("Using in-memory store; nothing will persist");
            Stores::shared(Arc::new(InMemoryStore::new()))
        }
        _ => {
            let path = config.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = SqliteStore::new(&format!("sqlite://{}", path.display())).await?;
            info!(path = %path.display(), "Opened SQLite store");
            Stores::shared(Arc::new(store))
        }
    };
    Ok((config, stores))
}
