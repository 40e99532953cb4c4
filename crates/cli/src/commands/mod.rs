pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod onboard;
pub mod phrases;
pub mod run;

use std::sync::Arc;
use trufa_agent::{BotLoop, Dispatcher, PhraseStore};
use trufa_config::{AppConfig, StorageConfig};
use trufa_core::channel::Channel;
use trufa_core::clock::SystemClock;
use trufa_core::error::StoreError;
use trufa_core::phrase::PhraseCollection;
use trufa_media::HttpMediaSource;
use trufa_memory::{FileCollection, InMemoryCollection, SqliteCollection};

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the phrase collection selected by `[storage]`.
pub async fn open_collection(
    storage: &StorageConfig,
) -> Result<Arc<dyn PhraseCollection>, StoreError> {
    let collection: Arc<dyn PhraseCollection> = match storage.backend.as_str() {
        "memory" => Arc::new(InMemoryCollection::new()),
        "sqlite" => {
            let path = storage.resolved_path();
            ensure_parent_dir(&path)?;
            Arc::new(SqliteCollection::new(&format!("sqlite://{}", path.display())).await?)
        }
        _ => {
            let path = storage.resolved_path();
            ensure_parent_dir(&path)?;
            Arc::new(FileCollection::new(path))
        }
    };
    tracing::info!(backend = collection.name(), "Phrase collection ready");
    Ok(collection)
}

fn ensure_parent_dir(path: &std::path::Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => std::fs::create_dir_all(dir)
            .map_err(|e| StoreError::Storage(format!("Cannot create {}: {e}", dir.display()))),
        _ => Ok(()),
    }
}

/// Wire a bot loop around `channel` with the configured store and media.
pub async fn build_bot(
    config: &AppConfig,
    channel: Arc<dyn Channel>,
) -> Result<BotLoop, Box<dyn std::error::Error>> {
    let collection = open_collection(&config.storage).await?;
    let dispatcher = Dispatcher::new(
        config,
        PhraseStore::with_random_picker(collection),
        Arc::clone(&channel),
        Arc::new(HttpMediaSource::new(&config.media)),
        Arc::new(SystemClock),
    )?;
    Ok(BotLoop::new(channel, dispatcher))
}
