//! In-memory backend, useful for testing and ephemeral runs.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use trufa_core::error::StoreError;
use trufa_core::phrase::{PhraseCollection, PhraseEntry, PhraseFilter};

/// An in-memory collection that stores phrases in a Vec.
/// Useful for testing and runs where persistence isn't needed.
pub struct InMemoryCollection {
    entries: Arc<RwLock<Vec<PhraseEntry>>>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Start with existing records (in order).
    pub fn with_entries(entries: Vec<PhraseEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
        }
    }
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PhraseCollection for InMemoryCollection {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn insert(&self, entry: PhraseEntry) -> Result<(), StoreError> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<PhraseEntry>, StoreError> {
        Ok(self.entries.read().await.clone())
    }

    async fn find_where(&self, filter: &PhraseFilter) -> Result<Vec<PhraseEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn delete_where(&self, filter: &PhraseFilter) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().await;
        let len_before = entries.len();
        entries.retain(|e| !filter.matches(e));
        Ok(len_before - entries.len())
    }
}
