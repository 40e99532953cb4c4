//! File-based phrase backend: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `PhraseEntry`. The file is small and
//! human-editable, which is the point: a group admin can fix a bad phrase
//! with a text editor.
//!
//! Default location: `~/.trufa/phrases.jsonl`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use trufa_core::error::StoreError;
use trufa_core::phrase::{PhraseCollection, PhraseEntry, PhraseFilter};

/// A file-backed phrase collection using JSONL (one JSON object per line).
///
/// Entries are loaded into memory on creation and flushed to disk on every
/// mutation (insert, delete). This gives fast reads with durable writes.
pub struct FileCollection {
    path: PathBuf,
    entries: Arc<RwLock<Vec<PhraseEntry>>>,
}

impl FileCollection {
    /// Open a collection at the given path.
    ///
    /// If the file exists, entries are loaded from it.
    /// If it does not, starts empty (file created on first write).
    pub fn new(path: PathBuf) -> Self {
        let entries = Self::load_from_disk(&path);
        debug!(path = %path.display(), count = entries.len(), "Phrase file loaded");
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load entries from a JSONL file.
    fn load_from_disk(path: &Path) -> Vec<PhraseEntry> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Vec::new(), // Not created yet
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<PhraseEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted phrase line");
                    None
                }
            })
            .collect()
    }

    /// Write `entries` to disk as JSONL.
    ///
    /// Callers hold the write lock and only swap the new list in once this
    /// succeeds, so a failed write leaves memory and disk in agreement.
    fn persist(&self, entries: &[PhraseEntry]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Failed to create phrase directory: {e}"))
            })?;
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize phrase: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        std::fs::write(&self.path, &content)
            .map_err(|e| StoreError::Storage(format!("Failed to write phrase file: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl PhraseCollection for FileCollection {
    fn name(&self) -> &str {
        "file"
    }

    async fn insert(&self, entry: PhraseEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let mut updated = Vec::with_capacity(entries.len() + 1);
        updated.extend(entries.iter().cloned());
        updated.push(entry);
        self.persist(&updated)?;
        *entries = updated;
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
        let kept: Vec<PhraseEntry> = entries
            .iter()
            .filter(|e| !filter.matches(e))
            .cloned()
            .collect();
        let removed = entries.len() - kept.len();
        if removed > 0 {
            self.persist(&kept)?;
            *entries = kept;
        }
        Ok(removed)
    }
}
