//! Phrase records and the persistence collaborator that stores them.
//!
//! A phrase is a `trigger → response` pair. The same trigger may own several
//! responses, but a (trigger, response) pair is stored at most once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A single learned phrase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhraseEntry {
    /// Lowercased text that activates the response
    pub trigger: String,

    /// What the bot answers
    pub response: String,
}

impl PhraseEntry {
    pub fn new(trigger: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            response: response.into(),
        }
    }
}

/// Equality filter over phrase records. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl PhraseFilter {
    /// Every record with this exact trigger.
    pub fn trigger(trigger: impl Into<String>) -> Self {
        Self {
            trigger: Some(trigger.into()),
            response: None,
        }
    }

    /// The exact (trigger, response) pair.
    pub fn exact(entry: &PhraseEntry) -> Self {
        Self {
            trigger: Some(entry.trigger.clone()),
            response: Some(entry.response.clone()),
        }
    }

    pub fn matches(&self, entry: &PhraseEntry) -> bool {
        self.trigger.as_ref().is_none_or(|t| *t == entry.trigger)
            && self.response.as_ref().is_none_or(|r| *r == entry.response)
    }
}

/// The document-store collaborator: one logical "phrases" collection.
///
/// Implementations: JSONL file, SQLite, in-memory (for testing).
/// Results are returned in insertion order.
#[async_trait]
pub trait PhraseCollection: Send + Sync {
    /// The backend name (e.g., "file", "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Append a record.
    async fn insert(&self, entry: PhraseEntry) -> std::result::Result<(), StoreError>;

    /// Every stored record.
    async fn find_all(&self) -> std::result::Result<Vec<PhraseEntry>, StoreError>;

    /// Records matching the filter.
    async fn find_where(
        &self,
        filter: &PhraseFilter,
    ) -> std::result::Result<Vec<PhraseEntry>, StoreError>;

    /// Delete records matching the filter, returning how many were removed.
    async fn delete_where(&self, filter: &PhraseFilter) -> std::result::Result<usize, StoreError>;
}
