//! The phrase knowledge base.
//!
//! Wraps a [`PhraseCollection`] with the rules the bot applies on top of the
//! raw records: trigger normalization, learn validation, substring lookup and
//! exact-pair removal. Random selection goes through a [`ResponsePicker`] so
//! tests can pin it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info};
use trufa_core::error::StoreError;
use trufa_core::phrase::{PhraseCollection, PhraseEntry, PhraseFilter};

/// Shortest trigger the bot will learn, in characters.
pub const MIN_TRIGGER_CHARS: usize = 3;

/// Result of a learn request that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnOutcome {
    Learned,
    AlreadyExists,
    TriggerTooShort,
    /// Blank response. The learn pattern requires non-empty quoted text, so
    /// this is only reachable from `trufa phrases add`.
    EmptyResponse,
}

/// Chooses one of `candidates` responses. Must return an index below it.
pub trait ResponsePicker: Send + Sync {
    fn pick(&mut self, candidates: usize) -> usize;
}

/// Uniform random picker.
pub struct RandomPicker<R = StdRng> {
    rng: R,
}

impl RandomPicker<StdRng> {
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible sequence, for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send + Sync> ResponsePicker for RandomPicker<R> {
    fn pick(&mut self, candidates: usize) -> usize {
        self.rng.random_range(0..candidates)
    }
}

/// Trigger → response knowledge base.
pub struct PhraseStore {
    collection: Arc<dyn PhraseCollection>,
    picker: Box<dyn ResponsePicker>,
}

impl PhraseStore {
    pub fn new(collection: Arc<dyn PhraseCollection>, picker: impl ResponsePicker + 'static) -> Self {
        Self {
            collection,
            picker: Box::new(picker),
        }
    }

    /// A store choosing responses with OS-seeded randomness.
    pub fn with_random_picker(collection: Arc<dyn PhraseCollection>) -> Self {
        Self::new(collection, RandomPicker::from_os_rng())
    }

    /// Name of the backing collection.
    pub fn backend(&self) -> &str {
        self.collection.name()
    }

    /// Store a new (trigger, response) pair.
    ///
    /// The trigger is lowercased. Length and blank-response checks run before
    /// the duplicate lookup, so invalid input never touches the store.
    pub async fn learn(&self, trigger: &str, response: &str) -> Result<LearnOutcome, StoreError> {
        let trigger = trigger.to_lowercase();

        if trigger.chars().count() < MIN_TRIGGER_CHARS {
            return Ok(LearnOutcome::TriggerTooShort);
        }
        if response.trim().is_empty() {
            return Ok(LearnOutcome::EmptyResponse);
        }

        let entry = PhraseEntry::new(trigger, response);
        if !self
            .collection
            .find_where(&PhraseFilter::exact(&entry))
            .await?
            .is_empty()
        {
            return Ok(LearnOutcome::AlreadyExists);
        }

        self.collection.insert(entry.clone()).await?;
        info!(trigger = %entry.trigger, backend = self.backend(), "Learned phrase");
        Ok(LearnOutcome::Learned)
    }

    /// Every entry with exactly this trigger, in storage order.
    pub async fn find_by_trigger(&self, trigger: &str) -> Result<Vec<PhraseEntry>, StoreError> {
        self.collection
            .find_where(&PhraseFilter::trigger(trigger))
            .await
    }

    /// Responses whose trigger occurs somewhere in `text`.
    pub async fn find_matching(&self, text: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .collection
            .find_all()
            .await?
            .into_iter()
            .filter(|entry| text.contains(entry.trigger.as_str()))
            .map(|entry| entry.response)
            .collect())
    }

    /// Delete one exact pair. `false` when nothing matched.
    pub async fn remove_exact(&self, entry: &PhraseEntry) -> Result<bool, StoreError> {
        let removed = self
            .collection
            .delete_where(&PhraseFilter::exact(entry))
            .await?;
        if removed > 0 {
            info!(trigger = %entry.trigger, "Removed phrase");
        }
        Ok(removed > 0)
    }

    /// One of the responses matching `text`, chosen by the picker.
    pub async fn pick_random(&mut self, text: &str) -> Result<Option<String>, StoreError> {
        let mut responses = self.find_matching(text).await?;
        if responses.is_empty() {
            return Ok(None);
        }
        let index = self.picker.pick(responses.len());
        debug!(candidates = responses.len(), index, "Picked response");
        Ok((index < responses.len()).then(|| responses.swap_remove(index)))
    }

    /// All stored phrases.
    pub async fn list(&self) -> Result<Vec<PhraseEntry>, StoreError> {
        self.collection.find_all().await
    }
}
