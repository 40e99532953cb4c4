//! Shared test helpers for dispatcher and protocol tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use tokio::sync::mpsc;
use trufa_core::channel::{Channel, ChatMember, InboundEvent, InlineKeyboard};
use trufa_core::error::{ChannelError, MediaError, StoreError};
use trufa_core::media::{MediaFormat, MediaItem, MediaKind, MediaSource};
use trufa_core::phrase::{PhraseCollection, PhraseEntry, PhraseFilter};

use crate::phrases::ResponsePicker;

/// A fixed instant the tests measure from.
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Everything a [`RecordingChannel`] was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: String,
        text: String,
        keyboard: Option<InlineKeyboard>,
    },
    Media {
        chat_id: String,
        item: MediaItem,
    },
    Ack(String),
}

/// A channel that records outbound calls instead of delivering them.
pub struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
    admins: Vec<ChatMember>,
    fail: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            admins: Vec::new(),
            fail: false,
        }
    }

    /// Every send fails with a delivery error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_admins(admins: &[(&str, Option<&str>)]) -> Self {
        Self {
            admins: admins
                .iter()
                .map(|(id, username)| ChatMember {
                    user_id: id.to_string(),
                    username: username.map(str::to_string),
                })
                .collect(),
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Plain texts sent to one chat, in order.
    pub fn texts(&self, chat_id: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text, .. } if c == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    /// The most recent keyboard prompt, if any.
    pub fn last_prompt(&self) -> Option<(String, InlineKeyboard)> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Text {
                text,
                keyboard: Some(keyboard),
                ..
            } => Some((text, keyboard)),
            _ => None,
        })
    }

    pub fn acks(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Ack(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, sent: Sent) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::DeliveryFailed {
                channel: "recording".into(),
                reason: "configured to fail".into(),
            });
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError> {
        self.record(Sent::Text {
            chat_id: chat_id.into(),
            text: content.into(),
            keyboard: keyboard.cloned(),
        })
    }

    async fn send_media(&self, chat_id: &str, media: &MediaItem) -> Result<(), ChannelError> {
        self.record(Sent::Media {
            chat_id: chat_id.into(),
            item: media.clone(),
        })
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.record(Sent::Ack(callback_id.into()))
    }

    async fn chat_administrators(&self, _chat_id: &str) -> Result<Vec<ChatMember>, ChannelError> {
        if self.fail {
            return Err(ChannelError::Api {
                method: "getChatAdministrators".into(),
                description: "configured to fail".into(),
            });
        }
        Ok(self.admins.clone())
    }
}

/// Always picks the same index (clamped to the candidate count).
pub struct FixedPicker(pub usize);

impl ResponsePicker for FixedPicker {
    fn pick(&mut self, candidates: usize) -> usize {
        self.0.min(candidates.saturating_sub(1))
    }
}

/// Media source returning a canned URL per kind, or failing.
pub struct StaticMedia {
    pub fail: bool,
}

#[async_trait]
impl MediaSource for StaticMedia {
    async fn fetch(&self, kind: MediaKind) -> Result<MediaItem, MediaError> {
        if self.fail {
            return Err(MediaError::Request("offline".into()));
        }
        Ok(match kind {
            MediaKind::Cat => MediaItem {
                url: "https://cdn.example/cat.gif".into(),
                format: MediaFormat::Animation,
            },
            MediaKind::Dog => MediaItem {
                url: "https://cdn.example/dog.jpg".into(),
                format: MediaFormat::Photo,
            },
        })
    }
}

/// A collection whose every operation fails.
pub struct FailingCollection;

#[async_trait]
impl PhraseCollection for FailingCollection {
    fn name(&self) -> &str {
        "failing"
    }

    async fn insert(&self, _entry: PhraseEntry) -> Result<(), StoreError> {
        Err(StoreError::Storage("disk on fire".into()))
    }

    async fn find_all(&self) -> Result<Vec<PhraseEntry>, StoreError> {
        Err(StoreError::QueryFailed("disk on fire".into()))
    }

    async fn find_where(&self, _filter: &PhraseFilter) -> Result<Vec<PhraseEntry>, StoreError> {
        Err(StoreError::QueryFailed("disk on fire".into()))
    }

    async fn delete_where(&self, _filter: &PhraseFilter) -> Result<usize, StoreError> {
        Err(StoreError::Storage("disk on fire".into()))
    }
}
