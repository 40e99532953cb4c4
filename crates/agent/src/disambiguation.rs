//! Multi-candidate forget flow.
//!
//! When a forget request names a trigger with several responses the bot
//! replies with a numbered list and one inline button per candidate. Each
//! button carries `{"command":"deletePhrase","index":N}` and, in correlation
//! mode, a short token naming a snapshot of the candidates shown.
//!
//! The snapshot is only kept once the prompt has actually been delivered
//! (see [`Disambiguator::commit`]).
//!
//! On a button press the candidates are recovered from the snapshot when it
//! is still held; otherwise the trigger is re-read from the prompt's first
//! line and the store is queried again. The index is then applied to that
//! candidate list and the exact pair is removed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use trufa_config::{DisambiguationConfig, DisambiguationMode};
use trufa_core::channel::{CallbackQuery, InlineButton, InlineKeyboard};
use trufa_core::error::{Error, ProtocolError, StoreError};
use trufa_core::phrase::PhraseEntry;

use crate::phrases::PhraseStore;
use crate::replies;

/// The only callback command the bot emits.
pub const DELETE_PHRASE_COMMAND: &str = "deletePhrase";

/// Buttons per keyboard row.
pub const KEYBOARD_ROW_SIZE: usize = 8;

/// Telegram caps callback data at 64 bytes; 8 hex chars keeps us well under.
const TOKEN_LEN: usize = 8;

/// Button payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub command: String,
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CallbackPayload {
    pub fn delete_phrase(index: usize, token: Option<String>) -> Self {
        Self {
            command: DELETE_PHRASE_COMMAND.into(),
            index,
            token,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let payload: Self = serde_json::from_str(raw)
            .map_err(|e| ProtocolError::MalformedPayload(format!("{e}: {raw}")))?;
        if payload.command != DELETE_PHRASE_COMMAND {
            return Err(ProtocolError::UnknownCommand(payload.command));
        }
        Ok(payload)
    }

    pub fn encode(&self) -> String {
        let mut value = serde_json::json!({
            "command": self.command,
            "index": self.index,
        });
        if let Some(token) = &self.token {
            value["token"] = serde_json::Value::String(token.clone());
        }
        value.to_string()
    }
}

/// Recover the trigger from the first line of a disambiguation prompt: the
/// text between the first and the last double quote.
pub fn trigger_from_prompt(text: &str) -> Option<String> {
    let first_line = text.lines().next()?;
    let open = first_line.find('"')?;
    let close = first_line.rfind('"')?;
    let trigger = first_line.get(open + 1..close)?;
    (!trigger.is_empty()).then(|| trigger.to_string())
}

/// How a forget request started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgetStart {
    NotFound,
    /// The only candidate was removed straight away
    Removed(PhraseEntry),
    /// Several candidates; send this prompt and wait for a button press.
    /// `pending` is the correlation snapshot to [`Disambiguator::commit`]
    /// once the prompt is delivered.
    Prompt {
        text: String,
        keyboard: InlineKeyboard,
        pending: Option<PendingPrompt>,
    },
}

/// A correlation snapshot that is not held yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPrompt {
    token: String,
    record: CorrelationRecord,
}

impl PendingPrompt {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// How a button press ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Removed(PhraseEntry),
    /// The selected pair was deleted by someone else in the meantime
    AlreadyGone(PhraseEntry),
    /// The index no longer points at a candidate
    StaleIndex { index: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CorrelationRecord {
    chat_id: String,
    trigger: String,
    candidates: Vec<PhraseEntry>,
    expires_at: DateTime<Utc>,
}

/// Owns the correlation records of pending prompts.
pub struct Disambiguator {
    mode: DisambiguationMode,
    ttl: Duration,
    max_pending: usize,
    records: HashMap<String, CorrelationRecord>,
    order: VecDeque<String>,
}

impl Disambiguator {
    pub fn new(config: &DisambiguationConfig) -> Self {
        Self {
            mode: config.mode,
            ttl: i64::try_from(config.ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            max_pending: config.max_pending.max(1),
            records: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> DisambiguationMode {
        self.mode
    }

    /// Correlation records currently held.
    pub fn pending(&self) -> usize {
        self.records.len()
    }

    /// Handle a forget request for `trigger` in `chat_id`.
    pub async fn start(
        &mut self,
        store: &PhraseStore,
        chat_id: &str,
        trigger: &str,
        now: DateTime<Utc>,
    ) -> Result<ForgetStart, StoreError> {
        let mut candidates = store.find_by_trigger(trigger).await?;

        match candidates.len() {
            0 => Ok(ForgetStart::NotFound),
            1 => {
                let entry = candidates.remove(0);
                if store.remove_exact(&entry).await? {
                    Ok(ForgetStart::Removed(entry))
                } else {
                    Ok(ForgetStart::NotFound)
                }
            }
            n => {
                let pending = match self.mode {
                    DisambiguationMode::Correlation => {
                        Some(self.stage(chat_id, trigger, &candidates, now))
                    }
                    DisambiguationMode::Reparse => None,
                };
                let token = pending.as_ref().map(|p| p.token.clone());
                debug!(chat_id, trigger, candidates = n, token = ?token, "Asking which phrase to forget");

                let buttons = (0..n)
                    .map(|index| InlineButton {
                        label: (index + 1).to_string(),
                        payload: CallbackPayload::delete_phrase(index, token.clone()).encode(),
                    })
                    .collect();

                Ok(ForgetStart::Prompt {
                    text: replies::disambiguation_prompt(trigger, &candidates),
                    keyboard: InlineKeyboard::chunked(buttons, KEYBOARD_ROW_SIZE),
                    pending,
                })
            }
        }
    }

    /// Resolve a button press against the candidates it refers to.
    ///
    /// Protocol errors leave every piece of state untouched.
    pub async fn resolve(
        &mut self,
        store: &PhraseStore,
        callback: &CallbackQuery,
        now: DateTime<Utc>,
    ) -> Result<Resolution, Error> {
        let raw = callback
            .payload
            .as_deref()
            .ok_or_else(|| ProtocolError::MalformedPayload("missing payload".into()))?;
        let payload = CallbackPayload::parse(raw)?;

        self.prune(now);
        let snapshot = match (self.mode, &payload.token) {
            (DisambiguationMode::Correlation, Some(token)) => self
                .records
                .get(token)
                .filter(|record| record.chat_id == callback.chat_id)
                .map(|record| {
                    debug!(token = %token, trigger = %record.trigger, "Using correlation snapshot");
                    record.candidates.clone()
                }),
            _ => None,
        };

        let candidates = match snapshot {
            Some(candidates) => candidates,
            None => {
                let prompt = callback.message_text.as_deref().unwrap_or_default();
                let trigger = trigger_from_prompt(prompt)
                    .ok_or_else(|| ProtocolError::PromptUnparsable(prompt.to_string()))?;
                debug!(trigger = %trigger, "Re-deriving candidates from prompt");
                store.find_by_trigger(&trigger).await?
            }
        };

        let Some(entry) = candidates.get(payload.index).cloned() else {
            return Ok(Resolution::StaleIndex {
                index: payload.index,
                available: candidates.len(),
            });
        };

        if store.remove_exact(&entry).await? {
            Ok(Resolution::Removed(entry))
        } else {
            Ok(Resolution::AlreadyGone(entry))
        }
    }

    /// Hold the snapshot of a delivered prompt, evicting the oldest records
    /// beyond `max_pending`.
    pub fn commit(&mut self, pending: PendingPrompt, now: DateTime<Utc>) {
        self.prune(now);
        while self.records.len() >= self.max_pending {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.records.remove(&oldest);
        }
        self.order.push_back(pending.token.clone());
        self.records.insert(pending.token, pending.record);
    }

    fn stage(
        &self,
        chat_id: &str,
        trigger: &str,
        candidates: &[PhraseEntry],
        now: DateTime<Utc>,
    ) -> PendingPrompt {
        let mut token = uuid::Uuid::new_v4().simple().to_string();
        token.truncate(TOKEN_LEN);

        PendingPrompt {
            token,
            record: CorrelationRecord {
                chat_id: chat_id.to_string(),
                trigger: trigger.to_string(),
                candidates: candidates.to_vec(),
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        self.records.retain(|_, record| now < record.expires_at);
        let records = &self.records;
        self.order.retain(|token| records.contains_key(token));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FixedPicker, t0};
    use std::sync::Arc;
    use trufa_memory::InMemoryCollection;

    fn store(entries: &[(&str, &str)]) -> PhraseStore {
        PhraseStore::new(
            Arc::new(InMemoryCollection::with_entries(
                entries.iter().map(|(t, r)| PhraseEntry::new(*t, *r)).collect(),
            )),
            FixedPicker(0),
        )
    }

    fn disambiguator(mode: DisambiguationMode) -> Disambiguator {
        Disambiguator::new(&DisambiguationConfig {
            mode,
            ..DisambiguationConfig::default()
        })
    }

    fn press(prompt: &str, keyboard: &InlineKeyboard, button: usize) -> CallbackQuery {
        CallbackQuery {
            id: format!("cb-{button}"),
            chat_id: "1".into(),
            message_text: Some(prompt.into()),
            payload: keyboard.buttons().nth(button).map(|b| b.payload.clone()),
            sender_id: None,
        }
    }

    async fn prompt_for(
        d: &mut Disambiguator,
        store: &PhraseStore,
        trigger: &str,
    ) -> (String, InlineKeyboard) {
        match d.start(store, "1", trigger, t0()).await.unwrap() {
            ForgetStart::Prompt {
                text,
                keyboard,
                pending,
            } => {
                if let Some(pending) = pending {
                    d.commit(pending, t0());
                }
                (text, keyboard)
            }
            other => panic!("expected a prompt, got {other:?}"),
        }
    }

    async fn responses(store: &PhraseStore) -> Vec<String> {
        store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.response)
            .collect()
    }

    #[test]
    fn payload_round_trip_and_shape() {
        let encoded = CallbackPayload::delete_phrase(2, None).encode();
        assert_eq!(encoded, r#"{"command":"deletePhrase","index":2}"#);

        let with_token = CallbackPayload::delete_phrase(0, Some("abcd1234".into())).encode();
        assert!(with_token.len() <= 64);
        assert_eq!(
            CallbackPayload::parse(&with_token).unwrap().token.as_deref(),
            Some("abcd1234")
        );
    }

    #[test]
    fn payload_errors() {
        assert!(matches!(
            CallbackPayload::parse("not json"),
            Err(ProtocolError::MalformedPayload(_))
        ));
        assert!(matches!(
            CallbackPayload::parse(r#"{"command":"launch","index":0}"#),
            Err(ProtocolError::UnknownCommand(_))
        ));
        assert!(matches!(
            CallbackPayload::parse(r#"{"command":"deletePhrase","index":-1}"#),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn trigger_is_read_from_first_line_only() {
        let prompt = replies::disambiguation_prompt(
            "di \"hola\"",
            &[PhraseEntry::new("x", "\"otra\""), PhraseEntry::new("x", "b")],
        );
        assert_eq!(trigger_from_prompt(&prompt).as_deref(), Some("di \"hola\""));
        assert_eq!(trigger_from_prompt("sin comillas"), None);
        assert_eq!(trigger_from_prompt(""), None);
    }

    #[tokio::test]
    async fn zero_candidates_is_not_found() {
        let store = store(&[("adios", "a")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);
        assert_eq!(
            d.start(&store, "1", "hola", t0()).await.unwrap(),
            ForgetStart::NotFound
        );
    }

    #[tokio::test]
    async fn single_candidate_is_removed_immediately() {
        let store = store(&[("hola", "a"), ("adios", "b")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);
        assert_eq!(
            d.start(&store, "1", "hola", t0()).await.unwrap(),
            ForgetStart::Removed(PhraseEntry::new("hola", "a"))
        );
        assert_eq!(responses(&store).await, ["b"]);
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test]
    async fn keyboard_has_one_button_per_candidate_in_rows_of_eight() {
        let entries: Vec<(String, String)> =
            (1..=17).map(|n| ("hola".to_string(), format!("r{n}"))).collect();
        let refs: Vec<(&str, &str)> = entries.iter().map(|(t, r)| (t.as_str(), r.as_str())).collect();
        let store = store(&refs);
        let mut d = disambiguator(DisambiguationMode::Reparse);

        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;
        assert_eq!(keyboard.rows.len(), 3);
        assert_eq!(keyboard.button_count(), 17);
        let labels: Vec<String> = keyboard.buttons().map(|b| b.label.clone()).collect();
        let expected: Vec<String> = (1..=17).map(|n| n.to_string()).collect();
        assert_eq!(labels, expected);
        assert!(text.lines().nth(17).unwrap().starts_with("17. r17"));
    }

    #[tokio::test]
    async fn reparse_press_removes_selected_candidate() {
        let store = store(&[("hola", "a"), ("hola", "b"), ("hola", "c")]);
        let mut d = disambiguator(DisambiguationMode::Reparse);

        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;
        assert_eq!(keyboard.button_count(), 3);
        assert!(!keyboard.buttons().any(|b| b.payload.contains("token")));
        assert_eq!(d.pending(), 0);

        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::Removed(PhraseEntry::new("hola", "b")));
        assert_eq!(responses(&store).await, ["a", "c"]);
    }

    #[tokio::test]
    async fn reparse_suffers_from_shifted_indices() {
        let store = store(&[("hola", "a"), ("hola", "b"), ("hola", "c")]);
        let mut d = disambiguator(DisambiguationMode::Reparse);
        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;

        // Someone removes "a" before the button is pressed.
        store.remove_exact(&PhraseEntry::new("hola", "a")).await.unwrap();

        // Button 2 ("b" when shown) now points at "c".
        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::Removed(PhraseEntry::new("hola", "c")));

        let resolution = d.resolve(&store, &press(&text, &keyboard, 2), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::StaleIndex { index: 2, available: 1 });
    }

    #[tokio::test]
    async fn correlation_press_uses_snapshot() {
        let store = store(&[("hola", "a"), ("hola", "b"), ("hola", "c")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);
        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;
        assert_eq!(d.pending(), 1);

        store.remove_exact(&PhraseEntry::new("hola", "a")).await.unwrap();

        // The snapshot keeps button 2 pointing at "b".
        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::Removed(PhraseEntry::new("hola", "b")));
        assert_eq!(responses(&store).await, ["c"]);

        // Pressing the removed candidate again is harmless.
        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::AlreadyGone(PhraseEntry::new("hola", "b")));
        assert_eq!(responses(&store).await, ["c"]);
    }

    #[tokio::test]
    async fn snapshot_is_not_held_until_committed() {
        let store = store(&[("hola", "a"), ("hola", "b")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);

        let ForgetStart::Prompt {
            text,
            keyboard,
            pending: Some(pending),
        } = d.start(&store, "1", "hola", t0()).await.unwrap()
        else {
            panic!("expected a prompt with a snapshot");
        };
        assert_eq!(d.pending(), 0);
        assert!(
            keyboard
                .buttons()
                .all(|b| b.payload.contains(pending.token()))
        );

        // An undelivered prompt's press is served from the current list.
        store.remove_exact(&PhraseEntry::new("hola", "a")).await.unwrap();
        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::StaleIndex { index: 1, available: 1 });

        d.commit(pending, t0());
        assert_eq!(d.pending(), 1);
        let resolution = d.resolve(&store, &press(&text, &keyboard, 1), t0()).await.unwrap();
        assert_eq!(resolution, Resolution::Removed(PhraseEntry::new("hola", "b")));
    }

    #[tokio::test]
    async fn expired_record_falls_back_to_reparse() {
        let store = store(&[("hola", "a"), ("hola", "b")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);
        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;

        let later = t0() + Duration::seconds(901);
        let resolution = d.resolve(&store, &press(&text, &keyboard, 0), later).await.unwrap();
        assert_eq!(resolution, Resolution::Removed(PhraseEntry::new("hola", "a")));
        assert_eq!(d.pending(), 0);
    }

    #[tokio::test]
    async fn record_from_another_chat_is_not_used() {
        let store = store(&[("hola", "a"), ("hola", "b")]);
        let mut d = disambiguator(DisambiguationMode::Correlation);
        let (text, keyboard) = prompt_for(&mut d, &store, "hola").await;

        let mut foreign = press(&text, &keyboard, 1);
        foreign.chat_id = "2".into();
        store.remove_exact(&PhraseEntry::new("hola", "a")).await.unwrap();

        // Falls back to the current list, where index 1 no longer exists.
        let resolution = d.resolve(&store, &foreign, t0()).await.unwrap();
        assert_eq!(resolution, Resolution::StaleIndex { index: 1, available: 1 });
    }

    #[tokio::test]
    async fn oldest_records_are_evicted() {
        let store = store(&[("hola", "a"), ("hola", "b")]);
        let mut d = Disambiguator::new(&DisambiguationConfig {
            max_pending: 2,
            ..DisambiguationConfig::default()
        });
        for _ in 0..5 {
            prompt_for(&mut d, &store, "hola").await;
        }
        assert_eq!(d.pending(), 2);
    }

    #[tokio::test]
    async fn protocol_errors_leave_store_alone() {
        let store = store(&[("hola", "a"), ("hola", "b")]);
        let mut d = disambiguator(DisambiguationMode::Reparse);

        let garbage = CallbackQuery {
            id: "cb".into(),
            chat_id: "1".into(),
            message_text: Some("Conozco varias respuestas para \"hola\", cual olvido?".into()),
            payload: Some("{oops".into()),
            sender_id: None,
        };
        assert!(matches!(
            d.resolve(&store, &garbage, t0()).await,
            Err(Error::Protocol(ProtocolError::MalformedPayload(_)))
        ));

        let unparsable = CallbackQuery {
            message_text: Some("algo sin comillas".into()),
            payload: Some(CallbackPayload::delete_phrase(0, None).encode()),
            ..garbage.clone()
        };
        assert!(matches!(
            d.resolve(&store, &unparsable, t0()).await,
            Err(Error::Protocol(ProtocolError::PromptUnparsable(_)))
        ));

        let missing = CallbackQuery {
            payload: None,
            ..garbage
        };
        assert!(d.resolve(&store, &missing, t0()).await.is_err());

        assert_eq!(responses(&store).await, ["a", "b"]);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let store = PhraseStore::new(
            Arc::new(crate::test_helpers::FailingCollection),
            FixedPicker(0),
        );
        let mut d = disambiguator(DisambiguationMode::Reparse);
        assert!(d.start(&store, "1", "hola", t0()).await.is_err());

        let callback = CallbackQuery {
            id: "cb".into(),
            chat_id: "1".into(),
            message_text: Some("Conozco varias respuestas para \"hola\", cual olvido?".into()),
            payload: Some(CallbackPayload::delete_phrase(0, None).encode()),
            sender_id: None,
        };
        assert!(matches!(
            d.resolve(&store, &callback, t0()).await,
            Err(Error::Store(_))
        ));
    }
}
