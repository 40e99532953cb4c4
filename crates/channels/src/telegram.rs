//! Telegram channel adapter.
//!
//! Implements the Channel trait over the Telegram Bot API using plain HTTPS
//! calls: `getUpdates` long polling for inbound events, `sendMessage` /
//! `sendPhoto` / `sendDocument` for output, `answerCallbackQuery` for button
//! acknowledgment and `getChatAdministrators` for the admin lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trufa_config::TelegramSettings;
use trufa_core::channel::{
    CallbackQuery, Channel, ChatMember, ChatType, InboundEvent, IncomingMessage, InlineKeyboard,
};
use trufa_core::error::ChannelError;
use trufa_core::media::{MediaFormat, MediaItem};

/// Pause after a failed poll before trying again.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// API root, without the `/bot<token>` suffix.
    pub api_base: String,
    /// Long-poll timeout passed to getUpdates.
    pub poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

impl TelegramConfig {
    /// Build from the `[telegram]` config section. Fails without a token.
    pub fn from_settings(settings: &TelegramSettings) -> Result<Self, ChannelError> {
        let bot_token = settings
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ChannelError::NotConfigured(
                    "telegram.bot_token is not set (or export TRUFA_BOT_TOKEN)".into(),
                )
            })?;

        Ok(Self {
            bot_token,
            api_base: settings.api_base.clone(),
            poll_timeout_secs: settings.poll_timeout_secs,
        })
    }
}

// --- Bot API wire types (only the fields we read) ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    callback_query: Option<TgCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    date: i64,
    chat: TgChat,
    #[serde(default)]
    from: Option<TgUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgCallbackQuery {
    id: String,
    from: TgUser,
    #[serde(default)]
    message: Option<TgMessage>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChatMember {
    user: TgUser,
}

/// Thin Bot API client. Cloned into the polling task.
#[derive(Clone)]
struct BotApi {
    client: reqwest::Client,
    /// `<api_base>/bot<token>`; never logged.
    root: String,
}

impl BotApi {
    fn new(config: &TelegramConfig) -> Self {
        // The HTTP timeout has to outlive the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            root: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, ChannelError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.root))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "telegram".into(),
                reason: e.without_url().to_string(),
            })?;

        let parsed: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::InvalidPayload(format!("{method}: {}", e.without_url())))?;

        if !parsed.ok {
            return Err(ChannelError::Api {
                method: method.into(),
                description: parsed.description.unwrap_or_else(|| "unknown error".into()),
            });
        }

        parsed
            .result
            .ok_or_else(|| ChannelError::InvalidPayload(format!("{method}: missing result")))
    }
}

/// Convert one Bot API update into an inbound event.
///
/// Updates of other kinds (edits, joins, polls...) yield `None`.
fn parse_update(update: Update) -> Option<InboundEvent> {
    if let Some(message) = update.message {
        return Some(InboundEvent::Message(to_incoming(message)));
    }

    let query = update.callback_query?;
    // Buttons on inline-mode messages carry no chat; there is nothing to reply to.
    let message = query.message?;
    Some(InboundEvent::Callback(CallbackQuery {
        id: query.id,
        chat_id: message.chat.id.to_string(),
        message_text: message.text,
        payload: query.data,
        sender_id: Some(query.from.id.to_string()),
    }))
}

fn to_incoming(message: TgMessage) -> IncomingMessage {
    IncomingMessage {
        chat_id: message.chat.id.to_string(),
        chat_type: ChatType::from_platform(&message.chat.kind),
        sender_id: message.from.as_ref().map(|u| u.id.to_string()),
        sender_name: message
            .from
            .and_then(|u| u.username.or(u.first_name)),
        text: message.text,
        sent_at: DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now),
    }
}

/// Render a keyboard as a Bot API `reply_markup`.
fn keyboard_markup(keyboard: &InlineKeyboard) -> Value {
    let rows: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| json!({ "text": b.label, "callback_data": b.payload }))
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    api: BotApi,
    poller: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        let api = BotApi::new(&config);
        Self {
            config,
            api,
            poller: tokio::sync::Mutex::new(None),
        }
    }
}

async fn poll_updates(
    api: BotApi,
    poll_timeout_secs: u64,
    tx: mpsc::Sender<Result<InboundEvent, ChannelError>>,
) {
    let mut offset: i64 = 0;
    loop {
        let body = json!({
            "offset": offset,
            "timeout": poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });

        let updates: Vec<Update> = match api.call("getUpdates", body).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Telegram poll failed");
                if tx.send(Err(e)).await.is_err() {
                    return;
                }
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let update_id = update.update_id;
            match parse_update(update) {
                Some(event) => {
                    if tx.send(Ok(event)).await.is_err() {
                        debug!("Telegram receiver dropped, stopping poller");
                        return;
                    }
                }
                None => debug!(update_id, "Ignoring unsupported update"),
            }
        }
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        info!(api_base = %self.config.api_base, "Telegram channel starting");
        let (tx, rx) = mpsc::channel(64);
        let handle = tokio::spawn(poll_updates(
            self.api.clone(),
            self.config.poll_timeout_secs,
            tx,
        ));
        if let Some(previous) = self.poller.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "chat_id": chat_id, "text": content });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = keyboard_markup(keyboard);
        }
        let _: Value = self.api.call("sendMessage", body).await?;
        debug!(
            chat_id = %chat_id,
            buttons = keyboard.map_or(0, InlineKeyboard::button_count),
            "Telegram message sent"
        );
        Ok(())
    }

    async fn send_media(&self, chat_id: &str, media: &MediaItem) -> Result<(), ChannelError> {
        let (method, field) = match media.format {
            MediaFormat::Photo => ("sendPhoto", "photo"),
            MediaFormat::Animation => ("sendDocument", "document"),
        };
        let mut body = json!({ "chat_id": chat_id });
        body[field] = json!(media.url);
        let _: Value = self.api.call(method, body).await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        let _: bool = self
            .api
            .call(
                "answerCallbackQuery",
                json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }

    async fn chat_administrators(&self, chat_id: &str) -> Result<Vec<ChatMember>, ChannelError> {
        let members: Vec<TgChatMember> = self
            .api
            .call("getChatAdministrators", json!({ "chat_id": chat_id }))
            .await?;

        Ok(members
            .into_iter()
            .map(|m| ChatMember {
                user_id: m.user.id.to_string(),
                username: m.user.username,
            })
            .collect())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        info!("Telegram channel stopping");
        if let Some(handle) = self.poller.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, ChannelError> {
        let me: Value = self.api.call("getMe", json!({})).await?;
        Ok(me.get("is_bot").and_then(Value::as_bool).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trufa_core::channel::InlineButton;

    fn test_config() -> TelegramConfig {
        TelegramConfig {
            bot_token: "test-token-123".into(),
            api_base: "http://127.0.0.1:9".into(),
            poll_timeout_secs: 1,
        }
    }

    fn update(value: Value) -> Update {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn config_requires_token() {
        let err = TelegramConfig::from_settings(&TelegramSettings::default()).unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));

        let settings = TelegramSettings {
            bot_token: Some("abc".into()),
            ..TelegramSettings::default()
        };
        let config = TelegramConfig::from_settings(&settings).unwrap();
        assert_eq!(config.bot_token, "abc");
        assert_eq!(config.api_base, "https://api.telegram.org");
    }

    #[test]
    fn debug_redacts_token() {
        let debug = format!("{:?}", test_config());
        assert!(!debug.contains("test-token-123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn parses_group_text_message() {
        let event = parse_update(update(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1_700_000_000,
                "chat": {"id": -100123, "type": "supergroup", "title": "Mesa"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ana", "username": "ana"},
                "text": "trufa dame un gato"
            }
        })))
        .unwrap();

        let InboundEvent::Message(msg) = event else {
            panic!("expected a message");
        };
        assert_eq!(msg.chat_id, "-100123");
        assert_eq!(msg.chat_type, ChatType::Supergroup);
        assert_eq!(msg.sender_id.as_deref(), Some("7"));
        assert_eq!(msg.sender_name.as_deref(), Some("ana"));
        assert_eq!(msg.text.as_deref(), Some("trufa dame un gato"));
        assert_eq!(msg.sent_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn parses_sticker_as_textless_message() {
        let event = parse_update(update(json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "date": 1_700_000_000,
                "chat": {"id": 5, "type": "private"},
                "sticker": {"file_id": "x"}
            }
        })))
        .unwrap();

        let InboundEvent::Message(msg) = event else {
            panic!("expected a message");
        };
        assert!(msg.text.is_none());
        assert!(msg.chat_type.is_private());
    }

    #[test]
    fn parses_callback_query() {
        let event = parse_update(update(json!({
            "update_id": 12,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 7, "first_name": "Ana"},
                "message": {
                    "message_id": 3,
                    "date": 1_700_000_000,
                    "chat": {"id": 5, "type": "private"},
                    "text": "Conozco varias respuestas para \"hola\", cual olvido?\n1. a\n2. b"
                },
                "data": "{\"command\":\"deletePhrase\",\"index\":1}"
            }
        })))
        .unwrap();

        let InboundEvent::Callback(cb) = event else {
            panic!("expected a callback");
        };
        assert_eq!(cb.id, "cb-1");
        assert_eq!(cb.chat_id, "5");
        assert!(cb.message_text.unwrap().starts_with("Conozco"));
        assert!(cb.payload.unwrap().contains("deletePhrase"));
    }

    #[test]
    fn ignores_unsupported_updates() {
        assert!(parse_update(update(json!({"update_id": 13, "edited_message": {}}))).is_none());
    }

    #[test]
    fn keyboard_renders_inline_markup() {
        let keyboard = InlineKeyboard::chunked(
            (1..=3)
                .map(|n| InlineButton {
                    label: n.to_string(),
                    payload: format!("p{n}"),
                })
                .collect(),
            2,
        );
        let markup = keyboard_markup(&keyboard);
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1]["text"], "2");
        assert_eq!(rows[1][0]["callback_data"], "p3");
    }

    #[test]
    fn api_error_response_is_decoded() {
        let parsed: ApiResponse<Value> = serde_json::from_value(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        }))
        .unwrap();
        assert!(!parsed.ok);
        assert!(parsed.result.is_none());
        assert_eq!(parsed.description.as_deref(), Some("Bad Request: chat not found"));
    }

    #[tokio::test]
    async fn send_to_unreachable_api_fails_with_delivery_error() {
        let ch = TelegramChannel::new(test_config());
        assert_eq!(ch.name(), "telegram");
        let err = ch.send("1", "hola", None).await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { .. }));
        assert!(!err.to_string().contains("test-token-123"));
    }

    #[tokio::test]
    async fn start_and_stop() {
        let ch = TelegramChannel::new(test_config());
        let mut rx = ch.start().await.unwrap();
        // First poll hits the unreachable API and reports the failure.
        let first = rx.recv().await.unwrap();
        assert!(first.is_err());
        ch.stop().await.unwrap();
    }
}
