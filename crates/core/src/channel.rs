//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects Trufa to a messaging platform (Telegram, CLI). It
//! delivers inbound messages and inline-button callbacks, and exposes the
//! outbound primitives the dispatcher needs: text (optionally with an inline
//! keyboard), media, callback acknowledgment and the admin-list lookup.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::media::MediaItem;

/// The kind of conversation a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-to-one conversation with the bot
    Private,
    Group,
    Supergroup,
    /// Broadcast channel
    Channel,
}

impl ChatType {
    /// Parse a platform chat type string. Unknown kinds are treated as
    /// broadcast channels, the most restricted scope.
    pub fn from_platform(kind: &str) -> Self {
        match kind {
            "private" => Self::Private,
            "group" => Self::Group,
            "supergroup" => Self::Supergroup,
            _ => Self::Channel,
        }
    }

    pub fn is_private(self) -> bool {
        self == Self::Private
    }

    /// Group or supergroup.
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

/// A chat message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// The chat/group/DM identifier within the platform
    pub chat_id: String,

    pub chat_type: ChatType,

    /// Sender identifier (platform-specific user ID)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// Text content; `None` for stickers, photos and other non-text messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// When the platform says the message was sent
    pub sent_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Build a text message, mostly useful for tests and the CLI channel.
    pub fn text(
        chat_id: impl Into<String>,
        chat_type: ChatType,
        text: impl Into<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            chat_type,
            sender_id: None,
            sender_name: None,
            text: Some(text.into()),
            sent_at,
        }
    }
}

/// An inline-button press.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Platform callback identifier, used for acknowledgment
    pub id: String,

    /// Chat holding the message the button was attached to
    pub chat_id: String,

    /// Text of the message the button was attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_text: Option<String>,

    /// Raw button payload (JSON string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

/// Everything a channel can deliver to the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(IncomingMessage),
    Callback(CallbackQuery),
}

/// A single inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

/// An inline button grid: ordered rows, each an ordered run of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// Lay `buttons` out in rows of at most `row_size` buttons, keeping order.
    pub fn chunked(buttons: Vec<InlineButton>, row_size: usize) -> Self {
        let row_size = row_size.max(1);
        let rows = buttons
            .chunks(row_size)
            .map(<[InlineButton]>::to_vec)
            .collect();
        Self { rows }
    }

    /// Total number of buttons across all rows.
    pub fn button_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Buttons in display order.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// A chat administrator as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMember {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The core Channel trait.
///
/// Implementations handle platform-specific connection logic, payload
/// formatting and API errors.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Start listening for inbound events.
    ///
    /// Returns a receiver that yields messages and callbacks. The channel
    /// implementation handles polling or stdin reading internally.
    async fn start(
        &self,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<InboundEvent, ChannelError>>,
        ChannelError,
    >;

    /// Send a text message, optionally with an inline keyboard.
    async fn send(
        &self,
        chat_id: &str,
        content: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> std::result::Result<(), ChannelError>;

    /// Send a picture or animation by URL.
    async fn send_media(
        &self,
        chat_id: &str,
        media: &MediaItem,
    ) -> std::result::Result<(), ChannelError>;

    /// Acknowledge a callback so the platform stops its loading indicator.
    async fn acknowledge(&self, callback_id: &str) -> std::result::Result<(), ChannelError>;

    /// List the administrators of a group chat.
    async fn chat_administrators(
        &self,
        chat_id: &str,
    ) -> std::result::Result<Vec<ChatMember>, ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> std::result::Result<(), ChannelError> {
        Ok(())
    }

    /// Is the channel connected and operational?
    async fn health_check(&self) -> std::result::Result<bool, ChannelError> {
        Ok(true)
    }
}
