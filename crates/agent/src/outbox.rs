//! Mute-gated outbound delivery.
//!
//! All sends from the dispatcher go through here. Each send first clears a
//! lapsed mute window for the chat; if the chat is still muted the send is
//! dropped and reported as [`Delivery::Suppressed`].

use std::sync::Arc;
use tracing::debug;
use trufa_core::channel::{Channel, ChatMember, InlineKeyboard};
use trufa_core::clock::Clock;
use trufa_core::error::ChannelError;
use trufa_core::media::MediaItem;

use crate::mute::MuteRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Dropped because the chat is muted
    Suppressed,
}

pub struct Outbox {
    channel: Arc<dyn Channel>,
    clock: Arc<dyn Clock>,
    mutes: MuteRegistry,
}

impl Outbox {
    pub fn new(channel: Arc<dyn Channel>, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel,
            clock,
            mutes: MuteRegistry::new(),
        }
    }

    /// Clear a lapsed window for `chat_id`. Returns whether it is still muted.
    pub fn check_and_clear_expired_mute(&mut self, chat_id: &str) -> bool {
        self.mutes.check_and_clear_expired(chat_id, self.clock.now())
    }

    pub fn is_muted(&self, chat_id: &str) -> bool {
        self.mutes.is_muted(chat_id, self.clock.now())
    }

    pub fn mute(&mut self, chat_id: &str, requested_minutes: Option<i64>, default_minutes: u32) {
        self.mutes
            .mute(chat_id, self.clock.now(), requested_minutes, default_minutes);
    }

    /// Returns whether the chat was muted.
    pub fn unmute(&mut self, chat_id: &str) -> bool {
        self.mutes.unmute(chat_id, self.clock.now())
    }

    pub async fn send(&mut self, chat_id: &str, text: &str) -> Result<Delivery, ChannelError> {
        if self.check_and_clear_expired_mute(chat_id) {
            debug!(chat_id, "Muted, dropping message");
            return Ok(Delivery::Suppressed);
        }
        self.channel.send(chat_id, text, None).await?;
        Ok(Delivery::Sent)
    }

    pub async fn send_with_keyboard(
        &mut self,
        chat_id: &str,
        text: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<Delivery, ChannelError> {
        if self.check_and_clear_expired_mute(chat_id) {
            debug!(chat_id, "Muted, dropping prompt");
            return Ok(Delivery::Suppressed);
        }
        self.channel.send(chat_id, text, Some(keyboard)).await?;
        Ok(Delivery::Sent)
    }

    pub async fn send_media(
        &mut self,
        chat_id: &str,
        media: &MediaItem,
    ) -> Result<Delivery, ChannelError> {
        if self.check_and_clear_expired_mute(chat_id) {
            debug!(chat_id, "Muted, dropping media");
            return Ok(Delivery::Suppressed);
        }
        self.channel.send_media(chat_id, media).await?;
        Ok(Delivery::Sent)
    }

    /// Acknowledgments only stop the platform's spinner; they are not gated.
    pub async fn acknowledge(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.channel.acknowledge(callback_id).await
    }

    pub async fn chat_administrators(&self, chat_id: &str) -> Result<Vec<ChatMember>, ChannelError> {
        self.channel.chat_administrators(chat_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingChannel, Sent, t0};
    use chrono::Duration;
    use trufa_core::clock::ManualClock;
    use trufa_core::media::MediaFormat;

    fn outbox() -> (Outbox, Arc<RecordingChannel>, Arc<ManualClock>) {
        let channel = Arc::new(RecordingChannel::new());
        let clock = Arc::new(ManualClock::new(t0()));
        (
            Outbox::new(channel.clone(), clock.clone()),
            channel,
            clock,
        )
    }

    #[tokio::test]
    async fn sends_when_not_muted() {
        let (mut outbox, channel, _) = outbox();
        assert_eq!(outbox.send("1", "hola").await.unwrap(), Delivery::Sent);
        assert_eq!(channel.texts("1"), ["hola"]);
    }

    #[tokio::test]
    async fn muted_sends_are_dropped_until_window_lapses() {
        let (mut outbox, channel, clock) = outbox();
        outbox.mute("1", Some(5), 10);

        assert_eq!(outbox.send("1", "hola").await.unwrap(), Delivery::Suppressed);
        let cat = MediaItem {
            url: "https://example.com/cat.jpg".into(),
            format: MediaFormat::Photo,
        };
        assert_eq!(outbox.send_media("1", &cat).await.unwrap(), Delivery::Suppressed);
        assert!(channel.sent().is_empty());

        // Other chats are unaffected.
        assert_eq!(outbox.send("2", "hola").await.unwrap(), Delivery::Sent);

        clock.advance(Duration::minutes(5));
        assert!(!outbox.is_muted("1"));
        assert_eq!(outbox.send("1", "ya").await.unwrap(), Delivery::Sent);
        assert_eq!(channel.texts("1"), ["ya"]);
    }

    #[tokio::test]
    async fn acknowledge_ignores_mute() {
        let (mut outbox, channel, _) = outbox();
        outbox.mute("1", None, 10);
        outbox.acknowledge("cb").await.unwrap();
        assert_eq!(channel.sent(), vec![Sent::Ack("cb".into())]);
    }

    #[tokio::test]
    async fn channel_failure_surfaces() {
        let channel = Arc::new(RecordingChannel::failing());
        let mut outbox = Outbox::new(channel, Arc::new(ManualClock::new(t0())));
        assert!(outbox.send("1", "hola").await.is_err());
    }
}
