//! Event dispatch: classify, check scope, act, reply.
//!
//! The dispatcher owns all mutable bot state (mute windows, correlation
//! records, the response picker) and handles one event at a time through
//! `&mut self`.

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trufa_config::AppConfig;
use trufa_core::channel::{CallbackQuery, Channel, ChatType, InboundEvent, IncomingMessage};
use trufa_core::clock::Clock;
use trufa_core::error::Error;
use trufa_core::media::{MediaKind, MediaSource};

use crate::classifier::{Classifier, Intent};
use crate::disambiguation::{Disambiguator, ForgetStart, Resolution};
use crate::mute;
use crate::outbox::{Delivery, Outbox};
use crate::phrases::{LearnOutcome, PhraseStore};
use crate::replies;

/// Routes inbound events to the phrase store, the disambiguation protocol,
/// the mute windows or a direct reply.
pub struct Dispatcher {
    classifier: Classifier,
    phrases: PhraseStore,
    disambiguator: Disambiguator,
    outbox: Outbox,
    media: Arc<dyn MediaSource>,
    clock: Arc<dyn Clock>,
    default_mute_minutes: u32,
}

impl Dispatcher {
    pub fn new(
        config: &AppConfig,
        phrases: PhraseStore,
        channel: Arc<dyn Channel>,
        media: Arc<dyn MediaSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        Ok(Self {
            classifier: Classifier::from_config(&config.bot)?,
            phrases,
            disambiguator: Disambiguator::new(&config.disambiguation),
            outbox: Outbox::new(channel, Arc::clone(&clock)),
            media,
            clock,
            default_mute_minutes: config.bot.default_mute_minutes,
        })
    }

    pub async fn handle_event(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::Message(message) => {
                self.handle_message(message).await;
            }
            InboundEvent::Callback(callback) => {
                self.handle_callback(callback).await;
            }
        }
    }

    /// Handle one chat message. Returns the intent it was classified as.
    pub async fn handle_message(&mut self, message: &IncomingMessage) -> Intent {
        let intent = self.classifier.classify(message, self.clock.now());
        let chat_id = message.chat_id.as_str();
        debug!(chat_id, intent = intent.name(), "Classified message");

        match &intent {
            Intent::None => {}
            Intent::KnownPhraseLookup { text } => self.answer_known_phrase(chat_id, text).await,
            Intent::Learn { trigger, response } => {
                if self.require_private(chat_id, message.chat_type).await {
                    self.learn(chat_id, trigger, response).await;
                }
            }
            Intent::Forget { trigger } => {
                if self.require_private(chat_id, message.chat_type).await {
                    self.forget(chat_id, trigger).await;
                }
            }
            Intent::SendMedia { kind } => self.send_media(chat_id, *kind).await,
            Intent::AdminSpam => {
                if self.require_group(chat_id, message.chat_type).await {
                    self.admin_spam(chat_id).await;
                }
            }
            Intent::StartGame => {
                if self.require_group(chat_id, message.chat_type).await {
                    self.reply(chat_id, replies::GAME_START).await;
                    self.admin_spam(chat_id).await;
                }
            }
            Intent::SayThis { text } => self.reply(chat_id, text).await,
            Intent::ShutUp { minutes } => self.shut_up(chat_id, *minutes).await,
            Intent::Unmute => {
                let text = if self.outbox.unmute(chat_id) {
                    info!(chat_id, "Unmuted");
                    replies::UNMUTED
                } else {
                    replies::ALREADY_SPEAKING
                };
                self.reply(chat_id, text).await;
            }
        }

        intent
    }

    /// Handle an inline-button press.
    ///
    /// Unusable callbacks are logged and left unacknowledged. Returns the
    /// resolution when the press could be interpreted.
    pub async fn handle_callback(&mut self, callback: &CallbackQuery) -> Option<Resolution> {
        let chat_id = callback.chat_id.as_str();
        let result = self
            .disambiguator
            .resolve(&self.phrases, callback, self.clock.now())
            .await;

        let resolution = match result {
            Ok(resolution) => resolution,
            Err(Error::Protocol(e)) => {
                error!(callback_id = %callback.id, chat_id, error = %e, "Unusable callback");
                return None;
            }
            Err(e) => {
                error!(callback_id = %callback.id, chat_id, error = %e, "Callback resolution failed");
                self.acknowledge(&callback.id).await;
                self.reply(chat_id, replies::FORGET_FAILED).await;
                return None;
            }
        };

        self.acknowledge(&callback.id).await;
        let text = match &resolution {
            Resolution::Removed(entry) => {
                info!(chat_id, trigger = %entry.trigger, "Phrase forgotten by selection");
                replies::PHRASE_REMOVED
            }
            Resolution::AlreadyGone(_) => replies::PHRASE_NOT_FOUND,
            Resolution::StaleIndex { index, available } => {
                debug!(chat_id, index, available, "Selection out of range");
                replies::STALE_SELECTION
            }
        };
        self.reply(chat_id, text).await;
        Some(resolution)
    }

    // --- intent handlers ---

    async fn answer_known_phrase(&mut self, chat_id: &str, text: &str) {
        // Ambient lookups are skipped outright while muted.
        if self.outbox.check_and_clear_expired_mute(chat_id) {
            return;
        }
        match self.phrases.pick_random(text).await {
            Ok(Some(response)) => self.reply(chat_id, &response).await,
            Ok(None) => {}
            Err(e) => error!(chat_id, error = %e, "Phrase lookup failed"),
        }
    }

    async fn learn(&mut self, chat_id: &str, trigger: &str, response: &str) {
        let text = match self.phrases.learn(trigger, response).await {
            Ok(LearnOutcome::Learned) => replies::LEARNED,
            Ok(LearnOutcome::AlreadyExists) => replies::ALREADY_KNOWN,
            Ok(LearnOutcome::TriggerTooShort) => replies::TRIGGER_TOO_SHORT,
            Ok(LearnOutcome::EmptyResponse) => replies::EMPTY_RESPONSE,
            Err(e) => {
                error!(chat_id, trigger, error = %e, "Could not store phrase");
                replies::LEARN_FAILED
            }
        };
        self.reply(chat_id, text).await;
    }

    async fn forget(&mut self, chat_id: &str, trigger: &str) {
        let started = self
            .disambiguator
            .start(&self.phrases, chat_id, trigger, self.clock.now())
            .await;

        match started {
            Ok(ForgetStart::NotFound) => self.reply(chat_id, replies::PHRASE_NOT_FOUND).await,
            Ok(ForgetStart::Removed(_)) => self.reply(chat_id, replies::PHRASE_REMOVED).await,
            Ok(ForgetStart::Prompt {
                text,
                keyboard,
                pending,
            }) => match self.outbox.send_with_keyboard(chat_id, &text, &keyboard).await {
                Ok(Delivery::Sent) => {
                    if let Some(pending) = pending {
                        self.disambiguator.commit(pending, self.clock.now());
                    }
                }
                Ok(Delivery::Suppressed) => debug!(chat_id, "Forget prompt dropped while muted"),
                Err(e) => warn!(chat_id, error = %e, "Could not send forget prompt"),
            },
            Err(e) => {
                error!(chat_id, trigger, error = %e, "Could not forget phrase");
                self.reply(chat_id, replies::FORGET_FAILED).await;
            }
        }
    }

    async fn send_media(&mut self, chat_id: &str, kind: MediaKind) {
        if self.outbox.check_and_clear_expired_mute(chat_id) {
            return;
        }
        let item = match self.media.fetch(kind).await {
            Ok(item) => item,
            Err(e) => {
                warn!(chat_id, ?kind, error = %e, "Media lookup failed");
                return;
            }
        };
        if let Err(e) = self.outbox.send_media(chat_id, &item).await {
            warn!(chat_id, url = %item.url, error = %e, "Could not send media");
        }
    }

    /// Mention every administrator that has a username.
    async fn admin_spam(&mut self, chat_id: &str) {
        if self.outbox.check_and_clear_expired_mute(chat_id) {
            return;
        }
        let admins = match self.outbox.chat_administrators(chat_id).await {
            Ok(admins) => admins,
            Err(e) => {
                warn!(chat_id, error = %e, "Could not list chat administrators");
                return;
            }
        };

        let mentions: String = admins
            .iter()
            .filter_map(|admin| admin.username.as_deref())
            .map(|username| format!(" @{username}"))
            .collect();

        if mentions.is_empty() {
            debug!(chat_id, "No administrator has a username");
            return;
        }
        self.reply(chat_id, &mentions).await;
    }

    async fn shut_up(&mut self, chat_id: &str, requested: Option<i64>) {
        if self.outbox.check_and_clear_expired_mute(chat_id) {
            debug!(chat_id, "Already muted");
            return;
        }
        let minutes = mute::effective_minutes(requested, self.default_mute_minutes);
        // Say goodbye before the window starts, or the goodbye is dropped too.
        self.reply(chat_id, &replies::muted_for(minutes)).await;
        self.outbox.mute(chat_id, Some(minutes), self.default_mute_minutes);
        info!(chat_id, minutes, "Muted");
    }

    // --- scope checks ---

    async fn require_private(&mut self, chat_id: &str, chat_type: ChatType) -> bool {
        if chat_type.is_private() {
            return true;
        }
        self.reply(chat_id, replies::PRIVATE_ONLY).await;
        false
    }

    async fn require_group(&mut self, chat_id: &str, chat_type: ChatType) -> bool {
        if chat_type.is_group() {
            return true;
        }
        self.reply(chat_id, replies::GROUP_ONLY).await;
        false
    }

    // --- delivery ---

    async fn reply(&mut self, chat_id: &str, text: &str) {
        if let Err(e) = self.outbox.send(chat_id, text).await {
            warn!(chat_id, error = %e, "Reply failed");
        }
    }

    async fn acknowledge(&self, callback_id: &str) {
        if let Err(e) = self.outbox.acknowledge(callback_id).await {
            warn!(callback_id, error = %e, "Callback acknowledgment failed");
        }
    }
}
