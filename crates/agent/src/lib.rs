//! The Trufa bot brain.
//!
//! Every inbound event goes through the same pipeline:
//!
//! 1. **Classify** the message text into a single [`Intent`]
//! 2. **Dispatch** it: learn, forget, fetch media, mute, or answer from the
//!    phrase store
//! 3. **Deliver** replies through the [`Outbox`], which drops anything
//!    addressed to a muted chat
//!
//! Inline-button presses that pick a phrase to forget are resolved by the
//! [`Disambiguator`].

pub mod classifier;
pub mod disambiguation;
pub mod dispatcher;
pub mod loop_runner;
pub mod mute;
pub mod outbox;
pub mod phrases;
pub mod replies;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use classifier::{Classifier, Intent};
pub use disambiguation::{CallbackPayload, Disambiguator, ForgetStart, PendingPrompt, Resolution};
pub use dispatcher::Dispatcher;
pub use loop_runner::{BotLoop, LoopStats};
pub use mute::{MuteRegistry, MuteWindow};
pub use outbox::{Delivery, Outbox};
pub use phrases::{LearnOutcome, PhraseStore, RandomPicker, ResponsePicker};
