//! # Trufa Core
//!
//! Domain types, traits, and error definitions for the Trufa chat bot.
//! This crate has **no framework dependencies**: it defines the domain model
//! that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every collaborator the bot talks to is a trait here. Implementations live
//! in their respective crates:
//! - [`Channel`]: the chat platform (Telegram, CLI)
//! - [`PhraseCollection`]: the document store holding learned phrases
//! - [`MediaSource`]: picture lookups
//! - [`Clock`]: wall-clock time, swappable in tests

pub mod channel;
pub mod clock;
pub mod error;
pub mod media;
pub mod phrase;

// Re-export key types at crate root for ergonomics
pub use channel::{
    CallbackQuery, Channel, ChatMember, ChatType, InboundEvent, IncomingMessage, InlineButton,
    InlineKeyboard,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use media::{MediaFormat, MediaItem, MediaKind, MediaSource};
pub use phrase::{PhraseCollection, PhraseEntry, PhraseFilter};
