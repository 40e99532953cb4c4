//! Chat channel implementations for Trufa.
//!
//! Each channel connects to a chat platform and relays messages and button
//! presses to the dispatcher.
//!
//! Available channels:
//! - **Telegram**: Telegram Bot API over long polling
//! - **CLI**: interactive terminal chat (stdin/stdout), with `/pick N` for buttons

pub mod cli;
pub mod telegram;

pub use cli::CliChannel;
pub use telegram::{TelegramChannel, TelegramConfig};
