//! Error types for the Trufa domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Trufa operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Phrase storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Media lookup errors ---
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    // --- Callback protocol errors ---
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Platform API call {method} rejected: {description}")]
    Api { method: String, description: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid platform payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media request failed: {0}")]
    Request(String),

    #[error("Unexpected media response: {0}")]
    InvalidResponse(String),
}

/// Failures decoding the inline-button callback protocol.
///
/// These are unrecoverable for the callback that caused them: the event is
/// logged and the callback stays unacknowledged.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed callback payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown callback command: {0}")]
    UnknownCommand(String),

    #[error("Cannot recover trigger from prompt text: {0}")]
    PromptUnparsable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_error_displays_correctly() {
        let err = Error::Channel(ChannelError::Api {
            method: "sendMessage".into(),
            description: "Bad Request: chat not found".into(),
        });
        assert!(err.to_string().contains("sendMessage"));
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn protocol_error_converts_into_top_level() {
        let err: Error = ProtocolError::UnknownCommand("launchRockets".into()).into();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(err.to_string().contains("launchRockets"));
    }

    #[test]
    fn store_error_displays_correctly() {
        let err = Error::Store(StoreError::QueryFailed("connection refused".into()));
        assert!(err.to_string().contains("connection refused"));
    }
}
