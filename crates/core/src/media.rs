//! Media lookup trait: where cat and dog pictures come from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Cat,
    Dog,
}

/// How the platform should deliver a media URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    /// Still picture
    Photo,
    /// GIF, sent as a document so it keeps animating
    Animation,
}

/// A resolved piece of media ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    pub format: MediaFormat,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve a random picture of the requested kind.
    async fn fetch(&self, kind: MediaKind) -> std::result::Result<MediaItem, MediaError>;
}
