//! Picture lookups for the "dame un gato / dame un perro" commands.
//!
//! Two public APIs are used:
//! - TheCatAPI: `GET /v1/images/search` → `[{"url": "..."}]`, optionally
//!   restricted to GIFs with `?mime_types=gif`
//! - Dog CEO: `GET /api/breeds/image/random` → `{"message": "...", "status": "success"}`

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use trufa_config::MediaConfig;
use trufa_core::error::MediaError;
use trufa_core::media::{MediaFormat, MediaItem, MediaKind, MediaSource};

/// Media source backed by the public cat and dog HTTP APIs.
pub struct HttpMediaSource {
    client: reqwest::Client,
    cat_api: String,
    cat_gif_api: String,
    dog_api: String,
    gif_chance: f64,
}

#[derive(Debug, Deserialize)]
struct CatImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DogImage {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl HttpMediaSource {
    pub fn new(config: &MediaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            cat_api: config.cat_api.clone(),
            cat_gif_api: config.cat_gif_api.clone(),
            dog_api: config.dog_api.clone(),
            gif_chance: config.gif_chance,
        }
    }

    /// Pick the cat endpoint and delivery format for a coin flip.
    fn cat_endpoint(&self, want_gif: bool) -> (&str, MediaFormat) {
        if want_gif {
            (&self.cat_gif_api, MediaFormat::Animation)
        } else {
            (&self.cat_api, MediaFormat::Photo)
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, MediaError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Request(format!(
                "{url} answered HTTP {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))
    }
}

/// Extract the first image URL from a TheCatAPI search response.
fn parse_cat_response(body: serde_json::Value) -> Result<String, MediaError> {
    let images: Vec<CatImage> =
        serde_json::from_value(body).map_err(|e| MediaError::InvalidResponse(e.to_string()))?;
    images
        .into_iter()
        .next()
        .map(|image| image.url)
        .ok_or_else(|| MediaError::InvalidResponse("cat search returned no images".into()))
}

/// Extract the image URL from a Dog CEO response.
fn parse_dog_response(body: serde_json::Value) -> Result<String, MediaError> {
    let image: DogImage =
        serde_json::from_value(body).map_err(|e| MediaError::InvalidResponse(e.to_string()))?;
    if image.status.as_deref().is_some_and(|s| s != "success") {
        return Err(MediaError::InvalidResponse(format!(
            "dog api status: {}",
            image.status.unwrap_or_default()
        )));
    }
    Ok(image.message)
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, kind: MediaKind) -> Result<MediaItem, MediaError> {
        match kind {
            MediaKind::Cat => {
                let want_gif = rand::random_bool(self.gif_chance);
                let (endpoint, format) = self.cat_endpoint(want_gif);
                debug!(endpoint, ?format, "Fetching cat");
                let url = parse_cat_response(self.get_json(endpoint).await?)?;
                Ok(MediaItem { url, format })
            }
            MediaKind::Dog => {
                debug!(endpoint = %self.dog_api, "Fetching dog");
                let url = parse_dog_response(self.get_json(&self.dog_api).await?)?;
                Ok(MediaItem {
                    url,
                    format: MediaFormat::Photo,
                })
            }
        }
    }
}
