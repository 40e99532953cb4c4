//! Configuration loading, validation, and management for Trufa.
//!
//! Loads configuration from `~/.trufa/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.trufa/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Bot personality and classification settings
    #[serde(default)]
    pub bot: BotConfig,

    /// How ambiguous forget requests are correlated with button presses
    #[serde(default)]
    pub disambiguation: DisambiguationConfig,

    /// Where learned phrases live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Picture lookup endpoints
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Names the bot answers to in command phrases ("trufa dame un gato")
    #[serde(default = "default_aliases")]
    pub aliases: Vec<String>,

    /// Messages older than this are ignored (protects against backlog on reconnect)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Mute length when the user does not give one. Applied lengths are
    /// capped at one week.
    #[serde(default = "default_mute_minutes")]
    pub default_mute_minutes: u32,
}

fn default_aliases() -> Vec<String> {
    vec!["trufa".into(), "amigo".into()]
}
fn default_stale_after_secs() -> u64 {
    60
}
fn default_mute_minutes() -> u32 {
    10
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            aliases: default_aliases(),
            stale_after_secs: default_stale_after_secs(),
            default_mute_minutes: default_mute_minutes(),
        }
    }
}

/// How a button press finds the candidates it refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisambiguationMode {
    /// Keep a short-lived snapshot keyed by a token carried in the button
    /// payload; fall back to re-parsing when the snapshot is gone.
    #[default]
    Correlation,
    /// Always recover the trigger from the prompt text and re-query the store.
    Reparse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisambiguationConfig {
    #[serde(default)]
    pub mode: DisambiguationMode,

    /// Lifetime of a correlation record
    #[serde(default = "default_correlation_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum correlation records held at once (oldest evicted first)
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_correlation_ttl_secs() -> u64 {
    900
}
fn default_max_pending() -> usize {
    64
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            mode: DisambiguationMode::default(),
            ttl_secs: default_correlation_ttl_secs(),
            max_pending: default_max_pending(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "file" (JSONL), "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// Override the backend's default location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_storage_backend() -> String {
    "file".into()
}

const STORAGE_BACKENDS: &[&str] = &["file", "sqlite", "memory"];

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

impl StorageConfig {
    /// Resolved location for file-based backends.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None => match self.backend.as_str() {
                "sqlite" => AppConfig::config_dir().join("phrases.sqlite"),
                _ => AppConfig::config_dir().join("phrases.jsonl"),
            },
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Long-poll timeout passed to getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout_secs() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_telegram_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_cat_api")]
    pub cat_api: String,

    #[serde(default = "default_cat_gif_api")]
    pub cat_gif_api: String,

    #[serde(default = "default_dog_api")]
    pub dog_api: String,

    /// Probability of sending a cat GIF instead of a still picture
    #[serde(default = "default_gif_chance")]
    pub gif_chance: f64,

    #[serde(default = "default_media_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cat_api() -> String {
    "https://api.thecatapi.com/v1/images/search".into()
}
fn default_cat_gif_api() -> String {
    "https://api.thecatapi.com/v1/images/search?mime_types=gif".into()
}
fn default_dog_api() -> String {
    "https://dog.ceo/api/breeds/image/random".into()
}
fn default_gif_chance() -> f64 {
    0.5
}
fn default_media_timeout_secs() -> u64 {
    10
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            cat_api: default_cat_api(),
            cat_gif_api: default_cat_gif_api(),
            dog_api: default_dog_api(),
            gif_chance: default_gif_chance(),
            timeout_secs: default_media_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.trufa/config.toml).
    ///
    /// Environment variables override the file:
    /// - `TRUFA_BOT_TOKEN` (highest priority), then `TELEGRAM_BOT_TOKEN`
    /// - `TRUFA_STORAGE_BACKEND`
    /// - `TRUFA_STORAGE_PATH`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        let token = std::env::var("TRUFA_BOT_TOKEN")
            .ok()
            .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
            .filter(|t| !t.trim().is_empty());
        if token.is_some() {
            self.telegram.bot_token = token;
        }

        if let Ok(backend) = std::env::var("TRUFA_STORAGE_BACKEND") {
            self.storage.backend = backend;
        }

        if let Ok(path) = std::env::var("TRUFA_STORAGE_PATH") {
            self.storage.path = Some(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".trufa")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bot.aliases.iter().any(|a| !a.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "bot.aliases must contain at least one non-blank name".into(),
            ));
        }

        if self.bot.stale_after_secs == 0 {
            return Err(ConfigError::ValidationError(
                "bot.stale_after_secs must be > 0".into(),
            ));
        }

        if self.bot.default_mute_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "bot.default_mute_minutes must be > 0".into(),
            ));
        }

        if self.disambiguation.max_pending == 0 {
            return Err(ConfigError::ValidationError(
                "disambiguation.max_pending must be > 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.media.gif_chance) {
            return Err(ConfigError::ValidationError(
                "media.gif_chance must be between 0.0 and 1.0".into(),
            ));
        }

        if !STORAGE_BACKENDS.contains(&self.storage.backend.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "storage.backend must be one of {}, got '{}'",
                STORAGE_BACKENDS.join(", "),
                self.storage.backend
            )));
        }

        Ok(())
    }

    /// Check if a Telegram bot token is available (from config or environment).
    pub fn has_bot_token(&self) -> bool {
        self.telegram
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
