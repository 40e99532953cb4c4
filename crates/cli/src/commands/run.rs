//! `trufa run`: serve Telegram chats.

use std::sync::Arc;
use tracing::info;
use trufa_channels::{TelegramChannel, TelegramConfig};
use trufa_core::channel::Channel;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    if !config.has_bot_token() {
        eprintln!();
        eprintln!("  ERROR: No Telegram bot token configured!");
        eprintln!();
        eprintln!("  Export one of these environment variables:");
        eprintln!("    TRUFA_BOT_TOKEN=123456:ABC...");
        eprintln!("    TELEGRAM_BOT_TOKEN=123456:ABC...");
        eprintln!();
        eprintln!("  Or add it to your config file under [telegram]:");
        eprintln!("    {}", trufa_config::AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No bot token found. See above for setup instructions.".into());
    }

    let telegram = TelegramConfig::from_settings(&config.telegram)?;
    let channel: Arc<dyn Channel> = Arc::new(TelegramChannel::new(telegram));
    let bot = super::build_bot(&config, channel).await?;

    info!(
        aliases = ?config.bot.aliases,
        storage = %config.storage.backend,
        mode = ?config.disambiguation.mode,
        "Trufa starting"
    );

    let stats = bot
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!(
        messages = stats.messages,
        callbacks = stats.callbacks,
        channel_errors = stats.channel_errors,
        "Trufa stopped"
    );
    Ok(())
}
