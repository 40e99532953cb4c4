//! `trufa doctor`: diagnose setup problems.

use std::sync::Arc;
use trufa_channels::{TelegramChannel, TelegramConfig};
use trufa_config::AppConfig;
use trufa_core::channel::Channel;

use super::open_collection;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Trufa doctor");
    println!("============\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file, defaults in use (run `trufa onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Config valid");
            config
        }
        Err(e) => {
            println!("  [fail] Config invalid: {e}");
            println!("\n  1 issue found, fix the config first.");
            return Ok(());
        }
    };

    match open_collection(&config.storage).await {
        Ok(collection) => match collection.find_all().await {
            Ok(entries) => println!(
                "  [ok]   Phrase store ({}) readable, {} phrases",
                config.storage.backend,
                entries.len()
            ),
            Err(e) => {
                println!("  [fail] Phrase store unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  [fail] Phrase store cannot be opened: {e}");
            issues += 1;
        }
    }

    if config.has_bot_token() {
        match TelegramConfig::from_settings(&config.telegram) {
            Ok(telegram) => {
                let channel: Arc<dyn Channel> = Arc::new(TelegramChannel::new(telegram));
                match channel.health_check().await {
                    Ok(true) => println!("  [ok]   Telegram token accepted"),
                    Ok(false) => {
                        println!("  [fail] Telegram rejected the token");
                        issues += 1;
                    }
                    Err(e) => {
                        println!("  [fail] Telegram unreachable: {e}");
                        issues += 1;
                    }
                }
            }
            Err(e) => {
                println!("  [fail] Telegram settings: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  [warn] No Telegram token (set [telegram] bot_token or TRUFA_BOT_TOKEN)");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  All checks passed.");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
