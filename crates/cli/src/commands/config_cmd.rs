//! `trufa config`: configuration inspection.

use trufa_config::{AppConfig, DisambiguationMode};

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_bot_token() {
                warnings.push("No Telegram token set (TRUFA_BOT_TOKEN or [telegram] bot_token)");
            }
            if config.storage.backend == "memory" {
                warnings.push("storage.backend = \"memory\" forgets every phrase on restart");
            }
            if config.disambiguation.mode == DisambiguationMode::Reparse {
                warnings.push("Reparse mode trusts the prompt text; presses may pick a moved phrase");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   [warn] {w}");
                }
            }

            println!();
            println!("   Aliases:         {}", config.bot.aliases.join(", "));
            println!("   Stale after:     {}s", config.bot.stale_after_secs);
            println!("   Default mute:    {} min", config.bot.default_mute_minutes);
            println!("   Disambiguation:  {:?}", config.disambiguation.mode);
            println!(
                "   Storage:         {} ({})",
                config.storage.backend,
                config.storage.resolved_path().display()
            );
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;
    if config.telegram.bot_token.is_some() {
        config.telegram.bot_token = Some("[REDACTED]".into());
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
