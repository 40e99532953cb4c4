//! `trufa chat`: talk to the bot from the terminal.

use std::sync::Arc;
use trufa_channels::CliChannel;
use trufa_core::channel::{Channel, ChatType};

pub async fn run(group: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let chat_type = if group {
        ChatType::Group
    } else {
        ChatType::Private
    };

    println!();
    println!("  Trufa: interactive mode ({})", if group { "group" } else { "private" });
    println!();
    println!("  Names:    {}", config.bot.aliases.join(", "));
    println!("  Storage:  {}", config.storage.backend);
    println!();
    println!("  Try: {} aprende a contestar \"que tal\" cuando digan \"hola\"", first_alias(&config));
    println!("  Press a button with /pick N. Type 'exit' or Ctrl+D to quit.");
    println!();

    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new(chat_type));
    let bot = super::build_bot(&config, channel).await?;
    let stats = bot
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!();
    println!(
        "  Adios! ({} messages, {} button presses)",
        stats.messages, stats.callbacks
    );
    println!();
    Ok(())
}

fn first_alias(config: &trufa_config::AppConfig) -> &str {
    config
        .bot
        .aliases
        .first()
        .map(String::as_str)
        .unwrap_or("trufa")
}
