//! Trufa CLI entry point.
//!
//! Commands:
//! - `onboard`: Write a default config file
//! - `run`: Connect to Telegram and serve chats
//! - `chat`: Talk to the bot from the terminal
//! - `phrases`: List, add or remove learned phrases
//! - `config`: Show or validate the configuration
//! - `doctor`: Diagnose setup problems

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "trufa",
    about = "Trufa: a chat bot that learns what to answer",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Serve Telegram chats until Ctrl+C
    Run,

    /// Chat with the bot from this terminal
    Chat {
        /// Pretend to be a group chat instead of a private one
        #[arg(short, long)]
        group: bool,
    },

    /// Manage learned phrases
    Phrases {
        #[command(subcommand)]
        action: PhrasesAction,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose setup problems
    Doctor,
}

#[derive(Subcommand)]
enum PhrasesAction {
    /// Print every stored phrase
    List,

    /// Teach a phrase without going through a chat
    Add { trigger: String, response: String },

    /// Forget phrases for a trigger
    Remove {
        trigger: String,

        /// Only remove this exact response
        #[arg(short, long)]
        response: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Check the configuration for problems
    Validate,

    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Run => commands::run::run().await?,
        Commands::Chat { group } => commands::chat::run(group).await?,
        Commands::Phrases { action } => match action {
            PhrasesAction::List => commands::phrases::list().await?,
            PhrasesAction::Add { trigger, response } => {
                commands::phrases::add(&trigger, &response).await?
            }
            PhrasesAction::Remove { trigger, response } => {
                commands::phrases::remove(&trigger, response.as_deref()).await?
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
