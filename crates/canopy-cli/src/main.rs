//! Canopy CLI - Command-line interface for Canopy
//!
//! Entry point for scheduled runs and for operators setting up or
//! checking a configuration.

use canopy_core::SyncMode;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(author = "Canopy Contributors")]
#[command(version)]
#[command(about = "Mirror shared Drive folders into update ledgers", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter canopy.json
    Init {
        /// Directory or file to create (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run one sync pass over every configured root
    Sync {
        #[command(flatten)]
        args: SyncArgs,
    },

    /// Validate the configuration without contacting anything
    Check {
        #[command(flatten)]
        args: SyncArgs,
    },

    /// Run one pass of the channel feed
    Feed {
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,

        /// Channel username or chat id
        #[arg(long, env = "TELEGRAM_CHANNEL")]
        channel: Option<String>,

        #[arg(long, env = "SUPABASE_URL")]
        supabase_url: Option<String>,

        #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
        supabase_key: Option<String>,
    },
}

#[derive(clap::Args)]
pub struct SyncArgs {
    /// Roots file
    #[arg(short, long, default_value = "canopy.json")]
    config: PathBuf,

    /// full or incremental
    #[arg(short, long, env = "CANOPY_MODE", default_value = "full")]
    mode: SyncMode,

    /// Incremental window in hours
    #[arg(long, env = "CANOPY_LOOKBACK_HOURS", default_value = "48")]
    lookback_hours: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = "CANOPY_TIMEOUT_SECS", default_value = "15")]
    timeout_secs: u64,

    /// Record into sled trees in DIR instead of the remote databases
    #[arg(long, value_name = "DIR")]
    local: Option<PathBuf>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Service account JSON
    #[arg(long, env = "FIREBASE_SERVICE_ACCOUNT", hide_env_values = true)]
    service_account: Option<String>,

    #[arg(long, env = "FIREBASE_DB_URL")]
    db_url: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Sync { args } => commands::sync(&args).await,
        Commands::Check { args } => commands::check(&args),
        Commands::Feed {
            bot_token,
            channel,
            supabase_url,
            supabase_key,
        } => {
            commands::feed(
                bot_token.as_deref(),
                channel.as_deref(),
                supabase_url.as_deref(),
                supabase_key.as_deref(),
            )
            .await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
