//! HealthSync CLI
//!
//! Command-line driver for the HealthSync engine.
//!
//! # Commands
//!
//! - `sync` - Run one sync cycle, incremental when a change token exists
//! - `force-full-sync` - Clear the change token and resend the lookback window
//! - `status` - Show the change token and last sync result
//! - `clear-token` - Delete the change token so the next sync is full
//! - `reset` - Delete the change token and the cached result

mod commands;

use clap::{Parser, Subcommand};
use commands::{OutputFormat, Settings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// HealthSync command-line tools.
#[derive(Parser)]
#[command(name = "healthsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync state file
    #[arg(global = true, long, default_value = "healthsync_state.json")]
    state: PathBuf,

    /// JSON fixture to load the health store from
    ///
    /// The change log is rebuilt from the fixture on every run. Records
    /// removed from the fixture never produce deletions, and editing it can
    /// re-send unchanged records as changes. Use `force-full-sync` after
    /// editing.
    #[arg(global = true, long)]
    source: Option<PathBuf>,

    /// Backend base URL
    #[arg(
        global = true,
        long,
        env = "HEALTHSYNC_SERVER_URL",
        default_value = "http://10.0.2.2:4000"
    )]
    server_url: String,

    /// Backend user id
    #[arg(global = true, long, env = "HEALTHSYNC_USER_ID", default_value = "1")]
    user_id: String,

    /// Days covered by a full sync
    #[arg(global = true, long, default_value_t = healthsync_engine::DEFAULT_LOOKBACK_DAYS)]
    lookback_days: u32,

    /// Send one step total per day instead of one record per sample
    #[arg(global = true, long)]
    daily_totals: bool,

    /// Submission attempts on transient network errors
    #[arg(global = true, long, default_value_t = 1)]
    attempts: u32,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value_t = 30)]
    timeout_secs: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle
    Sync {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Clear the change token and sync the whole lookback window
    ForceFullSync {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the change token and last sync result
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete the change token so the next sync is full
    ClearToken,

    /// Delete the change token and the cached result
    Reset,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings {
        state: cli.state,
        source: cli.source,
        server_url: cli.server_url,
        user_id: cli.user_id,
        lookback_days: cli.lookback_days,
        daily_totals: cli.daily_totals,
        attempts: cli.attempts,
        timeout_secs: cli.timeout_secs,
    };

    match cli.command {
        Commands::Sync { format } => {
            commands::sync::run(&settings, false, format.parse::<OutputFormat>()?)?;
        }
        Commands::ForceFullSync { format } => {
            commands::sync::run(&settings, true, format.parse::<OutputFormat>()?)?;
        }
        Commands::Status { format } => {
            commands::status::run(&settings, format.parse::<OutputFormat>()?)?;
        }
        Commands::ClearToken => {
            commands::reset::clear_token(&settings)?;
        }
        Commands::Reset => {
            commands::reset::reset(&settings)?;
        }
        Commands::Version => {
            println!("HealthSync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
