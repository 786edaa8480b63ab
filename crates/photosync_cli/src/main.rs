//! PhotoSync CLI
//!
//! Keeps a local image folder in sync with a remote image library.
//!
//! # Commands
//!
//! - `pull` - Apply remote changes to the local folder
//! - `push` - Apply local changes to the remote library
//! - `sync` - Run the passes the strategy calls for
//! - `status` - Show item counts and the last successful sync
//! - `logs` - Show recent sync log entries
//! - `verify` - Check the sync log for damage
//! - `watch` - Sync on a fixed interval until interrupted

mod client;
mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Settings;
use photosync_protocol::Strategy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Two-way sync between a local folder and a remote image library.
#[derive(Parser)]
#[command(name = "photosync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Local folder to keep in sync
    #[arg(global = true, short, long)]
    folder: Option<PathBuf>,

    /// Base URL of the image server
    #[arg(global = true, short, long)]
    server: Option<String>,

    /// Catalog directory (defaults to <folder>/.photosync)
    #[arg(global = true, long)]
    catalog: Option<PathBuf>,

    /// Conflict strategy: last-write-wins, server-always-wins, local-always-wins
    #[arg(global = true, long, default_value = "last-write-wins")]
    strategy: Strategy,

    /// Concurrent transfers per pass
    #[arg(global = true, long, default_value_t = photosync_engine::DEFAULT_PARALLEL_TRANSFERS)]
    parallel: usize,

    /// Items requested per listing page
    #[arg(global = true, long, default_value_t = photosync_engine::DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Request timeout in seconds
    #[arg(global = true, long, default_value_t = 30)]
    timeout: u64,

    /// Output format
    #[arg(global = true, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply remote changes to the local folder
    Pull,

    /// Apply local changes to the remote library
    Push,

    /// Pull and/or push, as the strategy requires
    Sync,

    /// Show item counts and the last successful sync
    Status,

    /// Show recent sync log entries, newest first
    Logs {
        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Check the sync log for damage
    Verify,

    /// Sync repeatedly until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value_t = 300)]
        interval: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings {
        folder: cli.folder,
        server: cli.server,
        catalog: cli.catalog,
        parallel: cli.parallel,
        page_size: cli.page_size,
        timeout: std::time::Duration::from_secs(cli.timeout),
        format: cli.format,
    };

    match cli.command {
        Commands::Pull => commands::sync::pull(&settings, cli.strategy)?,
        Commands::Push => commands::sync::push(&settings, cli.strategy)?,
        Commands::Sync => commands::sync::sync(&settings, cli.strategy)?,
        Commands::Status => commands::status::status(&settings)?,
        Commands::Logs { limit } => commands::status::logs(&settings, limit)?,
        Commands::Verify => commands::verify::run(&settings)?,
        Commands::Watch { interval } => {
            if interval == 0 {
                return Err("watch interval must be at least one second".into());
            }
            commands::watch::run(
                &settings,
                cli.strategy,
                std::time::Duration::from_secs(interval),
            )?
        }
    }

    Ok(())
}
