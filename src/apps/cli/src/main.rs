//! Office Link CLI
//!
//! Follows the agent office from a terminal: prints agent activity, phase
//! changes and files as they happen, and answers boss decisions.
//!
//! # Configuration
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OFFICE_LINK_URL`, `OFFICE_LINK_RECONNECT_MS`,
//!    `OFFICE_LINK_HEARTBEAT_MS`)
//! 3. Config file (`--config`, else `<config dir>/office-link/config.toml`)
//! 4. Default values (lowest priority)
//!
//! `OFFICE_LOG_LEVEL` sets the log level.

mod app;
mod consumers;
mod logging;

use anyhow::Result;
use app::App;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Office Link - realtime agent office feed
#[derive(Parser, Debug)]
#[command(name = "office-link")]
#[command(version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow the event stream and answer decisions from stdin
    Watch {
        /// Base address, e.g. ws://localhost:8000/ws (also: OFFICE_LINK_URL)
        #[arg(long)]
        url: Option<String>,

        /// Project to subscribe to on every (re)connect
        #[arg(long)]
        project: Option<String>,
    },
    /// Send a single decision response and exit
    Decide {
        #[arg(long)]
        decision_id: String,

        /// Chosen option text
        #[arg(long)]
        choice: String,

        /// Base address (also: OFFICE_LINK_URL)
        #[arg(long)]
        url: Option<String>,

        /// How long to wait for the connection, in seconds
        #[arg(long, default_value_t = 10)]
        wait_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = logging::init(args.verbose);
    tracing::debug!("Log level: {}", logging::level_to_str(level));

    match args.command {
        Commands::Watch { url, project } => {
            let config = app::resolve_config(args.config.as_deref(), url)?;
            println!("Office Link v{}", env!("CARGO_PKG_VERSION"));
            App::new(config)?.watch(project).await
        }
        Commands::Decide {
            decision_id,
            choice,
            url,
            wait_secs,
        } => {
            let config = app::resolve_config(args.config.as_deref(), url)?;
            App::new(config)?
                .decide(&decision_id, &choice, Duration::from_secs(wait_secs))
                .await
        }
    }
}
