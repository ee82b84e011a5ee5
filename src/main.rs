//! Bolthole - directory mirroring and change recording
//!
//! Entry point for the `bolthole` command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::time::Duration;

use bolthole::observability::init_tracing;
use bolthole::{App, Config, Result};
use clap::Parser;

/// Mirror a directory tree, or record its changes in git, as they happen
#[derive(Parser, Debug)]
#[command(name = "bolthole")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to watch
    #[arg(env = "BOLTHOLE_SOURCE")]
    source: PathBuf,

    /// Directory to mirror into
    #[arg(env = "BOLTHOLE_DEST")]
    dest: Option<PathBuf>,

    /// Commit each batch to git (in the destination, or in place)
    #[arg(long, env = "BOLTHOLE_GIT")]
    git: bool,

    /// Print what would be done without changing anything
    #[arg(short = 'n', long, env = "BOLTHOLE_DRY_RUN")]
    dry_run: bool,

    /// Also print every raw event
    #[arg(short, long, env = "BOLTHOLE_VERBOSE")]
    verbose: bool,

    /// Omit timestamps from output
    #[arg(long, env = "BOLTHOLE_TIMELESS")]
    timeless: bool,

    /// Echo translated file system notifications
    #[arg(long, env = "BOLTHOLE_DEBUG_EVENTS")]
    debug_events: bool,

    /// Quiet period in milliseconds before a batch is applied
    #[arg(long, env = "BOLTHOLE_DEBOUNCE_MS", default_value = "330")]
    debounce_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BOLTHOLE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "BOLTHOLE_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json)?;

    tracing::info!("Bolthole v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config {
        source: cli.source,
        dest: cli.dest,
        git: cli.git,
        dry_run: cli.dry_run,
        verbose: cli.verbose,
        timeless: cli.timeless,
        debug_events: cli.debug_events,
        debounce: Duration::from_millis(cli.debounce_ms),
        log_level: cli.log_level,
        log_json: cli.log_json,
    };

    tracing::debug!(?config, "Configuration loaded");

    App::new(config)?.run().await
}
