//! Structured logging configuration.
//!
//! Diagnostics go to stderr through `tracing`, leaving stdout to the
//! operator-facing action lines.

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

use crate::{Error, Result};

/// Build the level filter: `RUST_LOG` wins, otherwise `level`.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()))
}

/// Initialize tracing.
///
/// Plain text by default, one JSON object per line with `json`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = env_filter(level);

    let installed = if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true);

        Registry::default().with(filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        Registry::default().with(filter).with(fmt_layer).try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to install tracing subscriber: {e}")))?;

    tracing::debug!(level, json, "Tracing initialized");
    Ok(())
}
