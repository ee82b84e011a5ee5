//! Wiring of configuration, initial reconciliation and the watch loop.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;

use crate::config::{Config, Mode};
use crate::git::{GitRepo, Recorder};
use crate::sync::{initial_sync, EventSink, Mirror, ReportOnly, Reporter};
use crate::watcher::{FileWatcher, WatcherConfig};
use crate::{Error, Result};

/// A configured run of the tool.
pub struct App {
    config: Config,
    source: PathBuf,
    reporter: Reporter,
}

impl App {
    /// Validate `config` and resolve the source directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = config.source.canonicalize().map_err(|e| {
            Error::config(format!("cannot resolve '{}': {e}", config.source.display()))
        })?;
        let reporter = Reporter::new(config.verbose, config.timeless);

        Ok(Self {
            config,
            source,
            reporter,
        })
    }

    /// Canonical source directory.
    #[must_use]
    pub fn source(&self) -> &std::path::Path {
        &self.source
    }

    /// Reconcile, then watch until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if start-up fails or a flush fails.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Reconcile, then watch until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns an error if start-up fails or a flush fails.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mode = self.config.mode();
        tracing::info!(
            source = %self.source.display(),
            dest = ?self.config.dest,
            ?mode,
            dry_run = self.config.dry_run,
            "Starting"
        );

        let sink = self.prepare_sink(mode)?;

        let watcher_config = WatcherConfig {
            root: self.source.clone(),
            quiet_period: self.config.debounce,
            echo: self.config.debug_events.then_some(self.reporter),
        };
        let watcher = FileWatcher::new(&watcher_config, sink)?;
        watcher.run_until(shutdown).await
    }

    /// Build the batch consumer for `mode` and run its initial pass.
    fn prepare_sink(&self, mode: Mode) -> Result<Arc<dyn EventSink>> {
        let dry_run = self.config.dry_run;
        let dest = || {
            self.config
                .dest
                .clone()
                .ok_or_else(|| Error::internal("mirror mode without a destination"))
        };

        let sink: Arc<dyn EventSink> = match mode {
            Mode::Watch => Arc::new(ReportOnly::new(self.reporter)),
            Mode::Mirror => {
                let mirror = Mirror::new(&self.source, dest()?, dry_run, self.reporter);
                initial_sync(&mirror)?;
                Arc::new(mirror)
            }
            Mode::MirrorCommit => {
                let mirror = Mirror::new(&self.source, dest()?, dry_run, self.reporter);
                let recorder = Recorder::mirrored(mirror, self.reporter);
                recorder.prepare()?;
                recorder.initial_commit()?;
                Arc::new(recorder)
            }
            Mode::Commit => {
                let recorder =
                    Recorder::in_place(GitRepo::new(&self.source), self.reporter, dry_run);
                recorder.prepare()?;
                recorder.initial_commit()?;
                Arc::new(recorder)
            }
        };

        Ok(sink)
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
///
/// A handler that cannot be installed is logged and ends the wait.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to install Ctrl+C handler"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received SIGTERM, shutting down");
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
