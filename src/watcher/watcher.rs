//! File system watcher using notify-rs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::debounce::{Debouncer, DEFAULT_QUIET_PERIOD};
use super::handler::{NotificationHandler, WatcherStats, WatcherStatsSnapshot};
use super::scanner::list_files;
use crate::error::WatcherError;
use crate::sync::{EventSink, Reporter};
use crate::{Error, Result};

/// File watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Directory to watch recursively.
    pub root: PathBuf,
    /// Quiet period before a batch is flushed.
    pub quiet_period: Duration,
    /// Echo translated notifications to the operator.
    pub echo: Option<Reporter>,
}

impl WatcherConfig {
    /// Watch `root` with the default quiet period.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quiet_period: DEFAULT_QUIET_PERIOD,
            echo: None,
        }
    }
}

/// Owns the OS subscription and the debounce scheduler for one tree.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    handler: Arc<Mutex<NotificationHandler>>,
    debouncer: Debouncer,
    failures: mpsc::UnboundedReceiver<Error>,
    root: PathBuf,
    stats: Arc<WatcherStats>,
}

impl FileWatcher {
    /// Subscribe to changes under `config.root`, delivering flushed batches
    /// to `sink`.
    ///
    /// Must be called from within a Tokio runtime; the debounce timers run
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed or watched.
    pub fn new(config: &WatcherConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let watch_failed = |reason: String| WatcherError::WatchFailed {
            path: config.root.display().to_string(),
            reason,
        };

        let runtime = Handle::try_current().map_err(|e| watch_failed(e.to_string()))?;
        // Notifications carry canonical paths on some platforms.
        let root = config
            .root
            .canonicalize()
            .map_err(|e| watch_failed(e.to_string()))?;

        let known = list_files(&root)?;
        let known_count = known.len();
        let stats = Arc::new(WatcherStats::default());

        let mut handler = NotificationHandler::new(&root, known, Arc::clone(&stats));
        if let Some(reporter) = config.echo {
            handler = handler.with_echo(reporter);
        }
        let handler = Arc::new(Mutex::new(handler));

        // A move half still unpaired when the quiet period ends left the tree.
        let hook_handler = Arc::clone(&handler);
        let (debouncer, failures) = Debouncer::with_flush_hook(
            config.quiet_period,
            sink,
            runtime,
            Arc::clone(&stats),
            Some(Box::new(move || hook_handler.lock().drain_pending_moves())),
        );

        let delivery_handler = Arc::clone(&handler);
        let delivery_debouncer = debouncer.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    let (events, waiting) = {
                        let mut handler = delivery_handler.lock();
                        let events = handler.translate(&event);
                        (events, handler.has_pending_moves())
                    };
                    if events.is_empty() && waiting {
                        delivery_debouncer.touch();
                    }
                    for event in events {
                        delivery_debouncer.record(event);
                    }
                }
                Err(e) => {
                    let err = WatcherError::Notify(e.to_string());
                    tracing::warn!(error = %err, paths = ?e.paths, "Watch error");
                }
            },
        )
        .map_err(|e| watch_failed(e.to_string()))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| watch_failed(e.to_string()))?;

        tracing::info!(
            path = %root.display(),
            files = known_count,
            quiet_ms = u64::try_from(config.quiet_period.as_millis()).unwrap_or(u64::MAX),
            "Watching directory"
        );

        Ok(Self {
            watcher,
            handler,
            debouncer,
            failures,
            root,
            stats,
        })
    }

    /// Canonical root being watched.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> WatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Watch until `shutdown` resolves or a flush fails, then stop the
    /// subscription and flush whatever is still pending.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed flush, including the final one.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            () = &mut shutdown => Ok(()),
            Some(err) = self.failures.recv() => {
                tracing::error!(error = %err, "Flush failed, shutting down");
                Err(err)
            }
        };

        self.stop(outcome).await
    }

    async fn stop(self, outcome: Result<()>) -> Result<()> {
        let Self {
            watcher,
            handler,
            debouncer,
            stats,
            ..
        } = self;

        drop(watcher);
        tracing::debug!("Notification subscription stopped");

        let unpaired = handler.lock().drain_pending_moves();
        for event in unpaired {
            debouncer.record(event);
        }

        let flushed = tokio::task::spawn_blocking(move || debouncer.flush_now())
            .await
            .map_err(|e| Error::internal(format!("final flush task failed: {e}")))?;

        let snapshot = stats.snapshot();
        tracing::info!(
            notifications = snapshot.notifications,
            events = snapshot.events_queued,
            batches = snapshot.batches_flushed,
            "Watcher stopped"
        );

        outcome?;
        flushed.map(|_| ())
    }
}
