//! Quiet-period batching of raw events.
//!
//! Every [`Debouncer::record`] call restarts a one-shot timer. When the
//! timer expires without being restarted, the pending batch is swapped out
//! under the lock, coalesced, and handed to the sink outside the lock, so a
//! slow sink never blocks notification delivery.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::coalesce::coalesce;
use super::events::Event;
use super::handler::WatcherStats;
use crate::error::{Error, WatcherError};
use crate::sync::EventSink;
use crate::Result;

/// Default quiet period.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(330);

/// Supplies events that were held back outside the pending batch, such as
/// move halves still waiting for a partner. Called when a quiet period
/// expires, just before the batch is swapped out.
pub type FlushHook = Box<dyn Fn() -> Vec<Event> + Send + Sync>;

#[derive(Default)]
struct Pending {
    events: Vec<Event>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every record and forced flush; a timer only flushes the
    /// generation it was armed for.
    generation: u64,
}

struct Inner {
    pending: Mutex<Pending>,
    /// Held for the whole swap-and-dispatch so batches reach the sink one
    /// at a time and in order. Always taken before `pending`.
    flushing: Mutex<()>,
    quiet: Duration,
    sink: Arc<dyn EventSink>,
    runtime: Handle,
    stats: Arc<WatcherStats>,
    failures: mpsc::UnboundedSender<Error>,
    before_flush: Option<FlushHook>,
}

impl Inner {
    /// Timer expiry path.
    fn flush_expired(&self, generation: u64) {
        let _guard = self.flushing.lock();
        if self.pending.lock().generation != generation {
            return;
        }

        // The hook takes its own locks; `pending` must not be held here.
        let held_back = self.before_flush.as_ref().map_or_else(Vec::new, |hook| hook());

        let events = {
            let mut pending = self.pending.lock();
            if pending.generation == generation {
                pending.timer = None;
            }
            pending.events.extend(held_back);
            std::mem::take(&mut pending.events)
        };

        if let Err(e) = self.dispatch(&events) {
            tracing::error!(error = %e, "Flush failed");
            let _ = self.failures.send(e);
        }
    }

    fn flush_now(&self) -> Result<usize> {
        let _guard = self.flushing.lock();
        let events = {
            let mut pending = self.pending.lock();
            if let Some(timer) = pending.timer.take() {
                timer.abort();
            }
            pending.generation = pending.generation.wrapping_add(1);
            std::mem::take(&mut pending.events)
        };

        self.dispatch(&events)
    }

    fn dispatch(&self, raw: &[Event]) -> Result<usize> {
        if raw.is_empty() {
            return Ok(0);
        }

        let events = coalesce(raw);
        self.stats.batches_flushed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(raw = raw.len(), coalesced = events.len(), "Flushing batch");

        if events.is_empty() {
            return Ok(0);
        }
        self.sink.apply(&events)?;
        Ok(events.len())
    }
}

/// Accumulates raw events and flushes them once per quiet period.
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Debouncer {
    inner: Arc<Inner>,
}

impl Debouncer {
    /// Create a scheduler whose timers run on `runtime`.
    ///
    /// The returned receiver yields errors from timer-driven flushes, which
    /// have no caller to return them to.
    pub fn new(
        quiet: Duration,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
        stats: Arc<WatcherStats>,
    ) -> (Self, mpsc::UnboundedReceiver<Error>) {
        Self::with_flush_hook(quiet, sink, runtime, stats, None)
    }

    /// Like [`Debouncer::new`], with a hook consulted on every timer flush.
    pub fn with_flush_hook(
        quiet: Duration,
        sink: Arc<dyn EventSink>,
        runtime: Handle,
        stats: Arc<WatcherStats>,
        before_flush: Option<FlushHook>,
    ) -> (Self, mpsc::UnboundedReceiver<Error>) {
        let (failures, failures_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            pending: Mutex::new(Pending::default()),
            flushing: Mutex::new(()),
            quiet,
            sink,
            runtime,
            stats,
            failures,
            before_flush,
        });
        (Self { inner }, failures_rx)
    }

    /// Quiet period after the last event before a flush.
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet
    }

    /// Append an event to the pending batch and restart the timer.
    pub fn record(&self, event: Event) {
        let mut pending = self.inner.pending.lock();
        pending.events.push(event);
        self.restart_timer(&mut pending);
    }

    /// Restart the timer without adding an event, so the flush hook runs
    /// one quiet period from now.
    pub fn touch(&self) {
        let mut pending = self.inner.pending.lock();
        self.restart_timer(&mut pending);
    }

    fn restart_timer(&self, pending: &mut Pending) {
        if let Some(timer) = pending.timer.take() {
            timer.abort();
        }
        pending.generation = pending.generation.wrapping_add(1);
        let generation = pending.generation;

        let inner = Arc::clone(&self.inner);
        pending.timer = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(inner.quiet).await;
            let flusher = Arc::clone(&inner);
            if let Err(e) =
                tokio::task::spawn_blocking(move || flusher.flush_expired(generation)).await
            {
                if !e.is_cancelled() {
                    let _ = inner
                        .failures
                        .send(WatcherError::Scheduler(e.to_string()).into());
                }
            }
        }));
    }

    /// Flush the pending batch synchronously, regardless of the timer.
    ///
    /// Blocks until any flush already in progress has finished. Returns the
    /// number of coalesced events dispatched.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the batch could not be applied.
    pub fn flush_now(&self) -> Result<usize> {
        self.inner.flush_now()
    }

    /// Number of raw events waiting for the next flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().events.len()
    }

    /// True when nothing is pending and no timer is armed.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let pending = self.inner.pending.lock();
        pending.events.is_empty() && pending.timer.is_none()
    }
}
