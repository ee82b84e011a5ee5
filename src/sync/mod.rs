//! Applying coalesced events to a destination.
//!
//! This module provides:
//! - The [`EventSink`] seam every flushed batch is handed to
//! - Mirroring into a destination tree ([`Mirror`])
//! - Initial reconciliation of two trees before watching starts
//! - Operator-facing action lines

mod apply;
mod initial;
mod report;

pub use apply::{apply_event, prune_empty_parents, ApplyStats, ApplyStatsSnapshot, Mirror};
pub use initial::{diff_trees, initial_sync};
pub use report::Reporter;

use crate::watcher::Event;
use crate::Result;

/// Consumer of coalesced event batches.
///
/// Implementations recover from failures that concern a single event
/// themselves; an `Err` means the whole flush failed and the watch loop
/// should shut down.
pub trait EventSink: Send + Sync {
    /// Apply one coalesced batch in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch as a whole could not be applied.
    fn apply(&self, events: &[Event]) -> Result<()>;
}

/// Sink that only reports events, used when there is nowhere to apply them.
#[derive(Debug, Clone)]
pub struct ReportOnly {
    reporter: Reporter,
}

impl ReportOnly {
    /// Create a report-only sink.
    #[must_use]
    pub const fn new(reporter: Reporter) -> Self {
        Self { reporter }
    }
}

impl EventSink for ReportOnly {
    fn apply(&self, events: &[Event]) -> Result<()> {
        for event in events {
            self.reporter.event(event);
        }
        Ok(())
    }
}
