//! File system watching and change batching.
//!
//! This module provides:
//! - Directory watching using notify-rs
//! - Translation of raw notifications into semantic events
//! - Quiet-period batching and per-path coalescing of those events

mod coalesce;
mod debounce;
mod events;
mod handler;
mod scanner;
#[allow(clippy::module_inception)]
mod watcher;

pub use coalesce::coalesce;
pub use debounce::{Debouncer, FlushHook, DEFAULT_QUIET_PERIOD};
pub use events::{Event, EventKind};
pub use handler::{NotificationHandler, WatcherStats, WatcherStatsSnapshot};
pub use scanner::{files_equal, is_ignored, list_files};
pub use watcher::{FileWatcher, WatcherConfig};
