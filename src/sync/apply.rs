//! Mirroring events into a destination tree.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use filetime::FileTime;

use super::report::Reporter;
use super::EventSink;
use crate::error::SyncError;
use crate::watcher::{Event, EventKind};
use crate::Result;

/// Counters for applied events.
#[derive(Debug, Default)]
pub struct ApplyStats {
    pub applied: AtomicU64,
    pub failed: AtomicU64,
}

impl ApplyStats {
    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> ApplyStatsSnapshot {
        ApplyStatsSnapshot {
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of apply stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStatsSnapshot {
    pub applied: u64,
    pub failed: u64,
}

/// Apply a single event, copying from `source` into `dest`.
///
/// The source tree is only read. Missing destination files are not an
/// error when deleting.
///
/// # Errors
///
/// Returns the first filesystem error, tagged with the event's path.
pub fn apply_event(event: &Event, source: &Path, dest: &Path) -> std::result::Result<(), SyncError> {
    match (event.kind(), event.new_path()) {
        (EventKind::Created | EventKind::Modified, _) => copy_file(source, dest, event.path()),
        (EventKind::Renamed, Some(to)) => {
            remove_file(dest, event.path())?;
            copy_file(source, dest, to)
        }
        (EventKind::Deleted | EventKind::Renamed, _) => remove_file(dest, event.path()),
    }
}

/// Copy `rel` from the source tree over the destination, keeping mtime and
/// permission bits.
fn copy_file(source: &Path, dest: &Path, rel: &Path) -> std::result::Result<(), SyncError> {
    let from = source.join(rel);
    let to = dest.join(rel);
    let copy_err = |source| SyncError::Copy {
        path: rel.to_path_buf(),
        source,
    };

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| SyncError::CreateDir {
            path: parent.strip_prefix(dest).unwrap_or(parent).to_path_buf(),
            source,
        })?;
    }

    clear_readonly(&to).map_err(copy_err)?;
    fs::copy(&from, &to).map_err(copy_err)?;

    let meta = fs::metadata(&from).map_err(copy_err)?;
    filetime::set_file_times(
        &to,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
    .map_err(copy_err)?;

    Ok(())
}

fn remove_file(dest: &Path, rel: &Path) -> std::result::Result<(), SyncError> {
    let target = dest.join(rel);
    let remove_err = |source| SyncError::Remove {
        path: rel.to_path_buf(),
        source,
    };

    match fs::remove_file(&target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(remove_err(e)),
    }

    prune_empty_parents(&target, dest).map_err(remove_err)
}

/// Make an existing read-only file writable so it can be overwritten.
fn clear_readonly(path: &Path) -> std::io::Result<()> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut perms = meta.permissions();
    if !perms.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        perms.set_mode(perms.mode() | 0o600);
    }
    #[cfg(not(unix))]
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);

    tracing::debug!(path = %path.display(), "Clearing read-only attribute");
    fs::set_permissions(path, perms)
}

/// Remove empty directories above `path`, stopping below `root` or at the
/// first directory that still has entries.
///
/// # Errors
///
/// Returns an error if a directory cannot be read or removed.
pub fn prune_empty_parents(path: &Path, root: &Path) -> std::io::Result<()> {
    let mut current = path.parent();

    while let Some(dir) = current {
        if dir == root || !dir.starts_with(root) {
            break;
        }

        match fs::read_dir(dir) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                current = dir.parent();
                continue;
            }
            Err(e) => return Err(e),
        }

        match fs::remove_dir(dir) {
            Ok(()) => tracing::debug!(dir = %dir.display(), "Pruned empty directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        current = dir.parent();
    }

    Ok(())
}

/// Applies batches to a destination tree that mirrors the source.
#[derive(Debug)]
pub struct Mirror {
    source: PathBuf,
    dest: PathBuf,
    dry_run: bool,
    reporter: Reporter,
    stats: ApplyStats,
}

impl Mirror {
    /// Create a mirror from `source` into `dest`.
    ///
    /// With `dry_run` the actions are printed but nothing is written.
    pub fn new(
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        dry_run: bool,
        reporter: Reporter,
    ) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            dry_run,
            reporter,
            stats: ApplyStats::default(),
        }
    }

    /// Source root.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination root.
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Whether this mirror only prints.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Get current stats.
    #[must_use]
    pub fn stats(&self) -> ApplyStatsSnapshot {
        self.stats.snapshot()
    }

    /// Apply every event in order, reporting each one.
    ///
    /// A failing event is reported and skipped so unrelated files still
    /// sync. Returns the number of failures.
    pub fn apply_all(&self, events: &[Event]) -> usize {
        let mut failures = 0;

        for event in events {
            self.reporter.event(event);
            self.reporter.action(event);

            if self.dry_run {
                self.reporter.planned(event);
                continue;
            }

            match apply_event(event, &self.source, &self.dest) {
                Ok(()) => {
                    self.stats.applied.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    failures += 1;
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(path = %e.path().display(), error = %e, "Failed to apply event");
                    self.reporter.failure(e.path(), &e);
                }
            }
        }

        let snapshot = self.stats.snapshot();
        tracing::debug!(
            batch = events.len(),
            applied = snapshot.applied,
            failed = snapshot.failed,
            "Applied event batch"
        );

        failures
    }
}

impl EventSink for Mirror {
    fn apply(&self, events: &[Event]) -> Result<()> {
        self.apply_all(events);
        Ok(())
    }
}
