//! Initial reconciliation of a destination with its source.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::apply::Mirror;
use crate::error::SyncError;
use crate::watcher::{files_equal, list_files, Event};
use crate::Result;

/// Compute the events that turn `dest` into a copy of `source`.
///
/// Source-only files are `Created`, files in both trees with different
/// content are `Modified` and destination-only files are `Deleted`. A
/// missing destination counts as empty. Events come out sorted by path.
///
/// # Errors
///
/// Returns an error if either tree cannot be listed or a pair of files
/// cannot be compared.
pub fn diff_trees(source: &Path, dest: &Path) -> Result<Vec<Event>> {
    let source_files = list_files(source)?;
    let dest_files = if dest.exists() {
        list_files(dest)?
    } else {
        BTreeSet::new()
    };

    let all: BTreeSet<&PathBuf> = source_files.iter().chain(dest_files.iter()).collect();
    let mut events = Vec::new();

    for rel in all {
        match (source_files.contains(rel), dest_files.contains(rel)) {
            (true, false) => events.push(Event::created(rel)),
            (false, true) => events.push(Event::deleted(rel)),
            (true, true) => {
                let same = files_equal(&source.join(rel), &dest.join(rel)).map_err(|e| {
                    SyncError::Scan {
                        path: rel.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if !same {
                    events.push(Event::modified(rel));
                }
            }
            (false, false) => {}
        }
    }

    Ok(events)
}

/// Bring the mirror's destination in line with its source before watching.
///
/// Returns the events that were applied.
///
/// # Errors
///
/// Returns an error if the destination cannot be created or the trees
/// cannot be compared. Failures on individual files are reported and
/// skipped.
pub fn initial_sync(mirror: &Mirror) -> Result<Vec<Event>> {
    if !mirror.is_dry_run() {
        fs::create_dir_all(mirror.dest()).map_err(|source| SyncError::CreateDir {
            path: mirror.dest().to_path_buf(),
            source,
        })?;
    }

    let events = diff_trees(mirror.source(), mirror.dest())?;
    tracing::info!(
        source = %mirror.source().display(),
        dest = %mirror.dest().display(),
        changes = events.len(),
        "Initial sync"
    );

    mirror.apply_all(&events);
    Ok(events)
}
