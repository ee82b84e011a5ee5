//! Directory listing for the known-files set and initial sync.
//!
//! Walks a tree and collects every regular file as a path relative to the
//! root. Version-control metadata (`.git`) is never listed.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::SyncError;
use crate::Result;

/// Name of the directory that is excluded from listings and sync.
const VCS_DIR: &str = ".git";

/// Read buffer size for content comparison.
const COMPARE_CHUNK: usize = 64 * 1024;

/// List all files under `root`, relative to `root`, in sorted order.
///
/// Unreadable entries are logged and skipped.
///
/// # Errors
///
/// Returns an error if `root` is not a directory.
pub fn list_files(root: &Path) -> Result<BTreeSet<PathBuf>> {
    if !root.is_dir() {
        return Err(SyncError::Scan {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }
        .into());
    }

    let mut files = BTreeSet::new();
    let mut errors = 0_u64;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !is_vcs_entry(entry));

    for entry in walker {
        match entry {
            Ok(entry) => {
                // Symlinks count when they resolve to a file.
                if !entry.path().is_file() {
                    continue;
                }
                if let Ok(rel) = entry.path().strip_prefix(root) {
                    files.insert(rel.to_path_buf());
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                errors += 1;
            }
        }
    }

    tracing::debug!(
        root = %root.display(),
        files = files.len(),
        errors,
        "Directory listing complete"
    );

    Ok(files)
}

fn is_vcs_entry(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name() == VCS_DIR
}

/// Check whether a relative path lies inside version-control metadata.
#[must_use]
pub fn is_ignored(rel: &Path) -> bool {
    rel.components()
        .any(|c| matches!(c, Component::Normal(name) if name == VCS_DIR))
}

/// Compare two files byte for byte.
///
/// # Errors
///
/// Returns an error if either file cannot be read.
pub fn files_equal(a: &Path, b: &Path) -> std::io::Result<bool> {
    let (meta_a, meta_b) = (std::fs::metadata(a)?, std::fs::metadata(b)?);
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::new(File::open(a)?);
    let mut reader_b = BufReader::new(File::open(b)?);
    let mut buf_a = vec![0_u8; COMPARE_CHUNK];
    let mut buf_b = vec![0_u8; COMPARE_CHUNK];

    loop {
        let n = read_full(&mut reader_a, &mut buf_a)?;
        let m = read_full(&mut reader_b, &mut buf_b)?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows, returning the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
