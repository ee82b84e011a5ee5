//! Error types and Result aliases for Bolthole.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using Bolthole's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Bolthole operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Applying an event to the destination tree failed.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Version-control error.
    #[error("git error: {0}")]
    Git(#[from] GitError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The notification backend reported an error.
    #[error("notification error: {0}")]
    Notify(String),

    /// The debounce scheduler could not complete a flush.
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

/// Errors raised while applying an event to a destination tree.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Copying a file into the destination failed.
    #[error("failed to copy '{}': {source}", path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing a file or pruning a directory failed.
    #[error("failed to remove '{}': {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Creating a destination directory failed.
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Listing or comparing a tree failed.
    #[error("failed to scan '{}': {reason}", path.display())]
    Scan { path: PathBuf, reason: String },
}

/// Version-control errors.
#[derive(Error, Debug)]
pub enum GitError {
    /// The `git` executable could not be started.
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A `git` command exited unsuccessfully.
    #[error("'{command}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Unparseable `git status` output.
    #[error("unexpected status output: {0}")]
    Status(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl SyncError {
    /// The relative or absolute path the failure concerns.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Copy { path, .. }
            | Self::Remove { path, .. }
            | Self::CreateDir { path, .. }
            | Self::Scan { path, .. } => path,
        }
    }
}
