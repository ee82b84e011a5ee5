//! Semantic file change events.

#![allow(clippy::missing_const_for_fn)]

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of semantic change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// File appeared.
    Created,
    /// File content or metadata changed.
    Modified,
    /// File disappeared.
    Deleted,
    /// File moved from one path to another.
    Renamed,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
        };
        f.write_str(name)
    }
}

/// A single change to a path relative to the watched root.
///
/// `new_path` is present exactly when the kind is [`EventKind::Renamed`];
/// the constructors are the only way to build an event, which keeps that
/// invariant intact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    kind: EventKind,
    path: PathBuf,
    new_path: Option<PathBuf>,
}

impl Event {
    /// A file was created.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: EventKind::Created,
            path: path.into(),
            new_path: None,
        }
    }

    /// A file was modified.
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: EventKind::Modified,
            path: path.into(),
            new_path: None,
        }
    }

    /// A file was deleted.
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: EventKind::Deleted,
            path: path.into(),
            new_path: None,
        }
    }

    /// A file was moved from `from` to `to`.
    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: EventKind::Renamed,
            path: from.into(),
            new_path: Some(to.into()),
        }
    }

    /// Kind of change.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The path the event concerns. For renames this is the old path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Destination of a rename.
    #[must_use]
    pub fn new_path(&self) -> Option<&Path> {
        self.new_path.as_deref()
    }

    /// The path whose current source content the event refers to.
    ///
    /// This is `new_path` for renames and `path` otherwise.
    #[must_use]
    pub fn current_path(&self) -> &Path {
        self.new_path().unwrap_or(&self.path)
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path
            .cmp(&other.path)
            .then_with(|| self.new_path.cmp(&other.new_path))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.new_path {
            Some(to) => write!(
                f,
                "{} {} {}",
                self.kind,
                self.path.display(),
                to.display()
            ),
            None => write!(f, "{} {}", self.kind, self.path.display()),
        }
    }
}
