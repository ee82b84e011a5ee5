//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the quiet period.
pub const MAX_DEBOUNCE: Duration = Duration::from_secs(60);

/// What the tool does with flushed batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only report events.
    Watch,
    /// Apply events to a destination tree.
    Mirror,
    /// Apply events to a destination tree that is a git repository, and commit.
    MirrorCommit,
    /// Commit changes inside the source repository.
    Commit,
}

/// Main configuration for Bolthole.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory to watch.
    pub source: PathBuf,

    /// Directory to mirror into.
    pub dest: Option<PathBuf>,

    /// Commit every batch to git.
    pub git: bool,

    /// Print what would happen without changing anything.
    pub dry_run: bool,

    /// Print raw events as well as actions.
    pub verbose: bool,

    /// Omit timestamps from operator output.
    pub timeless: bool,

    /// Echo translated notifications.
    pub debug_events: bool,

    /// Quiet period before a batch is flushed.
    pub debounce: Duration,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            dest: None,
            git: false,
            dry_run: false,
            verbose: false,
            timeless: false,
            debug_events: false,
            debounce: crate::watcher::DEFAULT_QUIET_PERIOD,
            log_level: "warn".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Create a configuration watching `source` with defaults.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Operating mode implied by `dest` and `git`.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match (self.dest.is_some(), self.git) {
            (false, false) => Mode::Watch,
            (true, false) => Mode::Mirror,
            (true, true) => Mode::MirrorCommit,
            (false, true) => Mode::Commit,
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            return Err(Error::config(format!(
                "source '{}' is not a directory",
                self.source.display()
            )));
        }

        if let Some(dest) = &self.dest {
            let source = absolute(&self.source);
            let dest = absolute(dest);
            if dest == source {
                return Err(Error::config("dest cannot be the same as source"));
            }
            if dest.starts_with(&source) {
                return Err(Error::config("dest cannot be inside source"));
            }
            if source.starts_with(&dest) {
                return Err(Error::config("dest cannot contain source"));
            }
        }

        if self.debounce.is_zero() {
            return Err(Error::config("debounce cannot be 0"));
        }

        if self.debounce > MAX_DEBOUNCE {
            return Err(Error::config("debounce cannot exceed 60 seconds"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }
}

/// Canonical form of `path`, resolving through the nearest existing
/// ancestor so a destination that does not exist yet still compares.
fn absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            absolute(parent).join(name)
        }
        _ => std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path)),
    }
}
