//! Thin wrapper over the `git` command line.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::GitError;
use crate::watcher::Event;

type GitResult<T> = std::result::Result<T, GitError>;

/// One entry of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter status code, e.g. `??`, ` M`, `D `, `R `.
    pub status: String,
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Previous path for renames and copies.
    pub orig_path: Option<PathBuf>,
}

impl StatusEntry {
    /// Translate into the event that produced this status, if any.
    #[must_use]
    pub fn to_event(&self) -> Option<Event> {
        let status = self.status.as_str();
        if status == "??" {
            return Some(Event::created(&self.path));
        }
        if status.contains('D') {
            return Some(Event::deleted(&self.path));
        }
        if status.contains('R') {
            if let Some(orig) = &self.orig_path {
                return Some(Event::renamed(orig, &self.path));
            }
        }
        if status.contains('M') || status.contains('A') || status.contains('R') {
            return Some(Event::modified(&self.path));
        }
        None
    }
}

/// A git working tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wrap the working tree at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Working tree root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether `path` is inside a git repository.
    #[must_use]
    pub fn is_repo(path: &Path) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(path)
            .args(["rev-parse", "--git-dir"])
            .output()
            .is_ok_and(|out| out.status.success())
    }

    /// Create an empty repository.
    ///
    /// # Errors
    ///
    /// Returns an error if `git init` fails.
    pub fn init(&self) -> GitResult<()> {
        self.run(["init", "--quiet"])?;
        tracing::info!(path = %self.path.display(), "Initialised git repository");
        Ok(())
    }

    /// Stage every change in the working tree, including deletions.
    ///
    /// # Errors
    ///
    /// Returns an error if `git add` fails.
    pub fn stage_all(&self) -> GitResult<()> {
        self.run(["add", "--all"]).map(|_| ())
    }

    /// Whether the index differs from `HEAD`.
    ///
    /// # Errors
    ///
    /// Returns an error if `git diff` fails.
    pub fn has_staged_changes(&self) -> GitResult<bool> {
        let output = self.output(["diff", "--cached", "--quiet"])?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(GitError::CommandFailed {
                command: "git diff --cached --quiet".to_string(),
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    /// Commit the index with `message`. Does nothing when nothing is staged.
    ///
    /// Returns whether a commit was created.
    ///
    /// # Errors
    ///
    /// Returns an error if `git commit` fails.
    pub fn commit(&self, message: &str) -> GitResult<bool> {
        if !self.has_staged_changes()? {
            tracing::debug!("Nothing staged, skipping commit");
            return Ok(false);
        }
        self.run([
            OsStr::new("commit"),
            OsStr::new("--quiet"),
            OsStr::new("--message"),
            OsStr::new(message),
        ])?;
        Ok(true)
    }

    /// List uncommitted changes, untracked files included.
    ///
    /// # Errors
    ///
    /// Returns an error if `git status` fails or its output is malformed.
    pub fn list_uncommitted(&self) -> GitResult<Vec<StatusEntry>> {
        let output = self.run(["status", "--porcelain", "-z", "--untracked-files=all"])?;
        parse_status(&output.stdout)
    }

    /// Uncommitted changes as events.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be read.
    pub fn uncommitted_events(&self) -> GitResult<Vec<Event>> {
        Ok(self
            .list_uncommitted()?
            .iter()
            .filter_map(StatusEntry::to_event)
            .collect())
    }

    fn output<I, S>(&self, args: I) -> GitResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        tracing::debug!(path = %self.path.display(), ?args, "Running git");

        Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args(&args)
            .output()
            .map_err(|source| GitError::Spawn {
                command: describe(&args),
                source,
            })
    }

    fn run<I, S>(&self, args: I) -> GitResult<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let output = self.output(&args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command: describe(&args),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

fn describe(args: &[std::ffi::OsString]) -> String {
    let first = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("git {first}")
}

/// Parse `git status --porcelain -z` output.
fn parse_status(raw: &[u8]) -> GitResult<Vec<StatusEntry>> {
    let text = String::from_utf8_lossy(raw);
    let mut fields = text.split('\0').filter(|f| !f.is_empty());
    let mut entries = Vec::new();

    while let Some(field) = fields.next() {
        if field.len() < 4 || !field.is_char_boundary(2) || field.as_bytes()[2] != b' ' {
            return Err(GitError::Status(field.to_string()));
        }
        let (status, path) = (&field[..2], &field[3..]);
        let orig_path = if status.contains('R') || status.contains('C') {
            let orig = fields
                .next()
                .ok_or_else(|| GitError::Status(format!("missing source path for '{path}'")))?;
            Some(PathBuf::from(orig))
        } else {
            None
        };

        entries.push(StatusEntry {
            status: status.to_string(),
            path: PathBuf::from(path),
            orig_path,
        });
    }

    Ok(entries)
}
