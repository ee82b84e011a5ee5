//! Repository mode: every flushed batch becomes one commit.

use super::message::generate_message;
use super::repo::GitRepo;
use crate::sync::{initial_sync, EventSink, Mirror, Reporter};
use crate::watcher::Event;
use crate::Result;

/// Records batches as commits in a git working tree.
///
/// With a [`Mirror`] the batch is applied to the destination first and
/// the destination is the repository. Without one the source is the
/// repository and the batch is only reported.
#[derive(Debug)]
pub struct Recorder {
    repo: GitRepo,
    mirror: Option<Mirror>,
    reporter: Reporter,
    dry_run: bool,
}

impl Recorder {
    /// Record changes made directly inside the repository at `repo`.
    #[must_use]
    pub const fn in_place(repo: GitRepo, reporter: Reporter, dry_run: bool) -> Self {
        Self {
            repo,
            mirror: None,
            reporter,
            dry_run,
        }
    }

    /// Mirror into the destination and commit there.
    #[must_use]
    pub fn mirrored(mirror: Mirror, reporter: Reporter) -> Self {
        let dry_run = mirror.is_dry_run();
        Self {
            repo: GitRepo::new(mirror.dest()),
            mirror: Some(mirror),
            reporter,
            dry_run,
        }
    }

    /// The repository commits go to.
    #[must_use]
    pub const fn repo(&self) -> &GitRepo {
        &self.repo
    }

    /// Initialise the repository if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if `git init` fails.
    pub fn prepare(&self) -> Result<()> {
        if self.dry_run || GitRepo::is_repo(self.repo.path()) {
            return Ok(());
        }
        if self.mirror.is_some() {
            std::fs::create_dir_all(self.repo.path())?;
        }
        self.repo.init()?;
        Ok(())
    }

    /// Bring the repository up to date before watching starts.
    ///
    /// Mirrored: runs the initial sync and commits its result. In place:
    /// commits whatever was left uncommitted. Returns the recorded events.
    ///
    /// # Errors
    ///
    /// Returns an error if the trees cannot be compared, the status cannot
    /// be read, or the commit fails.
    pub fn initial_commit(&self) -> Result<Vec<Event>> {
        let events = match &self.mirror {
            Some(mirror) => initial_sync(mirror)?,
            None if self.dry_run && !GitRepo::is_repo(self.repo.path()) => Vec::new(),
            None => {
                let events = self.repo.uncommitted_events()?;
                for event in &events {
                    self.reporter.event(event);
                    self.reporter.action(event);
                }
                events
            }
        };

        self.commit(&events)?;
        Ok(events)
    }

    fn commit(&self, events: &[Event]) -> Result<()> {
        if self.dry_run || events.is_empty() {
            return Ok(());
        }
        let message = generate_message(events);
        if message.is_empty() {
            return Ok(());
        }

        self.repo.stage_all()?;
        if self.repo.commit(&message)? {
            let subject = message.lines().next().unwrap_or_default();
            tracing::info!(events = events.len(), subject, "Committed batch");
        }
        Ok(())
    }
}

impl EventSink for Recorder {
    fn apply(&self, events: &[Event]) -> Result<()> {
        match &self.mirror {
            Some(mirror) => {
                mirror.apply_all(events);
            }
            None => {
                for event in events {
                    self.reporter.event(event);
                    self.reporter.action(event);
                    if self.dry_run {
                        self.reporter.planned(event);
                    }
                }
            }
        }
        self.commit(events)
    }
}
