//! Operator-facing output.
//!
//! These lines are the tool's user interface and go to stdout (failures to
//! stderr); diagnostics go through `tracing` instead.

use std::fmt::Display;
use std::path::Path;

use crate::watcher::{Event, EventKind};

/// Prints one line per applied event, optionally timestamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    verbose: bool,
    timeless: bool,
}

impl Reporter {
    /// Create a reporter.
    #[must_use]
    pub const fn new(verbose: bool, timeless: bool) -> Self {
        Self { verbose, timeless }
    }

    /// Whether raw event lines are printed.
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn timestamp(&self) -> String {
        if self.timeless {
            String::new()
        } else {
            chrono::Local::now().format("%H:%M:%S ").to_string()
        }
    }

    /// Print the action taken for an event.
    pub fn action(&self, event: &Event) {
        println!("{}{}", self.timestamp(), action_line(event));
    }

    /// Print the raw event line when verbose.
    pub fn event(&self, event: &Event) {
        if self.verbose {
            println!("{}{}", self.timestamp(), event_line(event));
        }
    }

    /// Print what a dry run would have done.
    pub fn planned(&self, event: &Event) {
        println!("{}", planned_line(event));
    }

    /// Echo a translated notification.
    pub fn notification(&self, event: &Event) {
        println!("notify: {event}");
    }

    /// Report a failure to apply an event.
    pub fn failure(&self, path: &Path, cause: &dyn Display) {
        eprintln!("{}!! \"{}\": {cause}", self.timestamp(), path.display());
    }
}

/// `++ "path"`, `++ "old" -> "new"` or `-- "path"`.
#[must_use]
pub fn action_line(event: &Event) -> String {
    match (event.kind(), event.new_path()) {
        (EventKind::Renamed, Some(to)) => format!(
            "++ \"{}\" -> \"{}\"",
            event.path().display(),
            to.display()
        ),
        (EventKind::Deleted, _) => format!("-- \"{}\"", event.path().display()),
        _ => format!("++ \"{}\"", event.path().display()),
    }
}

/// Indented description of the event itself.
#[must_use]
pub fn event_line(event: &Event) -> String {
    let path = event.path().display();
    match (event.kind(), event.new_path()) {
        (EventKind::Renamed, Some(to)) => {
            format!("   \"{path}\" renamed \"{}\"", to.display())
        }
        (EventKind::Modified, _) => format!("   \"{path}\" updated"),
        (kind, _) => format!("   \"{path}\" {kind}"),
    }
}

/// Dry-run description of the filesystem operation an event maps to.
#[must_use]
pub fn planned_line(event: &Event) -> String {
    let path = event.path().display();
    match (event.kind(), event.new_path()) {
        (EventKind::Renamed, Some(to)) => {
            format!("#  rename \"{path}\" to \"{}\"", to.display())
        }
        (EventKind::Deleted, _) => format!("#  delete \"{path}\""),
        _ => format!("#  copy \"{path}\""),
    }
}
