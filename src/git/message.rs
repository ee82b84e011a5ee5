//! Commit message synthesis.
//!
//! A batch is first squeezed into one natural sentence that fits the
//! subject line. When that is impossible the subject becomes a generic
//! count and every event is itemised in the body, so no path is ever
//! dropped from the history.

use std::collections::BTreeSet;
use std::path::Path;

use crate::watcher::{Event, EventKind};

/// Subject lines must be strictly shorter than this many characters.
pub const SUBJECT_LINE_LIMIT: usize = 50;

const fn verb(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Created => "Add",
        EventKind::Modified => "Update",
        EventKind::Deleted => "Remove",
        EventKind::Renamed => "Rename",
    }
}

/// `Add a.txt`, or `Rename a.txt to b.txt`.
fn render(event: &Event) -> String {
    let verb = verb(event.kind());
    match event.new_path() {
        Some(to) => format!("{verb} {} to {}", event.path().display(), to.display()),
        None => format!("{verb} {}", event.path().display()),
    }
}

fn fits(line: &str) -> bool {
    line.chars().count() < SUBJECT_LINE_LIMIT
}

/// `a`, `a and b`, `a, b, and c`.
fn join_natural(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

fn lower_first(line: &str) -> String {
    let mut chars = line.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().chain(chars).collect()
    })
}

/// Build a commit message describing `events`.
///
/// Returns an empty string for an empty batch, which callers must treat
/// as "nothing to commit".
#[must_use]
pub fn generate_message(events: &[Event]) -> String {
    if events.is_empty() {
        return String::new();
    }

    let mut items: Vec<(&Path, String)> = events.iter().map(|e| (e.path(), render(e))).collect();
    items.sort_by(|a, b| a.0.cmp(b.0));
    let count = items.len();

    let kinds: BTreeSet<EventKind> = events.iter().map(Event::kind).collect();
    let shared_kind = match (kinds.first(), kinds.len()) {
        (Some(&kind), 1) => Some(kind),
        _ => None,
    };

    let subject = if let Some(kind) = shared_kind {
        let verb = verb(kind);

        if kind == EventKind::Renamed && count == 1 {
            if fits(&items[0].1) {
                return items[0].1.clone();
            }
        } else {
            let names: Vec<String> = items
                .iter()
                .map(|(path, _)| path.display().to_string())
                .collect();
            let candidate = format!("{verb} {}", join_natural(&names));
            if fits(&candidate) {
                return candidate;
            }
        }

        if count == 1 {
            format!("{verb} 1 file")
        } else {
            format!("{verb} {count} files")
        }
    } else {
        let candidate = items
            .iter()
            .enumerate()
            .map(|(i, (_, line))| if i == 0 { line.clone() } else { lower_first(line) })
            .collect::<Vec<_>>()
            .join(", ");
        if fits(&candidate) {
            return candidate;
        }

        format!("Change {count} files")
    };

    let body: Vec<String> = items.iter().map(|(_, line)| format!("- {line}")).collect();
    format!("{subject}\n\n{}", body.join("\n"))
}
