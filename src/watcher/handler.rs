//! Translation of raw notifications into semantic events.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind as NotifyKind;

use super::events::Event;
use super::scanner::{is_ignored, list_files};
use crate::sync::Reporter;

/// Statistics for file watching.
#[derive(Debug, Default)]
pub struct WatcherStats {
    pub notifications: AtomicU64,
    pub ignored: AtomicU64,
    pub events_queued: AtomicU64,
    pub batches_flushed: AtomicU64,
}

impl WatcherStats {
    /// Get snapshot of current stats.
    #[must_use]
    pub fn snapshot(&self) -> WatcherStatsSnapshot {
        WatcherStatsSnapshot {
            notifications: self.notifications.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            events_queued: self.events_queued.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of watcher stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStatsSnapshot {
    pub notifications: u64,
    pub ignored: u64,
    pub events_queued: u64,
    pub batches_flushed: u64,
}

/// Turns raw notifications for one watched root into [`Event`]s.
///
/// Owns the known-files set, which decides whether a create notification
/// is a new file or the recreation of a tracked one. Move notifications
/// that arrive as separate halves are paired here by tracker, so the
/// coalescer only ever sees explicit renames.
pub struct NotificationHandler {
    root: PathBuf,
    known_files: HashSet<PathBuf>,
    /// Tracker -> old path, for move halves waiting for their destination.
    pending_moves: HashMap<usize, PathBuf>,
    /// Trackers already turned into a rename; the other half is skipped.
    paired_moves: HashSet<usize>,
    reporter: Option<Reporter>,
    stats: Arc<WatcherStats>,
}

impl NotificationHandler {
    /// Create a handler for `root`, seeded with the files present now.
    pub fn new(
        root: impl Into<PathBuf>,
        known_files: impl IntoIterator<Item = PathBuf>,
        stats: Arc<WatcherStats>,
    ) -> Self {
        Self {
            root: root.into(),
            known_files: known_files.into_iter().collect(),
            pending_moves: HashMap::new(),
            paired_moves: HashSet::new(),
            reporter: None,
            stats,
        }
    }

    /// Echo every translated event through `reporter`.
    #[must_use]
    pub fn with_echo(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Files currently believed to exist, relative to the root.
    #[must_use]
    pub fn known_files(&self) -> &HashSet<PathBuf> {
        &self.known_files
    }

    /// Translate one raw notification.
    pub fn translate(&mut self, event: &notify::Event) -> Vec<Event> {
        self.stats.notifications.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Notification");

        let mut out = Vec::new();
        let tracker = event.attrs.tracker();

        if !is_move_half(event.kind) {
            // Any unrelated notification ends the window for an unpaired move.
            self.drain_pending_moves_into(&mut out);
        }

        match event.kind {
            NotifyKind::Create(CreateKind::Folder) => {
                for path in &event.paths {
                    self.on_dir_created(path, &mut out);
                }
            }
            NotifyKind::Create(_) => {
                for path in &event.paths {
                    if path.is_dir() {
                        self.on_dir_created(path, &mut out);
                    } else {
                        self.on_created(path, &mut out);
                    }
                }
            }
            NotifyKind::Modify(ModifyKind::Name(mode)) => {
                self.on_name_change(mode, &event.paths, tracker, &mut out);
            }
            NotifyKind::Modify(_) => {
                for path in &event.paths {
                    self.on_modified(path, &mut out);
                }
            }
            NotifyKind::Remove(RemoveKind::Folder) => {
                for path in &event.paths {
                    self.on_dir_removed(path, &mut out);
                }
            }
            NotifyKind::Remove(_) => {
                for path in &event.paths {
                    self.on_deleted(path, &mut out);
                }
            }
            NotifyKind::Access(_) | NotifyKind::Any | NotifyKind::Other => {}
        }

        if out.is_empty() {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats
                .events_queued
                .fetch_add(out.len() as u64, Ordering::Relaxed);
            if let Some(reporter) = &self.reporter {
                for event in &out {
                    reporter.notification(event);
                }
            }
        }

        out
    }

    /// Whether a move half is waiting for its partner.
    #[must_use]
    pub fn has_pending_moves(&self) -> bool {
        !self.pending_moves.is_empty()
    }

    /// Treat every move still waiting for its destination as moved out of
    /// the tree.
    pub fn drain_pending_moves(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        self.drain_pending_moves_into(&mut out);
        out
    }

    fn drain_pending_moves_into(&mut self, out: &mut Vec<Event>) {
        self.paired_moves.clear();
        let mut stale: Vec<_> = self.pending_moves.drain().collect();
        stale.sort_by_key(|(tracker, _)| *tracker);
        for (_, rel) in stale {
            self.forget(&rel, out);
        }
    }

    fn relative(&self, path: &Path) -> Option<PathBuf> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.as_os_str().is_empty() || is_ignored(rel) {
            return None;
        }
        Some(rel.to_path_buf())
    }

    fn on_created(&mut self, path: &Path, out: &mut Vec<Event>) {
        let Some(rel) = self.relative(path) else {
            return;
        };
        if self.known_files.contains(&rel) {
            out.push(Event::modified(rel));
        } else {
            self.known_files.insert(rel.clone());
            out.push(Event::created(rel));
        }
    }

    fn on_modified(&mut self, path: &Path, out: &mut Vec<Event>) {
        if path.is_dir() {
            return;
        }
        if let Some(rel) = self.relative(path) {
            if !self.known_files.contains(&rel) && path.is_file() {
                // Created before the watch saw it.
                self.known_files.insert(rel.clone());
            }
            out.push(Event::modified(rel));
        }
    }

    fn on_deleted(&mut self, path: &Path, out: &mut Vec<Event>) {
        if let Some(rel) = self.relative(path) {
            if self.known_files.remove(&rel) {
                out.push(Event::deleted(rel));
            } else if self.has_known_under(&rel) {
                // A directory reported without a folder hint.
                self.forget(&rel, out);
            } else {
                out.push(Event::deleted(rel));
            }
        }
    }

    fn on_dir_created(&mut self, path: &Path, out: &mut Vec<Event>) {
        let Some(rel_dir) = self.relative(path) else {
            return;
        };
        // Files written into a fresh directory can land before its watch is
        // registered, so pick them up from disk.
        let Ok(files) = list_files(path) else {
            return;
        };
        for file in files {
            let rel = rel_dir.join(file);
            if self.known_files.insert(rel.clone()) {
                out.push(Event::created(rel));
            }
        }
    }

    fn on_dir_removed(&mut self, path: &Path, out: &mut Vec<Event>) {
        if let Some(rel) = self.relative(path) {
            self.forget(&rel, out);
        }
    }

    fn on_name_change(
        &mut self,
        mode: RenameMode,
        paths: &[PathBuf],
        tracker: Option<usize>,
        out: &mut Vec<Event>,
    ) {
        match (mode, paths, tracker) {
            (RenameMode::From, [from], Some(tracker)) => {
                if let Some(rel) = self.relative(from) {
                    self.pending_moves.insert(tracker, rel);
                }
            }
            (RenameMode::To, [to], Some(tracker)) => {
                if self.paired_moves.remove(&tracker) {
                    return;
                }
                match self.pending_moves.remove(&tracker) {
                    Some(from) => {
                        self.paired_moves.insert(tracker);
                        self.on_moved(from, to, out);
                    }
                    None => self.on_moved_in(to, out),
                }
            }
            (RenameMode::Both, [from, to], tracker) => {
                if let Some(tracker) = tracker {
                    self.pending_moves.remove(&tracker);
                    if !self.paired_moves.insert(tracker) {
                        self.paired_moves.remove(&tracker);
                        return;
                    }
                }
                match self.relative(from) {
                    Some(from) => self.on_moved(from, to, out),
                    None => self.on_moved_in(to, out),
                }
            }
            (RenameMode::From, paths, None) => {
                for path in paths {
                    self.on_deleted(path, out);
                }
            }
            (RenameMode::To, paths, None) => {
                for path in paths {
                    self.on_moved_in(path, out);
                }
            }
            (_, paths, _) => {
                // Platforms that only say "renamed": decide by what is on disk.
                for path in paths {
                    if path.exists() {
                        self.on_moved_in(path, out);
                    } else {
                        self.on_deleted(path, out);
                    }
                }
            }
        }
    }

    /// A move whose old path `from` (relative) is inside the tree.
    fn on_moved(&mut self, from: PathBuf, to: &Path, out: &mut Vec<Event>) {
        let Some(to_rel) = self.relative(to) else {
            // Moved out of the tree, or into ignored metadata.
            self.forget(&from, out);
            return;
        };

        if to.is_dir() {
            let moved: BTreeSet<PathBuf> = self
                .known_files
                .iter()
                .filter(|known| known.starts_with(&from))
                .cloned()
                .collect();
            for old in moved {
                let Ok(rest) = old.strip_prefix(&from) else {
                    continue;
                };
                let new = to_rel.join(rest);
                self.record_move(old, new, out);
            }
            // Anything not known before the move is new.
            self.on_dir_created(to, out);
            return;
        }

        self.record_move(from, to_rel, out);
    }

    /// A file replaced by a move existed before it, so the move is preceded
    /// by a modification of the target.
    fn record_move(&mut self, from: PathBuf, to: PathBuf, out: &mut Vec<Event>) {
        self.known_files.remove(&from);
        if !self.known_files.insert(to.clone()) {
            out.push(Event::modified(&to));
        }
        out.push(Event::renamed(from, to));
    }

    /// Something arrived from outside the tree.
    fn on_moved_in(&mut self, path: &Path, out: &mut Vec<Event>) {
        if path.is_dir() {
            self.on_dir_created(path, out);
        } else if path.exists() {
            self.on_created(path, out);
        }
    }

    /// Drop `rel` and everything known below it, emitting deletions.
    fn forget(&mut self, rel: &Path, out: &mut Vec<Event>) {
        if self.known_files.remove(rel) {
            out.push(Event::deleted(rel));
            return;
        }
        let gone: BTreeSet<PathBuf> = self
            .known_files
            .iter()
            .filter(|known| known.starts_with(rel))
            .cloned()
            .collect();
        for path in gone {
            self.known_files.remove(&path);
            out.push(Event::deleted(path));
        }
    }

    fn has_known_under(&self, rel: &Path) -> bool {
        self.known_files
            .iter()
            .any(|known| known != rel && known.starts_with(rel))
    }
}

fn is_move_half(kind: NotifyKind) -> bool {
    matches!(
        kind,
        NotifyKind::Modify(ModifyKind::Name(
            RenameMode::From | RenameMode::To | RenameMode::Both
        ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};
    use std::fs;
    use tempfile::TempDir;

    fn handler(root: &Path, known: &[&str]) -> NotificationHandler {
        NotificationHandler::new(
            root,
            known.iter().map(PathBuf::from),
            Arc::new(WatcherStats::default()),
        )
    }

    fn raw(kind: NotifyKind, paths: &[PathBuf]) -> notify::Event {
        let mut event = notify::Event::new(kind);
        for path in paths {
            event = event.add_path(path.clone());
        }
        event
    }

    fn tracked(kind: NotifyKind, paths: &[PathBuf], tracker: usize) -> notify::Event {
        raw(kind, paths).set_tracker(tracker)
    }

    #[test]
    fn test_create_new_and_known_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("new.txt"), "n").unwrap();
        fs::write(root.join("old.txt"), "o").unwrap();
        let mut h = handler(root, &["old.txt"]);

        let create = NotifyKind::Create(CreateKind::File);
        assert_eq!(
            h.translate(&raw(create, &[root.join("new.txt")])),
            vec![Event::created("new.txt")]
        );
        assert_eq!(
            h.translate(&raw(create, &[root.join("old.txt")])),
            vec![Event::modified("old.txt")]
        );
        // Now known, a second create is a recreation.
        assert_eq!(
            h.translate(&raw(create, &[root.join("new.txt")])),
            vec![Event::modified("new.txt")]
        );
    }

    #[test]
    fn test_delete_forgets_file() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let mut h = handler(root, &["a.txt"]);

        let events = h.translate(&raw(
            NotifyKind::Remove(RemoveKind::File),
            &[root.join("a.txt")],
        ));
        assert_eq!(events, vec![Event::deleted("a.txt")]);
        assert!(h.known_files().is_empty());
    }

    #[test]
    fn test_modify_and_ignored_kinds() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        let stats = Arc::new(WatcherStats::default());
        let mut h = NotificationHandler::new(root, Vec::new(), Arc::clone(&stats));

        let modify = NotifyKind::Modify(ModifyKind::Data(DataChange::Content));
        assert_eq!(
            h.translate(&raw(modify, &[root.join("a.txt")])),
            vec![Event::modified("a.txt")]
        );
        let access = NotifyKind::Access(AccessKind::Any);
        assert!(h.translate(&raw(access, &[root.join("a.txt")])).is_empty());
        assert!(h.translate(&raw(modify, &[root.to_path_buf()])).is_empty());

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.notifications, 3);
        assert_eq!(snapshot.events_queued, 1);
        assert_eq!(snapshot.ignored, 2);
    }

    #[test]
    fn test_paths_outside_root_and_git_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/index"), "i").unwrap();
        let mut h = handler(&root, &[]);

        let create = NotifyKind::Create(CreateKind::File);
        assert!(h.translate(&raw(create, &[root.join(".git/index")])).is_empty());
        assert!(h
            .translate(&raw(create, &[tmp.path().join("elsewhere.txt")]))
            .is_empty());
    }

    #[test]
    fn test_paired_move_halves_become_one_rename() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("b.txt"), "moved").unwrap();
        let mut h = handler(root, &["a.txt"]);

        let from = tracked(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[root.join("a.txt")],
            7,
        );
        let to = tracked(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[root.join("b.txt")],
            7,
        );
        let both = tracked(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[root.join("a.txt"), root.join("b.txt")],
            7,
        );

        assert!(h.translate(&from).is_empty());
        assert_eq!(h.translate(&to), vec![Event::renamed("a.txt", "b.txt")]);
        assert!(h.translate(&both).is_empty());
        assert!(h.known_files().contains(Path::new("b.txt")));
        assert!(!h.known_files().contains(Path::new("a.txt")));
    }

    #[test]
    fn test_rename_without_halves() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("b.txt"), "moved").unwrap();
        let mut h = handler(root, &["a.txt"]);

        let both = raw(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[root.join("a.txt"), root.join("b.txt")],
        );
        assert_eq!(h.translate(&both), vec![Event::renamed("a.txt", "b.txt")]);
    }

    #[test]
    fn test_unpaired_move_out_becomes_delete() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("other.txt"), "x").unwrap();
        let mut h = handler(root, &["gone.txt", "other.txt"]);

        let from = tracked(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[root.join("gone.txt")],
            3,
        );
        assert!(h.translate(&from).is_empty());

        let modify = raw(
            NotifyKind::Modify(ModifyKind::Data(DataChange::Any)),
            &[root.join("other.txt")],
        );
        assert_eq!(
            h.translate(&modify),
            vec![Event::deleted("gone.txt"), Event::modified("other.txt")]
        );
    }

    #[test]
    fn test_drain_pending_moves() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let mut h = handler(root, &["gone.txt"]);

        let from = tracked(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::From)),
            &[root.join("gone.txt")],
            1,
        );
        h.translate(&from);
        assert_eq!(h.drain_pending_moves(), vec![Event::deleted("gone.txt")]);
        assert!(h.drain_pending_moves().is_empty());
    }

    #[test]
    fn test_move_over_known_file_modifies_target_first() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("a.txt"), "new").unwrap();
        let mut h = handler(root, &["a.txt", ".a.txt.tmp"]);

        let both = raw(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[root.join(".a.txt.tmp"), root.join("a.txt")],
        );
        assert_eq!(
            h.translate(&both),
            vec![
                Event::modified("a.txt"),
                Event::renamed(".a.txt.tmp", "a.txt"),
            ]
        );
        assert_eq!(h.known_files().len(), 1);
    }

    #[test]
    fn test_directory_move_renames_contents() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("new/sub")).unwrap();
        fs::write(root.join("new/x.txt"), "x").unwrap();
        fs::write(root.join("new/sub/y.txt"), "y").unwrap();
        let mut h = handler(root, &["old/x.txt", "old/sub/y.txt", "keep.txt"]);

        let both = raw(
            NotifyKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[root.join("old"), root.join("new")],
        );
        assert_eq!(
            h.translate(&both),
            vec![
                Event::renamed("old/sub/y.txt", "new/sub/y.txt"),
                Event::renamed("old/x.txt", "new/x.txt"),
            ]
        );
        assert!(h.known_files().contains(Path::new("keep.txt")));
    }

    #[test]
    fn test_new_directory_contents_are_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("fresh")).unwrap();
        fs::write(root.join("fresh/a.txt"), "a").unwrap();
        let mut h = handler(root, &[]);

        let events = h.translate(&raw(
            NotifyKind::Create(CreateKind::Folder),
            &[root.join("fresh")],
        ));
        assert_eq!(events, vec![Event::created("fresh/a.txt")]);

        // The file's own create notification arriving later is a recreation.
        let events = h.translate(&raw(
            NotifyKind::Create(CreateKind::File),
            &[root.join("fresh/a.txt")],
        ));
        assert_eq!(events, vec![Event::modified("fresh/a.txt")]);
    }

    #[test]
    fn test_removed_directory_deletes_known_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let mut h = handler(root, &["d/a.txt", "d/b.txt", "e.txt"]);

        let events = h.translate(&raw(
            NotifyKind::Remove(RemoveKind::Folder),
            &[root.join("d")],
        ));
        assert_eq!(events, vec![Event::deleted("d/a.txt"), Event::deleted("d/b.txt")]);
        assert_eq!(h.known_files().len(), 1);
    }
}
