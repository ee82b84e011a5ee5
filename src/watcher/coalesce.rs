//! Reduction of a raw event batch to its net effect per path.
//!
//! Folding is strictly per path. Renames are never inferred from unrelated
//! delete/create pairs; only an explicit [`EventKind::Renamed`] links two
//! paths together.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::events::{Event, EventKind};

/// Effective state of a path after folding part of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fold {
    /// Untouched, or created and deleted again.
    Absent,
    Created,
    Modified,
    Deleted,
}

impl Fold {
    fn on_created(self) -> Self {
        match self {
            Self::Absent | Self::Created => Self::Created,
            // Deleted then recreated: the file existed before and exists after.
            Self::Modified | Self::Deleted => Self::Modified,
        }
    }

    fn on_deleted(self) -> Self {
        match self {
            Self::Created => Self::Absent,
            Self::Absent | Self::Modified | Self::Deleted => Self::Deleted,
        }
    }
}

#[derive(Debug)]
struct Slot {
    path: PathBuf,
    fold: Fold,
    /// Path this one received its content from through a rename.
    origin: Option<PathBuf>,
}

/// Per-path fold state, keeping paths in first-seen order.
#[derive(Debug, Default)]
struct Folder {
    slots: Vec<Slot>,
    index: HashMap<PathBuf, usize>,
}

impl Folder {
    fn slot(&mut self, path: &Path) -> &mut Slot {
        let idx = match self.index.get(path) {
            Some(&idx) => idx,
            None => {
                let idx = self.slots.len();
                self.slots.push(Slot {
                    path: path.to_path_buf(),
                    fold: Fold::Absent,
                    origin: None,
                });
                self.index.insert(path.to_path_buf(), idx);
                idx
            }
        };
        &mut self.slots[idx]
    }

    fn fold(&mut self, event: &Event) {
        match (event.kind(), event.new_path()) {
            (EventKind::Renamed, Some(to)) => self.fold_rename(event.path(), to),
            (EventKind::Created, _) => {
                let slot = self.slot(event.path());
                slot.fold = slot.fold.on_created();
            }
            (EventKind::Modified, _) => {
                self.slot(event.path()).fold = Fold::Modified;
            }
            (EventKind::Deleted | EventKind::Renamed, _) => {
                let slot = self.slot(event.path());
                slot.fold = slot.fold.on_deleted();
                slot.origin = None;
            }
        }
    }

    /// A rename onto a path that already existed arrives after a
    /// modification of that path, so the target folds like a creation.
    fn fold_rename(&mut self, from: &Path, to: &Path) {
        let inherited = {
            let slot = self.slot(from);
            slot.fold = slot.fold.on_deleted();
            slot.origin.take()
        };
        let origin = inherited.unwrap_or_else(|| from.to_path_buf());

        if origin == to {
            // Moved back where it started.
            let slot = self.slot(to);
            slot.fold = Fold::Modified;
            slot.origin = None;
            return;
        }

        // Only the latest move out of a path is kept as a rename.
        for slot in &mut self.slots {
            if slot.origin.as_deref() == Some(origin.as_path()) {
                slot.origin = None;
            }
        }

        let slot = self.slot(to);
        slot.fold = slot.fold.on_created();
        slot.origin = Some(origin);
    }

    fn finish(self) -> Vec<Event> {
        // origin -> target, for renames whose origin is still gone at the end
        let renames: HashMap<&Path, &Path> = self
            .slots
            .iter()
            .filter_map(|slot| {
                let origin = slot.origin.as_deref()?;
                let origin_idx = *self.index.get(origin)?;
                (self.slots[origin_idx].fold == Fold::Deleted)
                    .then_some((origin, slot.path.as_path()))
            })
            .collect();

        let mut events = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            if let Some(target) = renames.get(slot.path.as_path()) {
                events.push(Event::renamed(&slot.path, *target));
                continue;
            }
            if slot
                .origin
                .as_deref()
                .is_some_and(|origin| renames.contains_key(origin))
            {
                continue;
            }
            match slot.fold {
                Fold::Absent => {}
                Fold::Created => events.push(Event::created(&slot.path)),
                Fold::Modified => events.push(Event::modified(&slot.path)),
                Fold::Deleted => events.push(Event::deleted(&slot.path)),
            }
        }
        events
    }
}

/// Reduce an ordered batch of raw events to its minimal net effect.
///
/// Repeated activity on the same path is folded into one event, a path
/// created and deleted inside the batch disappears entirely, and output
/// order follows the order in which paths were first seen. The function
/// is total and pure: `coalesce(&coalesce(b)) == coalesce(b)`.
#[must_use]
pub fn coalesce(batch: &[Event]) -> Vec<Event> {
    let mut folder = Folder::default();
    for event in batch {
        folder.fold(event);
    }
    folder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch() {
        assert!(coalesce(&[]).is_empty());
    }

    #[test]
    fn test_create_then_delete_cancels() {
        let batch = [Event::created("a.txt"), Event::deleted("a.txt")];
        assert!(coalesce(&batch).is_empty());
    }

    #[test]
    fn test_create_then_delete_only_cancels_that_path() {
        let batch = [
            Event::created("a.txt"),
            Event::modified("b.txt"),
            Event::deleted("a.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::modified("b.txt")]);
    }

    #[test]
    fn test_repeated_modifies_collapse() {
        for n in 1..=5 {
            let batch: Vec<_> = (0..n).map(|_| Event::modified("log.txt")).collect();
            assert_eq!(coalesce(&batch), vec![Event::modified("log.txt")]);
        }
    }

    #[test]
    fn test_created_then_modified_is_modified() {
        let batch = [Event::created("a.txt"), Event::modified("a.txt")];
        assert_eq!(coalesce(&batch), vec![Event::modified("a.txt")]);
    }

    #[test]
    fn test_modified_then_deleted_is_deleted() {
        let batch = [Event::modified("a.txt"), Event::deleted("a.txt")];
        assert_eq!(coalesce(&batch), vec![Event::deleted("a.txt")]);
    }

    #[test]
    fn test_create_delete_create_is_created() {
        let batch = [
            Event::created("a.txt"),
            Event::deleted("a.txt"),
            Event::created("a.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::created("a.txt")]);
    }

    #[test]
    fn test_editor_delete_and_rewrite_is_modified() {
        let batch = [
            Event::deleted("notes.md"),
            Event::modified("notes.md"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::modified("notes.md")]);
    }

    #[test]
    fn test_first_seen_order_is_preserved() {
        let batch = [
            Event::modified("z.txt"),
            Event::created("a.txt"),
            Event::modified("z.txt"),
            Event::deleted("m.txt"),
        ];
        assert_eq!(
            coalesce(&batch),
            vec![
                Event::modified("z.txt"),
                Event::created("a.txt"),
                Event::deleted("m.txt"),
            ]
        );
    }

    #[test]
    fn test_single_rename_passes_through() {
        let batch = [Event::renamed("old.txt", "new.txt")];
        assert_eq!(coalesce(&batch), vec![Event::renamed("old.txt", "new.txt")]);
    }

    #[test]
    fn test_rename_then_modify_target_stays_rename() {
        let batch = [
            Event::renamed("old.txt", "new.txt"),
            Event::modified("new.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::renamed("old.txt", "new.txt")]);
    }

    #[test]
    fn test_rename_then_delete_target_is_delete_of_source() {
        let batch = [
            Event::renamed("old.txt", "new.txt"),
            Event::deleted("new.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::deleted("old.txt")]);
    }

    #[test]
    fn test_rename_of_file_created_in_batch_is_create() {
        let batch = [
            Event::created("tmp.swp"),
            Event::renamed("tmp.swp", "doc.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::created("doc.txt")]);
    }

    #[test]
    fn test_rename_chain_collapses() {
        let batch = [
            Event::renamed("a.txt", "b.txt"),
            Event::renamed("b.txt", "c.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::renamed("a.txt", "c.txt")]);
    }

    #[test]
    fn test_rename_there_and_back_is_modified() {
        let batch = [
            Event::renamed("a.txt", "b.txt"),
            Event::renamed("b.txt", "a.txt"),
        ];
        assert_eq!(coalesce(&batch), vec![Event::modified("a.txt")]);
    }

    #[test]
    fn test_rename_source_recreated_becomes_copy() {
        let batch = [
            Event::renamed("a.txt", "b.txt"),
            Event::created("a.txt"),
        ];
        assert_eq!(
            coalesce(&batch),
            vec![Event::modified("a.txt"), Event::created("b.txt")]
        );
    }

    #[test]
    fn test_rename_over_existing_file_stays_rename() {
        let batch = [
            Event::modified("a.txt"),
            Event::renamed(".a.txt.tmp", "a.txt"),
        ];
        assert_eq!(
            coalesce(&batch),
            vec![Event::renamed(".a.txt.tmp", "a.txt")]
        );
    }

    #[test]
    fn test_rename_over_existing_file_then_delete() {
        let batch = [
            Event::modified("a.txt"),
            Event::renamed("tmp", "a.txt"),
            Event::deleted("a.txt"),
        ];
        assert_eq!(
            coalesce(&batch),
            vec![Event::deleted("a.txt"), Event::deleted("tmp")]
        );
    }

    #[test]
    fn test_rename_of_new_file_over_new_path_then_delete_cancels() {
        let batch = [
            Event::created("tmp"),
            Event::renamed("tmp", "a.txt"),
            Event::deleted("a.txt"),
        ];
        assert!(coalesce(&batch).is_empty());
    }

    #[test]
    fn test_no_cross_path_rename_inference() {
        let batch = [Event::deleted("a.txt"), Event::created("b.txt")];
        assert_eq!(
            coalesce(&batch),
            vec![Event::deleted("a.txt"), Event::created("b.txt")]
        );
    }

    #[test]
    fn test_idempotent() {
        let batches = vec![
            vec![],
            vec![Event::created("a"), Event::deleted("a")],
            vec![
                Event::modified("a"),
                Event::renamed("a", "b"),
                Event::modified("b"),
                Event::created("c"),
            ],
            vec![
                Event::renamed("a", "b"),
                Event::renamed("c", "a"),
                Event::deleted("d"),
            ],
            vec![
                Event::renamed("a", "b"),
                Event::created("a"),
                Event::renamed("a", "c"),
            ],
            vec![
                Event::deleted("x"),
                Event::created("x"),
                Event::modified("y"),
                Event::renamed("y", "x"),
            ],
        ];

        for batch in batches {
            let once = coalesce(&batch);
            assert_eq!(coalesce(&once), once, "batch: {batch:?}");
        }
    }

    /// Random operations on a small tree: applying the coalesced batch to
    /// the starting tree must reproduce the final tree.
    #[test]
    fn test_random_batches_reach_final_tree() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeMap;

        const PATHS: [&str; 3] = ["a", "b", "c"];

        for seed in 0..5_000u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut version = 0u32;
            let mut tree: BTreeMap<PathBuf, u32> = BTreeMap::new();
            for path in PATHS {
                if rng.gen_bool(0.5) {
                    version += 1;
                    tree.insert(PathBuf::from(path), version);
                }
            }
            let start = tree.clone();

            let mut batch = Vec::new();
            for _ in 0..rng.gen_range(0..8) {
                let path = PathBuf::from(PATHS[rng.gen_range(0..PATHS.len())]);
                version += 1;
                if !tree.contains_key(&path) {
                    batch.push(Event::created(&path));
                    tree.insert(path, version);
                    continue;
                }
                match rng.gen_range(0..3) {
                    0 => {
                        batch.push(Event::modified(&path));
                        tree.insert(path, version);
                    }
                    1 => {
                        batch.push(Event::deleted(&path));
                        tree.remove(&path);
                    }
                    _ => {
                        let to = PathBuf::from(PATHS[rng.gen_range(0..PATHS.len())]);
                        if to == path {
                            continue;
                        }
                        // Replacing an existing file is reported as a
                        // modification of it first.
                        if tree.contains_key(&to) {
                            batch.push(Event::modified(&to));
                        }
                        batch.push(Event::renamed(&path, &to));
                        let moved = tree.remove(&path).unwrap();
                        tree.insert(to, moved);
                    }
                }
            }

            let coalesced = coalesce(&batch);
            let mut mirror = start.clone();
            for event in &coalesced {
                let copied = match (event.kind(), event.new_path()) {
                    (EventKind::Created | EventKind::Modified, _) => Some(event.path()),
                    (EventKind::Renamed, Some(to)) => {
                        mirror.remove(event.path());
                        Some(to)
                    }
                    (EventKind::Deleted | EventKind::Renamed, _) => {
                        mirror.remove(event.path());
                        None
                    }
                };
                // A copy of a path gone from the source is skipped.
                if let Some(path) = copied {
                    if let Some(&current) = tree.get(path) {
                        mirror.insert(path.to_path_buf(), current);
                    }
                }
            }

            assert_eq!(
                mirror, tree,
                "seed {seed}: {batch:?} coalesced to {coalesced:?}"
            );
            assert_eq!(coalesce(&coalesced), coalesced, "seed {seed}: {batch:?}");
        }
    }
}
