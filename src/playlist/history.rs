//! Bounded undo/redo log of structural playlist deltas.
//!
//! Each entry records one insert, remove or replace, holding clones of the
//! affected record references (not of the records themselves) so the exact
//! reference values can be restored on undo. The log is linear: committing a
//! new change after undoing discards the abandoned future, and once capacity
//! is reached the oldest entry is dropped.

use std::collections::VecDeque;

use crate::record::RecordRef;

pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// One recorded structural delta.
#[derive(Debug, Clone)]
pub enum Changeset {
    Add {
        at: usize,
        records: Vec<RecordRef>,
    },
    Remove {
        at: usize,
        records: Vec<RecordRef>,
    },
    Replace {
        at: usize,
        old: RecordRef,
        new: RecordRef,
    },
}

/// Ring of changesets plus a cursor into the last applied entry.
///
/// `present == None` means nothing to undo. Entries past the cursor are the
/// redoable future; they only survive until the next `push`.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Changeset>,
    present: Option<usize>,
    capacity: usize,
}

impl Default for History {
    fn default() -> History {
        History::with_capacity(DEFAULT_HISTORY_SIZE)
    }
}

impl History {
    pub fn with_capacity(capacity: usize) -> History {
        assert!(capacity > 0, "history capacity must be positive");
        History {
            entries: VecDeque::with_capacity(capacity),
            present: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor position: index of the last applied entry, if any.
    pub fn present(&self) -> Option<usize> {
        self.present
    }

    /// Records a fresh changeset, discarding any redoable future first and
    /// evicting the oldest entry when full.
    pub fn push(&mut self, changeset: Changeset) {
        let applied = self.present.map_or(0, |p| p + 1);
        self.entries.truncate(applied);

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.present = self.present.and_then(|p| p.checked_sub(1));
        }

        self.entries.push_back(changeset);
        self.present = Some(self.entries.len() - 1);
    }

    /// Steps the cursor back, handing out the changeset to reverse.
    /// Returns `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Changeset> {
        let index = self.present?;
        let changeset = self.entries[index].clone();
        self.present = index.checked_sub(1);
        Some(changeset)
    }

    /// Steps the cursor forward, handing out the changeset to reapply.
    /// Returns `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Changeset> {
        let next = self.present.map_or(0, |p| p + 1);
        let changeset = self.entries.get(next)?.clone();
        self.present = Some(next);
        Some(changeset)
    }
}
