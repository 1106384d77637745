//! Undo/redo history of song changes.

use ml_ir::Change;

/// A single undoable operation: forward changes + reverse changes.
#[derive(Clone, Debug)]
struct HistoryEntry {
    forward: Vec<Change>,
    /// Stored in application order of the undo, i.e. last change first.
    reverse: Vec<Change>,
}

/// Undo/redo stack. An entry can be left open so that later changes extend
/// it instead of starting a new one.
pub struct History {
    entries: Vec<HistoryEntry>,
    position: usize,
    open: bool,
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            position: 0,
            open: false,
        }
    }

    /// Record a change as its own entry, closing any open entry.
    pub fn push(&mut self, change: Change) {
        self.open = false;
        self.push_batch(vec![change]);
    }

    /// Record a batch of changes as a single entry.
    pub fn push_batch(&mut self, changes: Vec<Change>) {
        // Truncate any redo history beyond current position
        self.entries.truncate(self.position);
        let reverse = changes.iter().rev().map(Change::reversed).collect();
        self.entries.push(HistoryEntry { forward: changes, reverse });
        self.position = self.entries.len();
    }

    /// Append to the open entry, opening a new one if none is open.
    pub fn extend(&mut self, change: Change) {
        if self.open && self.position == self.entries.len() {
            if let Some(entry) = self.entries.last_mut() {
                entry.reverse.insert(0, change.reversed());
                entry.forward.push(change);
                return;
            }
        }
        self.push_batch(vec![change]);
        self.open = true;
    }

    /// Append a final change to the open entry and close it. With no open
    /// entry the change becomes its own entry.
    pub fn close_with(&mut self, change: Change) {
        if self.open {
            self.extend(change);
        } else {
            self.push_batch(vec![change]);
        }
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Undo: returns the reverse changes to apply, or None if nothing to undo.
    pub fn undo(&mut self) -> Option<&[Change]> {
        if self.position == 0 {
            return None;
        }
        self.open = false;
        self.position -= 1;
        Some(&self.entries[self.position].reverse)
    }

    /// Redo: returns the forward changes to apply, or None if nothing to redo.
    pub fn redo(&mut self) -> Option<&[Change]> {
        if self.position >= self.entries.len() {
            return None;
        }
        let changes = &self.entries[self.position].forward;
        self.position += 1;
        Some(changes)
    }

    pub fn can_undo(&self) -> bool {
        self.position > 0
    }

    pub fn can_redo(&self) -> bool {
        self.position < self.entries.len()
    }

    /// Number of entries (including undone ones).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forward changes of entry `index`.
    pub fn entry(&self, index: usize) -> Option<&[Change]> {
        self.entries.get(index).map(|e| e.forward.as_slice())
    }

    /// Every recorded change, oldest first.
    pub fn changes(&self) -> impl Iterator<Item = &Change> {
        self.entries.iter().flat_map(|e| e.forward.iter())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
