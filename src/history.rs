//! Undo/redo history of mask snapshots.
//!
//! The history is a list of committed masks plus a cursor pointing one past
//! the active snapshot. Committing after an undo discards the redo branch.
//!
//! ```text
//! commit(A) commit(B) commit(C)   [A, B, C]  cursor 3  active C
//! undo()                          [A, B, C]  cursor 2  active B
//! commit(D)                       [A, B, D]  cursor 3  active D
//! ```
//!
//! The first snapshot is the floor: undo stops once the cursor reaches 1.

use thiserror::Error;

use crate::constants::DEFAULT_MAX_HISTORY;
use crate::mask::LabelMask;

/// Undo or redo was requested with nothing to move to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Nothing to {0}")]
pub struct HistoryExhausted(pub Direction);

/// Which way the cursor was asked to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Undo => write!(f, "undo"),
            Direction::Redo => write!(f, "redo"),
        }
    }
}

/// Snapshot history with a cursor.
#[derive(Debug, Clone)]
pub struct HistoryStack {
    snapshots: Vec<LabelMask>,
    /// One past the active snapshot; 0 means nothing committed.
    cursor: usize,
    /// Oldest snapshots are dropped beyond this many
    max_snapshots: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_HISTORY)
    }
}

impl HistoryStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history that keeps at most `max_snapshots` masks.
    ///
    /// The limit is at least 2 so an edit on top of the baseline stays visible
    /// to [`HistoryStack::has_unsaved_edits`].
    pub fn with_limit(max_snapshots: usize) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            max_snapshots: max_snapshots.max(2),
        }
    }

    /// Record a post-edit mask as the new active snapshot.
    pub fn commit(&mut self, mask: LabelMask) {
        if self.cursor < self.snapshots.len() {
            log::debug!(
                "History: discarding {} redo snapshot(s)",
                self.snapshots.len() - self.cursor
            );
            self.snapshots.truncate(self.cursor);
        }
        self.snapshots.push(mask);
        self.cursor += 1;

        let excess = self.snapshots.len().saturating_sub(self.max_snapshots);
        if excess > 0 {
            self.snapshots.drain(..excess);
            self.cursor -= excess;
        }
        log::debug!("History: committed snapshot {}", self.cursor);
    }

    /// Step back one snapshot and return the mask that is now active.
    pub fn undo(&mut self) -> Result<&LabelMask, HistoryExhausted> {
        if !self.can_undo() {
            log::debug!("History: nothing to undo");
            return Err(HistoryExhausted(Direction::Undo));
        }
        self.cursor -= 1;
        log::debug!("History: undo to snapshot {}", self.cursor);
        Ok(&self.snapshots[self.cursor - 1])
    }

    /// Step forward one snapshot and return the mask that is now active.
    pub fn redo(&mut self) -> Result<&LabelMask, HistoryExhausted> {
        if !self.can_redo() {
            log::debug!("History: nothing to redo");
            return Err(HistoryExhausted(Direction::Redo));
        }
        self.cursor += 1;
        log::debug!("History: redo to snapshot {}", self.cursor);
        Ok(&self.snapshots[self.cursor - 1])
    }

    /// Undo is possible while an earlier snapshot exists.
    pub fn can_undo(&self) -> bool {
        self.cursor > 1
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.snapshots.len()
    }

    /// The active snapshot, `None` before the first commit.
    pub fn active(&self) -> Option<&LabelMask> {
        self.cursor.checked_sub(1).map(|i| &self.snapshots[i])
    }

    /// True once more than one snapshot has been committed.
    pub fn has_unsaved_edits(&self) -> bool {
        self.snapshots.len() > 1
    }

    /// Forget everything; the persisted state becomes the new baseline.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
        log::debug!("History cleared");
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn snapshots(&self) -> &[LabelMask] {
        &self.snapshots
    }
}
