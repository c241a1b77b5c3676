//! Undo/redo over local snapshots.
//!
//! History is strictly local: it captures what this peer's scene looked like
//! at interaction boundaries, paired with whatever app-level state the caller
//! wants restored alongside it. Remote merges invalidate the stacks wholesale
//! (see [`History::clear`]) because replaying a pre-merge snapshot would
//! resurrect elements peers have since changed or deleted.
//!
//! Recording is one-shot: the embedding application arms it at the end of an
//! interaction (pointer-up, commit), and the next snapshot disarms it again.
//! Intermediate mutations within one gesture therefore never pollute the
//! undo stack.

use crate::element::Element;
use serde::{Deserialize, Serialize};

/// One undoable snapshot: the full element set plus opaque app state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Caller-defined state restored together with the elements.
    pub app_state: serde_json::Value,
    /// The scene at snapshot time, tombstones included.
    pub elements: Vec<Element>,
}

/// Snapshot-based undo/redo stacks.
#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    recording: bool,
}

impl History {
    /// Create empty history with recording disarmed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm recording for the next snapshot.
    pub fn resume_recording(&mut self) {
        self.recording = true;
    }

    /// Whether the next [`History::record`] call will take a snapshot.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Take a snapshot if recording is armed, then disarm.
    ///
    /// A snapshot identical to the current undo top is skipped so repeated
    /// commits without intervening changes don't stack duplicates. Any new
    /// snapshot invalidates the redo stack.
    pub fn record(&mut self, entry: HistoryEntry) {
        if !self.recording {
            return;
        }
        self.recording = false;

        if self.undo_stack.last() == Some(&entry) {
            return;
        }

        self.undo_stack.push(entry);
        self.redo_stack.clear();
    }

    /// Pop the most recent snapshot, pushing `current` onto the redo stack.
    ///
    /// Returns `None` when there is nothing to undo; in that case `current`
    /// is dropped and the redo stack is untouched.
    pub fn undo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(current);
        Some(entry)
    }

    /// Pop the most recent undone snapshot, pushing `current` back for undo.
    pub fn redo(&mut self, current: HistoryEntry) -> Option<HistoryEntry> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(current);
        Some(entry)
    }

    /// Drop both stacks. Called after every remote merge.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Number of snapshots available to undo.
    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of snapshots available to redo.
    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(label: &str) -> HistoryEntry {
        HistoryEntry {
            app_state: json!({ "label": label }),
            elements: vec![],
        }
    }

    #[test]
    fn record_requires_arming() {
        let mut history = History::new();

        history.record(entry("ignored"));
        assert_eq!(history.undo_len(), 0);

        history.resume_recording();
        history.record(entry("kept"));
        assert_eq!(history.undo_len(), 1);

        // one-shot: disarmed again after the snapshot
        assert!(!history.is_recording());
        history.record(entry("ignored too"));
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn duplicate_snapshot_skipped() {
        let mut history = History::new();

        history.resume_recording();
        history.record(entry("a"));
        history.resume_recording();
        history.record(entry("a"));

        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn undo_redo_round_trip() {
        let mut history = History::new();

        history.resume_recording();
        history.record(entry("first"));
        history.resume_recording();
        history.record(entry("second"));

        let undone = history.undo(entry("current")).unwrap();
        assert_eq!(undone, entry("second"));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 1);

        let redone = history.redo(undone).unwrap();
        assert_eq!(redone, entry("current"));
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn undo_on_empty_is_none() {
        let mut history = History::new();
        assert!(history.undo(entry("current")).is_none());
        // the current snapshot was not leaked into redo
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn new_snapshot_clears_redo() {
        let mut history = History::new();

        history.resume_recording();
        history.record(entry("a"));
        history.undo(entry("current")).unwrap();
        assert_eq!(history.redo_len(), 1);

        history.resume_recording();
        history.record(entry("b"));
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn clear_drops_both_stacks() {
        let mut history = History::new();

        history.resume_recording();
        history.record(entry("a"));
        history.undo(entry("current")).unwrap();

        history.clear();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 0);
    }
}
