//! Linear undo/redo over full-document snapshots.

use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub snapshot: String,
    /// Edit kind that produced the snapshot (`initial`, `text`, `style`, ...).
    pub label: String,
    pub recorded_at: DateTime<Utc>,
}

/// Invariant: `index < entries.len()` whenever the history is non-empty.
/// Entry 0 is the initial snapshot and is never evicted.
#[derive(Debug, Clone)]
pub struct EditHistory {
    entries: Vec<HistoryEntry>,
    index: usize,
    max_entries: usize,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl EditHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            max_entries: max_entries.max(2),
        }
    }

    /// Starts over with `snapshot` as the only entry.
    pub fn reset(&mut self, snapshot: impl Into<String>) {
        self.entries.clear();
        self.entries.push(entry(snapshot.into(), "initial"));
        self.index = 0;
    }

    /// Drops any redo tail, appends and moves to the new entry.
    pub fn push(&mut self, snapshot: impl Into<String>, label: &str) {
        if self.entries.is_empty() {
            self.entries.push(entry(snapshot.into(), label));
            self.index = 0;
            return;
        }
        self.entries.truncate(self.index + 1);
        self.entries.push(entry(snapshot.into(), label));
        if self.entries.len() > self.max_entries {
            // Oldest edit after the initial snapshot goes first.
            self.entries.remove(1);
        }
        self.index = self.entries.len() - 1;
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Snapshot now displayed, or `None` when at the first entry.
    pub fn undo(&mut self) -> Option<&str> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    pub fn redo(&mut self) -> Option<&str> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.index).map(|e| e.snapshot.as_str())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent first, at most `limit`.
    pub fn entries(&self, limit: usize) -> Vec<&HistoryEntry> {
        self.entries.iter().rev().take(limit).collect()
    }
}

fn entry(snapshot: String, label: &str) -> HistoryEntry {
    HistoryEntry {
        snapshot,
        label: label.to_string(),
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(snapshots: &[&str]) -> EditHistory {
        let mut h = EditHistory::default();
        h.reset(snapshots[0]);
        for s in &snapshots[1..] {
            h.push(*s, "text");
        }
        h
    }

    #[test]
    fn test_undo_redo_bounds() {
        let mut h = history(&["a", "b"]);
        assert_eq!(h.redo(), None);
        assert_eq!(h.undo(), Some("a"));
        assert_eq!(h.undo(), None);
        assert_eq!(h.index(), 0);
        assert_eq!(h.redo(), Some("b"));
    }

    #[test]
    fn test_push_undo_redo_is_idempotent() {
        let mut h = history(&["a", "b"]);
        h.push("c", "style");
        h.undo();
        h.redo();
        assert_eq!(h.current(), Some("c"));
        assert_eq!(h.len(), 3);
        assert_eq!(h.index(), 2);
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut h = history(&["a", "b", "c"]);
        h.undo();
        h.undo();
        h.push("x", "text");
        assert_eq!(h.len(), 2);
        assert!(!h.can_redo());
        assert_eq!(h.undo(), Some("a"));
    }

    #[test]
    fn test_capacity_keeps_initial() {
        let mut h = EditHistory::new(3);
        h.reset("init");
        for s in ["1", "2", "3", "4"] {
            h.push(s, "text");
        }
        assert_eq!(h.len(), 3);
        let snapshots: Vec<&str> = h.entries(10).iter().map(|e| e.snapshot.as_str()).collect();
        assert_eq!(snapshots, vec!["4", "3", "init"]);
        assert_eq!(h.index(), 2);
    }

    #[test]
    fn test_entries_labels_most_recent_first() {
        let mut h = EditHistory::default();
        h.reset("<p></p>");
        h.push("<p>x</p>", "text");
        h.push("<p style=\"opacity: 0.5\">x</p>", "style");
        let labels: Vec<&str> = h.entries(2).iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["style", "text"]);
        assert!(h.entries(5)[0].recorded_at >= h.entries(5)[2].recorded_at);
    }
}
