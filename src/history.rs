//! Snapshot undo history.
//!
//! A snapshot of the whole document is pushed before every committed mutation and popped
//! to restore it. The stack is bounded; when full, the oldest snapshot is dropped.
//! Restoring is not itself undoable and there is no redo.

use crate::document::Document;
use crate::statics;
use std::collections::VecDeque;
use std::time::SystemTime;

/// State captured right before a mutation.
#[derive(Debug, Clone)]
pub struct UndoSnapshot {
    /// Text, systems and deleted-emitter records, as they were.
    pub document: Document,
    pub selected_system: Option<String>,
    pub timestamp: SystemTime,
    /// What the mutation that followed this snapshot did.
    pub description: String,
}

impl UndoSnapshot {
    pub fn capture(
        document: &Document,
        selected_system: Option<&str>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            document: document.clone(),
            selected_system: selected_system.map(str::to_string),
            timestamp: SystemTime::now(),
            description: description.into(),
        }
    }
}

#[derive(Debug)]
pub struct UndoHistory {
    /// Oldest first.
    snapshots: VecDeque<UndoSnapshot>,
    limit: usize,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::with_limit(statics::DEFAULT_HISTORY_LIMIT)
    }
}

impl UndoHistory {
    /// `limit` is clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn with_limit(limit: usize) -> Self {
        let limit = limit.clamp(1, statics::MAX_HISTORY_LIMIT);
        Self {
            snapshots: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn push(&mut self, snapshot: UndoSnapshot) {
        while self.snapshots.len() >= self.limit {
            if let Some(evicted) = self.snapshots.pop_front() {
                tracing::debug!(description = %evicted.description, "undo history full, dropping oldest");
            }
        }
        self.snapshots.push_back(snapshot);
    }

    pub fn pop(&mut self) -> Option<UndoSnapshot> {
        self.snapshots.pop_back()
    }

    /// Description of the mutation the next `pop` would revert.
    pub fn peek_description(&self) -> Option<&str> {
        self.snapshots.back().map(|s| s.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(n: usize) -> UndoSnapshot {
        let doc = Document::from_text(format!("\"Fx_{n}\" = VfxSystemDefinitionData {{}}\n"));
        UndoSnapshot::capture(&doc, None, format!("edit {n}"))
    }

    #[test]
    fn oldest_snapshot_is_evicted_at_the_limit() {
        let mut history = UndoHistory::with_limit(3);
        for n in 0..5 {
            history.push(snapshot(n));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.peek_description(), Some("edit 4"));

        let restored: Vec<String> = std::iter::from_fn(|| history.pop())
            .map(|s| s.description)
            .collect();
        assert_eq!(restored, vec!["edit 4", "edit 3", "edit 2"]);
        assert!(history.is_empty());
    }

    #[test]
    fn limit_is_clamped() {
        assert_eq!(UndoHistory::with_limit(0).limit(), 1);
        assert_eq!(UndoHistory::with_limit(500).limit(), statics::MAX_HISTORY_LIMIT);
        assert_eq!(UndoHistory::default().limit(), statics::DEFAULT_HISTORY_LIMIT);
    }
}
