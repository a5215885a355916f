//! Bounded undo/redo history of document snapshots.

use crate::snapshot::DocumentSnapshot;
use std::collections::VecDeque;
use std::sync::Arc;

/// Maximum number of history entries kept by default.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Linear snapshot history with a cursor.
///
/// The entry under the cursor is the state currently shown. Recording
/// drops everything after the cursor, so a new edit after an undo
/// discards the redo branch.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<Arc<DocumentSnapshot>>,
    cursor: usize,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: 0,
            capacity,
        }
    }

    /// Push a snapshot after the cursor.
    pub fn record(&mut self, snapshot: DocumentSnapshot) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(Arc::new(snapshot));
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one entry. Returns `None` at the earliest entry.
    pub fn undo(&mut self) -> Option<Arc<DocumentSnapshot>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// Step forward one entry. Returns `None` at the latest entry.
    pub fn redo(&mut self) -> Option<Arc<DocumentSnapshot>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Entry under the cursor.
    pub fn current(&self) -> Option<&DocumentSnapshot> {
        self.entries.get(self.cursor).map(Arc::as_ref)
    }

    /// Drop everything and start over from `baseline`.
    pub fn reset(&mut self, baseline: DocumentSnapshot) {
        self.clear();
        self.record(baseline);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::NewElement;
    use crate::store::DocumentStore;
    use kurbo::Point;
    use proptest::prelude::*;

    /// Snapshot holding `n` text elements at distinct positions.
    fn numbered(n: usize) -> DocumentSnapshot {
        let mut store = DocumentStore::new();
        for i in 0..n {
            store
                .create(NewElement::text(Point::new(i as f64, 0.0)).with_id(format!("e{i}").into()))
                .unwrap();
        }
        store.snapshot()
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
        assert!(history.current().is_none());
    }

    #[test]
    fn test_undo_at_earliest_is_noop() {
        let mut history = History::default();
        history.reset(numbered(0));
        assert!(history.undo().is_none());
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = History::new(50);
        for i in 0..51 {
            history.record(numbered(i));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.cursor(), 49);

        let mut oldest = None;
        while let Some(entry) = history.undo() {
            oldest = Some(entry);
        }
        assert_eq!(*oldest.unwrap(), numbered(1));
    }

    #[test]
    fn test_record_after_undo_truncates_redo() {
        let mut history = History::default();
        history.reset(numbered(0));
        history.record(numbered(1));
        history.record(numbered(2));
        history.undo();
        history.undo();
        history.record(numbered(5));

        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(*history.undo().unwrap(), numbered(0));
        assert_eq!(*history.redo().unwrap(), numbered(5));
        assert!(history.redo().is_none());
    }

    #[test]
    fn test_reset_discards_entries() {
        let mut history = History::default();
        history.record(numbered(1));
        history.record(numbered(2));
        history.reset(numbered(3));
        assert_eq!(history.len(), 1);
        assert_eq!(history.current(), Some(&numbered(3)));
    }

    proptest! {
        #[test]
        fn prop_undo_then_redo_restores_sequence(n in 1usize..20) {
            let mut history = History::default();
            history.reset(numbered(0));
            for i in 1..=n {
                history.record(numbered(i));
            }

            for i in (0..n).rev() {
                let entry = history.undo().unwrap();
                prop_assert_eq!(&*entry, &numbered(i));
            }
            prop_assert!(history.undo().is_none());

            for i in 1..=n {
                let entry = history.redo().unwrap();
                prop_assert_eq!(&*entry, &numbered(i));
            }
            prop_assert!(history.redo().is_none());
        }
    }
}
