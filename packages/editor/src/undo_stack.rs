//! # Undo/Redo Stack
//!
//! Linear history of whole-state snapshots. The stack is generic over
//! the snapshot type; it defaults to a bare [`BlockTree`] and the document
//! store keeps its tree and forms together in one snapshot.
//!
//! ## Design
//!
//! - `entries[index]` always matches the tree as of the last recorded edit
//! - Undo/redo move `index` and hand back a copy of that snapshot
//! - Recording while not at the tail discards the redo future
//! - A snapshot equal to the current entry is not recorded
//! - Field edits are debounced: they schedule a snapshot which is taken once
//!   edits go quiet, so a burst of typing becomes one entry
//! - Structural edits record immediately
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new(&tree);
//!
//! tree.insert(block, None, None, &mut ids)?;
//! stack.record(&tree, "AddBlock");
//!
//! if let Some(previous) = stack.undo(&tree) {
//!     tree = previous;
//! }
//! ```

use crate::debounce::Debouncer;
use crate::tree::BlockTree;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_ENTRIES: usize = 100;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Immutable copy of the state at one point in history
#[derive(Debug, Clone)]
pub struct HistorySnapshot<T = BlockTree> {
    state: T,

    /// What produced this state
    pub description: Option<String>,
}

impl<T> HistorySnapshot<T> {
    pub fn state(&self) -> &T {
        &self.state
    }
}

/// Undo/redo history for one document
#[derive(Debug)]
pub struct UndoStack<T = BlockTree> {
    entries: Vec<HistorySnapshot<T>>,

    index: usize,

    /// Maximum number of entries kept (0 = unlimited)
    max_entries: usize,

    debouncer: Debouncer,

    pending_description: Option<String>,
}

impl<T: Clone + PartialEq> UndoStack<T> {
    /// Start history at `initial` with default limits
    pub fn new(initial: &T) -> Self {
        Self::with_options(initial, DEFAULT_MAX_ENTRIES, DEFAULT_DEBOUNCE)
    }

    pub fn with_options(initial: &T, max_entries: usize, debounce: Duration) -> Self {
        Self {
            entries: vec![HistorySnapshot {
                state: initial.clone(),
                description: None,
            }],
            index: 0,
            max_entries,
            debouncer: Debouncer::new(debounce),
            pending_description: None,
        }
    }

    /// Drop all history and start over at `state`
    pub fn reset(&mut self, state: &T) {
        self.entries.clear();
        self.entries.push(HistorySnapshot {
            state: state.clone(),
            description: None,
        });
        self.index = 0;
        self.debouncer.cancel();
        self.pending_description = None;
    }

    /// Snapshot `state` now. Returns whether an entry was added.
    pub fn record(&mut self, state: &T, description: impl Into<String>) -> bool {
        self.debouncer.cancel();
        self.pending_description = None;

        if self.entries[self.index].state == *state {
            return false;
        }

        // New edit invalidates the redo future
        self.entries.truncate(self.index + 1);
        self.entries.push(HistorySnapshot {
            state: state.clone(),
            description: Some(description.into()),
        });

        if self.max_entries > 0 && self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
        self.index = self.entries.len() - 1;

        true
    }

    /// Ask for a snapshot once edits have been quiet for the debounce delay
    pub fn schedule(&mut self, now: Instant, description: impl Into<String>) {
        self.debouncer.schedule(now);
        self.pending_description = Some(description.into());
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Record the scheduled snapshot if its deadline has passed
    pub fn commit_due(&mut self, now: Instant, state: &T) -> bool {
        if !self.debouncer.take_due(now) {
            return false;
        }
        self.record_scheduled(state)
    }

    /// Record the scheduled snapshot immediately, if any
    pub fn commit_pending(&mut self, state: &T) -> bool {
        if !self.debouncer.is_pending() {
            return false;
        }
        self.record_scheduled(state)
    }

    fn record_scheduled(&mut self, state: &T) -> bool {
        let description = self
            .pending_description
            .take()
            .unwrap_or_else(|| "Edit".to_string());
        self.record(state, description)
    }

    /// Step back. `live` is the current state, used to commit a pending
    /// snapshot first so the latest edits are not skipped.
    pub fn undo(&mut self, live: &T) -> Option<T> {
        self.commit_pending(live);

        if self.index == 0 {
            return None;
        }
        self.index -= 1;
        Some(self.entries[self.index].state.clone())
    }

    /// Step forward. Pending edits count as a new edit and drop the future.
    pub fn redo(&mut self, live: &T) -> Option<T> {
        self.commit_pending(live);

        if self.index + 1 >= self.entries.len() {
            return None;
        }
        self.index += 1;
        Some(self.entries[self.index].state.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
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

    /// Snapshot matching the last recorded state
    pub fn current(&self) -> &HistorySnapshot<T> {
        &self.entries[self.index]
    }

    pub fn entries(&self) -> &[HistorySnapshot<T>] {
        &self.entries
    }

    pub fn undo_levels(&self) -> usize {
        self.index
    }

    pub fn redo_levels(&self) -> usize {
        self.entries.len() - self.index - 1
    }

    /// Get description of the next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.entries[self.index].description.as_deref()
        } else {
            None
        }
    }

    /// Get description of the next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.entries
            .get(self.index + 1)
            .and_then(|entry| entry.description.as_deref())
    }
}
