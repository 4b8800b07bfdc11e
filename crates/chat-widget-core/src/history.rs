//! Snapshot stack for back-navigation.

use std::collections::VecDeque;

use crate::{ClickGuard, OptionRegistry, Transcript};

/// Identifier of a pushed snapshot.
///
/// Strictly increasing over the lifetime of a stack, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointId(u64);

impl CheckpointId {
    /// Raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Full copy of controller state at an instant.
///
/// Every field is an owned collection, so a snapshot never shares
/// storage with live state or with other snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub transcript: Transcript,
    pub options: OptionRegistry,
    pub guard: ClickGuard,
}

struct Entry {
    id: CheckpointId,
    snapshot: Snapshot,
}

/// LIFO stack of snapshots.
///
/// Unbounded by default. With a limit, the oldest entry is evicted when a
/// push would exceed it.
pub struct HistoryStack {
    entries: VecDeque<Entry>,
    limit: Option<usize>,
    next_id: u64,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStack {
    /// Create an unbounded stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            limit: None,
            next_id: 0,
        }
    }

    /// Create a stack that keeps at most `limit` snapshots.
    ///
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit.max(1)),
            ..Self::new()
        }
    }

    /// Push a snapshot, returning its checkpoint.
    pub fn push(&mut self, snapshot: Snapshot) -> CheckpointId {
        let id = CheckpointId(self.next_id);
        self.next_id += 1;

        if let Some(limit) = self.limit {
            while self.entries.len() >= limit {
                if let Some(evicted) = self.entries.pop_front() {
                    tracing::debug!(checkpoint = evicted.id.get(), "Evicted oldest history entry");
                }
            }
        }

        self.entries.push_back(Entry { id, snapshot });
        id
    }

    /// Remove and return the most recent snapshot.
    pub fn pop(&mut self) -> Option<(CheckpointId, Snapshot)> {
        self.entries.pop_back().map(|e| (e.id, e.snapshot))
    }

    /// Most recent snapshot without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&Snapshot> {
        self.entries.back().map(|e| &e.snapshot)
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently issued checkpoint, even if since popped or evicted.
    #[must_use]
    pub fn last_checkpoint(&self) -> Option<CheckpointId> {
        self.next_id.checked_sub(1).map(CheckpointId)
    }

    /// Configured depth limit.
    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }
}
