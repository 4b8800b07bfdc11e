//! Click-once enforcement for selectable messages.

use std::collections::HashSet;

/// Stable address of a selectable message.
///
/// Labels repeat across branches, so the transcript position is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivationKey {
    /// Index of the message in the transcript.
    pub position: usize,
    /// Displayed text of the message.
    pub label: String,
}

impl ActivationKey {
    /// Create a new key.
    #[must_use]
    pub fn new(position: usize, label: impl Into<String>) -> Self {
        Self {
            position,
            label: label.into(),
        }
    }
}

/// Set of already-activated selectable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickGuard {
    activated: HashSet<ActivationKey>,
}

impl ClickGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and mark in one step.
    ///
    /// Returns `true` only for the first call with a given key.
    pub fn try_mark(&mut self, key: ActivationKey) -> bool {
        self.activated.insert(key)
    }

    /// Whether the key has been activated.
    #[must_use]
    pub fn contains(&self, key: &ActivationKey) -> bool {
        self.activated.contains(key)
    }

    /// Number of activated keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.activated.len()
    }

    /// Whether nothing has been activated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty()
    }
}
