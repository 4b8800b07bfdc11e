//! Option registry: displayed label to the query it stands for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A server-provided reply option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOption {
    /// Text shown to the user.
    pub label: String,
    /// Query actually sent when the option is chosen.
    pub query: String,
}

impl ReplyOption {
    /// Create a new option.
    #[must_use]
    pub fn new(label: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            query: query.into(),
        }
    }
}

/// Outcome of binding an option into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Label was not bound before.
    New,
    /// Label was already bound to the same query.
    Unchanged,
    /// Label was bound to a different query, which has been replaced.
    Rebound { previous: String },
}

/// Label to query mapping for the current conversation branch.
///
/// Grows monotonically within a branch. Back-navigation replaces it
/// wholesale from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionRegistry {
    entries: HashMap<String, String>,
}

impl OptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an option's label to its query.
    ///
    /// The newest binding wins; a replaced query is reported through
    /// [`Binding::Rebound`] so callers can surface it.
    pub fn bind(&mut self, option: ReplyOption) -> Binding {
        match self.entries.insert(option.label, option.query.clone()) {
            None => Binding::New,
            Some(previous) if previous == option.query => Binding::Unchanged,
            Some(previous) => Binding::Rebound { previous },
        }
    }

    /// Mapped query for a label, if any.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    /// Query to send when `text` is activated.
    ///
    /// Falls back to the text itself for unmapped labels (default queries).
    #[must_use]
    pub fn resolve<'a>(&'a self, text: &'a str) -> &'a str {
        self.get(text).unwrap_or(text)
    }

    /// Whether the label is bound.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Number of bound labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no label is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
