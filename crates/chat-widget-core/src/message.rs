//! Transcript entries.

use serde::{Deserialize, Serialize};

/// Who authored a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person using the widget.
    User,
    /// The remote dialogue service.
    Bot,
}

/// A single entry in the visible conversation.
///
/// Once appended, `sender` and `text` never change. Whether a selectable
/// entry has been activated is tracked by the `ClickGuard`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Author of the entry.
    pub sender: Sender,
    /// Displayed text.
    pub text: String,
    /// Whether the entry doubles as a clickable trigger for a follow-up query.
    pub is_selectable: bool,
}

impl Message {
    /// Free-form text typed by the user.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
            is_selectable: false,
        }
    }

    /// Free-form reply from the service.
    #[must_use]
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Bot,
            text: text.into(),
            is_selectable: false,
        }
    }

    /// A clickable suggestion (server option or default query).
    #[must_use]
    pub fn suggestion(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            is_selectable: true,
        }
    }
}
