//! Broadcast + history of renderer side effects.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Number of events retained for late subscribers.
const HISTORY_LEN: usize = 256;

/// Side effect requested by the controller.
///
/// Rendering is external; these tell the renderer what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    /// Transcript contents changed.
    TranscriptChanged { len: usize },
    /// Transcript settled after an exchange; scroll to the newest entry.
    ScrollToBottom,
    /// Free-text input buffer was cleared.
    InputCleared,
    /// A session token was adopted from the service.
    SessionAdopted { token: String },
    /// Startup exchange failed.
    StartupFailed { reason: String },
    /// State was restored from history.
    Rewound { depth: usize },
}

/// Event bus with broadcast and bounded history.
///
/// Late subscribers replay the history, then follow live events.
pub struct EventBus {
    history: RwLock<VecDeque<WidgetEvent>>,
    sender: broadcast::Sender<WidgetEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new event bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1024);
        Self {
            history: RwLock::new(VecDeque::with_capacity(32)),
            sender,
        }
    }

    /// Publish an event to live listeners and history.
    pub fn push(&self, event: WidgetEvent) {
        let _ = self.sender.send(event.clone()); // no listeners is fine

        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        if history.len() >= HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(event);
    }

    /// Get a receiver for live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.sender.subscribe()
    }

    /// Get a copy of the retained history.
    #[must_use]
    pub fn history(&self) -> Vec<WidgetEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Stream that yields history first, then live events.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, WidgetEvent> {
        let (history, rx) = (self.history(), self.subscribe());

        let hist = futures::stream::iter(history);
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }
}
