//! TUI bridge for ratatui applications.
//!
//! Maps crossterm input to controller actions and carries completed
//! exchanges back to the event loop over a channel.

use chat_widget_core::{DialogueClient, TokenStore, Transcript, WidgetEvent};
use chat_widget_session::{Completion, PendingRequest, SessionController};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

/// User intent decoded from a terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    Type(char),
    Backspace,
    Submit,
    Back,
    SelectPrev,
    SelectNext,
    ClearSelection,
    Activate,
    ScrollUp,
    ScrollDown,
    Quit,
}

/// View state owned by the terminal front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiState {
    /// Transcript position of the highlighted suggestion.
    pub selected: Option<usize>,
    /// Lines scrolled up from the bottom.
    pub scroll: u16,
    /// Whether the view sticks to the newest message.
    pub follow: bool,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            selected: None,
            scroll: 0,
            follow: true,
        }
    }
}

impl TuiState {
    /// Whether a suggestion is highlighted.
    #[must_use]
    pub const fn is_selecting(&self) -> bool {
        self.selected.is_some()
    }

    /// Highlight the next selectable entry, wrapping around.
    pub fn select_next(&mut self, transcript: &Transcript) {
        let positions = transcript.selectable_positions();
        self.selected = match self.selected {
            Some(current) => positions
                .iter()
                .copied()
                .find(|&p| p > current)
                .or_else(|| positions.first().copied()),
            None => positions.last().copied(),
        };
    }

    /// Highlight the previous selectable entry, wrapping around.
    pub fn select_prev(&mut self, transcript: &Transcript) {
        let positions = transcript.selectable_positions();
        self.selected = match self.selected {
            Some(current) => positions
                .iter()
                .rev()
                .copied()
                .find(|&p| p < current)
                .or_else(|| positions.last().copied()),
            None => positions.last().copied(),
        };
    }

    pub const fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub const fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
        self.follow = false;
    }

    pub const fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow = self.scroll == 0;
    }

    /// React to a controller event.
    pub fn apply_event(&mut self, event: &WidgetEvent) {
        match event {
            WidgetEvent::ScrollToBottom => {
                self.scroll = 0;
                self.follow = true;
            }
            WidgetEvent::Rewound { .. } => self.selected = None,
            WidgetEvent::TranscriptChanged { len } => {
                if self.selected.is_some_and(|p| p >= *len) {
                    self.selected = None;
                }
            }
            WidgetEvent::InputCleared
            | WidgetEvent::SessionAdopted { .. }
            | WidgetEvent::StartupFailed { .. } => {}
        }
    }
}

/// Bridge between terminal events and a session controller.
pub struct TuiBridge {
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Default for TuiBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiBridge {
    /// Create a new bridge.
    #[must_use]
    pub fn new() -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            completion_tx,
            completion_rx,
        }
    }

    /// Decode a crossterm event.
    ///
    /// `selecting` switches Enter from submitting the input to activating
    /// the highlighted suggestion.
    #[must_use]
    pub fn action_for(event: &Event, selecting: bool) -> Option<UiAction> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Self::key_action(key, selecting),
            _ => None,
        }
    }

    fn key_action(key: &KeyEvent, selecting: bool) -> Option<UiAction> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        let action = match key.code {
            KeyCode::Char('c') if ctrl => UiAction::Quit,
            KeyCode::Char('b') if ctrl => UiAction::Back,
            KeyCode::Left if alt => UiAction::Back,
            KeyCode::Up if ctrl => UiAction::SelectPrev,
            KeyCode::Down if ctrl => UiAction::SelectNext,
            KeyCode::Char(c) if !ctrl && !alt => UiAction::Type(c),
            KeyCode::Backspace => UiAction::Backspace,
            KeyCode::Enter if selecting => UiAction::Activate,
            KeyCode::Enter => UiAction::Submit,
            KeyCode::Esc => UiAction::ClearSelection,
            KeyCode::Tab => UiAction::SelectNext,
            KeyCode::BackTab => UiAction::SelectPrev,
            KeyCode::PageUp => UiAction::ScrollUp,
            KeyCode::PageDown => UiAction::ScrollDown,
            _ => return None,
        };
        Some(action)
    }

    /// Apply an action.
    ///
    /// Exchanges run on spawned tasks; their completions arrive through
    /// [`Self::try_recv`] or [`Self::recv`]. Returns `false` on quit.
    pub fn handle<C, S>(
        &self,
        controller: &mut SessionController<C, S>,
        state: &mut TuiState,
        action: UiAction,
    ) -> bool
    where
        C: DialogueClient + 'static,
        S: TokenStore,
    {
        match action {
            UiAction::Quit => return false,
            UiAction::Type(c) => controller.push_input(c),
            UiAction::Backspace => {
                controller.pop_input();
            }
            UiAction::Submit => {
                let text = controller.input().to_string();
                if let Some(request) = controller.begin_query(&text, false) {
                    self.spawn(controller, &request);
                }
            }
            UiAction::Activate => {
                if let Some(position) = state.selected.take() {
                    if let Some(request) = controller.begin_activation(position) {
                        self.spawn(controller, &request);
                    }
                }
            }
            UiAction::Back => {
                if controller.go_back() {
                    state.clear_selection();
                }
            }
            UiAction::SelectNext => state.select_next(controller.transcript()),
            UiAction::SelectPrev => state.select_prev(controller.transcript()),
            UiAction::ClearSelection => state.clear_selection(),
            UiAction::ScrollUp => state.scroll_up(5),
            UiAction::ScrollDown => state.scroll_down(5),
        }
        true
    }

    fn spawn<C, S>(&self, controller: &SessionController<C, S>, request: &PendingRequest)
    where
        C: DialogueClient + 'static,
        S: TokenStore,
    {
        let exchange = controller.dispatch(request);
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            if tx.send(exchange.await).is_err() {
                tracing::debug!("Completion dropped after bridge closed");
            }
        });
    }

    /// Receive a completion (non-blocking).
    pub fn try_recv(&mut self) -> Option<Completion> {
        self.completion_rx.try_recv().ok()
    }

    /// Wait for the next completion.
    pub async fn recv(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }
}
