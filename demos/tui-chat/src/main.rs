//! Terminal chat client built on the chat widget crates.
//!
//! Run with: cargo run -p tui-chat
//!
//! Reads `config.toml` from the user config directory, then
//! `CHAT_WIDGET_BASE_URL` and `CHAT_WIDGET_RESUME`. Logs go to
//! `tui-chat.log` in the temp directory (filter with `RUST_LOG`).

use std::{fs::File, io, sync::Arc, time::Duration};

use anyhow::Context;
use chat_widget_core::{Sender, WidgetConfig};
use chat_widget_session::{SessionController, StartupStatus, storage::FileTokenStore};
use chat_widget_transport::{HttpDialogueClient, TuiBridge, TuiState};
use crossterm::{
    event,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::EnvFilter;

type Controller = SessionController<HttpDialogueClient, FileTokenStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = match WidgetConfig::default_path() {
        Some(path) => WidgetConfig::load(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => WidgetConfig::default(),
    }
    .with_env_overrides();

    let client = HttpDialogueClient::new(&config)?;
    let store = FileTokenStore::in_data_dir()?;
    let mut controller = SessionController::new(Arc::new(client), store, config);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut controller).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn init_logging() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join("tui-chat.log");
    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &mut Controller,
) -> anyhow::Result<()> {
    let mut bridge = TuiBridge::new();
    let mut state = TuiState::default();
    let mut events = controller.events().subscribe();

    terminal.draw(|f| ui(f, controller, &state))?;
    if let Err(e) = controller.start().await {
        tracing::error!("Conversation unavailable: {e}");
    }

    loop {
        while let Some(completion) = bridge.try_recv() {
            controller.complete(completion);
        }

        loop {
            match events.try_recv() {
                Ok(event) => state.apply_event(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Renderer lagged behind controller events");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        terminal.draw(|f| ui(f, controller, &state))?;

        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            if let Some(action) = TuiBridge::action_for(&event, state.is_selecting()) {
                if !bridge.handle(controller, &mut state, action) {
                    return Ok(());
                }
            }
        }
    }
}

/// First row to show so the bottom of the wrapped conversation sits at the
/// bottom of a `width` x `height` area, `scroll` rows up from there.
fn scroll_top(conversation: &Paragraph<'_>, width: u16, height: u16, scroll: u16) -> u16 {
    let rows = u16::try_from(conversation.line_count(width)).unwrap_or(u16::MAX);
    rows.saturating_sub(height).saturating_sub(scroll)
}

fn ui(f: &mut Frame, controller: &Controller, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Conversation
            Constraint::Length(3), // Input
            Constraint::Length(1), // Status
        ])
        .split(f.area());

    let lines: Vec<Line> = controller
        .transcript()
        .iter()
        .enumerate()
        .map(|(position, message)| {
            let prefix = match message.sender {
                Sender::User => "you> ",
                Sender::Bot => "bot> ",
            };
            let style = if !message.is_selectable {
                Style::default()
            } else if controller.is_activated(position) {
                Style::default().fg(Color::DarkGray)
            } else if state.selected == Some(position) {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::UNDERLINED)
            };
            Line::from(vec![Span::raw(prefix), Span::styled(message.text.as_str(), style)])
        })
        .collect();

    let conversation = Paragraph::new(lines).wrap(Wrap { trim: false });
    let top = scroll_top(
        &conversation,
        chunks[0].width.saturating_sub(2),
        chunks[0].height.saturating_sub(2),
        state.scroll,
    );
    let conversation = conversation
        .block(Block::default().borders(Borders::ALL).title("Conversation"))
        .scroll((top, 0));
    f.render_widget(conversation, chunks[0]);

    let input = Paragraph::new(controller.input())
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL).title("Message"));
    f.render_widget(input, chunks[1]);

    let cursor = u16::try_from(controller.input().chars().count()).unwrap_or(u16::MAX);
    f.set_cursor_position((chunks[1].x.saturating_add(cursor).saturating_add(1), chunks[1].y + 1));

    let (status, status_style) = match controller.startup_status() {
        StartupStatus::NotStarted => ("Connecting...".to_string(), Style::default().fg(Color::Yellow)),
        StartupStatus::Ready if controller.in_flight() > 0 => {
            ("Waiting for reply...".to_string(), Style::default().fg(Color::Yellow))
        }
        StartupStatus::Ready => ("Connected".to_string(), Style::default().fg(Color::Green)),
        StartupStatus::Failed(reason) => (format!("Failed: {reason}"), Style::default().fg(Color::Red)),
    };
    let back_style = if controller.can_go_back() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let status = Paragraph::new(Line::from(vec![
        Span::raw(" "),
        Span::styled(status, status_style),
        Span::raw(" | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" select | "),
        Span::styled("Ctrl+B", back_style),
        Span::raw(" back | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" scroll | "),
        Span::styled("Ctrl+C", Style::default().fg(Color::Yellow)),
        Span::raw(" quit "),
    ]));
    f.render_widget(status, chunks[2]);
}
