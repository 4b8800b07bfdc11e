//! Transport layer for the chat widget.
//!
//! Provides:
//! - Wire protocol for the `/start` and `/reply` endpoints
//! - HTTP dialogue client (feature: http)
//! - Terminal bridge (feature: tui)

pub mod protocol;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "tui")]
pub mod tui;

pub use protocol::{Envelope, ReplyResult, StartResult, WireOption, WireQuery};

#[cfg(feature = "http")]
pub use http::{HttpClientError, HttpDialogueClient};

#[cfg(feature = "tui")]
pub use tui::{TuiBridge, TuiState, UiAction};
