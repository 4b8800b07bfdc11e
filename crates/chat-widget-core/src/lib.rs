//! Core data model for the conversational chat widget.
//!
//! This crate provides the building blocks the session controller owns:
//! - `Transcript` - Ordered, append-mostly list of `Message`s
//! - `OptionRegistry` - Label to query mapping for server-provided options
//! - `ClickGuard` - Click-once bookkeeping for selectable messages
//! - `HistoryStack` - Value snapshots for back-navigation
//! - `SessionToken` - Set-once session identifier
//! - `EventBus` - Broadcast + history of renderer side effects
//! - `DialogueClient` and `TokenStore` traits for the external collaborators

pub mod config;
pub mod events;
pub mod guard;
pub mod history;
pub mod message;
pub mod options;
pub mod token;
pub mod traits;
pub mod transcript;

pub use config::{ConfigError, InFlightPolicy, WidgetConfig};
pub use events::{EventBus, WidgetEvent};
pub use guard::{ActivationKey, ClickGuard};
pub use history::{CheckpointId, HistoryStack, Snapshot};
pub use message::{Message, Sender};
pub use options::{Binding, OptionRegistry, ReplyOption};
pub use token::SessionToken;
pub use traits::{
    BotReply, DialogueClient, Greeting, ReplyError, StartError, StorageError, TokenStore,
};
pub use transcript::Transcript;
