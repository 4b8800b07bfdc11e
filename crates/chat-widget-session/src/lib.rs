//! Session controller and token storage for the chat widget.
//!
//! Provides:
//! - `SessionController` - Drives the conversation against a `DialogueClient`
//! - Token storage implementations (memory, file)

pub mod controller;
pub mod storage;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod proptests;

pub use controller::{Completion, PendingRequest, SessionController, StartupError, StartupStatus};
