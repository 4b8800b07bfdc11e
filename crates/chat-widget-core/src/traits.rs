//! Core traits for the remote dialogue service and token persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ReplyOption;

/// Startup payload: welcome text plus default queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Greeting {
    /// Welcome reply.
    pub reply: String,
    /// Suggested first queries; label and query are identical.
    pub default_queries: Vec<String>,
}

/// Successful reply to a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotReply {
    /// Session token issued (or echoed) by the service.
    pub session_token: String,
    /// Reply text.
    pub reply: String,
    /// Follow-up options.
    pub options: Vec<ReplyOption>,
}

/// Startup exchange error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed start payload: {0}")]
    Malformed(String),
    #[error("Service rejected start")]
    Rejected,
}

/// Reply exchange error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyError {
    /// The service answered but reported an unsuccessful status.
    #[error("Service failure: {}", message.as_deref().unwrap_or("no message"))]
    Service { message: Option<String> },
    /// The request never reached the service or its answer was unusable.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Trait for the remote dialogue service.
///
/// Both calls are single-shot and never retried by the caller.
#[async_trait]
pub trait DialogueClient: Send + Sync {
    /// Parameterless startup exchange.
    async fn start(&self) -> Result<Greeting, StartError>;

    /// Send a query, carrying the session token if one is held.
    async fn reply(
        &self,
        query: &str,
        session_token: Option<&str>,
    ) -> Result<BotReply, ReplyError>;
}

/// Token storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt token store: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for session token persistence backends.
pub trait TokenStore: Send + Sync {
    /// Read the token stored under `key`.
    ///
    /// # Errors
    /// Returns error if the backend cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `token` under `key`.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn save(&self, key: &str, token: &str) -> Result<(), StorageError>;

    /// Remove the token stored under `key`.
    ///
    /// # Errors
    /// Returns error if the backend cannot be written.
    fn clear(&self, key: &str) -> Result<(), StorageError>;
}
