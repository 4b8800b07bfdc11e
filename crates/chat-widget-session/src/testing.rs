//! Scripted dialogue client for tests.
//!
//! Enables controller testing without a network.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use chat_widget_core::{
    BotReply, DialogueClient, Greeting, ReplyError, ReplyOption, StartError,
};

/// A recorded `reply` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedReply {
    pub query: String,
    pub session_token: Option<String>,
}

/// Dialogue client that returns queued results and records every call.
#[derive(Default)]
pub struct ScriptedClient {
    starts: Mutex<VecDeque<Result<Greeting, StartError>>>,
    replies: Mutex<VecDeque<Result<BotReply, ReplyError>>>,
    start_calls: Mutex<usize>,
    requests: Mutex<Vec<RecordedReply>>,
}

impl ScriptedClient {
    /// Create a client with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful startup.
    #[must_use]
    pub fn with_greeting(self, reply: &str, default_queries: &[&str]) -> Self {
        self.queue_start(Ok(Greeting {
            reply: reply.to_string(),
            default_queries: default_queries.iter().map(ToString::to_string).collect(),
        }));
        self
    }

    /// Queue a startup result.
    pub fn queue_start(&self, result: Result<Greeting, StartError>) {
        lock(&self.starts).push_back(result);
    }

    /// Queue a successful reply.
    pub fn queue_reply(&self, session_token: &str, reply: &str, options: &[(&str, &str)]) {
        lock(&self.replies).push_back(Ok(BotReply {
            session_token: session_token.to_string(),
            reply: reply.to_string(),
            options: options
                .iter()
                .map(|(label, query)| ReplyOption::new(*label, *query))
                .collect(),
        }));
    }

    /// Queue a reply error.
    pub fn queue_error(&self, error: ReplyError) {
        lock(&self.replies).push_back(Err(error));
    }

    /// All recorded `reply` calls, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedReply> {
        lock(&self.requests).clone()
    }

    /// Number of `reply` calls made.
    #[must_use]
    pub fn reply_calls(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Number of `start` calls made.
    #[must_use]
    pub fn start_calls(&self) -> usize {
        *lock(&self.start_calls)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl DialogueClient for ScriptedClient {
    async fn start(&self) -> Result<Greeting, StartError> {
        *lock(&self.start_calls) += 1;
        lock(&self.starts)
            .pop_front()
            .unwrap_or_else(|| Err(StartError::Transport("No scripted start".to_string())))
    }

    async fn reply(
        &self,
        query: &str,
        session_token: Option<&str>,
    ) -> Result<BotReply, ReplyError> {
        lock(&self.requests).push(RecordedReply {
            query: query.to_string(),
            session_token: session_token.map(ToString::to_string),
        });
        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(ReplyError::Transport("No scripted reply".to_string())))
    }
}
