//! HTTP dialogue client.

use async_trait::async_trait;
use chat_widget_core::{BotReply, DialogueClient, Greeting, ReplyError, StartError, WidgetConfig};
use reqwest::{Client, Response};

use crate::protocol::{decode_reply, decode_start};

/// HTTP client construction error.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Dialogue client speaking the `/start` + `/reply` JSON protocol.
pub struct HttpDialogueClient {
    client: Client,
    start_url: String,
    reply_url: String,
}

impl HttpDialogueClient {
    /// Create a client for the service configured in `config`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &WidgetConfig) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            start_url: config.start_url(),
            reply_url: config.reply_url(),
        })
    }

    async fn read_body(response: Response) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl DialogueClient for HttpDialogueClient {
    async fn start(&self) -> Result<Greeting, StartError> {
        tracing::debug!(url = %self.start_url, "Requesting start");
        let response = self
            .client
            .get(&self.start_url)
            .send()
            .await
            .map_err(|e| StartError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(response)
            .await
            .map_err(|e| StartError::Transport(e.to_string()))?;

        match decode_start(&body) {
            Err(StartError::Malformed(_)) if !status.is_success() => {
                Err(StartError::Transport(format!("HTTP {status}")))
            }
            other => other,
        }
    }

    async fn reply(
        &self,
        query: &str,
        session_token: Option<&str>,
    ) -> Result<BotReply, ReplyError> {
        tracing::debug!(url = %self.reply_url, "Requesting reply");
        let response = self
            .client
            .get(&self.reply_url)
            .query(&[("query", query), ("sessionId", session_token.unwrap_or_default())])
            .send()
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;

        let (status, body) = Self::read_body(response)
            .await
            .map_err(|e| ReplyError::Transport(e.to_string()))?;

        // Failure envelopes may arrive with an error status; only an
        // undecodable body on an error status is a transport problem.
        match decode_reply(&body) {
            Err(ReplyError::Transport(_)) if !status.is_success() => {
                Err(ReplyError::Transport(format!("HTTP {status}")))
            }
            other => other,
        }
    }
}
