//! Wire protocol for the dialogue service.
//!
//! Both endpoints answer with `{ "status": bool, "result": ... }`. The
//! result is decoded only after the status is known, since failure
//! envelopes carry a partial (or no) result.

use chat_widget_core::{BotReply, Greeting, ReplyError, ReplyOption, StartError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Common response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub status: bool,
    #[serde(default)]
    pub result: Option<Value>,
}

/// `result` of a successful `/start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResult {
    pub reply: String,
    #[serde(default)]
    pub default_queries: Option<Vec<String>>,
}

/// `result` of a successful `/reply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResult {
    #[serde(default)]
    pub session_id: String,
    pub reply: String,
    #[serde(default)]
    pub options: Option<Vec<WireOption>>,
}

/// Option as sent by the service; the query is nested one level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOption {
    pub label: String,
    pub query: WireQuery,
}

/// Nested option query. Extra fields the service sends are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireQuery {
    pub query: String,
}

impl From<WireOption> for ReplyOption {
    fn from(option: WireOption) -> Self {
        Self::new(option.label, option.query.query)
    }
}

/// Decode a `/start` body.
///
/// # Errors
/// Returns `Malformed` for undecodable bodies and `Rejected` for `status: false`.
pub fn decode_start(body: &str) -> Result<Greeting, StartError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| StartError::Malformed(e.to_string()))?;
    if !envelope.status {
        return Err(StartError::Rejected);
    }

    let result = envelope
        .result
        .ok_or_else(|| StartError::Malformed("missing result".to_string()))?;
    let result: StartResult =
        serde_json::from_value(result).map_err(|e| StartError::Malformed(e.to_string()))?;

    Ok(Greeting {
        reply: result.reply,
        default_queries: result.default_queries.unwrap_or_default(),
    })
}

/// Decode a `/reply` body.
///
/// # Errors
/// Returns `Service` for `status: false` and `Transport` for undecodable bodies.
pub fn decode_reply(body: &str) -> Result<BotReply, ReplyError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|e| ReplyError::Transport(format!("malformed reply: {e}")))?;

    if !envelope.status {
        let message = envelope
            .result
            .as_ref()
            .and_then(|r| r.get("reply"))
            .and_then(Value::as_str)
            .map(ToOwned::to_owned);
        return Err(ReplyError::Service { message });
    }

    let result = envelope
        .result
        .ok_or_else(|| ReplyError::Transport("malformed reply: missing result".to_string()))?;
    let result: ReplyResult = serde_json::from_value(result)
        .map_err(|e| ReplyError::Transport(format!("malformed reply: {e}")))?;

    Ok(BotReply {
        session_token: result.session_id,
        reply: result.reply,
        options: result
            .options
            .unwrap_or_default()
            .into_iter()
            .map(ReplyOption::from)
            .collect(),
    })
}
