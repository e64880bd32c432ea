//! Request and Response message types.
//!
//! Defines the envelope for commands sent to the peer and the replies
//! correlated back to them.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// Request
// ============================================================================

/// A command request from the client to the peer.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.command",
///   "params": { ... },
///   "sessionId": "optional-flattened-session"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique among outstanding commands.
    pub id: CommandId,

    /// Command name in `Domain.command` format.
    pub method: String,

    /// Command parameters, an empty object when omitted.
    pub params: Value,

    /// Flattened target session the command is addressed to.
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Request {
    /// Creates a request addressed to the connected target itself.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Addresses the request to a flattened target session.
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// Normalizes caller-supplied params: absent or `null` becomes `{}`.
#[inline]
#[must_use]
pub fn params_or_empty(params: Option<Value>) -> Value {
    match params {
        Some(Value::Null) | None => Value::Object(Map::new()),
        Some(params) => params,
    }
}

// ============================================================================
// Response
// ============================================================================

/// A reply from the peer to a previously sent command.
///
/// # Format
///
/// Success (`result` may be omitted):
/// ```json
/// { "id": 1, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "error": { "code": -32000, "message": "...", "data": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: CommandId,

    /// Result payload (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error payload (if the peer rejected the command).
    #[serde(default)]
    pub error: Option<Value>,
}

impl Response {
    /// Returns `true` if the peer reported an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Resolves the reply against the request it answers.
    ///
    /// A reply carrying neither `result` nor `error` is a success with `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] carrying `request` and the `raw` reply if
    /// the peer reported an error.
    pub fn into_result(self, request: Request, raw: Value) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::protocol(error_message(&error), request, raw)),
            None => Ok(self
                .result
                .unwrap_or_else(|| Value::Object(Map::new()))),
        }
    }
}

/// Builds the displayed message for a remote error payload.
///
/// Uses `message`, followed by ` (<data>)` when the detail field is
/// non-empty.
#[must_use]
pub fn error_message(error: &Value) -> String {
    let message = match error.get("message") {
        Some(Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        },
    };

    match error.get("data") {
        Some(data) if has_detail(data) => match data {
            Value::String(data) => format!("{message} ({data})"),
            data => format!("{message} ({data})"),
        },
        _ => message,
    }
}

/// Empty strings, zero, `false` and `null` carry no detail.
fn has_detail(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Tests
// ============================================================================
