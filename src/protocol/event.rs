//! Event message type.
//!
//! Events are unsolicited notifications pushed by the peer. They carry no
//! correlation id.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Event
// ============================================================================

/// An event notification from the peer.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... },
///   "sessionId": "optional-flattened-session"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,

    /// Flattened target session the event originates from.
    #[serde(
        rename = "sessionId",
        default,
        deserialize_with = "lenient_session_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
}

/// Numbers are kept as their text; other non-string ids are ignored.
fn lenient_session_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) if !id.is_empty() => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

impl Event {
    /// Creates an event without a session id.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Returns the domain name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Page.loadEventFired", json!({}));
    /// assert_eq!(event.domain(), "Page");
    /// ```
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the event name from the method.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let event = Event::new("Page.loadEventFired", json!({}));
    /// assert_eq!(event.event_name(), "loadEventFired");
    /// ```
    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split_once('.').map(|(_, name)| name).unwrap_or_default()
    }

    /// Returns `<method>.<sessionId>` for events from a flattened session.
    #[must_use]
    pub fn session_scoped_method(&self) -> Option<String> {
        self.session_id
            .as_ref()
            .map(|session_id| format!("{}.{}", self.method, session_id))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_parsing() {
        let json_str = r#"{
            "method": "Network.requestWillBeSent",
            "params": { "requestId": "1000.1" }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        assert_eq!(event.domain(), "Network");
        assert_eq!(event.event_name(), "requestWillBeSent");
        assert_eq!(event.params["requestId"], "1000.1");
        assert!(event.session_scoped_method().is_none());
    }

    #[test]
    fn test_event_without_params() {
        let event: Event =
            serde_json::from_str(r#"{ "method": "Inspector.detached" }"#).expect("parse");
        assert_eq!(event.params, Value::Null);
    }

    #[test]
    fn test_session_scoped_method() {
        let event: Event = serde_json::from_value(json!({
            "method": "Page.frameNavigated",
            "params": {},
            "sessionId": "S1"
        }))
        .expect("parse");

        assert_eq!(
            event.session_scoped_method().as_deref(),
            Some("Page.frameNavigated.S1")
        );
    }

    #[test]
    fn test_non_string_session_id_keeps_event() {
        let event: Event = serde_json::from_value(json!({
            "method": "Foo.baz",
            "params": { "z": 3 },
            "sessionId": { "nested": true }
        }))
        .expect("event");
        assert_eq!(event.params, json!({ "z": 3 }));
        assert_eq!(event.session_id, None);

        let event: Event =
            serde_json::from_value(json!({ "method": "Foo.baz", "sessionId": 7 })).expect("event");
        assert_eq!(event.session_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_event_name_without_domain() {
        let event = Event::new("orphan", json!({}));
        assert_eq!(event.domain(), "orphan");
        assert_eq!(event.event_name(), "");
    }
}
