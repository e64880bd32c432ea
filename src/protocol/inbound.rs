//! Inbound frame classification.
//!
//! Decides whether a frame is a reply or an event before routing.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, from_str, from_value};

use crate::error::Result;

use super::{Event, Response};

// ============================================================================
// Inbound
// ============================================================================

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// Reply to a command, with the raw message kept for diagnostics.
    Reply {
        /// Parsed reply.
        response: Response,
        /// The message as received.
        raw: Value,
    },
    /// Unsolicited event.
    Event(Event),
}

impl Inbound {
    /// Parses and classifies one inbound frame.
    ///
    /// A message with a non-null `id` is a reply; otherwise a message with a
    /// string `method` is an event. Anything else yields `Ok(None)`, as does a reply
    /// whose `id` is not an unsigned integer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the frame is not JSON.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let value: Value = from_str(text)?;
        Ok(Self::classify(value))
    }

    /// Classifies an already parsed message.
    #[must_use]
    pub fn classify(value: Value) -> Option<Self> {
        let object = value.as_object()?;

        if object.get("id").is_some_and(|id| !id.is_null()) {
            let response = from_value::<Response>(value.clone()).ok()?;
            return Some(Self::Reply {
                response,
                raw: value,
            });
        }

        if object.get("method").is_some_and(Value::is_string) {
            return from_value::<Event>(value).ok().map(Self::Event);
        }

        None
    }
}

// ============================================================================
// Tests
// ============================================================================
