//! Error types for the devtools client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use devtools_client::{Error, Result, Session};
//!
//! async fn example(session: &Session) -> Result<()> {
//!     match session.send("Page.navigate", json!({ "url": "about:blank" })).await {
//!         Ok(result) => println!("{result}"),
//!         Err(Error::Protocol { message, .. }) => println!("peer rejected: {message}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::InvalidConfiguration`] |
//! | Startup | [`Error::TargetResolution`], [`Error::ProtocolResolution`], [`Error::Discovery`] |
//! | Transport | [`Error::Transport`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::UnknownCommand`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::protocol::Request;
use crate::session::SessionState;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Session configuration is malformed.
    ///
    /// Returned by [`SessionBuilder::build`](crate::SessionBuilder::build).
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Startup Errors
    // ========================================================================
    /// No usable target could be selected.
    #[error("Target resolution failed: {message}")]
    TargetResolution {
        /// Why no target was usable.
        message: String,
    },

    /// The protocol descriptor could not be obtained.
    #[error("Protocol resolution failed: {message}")]
    ProtocolResolution {
        /// Why the descriptor was unavailable.
        message: String,
    },

    /// The HTTP discovery endpoint answered with an unexpected status.
    #[error("Discovery request to {url} failed: {message}")]
    Discovery {
        /// Requested endpoint.
        url: String,
        /// Status or body description.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Connect, send or receive failure at the transport layer.
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The connection is gone; the session is terminal.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The session has not reached the ready state yet.
    #[error("Session is not connected (state: {state})")]
    NotConnected {
        /// Lifecycle state at the time of the call.
        state: SessionState,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// The remote peer answered a command with an `error` field.
    ///
    /// Displays only `message`, which is the remote message followed by the
    /// remote `data` detail in parentheses when present.
    #[error("{message}")]
    Protocol {
        /// Displayed message.
        message: String,
        /// The request that was rejected.
        request: Box<Request>,
        /// The full remote reply.
        response: Value,
    },

    /// Command name not listed by the protocol descriptor.
    #[error("Unknown command: {command}")]
    UnknownCommand {
        /// The unrecognized `Domain.command` name.
        command: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid configuration error.
    #[inline]
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Creates a target resolution error.
    #[inline]
    pub fn target_resolution(message: impl Into<String>) -> Self {
        Self::TargetResolution {
            message: message.into(),
        }
    }

    /// Creates a protocol resolution error.
    #[inline]
    pub fn protocol_resolution(message: impl Into<String>) -> Self {
        Self::ProtocolResolution {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a not connected error.
    #[inline]
    pub fn not_connected(state: SessionState) -> Self {
        Self::NotConnected { state }
    }

    /// Creates a protocol error from a rejected request and the remote reply.
    #[inline]
    pub fn protocol(message: impl Into<String>, request: Request, response: Value) -> Self {
        Self::Protocol {
            message: message.into(),
            request: Box::new(request),
            response,
        }
    }

    /// Creates an unknown command error.
    #[inline]
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if the message never reached the peer or the link died.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::ConnectionClosed
                | Self::NotConnected { .. }
                | Self::WebSocket(_)
                | Self::Io(_)
        )
    }

    /// Returns `true` if the peer rejected a command.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this error can only come out of the startup sequence.
    #[inline]
    #[must_use]
    pub fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::TargetResolution { .. }
                | Self::ProtocolResolution { .. }
                | Self::Discovery { .. }
                | Self::Http(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
