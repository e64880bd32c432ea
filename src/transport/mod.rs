//! Transport layer.
//!
//! A transport carries raw JSON text frames between the client and the peer.
//! Two implementations share one surface and are chosen once per session:
//!
//! ```text
//! ┌──────────────┐      WebSocket (ws:// or wss://)      ┌──────────────┐
//! │   Session    │◄─────────────────────────────────────►│   Browser    │
//! │              │                                       │   target     │
//! │  Connection  │      pipes 3 / 4 (delimited JSON)     │              │
//! │  event loop  │◄─────────────────────────────────────►│  (embedded)  │
//! └──────────────┘                                       └──────────────┘
//! ```
//!
//! Each transport is split into a [`TransportSink`] (send, close) and a
//! [`TransportSource`] (receive) so the event loop can wait on inbound
//! frames while it writes outbound ones.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Event loop, command correlation, message routing |
//! | `pipe` | Delimited frames over a pair of byte streams |
//! | `process` | Embedded process stream table |
//! | `websocket` | WebSocket client transport |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// Event loop with command correlation and message routing.
pub mod connection;

/// Duplex stream transport.
pub mod pipe;

/// Embedded process stream table.
pub mod process;

/// WebSocket client transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Completion, Connection};
pub use process::{EmbeddedProcess, ProcessStream};

// ============================================================================
// Traits
// ============================================================================

/// Outbound half of a transport.
#[async_trait]
pub trait TransportSink: Send {
    /// Transmits one frame. An error means the frame never left the client.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Closes the outbound half. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Inbound half of a transport.
///
/// `recv` must be cancel-safe: it is raced against outbound commands.
#[async_trait]
pub trait TransportSource: Send {
    /// Waits for the next frame; `None` once the peer has closed.
    async fn recv(&mut self) -> Option<Result<String>>;
}

// ============================================================================
// Transport
// ============================================================================

/// Which implementation backs a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Persistent WebSocket connection.
    WebSocket,
    /// Pair of local byte streams.
    Pipe,
}

/// A connected transport, ready to be handed to a [`Connection`].
pub struct Transport {
    kind: TransportKind,
    sink: Box<dyn TransportSink>,
    source: Box<dyn TransportSource>,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Assembles a transport from its halves.
    #[must_use]
    pub fn new(
        kind: TransportKind,
        sink: Box<dyn TransportSink>,
        source: Box<dyn TransportSource>,
    ) -> Self {
        Self { kind, sink, source }
    }

    /// Returns the implementation kind.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Splits the transport into its halves.
    #[must_use]
    pub fn into_parts(self) -> (Box<dyn TransportSink>, Box<dyn TransportSource>) {
        (self.sink, self.source)
    }
}
