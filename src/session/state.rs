//! Session lifecycle states.
//!
//! ```text
//! Created ─► ResolvingTarget ─► ResolvingProtocol ─► Connecting ─► Ready ─► Closed
//!    │              │                   │                 │
//!    └──────────────┴───────────────────┴─────────────────┴──► Errored
//! ```
//!
//! `ResolvingTarget` is skipped for embedded processes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state of a [`Session`](crate::Session).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Constructed, startup not begun.
    #[default]
    Created,
    /// Selecting the target to attach to.
    ResolvingTarget,
    /// Obtaining the protocol descriptor.
    ResolvingProtocol,
    /// Opening the transport.
    Connecting,
    /// Commands and events flow.
    Ready,
    /// Closed by the caller or the peer.
    Closed,
    /// Startup failed.
    Errored,
}

impl SessionState {
    /// Returns `true` for states the session never leaves.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Returns `true` while startup is still running.
    #[inline]
    #[must_use]
    pub fn is_starting(self) -> bool {
        matches!(
            self,
            Self::ResolvingTarget | Self::ResolvingProtocol | Self::Connecting
        )
    }

    /// Returns the kebab-case state name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ResolvingTarget => "resolving-target",
            Self::ResolvingProtocol => "resolving-protocol",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
