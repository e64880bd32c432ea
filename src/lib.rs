//! DevTools client - JSON debugging protocol sessions over WebSocket or pipes.
//!
//! This library attaches to a debuggable target of a browser-like process,
//! learns the protocol it speaks, and multiplexes request/response commands
//! and pushed events over one connection.
//!
//! # Architecture
//!
//! Startup is a one-shot sequence driven by the [`Session`]:
//!
//! - **Target resolution**: pick the target to attach to (skipped for
//!   embedded processes)
//! - **Protocol resolution**: explicit descriptor, bundled copy or the live
//!   `/json/protocol`
//! - **Transport**: WebSocket to the debugger URL, or delimited frames over
//!   the embedded process streams 3 and 4
//!
//! Once ready, one event loop task per session owns the transport:
//!
//! - Commands get strictly increasing ids starting at 1
//! - Replies complete exactly the command with their id
//! - Events fan out to listeners in registration order
//!
//! # Quick Start
//!
//! ```no_run
//! use devtools_client::{Result, Session};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = Session::builder().host("127.0.0.1").port(9222).connect().await?;
//!
//!     session.on("Page.loadEventFired", |_| println!("loaded"));
//!     session.send("Page.enable", None).await?;
//!     session
//!         .send("Page.navigate", json!({ "url": "https://example.com" }))
//!         .await?;
//!
//!     session.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Dispatch table built from the protocol descriptor |
//! | [`discovery`] | Target listing and protocol fetching over HTTP |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types and descriptor |
//! | [`session`] | Session lifecycle, configuration and target selection |
//! | [`signal`] | Caller-visible signals |
//! | [`transport`] | WebSocket and pipe transports, event loop |

// ============================================================================
// Modules
// ============================================================================

/// Dispatch table built from the protocol descriptor.
pub mod api;

/// Target and protocol discovery.
///
/// [`HttpDiscovery`] talks to the endpoint's `/json/*` routes.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire protocol message types.
///
/// Request/response/event envelopes and the protocol descriptor.
pub mod protocol;

/// Session lifecycle.
///
/// Use [`Session::builder()`] to create a configured session.
pub mod session;

/// Caller-visible signals and listener registry.
pub mod signal;

/// Transport layer.
///
/// WebSocket and pipe transports plus the per-session event loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// API types
pub use api::{Api, Domain};

// Discovery types
pub use discovery::{Discovery, DiscoveryOptions, HttpDiscovery, TargetInfo, VersionInfo};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CommandId, ListenerId};

// Protocol types
pub use protocol::{Event, ProtocolDescriptor, Request, Response};

// Session types
pub use session::{Selection, Session, SessionBuilder, SessionOptions, SessionState, TargetSelector};

// Signal types
pub use signal::Signal;

// Transport types
pub use transport::{EmbeddedProcess, ProcessStream, TransportKind};
