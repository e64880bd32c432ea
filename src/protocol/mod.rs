//! Wire protocol message types.
//!
//! Every frame on the wire is one JSON object in one of three shapes.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Shape |
//! |--------------|-----------|-------|
//! | [`Request`] | Client → Peer | `{id, method, params}` |
//! | [`Response`] | Peer → Client | `{id, result?}` or `{id, error}` |
//! | [`Event`] | Peer → Client | `{method, params}` |
//!
//! # Method Naming
//!
//! Commands and events follow `Domain.name` format:
//!
//! - `Page.navigate`
//! - `Runtime.evaluate`
//! - `Network.requestWillBeSent`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `descriptor` | Protocol schema served by the peer |
//! | `event` | Event type |
//! | `inbound` | Reply/event classification |
//! | `request` | Request and Response types |
//! | `resolver` | Protocol descriptor resolution |

// ============================================================================
// Submodules
// ============================================================================

/// Protocol schema types.
pub mod descriptor;

/// Event message type.
pub mod event;

/// Inbound frame classification.
pub mod inbound;

/// Request and Response message types.
pub mod request;

/// Protocol descriptor resolution.
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use descriptor::{DomainDescriptor, MemberDescriptor, ProtocolDescriptor, ProtocolVersion};
pub use event::Event;
pub use inbound::Inbound;
pub use request::{Request, Response, error_message, params_or_empty};
