//! Session lifecycle and configuration.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] fluent configuration |
//! | `core` | [`Session`] startup, commands, listeners |
//! | `options` | [`SessionOptions`] and defaults |
//! | `state` | [`SessionState`] lifecycle states |
//! | `target` | [`TargetSelector`] and target resolution |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session core.
pub mod core;

/// Session configuration.
pub mod options;

/// Lifecycle states.
pub mod state;

/// Target selection.
pub mod target;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::Session;
pub use options::{AlterPath, DEFAULT_HOST, DEFAULT_PORT, SessionOptions};
pub use state::SessionState;
pub use target::{SelectFn, Selection, TargetSelector};
