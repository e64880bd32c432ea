//! Protocol descriptor resolution.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::discovery::{Discovery, DiscoveryOptions};
use crate::error::Result;

use super::ProtocolDescriptor;

// ============================================================================
// Resolve
// ============================================================================

/// Returns the explicit descriptor unchanged, or asks `discovery` for one.
///
/// # Errors
///
/// Discovery failures propagate unchanged.
pub async fn resolve(
    explicit: Option<&Arc<ProtocolDescriptor>>,
    prefer_local: bool,
    discovery: &dyn Discovery,
    options: &DiscoveryOptions,
) -> Result<Arc<ProtocolDescriptor>> {
    if let Some(descriptor) = explicit {
        debug!(domains = descriptor.domains.len(), "Using explicit protocol descriptor");
        return Ok(Arc::clone(descriptor));
    }

    let descriptor = discovery.fetch_protocol(options, prefer_local).await?;
    debug!(domains = descriptor.domains.len(), local = prefer_local, "Fetched protocol descriptor");
    Ok(Arc::new(descriptor))
}

// ============================================================================
// Tests
// ============================================================================
