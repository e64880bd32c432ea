//! Target and protocol discovery.
//!
//! A debugging endpoint lists its live targets and serves the protocol
//! descriptor over plain HTTP. The session only needs two operations from
//! it, captured by the [`Discovery`] trait; [`HttpDiscovery`] is the
//! production implementation.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `http` | `/json/*` endpoint client |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::ProtocolDescriptor;

// ============================================================================
// Submodules
// ============================================================================

/// HTTP discovery client.
pub mod http;

// ============================================================================
// Re-exports
// ============================================================================

pub use http::HttpDiscovery;

// ============================================================================
// Constants
// ============================================================================

/// Target type of a user-facing page.
pub const PAGE_TARGET_TYPE: &str = "page";

// ============================================================================
// DiscoveryOptions
// ============================================================================

/// Where the debugging endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Endpoint host name or address.
    pub host: String,
    /// Endpoint port.
    pub port: u16,
    /// Use `https` instead of `http`.
    pub secure: bool,
    /// Send the host name as-is instead of resolving it to an address first.
    pub use_host_name: bool,
}

impl DiscoveryOptions {
    /// Returns `http` or `https`.
    #[inline]
    #[must_use]
    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }
}

// ============================================================================
// TargetInfo
// ============================================================================

/// One entry of the endpoint's target list.
///
/// Only `id`, `type` and `webSocketDebuggerUrl` drive resolution; the rest
/// is informational.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    /// Target id.
    pub id: String,

    /// Target type (`page`, `background_page`, `service_worker`, ...).
    #[serde(rename = "type", default)]
    pub target_type: String,

    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Document URL.
    #[serde(default)]
    pub url: String,

    /// Debugger endpoint; absent while another client is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_socket_debugger_url: Option<String>,

    /// Frontend URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub devtools_frontend_url: Option<String>,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
}

impl TargetInfo {
    /// Returns `true` for user-facing page targets.
    #[inline]
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == PAGE_TARGET_TYPE
    }

    /// Returns the debugger endpoint if one is advertised.
    #[inline]
    #[must_use]
    pub fn debugger_url(&self) -> Option<&str> {
        self.web_socket_debugger_url
            .as_deref()
            .filter(|url| !url.is_empty())
    }
}

// ============================================================================
// VersionInfo
// ============================================================================

/// `/json/version` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionInfo {
    /// Browser product and version.
    #[serde(rename = "Browser", default)]
    pub browser: String,

    /// Protocol version.
    #[serde(rename = "Protocol-Version", default)]
    pub protocol_version: String,

    /// User agent string.
    #[serde(rename = "User-Agent", default)]
    pub user_agent: String,

    /// JavaScript engine version.
    #[serde(rename = "V8-Version", default)]
    pub v8_version: Option<String>,

    /// Browser-level debugger endpoint.
    #[serde(rename = "webSocketDebuggerUrl", default)]
    pub web_socket_debugger_url: Option<String>,
}

// ============================================================================
// Discovery
// ============================================================================

/// Source of live targets and protocol descriptors.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Lists the endpoint's live targets.
    async fn list_targets(&self, options: &DiscoveryOptions) -> Result<Vec<TargetInfo>>;

    /// Returns the protocol descriptor.
    ///
    /// With `prefer_local` a bundled copy is returned instead of asking the
    /// endpoint.
    async fn fetch_protocol(
        &self,
        options: &DiscoveryOptions,
        prefer_local: bool,
    ) -> Result<ProtocolDescriptor>;
}

// ============================================================================
// Tests
// ============================================================================
