//! Session configuration.
//!
//! # Example
//!
//! ```ignore
//! use devtools_client::{SessionOptions, TargetSelector};
//!
//! let options = SessionOptions::new()
//!     .with_port(9333)
//!     .with_target(TargetSelector::parse("/devtools/browser"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::discovery::DiscoveryOptions;
use crate::error::{Error, Result};
use crate::protocol::ProtocolDescriptor;

use super::target::TargetSelector;

// ============================================================================
// Constants
// ============================================================================

/// Default debugging endpoint host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default debugging endpoint port.
pub const DEFAULT_PORT: u16 = 9222;

// ============================================================================
// Types
// ============================================================================

/// Rewrites the path of the resolved endpoint URL.
pub type AlterPath = Arc<dyn Fn(&str) -> String + Send + Sync>;

// ============================================================================
// SessionOptions
// ============================================================================

/// Connection settings of a session.
#[derive(Clone)]
pub struct SessionOptions {
    /// Endpoint host.
    pub host: String,

    /// Endpoint port.
    pub port: u16,

    /// Use `wss`/`https`.
    pub secure: bool,

    /// Send the host name as-is to discovery instead of an address.
    pub use_host_name: bool,

    /// Rewrites the endpoint path after target resolution.
    pub alter_path: AlterPath,

    /// Descriptor to use instead of asking discovery.
    pub protocol: Option<Arc<ProtocolDescriptor>>,

    /// Ask discovery for its bundled descriptor instead of the live one.
    pub local: bool,

    /// Target to attach to.
    pub target: TargetSelector,
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("use_host_name", &self.use_host_name)
            .field("protocol", &self.protocol.is_some())
            .field("local", &self.local)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            secure: false,
            use_host_name: false,
            alter_path: Arc::new(|path: &str| path.to_string()),
            protocol: None,
            local: false,
            target: TargetSelector::Default,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionOptions {
    /// Sets the endpoint host.
    #[inline]
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the endpoint port.
    #[inline]
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enables `wss`/`https`.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Sets the target selector.
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: TargetSelector) -> Self {
        self.target = target;
        self
    }
}

// ============================================================================
// Derived Settings
// ============================================================================

impl SessionOptions {
    /// Returns the settings discovery needs.
    #[must_use]
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            host: self.host.clone(),
            port: self.port,
            secure: self.secure,
            use_host_name: self.use_host_name,
        }
    }

    /// Checks the settings before startup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for an empty host, port 0 or
    /// a malformed target selector.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::invalid_configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::invalid_configuration("port must not be 0"));
        }
        self.target.validate()
    }
}

// ============================================================================
// Tests
// ============================================================================
