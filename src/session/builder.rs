//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`Session`] instances.
//!
//! # Example
//!
//! ```no_run
//! use devtools_client::Session;
//!
//! # async fn example() -> devtools_client::Result<()> {
//! let session = Session::builder()
//!     .host("127.0.0.1")
//!     .port(9222)
//!     .target("/devtools/browser")
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::discovery::{Discovery, HttpDiscovery};
use crate::error::Result;
use crate::protocol::ProtocolDescriptor;
use crate::transport::EmbeddedProcess;

use super::core::Session;
use super::options::SessionOptions;
use super::target::TargetSelector;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`Session`] instance.
///
/// Use [`Session::builder()`] to create a new builder.
#[derive(Default)]
pub struct SessionBuilder {
    /// Connection settings.
    options: SessionOptions,
    /// Embedded process to talk to instead of a WebSocket endpoint.
    process: Option<EmbeddedProcess>,
    /// Discovery override; HTTP discovery when unset.
    discovery: Option<Arc<dyn Discovery>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("options", &self.options)
            .field("process", &self.process)
            .field("discovery", &self.discovery.is_some())
            .finish()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all settings at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the endpoint host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Sets the endpoint port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Uses `wss`/`https` when set.
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.options.secure = secure;
        self
    }

    /// Sends the host name to discovery as-is instead of an address.
    #[inline]
    #[must_use]
    pub fn use_host_name(mut self, use_host_name: bool) -> Self {
        self.options.use_host_name = use_host_name;
        self
    }

    /// Sets the hook that rewrites the resolved endpoint path.
    ///
    /// Useful behind reverse proxies that remap `/devtools/...`.
    #[inline]
    #[must_use]
    pub fn alter_path<F>(mut self, alter_path: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.options.alter_path = Arc::new(alter_path);
        self
    }

    /// Uses `descriptor` instead of asking discovery.
    #[inline]
    #[must_use]
    pub fn protocol(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.options.protocol = Some(Arc::new(descriptor));
        self
    }

    /// Prefers discovery's bundled descriptor over the live one.
    #[inline]
    #[must_use]
    pub fn local(mut self, local: bool) -> Self {
        self.options.local = local;
        self
    }

    /// Sets the target selector.
    ///
    /// Strings are classified by [`TargetSelector::parse`].
    #[inline]
    #[must_use]
    pub fn target(mut self, target: impl Into<TargetSelector>) -> Self {
        self.options.target = target.into();
        self
    }

    /// Talks to an embedded process over its streams 3 and 4.
    ///
    /// Target resolution is skipped.
    #[inline]
    #[must_use]
    pub fn process(mut self, process: EmbeddedProcess) -> Self {
        self.process = Some(process);
        self
    }

    /// Replaces the HTTP discovery client.
    #[inline]
    #[must_use]
    pub fn discovery(mut self, discovery: Arc<dyn Discovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Builds the session with validation. Startup has not begun.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`](crate::Error::InvalidConfiguration)
    ///   for an empty host, port 0 or a malformed target selector
    /// - [`Error::Http`](crate::Error::Http) if the default discovery client
    ///   cannot be created
    pub fn build(self) -> Result<Session> {
        self.options.validate()?;

        let discovery = match self.discovery {
            Some(discovery) => discovery,
            None => Arc::new(HttpDiscovery::new()?),
        };

        Ok(Session::new(self.options, self.process, discovery))
    }

    /// Builds the session and launches startup in the background.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build); startup failures go to the `error`
    /// signal.
    pub fn start(self) -> Result<Session> {
        let session = self.build()?;
        session.start();
        Ok(session)
    }

    /// Builds the session and waits until it is ready.
    ///
    /// # Errors
    ///
    /// Configuration errors, or the startup error.
    pub async fn connect(self) -> Result<Session> {
        let session = self.build()?;
        session.connect().await?;
        Ok(session)
    }
}

// ============================================================================
// Tests
// ============================================================================
