//! HTTP discovery client.
//!
//! Talks to the endpoint's `/json/*` routes:
//!
//! | Route | Method | Used by |
//! |-------|--------|---------|
//! | `/json/list` | GET | [`Discovery::list_targets`] |
//! | `/json/protocol` | GET | [`Discovery::fetch_protocol`] |
//! | `/json/version` | GET | [`HttpDiscovery::version`] |
//! | `/json/new?<url>` | PUT | [`HttpDiscovery::new_target`] |
//! | `/json/activate/<id>` | GET | [`HttpDiscovery::activate`] |
//! | `/json/close/<id>` | GET | [`HttpDiscovery::close_target`] |
//!
//! Unless `use_host_name` is set, the host is resolved to an address first:
//! debugging endpoints refuse requests whose `Host` header is not an IP or
//! `localhost`.

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use tokio::net::lookup_host;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::ProtocolDescriptor;

use super::{Discovery, DiscoveryOptions, TargetInfo, VersionInfo};

// ============================================================================
// Constants
// ============================================================================

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// HttpDiscovery
// ============================================================================

/// [`Discovery`] over the endpoint's HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    client: Client,
    local_protocol: Option<Arc<ProtocolDescriptor>>,
}

impl HttpDiscovery {
    /// Creates a client without a bundled protocol.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            local_protocol: None,
        })
    }

    /// Sets the descriptor returned when a local copy is preferred.
    #[must_use]
    pub fn with_local_protocol(mut self, descriptor: ProtocolDescriptor) -> Self {
        self.local_protocol = Some(Arc::new(descriptor));
        self
    }

    /// Loads the bundled descriptor from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an IO or [`Error::ProtocolResolution`] error if the file is
    /// unreadable or not a descriptor.
    pub fn local_protocol_from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let descriptor = ProtocolDescriptor::from_file(path)?;
        Ok(self.with_local_protocol(descriptor))
    }

    /// Fetches `/json/version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] on a non-success status, or an HTTP
    /// error if the endpoint is unreachable.
    pub async fn version(&self, options: &DiscoveryOptions) -> Result<VersionInfo> {
        self.get_json(options, "/json/version").await
    }

    /// Opens a new target, optionally navigated to `url`.
    ///
    /// # Errors
    ///
    /// Same as [`version`](Self::version).
    pub async fn new_target(&self, options: &DiscoveryOptions, url: Option<&str>) -> Result<TargetInfo> {
        let path = match url {
            Some(url) => format!("/json/new?{}", urlencoding::encode(url)),
            None => "/json/new".to_string(),
        };
        let response = self.request(options, Method::PUT, &path).await?;
        Ok(response.json().await?)
    }

    /// Brings a target to the foreground.
    ///
    /// # Errors
    ///
    /// Same as [`version`](Self::version).
    pub async fn activate(&self, options: &DiscoveryOptions, id: &str) -> Result<()> {
        let path = format!("/json/activate/{}", urlencoding::encode(id));
        self.request(options, Method::GET, &path).await?;
        Ok(())
    }

    /// Closes a target.
    ///
    /// # Errors
    ///
    /// Same as [`version`](Self::version).
    pub async fn close_target(&self, options: &DiscoveryOptions, id: &str) -> Result<()> {
        let path = format!("/json/close/{}", urlencoding::encode(id));
        self.request(options, Method::GET, &path).await?;
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, options: &DiscoveryOptions, path: &str) -> Result<T> {
        let response = self.request(options, Method::GET, path).await?;
        Ok(response.json().await?)
    }

    async fn request(&self, options: &DiscoveryOptions, method: Method, path: &str) -> Result<Response> {
        let url = format!("{}{path}", base_url(options).await?);
        trace!(%method, url = %url, "Discovery request");

        let response = self.client.request(method, &url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::discovery(url, format!("unexpected status {status}: {body}")));
        }

        Ok(response)
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn list_targets(&self, options: &DiscoveryOptions) -> Result<Vec<TargetInfo>> {
        let targets: Vec<TargetInfo> = self.get_json(options, "/json/list").await?;
        debug!(count = targets.len(), "Listed targets");
        Ok(targets)
    }

    async fn fetch_protocol(
        &self,
        options: &DiscoveryOptions,
        prefer_local: bool,
    ) -> Result<ProtocolDescriptor> {
        if prefer_local {
            return self
                .local_protocol
                .as_deref()
                .cloned()
                .ok_or_else(|| Error::protocol_resolution("no local protocol descriptor configured"));
        }

        let value = self.get_json(options, "/json/protocol").await?;
        ProtocolDescriptor::from_value(value)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Builds `scheme://host:port`, resolving the host unless told otherwise.
async fn base_url(options: &DiscoveryOptions) -> Result<String> {
    let host = if options.use_host_name {
        options.host.clone()
    } else {
        resolve_host(&options.host, options.port).await?
    };

    Ok(format!("{}://{}:{}", options.scheme(), bracket_ipv6(&host), options.port))
}

/// Resolves `host` to the first address it maps to.
async fn resolve_host(host: &str, port: u16) -> Result<String> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(address) = bare.parse::<IpAddr>() {
        return Ok(address.to_string());
    }

    let mut addresses = lookup_host((bare, port)).await?;
    addresses
        .next()
        .map(|address| address.ip().to_string())
        .ok_or_else(|| Error::discovery(host, "host name did not resolve to any address"))
}

fn bracket_ipv6(host: &str) -> String {
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(address)) => format!("[{address}]"),
        _ => host.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
