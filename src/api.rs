//! Dispatch table built from the protocol descriptor.
//!
//! [`Api`] maps every `Domain.command` and `Domain.event` name the peer
//! declares. [`Domain`] is the caller-facing handle for one domain: it checks
//! names against the table and delegates to the session.
//!
//! # Example
//!
//! ```ignore
//! let page = session.domain("Page").ok_or("no Page domain")?;
//! page.on("loadEventFired", |params| println!("loaded: {params}"));
//! page.send("navigate", json!({ "url": "https://example.com" })).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::ProtocolDescriptor;
use crate::session::Session;

// ============================================================================
// Api
// ============================================================================

/// Command and event names of one domain.
#[derive(Debug, Clone, Default)]
struct DomainTable {
    commands: FxHashSet<String>,
    events: FxHashSet<String>,
}

/// Name table built once from a [`ProtocolDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct Api {
    domains: FxHashMap<String, DomainTable>,
}

impl Api {
    /// Indexes every domain, command and event of `descriptor`.
    #[must_use]
    pub fn from_descriptor(descriptor: &ProtocolDescriptor) -> Self {
        let domains = descriptor
            .domains
            .iter()
            .map(|domain| {
                let table = DomainTable {
                    commands: domain.commands.iter().map(|c| c.name.clone()).collect(),
                    events: domain.events.iter().map(|e| e.name.clone()).collect(),
                };
                (domain.domain.clone(), table)
            })
            .collect();

        Self { domains }
    }

    /// Returns `true` if the descriptor declares `domain`.
    #[inline]
    #[must_use]
    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains.contains_key(domain)
    }

    /// Returns `true` if `method` (`Domain.command`) is a declared command.
    #[must_use]
    pub fn has_command(&self, method: &str) -> bool {
        split_method(method).is_some_and(|(domain, name)| {
            self.domains
                .get(domain)
                .is_some_and(|table| table.commands.contains(name))
        })
    }

    /// Returns `true` if `method` (`Domain.event`) is a declared event.
    #[must_use]
    pub fn has_event(&self, method: &str) -> bool {
        split_method(method).is_some_and(|(domain, name)| {
            self.domains
                .get(domain)
                .is_some_and(|table| table.events.contains(name))
        })
    }

    /// Returns all domain names, sorted.
    #[must_use]
    pub fn domain_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.domains.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of declared commands across all domains.
    #[must_use]
    pub fn command_count(&self) -> usize {
        self.domains.values().map(|table| table.commands.len()).sum()
    }
}

fn split_method(method: &str) -> Option<(&str, &str)> {
    method.split_once('.')
}

// ============================================================================
// Domain
// ============================================================================

/// Handle to one protocol domain of a session.
#[derive(Clone)]
pub struct Domain {
    name: String,
    api: Arc<Api>,
    session: Session,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Domain {
    pub(crate) fn new(name: impl Into<String>, api: Arc<Api>, session: Session) -> Self {
        Self {
            name: name.into(),
            api,
            session,
        }
    }

    /// Returns the domain name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends `<domain>.<command>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] if the descriptor does not declare
    /// the command; otherwise whatever [`Session::send`] returns.
    pub async fn send(&self, command: &str, params: impl Into<Option<Value>>) -> Result<Value> {
        let method = format!("{}.{command}", self.name);
        if !self.api.has_command(&method) {
            return Err(Error::unknown_command(method));
        }
        self.session.send(&method, params).await
    }

    /// Listens to `<domain>.<event>`, receiving its params.
    ///
    /// Undeclared event names are accepted; the peer may emit experimental
    /// events the descriptor leaves out.
    pub fn on<F>(&self, event: &str, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.session.on(format!("{}.{event}", self.name), handler)
    }
}

// ============================================================================
// Tests
// ============================================================================
