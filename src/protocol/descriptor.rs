//! Protocol descriptor.
//!
//! The schema of domains, commands, events and types a peer speaks, as
//! served by `/json/protocol`. The client reads domain and member names to
//! build its dispatch table and otherwise keeps the document as received.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// ProtocolDescriptor
// ============================================================================

/// Immutable description of the message vocabulary of a peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    /// Protocol version, when advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<ProtocolVersion>,

    /// All domains in declaration order.
    #[serde(default)]
    pub domains: Vec<DomainDescriptor>,
}

/// Major/minor protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: String,
    /// Minor version.
    pub minor: String,
}

/// One protocol domain such as `Page` or `Network`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    /// Domain name.
    pub domain: String,

    /// Commands accepted by the domain.
    #[serde(default)]
    pub commands: Vec<MemberDescriptor>,

    /// Events emitted by the domain.
    #[serde(default)]
    pub events: Vec<MemberDescriptor>,

    /// Type declarations, kept verbatim.
    #[serde(default)]
    pub types: Vec<Value>,

    /// Remaining fields (`description`, `experimental`, `dependencies`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A command or event declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    /// Member name, without the domain prefix.
    pub name: String,

    /// Remaining fields (`parameters`, `returns`, `description`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProtocolDescriptor {
    /// Parses a descriptor from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolResolution`] if the document is not a
    /// protocol descriptor.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::protocol_resolution(format!("malformed protocol descriptor: {e}")))
    }

    /// Loads a descriptor from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or
    /// [`Error::ProtocolResolution`] if it is not a descriptor.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&text)?;
        Self::from_value(value)
    }

    /// Looks up a domain by name.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&DomainDescriptor> {
        self.domains.iter().find(|domain| domain.domain == name)
    }
}

// ============================================================================
// Tests
// ============================================================================
