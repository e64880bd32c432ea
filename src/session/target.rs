//! Target selection.
//!
//! Turns a [`TargetSelector`] into the debugger endpoint URL to connect to.
//!
//! | Selector | Discovery call | Endpoint |
//! |----------|----------------|----------|
//! | `Path("/devtools/page/A")` | no | `ws://host:port/devtools/page/A` |
//! | `Url("ws://...")` | no | verbatim |
//! | `Id("A")` | yes | URL of the target with exactly that id |
//! | `Descriptor(info)` | no | `info.webSocketDebuggerUrl` |
//! | `Select(f)` | yes | URL of the target `f` picks |
//! | `Default` | yes | first page with a URL, else first target with a URL |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use crate::discovery::{Discovery, DiscoveryOptions, TargetInfo};
use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Caller-supplied target picker.
pub type SelectFn = Arc<dyn Fn(&[TargetInfo]) -> Selection + Send + Sync>;

/// What a [`TargetSelector::Select`] function returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Index into the list the function was given.
    Index(usize),
    /// A target descriptor.
    Target(TargetInfo),
}

impl From<usize> for Selection {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<TargetInfo> for Selection {
    fn from(target: TargetInfo) -> Self {
        Self::Target(target)
    }
}

// ============================================================================
// TargetSelector
// ============================================================================

/// Which target a session attaches to.
#[derive(Clone, Default)]
pub enum TargetSelector {
    /// Prefer the first page target.
    #[default]
    Default,
    /// Target with this exact id.
    Id(String),
    /// Debugger endpoint URL, used verbatim.
    Url(String),
    /// Path on the configured host and port.
    Path(String),
    /// A descriptor obtained earlier.
    Descriptor(TargetInfo),
    /// Picks a target from the live list.
    Select(SelectFn),
}

impl fmt::Debug for TargetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Descriptor(info) => f.debug_tuple("Descriptor").field(&info.id).finish(),
            Self::Select(_) => f.write_str("Select(<fn>)"),
        }
    }
}

impl TargetSelector {
    /// Classifies a selector string.
    ///
    /// A leading `/` is a path, a `ws:`/`wss:` scheme is a URL, anything
    /// else is a target id.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with('/') {
            Self::Path(value.to_string())
        } else if has_ws_scheme(value) {
            Self::Url(value.to_string())
        } else {
            Self::Id(value.to_string())
        }
    }

    /// Wraps a picker function.
    pub fn select<F, S>(f: F) -> Self
    where
        F: Fn(&[TargetInfo]) -> S + Send + Sync + 'static,
        S: Into<Selection>,
    {
        Self::Select(Arc::new(move |targets: &[TargetInfo]| -> Selection { f(targets).into() }))
    }

    /// Checks string selectors for emptiness and URL scheme.
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Id(value) | Self::Path(value) if value.is_empty() => {
                Err(Error::invalid_configuration("target selector must not be empty"))
            }
            Self::Url(url) if !has_ws_scheme(url) => Err(Error::invalid_configuration(format!(
                "target URL must use ws:// or wss://, got {url}"
            ))),
            _ => Ok(()),
        }
    }
}

impl FromStr for TargetSelector {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let selector = Self::parse(value);
        selector.validate()?;
        Ok(selector)
    }
}

impl From<&str> for TargetSelector {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for TargetSelector {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<TargetInfo> for TargetSelector {
    fn from(info: TargetInfo) -> Self {
        Self::Descriptor(info)
    }
}

fn has_ws_scheme(value: &str) -> bool {
    let lower = value.get(..6).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("ws://") || lower.starts_with("wss://")
}

// ============================================================================
// Resolve
// ============================================================================

/// Resolves `selector` to a debugger endpoint URL.
///
/// # Errors
///
/// Returns [`Error::TargetResolution`] if no usable target is found;
/// discovery errors propagate unchanged.
pub async fn resolve(
    selector: &TargetSelector,
    discovery: &dyn Discovery,
    options: &DiscoveryOptions,
) -> Result<String> {
    match selector {
        TargetSelector::Path(path) => {
            let host = &options.host;
            if host.contains(':') && !host.starts_with('[') {
                Ok(format!("ws://[{host}]:{}{path}", options.port))
            } else {
                Ok(format!("ws://{host}:{}{path}", options.port))
            }
        }

        TargetSelector::Url(url) => Ok(url.clone()),

        TargetSelector::Descriptor(info) => endpoint_of(info),

        TargetSelector::Id(id) => {
            let targets = discovery.list_targets(options).await?;
            let target = targets
                .iter()
                .find(|target| target.id == *id)
                .ok_or_else(|| Error::target_resolution(format!("no target with id {id}")))?;
            endpoint_of(target)
        }

        TargetSelector::Select(select) => {
            let targets = discovery.list_targets(options).await?;
            match select(&targets) {
                Selection::Index(index) => {
                    let target = targets.get(index).ok_or_else(|| {
                        Error::target_resolution(format!(
                            "selected index {index} out of range ({} targets)",
                            targets.len()
                        ))
                    })?;
                    endpoint_of(target)
                }
                Selection::Target(target) => endpoint_of(&target),
            }
        }

        TargetSelector::Default => {
            let targets = discovery.list_targets(options).await?;
            let target = pick_default(&targets)
                .ok_or_else(|| Error::target_resolution("no inspectable targets"))?;
            debug!(id = %target.id, kind = %target.target_type, "Selected default target");
            endpoint_of(target)
        }
    }
}

/// First page with an endpoint, else the first target with one.
#[must_use]
pub fn pick_default(targets: &[TargetInfo]) -> Option<&TargetInfo> {
    targets
        .iter()
        .find(|target| target.is_page() && target.debugger_url().is_some())
        .or_else(|| targets.iter().find(|target| target.debugger_url().is_some()))
}

fn endpoint_of(target: &TargetInfo) -> Result<String> {
    target.debugger_url().map(str::to_string).ok_or_else(|| {
        Error::target_resolution(format!("target {} has no debugger URL", target.id))
    })
}

// ============================================================================
// Tests
// ============================================================================
