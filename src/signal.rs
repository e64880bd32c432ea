//! Caller-visible signals and their listener registry.
//!
//! | Signal | Payload | Fired when |
//! |--------|---------|------------|
//! | `connect` | [`Session`] | Startup finished, on a separate task |
//! | `event` | [`Event`] | Any inbound event (whole envelope) |
//! | `<Domain.event>` | params | Inbound event with that method |
//! | `<Domain.event>.<sessionId>` | params | Same, from a flattened session |
//! | `ready` | none | No command is outstanding any more |
//! | `disconnect` | none | The peer closed the connection |
//! | `error` | [`Error`] | Startup or transport failure |
//!
//! Emission takes a snapshot of the registry before calling anything, so a
//! listener may add or remove listeners while it runs. Listeners of one
//! signal are called in registration order. A panicking listener is logged
//! and skipped; it never takes the event loop down.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{error, trace};

use crate::error::Error;
use crate::identifiers::ListenerId;
use crate::protocol::Event;
use crate::session::Session;

// ============================================================================
// Types
// ============================================================================

/// Callback receiving the connected session.
pub type ConnectHandler = Arc<dyn Fn(&Session) + Send + Sync>;

/// Callback receiving a whole event envelope.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Callback receiving the params of one event method.
pub type ParamsHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Callback without payload (`ready`, `disconnect`).
pub type NotifyHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving a startup or transport error.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

// ============================================================================
// Signal
// ============================================================================

/// Signal a listener is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Session is ready.
    Connect,
    /// Any inbound event.
    Event,
    /// Inbound events with this exact method (or `method.sessionId`) name.
    Method(String),
    /// No commands outstanding.
    Ready,
    /// Peer closed the connection.
    Disconnect,
    /// Unrecoverable startup or transport failure.
    Error,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connect"),
            Self::Event => f.write_str("event"),
            Self::Method(method) => f.write_str(method),
            Self::Ready => f.write_str("ready"),
            Self::Disconnect => f.write_str("disconnect"),
            Self::Error => f.write_str("error"),
        }
    }
}

// ============================================================================
// Listener
// ============================================================================

/// A registered callback together with the signal it listens to.
#[derive(Clone)]
pub(crate) enum Listener {
    Connect(ConnectHandler),
    Event(EventHandler),
    Method(String, ParamsHandler),
    Ready(NotifyHandler),
    Disconnect(NotifyHandler),
    Error(ErrorHandler),
}

impl Listener {
    /// Returns the signal this listener is attached to.
    fn signal(&self) -> Signal {
        match self {
            Self::Connect(_) => Signal::Connect,
            Self::Event(_) => Signal::Event,
            Self::Method(method, _) => Signal::Method(method.clone()),
            Self::Ready(_) => Signal::Ready,
            Self::Disconnect(_) => Signal::Disconnect,
            Self::Error(_) => Signal::Error,
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Ordered listener registry shared by a session and its event loop.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener.
    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        trace!(%id, signal = %listener.signal(), "Listener added");
        self.entries.lock().push((id, listener));
        id
    }

    /// Removes a listener; returns `false` if it was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    /// Returns the number of listeners attached to `signal`.
    pub fn count(&self, signal: &Signal) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(_, listener)| listener.signal() == *signal)
            .count()
    }

    /// Copies the current listeners so none is called under the lock.
    fn snapshot(&self) -> Vec<Listener> {
        self.entries
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }

    /// Fires `connect`.
    pub fn emit_connect(&self, session: &Session) {
        for listener in self.snapshot() {
            if let Listener::Connect(handler) = listener {
                guarded("connect", || handler(session));
            }
        }
    }

    /// Fires `event`, then `<method>`, then `<method>.<sessionId>`.
    pub fn emit_event(&self, event: &Event) {
        let listeners = self.snapshot();

        for listener in &listeners {
            if let Listener::Event(handler) = listener {
                guarded("event", || handler(event));
            }
        }

        Self::emit_params(&listeners, &event.method, &event.params);

        if let Some(scoped) = event.session_scoped_method() {
            Self::emit_params(&listeners, &scoped, &event.params);
        }
    }

    /// Fires `ready`.
    pub fn emit_ready(&self) {
        for listener in self.snapshot() {
            if let Listener::Ready(handler) = listener {
                guarded("ready", || handler());
            }
        }
    }

    /// Fires `disconnect`.
    pub fn emit_disconnect(&self) {
        for listener in self.snapshot() {
            if let Listener::Disconnect(handler) = listener {
                guarded("disconnect", || handler());
            }
        }
    }

    /// Fires `error`.
    pub fn emit_error(&self, error: &Error) {
        for listener in self.snapshot() {
            if let Listener::Error(handler) = listener {
                guarded("error", || handler(error));
            }
        }
    }

    fn emit_params(listeners: &[Listener], method: &str, params: &Value) {
        for listener in listeners {
            if let Listener::Method(name, handler) = listener
                && name == method
            {
                guarded(method, || handler(params));
            }
        }
    }
}

/// Runs a caller callback, logging instead of unwinding past it.
pub(crate) fn guarded(signal: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(signal, "Listener panicked");
    }
}

// ============================================================================
// Tests
// ============================================================================
