//! Debugging session.
//!
//! A [`Session`] runs a one-shot startup sequence (target, protocol,
//! transport) and then multiplexes commands and events over one connection
//! until it is closed by the caller or by the peer.
//!
//! # Example
//!
//! ```no_run
//! use devtools_client::Session;
//! use serde_json::json;
//!
//! # async fn example() -> devtools_client::Result<()> {
//! let session = Session::builder().port(9222).connect().await?;
//!
//! session.on("Page.loadEventFired", |params| println!("loaded: {params}"));
//! session.send("Page.enable", None).await?;
//! session
//!     .send("Page.navigate", json!({ "url": "https://example.com" }))
//!     .await?;
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info};
use url::Url;

use crate::api::{Api, Domain};
use crate::discovery::{Discovery, DiscoveryOptions};
use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{Event, ProtocolDescriptor, params_or_empty, resolver};
use crate::signal::{Listener, Listeners, Signal};
use crate::transport::{Connection, EmbeddedProcess, websocket};

use super::builder::SessionBuilder;
use super::options::SessionOptions;
use super::state::SessionState;
use super::target;

// ============================================================================
// Types
// ============================================================================

/// Host and port, updated from the resolved endpoint URL.
#[derive(Debug, Clone)]
struct Endpoint {
    host: String,
    port: u16,
}

/// Internal shared state for the session.
pub(crate) struct SessionInner {
    /// Settings as built.
    options: SessionOptions,

    /// Target and protocol source.
    discovery: Arc<dyn Discovery>,

    /// Embedded process, taken by startup.
    process: Mutex<Option<EmbeddedProcess>>,

    /// Effective host and port.
    endpoint: Mutex<Endpoint>,

    /// Resolved debugger URL, set once.
    web_socket_url: OnceLock<String>,

    /// Resolved protocol descriptor, set once.
    protocol: OnceLock<Arc<ProtocolDescriptor>>,

    /// Dispatch table, set once before the transport opens.
    api: OnceLock<Arc<Api>>,

    /// Event loop handle, present from `Connecting` on.
    connection: Mutex<Option<Connection>>,

    /// Listener registry (shared with the event loop).
    listeners: Arc<Listeners>,

    /// Lifecycle state (shared with the event loop).
    state: Arc<watch::Sender<SessionState>>,

    /// Startup has been launched.
    started: AtomicBool,

    /// `close` has been called.
    closed_by_caller: AtomicBool,
}

// ============================================================================
// Session
// ============================================================================

/// A client session with one debugging target.
///
/// Cloning is cheap; all clones share the same connection.
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

// ============================================================================
// Session - Display
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("host", &self.host())
            .field("port", &self.port())
            .field("web_socket_url", &self.web_socket_url())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructors
// ============================================================================

impl Session {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Creates a session in the `Created` state.
    pub(crate) fn new(
        options: SessionOptions,
        process: Option<EmbeddedProcess>,
        discovery: Arc<dyn Discovery>,
    ) -> Self {
        let endpoint = Endpoint {
            host: options.host.clone(),
            port: options.port,
        };
        let (state, _) = watch::channel(SessionState::Created);

        Self {
            inner: Arc::new(SessionInner {
                options,
                discovery,
                process: Mutex::new(process),
                endpoint: Mutex::new(endpoint),
                web_socket_url: OnceLock::new(),
                protocol: OnceLock::new(),
                api: OnceLock::new(),
                connection: Mutex::new(None),
                listeners: Arc::new(Listeners::new()),
                state: Arc::new(state),
                started: AtomicBool::new(false),
                closed_by_caller: AtomicBool::new(false),
            }),
        }
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Launches startup on a background task.
    ///
    /// Failures are reported on the `error` signal. Calling it again is a
    /// no-op. Must be called inside a tokio runtime.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = self.clone();
        tokio::spawn(async move {
            // Reported through the error signal.
            let _ = session.run_startup().await;
        });
    }

    /// Runs startup and waits until the session is ready.
    ///
    /// If startup was already launched, waits for its outcome instead.
    ///
    /// # Errors
    ///
    /// The startup error (also emitted on the `error` signal), or
    /// [`Error::NotConnected`] / [`Error::ConnectionClosed`] when waiting on
    /// a startup launched elsewhere.
    pub async fn connect(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return self.connected().await;
        }
        self.run_startup().await
    }

    /// Waits until startup has finished.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if startup failed
    /// - [`Error::ConnectionClosed`] if the session was closed first
    pub async fn connected(&self) -> Result<()> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|state| *state == SessionState::Ready || state.is_terminal())
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        match state {
            SessionState::Ready => Ok(()),
            SessionState::Errored => Err(Error::not_connected(state)),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Closes the session.
    ///
    /// Pending commands fail with [`Error::ConnectionClosed`]. Does not fire
    /// `disconnect`. Closing an already closed session succeeds.
    pub async fn close(&self) -> Result<()> {
        self.inner.closed_by_caller.store(true, Ordering::SeqCst);

        let connection = self.inner.connection.lock().clone();
        if let Some(connection) = connection {
            connection.close().await;
        }

        self.inner.state.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = SessionState::Closed;
            true
        });

        debug!("Session closed");
        Ok(())
    }

    /// Closes the session in the background; `callback` runs once the
    /// transport has shut down.
    ///
    /// Must be called inside a tokio runtime.
    pub fn close_with_callback<F>(&self, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let session = self.clone();
        tokio::spawn(async move {
            let result = session.close().await;
            callback(result);
        });
    }

    /// Startup with error reporting.
    async fn run_startup(&self) -> Result<()> {
        let result = self.startup().await;

        if let Err(e) = &result {
            if self.inner.closed_by_caller.load(Ordering::SeqCst) {
                debug!(error = %e, "Startup abandoned after close");
            } else {
                error!(error = %e, state = %self.state(), "Session startup failed");
                self.inner.state.send_if_modified(|state| {
                    if *state == SessionState::Errored {
                        return false;
                    }
                    *state = SessionState::Errored;
                    true
                });
                self.inner.listeners.emit_error(e);
            }
        }

        result
    }

    async fn startup(&self) -> Result<()> {
        let inner = &self.inner;
        let process = inner.process.lock().take();

        if process.is_none() {
            self.advance(SessionState::ResolvingTarget)?;
            let url = target::resolve(
                &inner.options.target,
                inner.discovery.as_ref(),
                &self.discovery_options(),
            )
            .await?;
            self.record_endpoint(&url)?;
        }

        self.advance(SessionState::ResolvingProtocol)?;
        let protocol = resolver::resolve(
            inner.options.protocol.as_ref(),
            inner.options.local,
            inner.discovery.as_ref(),
            &self.discovery_options(),
        )
        .await?;
        let api = Arc::new(Api::from_descriptor(&protocol));
        let _ = inner.protocol.set(protocol);
        let _ = inner.api.set(api);

        self.advance(SessionState::Connecting)?;
        let transport = match process {
            Some(process) => process.into_transport()?,
            None => {
                let url = inner
                    .web_socket_url
                    .get()
                    .ok_or_else(|| Error::target_resolution("no debugger URL resolved"))?;
                websocket::connect(url, inner.options.secure).await?
            }
        };

        let connection = Connection::new(
            transport,
            Arc::clone(&inner.listeners),
            Arc::clone(&inner.state),
        );
        *inner.connection.lock() = Some(connection.clone());

        if let Err(e) = self.advance(SessionState::Ready) {
            connection.close().await;
            return Err(e);
        }

        info!(url = ?inner.web_socket_url.get(), "Session ready");

        // Own task: a panicking listener must not look like a startup failure.
        let session = self.clone();
        tokio::spawn(async move {
            session.inner.listeners.emit_connect(&session);
        });

        Ok(())
    }

    /// Moves to `next` unless the session already ended.
    fn advance(&self, next: SessionState) -> Result<()> {
        let mut previous = SessionState::Created;
        let advanced = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if state.is_terminal() {
                return false;
            }
            *state = next;
            true
        });

        if !advanced {
            return Err(Error::ConnectionClosed);
        }

        debug!(from = %previous, to = %next, "Session state changed");
        Ok(())
    }

    /// Applies `alter_path` and adopts the endpoint's host and port.
    fn record_endpoint(&self, url: &str) -> Result<()> {
        let mut parsed = Url::parse(url)
            .map_err(|e| Error::target_resolution(format!("invalid debugger URL {url}: {e}")))?;

        let altered = (self.inner.options.alter_path)(parsed.path());
        parsed.set_path(&altered);

        {
            let mut endpoint = self.inner.endpoint.lock();
            if let Some(host) = parsed.host_str() {
                endpoint.host = host.to_string();
            }
            if let Some(port) = parsed.port() {
                endpoint.port = port;
            }
        }

        let resolved = parsed.to_string();
        debug!(url = %resolved, "Resolved debugger URL");
        let _ = self.inner.web_socket_url.set(resolved);
        Ok(())
    }

    fn discovery_options(&self) -> DiscoveryOptions {
        let endpoint = self.inner.endpoint.lock().clone();
        DiscoveryOptions {
            host: endpoint.host,
            port: endpoint.port,
            ..self.inner.options.discovery_options()
        }
    }
}

// ============================================================================
// Session - Commands
// ============================================================================

impl Session {
    /// Sends a command and waits for its reply.
    ///
    /// `params` defaults to `{}`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] before the session is ready
    /// - [`Error::ConnectionClosed`] once it has ended
    /// - [`Error::Protocol`] if the peer rejected the command
    /// - Transport errors if the frame could not be written
    pub async fn send(&self, method: &str, params: impl Into<Option<Value>>) -> Result<Value> {
        let connection = self.connection()?;
        connection
            .send(method.to_string(), params_or_empty(params.into()), None)
            .await
    }

    /// Sends a command to a flattened target session.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_to(
        &self,
        session_id: &str,
        method: &str,
        params: impl Into<Option<Value>>,
    ) -> Result<Value> {
        let connection = self.connection()?;
        connection
            .send(
                method.to_string(),
                params_or_empty(params.into()),
                Some(session_id.to_string()),
            )
            .await
    }

    /// Sends a command and returns immediately; `callback` gets the outcome.
    ///
    /// The callback runs on the event loop task, or right away if the
    /// session cannot send.
    pub fn send_with_callback<F>(&self, method: &str, params: impl Into<Option<Value>>, callback: F)
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        match self.connection() {
            Ok(connection) => connection.dispatch(
                method.to_string(),
                params_or_empty(params.into()),
                None,
                Box::new(callback),
            ),
            Err(e) => callback(Err(e)),
        }
    }

    /// Returns the number of commands awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner
            .connection
            .lock()
            .as_ref()
            .map_or(0, Connection::pending_count)
    }

    /// Returns the domain handle if the descriptor declares `name`.
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<Domain> {
        let api = self.inner.api.get()?;
        api.has_domain(name)
            .then(|| Domain::new(name, Arc::clone(api), self.clone()))
    }

    fn connection(&self) -> Result<Connection> {
        let state = self.state();
        match state {
            SessionState::Ready => self
                .inner
                .connection
                .lock()
                .clone()
                .ok_or(Error::ConnectionClosed),
            state if state.is_terminal() => Err(Error::ConnectionClosed),
            state => Err(Error::not_connected(state)),
        }
    }
}

// ============================================================================
// Session - Listeners
// ============================================================================

impl Session {
    /// Fires once startup has finished, on its own task.
    pub fn on_connect<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Listener::Connect(Arc::new(handler)))
    }

    /// Fires for every inbound event with the whole envelope.
    pub fn on_event<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Listener::Event(Arc::new(handler)))
    }

    /// Fires for events named `method` (or `method.sessionId`) with their params.
    pub fn on<F>(&self, method: impl Into<String>, handler: F) -> ListenerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .add(Listener::Method(method.into(), Arc::new(handler)))
    }

    /// Fires whenever the last outstanding command is answered.
    pub fn on_ready<F>(&self, handler: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.listeners.add(Listener::Ready(Arc::new(handler)))
    }

    /// Fires when the peer closes the connection.
    pub fn on_disconnect<F>(&self, handler: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.listeners.add(Listener::Disconnect(Arc::new(handler)))
    }

    /// Fires on startup or transport failure.
    pub fn on_error<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.listeners.add(Listener::Error(Arc::new(handler)))
    }

    /// Removes a listener; returns `false` if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Returns the number of listeners attached to `signal`.
    #[must_use]
    pub fn listener_count(&self, signal: &Signal) -> usize {
        self.inner.listeners.count(signal)
    }

    /// Waits for the next event named `method` and returns its params.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session ends first.
    pub async fn wait_for_event(&self, method: impl Into<String>) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let id = self.on(method, move |params| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(params.clone());
            }
        });
        let _guard = ListenerGuard {
            listeners: Arc::clone(&self.inner.listeners),
            id,
        };

        let mut state = self.inner.state.subscribe();
        tokio::select! {
            params = rx => Ok(params?),
            _ = state.wait_for(|state| state.is_terminal()) => Err(Error::ConnectionClosed),
        }
    }
}

/// Removes a one-shot listener when its waiter goes away.
struct ListenerGuard {
    listeners: Arc<Listeners>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.listeners.remove(self.id);
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Returns the settings the session was built with.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the effective host.
    #[must_use]
    pub fn host(&self) -> String {
        self.inner.endpoint.lock().host.clone()
    }

    /// Returns the effective port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.endpoint.lock().port
    }

    /// Returns the resolved debugger URL (unset for embedded processes).
    #[inline]
    #[must_use]
    pub fn web_socket_url(&self) -> Option<&str> {
        self.inner.web_socket_url.get().map(String::as_str)
    }

    /// Returns the protocol descriptor once resolved.
    #[inline]
    #[must_use]
    pub fn protocol(&self) -> Option<Arc<ProtocolDescriptor>> {
        self.inner.protocol.get().cloned()
    }

    /// Returns the dispatch table once built.
    #[inline]
    #[must_use]
    pub fn api(&self) -> Option<Arc<Api>> {
        self.inner.api.get().cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
