//! Connection event loop.
//!
//! This module owns a connected [`Transport`] on a dedicated tokio task and
//! multiplexes it between outbound commands and inbound replies/events.
//!
//! # Event Loop
//!
//! The spawned task handles:
//!
//! - Outbound commands: allocates the correlation id, serializes the
//!   envelope and writes it; the completion is registered only once the
//!   frame was written
//! - Inbound replies: removes the pending entry, then completes it; fires
//!   `ready` when nothing is left outstanding
//! - Inbound events: fans out to `event`, `<method>` and
//!   `<method>.<sessionId>` listeners
//! - Shutdown: a caller close ends the loop silently, a peer close fires
//!   `disconnect`; either way pending commands fail with
//!   [`Error::ConnectionClosed`]

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, to_string};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CommandId;
use crate::protocol::{Inbound, Request};
use crate::session::SessionState;
use crate::signal::{Listeners, guarded};

use super::{Transport, TransportSink, TransportSource};

// ============================================================================
// Types
// ============================================================================

/// Completion callback for one command.
///
/// Receives the reply `result` on success, the transmission error if the
/// frame never left the client, or [`Error::Protocol`] if the peer rejected
/// the command.
pub type Completion = Box<dyn FnOnce(Result<Value>) + Send>;

/// A command written to the transport and not yet replied to.
struct PendingCommand {
    request: Request,
    completion: Completion,
}

/// Map of correlation ids to pending commands.
type CorrelationMap = FxHashMap<CommandId, PendingCommand>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a command and register its completion.
    Send {
        method: String,
        params: Value,
        session_id: Option<String>,
        completion: Completion,
    },
    /// Close the transport and stop the loop.
    Close { ack: oneshot::Sender<()> },
}

/// Why the event loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Caller asked for it (close or every handle dropped).
    Caller,
    /// Peer closed the connection or the transport failed.
    Peer,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to a session's event loop.
///
/// Cloning the handle shares the same loop; the loop closes the transport
/// once every handle is dropped.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
}

impl Connection {
    /// Spawns the event loop over `transport`.
    pub(crate) fn new(
        transport: Transport,
        listeners: Arc<Listeners>,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));

        let (sink, source) = transport.into_parts();
        tokio::spawn(Self::run_event_loop(
            sink,
            source,
            command_rx,
            Arc::clone(&correlation),
            listeners,
            state,
        ));

        Self {
            command_tx,
            correlation,
        }
    }

    /// Queues a command; `completion` runs exactly once.
    ///
    /// Returns immediately. If the loop is already gone the completion runs
    /// right away with [`Error::ConnectionClosed`].
    pub fn dispatch(
        &self,
        method: String,
        params: Value,
        session_id: Option<String>,
        completion: Completion,
    ) {
        let command = ConnectionCommand::Send {
            method,
            params,
            session_id,
            completion,
        };

        if let Err(mpsc::error::SendError(command)) = self.command_tx.send(command)
            && let ConnectionCommand::Send { completion, .. } = command
        {
            completion(Err(Error::ConnectionClosed));
        }
    }

    /// Sends a command and waits for its reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the peer rejected the command
    /// - [`Error::ConnectionClosed`] if the connection ended first
    /// - Transport errors if the frame could not be written
    pub async fn send(
        &self,
        method: String,
        params: Value,
        session_id: Option<String>,
    ) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            method,
            params,
            session_id,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );

        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Returns the number of commands awaiting a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Closes the transport without firing `disconnect`.
    ///
    /// Returns immediately if the loop has already stopped.
    pub async fn close(&self) {
        let (ack, done) = oneshot::channel();
        if self.command_tx.send(ConnectionCommand::Close { ack }).is_err() {
            trace!("Close requested on stopped connection");
            return;
        }
        // A dropped ack means the loop stopped for another reason first.
        let _ = done.await;
    }

    /// Event loop that handles transport I/O.
    async fn run_event_loop(
        mut sink: Box<dyn TransportSink>,
        mut source: Box<dyn TransportSource>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        listeners: Arc<Listeners>,
        state: Arc<watch::Sender<SessionState>>,
    ) {
        let mut next_id = CommandId::FIRST;
        let mut close_ack = None;

        let exit = loop {
            tokio::select! {
                // Inbound frames from the peer
                frame = source.recv() => {
                    match frame {
                        Some(Ok(text)) => {
                            Self::handle_incoming_message(&text, &correlation, &listeners);
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Transport receive failed");
                            listeners.emit_error(&e);
                            break Exit::Peer;
                        }

                        None => {
                            debug!("Peer closed the connection");
                            break Exit::Peer;
                        }
                    }
                }

                // Commands from the session
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { method, params, session_id, completion }) => {
                            let request = Request::new(next_id.advance(), method, params)
                                .with_session(session_id);
                            Self::handle_send_command(request, completion, &mut sink, &correlation)
                                .await;
                        }

                        Some(ConnectionCommand::Close { ack }) => {
                            debug!("Close command received");
                            close_ack = Some(ack);
                            break Exit::Caller;
                        }

                        None => {
                            debug!("All connection handles dropped");
                            break Exit::Caller;
                        }
                    }
                }
            }
        };

        if let Err(e) = sink.close().await {
            debug!(error = %e, "Transport close failed");
        }
        command_rx.close();

        Self::fail_pending_requests(&correlation);

        state.send_modify(|current| {
            if *current != SessionState::Errored {
                *current = SessionState::Closed;
            }
        });

        if exit == Exit::Peer {
            listeners.emit_disconnect();
        }

        if let Some(ack) = close_ack {
            let _ = ack.send(());
        }

        debug!(?exit, "Event loop terminated");
    }

    /// Routes one inbound frame.
    fn handle_incoming_message(
        text: &str,
        correlation: &Mutex<CorrelationMap>,
        listeners: &Listeners,
    ) {
        let inbound = match Inbound::parse(text) {
            Ok(Some(inbound)) => inbound,
            Ok(None) => {
                trace!(text = %text, "Ignoring message without id or method");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Dropping unparseable message");
                return;
            }
        };

        match inbound {
            Inbound::Reply { response, raw } => {
                let id = response.id;

                // Removed before the completion runs.
                let (pending, drained) = {
                    let mut map = correlation.lock();
                    let pending = map.remove(&id);
                    (pending, map.is_empty())
                };

                let Some(PendingCommand {
                    request,
                    completion,
                }) = pending
                else {
                    warn!(%id, "Reply for unknown command");
                    return;
                };

                trace!(%id, method = %request.method, error = response.is_error(), "Reply received");
                let result = response.into_result(request, raw);
                guarded("completion", || completion(result));

                if drained {
                    listeners.emit_ready();
                }
            }

            Inbound::Event(event) => {
                trace!(method = %event.method, "Event received");
                listeners.emit_event(&event);
            }
        }
    }

    /// Writes one request and registers its completion on success.
    async fn handle_send_command(
        request: Request,
        completion: Completion,
        sink: &mut Box<dyn TransportSink>,
        correlation: &Mutex<CorrelationMap>,
    ) {
        let id = request.id;

        let json = match to_string(&request) {
            Ok(json) => json,
            Err(e) => {
                guarded("completion", || completion(Err(Error::Json(e))));
                return;
            }
        };

        if let Err(e) = sink.send(json).await {
            warn!(%id, method = %request.method, error = %e, "Command transmission failed");
            guarded("completion", || completion(Err(e)));
            return;
        }

        trace!(%id, method = %request.method, "Command sent");
        correlation.lock().insert(
            id,
            PendingCommand {
                request,
                completion,
            },
        );
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Mutex<CorrelationMap>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, command) in pending {
            guarded("completion", || (command.completion)(Err(Error::ConnectionClosed)));
        }

        if count > 0 {
            debug!(count, "Failed pending commands on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
