//! WebSocket transport.
//!
//! Opens a client connection to the resolved debugger URL and splits it
//! into a [`TransportSink`] and a [`TransportSource`].

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::{Transport, TransportKind, TransportSink, TransportSource};

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// Connect
// ============================================================================

/// Connects to `url`, upgrading `ws:` to `wss:` when `secure` is set.
///
/// # Errors
///
/// Returns [`Error::Transport`] if the TCP connection or the WebSocket
/// handshake fails.
pub async fn connect(url: &str, secure: bool) -> Result<Transport> {
    let url = effective_url(url, secure);
    debug!(url = %url, "Opening WebSocket");

    let (stream, response) = connect_async(url.as_str())
        .await
        .map_err(|e| Error::transport(format!("WebSocket connect to {url} failed: {e}")))?;

    info!(url = %url, status = %response.status(), "WebSocket connection established");

    let (sink, source) = stream.split();
    Ok(Transport::new(
        TransportKind::WebSocket,
        Box::new(WebSocketSink {
            inner: sink,
            closed: false,
        }),
        Box::new(WebSocketSource { inner: source }),
    ))
}

/// Rewrites a `ws:` scheme to `wss:` for secure sessions.
#[must_use]
pub fn effective_url(url: &str, secure: bool) -> String {
    match url.get(..3) {
        Some(scheme) if secure && scheme.eq_ignore_ascii_case("ws:") => {
            format!("wss:{}", &url[3..])
        }
        _ => url.to_string(),
    }
}

// ============================================================================
// WebSocketSink
// ============================================================================

/// Write half of a WebSocket connection.
struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl TransportSink for WebSocketSink {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.inner.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// WebSocketSource
// ============================================================================

/// Read half of a WebSocket connection.
struct WebSocketSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl TransportSource for WebSocketSource {
    async fn recv(&mut self) -> Option<Result<String>> {
        while let Some(message) = self.inner.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),

                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!(len = bytes.len(), "Dropping non UTF-8 binary frame"),
                },

                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }

                // Ping, Pong and raw frames
                Ok(_) => {}

                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,

                Err(e) => return Some(Err(e.into())),
            }
        }

        debug!("WebSocket stream ended");
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
