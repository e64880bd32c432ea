//! Shared fixtures: in-process peers and an in-memory discovery.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use devtools_client::{
    Discovery, DiscoveryOptions, EmbeddedProcess, Error, ProtocolDescriptor, Result, SessionBuilder,
    TargetInfo,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, duplex};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Tracing
// ============================================================================

static TRACING: Once = Once::new();

/// Installs a test subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Protocol
// ============================================================================

/// Small descriptor with a `Foo` and a `Page` domain.
pub fn descriptor() -> ProtocolDescriptor {
    ProtocolDescriptor::from_value(json!({
        "version": { "major": "1", "minor": "3" },
        "domains": [
            {
                "domain": "Foo",
                "commands": [{ "name": "bar" }, { "name": "slow" }],
                "events": [{ "name": "baz" }]
            },
            {
                "domain": "Page",
                "commands": [{ "name": "navigate" }],
                "events": [{ "name": "loadEventFired" }]
            }
        ]
    }))
    .expect("descriptor")
}

// ============================================================================
// PipePeer
// ============================================================================

/// The browser side of an embedded process pipe pair.
pub struct PipePeer {
    lines: Lines<BufReader<DuplexStream>>,
    out: DuplexStream,
}

impl PipePeer {
    /// Reads the next command sent by the client.
    pub async fn recv(&mut self) -> Value {
        let line = self
            .lines
            .next_line()
            .await
            .expect("read")
            .expect("client closed the pipe");
        serde_json::from_str(&line).expect("client sent JSON")
    }

    /// Writes one message to the client.
    pub async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    /// Writes one raw frame to the client.
    pub async fn send_raw(&mut self, frame: &str) {
        self.out.write_all(frame.as_bytes()).await.expect("write");
        self.out.write_all(b"\n").await.expect("write");
        self.out.flush().await.expect("flush");
    }

    /// Returns `true` once the client has closed its outbound stream.
    pub async fn client_closed(&mut self) -> bool {
        matches!(self.lines.next_line().await, Ok(None) | Err(_))
    }
}

/// Builder wired to an in-process pipe peer with an explicit protocol.
pub fn pipe_builder() -> (SessionBuilder, PipePeer) {
    init_tracing();

    let (client_out, peer_in) = duplex(64 * 1024);
    let (peer_out, client_in) = duplex(64 * 1024);

    let builder = SessionBuilder::new()
        .process(EmbeddedProcess::from_pipes(client_out, client_in))
        .protocol(descriptor())
        .discovery(Arc::new(StaticDiscovery::new(Vec::new())));

    let peer = PipePeer {
        lines: BufReader::new(peer_in).lines(),
        out: peer_out,
    };

    (builder, peer)
}

// ============================================================================
// StaticDiscovery
// ============================================================================

/// In-memory discovery with a fixed target list.
pub struct StaticDiscovery {
    targets: Vec<TargetInfo>,
    pub list_calls: AtomicUsize,
    pub protocol_calls: AtomicUsize,
    pub last_options: parking_lot::Mutex<Option<DiscoveryOptions>>,
}

impl StaticDiscovery {
    pub fn new(targets: Vec<TargetInfo>) -> Self {
        Self {
            targets,
            list_calls: AtomicUsize::new(0),
            protocol_calls: AtomicUsize::new(0),
            last_options: parking_lot::Mutex::new(None),
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for StaticDiscovery {
    async fn list_targets(&self, options: &DiscoveryOptions) -> Result<Vec<TargetInfo>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());
        Ok(self.targets.clone())
    }

    async fn fetch_protocol(
        &self,
        options: &DiscoveryOptions,
        prefer_local: bool,
    ) -> Result<ProtocolDescriptor> {
        self.protocol_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());
        if prefer_local {
            return Err(Error::protocol_resolution("no local protocol descriptor configured"));
        }
        Ok(descriptor())
    }
}

/// Target entry with an optional debugger URL.
pub fn target(id: &str, kind: &str, url: Option<&str>) -> TargetInfo {
    TargetInfo {
        id: id.into(),
        target_type: kind.into(),
        web_socket_debugger_url: url.map(Into::into),
        ..Default::default()
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Shared call counter for listeners.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
