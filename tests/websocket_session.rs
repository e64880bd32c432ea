//! Sessions over WebSocket against an in-process peer.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use devtools_client::{Error, SessionBuilder, SessionState, TargetInfo, TargetSelector};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use common::{Counter, StaticDiscovery, target};

/// Echo peer: answers every command with `{ "method": ..., "params": ... }`
/// and reports the request path it was opened on.
async fn spawn_peer() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (path_tx, path_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let path_tx = path_tx.clone();
            tokio::spawn(async move {
                let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let _ = path_tx.send(request.uri().path().to_string());
                    Ok(response)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };

                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else {
                        continue;
                    };
                    let request: Value = serde_json::from_str(text.as_str()).expect("json");
                    if request["method"] == "Test.hangUp" {
                        let _ = ws.close(None).await;
                        return;
                    }
                    let reply = json!({
                        "id": request["id"],
                        "result": { "method": request["method"], "params": request["params"] }
                    });
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        return;
                    }
                }
            });
        }
    });

    (addr, path_rx)
}

fn page_url(addr: SocketAddr, id: &str) -> String {
    format!("ws://{addr}/devtools/page/{id}")
}

#[tokio::test]
async fn test_default_target_round_trip() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, mut paths) = spawn_peer().await;
    let discovery = Arc::new(StaticDiscovery::new(vec![
        target("a", "background_page", None),
        target("b", "page", Some(&page_url(addr, "b"))),
    ]));

    let session = SessionBuilder::new()
        .port(addr.port())
        .discovery(discovery.clone())
        .connect()
        .await?;

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.web_socket_url(), Some(page_url(addr, "b").as_str()));
    assert_eq!(paths.recv().await.as_deref(), Some("/devtools/page/b"));
    assert_eq!(discovery.list_calls(), 1);

    let result = session.send("Foo.bar", json!({ "x": 1 })).await?;
    assert_eq!(result, json!({ "method": "Foo.bar", "params": { "x": 1 } }));

    let result = session.domain("Page").expect("Page").send("navigate", None).await?;
    assert_eq!(result["method"], "Page.navigate");

    session.close().await?;
    assert_eq!(session.state(), SessionState::Closed);
    Ok(())
}

#[tokio::test]
async fn test_alter_path_and_endpoint_host_port() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, mut paths) = spawn_peer().await;
    let discovery = Arc::new(StaticDiscovery::new(vec![target(
        "B",
        "page",
        Some(&page_url(addr, "B")),
    )]));

    let session = SessionBuilder::new()
        .host("localhost")
        .port(1)
        .target("B")
        .alter_path(|path| format!("/proxy{path}"))
        .discovery(discovery.clone())
        .connect()
        .await?;

    assert_eq!(paths.recv().await.as_deref(), Some("/proxy/devtools/page/B"));
    assert_eq!(session.host(), "127.0.0.1");
    assert_eq!(session.port(), addr.port());

    // Protocol is fetched from the endpoint's own host and port.
    let options = discovery.last_options.lock().clone().expect("options");
    assert_eq!(options.host, "127.0.0.1");
    assert_eq!(options.port, addr.port());

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_path_selector_skips_discovery() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, mut paths) = spawn_peer().await;
    let discovery = Arc::new(StaticDiscovery::new(Vec::new()));

    let session = SessionBuilder::new()
        .host("127.0.0.1")
        .port(addr.port())
        .target("/devtools/browser/xyz")
        .protocol(common::descriptor())
        .discovery(discovery.clone())
        .connect()
        .await?;

    assert_eq!(paths.recv().await.as_deref(), Some("/devtools/browser/xyz"));
    assert_eq!(discovery.list_calls(), 0);
    assert_eq!(
        discovery.protocol_calls.load(std::sync::atomic::Ordering::SeqCst),
        0
    );

    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_selector_function_picks_by_index() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, mut paths) = spawn_peer().await;
    let discovery = Arc::new(StaticDiscovery::new(vec![
        target("first", "page", Some(&page_url(addr, "first"))),
        target("second", "page", Some(&page_url(addr, "second"))),
    ]));

    let session = SessionBuilder::new()
        .port(addr.port())
        .target(TargetSelector::select(|targets: &[TargetInfo]| {
            targets
                .iter()
                .position(|t| t.id == "second")
                .unwrap_or_default()
        }))
        .discovery(discovery)
        .connect()
        .await?;

    assert_eq!(paths.recv().await.as_deref(), Some("/devtools/page/second"));
    session.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_no_inspectable_targets_errors_session() -> anyhow::Result<()> {
    common::init_tracing();
    let session = SessionBuilder::new()
        .discovery(Arc::new(StaticDiscovery::new(vec![target("a", "page", None)])))
        .build()?;

    let errors = Counter::default();
    let hits = errors.clone();
    session.on_error(move |err| {
        assert!(err.is_startup_error());
        hits.hit();
    });

    let err = session.connect().await.expect_err("nothing to attach to");
    assert!(err.to_string().contains("no inspectable targets"));
    assert_eq!(session.state(), SessionState::Errored);
    assert_eq!(errors.get(), 1);
    assert!(matches!(session.connected().await, Err(Error::NotConnected { .. })));
    Ok(())
}

#[tokio::test]
async fn test_local_protocol_failure_propagates() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, _paths) = spawn_peer().await;
    let discovery = Arc::new(StaticDiscovery::new(vec![target(
        "b",
        "page",
        Some(&page_url(addr, "b")),
    )]));

    let err = SessionBuilder::new()
        .local(true)
        .discovery(discovery)
        .connect()
        .await
        .expect_err("no bundled protocol");
    assert!(matches!(err, Error::ProtocolResolution { .. }));
    Ok(())
}

#[tokio::test]
async fn test_peer_close_emits_single_disconnect() -> anyhow::Result<()> {
    common::init_tracing();
    let (addr, _paths) = spawn_peer().await;

    let session = SessionBuilder::new()
        .target(page_url(addr, "x"))
        .protocol(common::descriptor())
        .discovery(Arc::new(StaticDiscovery::new(Vec::new())))
        .build()?;

    let disconnects = Counter::default();
    let hits = disconnects.clone();
    session.on_disconnect(move || hits.hit());
    session.connect().await?;

    let err = session.send("Test.hangUp", None).await.expect_err("peer hung up");
    assert!(matches!(err, Error::ConnectionClosed));
    assert_eq!(disconnects.get(), 1);
    assert_eq!(session.state(), SessionState::Closed);

    session.close().await?;
    session.close().await?;
    assert_eq!(disconnects.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_connect_refused_errors_session() -> anyhow::Result<()> {
    common::init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);

    let session = SessionBuilder::new()
        .target(page_url(addr, "gone"))
        .protocol(common::descriptor())
        .discovery(Arc::new(StaticDiscovery::new(Vec::new())))
        .build()?;

    let err = session.connect().await.expect_err("refused");
    assert!(err.is_transport_error());
    assert_eq!(session.state(), SessionState::Errored);
    Ok(())
}
