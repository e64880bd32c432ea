//! Sessions over an embedded process pipe pair.

mod common;

use std::sync::Arc;
use std::time::Duration;

use devtools_client::{EmbeddedProcess, Error, Event, SessionBuilder, SessionState, Signal};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::duplex;
use tokio::task::JoinHandle;

use common::{Counter, StaticDiscovery, pipe_builder};

fn spawn_send(
    session: &devtools_client::Session,
    method: &'static str,
    params: Value,
) -> JoinHandle<devtools_client::Result<Value>> {
    let session = session.clone();
    tokio::spawn(async move { session.send(method, params).await })
}

#[tokio::test]
async fn test_round_trip_resolves_result() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.web_socket_url().is_none());

    let pending = spawn_send(&session, "Foo.bar", json!({ "x": 1 }));

    let request = peer.recv().await;
    assert_eq!(request, json!({ "id": 1, "method": "Foo.bar", "params": { "x": 1 } }));
    peer.send(json!({ "id": 1, "result": { "y": 2 } })).await;

    assert_eq!(pending.await??, json!({ "y": 2 }));
    Ok(())
}

#[tokio::test]
async fn test_error_reply_rejects_with_protocol_error() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let first = spawn_send(&session, "Foo.bar", json!({ "x": 1 }));
    peer.recv().await;
    peer.send(json!({ "id": 1, "error": { "message": "bad" } })).await;

    let err = first.await?.expect_err("rejected");
    assert!(err.is_protocol_error());
    assert_eq!(err.to_string(), "bad");
    match err {
        Error::Protocol {
            request, response, ..
        } => {
            assert_eq!(request.method, "Foo.bar");
            assert_eq!(request.params, json!({ "x": 1 }));
            assert_eq!(response["error"]["message"], "bad");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let second = spawn_send(&session, "Foo.bar", Value::Null);
    peer.recv().await;
    peer.send(json!({ "id": 2, "error": { "message": "bad", "data": "no such node" } }))
        .await;
    assert_eq!(second.await?.expect_err("rejected").to_string(), "bad (no such node)");
    Ok(())
}

#[tokio::test]
async fn test_reply_without_result_resolves_empty_object() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.send("Foo.bar", None).await }
    });

    let request = peer.recv().await;
    assert_eq!(request["params"], json!({}));
    peer.send(json!({ "id": 1 })).await;

    assert_eq!(pending.await??, json!({}));
    Ok(())
}

#[tokio::test]
async fn test_replies_route_by_id_in_any_order() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let handles: Vec<_> = (0..5)
        .map(|n| spawn_send(&session, "Foo.bar", json!({ "n": n })))
        .collect();

    let mut requests = Vec::new();
    for _ in 0..5 {
        requests.push(peer.recv().await);
    }

    let mut ids: Vec<u64> = requests.iter().map(|r| r["id"].as_u64().expect("id")).collect();
    let sent = ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(sent, ids, "ids are allocated in send order");

    for request in requests.iter().rev() {
        peer.send(json!({ "method": "Foo.baz", "params": {} })).await;
        peer.send(json!({ "id": request["id"], "result": { "n": request["params"]["n"] } }))
            .await;
    }

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await??, json!({ "n": n }));
    }
    Ok(())
}

#[tokio::test]
async fn test_event_reaches_generic_then_method_listeners() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.build()?;

    let log = Arc::new(Mutex::new(Vec::<String>::new()));
    let generic = Arc::clone(&log);
    session.on_event(move |event: &Event| generic.lock().push(format!("event {}", event.method)));
    let specific = Arc::clone(&log);
    session.on("Foo.baz", move |params| specific.lock().push(format!("Foo.baz {params}")));
    let other = Arc::clone(&log);
    session.on("Foo.other", move |_| other.lock().push("other".into()));

    session.connect().await?;

    let pending = spawn_send(&session, "Foo.bar", Value::Null);
    peer.recv().await;
    peer.send(json!({ "method": "Foo.baz", "params": { "z": 3 } })).await;
    peer.send(json!({ "id": 1, "result": {} })).await;
    pending.await??;

    assert_eq!(
        *log.lock(),
        vec!["event Foo.baz".to_string(), r#"Foo.baz {"z":3}"#.to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_ready_fires_once_when_all_replies_arrived() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let ready = Counter::default();
    let hits = ready.clone();
    session.on_ready(move || hits.hit());

    let first = spawn_send(&session, "Foo.bar", json!({ "n": 1 }));
    let second = spawn_send(&session, "Foo.bar", json!({ "n": 2 }));
    let a = peer.recv().await;
    let b = peer.recv().await;

    peer.send(json!({ "id": a["id"], "result": {} })).await;
    first.await??;
    assert_eq!(ready.get(), 0, "one command still outstanding");

    peer.send(json!({ "id": b["id"], "result": {} })).await;
    second.await??;
    assert_eq!(ready.get(), 1);
    assert_eq!(session.pending_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_unknown_ids_and_malformed_frames_are_dropped() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.build()?;
    let errors = Counter::default();
    let hits = errors.clone();
    session.on_error(move |_| hits.hit());
    session.connect().await?;

    let pending = spawn_send(&session, "Foo.bar", Value::Null);
    peer.recv().await;

    peer.send(json!({ "id": 99, "result": { "stray": true } })).await;
    peer.send_raw("{not json").await;
    peer.send(json!({ "params": {} })).await;
    peer.send(json!({ "id": 1, "result": { "ok": true } })).await;

    assert_eq!(pending.await??, json!({ "ok": true }));
    assert_eq!(errors.get(), 0);
    assert_eq!(session.state(), SessionState::Ready);
    Ok(())
}

#[tokio::test]
async fn test_close_with_callback_reports_each_call() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let (first_tx, first_rx) = tokio::sync::oneshot::channel();
    let (second_tx, second_rx) = tokio::sync::oneshot::channel();
    session.close_with_callback(move |result| {
        let _ = first_tx.send(result.is_ok());
    });
    session.close_with_callback(move |result| {
        let _ = second_tx.send(result.is_ok());
    });

    assert!(first_rx.await?);
    assert!(second_rx.await?);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(peer.client_closed().await);
    Ok(())
}

#[tokio::test]
async fn test_close_twice_without_disconnect() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let disconnects = Counter::default();
    let hits = disconnects.clone();
    session.on_disconnect(move || hits.hit());

    let pending = spawn_send(&session, "Foo.slow", Value::Null);
    peer.recv().await;

    session.close().await?;
    session.close().await?;

    assert!(matches!(pending.await?, Err(Error::ConnectionClosed)));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(disconnects.get(), 0);
    assert!(peer.client_closed().await);
    assert!(matches!(
        session.send("Foo.bar", None).await,
        Err(Error::ConnectionClosed)
    ));
    Ok(())
}

#[tokio::test]
async fn test_peer_disconnect_fails_pending_and_fires_once() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let disconnects = Counter::default();
    let hits = disconnects.clone();
    session.on_disconnect(move || hits.hit());

    let pending = spawn_send(&session, "Foo.slow", Value::Null);
    peer.recv().await;
    drop(peer);

    assert!(matches!(pending.await?, Err(Error::ConnectionClosed)));
    assert_eq!(disconnects.get(), 1);
    assert_eq!(session.state(), SessionState::Closed);

    session.close().await?;
    assert_eq!(disconnects.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_panicking_connect_listener_is_not_a_startup_failure() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.build()?;

    let errors = Counter::default();
    let error_hits = errors.clone();
    session.on_error(move |_| error_hits.hit());
    let connects = Counter::default();
    let connect_hits = connects.clone();
    session.on_connect(move |session| {
        connect_hits.hit();
        assert_eq!(session.state(), SessionState::Ready);
        panic!("caller bug");
    });

    session.connect().await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(connects.get(), 1);
    assert_eq!(errors.get(), 0);
    assert_eq!(session.state(), SessionState::Ready);

    let pending = spawn_send(&session, "Foo.bar", Value::Null);
    peer.recv().await;
    peer.send(json!({ "id": 1 })).await;
    pending.await??;
    Ok(())
}

#[tokio::test]
async fn test_missing_process_stream_errors_session() -> anyhow::Result<()> {
    common::init_tracing();
    let (client_out, _peer_in) = duplex(1024);
    let process = EmbeddedProcess::new()
        .with_stream(3, devtools_client::ProcessStream::writable(client_out));

    let session = SessionBuilder::new()
        .process(process)
        .protocol(common::descriptor())
        .discovery(Arc::new(StaticDiscovery::new(Vec::new())))
        .build()?;
    let errors = Counter::default();
    let hits = errors.clone();
    session.on_error(move |_| hits.hit());

    let err = session.connect().await.expect_err("stream 4 missing");
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(session.state(), SessionState::Errored);
    assert_eq!(errors.get(), 1);
    assert!(matches!(
        session.send("Foo.bar", None).await,
        Err(Error::ConnectionClosed)
    ));
    Ok(())
}

#[tokio::test]
async fn test_background_start_and_connected() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.start()?;

    session.connected().await?;
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.protocol().is_some());

    let pending = spawn_send(&session, "Foo.bar", Value::Null);
    assert_eq!(peer.recv().await["id"], 1);
    peer.send(json!({ "id": 1, "result": { "done": true } })).await;
    assert_eq!(pending.await??, json!({ "done": true }));
    Ok(())
}

#[tokio::test]
async fn test_send_with_callback() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let (tx, rx) = tokio::sync::oneshot::channel();
    session.send_with_callback("Foo.bar", json!({ "cb": true }), move |result| {
        let _ = tx.send(result);
    });

    let request = peer.recv().await;
    assert_eq!(request["params"], json!({ "cb": true }));
    peer.send(json!({ "id": request["id"], "result": { "via": "callback" } })).await;

    assert_eq!(rx.await??, json!({ "via": "callback" }));
    Ok(())
}

#[tokio::test]
async fn test_flattened_session_commands_and_events() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    let scoped = tokio::spawn({
        let session = session.clone();
        async move { session.wait_for_event("Page.loadEventFired.S1").await }
    });
    tokio::task::yield_now().await;

    let pending = tokio::spawn({
        let session = session.clone();
        async move { session.send_to("S1", "Page.navigate", json!({ "url": "about:blank" })).await }
    });

    let request = peer.recv().await;
    assert_eq!(request["sessionId"], "S1");
    peer.send(json!({
        "method": "Page.loadEventFired",
        "params": { "timestamp": 1.5 },
        "sessionId": "S1"
    }))
    .await;
    peer.send(json!({ "id": request["id"], "sessionId": "S1", "result": {} })).await;

    pending.await??;
    assert_eq!(scoped.await??, json!({ "timestamp": 1.5 }));
    assert_eq!(
        session.listener_count(&Signal::Method("Page.loadEventFired.S1".into())),
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_domain_handle() -> anyhow::Result<()> {
    let (builder, mut peer) = pipe_builder();
    let session = builder.connect().await?;

    assert!(session.domain("Network").is_none());
    let foo = session.domain("Foo").expect("Foo domain");

    let err = foo.send("missing", None).await.expect_err("undeclared");
    assert!(matches!(err, Error::UnknownCommand { ref command } if command == "Foo.missing"));

    let events = Counter::default();
    let hits = events.clone();
    foo.on("baz", move |_| hits.hit());

    let pending = tokio::spawn({
        let foo = foo.clone();
        async move { foo.send("bar", json!({ "x": 1 })).await }
    });
    let request = peer.recv().await;
    assert_eq!(request["method"], "Foo.bar");
    peer.send(json!({ "method": "Foo.baz", "params": {} })).await;
    peer.send(json!({ "id": request["id"], "result": {} })).await;

    pending.await??;
    assert_eq!(events.get(), 1);
    Ok(())
}

#[tokio::test]
async fn test_wait_for_event_fails_when_session_ends() -> anyhow::Result<()> {
    let (builder, peer) = pipe_builder();
    let session = builder.connect().await?;

    let waiter = tokio::spawn({
        let session = session.clone();
        async move { session.wait_for_event("Foo.baz").await }
    });
    tokio::task::yield_now().await;
    drop(peer);

    assert!(matches!(waiter.await?, Err(Error::ConnectionClosed)));
    Ok(())
}
