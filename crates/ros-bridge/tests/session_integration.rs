//! Integration tests for one connection attempt against a real websocket
//! server on loopback.
//!
//! Each test binds a `tokio-tungstenite` server on an ephemeral port,
//! runs a [`ConnectionSession`] against it, and checks what crosses the wire
//! together with how the attempt ends.
//!
//! ```text
//! ConnectionSession ──ws://127.0.0.1:<port>/──► test server (accept_hdr_async)
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_util::sync::CancellationToken;

use ros_bridge::application::EventBridge;
use ros_bridge::domain::messages;
use ros_bridge::domain::SessionOptions;
use ros_bridge::infrastructure::{ConnectionSession, EndKind, EndReason, SessionState};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ───────────────────────────────────────────────────────────────────

fn options() -> SessionOptions {
    SessionOptions {
        connect_timeout: Duration::from_secs(2),
        handshake_timeout: Duration::from_secs(2),
        user_agent: "ros-bridge-test/1.0".to_string(),
        verbose: true,
    }
}

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Accepts one websocket client and returns it with its upgrade headers
/// (names lower-cased).
async fn accept_one(
    listener: &TcpListener,
) -> (WebSocketStream<TcpStream>, HashMap<String, String>) {
    let (stream, _) = listener.accept().await.unwrap();
    let captured = Arc::new(Mutex::new(HashMap::new()));
    let sink = Arc::clone(&captured);
    let ws = accept_hdr_async(
        stream,
        move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let mut headers = sink.lock().unwrap();
            for (name, value) in request.headers() {
                headers.insert(
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                );
            }
            Ok(response)
        },
    )
    .await
    .unwrap();
    let headers = captured.lock().unwrap().clone();
    (ws, headers)
}

/// Reads text frames until `count` have arrived.
async fn read_texts(ws: &mut WebSocketStream<TcpStream>, count: usize) -> Vec<String> {
    let mut texts = Vec::with_capacity(count);
    while texts.len() < count {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => texts.push(text),
            Some(Ok(_)) => continue,
            other => panic!("server stream ended early: {other:?}"),
        }
    }
    texts
}

/// Keeps reading so close replies get flushed, until the client is gone.
async fn drain(mut ws: WebSocketStream<TcpStream>) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn spawn_session(session: ConnectionSession, port: u16) -> JoinHandle<EndReason> {
    tokio::spawn(async move { session.run("127.0.0.1", port, "/").await })
}

async fn finish(runner: JoinHandle<EndReason>) -> EndReason {
    tokio::time::timeout(TEST_TIMEOUT, runner)
        .await
        .expect("session should end")
        .unwrap()
}

// ── Handshake ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_handshake_sends_greeting_with_host_and_user_agent() {
    // Arrange
    let (listener, port) = listen().await;
    let bridge = Arc::new(EventBridge::new(false));
    let mut session = ConnectionSession::new(options(), CancellationToken::new());
    let on_open = Arc::clone(&bridge);
    session.register_handshake_callback(move |queue| on_open.on_link_established(queue));
    let handle = session.handle();

    // Act
    let runner = spawn_session(session, port);
    let (mut ws, headers) = accept_one(&listener).await;
    let first = read_texts(&mut ws, 1).await;

    // Assert
    assert_eq!(first[0], messages::greeting().unwrap());
    assert_eq!(headers["host"], format!("127.0.0.1:{port}"));
    assert_eq!(headers["user-agent"], "ros-bridge-test/1.0");
    assert!(bridge.is_linked());
    assert_eq!(handle.state(), SessionState::Open);

    handle.close();
    drain(ws).await;
    assert!(matches!(finish(runner).await, EndReason::Closed));
}

// ── Outbound ordering ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_outbound_messages_arrive_in_enqueue_order() {
    // Arrange: 50 messages enqueued back to back, most while a write is in flight
    let (listener, port) = listen().await;
    let mut session = ConnectionSession::new(options(), CancellationToken::new());
    session.register_handshake_callback(|queue| {
        for i in 0..50 {
            queue.enqueue(format!("message-{i}"));
        }
    });
    let handle = session.handle();

    // Act
    let runner = spawn_session(session, port);
    let (mut ws, _) = accept_one(&listener).await;
    let received = read_texts(&mut ws, 50).await;

    // Assert
    let expected: Vec<String> = (0..50).map(|i| format!("message-{i}")).collect();
    assert_eq!(received, expected);

    handle.close();
    drain(ws).await;
    finish(runner).await;
}

#[tokio::test]
async fn test_handle_send_reaches_peer() {
    let (listener, port) = listen().await;
    let session = ConnectionSession::new(options(), CancellationToken::new());
    let mut handle = session.handle();

    let runner = spawn_session(session, port);
    let (mut ws, _) = accept_one(&listener).await;
    assert!(handle.opened().await);
    assert!(handle.send("late hello".to_string()));

    assert_eq!(read_texts(&mut ws, 1).await, ["late hello"]);

    handle.close();
    drain(ws).await;
    finish(runner).await;
}

// ── Inbound ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inbound_messages_reach_read_callback_in_order() {
    // Arrange
    let (listener, port) = listen().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = ConnectionSession::new(options(), CancellationToken::new());
    session.register_read_callback(move |body| {
        tx.send(body).ok();
    });
    let handle = session.handle();

    // Act
    let runner = spawn_session(session, port);
    let (mut ws, _) = accept_one(&listener).await;
    for body in [r#"{"type":"ros_topic"}"#, "not json", r#"{"type":"status"}"#] {
        ws.send(Message::Text(body.to_string())).await.unwrap();
    }
    ws.send(Message::Binary(b"raw".to_vec())).await.unwrap();

    // Assert
    let mut received = Vec::new();
    for _ in 0..4 {
        let body = tokio::time::timeout(TEST_TIMEOUT, rx.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(body);
    }
    assert_eq!(
        received,
        [r#"{"type":"ros_topic"}"#, "not json", r#"{"type":"status"}"#, "raw"]
    );

    handle.close();
    drain(ws).await;
    finish(runner).await;
}

// ── Endings ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_graceful_close_ends_closed() {
    // Arrange
    let (listener, port) = listen().await;
    let session = ConnectionSession::new(options(), CancellationToken::new());
    let mut handle = session.handle();
    let runner = spawn_session(session, port);
    let (ws, _) = accept_one(&listener).await;
    let server = tokio::spawn(drain(ws));
    assert!(handle.opened().await);

    // Act
    handle.close();

    // Assert
    assert!(matches!(finish(runner).await, EndReason::Closed));
    assert_eq!(handle.ended().await, Some(EndKind::Closed));
    assert!(!handle.send("after close".to_string()));
    server.await.unwrap();
}

#[tokio::test]
async fn test_peer_close_ends_peer_closed() {
    // Arrange
    let (listener, port) = listen().await;
    let session = ConnectionSession::new(options(), CancellationToken::new());
    let mut handle = session.handle();
    let runner = spawn_session(session, port);
    let (mut ws, _) = accept_one(&listener).await;
    assert!(handle.opened().await);

    // Act
    ws.close(None).await.unwrap();
    drain(ws).await;

    // Assert
    assert!(matches!(finish(runner).await, EndReason::PeerClosed));
}

#[tokio::test]
async fn test_peer_drop_without_close_frame_ends_peer_closed() {
    let (listener, port) = listen().await;
    let session = ConnectionSession::new(options(), CancellationToken::new());
    let mut handle = session.handle();
    let runner = spawn_session(session, port);
    let (ws, _) = accept_one(&listener).await;
    assert!(handle.opened().await);

    drop(ws);

    assert_eq!(finish(runner).await.kind(), EndKind::PeerClosed);
}

#[tokio::test]
async fn test_abort_while_open_ends_aborted() {
    // Arrange
    let (listener, port) = listen().await;
    let cancel = CancellationToken::new();
    let session = ConnectionSession::new(options(), cancel.child_token());
    let mut handle = session.handle();
    let runner = spawn_session(session, port);
    let (ws, _) = accept_one(&listener).await;
    let server = tokio::spawn(drain(ws));
    assert!(handle.opened().await);

    // Act: cancelling the parent reaches the session's child token
    cancel.cancel();

    // Assert
    assert!(matches!(finish(runner).await, EndReason::Aborted));
    assert_eq!(handle.state(), SessionState::Ended(EndKind::Aborted));
    server.await.unwrap();
}

#[tokio::test]
async fn test_refused_connection_fails_at_connect() {
    // Arrange: grab a free port, then close the listener
    let (listener, port) = listen().await;
    drop(listener);
    let session = ConnectionSession::new(options(), CancellationToken::new());

    // Act
    let reason = finish(spawn_session(session, port)).await;

    // Assert
    match reason {
        EndReason::Failed(e) => assert_eq!(e.stage(), "connect"),
        other => panic!("expected connect failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_websocket_server_fails_at_handshake() {
    // Arrange: a server that answers the upgrade with plain HTTP
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = stream.read(&mut buf).await;
        stream
            .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
    });
    let session = ConnectionSession::new(options(), CancellationToken::new());

    // Act
    let reason = finish(spawn_session(session, port)).await;

    // Assert
    match reason {
        EndReason::Failed(e) => assert_eq!(e.stage(), "handshake"),
        other => panic!("expected handshake failure, got {other:?}"),
    }
    server.await.unwrap();
}
