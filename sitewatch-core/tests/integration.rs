//! Integration tests — full streaming lifecycle against a real
//! WebSocket server on localhost.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Message;

use sitewatch_core::{
    CaptureConfig, ConnectionState, Snapshot, StreamConfig, StreamService,
    capture::SyntheticBackend,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Spin up a listener on an OS-assigned port and return it with the
/// matching `ws://` endpoint.
async fn ephemeral_server() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("timed out waiting for a client connection")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

fn service_for(url: &str) -> StreamService {
    StreamService::new(
        StreamConfig {
            endpoint: url.to_string(),
            capture: CaptureConfig {
                width: 32,
                height: 24,
            },
            ..StreamConfig::default()
        },
        Box::new(SyntheticBackend),
    )
}

/// Receive the next text payload, skipping heartbeat pings.
async fn recv_non_ping(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")?;
        match msg.unwrap() {
            Message::Text(text) if text.contains(r#""type":"ping""#) => continue,
            Message::Text(text) => return Some(text),
            Message::Close(_) => return None,
            _ => continue,
        }
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ── Streaming lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn start_connects_and_streams_frames() {
    let (listener, url) = ephemeral_server().await;
    let service = service_for(&url);

    service.start().unwrap();
    let mut ws = accept_ws(&listener).await;
    wait_until(|| service.connection_state() == ConnectionState::Open).await;

    let text = recv_non_ping(&mut ws).await.expect("connection closed");
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["type"], "frame");
    assert!(
        value["frame"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,")
    );

    service.shutdown();
}

#[tokio::test]
async fn results_reach_every_subscriber() {
    let (listener, url) = ephemeral_server().await;
    let service = service_for(&url);

    let a: Arc<Mutex<Option<Snapshot>>> = Arc::new(Mutex::new(None));
    let b: Arc<Mutex<Option<Snapshot>>> = Arc::new(Mutex::new(None));
    let a_cb = Arc::clone(&a);
    service.subscribe(Box::new(move |snap| {
        *a_cb.lock().unwrap() = Some(snap);
        Ok(())
    }));
    let b_cb = Arc::clone(&b);
    service.subscribe(Box::new(move |snap| {
        *b_cb.lock().unwrap() = Some(snap);
        Ok(())
    }));

    let mut ws = accept_ws(&listener).await;
    wait_until(|| service.connection_state() == ConnectionState::Open).await;

    ws.send(Message::Text(
        r#"{"type":"result","fps":4.2,"detections":[{"bbox":[0,0,10,10],"conf":0.8,"class_id":2}]}"#
            .into(),
    ))
    .await
    .unwrap();

    let fps_of = |slot: &Arc<Mutex<Option<Snapshot>>>| {
        slot.lock().unwrap().as_ref().map(|s| s.fps).unwrap_or(0.0)
    };
    wait_until(|| fps_of(&a) == 4.2 && fps_of(&b) == 4.2).await;

    let snap = a.lock().unwrap().clone().unwrap();
    let detections = snap.result.unwrap().detections.unwrap();
    assert_eq!(detections[0].class_id, 2);

    service.shutdown();
}

#[tokio::test]
async fn backpressure_caps_unacknowledged_frames() {
    let (listener, url) = ephemeral_server().await;
    let service = service_for(&url);

    service.start().unwrap();
    let mut ws = accept_ws(&listener).await;

    // With no results coming back, dispatch stops once the in-flight
    // count exceeds the ceiling.
    for _ in 0..3 {
        let text = recv_non_ping(&mut ws).await.expect("connection closed");
        assert!(text.contains(r#""type":"frame""#));
    }
    let extra = tokio::time::timeout(Duration::from_millis(600), ws.next()).await;
    assert!(extra.is_err(), "a frame was sent past the ceiling");

    // One result frees a slot and dispatch resumes.
    ws.send(Message::Text(r#"{"type":"result","fps":1.0}"#.into()))
        .await
        .unwrap();
    let resumed = recv_non_ping(&mut ws).await.expect("connection closed");
    assert!(resumed.contains(r#""type":"frame""#));

    service.shutdown();
}

// ── Reconnection ─────────────────────────────────────────────────

#[tokio::test]
async fn reconnects_after_remote_close_while_streaming() {
    let (listener, url) = ephemeral_server().await;
    let service = service_for(&url);

    service.start().unwrap();
    let ws = accept_ws(&listener).await;
    wait_until(|| service.connection_state() == ConnectionState::Open).await;

    // Remote closes; the client schedules one delayed reconnect.
    drop(ws);
    wait_until(|| service.connection_state() == ConnectionState::Closed).await;

    let _second = accept_ws(&listener).await;
    wait_until(|| service.connection_state() == ConnectionState::Open).await;

    service.shutdown();
}

#[tokio::test]
async fn shutdown_disconnects_without_reconnecting() {
    let (listener, url) = ephemeral_server().await;
    let service = service_for(&url);

    service.start().unwrap();
    let _ws = accept_ws(&listener).await;
    wait_until(|| service.connection_state() == ConnectionState::Open).await;

    service.shutdown();
    wait_until(|| service.connection_state() == ConnectionState::Closed).await;
    assert!(!service.is_streaming());

    // Well past the reconnect delay: no new connection attempt.
    let reconnect = tokio::time::timeout(Duration::from_secs(3), listener.accept()).await;
    assert!(reconnect.is_err(), "reconnected after explicit shutdown");
}
