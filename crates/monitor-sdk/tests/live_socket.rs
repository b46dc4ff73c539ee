use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use monitor_sdk::proto::SubscriptionIntent;
use monitor_sdk::{BackoffPolicy, ChannelConfig, ChannelManager, ConnectionState, StoreReader};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn upgrade(
    ws: WebSocketUpgrade,
    State(received): State<mpsc::UnboundedSender<Value>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, received))
}

async fn serve_socket(mut socket: WebSocket, received: mpsc::UnboundedSender<Value>) {
    for _ in 0..2 {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                if let Ok(value) = serde_json::from_str(&text) {
                    let _ = received.send(value);
                }
            }
            _ => return,
        }
    }

    let frames = [
        json!({"type": "stats", "data": {"request_stats": {"total_requests": 9}}, "timestamp": 1_700_000_000}),
        json!({"type": "goroutine", "data": {"id": 42, "name": "ticker", "status": "running"}}),
        json!({"type": "request_update", "data": {"request_id": "r9", "resp_status_code": 204}}),
    ];
    for frame in frames {
        if socket.send(Message::Text(frame.to_string())).await.is_err() {
            return;
        }
    }

    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Text(text) = msg {
            if let Ok(value) = serde_json::from_str(&text) {
                let _ = received.send(value);
            }
        }
    }
}

async fn spawn_server() -> (SocketAddr, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new()
        .route("/debug/ws", get(upgrade))
        .with_state(tx);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (addr, rx)
}

async fn wait_until(reader: &StoreReader, mut done: impl FnMut(&StoreReader) -> bool) {
    let mut rx = reader.subscribe();
    timeout(WAIT, async {
        while !done(reader) {
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn websocket_session_feeds_the_store() {
    let (addr, mut received) = spawn_server().await;
    let manager = ChannelManager::new(ChannelConfig {
        url: format!("ws://{addr}/debug/ws"),
        subscription: SubscriptionIntent::all(),
        backoff: BackoffPolicy::default(),
        ping_interval: None,
    });
    let reader = manager.reader();

    manager.connect();

    let subscribe = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["data"]["subscribe_requests"], true);
    let get_stats = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(get_stats, json!({"type": "get_stats"}));

    wait_until(&reader, |r| !r.recent_requests().is_empty()).await;
    assert_eq!(reader.connection_state(), ConnectionState::Open);
    assert_eq!(reader.stats().request_stats.unwrap().total_requests, 9);
    assert_eq!(reader.recent_goroutines()[0].id, "42");
    assert_eq!(reader.recent_requests()[0].resp_status_code, 204);

    assert!(manager.send(&monitor_sdk::proto::OutboundMessage::Ping));
    let ping = timeout(WAIT, received.recv()).await.unwrap().unwrap();
    assert_eq!(ping["type"], "ping");

    manager.disconnect();
    assert_eq!(reader.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn unreachable_server_reports_error_and_keeps_retrying() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let manager = ChannelManager::new(ChannelConfig {
        url: format!("ws://{addr}/debug/ws"),
        subscription: SubscriptionIntent::all(),
        backoff: BackoffPolicy {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(50),
            ..Default::default()
        },
        ping_interval: None,
    });
    let reader = manager.reader();

    manager.connect();
    wait_until(&reader, |r| r.last_error().is_some()).await;
    assert!(!reader.is_connected());
    assert_ne!(reader.connection_state(), ConnectionState::Open);

    manager.disconnect();
    assert!(reader.last_error().is_none());
}
