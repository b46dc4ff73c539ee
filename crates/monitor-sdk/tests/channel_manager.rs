use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use monitor_sdk::proto::{OutboundMessage, SubscriptionIntent};
use monitor_sdk::{
    BackoffPolicy, ChannelConfig, ChannelError, ChannelManager, Connection, ConnectionState,
    Connector, StoreReader, TransportEvent,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Test side of one mock connection.
struct Peer {
    sent: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Peer {
    async fn next_sent(&mut self) -> Value {
        let text = timeout(WAIT, self.sent.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client closed outbound");
        serde_json::from_str(&text).expect("client sent json")
    }

    fn push(&self, value: Value) {
        self.events
            .send(TransportEvent::Text(value.to_string()))
            .expect("connection alive");
    }
}

/// In-memory connector: each successful connect hands the test a [`Peer`].
#[derive(Clone, Default)]
struct MockConnector {
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
    peers: Option<mpsc::UnboundedSender<Peer>>,
}

impl MockConnector {
    fn new() -> (Self, mpsc::UnboundedReceiver<Peer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            peers: Some(tx),
            ..Default::default()
        };
        (connector, rx)
    }

    fn refusing() -> Self {
        let connector = Self::default();
        connector.refuse.store(true, Ordering::SeqCst);
        connector
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Connection, ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ChannelError::Transport("connection refused".into()));
        }
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let peer = Peer {
            sent: outbound_rx,
            events: inbound_tx,
        };
        if let Some(tx) = self.peers.as_ref() {
            let _ = tx.send(peer);
        }
        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn config(initial_ms: u64, max_attempts: Option<u32>) -> ChannelConfig {
    ChannelConfig {
        url: "ws://monitor.test/debug/ws".into(),
        subscription: SubscriptionIntent::all(),
        backoff: BackoffPolicy {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(initial_ms * 4),
            jitter: 0.0,
            max_attempts,
            ..Default::default()
        },
        ping_interval: None,
    }
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

async fn next_peer(peers: &mut mpsc::UnboundedReceiver<Peer>) -> Peer {
    timeout(WAIT, peers.recv())
        .await
        .expect("timed out waiting for connection")
        .expect("connector dropped")
}

async fn expect_handshake(peer: &mut Peer) {
    let first = peer.next_sent().await;
    assert_eq!(first["type"], "subscribe");
    assert_eq!(
        first["data"],
        json!({
            "subscribe_stats": true,
            "subscribe_goroutines": true,
            "subscribe_requests": true
        })
    );
    let second = peer.next_sent().await;
    assert_eq!(second["type"], "get_stats");
}

#[tokio::test]
async fn handshake_is_sent_on_every_open() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector.clone());
    let reader = manager.reader();

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;
    wait_until(&reader, |r| r.is_connected()).await;
    assert!(peer.sent.try_recv().is_err(), "handshake sent more than once");

    peer.events
        .send(TransportEvent::Closed {
            reason: Some("1001 going away".into()),
        })
        .unwrap();

    let mut reopened = next_peer(&mut peers).await;
    expect_handshake(&mut reopened).await;
    wait_until(&reader, |r| r.is_connected()).await;
    assert_eq!(connector.attempts(), 2);

    manager.disconnect();
}

#[tokio::test]
async fn frames_reach_the_store_in_order() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector);
    let reader = manager.reader();

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;

    peer.push(json!({"type": "goroutine", "data": {"id": "g1", "status": "running"}}));
    peer.push(json!({"type": "goroutine_update", "data": {"id": "g2"}}));
    let request = json!({"type": "request", "data": {"request_id": "r1", "resp_status_code": "201"}});
    peer.events
        .send(TransportEvent::Binary(request.to_string().into_bytes()))
        .unwrap();
    peer.push(json!({"type": "stats", "data": {"goroutine_stats": {"active_count": 3}}}));

    wait_until(&reader, |r| r.stats().goroutine_stats.is_some()).await;
    let ids: Vec<String> = reader.recent_goroutines().into_iter().map(|g| g.id).collect();
    assert_eq!(ids, vec!["g2".to_string(), "g1".to_string()]);
    assert_eq!(reader.recent_requests()[0].resp_status_code, 201);
    assert!(reader.last_updated().is_some());

    manager.disconnect();
}

#[tokio::test]
async fn send_is_dropped_unless_open() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector);
    let reader = manager.reader();

    assert!(!manager.send(&OutboundMessage::Ping));

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;
    wait_until(&reader, |r| r.is_connected()).await;

    assert!(manager.send(&OutboundMessage::Unsubscribe));
    assert_eq!(peer.next_sent().await["type"], "unsubscribe");

    manager.disconnect();
    assert!(!manager.send(&OutboundMessage::GetStats));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector);
    let reader = manager.reader();

    manager.disconnect();
    assert_eq!(reader.revision(), 0);

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;
    wait_until(&reader, |r| r.is_connected()).await;

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(reader.last_error().is_none());
    let revision = reader.revision();

    manager.disconnect();
    assert_eq!(reader.revision(), revision);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn nothing_is_dispatched_after_disconnect() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector.clone());
    let reader = manager.reader();

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;
    wait_until(&reader, |r| r.is_connected()).await;

    manager.disconnect();
    let revision = reader.revision();

    let straggler = json!({"type": "goroutine", "data": {"id": "late"}});
    let _ = peer.events.send(TransportEvent::Text(straggler.to_string()));
    let _ = peer.events.send(TransportEvent::Closed { reason: None });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(reader.recent_goroutines().is_empty());
    assert_eq!(reader.revision(), revision);
    assert_eq!(connector.attempts(), 1, "manual disconnect must not reconnect");
}

#[tokio::test]
async fn disconnect_cancels_pending_reconnect() {
    let connector = MockConnector::refusing();
    let manager = ChannelManager::with_connector(config(300, None), connector.clone());
    let reader = manager.reader();

    manager.connect();
    wait_until(&reader, |r| {
        r.connection_state() == ConnectionState::Reconnecting && r.last_error().is_some()
    })
    .await;
    assert_eq!(connector.attempts(), 1);

    manager.disconnect();
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(reader.last_error().is_none());
}

#[tokio::test]
async fn transport_error_is_cleared_by_reopen() {
    let (connector, mut peers) = MockConnector::new();
    let manager = ChannelManager::with_connector(config(10, None), connector);
    let reader = manager.reader();

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;

    peer.events
        .send(TransportEvent::Error("stream reset".into()))
        .unwrap();
    wait_until(&reader, |r| r.last_error().is_some()).await;
    assert_eq!(
        reader.last_error().as_deref(),
        Some("connection error: stream reset")
    );

    peer.events.send(TransportEvent::Closed { reason: None }).unwrap();
    let mut reopened = next_peer(&mut peers).await;
    expect_handshake(&mut reopened).await;
    wait_until(&reader, |r| r.is_connected()).await;
    assert!(reader.last_error().is_none());

    manager.disconnect();
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let connector = MockConnector::refusing();
    let manager = ChannelManager::with_connector(config(5, Some(2)), connector.clone());
    let reader = manager.reader();

    manager.connect();
    timeout(WAIT, async {
        while connector.attempts() < 3 || manager.state() != ConnectionState::Disconnected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("reconnect loop did not stop");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(connector.attempts(), 3);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(reader.last_error().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn keepalive_pings_while_open() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = config(10, None);
    cfg.ping_interval = Some(Duration::from_millis(20));
    let manager = ChannelManager::with_connector(cfg, connector);

    manager.connect();
    let mut peer = next_peer(&mut peers).await;
    expect_handshake(&mut peer).await;
    assert_eq!(peer.next_sent().await, json!({"type": "ping"}));

    peer.push(json!({"type": "pong", "data": null}));
    manager.disconnect();
}

#[tokio::test]
async fn dropping_the_manager_stops_the_driver() {
    let connector = MockConnector::refusing();
    let manager = ChannelManager::with_connector(config(20, None), connector.clone());
    let reader = manager.reader();

    manager.connect();
    wait_until(&reader, |r| r.last_error().is_some()).await;
    drop(manager);
    let seen = connector.attempts();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connector.attempts(), seen);
}
