//! Transport seam for the push channel. The channel manager only sees a
//! [`Connection`]: an outbound text sender and an inbound event receiver.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use crate::error::ChannelError;

/// Events surfaced by a live connection, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Binary(Vec<u8>),
    /// Transport-level failure; a `Closed` event follows.
    Error(String),
    Closed { reason: Option<String> },
}

/// One open logical connection. Dropping `outbound` asks the pump to close
/// the underlying socket.
#[derive(Debug)]
pub struct Connection {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError>;
}

/// Production connector backed by tokio-tungstenite.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
        let (ws_stream, _) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let writer_events = inbound_tx.clone();
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(err) = ws_sender.send(Message::Text(text)).await {
                    warn!(target: "monitor.channel", error = %err, "websocket write failed");
                    let _ = writer_events.send(TransportEvent::Error(err.to_string()));
                    return;
                }
            }
            // Outbound side dropped: the manager is done with this connection.
            let _ = ws_sender.close().await;
        });

        tokio::spawn(async move {
            let mut reason = None;
            while let Some(msg) = ws_receiver.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Text(text),
                    Ok(Message::Binary(data)) => TransportEvent::Binary(data),
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|f| format!("{} {}", u16::from(f.code), f.reason));
                        break;
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        debug!(target: "monitor.channel", error = %err, "websocket read failed");
                        let _ = inbound_tx.send(TransportEvent::Error(err.to_string()));
                        break;
                    }
                };
                if inbound_tx.send(event).is_err() {
                    return;
                }
            }
            let _ = inbound_tx.send(TransportEvent::Closed { reason });
        });

        Ok(Connection {
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
