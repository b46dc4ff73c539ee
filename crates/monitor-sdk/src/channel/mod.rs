//! Push-channel lifecycle: open, subscribe, dispatch, reconnect.
//!
//! A background driver task owns the socket. Every state transition and
//! every dispatch happens under the `link` lock after checking that the
//! driver's epoch is still current, so once [`ChannelManager::disconnect`]
//! returns no straggling frame can reach the store and no pending backoff
//! timer can reopen the channel.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use monitor_proto::{OutboundMessage, SubscriptionIntent};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::ClientConfig;
use crate::dispatch::Dispatcher;
use crate::error::ConfigError;
use crate::store::{ConnectionState, StoreReader, TelemetryStore};

pub use transport::{Connection, Connector, TransportEvent, WsConnector};

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
    pub subscription: SubscriptionIntent,
    pub backoff: BackoffPolicy,
    pub ping_interval: Option<Duration>,
}

#[derive(Default)]
struct Link {
    epoch: u64,
    outbound: Option<tokio::sync::mpsc::UnboundedSender<String>>,
    driver: Option<JoinHandle<()>>,
}

struct Inner {
    config: ChannelConfig,
    connector: Box<dyn Connector>,
    store: TelemetryStore,
    reader: StoreReader,
    dispatcher: Dispatcher,
    link: Mutex<Link>,
}

/// Owns one logical push-channel connection.
///
/// Dropping the manager disconnects it.
pub struct ChannelManager {
    inner: Arc<Inner>,
}

impl ChannelManager {
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_connector(config, WsConnector)
    }

    pub fn with_connector<C: Connector>(config: ChannelConfig, connector: C) -> Self {
        let store = TelemetryStore::new();
        let reader = store.reader();
        let dispatcher = Dispatcher::new(store.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                connector: Box::new(connector),
                store,
                reader,
                dispatcher,
                link: Mutex::new(Link::default()),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.channel_config()?))
    }

    pub fn reader(&self) -> StoreReader {
        self.inner.reader.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.reader.connection_state()
    }

    pub fn url(&self) -> &str {
        &self.inner.config.url
    }

    /// Opens the channel, tearing down any existing connection first.
    ///
    /// The driver runs on the current Tokio runtime. Without one, nothing is
    /// opened and the failure is recorded as the last error.
    pub fn connect(&self) {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(target: "monitor.channel", error = %err, "connect called outside a tokio runtime");
                self.inner.store.record_error(format!("no async runtime: {err}"));
                self.inner.store.set_connection_state(ConnectionState::Disconnected);
                return;
            }
        };
        let mut link = self.inner.link.lock();
        if link.driver.is_some() || link.outbound.is_some() {
            debug!(target: "monitor.channel", "replacing existing connection");
            teardown(&mut link);
        } else {
            link.epoch = link.epoch.wrapping_add(1);
        }
        let epoch = link.epoch;
        self.inner.store.set_connection_state(ConnectionState::Connecting);
        link.driver = Some(runtime.spawn(drive(Arc::clone(&self.inner), epoch)));
    }

    /// Stops the channel. Safe to call repeatedly; a second call is a no-op.
    pub fn disconnect(&self) {
        let mut link = self.inner.link.lock();
        let active = link.driver.is_some() || link.outbound.is_some();
        if !active && self.inner.reader.connection_state() == ConnectionState::Disconnected {
            return;
        }
        self.inner.store.set_connection_state(ConnectionState::Closing);
        teardown(&mut link);
        self.inner.store.reset_connection();
        info!(target: "monitor.channel", url = %self.inner.config.url, "disconnected");
    }

    /// Best-effort send. Returns `false` (and drops the message) unless the
    /// channel is open; nothing is queued for later delivery.
    pub fn send(&self, message: &OutboundMessage) -> bool {
        let link = self.inner.link.lock();
        self.inner.send_locked(&link, message)
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        let mut link = self.inner.link.lock();
        teardown(&mut link);
    }
}

/// Invalidates the current epoch, drops the outbound sender (which closes
/// the socket) and aborts the driver along with any pending backoff sleep.
fn teardown(link: &mut Link) {
    link.epoch = link.epoch.wrapping_add(1);
    link.outbound = None;
    if let Some(driver) = link.driver.take() {
        driver.abort();
    }
}

impl Inner {
    fn with_current<R>(&self, epoch: u64, f: impl FnOnce(&mut Link) -> R) -> Option<R> {
        let mut link = self.link.lock();
        if link.epoch != epoch {
            return None;
        }
        Some(f(&mut link))
    }

    fn send_locked(&self, link: &Link, message: &OutboundMessage) -> bool {
        let Some(outbound) = link.outbound.as_ref() else {
            debug!(target: "monitor.channel", ?message, "channel not open; dropping message");
            return false;
        };
        if !self.reader.is_connected() {
            debug!(target: "monitor.channel", ?message, "channel not open; dropping message");
            return false;
        }
        let text = match message.to_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(target: "monitor.channel", error = %err, "failed to encode control message");
                return false;
            }
        };
        outbound.send(text).is_ok()
    }

    /// Runs one open connection to completion. Returns `false` if the epoch
    /// was invalidated along the way and the driver must stop.
    async fn run_connection(&self, epoch: u64, connection: Connection) -> bool {
        let Connection {
            outbound,
            mut inbound,
        } = connection;

        let opened = self.with_current(epoch, |link| {
            link.outbound = Some(outbound);
            self.store.mark_open();
            self.send_locked(link, &OutboundMessage::Subscribe(self.config.subscription));
            self.send_locked(link, &OutboundMessage::GetStats);
        });
        if opened.is_none() {
            return false;
        }
        info!(target: "monitor.channel", url = %self.config.url, "channel open");

        let mut keepalive = self.config.ping_interval.filter(|p| !p.is_zero()).map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            let event = tokio::select! {
                event = inbound.recv() => event,
                _ = next_tick(&mut keepalive) => {
                    if self
                        .with_current(epoch, |link| self.send_locked(link, &OutboundMessage::Ping))
                        .is_none()
                    {
                        return false;
                    }
                    continue;
                }
            };

            let current = match event {
                Some(TransportEvent::Text(text)) => self
                    .with_current(epoch, |_| {
                        self.dispatcher.dispatch_text(&text);
                    })
                    .is_some(),
                Some(TransportEvent::Binary(data)) => self
                    .with_current(epoch, |_| {
                        self.dispatcher.dispatch_bytes(&data);
                    })
                    .is_some(),
                Some(TransportEvent::Error(message)) => {
                    warn!(target: "monitor.channel", error = %message, "channel error");
                    self.with_current(epoch, |_| {
                        self.store.record_error(format!("connection error: {message}"));
                    })
                    .is_some()
                }
                Some(TransportEvent::Closed { reason }) => {
                    info!(target: "monitor.channel", reason = ?reason, "channel closed");
                    break;
                }
                None => {
                    debug!(target: "monitor.channel", "transport dropped without close event");
                    break;
                }
            };
            if !current {
                return false;
            }
        }

        self.with_current(epoch, |link| {
            link.outbound = None;
            self.store.set_connection_state(ConnectionState::Disconnected);
        })
        .is_some()
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn drive(inner: Arc<Inner>, epoch: u64) {
    let mut attempt: u32 = 0;
    loop {
        let phase = if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        };
        if inner
            .with_current(epoch, |_| inner.store.set_connection_state(phase))
            .is_none()
        {
            return;
        }

        debug!(target: "monitor.channel", url = %inner.config.url, attempt, "connecting");
        match inner.connector.connect(&inner.config.url).await {
            Ok(connection) => {
                attempt = 0;
                if !inner.run_connection(epoch, connection).await {
                    return;
                }
            }
            Err(err) => {
                warn!(
                    target: "monitor.channel",
                    url = %inner.config.url,
                    attempt,
                    error = %err,
                    "connect failed"
                );
                let recorded =
                    inner.with_current(epoch, |_| inner.store.record_error(err.to_string()));
                if recorded.is_none() {
                    return;
                }
            }
        }

        attempt = attempt.saturating_add(1);
        if !inner.config.backoff.allows(attempt) {
            warn!(
                target: "monitor.channel",
                url = %inner.config.url,
                attempts = attempt,
                "reconnect attempts exhausted"
            );
            inner.with_current(epoch, |link| {
                link.outbound = None;
                link.driver = None;
                inner.store.set_connection_state(ConnectionState::Disconnected);
            });
            return;
        }

        let delay = inner.config.backoff.delay_for(attempt);
        if inner
            .with_current(epoch, |_| {
                inner.store.set_connection_state(ConnectionState::Reconnecting)
            })
            .is_none()
        {
            return;
        }
        debug!(
            target: "monitor.channel",
            delay_ms = delay.as_millis() as u64,
            attempt,
            "scheduling reconnect"
        );
        sleep(delay).await;
    }
}
