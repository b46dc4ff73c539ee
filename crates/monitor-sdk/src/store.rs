//! Bounded, single-writer snapshot of live telemetry.
//!
//! [`TelemetryStore`] is held by the channel driver and the dispatcher; all
//! of its mutators are crate-private. Everything else reads through a
//! [`StoreReader`], which hands out clones and never a reference into the
//! live state.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use monitor_proto::{GoroutineTraceLive, RequestTraceLive, SystemStatsSnapshot};
use parking_lot::RwLock;
use time::OffsetDateTime;
use tokio::sync::watch;

/// Capacity of each recent-event buffer.
pub const RECENT_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }

    pub fn is_open(self) -> bool {
        self == ConnectionState::Open
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newest-first list with FIFO eviction from the tail. Entries are never
/// deduplicated: pushing the same logical entity twice stores it twice.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RecentBuffer<T> {
    pub fn new() -> Self {
        Self::with_capacity(RECENT_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub(crate) fn push_front(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> RecentBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for RecentBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of everything the store holds.
#[derive(Debug, Clone, Default)]
pub struct TelemetrySnapshot {
    pub connection: ConnectionState,
    pub last_error: Option<String>,
    pub last_updated: Option<OffsetDateTime>,
    pub stats: SystemStatsSnapshot,
    pub goroutines: RecentBuffer<GoroutineTraceLive>,
    pub requests: RecentBuffer<RequestTraceLive>,
}

struct Shared {
    state: RwLock<TelemetrySnapshot>,
    revision: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct TelemetryStore {
    shared: Arc<Shared>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(TelemetrySnapshot::default()),
                revision,
            }),
        }
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Applies one mutation under the write lock and publishes a new
    /// revision afterwards, so readers only ever see whole frames applied.
    pub(crate) fn apply<R>(&self, mutate: impl FnOnce(&mut TelemetrySnapshot) -> R) -> R {
        let result = {
            let mut state = self.shared.state.write();
            mutate(&mut state)
        };
        self.shared.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
        result
    }

    pub(crate) fn set_connection_state(&self, next: ConnectionState) {
        let changed = self.shared.state.read().connection != next;
        if changed {
            self.apply(|state| state.connection = next);
        }
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.apply(|state| state.last_error = Some(message));
    }

    pub(crate) fn mark_open(&self) {
        self.apply(|state| {
            state.connection = ConnectionState::Open;
            state.last_error = None;
        });
    }

    pub(crate) fn reset_connection(&self) {
        self.apply(|state| {
            state.connection = ConnectionState::Disconnected;
            state.last_error = None;
        });
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view over a [`TelemetryStore`].
#[derive(Clone)]
pub struct StoreReader {
    shared: Arc<Shared>,
}

impl StoreReader {
    pub fn connection_state(&self) -> ConnectionState {
        self.shared.state.read().connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_open()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.state.read().last_error.clone()
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        self.shared.state.read().last_updated
    }

    pub fn stats(&self) -> SystemStatsSnapshot {
        self.shared.state.read().stats.clone()
    }

    pub fn recent_goroutines(&self) -> Vec<GoroutineTraceLive> {
        self.shared.state.read().goroutines.to_vec()
    }

    pub fn recent_requests(&self) -> Vec<RequestTraceLive> {
        self.shared.state.read().requests.to_vec()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.shared.state.read().clone()
    }

    pub fn revision(&self) -> u64 {
        *self.shared.revision.borrow()
    }

    /// Receiver that wakes whenever the store is mutated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}
