//! Live telemetry client for a process monitor backend.
//!
//! Responsibilities:
//! - keeping one push channel open with jittered reconnects
//! - decoding push frames and routing them into a bounded store
//! - exposing read-only snapshots and change notifications to UI layers
//! - issuing one-off paginated queries against the REST endpoints

pub mod backoff;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod paths;
pub mod query;
pub mod store;

pub use backoff::BackoffPolicy;
pub use channel::{ChannelConfig, ChannelManager, Connection, Connector, TransportEvent, WsConnector};
pub use config::{ClientConfig, LIVE_ENDPOINT};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{ChannelError, ClientSetupError, ConfigError, QueryError};
pub use paths::{ApiPaths, BuildMode, PageLocation, DEV_API_BASE};
pub use query::QueryClient;
pub use store::{
    ConnectionState, RecentBuffer, StoreReader, TelemetrySnapshot, TelemetryStore,
    RECENT_CAPACITY,
};

pub use monitor_proto as proto;
