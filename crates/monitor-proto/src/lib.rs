//! Shared protocol definitions for the live monitor push channel and the
//! paginated query endpoints. Keeping this in a dedicated crate lets UI
//! layers and tooling depend on the shapes without pulling in the runtime.

pub mod envelope;
pub mod live;
pub mod query;
pub mod stats;

pub use envelope::{DecodeError, EventKind, InboundEnvelope, OutboundMessage, SubscriptionIntent};
pub use live::{coerce_status_code, GoroutineTraceLive, RequestTraceLive, TraceStatus};
pub use query::{
    GoroutineHistoryQuery, GoroutineList, GoroutineQuery, GoroutineScope, GoroutineTrace,
    HeapProfile, HeapProfileEntry, MonitorQuery, RequestHistoryQuery, RequestList, RequestQuery,
    RequestSearch, RequestSearchPage, RequestTrace, SystemInfo,
};
pub use stats::{
    GoroutineCounters, MemoryCounters, RequestCounters, SystemCounters, SystemStatsSnapshot,
};
