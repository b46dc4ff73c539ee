//! Routes decoded push frames into the [`TelemetryStore`]. Each frame is
//! applied in one store mutation or not at all.

use monitor_proto::{
    DecodeError, EventKind, GoroutineTraceLive, InboundEnvelope, RequestTraceLive,
    SystemStatsSnapshot,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, error, trace, warn};

use crate::store::TelemetryStore;

/// What happened to a single inbound frame.
#[derive(Debug)]
pub enum DispatchOutcome {
    StatsMerged,
    GoroutineRecorded { id: String },
    RequestRecorded { id: String },
    ServerError { message: String },
    Pong,
    /// Well-formed envelope with a type this client does not handle.
    Ignored { kind: String },
    /// Malformed frame; nothing was applied.
    Rejected(DecodeError),
}

impl DispatchOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::StatsMerged
                | DispatchOutcome::GoroutineRecorded { .. }
                | DispatchOutcome::RequestRecorded { .. }
                | DispatchOutcome::ServerError { .. }
        )
    }
}

/// Decodes push frames and routes them to the store. It is the only
/// writer of telemetry fields.
#[derive(Clone)]
pub struct Dispatcher {
    store: TelemetryStore,
}

impl Dispatcher {
    pub fn new(store: TelemetryStore) -> Self {
        Self { store }
    }

    pub fn dispatch_text(&self, text: &str) -> DispatchOutcome {
        match InboundEnvelope::decode(text) {
            Ok(envelope) => self.dispatch(envelope),
            Err(err) => reject(err),
        }
    }

    pub fn dispatch_bytes(&self, bytes: &[u8]) -> DispatchOutcome {
        match InboundEnvelope::decode_bytes(bytes) {
            Ok(envelope) => self.dispatch(envelope),
            Err(err) => reject(err),
        }
    }

    pub fn dispatch(&self, envelope: InboundEnvelope) -> DispatchOutcome {
        trace!(
            target: "monitor.dispatch",
            kind = envelope.kind.as_str(),
            timestamp = ?envelope.timestamp,
            "inbound frame"
        );
        match envelope.kind {
            EventKind::Stats | EventKind::StatsUpdate => {
                match SystemStatsSnapshot::from_payload(&envelope.data) {
                    Ok(update) => {
                        self.store.apply(|state| {
                            state.stats.merge(update);
                            state.last_updated = Some(OffsetDateTime::now_utc());
                        });
                        DispatchOutcome::StatsMerged
                    }
                    Err(err) => reject(err),
                }
            }
            EventKind::Goroutine | EventKind::GoroutineUpdate => {
                match GoroutineTraceLive::from_payload(&envelope.data) {
                    Ok(goroutine) => {
                        let id = goroutine.id.clone();
                        self.store.apply(|state| {
                            state.goroutines.push_front(goroutine);
                            state.last_updated = Some(OffsetDateTime::now_utc());
                        });
                        DispatchOutcome::GoroutineRecorded { id }
                    }
                    Err(err) => reject(err),
                }
            }
            EventKind::Request | EventKind::RequestUpdate => {
                match RequestTraceLive::from_payload(&envelope.data) {
                    Ok(request) => {
                        let id = request.request_id.clone();
                        self.store.apply(|state| {
                            state.requests.push_front(request);
                            state.last_updated = Some(OffsetDateTime::now_utc());
                        });
                        DispatchOutcome::RequestRecorded { id }
                    }
                    Err(err) => reject(err),
                }
            }
            EventKind::Pong => {
                debug!(target: "monitor.dispatch", "pong");
                DispatchOutcome::Pong
            }
            EventKind::Error => {
                let message = server_error_message(&envelope.data);
                warn!(target: "monitor.dispatch", error = %message, "server reported error");
                let rendered = format!("server error: {message}");
                self.store.apply(|state| {
                    state.last_error = Some(rendered);
                    state.last_updated = Some(OffsetDateTime::now_utc());
                });
                DispatchOutcome::ServerError { message }
            }
            EventKind::Unknown(kind) => {
                warn!(target: "monitor.dispatch", kind = %kind, "unknown message type");
                DispatchOutcome::Ignored { kind }
            }
        }
    }
}

fn reject(err: DecodeError) -> DispatchOutcome {
    error!(target: "monitor.dispatch", error = %err, "failed to decode push frame");
    DispatchOutcome::Rejected(err)
}

fn server_error_message(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        Value::Object(obj) => obj
            .get("message")
            .or_else(|| obj.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}
