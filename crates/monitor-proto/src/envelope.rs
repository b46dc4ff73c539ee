use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Declared `type` of an inbound push frame.
///
/// The set is closed: anything the client does not recognise is kept as
/// [`EventKind::Unknown`] with the raw string so it can be logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stats,
    StatsUpdate,
    Goroutine,
    GoroutineUpdate,
    Request,
    RequestUpdate,
    Pong,
    Error,
    Unknown(String),
}

impl EventKind {
    pub fn parse(raw: &str) -> EventKind {
        match raw {
            "stats" => EventKind::Stats,
            "stats_update" => EventKind::StatsUpdate,
            "goroutine" => EventKind::Goroutine,
            "goroutine_update" => EventKind::GoroutineUpdate,
            "request" => EventKind::Request,
            "request_update" => EventKind::RequestUpdate,
            "pong" => EventKind::Pong,
            "error" => EventKind::Error,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Stats => "stats",
            EventKind::StatsUpdate => "stats_update",
            EventKind::Goroutine => "goroutine",
            EventKind::GoroutineUpdate => "goroutine_update",
            EventKind::Request => "request",
            EventKind::RequestUpdate => "request_update",
            EventKind::Pong => "pong",
            EventKind::Error => "error",
            EventKind::Unknown(raw) => raw.as_str(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid utf-8")]
    Utf8,
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    #[error("invalid {kind} payload: {reason}")]
    Payload { kind: &'static str, reason: String },
}

/// Outer wrapper carried by every push frame: `{type, data, timestamp?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<f64>,
}

impl InboundEnvelope {
    /// Decodes the envelope shape only; payload validation is left to the
    /// typed accessors on the individual records.
    pub fn decode(text: &str) -> Result<InboundEnvelope, DecodeError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Ok(InboundEnvelope {
            kind: EventKind::parse(&raw.kind),
            data: raw.data,
            timestamp: raw.timestamp.map(|ts| ts as i64),
        })
    }

    pub fn decode_bytes(bytes: &[u8]) -> Result<InboundEnvelope, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::Utf8)?;
        Self::decode(text)
    }
}

/// Which live categories the client wants pushed. The server keeps no
/// memory of this across connections, so it is resent on every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionIntent {
    pub subscribe_stats: bool,
    pub subscribe_goroutines: bool,
    pub subscribe_requests: bool,
}

impl SubscriptionIntent {
    pub const fn all() -> Self {
        Self {
            subscribe_stats: true,
            subscribe_goroutines: true,
            subscribe_requests: true,
        }
    }
}

impl Default for SubscriptionIntent {
    fn default() -> Self {
        Self::all()
    }
}

/// Client-to-server control messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OutboundMessage {
    Subscribe(SubscriptionIntent),
    Unsubscribe,
    GetStats,
    Ping,
}

impl OutboundMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
