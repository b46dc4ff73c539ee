use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::envelope::DecodeError;

/// Lifecycle status shared by goroutine and request traces.
///
/// The backend is not consistent about casing (`running`, `Active`,
/// `completed`, `Completed`), so parsing is case-insensitive and anything
/// unrecognised is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TraceStatus {
    Active,
    Completed,
    Failed,
    Blocked,
    Waiting,
    Other(String),
}

impl TraceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TraceStatus::Active => "active",
            TraceStatus::Completed => "completed",
            TraceStatus::Failed => "failed",
            TraceStatus::Blocked => "blocked",
            TraceStatus::Waiting => "waiting",
            TraceStatus::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TraceStatus::Completed | TraceStatus::Failed)
    }
}

impl Default for TraceStatus {
    fn default() -> Self {
        TraceStatus::Other(String::new())
    }
}

impl From<String> for TraceStatus {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "active" | "running" => TraceStatus::Active,
            "completed" => TraceStatus::Completed,
            "failed" => TraceStatus::Failed,
            "blocked" => TraceStatus::Blocked,
            "waiting" => TraceStatus::Waiting,
            _ => TraceStatus::Other(raw),
        }
    }
}

impl From<TraceStatus> for String {
    fn from(status: TraceStatus) -> Self {
        match status {
            TraceStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coerces a status code that may arrive as a number or a string into an
/// integer. Leading whitespace and a leading sign are accepted, trailing
/// garbage is ignored; anything without leading digits, negative, or out of
/// range becomes `0`.
pub fn coerce_status_code(value: &Value) -> u16 {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return 0,
    };
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() || negative {
        return 0;
    }
    digits.parse::<u16>().unwrap_or(0)
}

pub(crate) fn deserialize_status_code<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_status_code(&value))
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

fn require_object_with<'a>(
    data: &'a Value,
    kind: &'static str,
    key: &str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    let obj = data.as_object().ok_or_else(|| DecodeError::Payload {
        kind,
        reason: "payload must be an object".into(),
    })?;
    if obj.get(key).map_or(true, Value::is_null) {
        return Err(DecodeError::Payload {
            kind,
            reason: format!("missing `{key}`"),
        });
    }
    Ok(obj)
}

/// A goroutine event as pushed over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoroutineTraceLive {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: TraceStatus,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, alias = "stack_trace", skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GoroutineTraceLive {
    pub fn from_payload(data: &Value) -> Result<GoroutineTraceLive, DecodeError> {
        require_object_with(data, "goroutine", "id")?;
        serde_json::from_value(data.clone()).map_err(|err| DecodeError::Payload {
            kind: "goroutine",
            reason: err.to_string(),
        })
    }
}

/// An HTTP request event as pushed over the live channel, normalized on
/// arrival (status code is always an integer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTraceLive {
    #[serde(deserialize_with = "deserialize_id")]
    pub request_id: String,
    #[serde(default)]
    pub req_method: String,
    #[serde(default)]
    pub req_url: String,
    #[serde(default, deserialize_with = "deserialize_status_code")]
    pub resp_status_code: u16,
    #[serde(default)]
    pub status: TraceStatus,
    #[serde(default)]
    pub ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestTraceLive {
    pub fn from_payload(data: &Value) -> Result<RequestTraceLive, DecodeError> {
        require_object_with(data, "request", "request_id")?;
        serde_json::from_value(data.clone()).map_err(|err| DecodeError::Payload {
            kind: "request",
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_status_codes() {
        assert_eq!(coerce_status_code(&json!("404")), 404);
        assert_eq!(coerce_status_code(&json!(200)), 200);
        assert_eq!(coerce_status_code(&json!("abc")), 0);
        assert_eq!(coerce_status_code(&json!(" 502 Bad Gateway")), 502);
        assert_eq!(coerce_status_code(&json!(201.7)), 201);
        assert_eq!(coerce_status_code(&json!("")), 0);
        assert_eq!(coerce_status_code(&json!("-1")), 0);
        assert_eq!(coerce_status_code(&json!("99999")), 0);
        assert_eq!(coerce_status_code(&Value::Null), 0);
        assert_eq!(coerce_status_code(&json!(true)), 0);
    }

    #[test]
    fn request_payload_is_normalized() {
        let req = RequestTraceLive::from_payload(&json!({
            "request_id": "r-1",
            "req_method": "GET",
            "req_url": "/api/items",
            "resp_status_code": "404",
            "status": "Completed",
            "ip": "10.0.0.1",
            "latency": "12ms",
            "start_time": 1700000000,
            "req_header": "{}"
        }))
        .expect("decode");
        assert_eq!(req.resp_status_code, 404);
        assert_eq!(req.status, TraceStatus::Completed);
        assert_eq!(req.extra.get("req_header"), Some(&json!("{}")));
    }

    #[test]
    fn missing_status_code_defaults_to_zero() {
        let req = RequestTraceLive::from_payload(&json!({"request_id": "r-2"})).unwrap();
        assert_eq!(req.resp_status_code, 0);
    }

    #[test]
    fn goroutine_payload_accepts_numeric_ids_and_stack_alias() {
        let g = GoroutineTraceLive::from_payload(&json!({
            "id": 42,
            "name": "worker",
            "status": "running",
            "stack_trace": "main.go:10"
        }))
        .unwrap();
        assert_eq!(g.id, "42");
        assert_eq!(g.status, TraceStatus::Active);
        assert_eq!(g.stack.as_deref(), Some("main.go:10"));
    }

    #[test]
    fn rejects_payloads_without_identity() {
        assert!(GoroutineTraceLive::from_payload(&json!({"name": "x"})).is_err());
        assert!(GoroutineTraceLive::from_payload(&json!("g1")).is_err());
        assert!(RequestTraceLive::from_payload(&json!({"request_id": null})).is_err());
        assert!(RequestTraceLive::from_payload(&json!([1])).is_err());
    }

    #[test]
    fn unknown_status_is_preserved() {
        let status = TraceStatus::from("Sleeping".to_string());
        assert_eq!(status, TraceStatus::Other("Sleeping".into()));
        assert_eq!(String::from(status), "Sleeping");
    }
}
