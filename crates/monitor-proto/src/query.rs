//! Shapes returned by (and parameters accepted by) the paginated query
//! endpoints. Parameter records serialize `None` fields away so they can be
//! passed straight to a query-string encoder.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::live::{deserialize_id, deserialize_status_code, TraceStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoroutineTrace {
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
    #[serde(default)]
    pub stack: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_logs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub last_heartbeat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_usage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoroutineList {
    #[serde(default)]
    pub data: Vec<GoroutineTrace>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTrace {
    #[serde(deserialize_with = "deserialize_id")]
    pub request_id: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub req_url: String,
    #[serde(default)]
    pub req_method: String,
    #[serde(default)]
    pub req_header: String,
    #[serde(default)]
    pub req_body: String,
    #[serde(default)]
    pub resp_header: String,
    #[serde(default, deserialize_with = "deserialize_status_code")]
    pub resp_status_code: u16,
    #[serde(default)]
    pub resp_body: String,
    #[serde(default)]
    pub latency: String,
    #[serde(default)]
    pub session_logs: String,
    #[serde(default)]
    pub is_websocket: String,
    #[serde(default)]
    pub call_stack: String,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub status: TraceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestList {
    #[serde(default)]
    pub data: Vec<RequestTrace>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSearchPage {
    #[serde(default)]
    pub data: Vec<RequestTrace>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default, rename = "pageSize", alias = "page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeapProfileEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub inuse_objects: i64,
    #[serde(default)]
    pub inuse_bytes: i64,
    #[serde(default)]
    pub alloc_objects: i64,
    #[serde(default)]
    pub alloc_bytes: i64,
    #[serde(default)]
    pub stack_trace: Vec<String>,
    #[serde(default)]
    pub top_function: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeapProfile {
    #[serde(default)]
    pub total_inuse_objects: i64,
    #[serde(default)]
    pub total_inuse_bytes: i64,
    #[serde(default)]
    pub total_alloc_objects: i64,
    #[serde(default)]
    pub total_alloc_bytes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<i64>,
    #[serde(default)]
    pub entries: Vec<HeapProfileEntry>,
}

/// Process and runtime description returned by `GET /system`. Sections are
/// kept loosely typed: their contents vary with the backend build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goroutines: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_info: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_stats: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goroutine_stats: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_stats: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoroutineScope {
    Active,
    History,
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoroutineQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scope: Option<GoroutineScope>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoroutineHistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestHistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Structured filter body for `POST /requests/search`. Time bounds are unix
/// seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSearch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, rename = "pageSize", skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MonitorQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_goroutines: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_requests: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_stats: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_body_uses_camel_case_page_size_and_skips_unset() {
        let search = RequestSearch {
            page: Some(2),
            page_size: Some(50),
            method: Some("POST".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&search).unwrap(),
            json!({"page": 2, "pageSize": 50, "method": "POST"})
        );
    }

    #[test]
    fn goroutine_scope_serializes_as_type() {
        let query = GoroutineQuery {
            scope: Some(GoroutineScope::History),
            limit: Some(20),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"limit": 20, "type": "history"})
        );
    }

    #[test]
    fn rest_request_trace_coerces_string_status() {
        let page: RequestSearchPage = serde_json::from_value(json!({
            "data": [{"request_id": "abc", "resp_status_code": "500", "status": "failed"}],
            "total": 1,
            "page": 1,
            "pageSize": 20
        }))
        .unwrap();
        assert_eq!(page.page_size, 20);
        assert_eq!(page.data[0].resp_status_code, 500);
        assert_eq!(page.data[0].status, TraceStatus::Failed);
    }

    #[test]
    fn search_page_accepts_backend_snake_case_page_size() {
        let page: RequestSearchPage = serde_json::from_value(json!({
            "data": [],
            "total": 120,
            "page": 2,
            "page_size": 50
        }))
        .unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, 50);
        assert_eq!(page.total, 120);
    }
}
