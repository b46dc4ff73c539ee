use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::DecodeError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoroutineCounters {
    #[serde(default)]
    pub active_count: i64,
    #[serde(default)]
    pub total_count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCounters {
    #[serde(default)]
    pub total_requests: i64,
    #[serde(default)]
    pub active_requests: i64,
    #[serde(default)]
    pub completed_requests: i64,
    #[serde(default)]
    pub failed_requests: i64,
    #[serde(default)]
    pub success_rate: f64,
    #[serde(default)]
    pub average_latency: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemCounters {
    #[serde(default)]
    pub memory_usage: u64,
    #[serde(default)]
    pub cpu_usage: f64,
    #[serde(default)]
    pub uptime: i64,
    #[serde(default)]
    pub goroutine_count: i64,
    #[serde(default)]
    pub connections: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCounters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap_profile_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heap_alloc: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Latest aggregate counters pushed by the backend.
///
/// Every top-level section is independently optional. Updates are merged
/// shallowly: a section present in the update replaces the stored one
/// wholesale, an absent (or `null`) section leaves the stored one alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goroutine_stats: Option<GoroutineCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_stats: Option<RequestCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_stats: Option<SystemCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryCounters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
    /// Top-level sections this client has no typed shape for.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SystemStatsSnapshot {
    pub fn from_payload(data: &Value) -> Result<SystemStatsSnapshot, DecodeError> {
        if !data.is_object() {
            return Err(DecodeError::Payload {
                kind: "stats",
                reason: "payload must be an object".into(),
            });
        }
        serde_json::from_value(data.clone()).map_err(|err| DecodeError::Payload {
            kind: "stats",
            reason: err.to_string(),
        })
    }

    pub fn merge(&mut self, update: SystemStatsSnapshot) {
        if let Some(section) = update.goroutine_stats {
            self.goroutine_stats = Some(section);
        }
        if let Some(section) = update.request_stats {
            self.request_stats = Some(section);
        }
        if let Some(section) = update.system_stats {
            self.system_stats = Some(section);
        }
        if let Some(section) = update.memory {
            self.memory = Some(section);
        }
        if let Some(ts) = update.last_update {
            self.last_update = Some(ts);
        }
        for (key, section) in update.extra {
            if !section.is_null() {
                self.extra.insert(key, section);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.goroutine_stats.is_none()
            && self.request_stats.is_none()
            && self.system_stats.is_none()
            && self.memory.is_none()
            && self.extra.is_empty()
    }
}
