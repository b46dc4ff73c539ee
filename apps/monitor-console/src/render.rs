use std::fmt::Write as _;

use monitor_sdk::TelemetrySnapshot;
use serde::Serialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Compact multi-line view of the live store.
pub fn summary(snapshot: &TelemetrySnapshot) -> String {
    let mut out = String::new();
    let updated = snapshot
        .last_updated
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| "never".to_string());
    let _ = writeln!(out, "[{}] updated {}", snapshot.connection, updated);
    if let Some(error) = &snapshot.last_error {
        let _ = writeln!(out, "  error: {error}");
    }

    let stats = &snapshot.stats;
    if let Some(g) = &stats.goroutine_stats {
        let _ = writeln!(out, "  goroutines: {} active / {} total", g.active_count, g.total_count);
    }
    if let Some(r) = &stats.request_stats {
        let _ = writeln!(
            out,
            "  requests: {} total, {} active, {} failed, success {:.1}%",
            r.total_requests,
            r.active_requests,
            r.failed_requests,
            r.success_rate * 100.0
        );
    }
    if let Some(s) = &stats.system_stats {
        let _ = writeln!(
            out,
            "  system: mem {} B, cpu {:.1}%, uptime {}s",
            s.memory_usage, s.cpu_usage, s.uptime
        );
    }

    for g in snapshot.goroutines.iter() {
        let _ = writeln!(out, "  goroutine {} {} [{}]", g.id, g.name, g.status);
    }
    for r in snapshot.requests.iter() {
        let _ = writeln!(
            out,
            "  request {} {} {} -> {} [{}]",
            r.request_id, r.req_method, r.req_url, r.resp_status_code, r.status
        );
    }
    out
}

pub fn snapshot_json(snapshot: &TelemetrySnapshot) -> Value {
    json!({
        "connection": snapshot.connection.as_str(),
        "last_error": snapshot.last_error,
        "last_updated": snapshot.last_updated.and_then(|at| at.format(&Rfc3339).ok()),
        "stats": snapshot.stats,
        "goroutines": snapshot.goroutines.to_vec(),
        "requests": snapshot.requests.to_vec(),
    })
}
