use serde::{Deserialize, Serialize};

/// Structured access log entry, emitted once per proxied request via
/// [`log`] — the `tracing-subscriber` JSON formatter (wired in
/// `riptide-server`) turns this into a single structured log line.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub route_id: String,
    pub client_ip: String,
    pub method: String,
    pub uri: String,
    pub response_status: u16,
    pub latency_ms: f64,
    pub upstream_addr: Option<String>,
}

/// Emits `entry` as a single structured `tracing::info!` event.
pub fn log(entry: &AccessLogEntry) {
    tracing::info!(
        route_id = %entry.route_id,
        client_ip = %entry.client_ip,
        method = %entry.method,
        uri = %entry.uri,
        status = entry.response_status,
        latency_ms = entry.latency_ms,
        upstream_addr = entry.upstream_addr.as_deref().unwrap_or(""),
        "request complete"
    );
}
