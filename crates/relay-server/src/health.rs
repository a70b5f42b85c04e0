//! `/health` endpoint.

use std::time::Instant;

use relay_device::ReaderState;
use relay_hub::HubStats;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` once the device reader has failed.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Device reader state (`open`, `streaming`, `failed`, ...).
    pub device_state: String,
    /// Readings published since start.
    pub published: u64,
    /// Readings dropped from slow client queues since start.
    pub dropped: u64,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, stats: HubStats, device: &ReaderState) -> HealthResponse {
    let status = if device.is_terminal() { "degraded" } else { "ok" };
    HealthResponse {
        status: status.into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections,
        device_state: device.as_str().into(),
        published: stats.published,
        dropped: stats.dropped,
    }
}
