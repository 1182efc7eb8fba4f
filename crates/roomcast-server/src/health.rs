//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current `WebSocket` connection count.
    pub connections: usize,
    /// Authenticated users across all rooms.
    pub users: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, users: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        users,
    }
}
