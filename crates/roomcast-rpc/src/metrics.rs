//! Metric names recorded by the request engine and room broadcasts.

/// RPC requests total (counter, labels: method).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// RPC errors total (counter, labels: method, error_type).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// RPC request duration seconds (histogram).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
/// Room broadcasts total (counter).
pub const ROOM_BROADCASTS_TOTAL: &str = "room_broadcasts_total";
/// Broadcast deliveries that failed (counter).
pub const ROOM_BROADCAST_FAILURES_TOTAL: &str = "room_broadcast_failures_total";
