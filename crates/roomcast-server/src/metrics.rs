//! Prometheus metrics recorder and metric names.
//!
//! Request and broadcast names are recorded by `roomcast-rpc` and
//! re-exported here so `/metrics` has one catalogue.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

pub use roomcast_rpc::metrics::{
    ROOM_BROADCAST_FAILURES_TOTAL, ROOM_BROADCASTS_TOTAL, RPC_ERRORS_TOTAL,
    RPC_REQUEST_DURATION_SECONDS, RPC_REQUESTS_TOTAL,
};

/// Install the global Prometheus recorder.
///
/// Returns the handle used to render `/metrics`. Call once at startup.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// `WebSocket` connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// `WebSocket` disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active `WebSocket` connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connections refused at the limit (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Inbound frames rejected with a parse or invalid-request error (counter, labels: code).
pub const RPC_FRAME_ERRORS_TOTAL: &str = "rpc_frame_errors_total";
