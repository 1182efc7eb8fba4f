//! `RoomcastServer` - Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use roomcast_rpc::{App, Session};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::connection::{ConnectionLoop, OnClose};
use crate::health::{self, HealthResponse};
use crate::metrics::WS_CONNECTIONS_REJECTED_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Request engine.
    pub app: Arc<App>,
    /// Per-connection loop template (app + on-close hook).
    pub looper: ConnectionLoop,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Live `WebSocket` connections.
    pub connections: Arc<AtomicUsize>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// Decrements the live connection count when dropped.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn acquire(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The roomcast server.
pub struct RoomcastServer {
    config: Arc<ServerConfig>,
    app: Arc<App>,
    on_close: OnClose,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    connections: Arc<AtomicUsize>,
    start_time: Instant,
}

impl RoomcastServer {
    /// Create a server over `app`.
    ///
    /// Ended connections run [`Session::close`], which releases the
    /// session's user.
    pub fn new(config: ServerConfig, app: App) -> Self {
        Self {
            config: Arc::new(config),
            app: Arc::new(app),
            on_close: Arc::new(|session: &Arc<Session>| session.close()),
            metrics: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            connections: Arc::new(AtomicUsize::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Run `hook` with each session once its connection ends, in place of
    /// [`Session::close`].
    ///
    /// A session links to its user and back; `hook` must still call
    /// `Session::close` or both stay alive along with the room membership.
    #[must_use]
    pub fn with_on_close(mut self, hook: OnClose) -> Self {
        self.on_close = hook;
        self
    }

    /// Serve `/metrics` from this handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let looper =
            ConnectionLoop::new(Arc::clone(&self.app)).on_close(Arc::clone(&self.on_close));
        let state = AppState {
            app: Arc::clone(&self.app),
            looper,
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            connections: Arc::clone(&self.connections),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/rpc", get(ws_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve in the background until
    /// shutdown. Returns the bound address and the server task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, "roomcast listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Request engine.
    pub fn app(&self) -> &Arc<App> {
        &self.app
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Live `WebSocket` connections.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.connections.load(Ordering::Acquire),
        state.app.directory().len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /rpc: upgrade to a JSON-RPC `WebSocket`.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let max = state.config.max_connections;
    let Some(slot) = ConnectionSlot::acquire(&state.connections, max) else {
        warn!(max, "connection limit reached");
        counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _slot = slot;
            let _ = run_ws_session(
                socket,
                state.looper.clone(),
                &state.config,
                state.shutdown.token(),
            )
            .await;
        })
}
