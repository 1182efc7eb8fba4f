//! Per-connection `WebSocket` lifecycle.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use roomcast_rpc::Session;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::frames::{Liveness, ws_frames};
use crate::config::ServerConfig;
use crate::connection::{ConnectionLoop, LoopExit};
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};

/// How long the writer gets to flush queued frames after the loop ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Serve one upgraded socket until it closes.
///
/// 1. Split the socket; spawn the writer (queued frames, pings, Close)
/// 2. Run the connection loop over the inbound half
/// 3. Let the writer flush, then record the disconnect
#[instrument(skip_all, fields(session))]
pub async fn run_ws_session(
    socket: WebSocket,
    looper: ConnectionLoop,
    config: &ServerConfig,
    shutdown: CancellationToken,
) -> LoopExit {
    let (mut ws_tx, ws_rx) = socket.split();
    let (send_tx, mut send_rx) = mpsc::channel::<String>(config.outbound_queue.max(1));
    let session = Session::new(send_tx);
    let _ = tracing::Span::current().record("session", session.id());

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
    debug!("websocket connected");

    let liveness = Arc::new(Liveness::new());
    let closed = session.closed_token();

    let writer = {
        let closed = closed.clone();
        let liveness = Arc::clone(&liveness);
        let ping_interval = config.ping_interval().max(Duration::from_secs(1));
        let pong_timeout = config.pong_timeout();
        tokio::spawn(async move {
            let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
            ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    queued = send_rx.recv() => {
                        let Some(text) = queued else { break };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            debug!("socket write failed");
                            break;
                        }
                    }
                    () = closed.cancelled() => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    _ = ping.tick() => {
                        if liveness.idle() > pong_timeout {
                            let idle_secs = liveness.idle().as_secs();
                            warn!(idle_secs, "peer unresponsive, closing");
                            break;
                        }
                        if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            closed.cancel();
        })
    };

    let watcher = {
        let session = Arc::clone(&session);
        let closed = closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => session.close_transport(),
                () = closed.cancelled() => {}
            }
        })
    };

    let exit = looper.run(Arc::clone(&session), ws_frames(ws_rx, liveness)).await;

    watcher.abort();
    let writer_abort = writer.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        debug!("writer did not drain in time");
        writer_abort.abort();
    }

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    debug!(exit = ?exit, "websocket disconnected");
    exit
}
