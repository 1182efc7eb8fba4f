//! Transport-independent connection loop.
//!
//! Reads frames, answers bad input with JSON-RPC error frames, submits
//! calls to a per-connection [`Multiplexer`], and tears everything down in
//! a fixed order on exit: multiplexer, transport, on-close hook. The hook
//! only runs once every aborted call has stopped, so no handler can link
//! the session to a user after the hook has released it.

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use metrics::counter;
use roomcast_rpc::{App, RpcResponse, Session};
use tracing::{debug, info, instrument, warn};

use crate::metrics::RPC_FRAME_ERRORS_TOTAL;
use crate::multiplexer::{CompletionSink, Multiplexer};
use crate::protocol::{self, Inbound};

/// One inbound transport frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Text frame.
    Text(String),
    /// Binary frame, expected to hold UTF-8 JSON.
    Binary(Vec<u8>),
}

/// Why a connection loop ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// The peer closed the transport.
    TransportClosed,
    /// The session was closed from our side (handler or shutdown).
    SessionClosed,
    /// The transport failed.
    TransportError(String),
}

/// Callback run once per connection after teardown.
pub type OnClose = Arc<dyn Fn(&Arc<Session>) + Send + Sync>;

/// Hands finished responses to the session's transport.
struct SessionSink {
    session: Arc<Session>,
}

#[async_trait]
impl CompletionSink<Option<RpcResponse>> for SessionSink {
    async fn deliver(&self, item: Option<RpcResponse>) {
        let Some(response) = item else { return };
        if let Err(e) = self.session.send_message(&response).await {
            debug!(session = self.session.id(), error = %e, "response dropped");
        }
    }
}

/// Drives one session from its inbound frame stream.
#[derive(Clone)]
pub struct ConnectionLoop {
    app: Arc<App>,
    on_close: Option<OnClose>,
}

impl ConnectionLoop {
    /// Loop dispatching into `app`.
    pub fn new(app: Arc<App>) -> Self {
        Self { app, on_close: None }
    }

    /// Run `hook` with the session after every connection ends.
    #[must_use]
    pub fn on_close(mut self, hook: OnClose) -> Self {
        self.on_close = Some(hook);
        self
    }

    /// Serve `session` until the stream ends, fails, or the session closes.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub async fn run<S, E>(&self, session: Arc<Session>, frames: S) -> LoopExit
    where
        S: Stream<Item = Result<Frame, E>> + Send,
        E: Display + Send,
    {
        let mut frames = std::pin::pin!(frames);
        let closed = session.closed_token();
        let mut mux = Multiplexer::auto_draining(SessionSink {
            session: Arc::clone(&session),
        });

        let exit = loop {
            let next = tokio::select! {
                biased;
                () = closed.cancelled() => break LoopExit::SessionClosed,
                next = frames.next() => next,
            };

            let frame = match next {
                None => break LoopExit::TransportClosed,
                Some(Err(e)) => {
                    let detail = e.to_string();
                    warn!(error = %detail, "transport error");
                    let _ = session
                        .send_message(&RpcResponse::internal_error(detail.clone()))
                        .await;
                    break LoopExit::TransportError(detail);
                }
                Some(Ok(frame)) => frame,
            };

            let decoded = match &frame {
                Frame::Text(text) => protocol::decode_text(text),
                Frame::Binary(bytes) => protocol::decode_binary(bytes),
            };

            match decoded {
                Ok(Inbound::Call(request)) => {
                    let app = Arc::clone(&self.app);
                    let session = Arc::clone(&session);
                    mux.submit(async move { app.handle(session, request).await });
                }
                Ok(Inbound::Reply(_)) => debug!("ignoring client reply frame"),
                Err(err) => {
                    debug!(error = %err, "rejected frame");
                    counter!(RPC_FRAME_ERRORS_TOTAL, "code" => err.code().to_string()).increment(1);
                    if session.send_message(&err.to_response()).await.is_err() {
                        break LoopExit::SessionClosed;
                    }
                }
            }
        };

        mux.shutdown().await;
        if !session.is_closed() {
            session.close_transport();
        }
        if let Some(hook) = &self.on_close {
            hook(&session);
        }
        info!(exit = ?exit, "connection loop finished");
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomcast_rpc::adapters::handler_fn;
    use roomcast_rpc::{Access, Dispatcher, Request, Room, UserDirectory};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    type FrameResult = Result<Frame, String>;

    fn test_app() -> Arc<App> {
        let mut d = Dispatcher::new();
        d.register(
            "sleep",
            handler_fn(|req: Request| async move {
                let ms = req.params().positional(0).and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(ms))
            }),
            Access::Public,
        );
        d.register(
            "quit",
            handler_fn(|req: Request| async move {
                req.session().close_transport();
                Ok(Value::Null)
            }),
            Access::Public,
        );
        Arc::new(App::new(d))
    }

    struct Harness {
        frames: mpsc::Sender<FrameResult>,
        out: mpsc::Receiver<String>,
        session: Arc<Session>,
        task: tokio::task::JoinHandle<LoopExit>,
    }

    fn start(looper: ConnectionLoop) -> Harness {
        let (frame_tx, frame_rx) = mpsc::channel::<FrameResult>(16);
        let (out_tx, out) = mpsc::channel(16);
        let session = Session::new(out_tx);
        let task = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { looper.run(session, ReceiverStream::new(frame_rx)).await })
        };
        Harness {
            frames: frame_tx,
            out,
            session,
            task,
        }
    }

    async fn send_text(h: &Harness, text: &str) {
        h.frames.send(Ok(Frame::Text(text.into()))).await.unwrap();
    }

    async fn next_json(h: &mut Harness) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(5), h.out.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn parse_error_keeps_loop_alive() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, "{oops").await;
        let v = next_json(&mut h).await;
        assert_eq!(v["error"]["code"], -32700);
        assert_eq!(v["id"], Value::Null);

        send_text(&h, r#"{"jsonrpc":"2.0","id":1,"method":"sleep","params":[0]}"#).await;
        let v = next_json(&mut h).await;
        assert_eq!(v["id"], 1);
        assert_eq!(v["result"], 0);
    }

    #[tokio::test]
    async fn invalid_request_frame() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, r#"{"jsonrpc":"2.0","id":1}"#).await;
        let v = next_json(&mut h).await;
        assert_eq!(v["error"]["code"], -32600);
        assert_eq!(v["error"]["data"], "Method is mandatory");
    }

    #[tokio::test]
    async fn reply_frames_are_ignored() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, r#"{"jsonrpc":"2.0","id":9,"result":"ok"}"#).await;
        send_text(&h, r#"{"jsonrpc":"2.0","id":2,"method":"sleep","params":[0]}"#).await;
        assert_eq!(next_json(&mut h).await["id"], 2);
    }

    #[tokio::test]
    async fn notifications_produce_no_frames() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, r#"{"jsonrpc":"2.0","method":"sleep","params":[0]}"#).await;
        send_text(&h, r#"{"jsonrpc":"2.0","method":"missing"}"#).await;
        send_text(&h, r#"{"jsonrpc":"2.0","id":3,"method":"sleep","params":[20]}"#).await;
        assert_eq!(next_json(&mut h).await["id"], 3);
    }

    #[tokio::test]
    async fn fast_response_overtakes_slow() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, r#"{"jsonrpc":"2.0","id":"slow","method":"sleep","params":[500]}"#).await;
        send_text(&h, r#"{"jsonrpc":"2.0","id":"fast","method":"sleep","params":[0]}"#).await;
        assert_eq!(next_json(&mut h).await["id"], "fast");
        assert_eq!(next_json(&mut h).await["id"], "slow");
    }

    #[tokio::test]
    async fn stream_end_runs_teardown_and_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        let looper = ConnectionLoop::new(test_app()).on_close(Arc::new(move |_s: &Arc<Session>| {
            let _ = hook_calls.fetch_add(1, Ordering::SeqCst);
        }));
        let h = start(looper);
        drop(h.frames);
        assert_eq!(h.task.await.unwrap(), LoopExit::TransportClosed);
        assert!(h.session.is_closed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_sends_internal_error_and_stops() {
        let mut h = start(ConnectionLoop::new(test_app()));
        h.frames.send(Err("socket reset".into())).await.unwrap();
        let v = next_json(&mut h).await;
        assert_eq!(v["error"]["code"], -32603);
        assert_eq!(v["error"]["data"], "socket reset");
        assert_eq!(
            h.task.await.unwrap(),
            LoopExit::TransportError("socket reset".into())
        );
    }

    #[tokio::test]
    async fn closing_session_ends_loop_and_cancels_work() {
        let mut h = start(ConnectionLoop::new(test_app()));
        send_text(&h, r#"{"jsonrpc":"2.0","id":1,"method":"sleep","params":[60000]}"#).await;
        send_text(&h, r#"{"jsonrpc":"2.0","method":"quit"}"#).await;
        let exit = tokio::time::timeout(Duration::from_secs(5), &mut h.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, LoopExit::SessionClosed);
        assert!(h.out.try_recv().is_err());
    }

    #[tokio::test]
    async fn hook_can_close_session() {
        let looper =
            ConnectionLoop::new(test_app()).on_close(Arc::new(|s: &Arc<Session>| s.close()));
        let h = start(looper);
        h.session.authenticate();
        drop(h.frames);
        let _ = h.task.await.unwrap();
        assert!(!h.session.is_authenticated());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn disconnect_mid_join_leaves_no_member_behind() {
        let directory = UserDirectory::new();
        let room = Room::new("harry", Arc::clone(&directory));
        let mut d = Dispatcher::new();
        {
            let room = Arc::clone(&room);
            d.register(
                "slow_join",
                handler_fn(move |req: Request| {
                    let room = Arc::clone(&room);
                    async move {
                        std::thread::sleep(Duration::from_millis(200));
                        let _ = room.join("ghost", req.session())?;
                        req.session().authenticate();
                        Ok(Value::Null)
                    }
                }),
                Access::Public,
            );
        }
        let app = Arc::new(App::with_directory(d, Arc::clone(&directory)));
        let looper = ConnectionLoop::new(app).on_close(Arc::new(|s: &Arc<Session>| s.close()));

        let h = start(looper);
        send_text(&h, r#"{"jsonrpc":"2.0","id":1,"method":"slow_join"}"#).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(h.frames);

        let exit = tokio::time::timeout(Duration::from_secs(5), h.task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, LoopExit::TransportClosed);
        assert!(room.is_empty(), "members left: {:?}", room.logins());
        assert!(directory.is_empty());
        assert!(h.session.user().is_none());
        assert!(!h.session.is_authenticated());
    }
}
