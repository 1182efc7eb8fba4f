//! Inbound side of a `WebSocket`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;

use crate::connection::Frame;

/// Last time anything arrived from the peer.
#[derive(Debug)]
pub struct Liveness {
    last_seen: Mutex<Instant>,
}

impl Liveness {
    /// Start tracking from now.
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(Instant::now()),
        }
    }

    /// Record inbound activity.
    pub fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn idle(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Map socket messages to frames.
///
/// Ping/Pong only refresh liveness. A Close message ends the stream.
/// Socket errors are passed through as the stream's error item.
pub fn ws_frames<S, E>(
    messages: S,
    liveness: Arc<Liveness>,
) -> impl Stream<Item = Result<Frame, E>> + Send
where
    S: Stream<Item = Result<Message, E>> + Send + Unpin,
    E: Send,
{
    futures::stream::unfold(messages, move |mut messages| {
        let liveness = Arc::clone(&liveness);
        async move {
            loop {
                let message = messages.next().await?;
                liveness.touch();
                let frame = match message {
                    Ok(Message::Text(text)) => Ok(Frame::Text(text.as_str().to_owned())),
                    Ok(Message::Binary(data)) => Ok(Frame::Binary(data.to_vec())),
                    Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                    Ok(Message::Close(_)) => return None,
                    Err(e) => Err(e),
                };
                return Some((frame, messages));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn collect(messages: Vec<Result<Message, String>>) -> Vec<Result<Frame, String>> {
        let liveness = Arc::new(Liveness::new());
        futures::executor::block_on(ws_frames(futures::stream::iter(messages), liveness).collect())
    }

    #[test]
    fn text_and_binary_pass_through() {
        let frames = collect(vec![
            Ok(Message::Text("hi".into())),
            Ok(Message::Binary(Bytes::from_static(b"{}"))),
        ]);
        assert_eq!(
            frames,
            vec![Ok(Frame::Text("hi".into())), Ok(Frame::Binary(b"{}".to_vec()))]
        );
    }

    #[test]
    fn control_frames_are_skipped() {
        let frames = collect(vec![
            Ok(Message::Ping(Bytes::new())),
            Ok(Message::Pong(Bytes::new())),
            Ok(Message::Text("x".into())),
        ]);
        assert_eq!(frames, vec![Ok(Frame::Text("x".into()))]);
    }

    #[test]
    fn close_ends_stream() {
        let frames = collect(vec![
            Ok(Message::Text("a".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("b".into())),
        ]);
        assert_eq!(frames, vec![Ok(Frame::Text("a".into()))]);
    }

    #[test]
    fn errors_pass_through() {
        let frames = collect(vec![Err("reset".into())]);
        assert_eq!(frames, vec![Err("reset".to_owned())]);
    }

    #[test]
    fn liveness_resets_on_touch() {
        let liveness = Liveness::new();
        std::thread::sleep(Duration::from_millis(20));
        assert!(liveness.idle() >= Duration::from_millis(20));
        liveness.touch();
        assert!(liveness.idle() < Duration::from_millis(20));
    }
}
