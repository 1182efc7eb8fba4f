//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::entity::Session;

/// Session backed by an in-memory queue.
pub fn make_session() -> (Arc<Session>, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(64);
    (Session::new(tx), rx)
}

/// Next queued frame parsed as JSON.
pub async fn recv_json(rx: &mut mpsc::Receiver<String>) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("channel closed");
    serde_json::from_str(&frame).expect("frame is not JSON")
}

/// HS256 token with the given claims.
pub fn make_token(secret: &str, claims: &Value) -> String {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode token")
}
