//! Axum `WebSocket` transport.
//!
//! - `frames`: socket messages → [`Frame`](crate::connection::Frame) stream, liveness tracking
//! - `session`: per-socket writer task, heartbeat, and the connection loop

pub mod frames;
pub mod session;

pub use frames::{Liveness, ws_frames};
pub use session::run_ws_session;
