//! # roomcast-server
//!
//! Transport side of roomcast.
//!
//! - Per-connection request multiplexer: concurrent handlers, completion-order results
//! - Frame validation and the JSON-RPC error frames for bad input
//! - Transport-independent connection loop with an on-close hook
//! - Axum `WebSocket` endpoint (`/rpc`), `/health`, and `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod health;
pub mod metrics;
pub mod multiplexer;
pub mod protocol;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use connection::{ConnectionLoop, Frame, LoopExit};
pub use multiplexer::{CompletionSink, Multiplexer};
pub use server::RoomcastServer;
pub use shutdown::ShutdownCoordinator;
