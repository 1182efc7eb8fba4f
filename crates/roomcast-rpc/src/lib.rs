//! # roomcast-rpc
//!
//! JSON-RPC 2.0 engine for authenticated, room-scoped real-time messaging.
//!
//! - Wire types and error codes ([`types`], [`errors`])
//! - Method dispatch with exact and namespace resolution ([`dispatcher`])
//! - Session / User / Room entity graph with broadcast fan-out ([`entity`])
//! - The request engine that turns an inbound call into at most one response ([`app`])
//! - Room registry with HS256 token verification ([`rooms`], [`auth`])
//! - Built-in methods: `authenticate`, `all.*`, `hello`, `whoami` ([`handlers`])
//! - Metric names for requests and broadcasts ([`metrics`])
//!
//! Transport concerns (framing, sockets, multiplexing) live in `roomcast-server`.

#![deny(unsafe_code)]

pub mod adapters;
pub mod app;
pub mod auth;
pub mod dispatcher;
pub mod entity;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod request;
pub mod rooms;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use app::App;
pub use dispatcher::{Access, Dispatcher, MethodHandler};
pub use entity::{Room, Session, Store, User, UserDirectory};
pub use errors::RpcError;
pub use request::Request;
pub use rooms::RoomRegistry;
pub use types::{Params, RpcErrorBody, RpcNotification, RpcRequest, RpcResponse};
