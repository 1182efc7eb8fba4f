//! Per-call request object handed to handlers.

use std::sync::Arc;

use serde_json::Value;

use crate::entity::{Room, Session, User, UserDirectory};
use crate::types::{Params, RpcNotification};

/// One inbound call together with its caller.
#[derive(Clone, Debug)]
pub struct Request {
    id: Option<Value>,
    method: String,
    params: Params,
    session: Arc<Session>,
    directory: Arc<UserDirectory>,
}

impl Request {
    /// Build a request.
    pub fn new(
        id: Option<Value>,
        method: impl Into<String>,
        params: Params,
        session: Arc<Session>,
        directory: Arc<UserDirectory>,
    ) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            session,
            directory,
        }
    }

    /// Request id; `None` for notifications.
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// Whether the caller expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Full method name.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Part of the method after the first `.` (`all.hello` → `hello`).
    pub fn namespace_suffix(&self) -> Option<&str> {
        self.method.split_once('.').map(|(_, suffix)| suffix)
    }

    /// Call parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Calling session.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Calling user, once authenticated.
    pub fn user(&self) -> Option<Arc<User>> {
        self.session.user()
    }

    /// Caller's room, once authenticated.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.session.room()
    }

    /// App-wide user directory.
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// This call re-shaped as an id-less notification.
    pub fn to_notification(&self) -> RpcNotification {
        RpcNotification::new(self.method.clone(), self.params.clone())
    }
}
