//! `authenticate`: verify a room token and attach the session to its user.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::dispatcher::MethodHandler;
use crate::errors::RpcError;
use crate::request::Request;
use crate::rooms::RoomRegistry;

/// `{room, token}` or `[room, token]`.
#[derive(Debug, Deserialize)]
struct AuthenticateParams {
    room: String,
    token: String,
}

/// Verify the caller's token against the room secret and join the room.
pub struct AuthenticateHandler {
    rooms: Arc<RoomRegistry>,
}

impl AuthenticateHandler {
    /// Handler bound to a room registry.
    pub fn new(rooms: Arc<RoomRegistry>) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl MethodHandler for AuthenticateHandler {
    #[instrument(skip_all, fields(method = "authenticate"))]
    async fn handle(&self, request: Request) -> Result<Value, RpcError> {
        let params: AuthenticateParams = request.params().decode()?;
        let (room, claims) = self.rooms.verify(&params.room, &params.token)?;

        let session = request.session();
        let user = room.join(&claims.login, session)?;
        let _ = user.store().insert("meta", serde_json::to_value(&claims)?);
        session.authenticate();

        info!(
            login = user.login(),
            room = room.name(),
            session = session.id(),
            "session authenticated"
        );
        Ok(Value::Null)
    }
}
