//! `all.*`: relay the call to everyone else in the caller's room.

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::dispatcher::MethodHandler;
use crate::errors::RpcError;
use crate::request::Request;

/// Re-sends the incoming call, minus its id, to the caller's room.
pub struct RoomBroadcastHandler;

#[async_trait]
impl MethodHandler for RoomBroadcastHandler {
    #[instrument(skip_all, fields(method = %request.method()))]
    async fn handle(&self, request: Request) -> Result<Value, RpcError> {
        let user = request
            .user()
            .ok_or_else(|| RpcError::application("session has no user"))?;
        let room = user
            .room()
            .ok_or_else(|| RpcError::application(format!("'{}' is not in a room", user.login())))?;

        let _ = room
            .broadcast(&request.to_notification(), Some(user.login()))
            .await;
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::handlers::test_helpers::{login, make_test_app};
    use crate::test_helpers::{make_session, recv_json};
    use crate::types::{Params, RpcRequest};
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test]
    async fn relays_to_others_only() {
        let (app, _rooms) = make_test_app();
        let (hermione, mut rh) = make_session();
        let (ron, mut rr) = make_session();
        let (ron_phone, mut rp) = make_session();
        login(&app, &hermione, "hermione").await;
        login(&app, &ron, "ron").await;
        login(&app, &ron_phone, "ron").await;

        let req = RpcRequest::new(
            2,
            "all.hello",
            Params::Positional(vec![json!("Everyone")]),
        );
        let resp = app.handle(Arc::clone(&hermione), req).await.unwrap();
        assert_eq!(resp.result, Some(Value::Null));

        let expected = json!({"jsonrpc": "2.0", "method": "all.hello", "params": ["Everyone"]});
        assert_eq!(recv_json(&mut rr).await, expected);
        assert_eq!(recv_json(&mut rp).await, expected);
        assert_eq!(rh.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn requires_authentication() {
        let (app, _rooms) = make_test_app();
        let (session, _rx) = make_session();
        let req = RpcRequest::new(1, "all.hello", Params::default());
        let resp = app.handle(session, req).await.unwrap();
        assert_eq!(resp.error.unwrap().message, "'all.hello' needs authentication");
    }

    #[tokio::test]
    async fn authenticated_without_user_is_an_error() {
        let (app, _rooms) = make_test_app();
        let (session, _rx) = make_session();
        session.authenticate();
        let req = RpcRequest::new(1, "all.x", Params::default());
        let resp = app.handle(session, req).await.unwrap();
        assert_eq!(resp.error.unwrap().message, "session has no user");
    }
}
