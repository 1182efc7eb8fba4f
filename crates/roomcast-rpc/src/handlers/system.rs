//! Small utility methods: `hello`, `whoami`.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::dispatcher::MethodHandler;
use crate::errors::RpcError;
use crate::request::Request;

/// `hello ["name"]` → `"Hello name"`.
pub async fn hello((name,): (String,)) -> Result<String, RpcError> {
    Ok(format!("Hello {name}"))
}

/// Identity of the calling session.
pub struct WhoAmIHandler;

#[async_trait]
impl MethodHandler for WhoAmIHandler {
    async fn handle(&self, request: Request) -> Result<Value, RpcError> {
        let user = request.user();
        Ok(json!({
            "login": user.as_ref().map(|u| u.login().to_owned()),
            "room": request.room().map(|r| r.name().to_owned()),
            "session": request.session().id(),
        }))
    }
}
