//! Built-in method handlers.

use std::sync::Arc;

use crate::adapters::typed_fn;
use crate::dispatcher::{Access, Dispatcher};
use crate::rooms::RoomRegistry;

pub mod authenticate;
pub mod broadcast;
pub mod system;

/// Namespace whose calls are relayed to the rest of the caller's room.
pub const BROADCAST_NAMESPACE: &str = "all";

/// Register `authenticate`, `all.*`, `hello`, and `whoami`.
pub fn register_all(dispatcher: &mut Dispatcher, rooms: Arc<RoomRegistry>) {
    dispatcher.register(
        "authenticate",
        authenticate::AuthenticateHandler::new(rooms),
        Access::Public,
    );
    dispatcher.register_namespace(
        BROADCAST_NAMESPACE,
        broadcast::RoomBroadcastHandler,
        Access::Authenticated,
    );
    dispatcher.register("hello", typed_fn(system::hello), Access::Public);
    dispatcher.register("whoami", system::WhoAmIHandler, Access::Authenticated);
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use serde_json::json;

    use crate::app::App;
    use crate::dispatcher::Dispatcher;
    use crate::entity::{Session, UserDirectory};
    use crate::rooms::RoomRegistry;
    use crate::test_helpers::make_token;
    use crate::types::{Params, RpcRequest};

    pub const ROOM: &str = "harry";
    pub const SECRET: &str = "potter";

    /// App with every built-in handler and room `harry` / secret `potter`.
    pub fn make_test_app() -> (App, Arc<RoomRegistry>) {
        let directory = UserDirectory::new();
        let rooms = Arc::new(RoomRegistry::new(Arc::clone(&directory)));
        let _ = rooms.register_room(ROOM, SECRET);
        let mut dispatcher = Dispatcher::new();
        super::register_all(&mut dispatcher, Arc::clone(&rooms));
        (App::with_directory(dispatcher, directory), rooms)
    }

    /// `authenticate` call for `login` into the test room.
    pub fn auth_request(id: i64, login: &str) -> RpcRequest {
        let token = make_token(SECRET, &json!({"login": login}));
        let mut params = serde_json::Map::new();
        let _ = params.insert("room".into(), json!(ROOM));
        let _ = params.insert("token".into(), json!(token));
        RpcRequest::new(id, "authenticate", Params::Named(params))
    }

    /// Authenticate `session` as `login`, asserting success.
    pub async fn login(app: &App, session: &Arc<Session>, login: &str) {
        let resp = app
            .handle(Arc::clone(session), auth_request(0, login))
            .await
            .unwrap();
        assert!(resp.error.is_none(), "authenticate failed: {resp:?}");
    }
}
