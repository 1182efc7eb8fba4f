//! Administrative registry of rooms and their verification secrets.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::auth::{AuthError, Claims, TokenVerifier};
use crate::entity::{Room, UserDirectory};

struct RegisteredRoom {
    room: Arc<Room>,
    verifier: TokenVerifier,
}

/// Rooms clients may authenticate into.
pub struct RoomRegistry {
    directory: Arc<UserDirectory>,
    rooms: RwLock<HashMap<String, RegisteredRoom>>,
}

impl RoomRegistry {
    /// Create an empty registry whose rooms share `directory`.
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self {
            directory,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Create (or replace the secret of) a room.
    pub fn register_room(&self, name: &str, secret: &str) -> Arc<Room> {
        let verifier = TokenVerifier::hs256(secret.as_bytes());
        let mut rooms = self.rooms.write();
        if let Some(existing) = rooms.get_mut(name) {
            existing.verifier = verifier;
            info!(room = name, "room secret replaced");
            return Arc::clone(&existing.room);
        }
        let room = Room::new(name, Arc::clone(&self.directory));
        let _ = rooms.insert(
            name.to_owned(),
            RegisteredRoom {
                room: Arc::clone(&room),
                verifier,
            },
        );
        info!(room = name, "room registered");
        room
    }

    /// Room by name.
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(name).map(|r| Arc::clone(&r.room))
    }

    /// Registered room names (sorted).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.read().len()
    }

    /// Whether no rooms are registered.
    pub fn is_empty(&self) -> bool {
        self.rooms.read().is_empty()
    }

    /// Shared user directory.
    pub fn directory(&self) -> &Arc<UserDirectory> {
        &self.directory
    }

    /// Verify `token` against the secret of `room`.
    pub fn verify(&self, room: &str, token: &str) -> Result<(Arc<Room>, Claims), AuthError> {
        let rooms = self.rooms.read();
        let registered = rooms
            .get(room)
            .ok_or_else(|| AuthError::UnknownRoom(room.to_owned()))?;
        let claims = registered.verifier.verify(token)?;
        Ok((Arc::clone(&registered.room), claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_token;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn register_and_verify() {
        let registry = RoomRegistry::new(UserDirectory::new());
        let room = registry.register_room("harry", "potter");
        let (found, claims) = registry
            .verify("harry", &make_token("potter", &json!({"login": "hermione"})))
            .unwrap();
        assert!(Arc::ptr_eq(&room, &found));
        assert_eq!(claims.login, "hermione");
    }

    #[test]
    fn unknown_room() {
        let registry = RoomRegistry::new(UserDirectory::new());
        assert_matches!(
            registry.verify("nope", "x"),
            Err(AuthError::UnknownRoom(name)) if name == "nope"
        );
    }

    #[test]
    fn reregister_keeps_room_but_swaps_secret() {
        let registry = RoomRegistry::new(UserDirectory::new());
        let first = registry.register_room("harry", "potter");
        let second = registry.register_room("harry", "granger");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);

        let old = make_token("potter", &json!({"login": "ron"}));
        assert!(registry.verify("harry", &old).is_err());
        let new = make_token("granger", &json!({"login": "ron"}));
        assert!(registry.verify("harry", &new).is_ok());
    }

    #[test]
    fn names_sorted() {
        let registry = RoomRegistry::new(UserDirectory::new());
        let _ = registry.register_room("b", "s");
        let _ = registry.register_room("a", "s");
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert!(registry.room("a").is_some());
    }
}
