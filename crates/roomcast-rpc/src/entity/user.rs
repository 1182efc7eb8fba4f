use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::RwLock;

use super::{Room, Session, Store, UserDirectory};
use crate::types::RpcNotification;

/// One identity, possibly connected from several sessions.
pub struct User {
    login: String,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    room: RwLock<Weak<Room>>,
    directory: RwLock<Weak<UserDirectory>>,
    store: Store,
}

impl User {
    /// Create a detached user.
    pub fn new(login: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            login: login.into(),
            sessions: RwLock::new(HashMap::new()),
            room: RwLock::new(Weak::new()),
            directory: RwLock::new(Weak::new()),
            store: Store::new(),
        })
    }

    /// Login name.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Room this user belongs to.
    pub fn room(&self) -> Option<Arc<Room>> {
        self.room.read().upgrade()
    }

    /// Metadata store (verified claims live under `"meta"`).
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Snapshot of live sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Deliver a notification to every session of this user.
    ///
    /// Returns how many sessions accepted it.
    pub async fn unicast(&self, message: &RpcNotification) -> usize {
        let sessions = self.sessions();
        let results = join_all(sessions.iter().map(|s| s.send_message(message))).await;
        results.iter().filter(|r| r.is_ok()).count()
    }

    pub(crate) fn add_session(&self, session: Arc<Session>) {
        let _ = self
            .sessions
            .write()
            .insert(session.id().to_owned(), session);
    }

    /// Remove a session; returns how many remain.
    pub(crate) fn remove_session(&self, session_id: &str) -> usize {
        let mut sessions = self.sessions.write();
        let _ = sessions.remove(session_id);
        sessions.len()
    }

    pub(crate) fn set_room(&self, room: &Arc<Room>) {
        *self.room.write() = Arc::downgrade(room);
    }

    pub(crate) fn clear_room(&self) {
        *self.room.write() = Weak::new();
    }

    pub(crate) fn set_directory(&self, directory: &Arc<UserDirectory>) {
        *self.directory.write() = Arc::downgrade(directory);
    }

    /// Drop one session; on the last one, leave room and directory.
    pub(crate) fn release_session(self: &Arc<Self>, session_id: &str) {
        if let Some(room) = self.room() {
            let _ = room.release(self, session_id);
            return;
        }
        if self.remove_session(session_id) == 0 {
            let directory = self.directory.read().upgrade();
            if let Some(directory) = directory {
                let _ = directory.remove_if_same(self);
            }
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("login", &self.login)
            .field("sessions", &self.session_count())
            .finish_non_exhaustive()
    }
}
