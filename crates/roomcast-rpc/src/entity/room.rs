use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use metrics::counter;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{Session, Store, User, UserDirectory};
use crate::errors::RpcError;
use crate::metrics::{ROOM_BROADCAST_FAILURES_TOTAL, ROOM_BROADCASTS_TOTAL};
use crate::types::RpcNotification;

/// Outcome of a room broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that accepted the frame.
    pub delivered: usize,
    /// Sessions whose transport was gone.
    pub failed: usize,
}

/// A named scope of users sharing broadcasts.
pub struct Room {
    name: String,
    users: RwLock<HashMap<String, Arc<User>>>,
    directory: Arc<UserDirectory>,
    store: Store,
}

impl Room {
    /// Create an empty room registered against the app's user directory.
    pub fn new(name: impl Into<String>, directory: Arc<UserDirectory>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            users: RwLock::new(HashMap::new()),
            directory,
            store: Store::new(),
        })
    }

    /// Room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-room store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Member by login.
    pub fn user(&self, login: &str) -> Option<Arc<User>> {
        self.users.read().get(login).cloned()
    }

    /// Snapshot of members.
    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.read().values().cloned().collect()
    }

    /// Member logins (sorted).
    pub fn logins(&self) -> Vec<String> {
        let mut logins: Vec<String> = self.users.read().keys().cloned().collect();
        logins.sort();
        logins
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Add `user` to this room and the app directory, optionally linking a
    /// session to it.
    pub fn add_user(
        self: &Arc<Self>,
        user: Arc<User>,
        session: Option<&Arc<Session>>,
    ) -> Result<(), RpcError> {
        if let Some(session) = session {
            Self::detach_unless(session, &user);
        }
        let mut users = self.users.write();
        let _ = self.admit_locked(&mut users, user, session)?;
        Ok(())
    }

    /// Attach `session` to the member named `login`, creating it if needed.
    ///
    /// A pre-registered directory user without a room is adopted. A login
    /// that already belongs to another room is rejected, and the session
    /// keeps its previous user.
    pub fn join(
        self: &Arc<Self>,
        login: &str,
        session: &Arc<Session>,
    ) -> Result<Arc<User>, RpcError> {
        let current = session.user();
        if let Some(current) = &current {
            let same_room = current.room().is_some_and(|room| Arc::ptr_eq(&room, self));
            if same_room && current.login() == login {
                return Ok(Arc::clone(current));
            }
            let _ = self.resolve(&self.users.read(), login, Some(current))?;
            session.detach_user();
        }

        let mut users = self.users.write();
        let user = self.resolve(&users, login, None)?.unwrap_or_else(|| User::new(login));
        self.admit_locked(&mut users, user, Some(session))
    }

    /// Existing user `login` would map to here; `None` means a fresh one.
    ///
    /// `leaving` is the session's current user, about to be detached. When
    /// this session is its only one, its login is free to move rooms.
    fn resolve(
        &self,
        users: &HashMap<String, Arc<User>>,
        login: &str,
        leaving: Option<&Arc<User>>,
    ) -> Result<Option<Arc<User>>, RpcError> {
        if let Some(member) = users.get(login) {
            return Ok(Some(Arc::clone(member)));
        }
        match self.directory.find(login) {
            None => Ok(None),
            Some(known) => match known.room() {
                None => Ok(Some(known)),
                Some(_)
                    if leaving.is_some_and(|u| Arc::ptr_eq(u, &known) && u.session_count() == 1) =>
                {
                    Ok(None)
                }
                Some(other) => Err(RpcError::application(format!(
                    "'{login}' is already a member of room '{}'",
                    other.name()
                ))),
            },
        }
    }

    fn detach_unless(session: &Arc<Session>, user: &Arc<User>) {
        if let Some(current) = session.user() {
            if !Arc::ptr_eq(&current, user) {
                session.detach_user();
            }
        }
    }

    fn admit_locked(
        self: &Arc<Self>,
        users: &mut HashMap<String, Arc<User>>,
        user: Arc<User>,
        session: Option<&Arc<Session>>,
    ) -> Result<Arc<User>, RpcError> {
        if let Some(member) = users.get(user.login()) {
            if !Arc::ptr_eq(member, &user) {
                return Err(RpcError::application(format!(
                    "room '{}' already has a member named '{}'",
                    self.name,
                    user.login()
                )));
            }
        }
        if let Some(other) = user.room() {
            if !Arc::ptr_eq(&other, self) {
                return Err(RpcError::application(format!(
                    "'{}' is already a member of room '{}'",
                    user.login(),
                    other.name()
                )));
            }
        }
        self.directory.admit(&user)?;
        user.set_room(self);
        let _ = users.insert(user.login().to_owned(), Arc::clone(&user));
        if let Some(session) = session {
            user.add_session(Arc::clone(session));
            session.bind_user(Arc::clone(&user));
        }
        debug!(room = %self.name, login = user.login(), "user admitted");
        Ok(user)
    }

    /// Drop a session of `user`; on the last one remove the user from this
    /// room and the directory. Returns whether the user left.
    pub(crate) fn release(&self, user: &Arc<User>, session_id: &str) -> bool {
        let mut users = self.users.write();
        if user.remove_session(session_id) > 0 {
            return false;
        }
        if users.get(user.login()).is_some_and(|member| Arc::ptr_eq(member, user)) {
            let _ = users.remove(user.login());
        }
        user.clear_room();
        let _ = self.directory.remove_if_same(user);
        info!(room = %self.name, login = user.login(), "user left room");
        true
    }

    /// Deliver `message` to every session of every member except `but`.
    ///
    /// All deliveries are awaited before returning; recipient order is
    /// unspecified.
    pub async fn broadcast(&self, message: &RpcNotification, but: Option<&str>) -> BroadcastReport {
        let recipients: Vec<Arc<Session>> = {
            let users = self.users.read();
            users
                .values()
                .filter(|user| Some(user.login()) != but)
                .flat_map(|user| user.sessions())
                .collect()
        };

        let frame = match serde_json::to_string(message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(room = %self.name, error = %e, "failed to encode broadcast");
                return BroadcastReport {
                    delivered: 0,
                    failed: recipients.len(),
                };
            }
        };

        let results = join_all(
            recipients
                .iter()
                .map(|session| session.send_frame(frame.clone())),
        )
        .await;

        let delivered = results.iter().filter(|r| r.is_ok()).count();
        let report = BroadcastReport {
            delivered,
            failed: results.len() - delivered,
        };

        counter!(ROOM_BROADCASTS_TOTAL).increment(1);
        if report.failed > 0 {
            counter!(ROOM_BROADCAST_FAILURES_TOTAL).increment(report.failed as u64);
        }
        debug!(
            room = %self.name,
            method = %message.method,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast"
        );
        report
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("members", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_session, recv_json};
    use crate::types::Params;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn room() -> (Arc<Room>, Arc<UserDirectory>) {
        let directory = UserDirectory::new();
        (Room::new("harry", Arc::clone(&directory)), directory)
    }

    #[test]
    fn join_links_session_user_and_room() {
        let (room, directory) = room();
        let (session, _rx) = make_session();
        let user = room.join("hermione", &session).unwrap();

        assert_eq!(user.login(), "hermione");
        assert!(Arc::ptr_eq(&session.user().unwrap(), &user));
        assert!(Arc::ptr_eq(&session.room().unwrap(), &room));
        assert!(Arc::ptr_eq(&directory.find("hermione").unwrap(), &user));
        assert_eq!(room.logins(), vec!["hermione"]);
    }

    #[test]
    fn second_session_attaches_to_existing_user() {
        let (room, _dir) = room();
        let (a, _ra) = make_session();
        let (b, _rb) = make_session();
        let first = room.join("ron", &a).unwrap();
        let second = room.join("ron", &b).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.session_count(), 2);
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn last_session_close_removes_user_everywhere() {
        let (room, directory) = room();
        let (a, _ra) = make_session();
        let (b, _rb) = make_session();
        let user = room.join("ron", &a).unwrap();
        let _ = room.join("ron", &b).unwrap();

        a.close();
        assert_eq!(room.logins(), vec!["ron"]);
        assert_eq!(user.session_count(), 1);

        b.close();
        assert!(room.is_empty());
        assert!(directory.is_empty());
        assert!(user.room().is_none());
    }

    #[test]
    fn login_in_other_room_rejected() {
        let directory = UserDirectory::new();
        let harry = Room::new("harry", Arc::clone(&directory));
        let voldemort = Room::new("voldemort", Arc::clone(&directory));
        let (a, _ra) = make_session();
        let (b, _rb) = make_session();
        let _ = harry.join("draco", &a).unwrap();
        let err = voldemort.join("draco", &b).unwrap_err();
        assert_eq!(err.to_string(), "'draco' is already a member of room 'harry'");
        assert!(b.user().is_none());
    }

    #[test]
    fn rejected_rejoin_keeps_previous_user() {
        let directory = UserDirectory::new();
        let harry = Room::new("harry", Arc::clone(&directory));
        let voldemort = Room::new("voldemort", Arc::clone(&directory));
        let (a, _ra) = make_session();
        let (b, _rb) = make_session();
        let ron = harry.join("ron", &a).unwrap();
        a.authenticate();
        let _ = voldemort.join("draco", &b).unwrap();

        assert!(harry.join("draco", &a).is_err());
        assert!(a.is_authenticated());
        assert!(Arc::ptr_eq(&a.user().unwrap(), &ron));
        assert_eq!(harry.logins(), vec!["ron"]);
        assert_eq!(voldemort.logins(), vec!["draco"]);
        assert!(directory.contains("ron"));
    }

    #[test]
    fn sole_session_moves_login_to_other_room() {
        let directory = UserDirectory::new();
        let harry = Room::new("harry", Arc::clone(&directory));
        let voldemort = Room::new("voldemort", Arc::clone(&directory));
        let (a, _ra) = make_session();
        let _ = voldemort.join("draco", &a).unwrap();

        let moved = harry.join("draco", &a).unwrap();
        assert!(Arc::ptr_eq(&moved.room().unwrap(), &harry));
        assert!(voldemort.is_empty());
        assert_eq!(harry.logins(), vec!["draco"]);
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn preregistered_user_is_adopted() {
        let (room, directory) = room();
        let user = User::new("lucius");
        let _ = user.store().insert("title", json!("Mr."));
        directory.register(Arc::clone(&user)).unwrap();

        let (session, _rx) = make_session();
        let joined = room.join("lucius", &session).unwrap();
        assert!(Arc::ptr_eq(&joined, &user));
        assert_eq!(joined.store().get("title"), Some(json!("Mr.")));
    }

    #[test]
    fn reauthenticating_as_other_login_detaches_previous() {
        let (room, directory) = room();
        let (session, _rx) = make_session();
        let _ = room.join("ron", &session).unwrap();
        let _ = room.join("hermione", &session).unwrap();
        assert_eq!(room.logins(), vec!["hermione"]);
        assert!(!directory.contains("ron"));
    }

    #[test]
    fn add_user_without_session() {
        let (room, directory) = room();
        room.add_user(User::new("neville"), None).unwrap();
        assert!(room.user("neville").is_some());
        assert!(directory.contains("neville"));
        let err = room.add_user(User::new("neville"), None).unwrap_err();
        assert!(err.to_string().contains("already has a member"));
    }

    #[tokio::test]
    async fn broadcast_skips_but() {
        let (room, _dir) = room();
        let (a, mut ra) = make_session();
        let (b, mut rb) = make_session();
        let (c, mut rc) = make_session();
        let _ = room.join("A", &a).unwrap();
        let _ = room.join("B", &b).unwrap();
        let _ = room.join("C", &c).unwrap();

        let msg = RpcNotification::new("all.hello", Params::Positional(vec![json!("x")]));
        let report = room.broadcast(&msg, Some("A")).await;
        assert_eq!(report, BroadcastReport { delivered: 2, failed: 0 });

        assert_eq!(recv_json(&mut rb).await["method"], json!("all.hello"));
        assert_eq!(recv_json(&mut rc).await["params"], json!(["x"]));
        assert_eq!(ra.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_sessions_of_a_user() {
        let (room, _dir) = room();
        let (a1, mut r1) = make_session();
        let (a2, mut r2) = make_session();
        let _ = room.join("A", &a1).unwrap();
        let _ = room.join("A", &a2).unwrap();

        let msg = RpcNotification::new("all.ping", Params::default());
        let report = room.broadcast(&msg, None).await;
        assert_eq!(report.delivered, 2);
        let _ = tokio::time::timeout(Duration::from_secs(1), r1.recv()).await.unwrap().unwrap();
        let _ = tokio::time::timeout(Duration::from_secs(1), r2.recv()).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn broadcast_counts_closed_sessions_as_failed() {
        let (room, _dir) = room();
        let (a, _ra) = make_session();
        let (b, mut rb) = make_session();
        let _ = room.join("A", &a).unwrap();
        let _ = room.join("B", &b).unwrap();
        a.close_transport();

        let msg = RpcNotification::new("all.ping", Params::default());
        let report = room.broadcast(&msg, None).await;
        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        let _ = recv_json(&mut rb).await;
    }
}
