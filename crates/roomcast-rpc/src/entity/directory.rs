use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::User;
use crate::errors::RpcError;

/// App-wide registry of users by login.
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, Arc<User>>>,
}

impl UserDirectory {
    /// Create an empty directory.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-register a user that has not joined a room yet.
    pub fn register(self: &Arc<Self>, user: Arc<User>) -> Result<(), RpcError> {
        self.admit(&user)
    }

    /// Look up a user by login.
    pub fn find(&self, login: &str) -> Option<Arc<User>> {
        self.users.read().get(login).cloned()
    }

    /// Whether a login is registered.
    pub fn contains(&self, login: &str) -> bool {
        self.users.read().contains_key(login)
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether no users are registered.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// All registered logins (sorted).
    pub fn logins(&self) -> Vec<String> {
        let mut logins: Vec<String> = self.users.read().keys().cloned().collect();
        logins.sort();
        logins
    }

    /// Insert `user` unless a different user already holds its login.
    pub(crate) fn admit(self: &Arc<Self>, user: &Arc<User>) -> Result<(), RpcError> {
        let mut users = self.users.write();
        if let Some(existing) = users.get(user.login()) {
            if Arc::ptr_eq(existing, user) {
                return Ok(());
            }
            return Err(match existing.room() {
                Some(room) => RpcError::application(format!(
                    "'{}' is already a member of room '{}'",
                    user.login(),
                    room.name()
                )),
                None => RpcError::application(format!("'{}' is already registered", user.login())),
            });
        }
        user.set_directory(self);
        let _ = users.insert(user.login().to_owned(), Arc::clone(user));
        Ok(())
    }

    /// Remove `user` if it is the one registered under its login.
    pub(crate) fn remove_if_same(&self, user: &Arc<User>) -> bool {
        let mut users = self.users.write();
        match users.get(user.login()) {
            Some(existing) if Arc::ptr_eq(existing, user) => {
                let _ = users.remove(user.login());
                true
            }
            _ => false,
        }
    }
}
