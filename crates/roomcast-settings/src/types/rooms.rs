//! Room settings.

use serde::{Deserialize, Serialize};

/// One room created at startup.
///
/// The secret is either inline (`secret`) or read from the environment
/// variable named by `secretEnv`; the inline value wins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Room name clients pass to `authenticate`.
    pub name: String,
    /// HS256 secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Environment variable holding the secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_env: Option<String>,
}

impl RoomSettings {
    /// Secret from the inline value or `lookup(secretEnv)`.
    pub fn resolve_secret_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        self.secret
            .clone()
            .or_else(|| self.secret_env.as_deref().and_then(lookup))
            .filter(|s| !s.is_empty())
    }

    /// [`resolve_secret_with`](Self::resolve_secret_with) against the process environment.
    pub fn resolve_secret(&self) -> Option<String> {
        self.resolve_secret_with(|key| std::env::var(key).ok())
    }
}
