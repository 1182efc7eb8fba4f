//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a settings file may carry any subset of fields.

mod rooms;
mod server;

pub use rooms::*;
pub use server::*;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "logging": { "level": "debug" },
///   "rooms": [{ "name": "harry", "secretEnv": "HARRY_SECRET" }]
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomcastSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
    /// Rooms created at startup.
    pub rooms: Vec<RoomSettings>,
}

impl RoomcastSettings {
    /// Reject unusable room lists.
    ///
    /// Every room needs a non-empty unique name and a secret that resolves
    /// through `lookup` (used for `secretEnv`).
    pub fn validate_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let mut seen = HashSet::new();
        for room in &self.rooms {
            if room.name.trim().is_empty() {
                return Err(SettingsError::InvalidValue("room name is empty".into()));
            }
            if !seen.insert(room.name.as_str()) {
                return Err(SettingsError::InvalidValue(format!(
                    "duplicate room '{}'",
                    room.name
                )));
            }
            if room.resolve_secret_with(&lookup).is_none() {
                return Err(SettingsError::InvalidValue(format!(
                    "room '{}' has no secret",
                    room.name
                )));
            }
        }
        Ok(())
    }

    /// [`validate_with`](Self::validate_with) against the process environment.
    pub fn validate(&self) -> Result<()> {
        self.validate_with(|key| std::env::var(key).ok())
    }
}
