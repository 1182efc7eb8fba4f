//! # roomcast-settings
//!
//! Layered configuration for the roomcast daemon.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RoomcastSettings::default()`]
//! 2. **Settings file**: `~/.roomcast/settings.json` or `$ROOMCAST_SETTINGS`
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `ROOMCAST_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the daemon.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RoomcastSettings::default();
        let overridden = std::env::var("ROOMCAST_SETTINGS").is_ok();
        assert!(settings_path().ends_with("settings.json") || overridden);
    }
}
