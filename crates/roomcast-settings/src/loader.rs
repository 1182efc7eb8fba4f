//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RoomcastSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `ROOMCAST_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::RoomcastSettings;

/// Env var naming an alternate settings file.
pub const SETTINGS_PATH_ENV: &str = "ROOMCAST_SETTINGS";

/// Resolve the settings file path: `$ROOMCAST_SETTINGS`, else
/// `~/.roomcast/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var(SETTINGS_PATH_ENV).ok().filter(|v| !v.is_empty()) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".roomcast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RoomcastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RoomcastSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file(path: &Path) -> Result<RoomcastSettings> {
    let defaults = serde_json::to_value(RoomcastSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `ROOMCAST_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut RoomcastSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply `ROOMCAST_*` overrides read through `lookup`.
///
/// Invalid values are ignored with a warning.
pub fn apply_overrides_from(
    settings: &mut RoomcastSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let string = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = string("ROOMCAST_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = string("ROOMCAST_PORT") {
        match parse_u16_range(&v, 0, u16::MAX) {
            Some(port) => settings.server.port = port,
            None => warn!(key = "ROOMCAST_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = string("ROOMCAST_MAX_CONNECTIONS") {
        match parse_usize_range(&v, 1, 1_000_000) {
            Some(n) => settings.server.max_connections = n,
            None => warn!(
                key = "ROOMCAST_MAX_CONNECTIONS",
                value = %v,
                "invalid usize env var, ignoring"
            ),
        }
    }
    if let Some(v) = string("ROOMCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = string("ROOMCAST_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.logging.json = json,
            None => warn!(
                key = "ROOMCAST_LOG_JSON",
                value = %v,
                "invalid boolean env var, ignoring"
            ),
        }
    }
}

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SettingsError;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"server": {"port": 8080, "host": "localhost"}});
        let source = serde_json::json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"rooms": [{"name": "a"}, {"name": "b"}]});
        let source = serde_json::json!({"rooms": [{"name": "c"}]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["rooms"], serde_json::json!([{"name": "c"}]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_new_keys_added() {
        let merged = deep_merge(serde_json::json!({"a": 1}), serde_json::json!({"b": 2}));
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file(Path::new("/nonexistent/settings.json")).unwrap();
        assert_eq!(settings.server, crate::types::ServerSettings::default());
        assert!(settings.rooms.is_empty());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 9090}, "logging": {"json": true},
                "rooms": [{"name": "harry", "secret": "potter"}]}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.rooms.len(), 1);
        assert_eq!(settings.rooms[0].secret.as_deref(), Some("potter"));
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(load_file(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"server": {"port": "high"}}"#).unwrap();
        assert!(matches!(load_file(&path), Err(SettingsError::Json(_))));
    }

    // ── env overrides ───────────────────────────────────────────────

    #[test]
    fn env_overrides_apply() {
        let mut settings = RoomcastSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("ROOMCAST_HOST", "0.0.0.0"),
                ("ROOMCAST_PORT", "9001"),
                ("ROOMCAST_MAX_CONNECTIONS", "16"),
                ("ROOMCAST_LOG_LEVEL", "debug"),
                ("ROOMCAST_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.max_connections, 16);
        assert_eq!(settings.logging.level, "debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn invalid_env_values_are_ignored() {
        let mut settings = RoomcastSettings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("ROOMCAST_PORT", "99999"),
                ("ROOMCAST_MAX_CONNECTIONS", "0"),
                ("ROOMCAST_LOG_JSON", "maybe"),
                ("ROOMCAST_HOST", ""),
            ]),
        );
        let defaults = RoomcastSettings::default();
        assert_eq!(settings.server, defaults.server);
        assert_eq!(settings.logging, defaults.logging);
    }

    // ── parsers ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in ["false", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("9090", 1, 65535), Some(9090));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("99999", 0, 65535), None);
        assert_eq!(parse_usize_range("50", 1, 100), Some(50));
        assert_eq!(parse_usize_range("abc", 1, 100), None);
    }
}
