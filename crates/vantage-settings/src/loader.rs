//! Settings loading: defaults ← JSON file ← environment variables.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::VantageSettings;

/// Deep-merge `overlay` into `base`.
///
/// Objects merge recursively; any other value in `overlay` (including
/// arrays and `null`) replaces the value in `base` wholesale.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from an optional file path, with env overrides applied last.
///
/// A missing file is not an error — compiled defaults are used. A present
/// but unreadable or malformed file is an error.
pub fn load_settings(path: Option<&Path>) -> Result<VantageSettings> {
    let defaults = serde_json::to_value(VantageSettings::default())?;

    let merged = match path {
        Some(path) if path.exists() => {
            let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let overlay: Value = serde_json::from_str(&raw)?;
            debug!(?path, "settings file loaded");
            deep_merge(defaults, overlay)
        }
        _ => defaults,
    };

    let mut settings: VantageSettings = serde_json::from_value(merged)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Apply `VANTAGE_*` overrides from a variable source (highest priority).
///
/// Unparseable numeric values are ignored with a warning rather than
/// rejected, so a stray variable cannot prevent startup.
fn apply_overrides(settings: &mut VantageSettings, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("VANTAGE_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = var("VANTAGE_PORT") {
        match port.parse() {
            Ok(port) => settings.server.port = port,
            Err(_) => tracing::warn!(value = %port, "ignoring unparseable VANTAGE_PORT"),
        }
    }
    if let Some(path) = var("VANTAGE_SNAPSHOT_PATH") {
        settings.snapshot.path = path;
    }
    if let Some(filter) = var("VANTAGE_LOG") {
        settings.logging.filter = filter;
    }
}
