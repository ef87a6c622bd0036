//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`WsfanSettings::default()`]
//! 2. If `~/.wsfan/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `WSFAN_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;
use wsfan_core::logging::LogLevel;

use crate::errors::Result;
use crate::types::WsfanSettings;

/// Resolve the path to the settings file (`~/.wsfan/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wsfan").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<WsfanSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or out-of-range values
/// are errors.
pub fn load_settings_from_path(path: &Path) -> Result<WsfanSettings> {
    let defaults = serde_json::to_value(WsfanSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: WsfanSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.session.validate()?;
    Ok(settings)
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

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (falling back to file/default).
pub fn apply_env_overrides(settings: &mut WsfanSettings) {
    if let Some(v) = read_env_u64("WSFAN_DEFAULT_TIMEOUT_SECS", 1, 86_400) {
        settings.session.default_timeout_secs = v;
    }
    if let Some(v) = read_env_u64("WSFAN_TIMEOUT_PADDING_SECS", 0, 3_600) {
        settings.session.timeout_padding_secs = v;
    }
    if let Some(v) = read_env_usize("WSFAN_TAP_CAPACITY", 1, 65_536) {
        settings.session.tap_capacity = v;
    }
    if let Some(v) = read_env_string("WSFAN_COOKIE_HEADER") {
        settings.session.cookie_header = v;
    }
    if let Some(v) = read_env_string("WSFAN_LOG_LEVEL") {
        settings.logging.level = LogLevel::from_str_lossy(&v);
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
