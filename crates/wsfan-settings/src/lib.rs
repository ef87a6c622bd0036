//! # wsfan-settings
//!
//! Configuration for wsfan sessions, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WsfanSettings::default()`]
//! 2. **User file**: `~/.wsfan/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WSFAN_*` overrides (highest priority)
//!
//! A session receives its [`SessionSettings`] explicitly; the process-wide
//! cache behind [`get_settings`] is a convenience for binaries.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

static SETTINGS: OnceLock<WsfanSettings> = OnceLock::new();

/// Get the process-wide settings.
///
/// On first call, loads `~/.wsfan/settings.json` with env var overrides.
/// If loading fails, the failure is logged and compiled defaults are used.
pub fn get_settings() -> &'static WsfanSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            WsfanSettings::default()
        })
    })
}

/// Install the stderr `tracing` subscriber at `settings.logging.level`.
///
/// Binaries call this once at startup; libraries embedding a session leave
/// subscriber setup to their host. `RUST_LOG` still takes precedence.
pub fn init_logging(settings: &WsfanSettings) {
    wsfan_core::logging::init_subscriber(settings.logging.level);
}

/// Initialize the process-wide settings with a specific value.
///
/// Returns the settings back if the cache was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: WsfanSettings) -> std::result::Result<(), WsfanSettings> {
    SETTINGS.set(settings)
}
