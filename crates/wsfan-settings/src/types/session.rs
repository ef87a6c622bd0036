//! Session and logging settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use wsfan_core::constants::{
    DEFAULT_COOKIE_HEADER, DEFAULT_TAP_CAPACITY, DEFAULT_TIMEOUT_SECS, MAX_TIMER_WINDOW_SECS,
    TIMEOUT_PADDING_SECS,
};
use wsfan_core::logging::LogLevel;

use crate::errors::{Result, SettingsError};

/// Connection and subscription settings for a `WebSocketSession`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Subscription timeout used when `subscribe` is given none.
    pub default_timeout_secs: u64,
    /// Extra seconds added to every subscription timeout.
    pub timeout_padding_secs: u64,
    /// Events buffered per subscriber before it starts lagging.
    pub tap_capacity: usize,
    /// Header name carrying the optional cookie on connect.
    pub cookie_header: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            timeout_padding_secs: TIMEOUT_PADDING_SECS,
            tap_capacity: DEFAULT_TAP_CAPACITY,
            cookie_header: DEFAULT_COOKIE_HEADER.to_string(),
        }
    }
}

impl SessionSettings {
    /// Full timer window for a subscription: the requested (or default)
    /// timeout plus padding, clamped to [`MAX_TIMER_WINDOW_SECS`].
    pub fn timeout_window(&self, timeout_secs: Option<u64>) -> Duration {
        let base = timeout_secs.unwrap_or(self.default_timeout_secs);
        let secs = base
            .saturating_add(self.timeout_padding_secs)
            .min(MAX_TIMER_WINDOW_SECS);
        Duration::from_secs(secs)
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.tap_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "session.tapCapacity must be at least 1".into(),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "session.defaultTimeoutSecs must be at least 1".into(),
            ));
        }
        if self.cookie_header.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "session.cookieHeader must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Diagnostic output settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level written to stderr.
    pub level: LogLevel,
}
