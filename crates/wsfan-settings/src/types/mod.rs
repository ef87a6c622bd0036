//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so partial
//! JSON is accepted and missing fields take their default value.

mod session;

pub use session::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// Loaded from `~/.wsfan/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// ```json
/// {
///   "session": { "defaultTimeoutSecs": 10, "tapCapacity": 64 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WsfanSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Connection and subscription settings.
    pub session: SessionSettings,
    /// Diagnostic output settings.
    pub logging: LoggingSettings,
}

impl Default for WsfanSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "wsfan".to_string(),
            session: SessionSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsfan_core::logging::LogLevel;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(WsfanSettings::default()).unwrap();
        assert_eq!(json["session"]["defaultTimeoutSecs"], 30);
        assert_eq!(json["session"]["timeoutPaddingSecs"], 20);
        assert_eq!(json["session"]["tapCapacity"], 256);
        assert_eq!(json["logging"]["level"], "warn");
    }

    #[test]
    fn empty_object_is_default() {
        let settings: WsfanSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, WsfanSettings::default());
    }

    #[test]
    fn logging_level_parses() {
        let settings: WsfanSettings =
            serde_json::from_str(r#"{"logging": {"level": "debug"}}"#).unwrap();
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }
}
