//! Logging types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Minimum level for diagnostic output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every subscription step.
    Trace,
    /// Lifecycle steps (registered, unsubscribed, message sent).
    Debug,
    /// Connect and close.
    Info,
    /// Precondition no-ops and transport failures.
    #[default]
    Warn,
    /// Errors only.
    Error,
    /// No output at all.
    Off,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Off => "off",
        }
    }

    /// Convert from string (case-insensitive). Unknown values map to `Warn`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => Self::Trace,
            "debug" => Self::Debug,
            "info" => Self::Info,
            "error" => Self::Error,
            "off" | "none" => Self::Off,
            _ => Self::Warn,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter())
    }
}
