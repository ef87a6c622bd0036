//! Structured logging with `tracing`.
//!
//! Every crate in the workspace emits `tracing` events (connection
//! established, message sent, subscription lifecycle). Nothing is printed
//! until a subscriber is installed, so a library consumer that never calls
//! [`init_subscriber`] gets silent no-op logging.
//!
//! - [`LogLevel`] names the levels accepted by settings
//! - [`init_subscriber`] installs a compact stderr subscriber
//! - [`test_utils::capture_logs`] records events in memory for assertions

pub mod test_utils;
pub mod types;

pub use test_utils::{CapturedLogs, capture_logs};
pub use types::LogLevel;

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init_subscriber(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // set_global_default is a no-op if already set
    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_does_not_panic() {
        init_subscriber(LogLevel::Warn);
        init_subscriber(LogLevel::Debug);
    }
}
