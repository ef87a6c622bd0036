//! Protocol close codes and subscription timing defaults.

/// Normal closure (RFC 6455 §7.4.1).
pub const CLOSE_NORMAL: u16 = 1000;

/// The peer sent a close frame without a status code.
///
/// A session observing this code is treated as timed out by the server.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// The connection ended without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Subscription timeout applied when the caller does not pass one.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Added to every subscription timeout before the timer is armed.
pub const TIMEOUT_PADDING_SECS: u64 = 20;

/// Longest timer window a subscription can be armed with (about 30 years).
///
/// Larger requested windows are clamped; they never fire in practice.
pub const MAX_TIMER_WINDOW_SECS: u64 = 86_400 * 365 * 30;

/// Events buffered per subscriber by the broadcast tap.
pub const DEFAULT_TAP_CAPACITY: usize = 256;

/// Header used to attach the optional cookie on connect.
pub const DEFAULT_COOKIE_HEADER: &str = "Cookie";
