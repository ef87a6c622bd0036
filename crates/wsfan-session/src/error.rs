//! Error types for the session, its transport, and its subscriptions.

use thiserror::Error;

/// Failures raised by a [`Connector`](crate::transport::Connector).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL could not be turned into a WebSocket request.
    #[error("invalid websocket url {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A connect header had an invalid name or value.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// The header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The network connection or WebSocket handshake failed.
    #[error("websocket handshake failed: {0}")]
    Handshake(String),

    /// The connector declined to open a connection.
    #[error("connection refused: {0}")]
    Refused(String),
}

/// Errors returned by [`WebSocketSession::init_websocket`](crate::WebSocketSession::init_websocket).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection could not be established; the session stays absent.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// The URL that was dialed.
        url: String,
        /// The transport failure.
        #[source]
        source: TransportError,
    },
}

/// Why a `subscribe` call registered nothing.
///
/// These are not faults: the call was a no-op and a diagnostic was logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    /// There is no live connection.
    #[error("no live websocket connection")]
    NotConnected,

    /// The server closed the session without a status code. The session was
    /// torn down and the listener's session-timeout callback has run.
    #[error("websocket session timed out")]
    SessionTimedOut,

    /// A subscription with this name is already live.
    #[error("subscription '{name}' is already registered")]
    DuplicateName {
        /// The name in use.
        name: String,
    },
}

/// Terminal outcomes of [`SubscriptionHandle::first_message`](crate::SubscriptionHandle::first_message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The inbound stream reported an error before any message.
    #[error("transport error: {0}")]
    Transport(String),

    /// The inbound stream ended before any message.
    #[error("connection closed before a message arrived")]
    Closed,

    /// No message arrived inside the timeout window.
    #[error("subscription timed out")]
    TimedOut,

    /// The session timed out.
    #[error("websocket session timed out")]
    SessionTimedOut,

    /// The subscription was removed before a message arrived.
    #[error("subscription cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_carries_source() {
        let err = SessionError::Connect {
            url: "ws://127.0.0.1:1".into(),
            source: TransportError::Handshake("connection refused".into()),
        };
        let text = err.to_string();
        assert!(text.contains("ws://127.0.0.1:1"));
        assert!(text.contains("connection refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn duplicate_name_display() {
        let err = SubscribeError::DuplicateName {
            name: "orders".into(),
        };
        assert_eq!(err.to_string(), "subscription 'orders' is already registered");
    }

    #[test]
    fn invalid_header_display() {
        let err = TransportError::InvalidHeader {
            name: "Cookie".into(),
            reason: "invalid value".into(),
        };
        assert!(err.to_string().contains("Cookie"));
    }

    #[test]
    fn subscription_error_display() {
        assert_eq!(
            SubscriptionError::Transport("reset".into()).to_string(),
            "transport error: reset"
        );
        assert_eq!(SubscriptionError::TimedOut.to_string(), "subscription timed out");
    }
}
