//! Events flowing from the connection to subscribers.
//!
//! The broadcast tap republishes [`InboundEvent`]s. Each subscription turns
//! them into [`SubscriptionEvent`]s, adding the two outcomes that only exist
//! per subscriber: its own timeout and the session-level timeout.

/// An event read from the connection and republished by the broadcast tap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    /// A text message from the server.
    Message(String),
    /// A transport error on the inbound stream.
    Error(String),
    /// The inbound stream ended.
    Done,
}

/// What a single subscription observes over its lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionEvent {
    /// A text message from the server.
    Message(String),
    /// A transport error on the inbound stream.
    Error(String),
    /// The inbound stream ended.
    Done,
    /// No message, error, or close arrived inside the timeout window.
    TimedOut,
    /// The server closed the session without a status code.
    SessionTimedOut,
}

impl SubscriptionEvent {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::TimedOut | Self::SessionTimedOut)
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Error(_) => "error",
            Self::Done => "done",
            Self::TimedOut => "timeout",
            Self::SessionTimedOut => "session_timeout",
        }
    }
}

impl From<InboundEvent> for SubscriptionEvent {
    fn from(event: InboundEvent) -> Self {
        match event {
            InboundEvent::Message(text) => Self::Message(text),
            InboundEvent::Error(error) => Self::Error(error),
            InboundEvent::Done => Self::Done,
        }
    }
}
