//! Subscriber callbacks.
//!
//! A subscription reports to a [`SubscriptionListener`]. Implement the
//! trait directly, build one from closures with [`Callbacks`], or use
//! [`WebSocketSession::subscribe_channel`](crate::WebSocketSession::subscribe_channel)
//! to receive events on a channel instead.
//!
//! Callbacks run one at a time across the whole session and may call back
//! into the session (subscribe, unsubscribe, send) from inside a callback.

use tokio::sync::mpsc;
use wsfan_core::SubscriptionEvent;

/// Receives the events of one subscription.
pub trait SubscriptionListener: Send + Sync + 'static {
    /// A text message arrived while the subscription was live.
    fn on_message(&self, message: String);

    /// The inbound stream reported an error. The subscription stays live.
    fn on_error(&self, error: String) {
        let _ = error;
    }

    /// The inbound stream ended.
    fn on_done(&self) {}

    /// Nothing arrived inside the timeout window. The subscription has
    /// already been removed.
    fn on_timeout(&self) {}

    /// The server closed the session without a status code. Nothing was
    /// registered and the session has been closed.
    fn on_session_timeout(&self) {}
}

/// Route an event to the matching listener method.
pub(crate) fn deliver(listener: &dyn SubscriptionListener, event: SubscriptionEvent) {
    match event {
        SubscriptionEvent::Message(message) => listener.on_message(message),
        SubscriptionEvent::Error(error) => listener.on_error(error),
        SubscriptionEvent::Done => listener.on_done(),
        SubscriptionEvent::TimedOut => listener.on_timeout(),
        SubscriptionEvent::SessionTimedOut => listener.on_session_timeout(),
    }
}

type TextFn = Box<dyn Fn(String) + Send + Sync>;
type SignalFn = Box<dyn Fn() + Send + Sync>;

/// Closure-based listener. Unset callbacks do nothing.
///
/// ```ignore
/// let listener = Callbacks::new()
///     .message(|msg| println!("{msg}"))
///     .timeout(|| eprintln!("no reply"));
/// ```
#[derive(Default)]
pub struct Callbacks {
    on_message: Option<TextFn>,
    on_error: Option<TextFn>,
    on_done: Option<SignalFn>,
    on_timeout: Option<SignalFn>,
    on_session_timeout: Option<SignalFn>,
}

impl Callbacks {
    /// Listener with no callbacks set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for each message.
    #[must_use]
    pub fn message(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Called for each transport error.
    #[must_use]
    pub fn error(mut self, f: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called when the inbound stream ends.
    #[must_use]
    pub fn done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    /// Called when the subscription timer fires.
    #[must_use]
    pub fn timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_timeout = Some(Box::new(f));
        self
    }

    /// Called when `subscribe` detects a session timeout.
    #[must_use]
    pub fn session_timeout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_timeout = Some(Box::new(f));
        self
    }
}

impl SubscriptionListener for Callbacks {
    fn on_message(&self, message: String) {
        if let Some(f) = &self.on_message {
            f(message);
        }
    }

    fn on_error(&self, error: String) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }

    fn on_done(&self) {
        if let Some(f) = &self.on_done {
            f();
        }
    }

    fn on_timeout(&self) {
        if let Some(f) = &self.on_timeout {
            f();
        }
    }

    fn on_session_timeout(&self) {
        if let Some(f) = &self.on_session_timeout {
            f();
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_done", &self.on_done.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_session_timeout", &self.on_session_timeout.is_some())
            .finish()
    }
}

/// Forwards every event to an unbounded channel.
pub(crate) struct ChannelListener {
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl ChannelListener {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<SubscriptionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SubscriptionEvent) {
        let _ = self.tx.send(event);
    }
}

impl SubscriptionListener for ChannelListener {
    fn on_message(&self, message: String) {
        self.forward(SubscriptionEvent::Message(message));
    }

    fn on_error(&self, error: String) {
        self.forward(SubscriptionEvent::Error(error));
    }

    fn on_done(&self) {
        self.forward(SubscriptionEvent::Done);
    }

    fn on_timeout(&self) {
        self.forward(SubscriptionEvent::TimedOut);
    }

    fn on_session_timeout(&self) {
        self.forward(SubscriptionEvent::SessionTimedOut);
    }
}
