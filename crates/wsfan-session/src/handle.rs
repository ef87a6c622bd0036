//! Channel-backed subscriptions.

use tokio::sync::mpsc;
use wsfan_core::SubscriptionEvent;

use crate::error::SubscriptionError;
use crate::registry::SubscriptionRegistry;

/// A live subscription whose events arrive on a channel.
///
/// Returned by [`WebSocketSession::subscribe_channel`](crate::WebSocketSession::subscribe_channel).
/// Dropping the handle does not unsubscribe; call [`cancel`](Self::cancel).
#[derive(Debug)]
pub struct SubscriptionHandle {
    name: String,
    id: u64,
    events: mpsc::UnboundedReceiver<SubscriptionEvent>,
    registry: SubscriptionRegistry,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        name: String,
        id: u64,
        events: mpsc::UnboundedReceiver<SubscriptionEvent>,
        registry: SubscriptionRegistry,
    ) -> Self {
        Self {
            name,
            id,
            events,
            registry,
        }
    }

    /// Subscription name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next event. `None` once the subscription ended and every event has
    /// been read.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<SubscriptionEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the first message.
    ///
    /// Errors, close, and timeouts before the first message resolve to the
    /// matching [`SubscriptionError`].
    pub async fn first_message(&mut self) -> Result<String, SubscriptionError> {
        match self.events.recv().await {
            Some(SubscriptionEvent::Message(message)) => Ok(message),
            Some(SubscriptionEvent::Error(error)) => Err(SubscriptionError::Transport(error)),
            Some(SubscriptionEvent::Done) => Err(SubscriptionError::Closed),
            Some(SubscriptionEvent::TimedOut) => Err(SubscriptionError::TimedOut),
            Some(SubscriptionEvent::SessionTimedOut) => Err(SubscriptionError::SessionTimedOut),
            None => Err(SubscriptionError::Cancelled),
        }
    }

    /// Whether this subscription is still registered.
    pub fn is_live(&self) -> bool {
        self.registry.contains_id(&self.name, self.id)
    }

    /// Unsubscribe. Returns `false` if it had already ended or been removed.
    ///
    /// A newer subscription registered under the same name is left alone.
    pub fn cancel(&self) -> bool {
        self.registry.unsubscribe_id(&self.name, self.id)
    }
}
