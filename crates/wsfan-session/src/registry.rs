//! Named subscriptions and their per-subscription tasks.
//!
//! All registry mutation and every listener callback happen under one
//! re-entrant lock, the timeline. That gives the session a single,
//! totally ordered sequence of steps:
//!
//! - a callback never runs for a subscription that has been removed
//! - callbacks may call back into the session on the same thread
//! - a timeout firing concurrently with `unsubscribe` resolves one way only
//!
//! The `RefCell` inside the lock is borrowed only for short map operations,
//! never across a callback.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use wsfan_core::constants::MAX_TIMER_WINDOW_SECS;
use wsfan_core::{InboundEvent, SubscriptionEvent};

use crate::listener::{SubscriptionListener, deliver};

pub(crate) struct Entry {
    id: u64,
    cancel: CancellationToken,
}

type Entries = RefCell<HashMap<String, Entry>>;
type Timeline = ReentrantMutex<Entries>;

/// Held while a compound session operation must not interleave with
/// callbacks or other registry changes.
pub(crate) type TimelineGuard<'a> = ReentrantMutexGuard<'a, Entries>;

/// Map from subscription name to its live task.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    timeline: Arc<Timeline>,
    next_id: Arc<AtomicU64>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            timeline: Arc::new(ReentrantMutex::new(RefCell::new(HashMap::new()))),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub(crate) fn enter(&self) -> TimelineGuard<'_> {
        self.timeline.lock()
    }

    /// Register `name` and start its task on `runtime`.
    ///
    /// The timer starts now and is disarmed by the first message, error, or
    /// close. Returns the subscription id, or `None` if the name is taken.
    pub fn register(
        &self,
        runtime: &Handle,
        name: &str,
        window: Duration,
        events: broadcast::Receiver<InboundEvent>,
        listener: Arc<dyn SubscriptionListener>,
    ) -> Option<u64> {
        let timeline = self.timeline.lock();
        if timeline.borrow().contains_key(name) {
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let task = SubscriptionTask {
            id,
            name: name.to_owned(),
            deadline: deadline_after(Instant::now(), window),
            events,
            listener,
            cancel: cancel.clone(),
            timeline: Arc::clone(&self.timeline),
        };

        let _ = timeline
            .borrow_mut()
            .insert(name.to_owned(), Entry { id, cancel });
        let _handle = runtime.spawn(task.run());
        debug!(subscription = name, id, window_secs = window.as_secs(), "subscription registered");
        Some(id)
    }

    /// Remove `name` and cancel its task. Returns whether it was live.
    pub fn unsubscribe(&self, name: &str) -> bool {
        self.remove(name, None)
    }

    /// Remove `name` only if it still refers to subscription `id`.
    pub(crate) fn unsubscribe_id(&self, name: &str, id: u64) -> bool {
        self.remove(name, Some(id))
    }

    fn remove(&self, name: &str, id: Option<u64>) -> bool {
        let timeline = self.timeline.lock();
        let entry = {
            let mut entries = timeline.borrow_mut();
            match entries.get(name) {
                Some(entry) if id.is_none_or(|id| entry.id == id) => entries.remove(name),
                _ => None,
            }
        };
        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                debug!(subscription = name, id = entry.id, "unsubscribed");
                true
            }
            None => {
                trace!(subscription = name, "unsubscribe of unknown subscription");
                false
            }
        }
    }

    /// Unsubscribe everything. Returns how many were removed.
    pub fn clear_all(&self) -> usize {
        let _timeline = self.timeline.lock();
        self.names()
            .iter()
            .filter(|name| self.unsubscribe(name))
            .count()
    }

    /// Whether `name` is live.
    pub fn contains(&self, name: &str) -> bool {
        self.timeline.lock().borrow().contains_key(name)
    }

    pub(crate) fn contains_id(&self, name: &str, id: u64) -> bool {
        self.timeline
            .lock()
            .borrow()
            .get(name)
            .is_some_and(|entry| entry.id == id)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.timeline.lock().borrow().len()
    }

    /// Whether no subscription is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live subscription names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.timeline.lock().borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// `now + window`, clamped so it never overflows `Instant`.
fn deadline_after(now: Instant, window: Duration) -> Instant {
    let far_future = Duration::from_secs(MAX_TIMER_WINDOW_SECS);
    now.checked_add(window.min(far_future)).unwrap_or(now)
}

enum Step {
    Inbound(InboundEvent),
    TimedOut,
}

enum Flow {
    Continue,
    Stop,
}

struct SubscriptionTask {
    id: u64,
    name: String,
    deadline: Instant,
    events: broadcast::Receiver<InboundEvent>,
    listener: Arc<dyn SubscriptionListener>,
    cancel: CancellationToken,
    timeline: Arc<Timeline>,
}

impl SubscriptionTask {
    async fn run(mut self) {
        let timer = sleep_until(self.deadline);
        tokio::pin!(timer);
        let mut armed = true;

        loop {
            let step = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return,
                () = &mut timer, if armed => Step::TimedOut,
                received = self.events.recv() => match received {
                    Ok(event) => Step::Inbound(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(subscription = %self.name, skipped, "subscriber lagged, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => Step::Inbound(InboundEvent::Done),
                },
            };

            if matches!(step, Step::Inbound(_)) {
                armed = false;
            }
            if let Flow::Stop = self.dispatch(step) {
                return;
            }
        }
    }

    /// Deliver one step under the timeline. Nothing is delivered once the
    /// subscription has been cancelled.
    fn dispatch(&self, step: Step) -> Flow {
        let timeline = self.timeline.lock();
        if self.cancel.is_cancelled() {
            return Flow::Stop;
        }

        match step {
            Step::TimedOut => {
                {
                    let mut entries = timeline.borrow_mut();
                    if entries.get(&self.name).is_some_and(|e| e.id == self.id) {
                        let _ = entries.remove(&self.name);
                    }
                }
                self.cancel.cancel();
                debug!(subscription = %self.name, id = self.id, "subscription timed out");
                self.listener.on_timeout();
                Flow::Stop
            }
            Step::Inbound(event) => {
                let event = SubscriptionEvent::from(event);
                trace!(subscription = %self.name, kind = event.kind(), "dispatching");
                let terminal = event.is_terminal();
                deliver(self.listener.as_ref(), event);
                if terminal { Flow::Stop } else { Flow::Continue }
            }
        }
    }
}
