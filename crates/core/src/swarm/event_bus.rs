//! # Event Bus
//!
//! Per-run publish/subscribe for [`StreamEvent`]s. Every subscriber connected when an
//! event is emitted receives it, in emission order. Closing a run ends every
//! subscriber's stream; subscribing to a closed run yields an already-ended stream.

use super::events::StreamEvent;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    runs: HashMap<String, Vec<Subscriber>>,
    // Retained for the process lifetime, like runs themselves
    closed: HashSet<String>,
}

impl Registry {
    fn remove(&mut self, run_id: &str, subscription_id: u64) {
        if let Some(subscribers) = self.runs.get_mut(run_id) {
            subscribers.retain(|s| s.id != subscription_id);
            if subscribers.is_empty() {
                self.runs.remove(run_id);
            }
        }
    }
}

/// Shared handle to the run event registry
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events for `run_id`
    pub fn subscribe(&self, run_id: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;

        let closed = registry.closed.contains(run_id);
        if closed {
            // Dropping the sender ends the stream immediately
            drop(tx);
        } else {
            registry
                .runs
                .entry(run_id.to_string())
                .or_default()
                .push(Subscriber { id, tx });
        }

        Subscription {
            run_id: run_id.to_string(),
            id,
            closed,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Detach a subscription. Dropping the [`Subscription`] does the same.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.inner.lock().remove(&subscription.run_id, subscription.id);
    }

    /// Deliver `event` to every current subscriber of `run_id`
    pub fn emit(&self, run_id: &str, event: StreamEvent) {
        let mut registry = self.inner.lock();
        if registry.closed.contains(run_id) {
            tracing::warn!(run_id, kind = event.kind(), "Event emitted after close, ignored");
            return;
        }
        if let Some(subscribers) = registry.runs.get_mut(run_id) {
            // Receivers that went away are pruned on the way
            subscribers.retain(|s| s.tx.send(event.clone()).is_ok());
            if subscribers.is_empty() {
                registry.runs.remove(run_id);
            }
        }
    }

    /// End the stream of every subscriber of `run_id`. Later subscribers get an ended stream.
    pub fn close(&self, run_id: &str) {
        let mut registry = self.inner.lock();
        registry.runs.remove(run_id);
        registry.closed.insert(run_id.to_string());
    }

    pub fn is_closed(&self, run_id: &str) -> bool {
        self.inner.lock().closed.contains(run_id)
    }

    pub fn subscriber_count(&self, run_id: &str) -> usize {
        self.inner.lock().runs.get(run_id).map(Vec::len).unwrap_or(0)
    }
}

/// Receiving end for one subscriber
pub struct Subscription {
    run_id: String,
    id: u64,
    closed: bool,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// The run was already closed when this subscription was made; no event will arrive
    pub fn subscribed_after_close(&self) -> bool {
        self.closed
    }

    /// Next event, or `None` once the run's stream is closed
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(&self.run_id, self.id);
        }
    }
}
