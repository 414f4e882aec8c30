//! Topic subscriber lists
//!
//! A `Topic` holds the subscribers registered for one topic name in
//! registration order. Removal swaps the last subscriber into the freed slot,
//! so order is only preserved until the first unsubscribe.
//!
//! Concurrency note: callers must synchronize access to `Topic` (the broker
//! keeps every topic behind one `RwLock`).

use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

use crate::consumer::{ConsumerId, EventKind, SharedConsumer};

/// One registration on a topic: the consumer handle and the sending half of
/// its notification channel.
#[derive(Debug)]
pub struct Subscriber {
    pub id: ConsumerId,
    pub consumer: SharedConsumer,
    pub notifier: Sender<EventKind>,
}

#[derive(Debug, Default)]
pub struct Topic {
    pub name: Vec<u8>,
    subscribers: Vec<Subscriber>,
}

impl Topic {
    /// Creates a topic with no subscribers.
    pub fn new(name: &[u8]) -> Self {
        Self {
            name: name.to_vec(),
            subscribers: Vec::new(),
        }
    }

    /// Appends `subscriber` at the end of the notification order.
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Index of the subscriber with the given consumer id, if registered.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.subscribers.iter().position(|s| s.id == id)
    }

    pub fn get(&self, idx: usize) -> Option<&Subscriber> {
        self.subscribers.get(idx)
    }

    /// Drops the subscriber at `idx`. The last subscriber takes its slot.
    pub fn remove(&mut self, idx: usize) {
        self.subscribers.swap_remove(idx);
    }

    /// Consumer ids in their current notification order.
    pub fn subscriber_ids(&self) -> Vec<ConsumerId> {
        self.subscribers.iter().map(|s| s.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Wakes the first subscriber, in registration order, whose channel has
    /// room. Returns false when every channel was full or closed.
    pub fn notify(&self, kind: EventKind) -> bool {
        for sub in &self.subscribers {
            match sub.notifier.try_send(kind) {
                Ok(()) => return true,
                Err(TrySendError::Full(_)) => trace!(consumer = %sub.id, "notification slot full"),
                Err(TrySendError::Closed(_)) => trace!(consumer = %sub.id, "notification receiver gone"),
            }
        }
        false
    }
}
