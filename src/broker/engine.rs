//! Broker engine
//!
//! The broker maps topics to their active consumers and sits between
//! producers and the queue store:
//! - `publish` appends to the store, then wakes one waiting consumer
//! - `subscribe` / `unsubscribe` manage consumer handles; unsubscribing a
//!   consumer that holds a delivery nacks it first so the message is not lost
//!
//! Concurrency and usage notes:
//! - One `RwLock` guards the topic map for every topic. Publishing only reads
//!   it, subscription changes write it.
//! - `unsubscribe` keeps the write lock across the forced nack, so a failed
//!   nack leaves the registration untouched. Publishers on every topic wait
//!   for that one store transaction.
//! - An unsubscribed handle is detached under its own lock before it leaves
//!   the topic; `Consumer::next` refuses afterwards, so a stale handle can
//!   never strand a value in the in-flight region.
//! - Notifications are a best-effort wake-up: a full channel is skipped, never
//!   waited on. Consumers are expected to poll the store on their own as well.
//! - Each `Broker` owns its state; independent instances never share topics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::broker::topic::{Subscriber, Topic};
use crate::consumer::{Consumer, EventKind, SharedConsumer};
use crate::store::{MemoryEngine, QueueStore, Store, Value};
use crate::utils::error::{BrokerError, BrokerResult};

/// Routes published values into the store and tracks the consumers of each
/// topic.
pub struct Broker {
    store: Arc<dyn Store>,
    topics: RwLock<HashMap<Vec<u8>, Topic>>,
}

impl Broker {
    /// Creates a broker with no topics on top of `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Broker over a volatile in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(QueueStore::new(MemoryEngine::new())))
    }

    /// The store this broker publishes into.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Vec<u8>, Topic>> {
        self.topics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Vec<u8>, Topic>> {
        self.topics.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `value` under `topic` and wakes one subscriber. Returns the
    /// offset assigned by the store.
    pub fn publish(&self, topic: &[u8], value: &Value) -> BrokerResult<u64> {
        let offset = self.store.insert(topic, value)?;
        self.notify(topic, EventKind::Published);
        Ok(offset)
    }

    /// Registers a new consumer on `topic` and returns its shared handle.
    ///
    /// The consumer is appended to the topic's subscriber list, so it is the
    /// last to be offered notifications. The topic entry is created on first
    /// use. Never fails.
    pub fn subscribe(&self, topic: &[u8]) -> SharedConsumer {
        let (consumer, notifier) = Consumer::new(topic, self.store.clone());
        let id = consumer.id.clone();
        let consumer = Arc::new(Mutex::new(consumer));

        self.write()
            .entry(topic.to_vec())
            .or_insert_with(|| Topic::new(topic))
            .subscribe(Subscriber {
                id: id.clone(),
                consumer: consumer.clone(),
                notifier,
            });

        info!(consumer = %id, topic = %String::from_utf8_lossy(topic), "subscribed");
        consumer
    }

    /// Removes consumer `id` from `topic`, nacking its outstanding delivery
    /// first. If that nack fails the consumer stays registered and the error
    /// is returned.
    ///
    /// On success the handle is detached: further `next` calls fail with
    /// `ConsumerDetached`. Remaining subscribers get a `Requeued` wake-up
    /// when a delivery went back to the queue.
    pub fn unsubscribe(&self, topic: &[u8], id: &str) -> BrokerResult<()> {
        let not_found = || BrokerError::ConsumerNotFound {
            id: id.to_string(),
            topic: String::from_utf8_lossy(topic).into_owned(),
        };

        let requeued = {
            let mut topics = self.write();
            let entry = topics.get_mut(topic).ok_or_else(not_found)?;
            let idx = entry.position(id).ok_or_else(not_found)?;

            let requeued = match entry.get(idx) {
                Some(sub) => {
                    let mut consumer = sub.consumer.lock().unwrap_or_else(PoisonError::into_inner);
                    let requeued = if consumer.outstanding {
                        consumer.nack()?;
                        true
                    } else {
                        false
                    };
                    consumer.detach();
                    requeued
                }
                None => false,
            };

            entry.remove(idx);
            if entry.is_empty() {
                topics.remove(topic);
            }
            requeued
        };

        info!(consumer = %id, topic = %String::from_utf8_lossy(topic), requeued, "unsubscribed");
        if requeued {
            self.notify(topic, EventKind::Requeued);
        }
        Ok(())
    }

    /// Best-effort wake-up of the first subscriber with room in its channel.
    pub fn notify(&self, topic: &[u8], kind: EventKind) -> bool {
        let delivered = self
            .read()
            .get(topic)
            .is_some_and(|t| t.notify(kind));

        if !delivered {
            debug!(topic = %String::from_utf8_lossy(topic), ?kind, "notification dropped");
        }
        delivered
    }

    /// Ids of the consumers registered on `topic`, in notification order.
    pub fn subscribers(&self, topic: &[u8]) -> Vec<String> {
        self.read()
            .get(topic)
            .map(Topic::subscriber_ids)
            .unwrap_or_default()
    }

    /// Number of topics that currently have at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.read().len()
    }

    /// Flushes and closes the underlying store. Handles still held by callers
    /// fail with `StoreClosed` from then on.
    pub fn close(&self) -> BrokerResult<()> {
        self.store.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("topics", &self.topic_count())
            .finish()
    }
}
