use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::store::{Store, Value};
use crate::utils::error::{BrokerError, BrokerResult};

pub type ConsumerId = String;

/// Handle shared between the broker registry and the connection that owns
/// the subscription.
pub type SharedConsumer = Arc<Mutex<Consumer>>;

/// A wake-up carries no data, so one slot is enough.
pub const NOTIFY_CAPACITY: usize = 1;

/// Why a consumer is being woken up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A value was published on the topic.
    Published,
    /// An in-flight value went back to the front of the ready region.
    Requeued,
}

/// Per-subscription delivery state.
///
/// A consumer holds at most one delivery at a time: `next` moves it to
/// awaiting-ack, `ack` or `nack` moves it back to idle.
pub struct Consumer {
    /// Unique identifier (UUID v4) for this subscription.
    pub id: ConsumerId,
    pub topic: Vec<u8>,
    /// Ack offset of the most recent delivery.
    pub ack_offset: u64,
    pub outstanding: bool,
    detached: bool,
    store: Arc<dyn Store>,
    events: Option<mpsc::Receiver<EventKind>>,
}

impl Consumer {
    /// Creates an idle consumer and returns the sending half of its
    /// notification channel.
    pub(crate) fn new(topic: &[u8], store: Arc<dyn Store>) -> (Self, mpsc::Sender<EventKind>) {
        let (tx, rx) = mpsc::channel(NOTIFY_CAPACITY);
        let consumer = Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_vec(),
            ack_offset: 0,
            outstanding: false,
            detached: false,
            store,
            events: Some(rx),
        };
        (consumer, tx)
    }

    pub fn topic_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.topic)
    }

    /// Pulls the next ready value for this consumer's topic.
    ///
    /// Fails with `DeliveryOutstanding` while the previous delivery has not
    /// been acked or nacked and with `ConsumerDetached` once the handle was
    /// unsubscribed. Store errors such as `EmptyTopic` pass through.
    pub fn next(&mut self) -> BrokerResult<Value> {
        if self.detached {
            return Err(BrokerError::ConsumerDetached {
                id: self.id.clone(),
            });
        }
        if self.outstanding {
            return Err(BrokerError::DeliveryOutstanding {
                id: self.id.clone(),
                offset: self.ack_offset,
            });
        }

        let (value, ack_offset) = self.store.get_next(&self.topic)?;
        self.ack_offset = ack_offset;
        self.outstanding = true;
        debug!(consumer = %self.id, topic = %self.topic_name(), ack_offset, "delivered");

        Ok(value)
    }

    /// Acknowledges the outstanding delivery, removing it for good.
    ///
    /// On failure the error is wrapped in `AckFailed` and the delivery stays
    /// outstanding so the caller can retry.
    pub fn ack(&mut self) -> BrokerResult<()> {
        self.ensure_outstanding()?;
        self.store
            .ack(&self.topic, self.ack_offset)
            .map_err(|source| BrokerError::AckFailed {
                topic: self.topic_name().into_owned(),
                offset: self.ack_offset,
                source,
            })?;
        self.outstanding = false;

        Ok(())
    }

    /// Returns the outstanding delivery to the front of the topic.
    pub fn nack(&mut self) -> BrokerResult<()> {
        self.ensure_outstanding()?;
        self.store
            .nack(&self.topic, self.ack_offset)
            .map_err(|source| BrokerError::NackFailed {
                topic: self.topic_name().into_owned(),
                offset: self.ack_offset,
                source,
            })?;
        self.outstanding = false;

        Ok(())
    }

    /// True once the broker has unsubscribed this handle.
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Cuts the handle off from its topic. Nothing it pulls afterwards could
    /// be settled by anyone, so `next` refuses from here on.
    pub(crate) fn detach(&mut self) {
        self.detached = true;
    }

    /// Hands out the notification receiver. There is a single reader, so
    /// only the first call returns `Some`.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<EventKind>> {
        self.events.take()
    }

    fn ensure_outstanding(&self) -> BrokerResult<()> {
        if self.outstanding {
            Ok(())
        } else {
            Err(BrokerError::NoOutstandingDelivery {
                id: self.id.clone(),
            })
        }
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.id)
            .field("topic", &self.topic_name())
            .field("ack_offset", &self.ack_offset)
            .field("outstanding", &self.outstanding)
            .field("detached", &self.detached)
            .finish()
    }
}
