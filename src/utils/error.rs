//! The `error` module defines the error types shared by the store, the
//! consumer handles and the broker.
//!
//! Store errors travel through the consumer and the broker unchanged. Nothing
//! in this crate retries on its own; that decision belongs to the caller.

use thiserror::Error;

/// Result alias for queue store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result alias for broker and consumer operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored value was shorter than its delivery-count header.
    #[error("malformed value: expected at least {expected} bytes, got {actual}")]
    MalformedValue { expected: usize, actual: usize },

    /// The key-value engine failed (I/O, aborted transaction).
    #[error("storage engine failure: {reason}")]
    Storage { reason: String },

    /// Nothing is ready to be delivered on this topic.
    #[error("topic '{topic}' has no ready messages")]
    EmptyTopic { topic: String },

    #[error("queue store is closed")]
    StoreClosed,

    /// The persisted cursors contradict each other, e.g. a Nack that would
    /// move the head below zero.
    #[error("queue invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("topic name must not be empty")]
    InvalidTopic,

    #[error("cursor record for topic '{topic}' is {len} bytes, expected 8")]
    CorruptCursor { topic: String, len: usize },
}

impl StoreError {
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::Storage {
            reason: reason.into(),
        }
    }

    pub fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        Self::storage(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("consumer with id [{id}] not found for topic: {topic}")]
    ConsumerNotFound { id: String, topic: String },

    #[error("failed to acknowledge topic [{topic}] with offset [{offset}]: {source}")]
    AckFailed {
        topic: String,
        offset: u64,
        #[source]
        source: StoreError,
    },

    #[error("failed to nack topic [{topic}] with offset [{offset}]: {source}")]
    NackFailed {
        topic: String,
        offset: u64,
        #[source]
        source: StoreError,
    },

    /// The consumer already holds an unacknowledged delivery.
    #[error("consumer [{id}] still awaits acknowledgement of offset [{offset}]")]
    DeliveryOutstanding { id: String, offset: u64 },

    #[error("consumer [{id}] has no outstanding delivery")]
    NoOutstandingDelivery { id: String },

    /// The handle was unsubscribed and may no longer pull from its topic.
    #[error("consumer [{id}] is no longer subscribed")]
    ConsumerDetached { id: String },
}

impl BrokerError {
    /// True when the error only means "nothing to deliver right now".
    pub fn is_empty_topic(&self) -> bool {
        matches!(self, Self::Store(StoreError::EmptyTopic { .. }))
    }
}
