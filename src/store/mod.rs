//! The `store` module owns everything that touches disk.
//!
//! Messages are kept per topic in an ordered key-value engine (`sled` by
//! default). A topic is an offset-addressed log with a ready region that
//! consumers pull from and an in-flight region holding deliveries until they
//! are acknowledged or returned with a nack.
//!
//! Nothing outside this module reads or writes the engine.

pub mod engine;
pub mod keys;
pub mod memory;
pub mod queue;
pub mod sled_engine;
pub mod value;

pub use engine::{KvEngine, KvTxn};
pub use memory::MemoryEngine;
pub use queue::QueueStore;
pub use sled_engine::SledEngine;
pub use value::Value;

use crate::utils::error::StoreResult;

/// Cursor snapshot of one topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub head: u64,
    pub tail: u64,
    pub ack_tail: u64,
}

impl TopicStats {
    /// Number of values waiting to be delivered.
    pub fn ready(&self) -> u64 {
        self.tail.saturating_sub(self.head)
    }
}

/// Topic-scoped persistent queue operations.
///
/// Topics are non-empty byte strings and come into existence on their first
/// insert.
pub trait Store: Send + Sync {
    /// Appends `value` to the ready region and returns its offset.
    fn insert(&self, topic: &[u8], value: &Value) -> StoreResult<u64>;

    /// Moves the value at the head into the in-flight region and returns it
    /// with the ack offset needed to later ack or nack it.
    fn get_next(&self, topic: &[u8]) -> StoreResult<(Value, u64)>;

    /// Drops the in-flight value at `ack_offset` for good. Acking an offset
    /// that is not in flight (already acked or nacked) changes nothing.
    fn ack(&self, topic: &[u8], ack_offset: u64) -> StoreResult<()>;

    /// Puts an in-flight value back at the front of the ready region, ahead
    /// of everything still pending.
    ///
    /// A nack of an offset that is not in flight is a logged no-op, so a
    /// late nack never resurrects an acked value. Fails with
    /// `InvariantViolation` when the head cursor is already at zero.
    fn nack(&self, topic: &[u8], ack_offset: u64) -> StoreResult<()>;

    /// Drops every undelivered value; returns how many were removed.
    fn purge(&self, topic: &[u8]) -> StoreResult<u64>;

    /// Consistent snapshot of the topic's cursors. An uninitialized topic
    /// reports all zeros.
    fn stats(&self, topic: &[u8]) -> StoreResult<TopicStats>;

    /// Flushes and releases the engine. Every later call, a second `close`
    /// included, fails with `StoreClosed`.
    fn close(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests;
