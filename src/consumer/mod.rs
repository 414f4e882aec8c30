//! The `consumer` module defines the per-subscription handle.
//!
//! A `Consumer` is created by the broker on subscribe. It remembers the ack
//! offset of the delivery it is holding and owns the receiving end of a
//! one-slot notification channel the broker uses to signal new activity.

pub mod handle;
pub use handle::{Consumer, ConsumerId, EventKind, NOTIFY_CAPACITY, SharedConsumer};
