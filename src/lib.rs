//! # popq
//!
//! `popq` is a small persistent message broker. Producers publish opaque
//! payloads under named topics; consumers subscribe, pull one message at a
//! time and must ack it (commit) or nack it (put it back at the front of the
//! queue). Delivery is at-least-once.
//!
//! ## Core Modules
//!
//! - `store`: the persistent per-topic queue on top of an ordered key-value
//!   engine (`sled` by default), including the value and key encodings.
//! - `consumer`: the per-subscription handle used to pull, ack and nack.
//! - `broker`: maps topics to consumers and wakes them on publish.
//! - `config`: loads server, storage and broker settings.
//! - `transport`: the WebSocket server speaking a small JSON protocol.
//! - `utils`: error types and logging setup.

pub mod broker;
pub mod config;
pub mod consumer;
pub mod store;
pub mod transport;
pub mod utils;

pub use broker::Broker;
pub use consumer::{Consumer, EventKind, SharedConsumer};
pub use store::{QueueStore, Store, Value};
pub use utils::error::{BrokerError, StoreError};
