//! Persistent per-topic queue on top of a [`KvEngine`].
//!
//! Each topic has a ready region `[head, tail)` of undelivered values and an
//! in-flight region of delivered values keyed by their own `ack_tail`
//! sequence. Cursors are stored at sentinel offsets next to the data (see
//! [`keys`](crate::store::keys)).
//!
//! Every operation runs inside one engine transaction while holding the
//! store-wide lock, so cursor read-modify-write sequences never interleave.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use crate::store::engine::{KvEngine, KvTxn};
use crate::store::keys::{Region, decode_cursor, encode_cursor, encode_key, head_key, tail_key};
use crate::store::sled_engine::SledEngine;
use crate::store::value::Value;
use crate::store::{Store, TopicStats};
use crate::utils::error::{StoreError, StoreResult};

/// Topic-scoped persistent queue. Sled-backed unless another engine is
/// given to [`QueueStore::new`].
pub struct QueueStore<E: KvEngine = SledEngine> {
    engine: Mutex<Option<E>>,
}

impl QueueStore<SledEngine> {
    /// Open or create a sled-backed store at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        Ok(Self::new(SledEngine::open(path)?))
    }
}

impl<E: KvEngine> QueueStore<E> {
    /// Wraps an already opened engine.
    pub fn new(engine: E) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<E>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_txn<T>(
        &self,
        topic: &[u8],
        f: &dyn Fn(&dyn KvTxn) -> StoreResult<T>,
    ) -> StoreResult<T> {
        if topic.is_empty() {
            return Err(StoreError::InvalidTopic);
        }
        let guard = self.lock();
        let engine = guard.as_ref().ok_or(StoreError::StoreClosed)?;
        engine.transaction(f)
    }
}

fn topic_name(topic: &[u8]) -> String {
    String::from_utf8_lossy(topic).into_owned()
}

fn read_cursor(tx: &dyn KvTxn, topic: &[u8], key: &[u8]) -> StoreResult<Option<u64>> {
    tx.get(key)?
        .map(|raw| decode_cursor(topic, &raw))
        .transpose()
}

fn write_cursor(tx: &dyn KvTxn, key: &[u8], pos: u64) -> StoreResult<()> {
    tx.put(key, &encode_cursor(pos))
}

impl<E: KvEngine> Store for QueueStore<E> {
    fn insert(&self, topic: &[u8], value: &Value) -> StoreResult<u64> {
        let encoded = value.encode();

        let offset = self.with_txn(topic, &|tx: &dyn KvTxn| {
            let tail_cursor = tail_key(Region::Primary, topic);

            if !tx.has(&tail_cursor)? {
                write_cursor(tx, &head_key(topic), 0)?;
                write_cursor(tx, &tail_key(Region::Ack, topic), 0)?;
                write_cursor(tx, &tail_cursor, 1)?;
                tx.put(&encode_key(Region::Primary, topic, 0), &encoded)?;
                return Ok(0);
            }

            let tail = read_cursor(tx, topic, &tail_cursor)?.unwrap_or_default();
            tx.put(&encode_key(Region::Primary, topic, tail), &encoded)?;
            write_cursor(tx, &tail_cursor, tail + 1)?;
            Ok(tail)
        })?;

        trace!(topic = %topic_name(topic), offset, "inserted value");
        Ok(offset)
    }

    fn get_next(&self, topic: &[u8]) -> StoreResult<(Value, u64)> {
        let empty = || StoreError::EmptyTopic {
            topic: topic_name(topic),
        };

        let (value, ack_offset) = self.with_txn(topic, &|tx: &dyn KvTxn| {
            let head_cursor = head_key(topic);
            let head = read_cursor(tx, topic, &head_cursor)?.ok_or_else(empty)?;

            let data_key = encode_key(Region::Primary, topic, head);
            let raw = tx.get(&data_key)?.ok_or_else(empty)?;
            let value = Value::decode(&raw)?;

            let ack_tail_cursor = tail_key(Region::Ack, topic);
            let ack_offset = read_cursor(tx, topic, &ack_tail_cursor)?.ok_or_else(|| {
                StoreError::invariant(format!(
                    "topic '{}' has a head cursor but no ack tail",
                    topic_name(topic)
                ))
            })?;

            tx.put(&encode_key(Region::Ack, topic, ack_offset), &raw)?;
            write_cursor(tx, &ack_tail_cursor, ack_offset + 1)?;
            tx.delete(&data_key)?;
            write_cursor(tx, &head_cursor, head + 1)?;

            Ok((value, ack_offset))
        })?;

        trace!(topic = %topic_name(topic), ack_offset, "delivered value");
        Ok((value, ack_offset))
    }

    fn ack(&self, topic: &[u8], ack_offset: u64) -> StoreResult<()> {
        let in_flight_key = encode_key(Region::Ack, topic, ack_offset);
        let removed = self.with_txn(topic, &|tx: &dyn KvTxn| tx.delete(&in_flight_key))?;

        if !removed {
            debug!(topic = %topic_name(topic), ack_offset, "ack of unknown delivery ignored");
        }
        Ok(())
    }

    fn nack(&self, topic: &[u8], ack_offset: u64) -> StoreResult<()> {
        let requeued = self.with_txn(topic, &|tx: &dyn KvTxn| {
            let in_flight_key = encode_key(Region::Ack, topic, ack_offset);
            let Some(raw) = tx.get(&in_flight_key)? else {
                return Ok(None);
            };
            // reject corrupt entries before they re-enter the ready region
            Value::decode(&raw)?;

            let head_cursor = head_key(topic);
            let head = read_cursor(tx, topic, &head_cursor)?.ok_or_else(|| {
                StoreError::invariant(format!(
                    "in-flight delivery {ack_offset} on uninitialized topic '{}'",
                    topic_name(topic)
                ))
            })?;
            let new_head = head.checked_sub(1).ok_or_else(|| {
                StoreError::invariant(format!(
                    "nack of delivery {ack_offset} would move head of '{}' below zero",
                    topic_name(topic)
                ))
            })?;

            tx.put(&encode_key(Region::Primary, topic, new_head), &raw)?;
            write_cursor(tx, &head_cursor, new_head)?;
            tx.delete(&in_flight_key)?;

            Ok(Some(new_head))
        })?;

        match requeued {
            Some(head) => trace!(topic = %topic_name(topic), ack_offset, head, "requeued value"),
            None => warn!(topic = %topic_name(topic), ack_offset, "nack of unknown delivery ignored"),
        }
        Ok(())
    }

    fn purge(&self, topic: &[u8]) -> StoreResult<u64> {
        let removed = self.with_txn(topic, &|tx: &dyn KvTxn| {
            let head_cursor = head_key(topic);
            let Some(head) = read_cursor(tx, topic, &head_cursor)? else {
                return Ok(0);
            };
            let tail = read_cursor(tx, topic, &tail_key(Region::Primary, topic))?.unwrap_or(head);

            for offset in head..tail {
                tx.delete(&encode_key(Region::Primary, topic, offset))?;
            }
            write_cursor(tx, &head_cursor, tail)?;

            Ok(tail.saturating_sub(head))
        })?;

        debug!(topic = %topic_name(topic), removed, "purged ready values");
        Ok(removed)
    }

    fn stats(&self, topic: &[u8]) -> StoreResult<TopicStats> {
        self.with_txn(topic, &|tx: &dyn KvTxn| {
            Ok(TopicStats {
                head: read_cursor(tx, topic, &head_key(topic))?.unwrap_or_default(),
                tail: read_cursor(tx, topic, &tail_key(Region::Primary, topic))?
                    .unwrap_or_default(),
                ack_tail: read_cursor(tx, topic, &tail_key(Region::Ack, topic))?
                    .unwrap_or_default(),
            })
        })
    }

    fn close(&self) -> StoreResult<()> {
        let engine = self.lock().take().ok_or(StoreError::StoreClosed)?;
        engine.flush()?;
        debug!("queue store closed");
        Ok(())
    }
}

impl<E: KvEngine> std::fmt::Debug for QueueStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("open", &self.lock().is_some())
            .finish()
    }
}
