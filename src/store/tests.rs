#[cfg(test)]
mod store_tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tempfile::{TempDir, tempdir};

    use crate::store::keys::{self, Region};
    use crate::store::{KvEngine, KvTxn, MemoryEngine, QueueStore, Store, TopicStats, Value};
    use crate::utils::error::{StoreError, StoreResult};

    const TOPIC: &[u8] = b"topic";

    // keep the TempDir alive for as long as the store is in use
    fn create_test_store() -> (QueueStore, TempDir) {
        let dir = tempdir().unwrap();
        let store = QueueStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn memory_store() -> QueueStore<MemoryEngine> {
        QueueStore::new(MemoryEngine::new())
    }

    /// Runs every transaction normally but refuses to commit while `fail` is
    /// set, so the inner engine discards the writes.
    struct FailingEngine {
        inner: MemoryEngine,
        fail: Arc<AtomicBool>,
    }

    impl KvEngine for FailingEngine {
        fn transaction<T>(&self, f: &dyn Fn(&dyn KvTxn) -> StoreResult<T>) -> StoreResult<T> {
            self.inner.transaction(&|tx: &dyn KvTxn| {
                let out = f(tx)?;
                if self.fail.load(Ordering::SeqCst) {
                    return Err(StoreError::storage("injected commit failure"));
                }
                Ok(out)
            })
        }

        fn flush(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_value_roundtrip() {
        let value = Value {
            delivery_count: 7,
            payload: b"payload".to_vec(),
        };
        let encoded = value.encode();

        assert_eq!(&encoded[..4], &7u32.to_le_bytes());
        assert_eq!(Value::decode(&encoded).unwrap(), value);
        assert_eq!(Value::decode(&encoded).unwrap().encode(), encoded);
    }

    #[test]
    fn test_value_empty_payload_is_valid() {
        let value = Value::decode(&[1, 0, 0, 0]).unwrap();
        assert_eq!(value.delivery_count, 1);
        assert!(value.payload.is_empty());
    }

    #[test]
    fn test_value_decode_rejects_short_buffer() {
        let err = Value::decode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::MalformedValue {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_key_layout() {
        let key = keys::encode_key(Region::Ack, b"jobs", 258);
        assert_eq!(key[0], 2);
        assert_eq!(&key[1..9], &258u64.to_le_bytes());
        assert_eq!(&key[9..], b"jobs");

        let head = keys::head_key(b"jobs");
        assert_eq!(head[0], 1);
        assert_eq!(&head[1..9], &(u64::MAX - 1).to_le_bytes());

        assert!(matches!(
            keys::decode_cursor(b"jobs", &[1, 2, 3]),
            Err(StoreError::CorruptCursor { len: 3, .. })
        ));
    }

    #[test]
    fn test_memory_engine_rolls_back_on_error() {
        let engine = MemoryEngine::new();
        engine
            .transaction(&|tx: &dyn KvTxn| tx.put(b"kept", b"1"))
            .unwrap();

        let result: StoreResult<()> = engine.transaction(&|tx: &dyn KvTxn| {
            tx.put(b"dropped", b"2")?;
            assert!(tx.delete(b"kept")?);
            assert!(!tx.has(b"kept")?);
            Err(StoreError::storage("abort"))
        });
        assert!(result.is_err());

        let (kept, dropped) = engine
            .transaction(&|tx: &dyn KvTxn| Ok((tx.get(b"kept")?, tx.has(b"dropped")?)))
            .unwrap();
        assert_eq!(kept.as_deref(), Some(&b"1"[..]));
        assert!(!dropped);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_insert_single() {
        let (store, _dir) = create_test_store();

        assert_eq!(store.insert(TOPIC, &Value::new("new_value")).unwrap(), 0);
        let (value, offset) = store.get_next(TOPIC).unwrap();

        assert_eq!(value.payload, b"new_value");
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_get_next_is_fifo() {
        let (store, _dir) = create_test_store();
        let msgs = ["test_value_1", "test_value_2", "test_value_3"].map(Value::new);

        for (i, msg) in msgs.iter().enumerate() {
            assert_eq!(store.insert(TOPIC, msg).unwrap(), i as u64);
        }

        for (i, msg) in msgs.iter().enumerate() {
            let (value, offset) = store.get_next(TOPIC).unwrap();
            assert_eq!(&value, msg);
            assert_eq!(offset, i as u64);
        }
    }

    #[test]
    fn test_topics_are_independent() {
        let store = memory_store();
        store.insert(b"a", &Value::new("a1")).unwrap();
        store.insert(b"b", &Value::new("b1")).unwrap();
        store.insert(b"a", &Value::new("a2")).unwrap();

        assert_eq!(store.get_next(b"b").unwrap().0.payload, b"b1");
        assert!(matches!(
            store.get_next(b"b"),
            Err(StoreError::EmptyTopic { .. })
        ));
        assert_eq!(store.get_next(b"a").unwrap(), (Value::new("a1"), 0));
        assert_eq!(store.get_next(b"a").unwrap(), (Value::new("a2"), 1));
    }

    #[test]
    fn test_nack_reorders_to_front() {
        let (store, _dir) = create_test_store();
        store.insert(TOPIC, &Value::new("m1")).unwrap();
        store.insert(TOPIC, &Value::new("m2")).unwrap();

        let (value, offset) = store.get_next(TOPIC).unwrap();
        assert_eq!(value.payload, b"m1");
        assert_eq!(offset, 0);

        store.nack(TOPIC, offset).unwrap();

        let (value, offset) = store.get_next(TOPIC).unwrap();
        assert_eq!(value.payload, b"m1");
        assert_eq!(offset, 1);
        assert_eq!(store.get_next(TOPIC).unwrap().0.payload, b"m2");
    }

    #[test]
    fn test_nack_keeps_delivery_count() {
        let store = memory_store();
        let value = Value {
            delivery_count: 3,
            payload: b"counted".to_vec(),
        };
        store.insert(TOPIC, &value).unwrap();

        let (_, offset) = store.get_next(TOPIC).unwrap();
        store.nack(TOPIC, offset).unwrap();

        assert_eq!(store.get_next(TOPIC).unwrap().0, value);
    }

    #[test]
    fn test_in_flight_entries_are_independent() {
        let store = memory_store();
        for msg in ["m1", "m2", "m3"] {
            store.insert(TOPIC, &Value::new(msg)).unwrap();
        }
        let (_, first) = store.get_next(TOPIC).unwrap();
        let (_, second) = store.get_next(TOPIC).unwrap();

        store.nack(TOPIC, second).unwrap();
        store.ack(TOPIC, first).unwrap();

        assert_eq!(store.get_next(TOPIC).unwrap().0.payload, b"m2");
        assert_eq!(store.get_next(TOPIC).unwrap().0.payload, b"m3");
    }

    #[test]
    fn test_ack_is_permanent() {
        let (store, _dir) = create_test_store();
        store.insert(TOPIC, &Value::new("once")).unwrap();
        let (_, offset) = store.get_next(TOPIC).unwrap();

        store.ack(TOPIC, offset).unwrap();
        store.ack(TOPIC, offset).unwrap();
        store.nack(TOPIC, offset).unwrap();

        assert!(matches!(
            store.get_next(TOPIC),
            Err(StoreError::EmptyTopic { .. })
        ));
        let stats = store.stats(TOPIC).unwrap();
        assert_eq!(stats.ready(), 0);
        assert_eq!(stats.ack_tail, 1);
    }

    #[test]
    fn test_empty_topic() {
        let store = memory_store();
        assert!(matches!(
            store.get_next(TOPIC),
            Err(StoreError::EmptyTopic { .. })
        ));

        store.insert(TOPIC, &Value::new("only")).unwrap();
        let (_, offset) = store.get_next(TOPIC).unwrap();
        store.ack(TOPIC, offset).unwrap();

        assert!(matches!(
            store.get_next(TOPIC),
            Err(StoreError::EmptyTopic { .. })
        ));
    }

    #[test]
    fn test_insert_after_drain_continues_offsets() {
        let store = memory_store();
        store.insert(TOPIC, &Value::new("m1")).unwrap();
        store.get_next(TOPIC).unwrap();

        assert_eq!(store.insert(TOPIC, &Value::new("m2")).unwrap(), 1);
        assert_eq!(store.get_next(TOPIC).unwrap(), (Value::new("m2"), 1));
    }

    #[test]
    fn test_empty_topic_name_is_rejected() {
        let store = memory_store();
        assert!(matches!(
            store.insert(b"", &Value::new("x")),
            Err(StoreError::InvalidTopic)
        ));
        assert!(matches!(store.get_next(b""), Err(StoreError::InvalidTopic)));
    }

    #[test]
    fn test_nack_below_zero_is_invariant_violation() {
        let engine = MemoryEngine::new();
        let in_flight = keys::encode_key(Region::Ack, TOPIC, 0);
        let head = keys::head_key(TOPIC);
        engine
            .transaction(&|tx: &dyn KvTxn| {
                tx.put(&head, &keys::encode_cursor(0))?;
                tx.put(&in_flight, &Value::new("orphan").encode())
            })
            .unwrap();
        let store = QueueStore::new(engine);

        let err = store.nack(TOPIC, 0).unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));
        assert_eq!(store.stats(TOPIC).unwrap().head, 0);
    }

    #[test]
    fn test_failed_commit_leaves_no_partial_state() {
        let fail = Arc::new(AtomicBool::new(false));
        let store = QueueStore::new(FailingEngine {
            inner: MemoryEngine::new(),
            fail: fail.clone(),
        });

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            store.insert(TOPIC, &Value::new("lost")),
            Err(StoreError::Storage { .. })
        ));
        fail.store(false, Ordering::SeqCst);
        assert_eq!(store.stats(TOPIC).unwrap(), TopicStats::default());

        store.insert(TOPIC, &Value::new("m1")).unwrap();
        fail.store(true, Ordering::SeqCst);
        assert!(store.insert(TOPIC, &Value::new("m2")).is_err());
        assert!(store.get_next(TOPIC).is_err());
        fail.store(false, Ordering::SeqCst);

        let (value, offset) = store.get_next(TOPIC).unwrap();
        assert_eq!(value.payload, b"m1");

        fail.store(true, Ordering::SeqCst);
        assert!(store.nack(TOPIC, offset).is_err());
        fail.store(false, Ordering::SeqCst);

        let stats = store.stats(TOPIC).unwrap();
        assert_eq!(
            stats,
            TopicStats {
                head: 1,
                tail: 1,
                ack_tail: 1
            }
        );
        store.nack(TOPIC, offset).unwrap();
        assert_eq!(store.get_next(TOPIC).unwrap().0.payload, b"m1");
    }

    #[test]
    fn test_purge_drops_ready_values_only() {
        let store = memory_store();
        for msg in ["m1", "m2", "m3"] {
            store.insert(TOPIC, &Value::new(msg)).unwrap();
        }
        let (_, in_flight) = store.get_next(TOPIC).unwrap();

        assert_eq!(store.purge(TOPIC).unwrap(), 2);
        assert!(matches!(
            store.get_next(TOPIC),
            Err(StoreError::EmptyTopic { .. })
        ));

        store.nack(TOPIC, in_flight).unwrap();
        assert_eq!(store.get_next(TOPIC).unwrap().0.payload, b"m1");
        assert_eq!(store.purge(b"unknown").unwrap(), 0);
    }

    #[test]
    fn test_stats_track_cursors() {
        let store = memory_store();
        assert_eq!(store.stats(TOPIC).unwrap(), TopicStats::default());

        store.insert(TOPIC, &Value::new("m1")).unwrap();
        store.insert(TOPIC, &Value::new("m2")).unwrap();
        store.get_next(TOPIC).unwrap();

        let stats = store.stats(TOPIC).unwrap();
        assert_eq!(stats.head, 1);
        assert_eq!(stats.tail, 2);
        assert_eq!(stats.ack_tail, 1);
        assert_eq!(stats.ready(), 1);
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        let (store, _dir) = create_test_store();
        store.insert(TOPIC, &Value::new("m1")).unwrap();
        store.close().unwrap();

        assert!(matches!(
            store.insert(TOPIC, &Value::new("m2")),
            Err(StoreError::StoreClosed)
        ));
        assert!(matches!(store.get_next(TOPIC), Err(StoreError::StoreClosed)));
        assert!(matches!(store.ack(TOPIC, 0), Err(StoreError::StoreClosed)));
        assert!(matches!(store.nack(TOPIC, 0), Err(StoreError::StoreClosed)));
        assert!(matches!(store.close(), Err(StoreError::StoreClosed)));
    }

    #[test]
    fn test_cursors_survive_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = QueueStore::open(dir.path()).unwrap();
            store.insert(TOPIC, &Value::new("m1")).unwrap();
            store.insert(TOPIC, &Value::new("m2")).unwrap();
            store.insert(TOPIC, &Value::new("m3")).unwrap();
            let (_, offset) = store.get_next(TOPIC).unwrap();
            store.ack(TOPIC, offset).unwrap();
            store.get_next(TOPIC).unwrap();
            store.close().unwrap();
        }

        let store = QueueStore::open(dir.path()).unwrap();
        assert_eq!(
            store.stats(TOPIC).unwrap(),
            TopicStats {
                head: 2,
                tail: 3,
                ack_tail: 2
            }
        );
        // the unacknowledged m2 is still in flight at ack offset 1
        store.nack(TOPIC, 1).unwrap();
        assert_eq!(store.get_next(TOPIC).unwrap(), (Value::new("m2"), 2));
        assert_eq!(store.get_next(TOPIC).unwrap(), (Value::new("m3"), 3));
    }
}
