use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::store::engine::{KvEngine, KvTxn};
use crate::utils::error::StoreResult;

/// Volatile engine backed by a `BTreeMap`. Useful for tests and for running
/// the broker without a data directory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct MemoryTxn<'a> {
    base: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    // None marks a staged delete
    writes: RefCell<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl KvTxn for MemoryTxn<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(staged) = self.writes.borrow().get(key) {
            return Ok(staged.clone());
        }
        Ok(self.base.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.writes
            .borrow_mut()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let existed = self.get(key)?.is_some();
        self.writes.borrow_mut().insert(key.to_vec(), None);
        Ok(existed)
    }
}

impl KvEngine for MemoryEngine {
    fn transaction<T>(&self, f: &dyn Fn(&dyn KvTxn) -> StoreResult<T>) -> StoreResult<T> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);

        let txn = MemoryTxn {
            base: &map,
            writes: RefCell::new(BTreeMap::new()),
        };
        let out = f(&txn)?;
        let writes = txn.writes.into_inner();

        for (key, staged) in writes {
            match staged {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }

        Ok(out)
    }

    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}
