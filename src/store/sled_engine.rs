//! sled-backed engine.
//!
//! All queue keys live in the default tree. Transactions map directly onto
//! `Tree::transaction`; an error returned by the queue logic aborts it.

use std::path::Path;

use sled::Db;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree, UnabortableTransactionError,
};

use crate::store::engine::{KvEngine, KvTxn};
use crate::utils::error::{StoreError, StoreResult};

/// Engine over one sled database; every key lives in its default tree.
#[derive(Clone)]
pub struct SledEngine {
    db: Db,
}

impl SledEngine {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl std::fmt::Debug for SledEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledEngine")
            .field("db", &"sled::Db")
            .finish()
    }
}

struct SledTxn<'a>(&'a TransactionalTree);

// The queue store serializes all transactions behind its own lock, so a
// conflict here means something outside the store touched the tree. It is
// reported as a storage failure and aborts instead of taking sled's retry.
fn unabortable(err: UnabortableTransactionError) -> StoreError {
    match err {
        UnabortableTransactionError::Conflict => StoreError::storage("transaction conflict"),
        UnabortableTransactionError::Storage(err) => err.into(),
    }
}

impl KvTxn for SledTxn<'_> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let found = self.0.get(key).map_err(unabortable)?;
        Ok(found.map(|v| v.to_vec()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        self.0.insert(key, value).map_err(unabortable)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> StoreResult<bool> {
        let old = self.0.remove(key).map_err(unabortable)?;
        Ok(old.is_some())
    }
}

impl KvEngine for SledEngine {
    fn transaction<T>(&self, f: &dyn Fn(&dyn KvTxn) -> StoreResult<T>) -> StoreResult<T> {
        self.db
            .transaction(|tree| f(&SledTxn(tree)).map_err(ConflictableTransactionError::Abort))
            .map_err(|err| match err {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => err.into(),
            })
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
