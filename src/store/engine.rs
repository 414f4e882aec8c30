//! Ordered key-value engine abstraction used by the queue store.
//!
//! The queue logic only needs point reads and writes inside an atomic
//! transaction, so any engine with snapshot-isolated transactions fits.

use crate::utils::error::StoreResult;

/// View of the engine inside a transaction. Writes become visible to later
/// reads in the same transaction and reach the engine only on commit.
pub trait KvTxn {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Removes `key`, returning whether it was present.
    fn delete(&self, key: &[u8]) -> StoreResult<bool>;
}

/// Ordered key-value backend of a `QueueStore`.
///
/// Implementations must apply all writes of a transaction or none of them,
/// and later transactions must observe every committed write. The queue
/// store never runs two transactions on one engine at the same time.
pub trait KvEngine: Send + Sync {
    /// Runs `f` atomically. When `f` returns an error nothing it wrote is
    /// applied and the error is returned as-is.
    fn transaction<T>(&self, f: &dyn Fn(&dyn KvTxn) -> StoreResult<T>) -> StoreResult<T>;

    /// Makes every committed write durable.
    fn flush(&self) -> StoreResult<()>;
}
