//! Storage collaborators for geotdb.
//!
//! The cascade engine only needs keyed reads, ordered prefix scans and an
//! all-or-nothing batch apply. [`MemoryStore`] and [`SledStore`] provide
//! those over a `BTreeMap` and over sled trees respectively.

mod batch;
mod config;
mod memory;
mod sled_store;

use std::sync::Arc;

use geotdb_proto::{CompositeKey, Row, Value};

use crate::error::Error;

pub use batch::{StorageOp, WriteBatch};
pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Row storage keyed by `(level, composite key)`.
pub trait Storage: Send + Sync {
    /// Get a row by its full key.
    fn get(&self, level: &str, key: &CompositeKey) -> Result<Option<Row>, Error>;

    /// Every row of `level` whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, level: &str, prefix: &[Value]) -> Result<Vec<Row>, Error>;

    /// Apply a batch atomically: either every operation takes effect or
    /// none does.
    fn apply(&self, batch: WriteBatch) -> Result<(), Error>;

    /// Check if a row exists.
    fn contains(&self, level: &str, key: &CompositeKey) -> Result<bool, Error> {
        Ok(self.get(level, key)?.is_some())
    }

    /// Store a single row.
    fn put(&self, level: &str, row: Row) -> Result<(), Error> {
        let mut batch = WriteBatch::new();
        batch.put(level, row);
        self.apply(batch)
    }

    /// Remove a single row. Fails with `NotFound` if it is absent.
    fn delete(&self, level: &str, key: &CompositeKey) -> Result<(), Error> {
        let mut batch = WriteBatch::new();
        batch.delete(level, key.clone());
        self.apply(batch)
    }
}

impl<T: Storage + ?Sized> Storage for Arc<T> {
    fn get(&self, level: &str, key: &CompositeKey) -> Result<Option<Row>, Error> {
        (**self).get(level, key)
    }

    fn scan_prefix(&self, level: &str, prefix: &[Value]) -> Result<Vec<Row>, Error> {
        (**self).scan_prefix(level, prefix)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), Error> {
        (**self).apply(batch)
    }
}
