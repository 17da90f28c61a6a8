//! Write batches handed to a storage collaborator.

use std::collections::BTreeSet;

use geotdb_proto::{CompositeKey, Row};

/// A single write within a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageOp {
    /// Insert or overwrite a row.
    Put {
        /// Level name.
        level: String,
        /// Row to store under `row.key`.
        row: Row,
    },
    /// Remove an existing row.
    Delete {
        /// Level name.
        level: String,
        /// Key of the row to remove.
        key: CompositeKey,
    },
}

impl StorageOp {
    /// Level the operation writes to.
    pub fn level(&self) -> &str {
        match self {
            StorageOp::Put { level, .. } | StorageOp::Delete { level, .. } => level,
        }
    }

    /// Key the operation writes.
    pub fn key(&self) -> &CompositeKey {
        match self {
            StorageOp::Put { row, .. } => &row.key,
            StorageOp::Delete { key, .. } => key,
        }
    }
}

/// An ordered list of writes applied all-or-nothing.
///
/// Operations are applied in order, so a batch may delete a key and put a
/// new row under it. A `Delete` of a row that is absent at that point fails
/// the whole batch with [`Error::NotFound`](crate::Error::NotFound).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<StorageOp>,
}

impl WriteBatch {
    /// Begin an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put.
    pub fn put(&mut self, level: impl Into<String>, row: Row) {
        self.ops.push(StorageOp::Put {
            level: level.into(),
            row,
        });
    }

    /// Queue a delete.
    pub fn delete(&mut self, level: impl Into<String>, key: CompositeKey) {
        self.ops.push(StorageOp::Delete {
            level: level.into(),
            key,
        });
    }

    /// Queued operations in apply order.
    pub fn ops(&self) -> &[StorageOp] {
        &self.ops
    }

    /// Consume the batch, returning its operations.
    pub fn into_ops(self) -> Vec<StorageOp> {
        self.ops
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Discard every queued operation.
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Distinct levels touched by the batch.
    pub fn levels(&self) -> BTreeSet<&str> {
        self.ops.iter().map(StorageOp::level).collect()
    }
}
