//! sled-backed storage collaborator.

use dashmap::DashMap;
use geotdb_proto::{CompositeKey, Row, Value};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::debug;

use super::{Storage, StorageConfig, StorageOp, WriteBatch};
use crate::error::Error;

/// Prefix for per-level trees.
const LEVEL_TREE_PREFIX: &str = "level:";

/// A write with its key and row already encoded, so the transaction body
/// can be retried without re-serializing.
struct EncodedOp {
    tree: usize,
    key: Vec<u8>,
    value: Option<Vec<u8>>,
    level: String,
    composite: CompositeKey,
}

/// Store with one sled tree per level.
///
/// Keys use the order-preserving [`CompositeKey::encode`] encoding, so
/// prefix scans return rows in key order. Rows are encoded with rkyv.
pub struct SledStore {
    db: Db,
    trees: DashMap<String, Tree>,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        Ok(Self {
            db,
            trees: DashMap::new(),
        })
    }

    /// Check if the database was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Flush dirty pages to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, level: &str) -> Result<Tree, Error> {
        if let Some(tree) = self.trees.get(level) {
            return Ok(tree.clone());
        }
        let tree = self
            .db
            .open_tree(format!("{}{}", LEVEL_TREE_PREFIX, level))?;
        self.trees.insert(level.to_string(), tree.clone());
        Ok(tree)
    }

    fn encode(&self, batch: WriteBatch) -> Result<(Vec<Tree>, Vec<EncodedOp>), Error> {
        let mut levels: Vec<String> = Vec::new();
        let mut trees = Vec::new();
        let mut encoded = Vec::with_capacity(batch.len());

        for op in batch.into_ops() {
            let tree = match levels.iter().position(|l| l == op.level()) {
                Some(i) => i,
                None => {
                    trees.push(self.tree(op.level())?);
                    levels.push(op.level().to_string());
                    levels.len() - 1
                }
            };

            encoded.push(match op {
                StorageOp::Put { level, row } => EncodedOp {
                    tree,
                    key: row.key.encode(),
                    value: Some(row.to_bytes()?),
                    level,
                    composite: row.key,
                },
                StorageOp::Delete { level, key } => EncodedOp {
                    tree,
                    key: key.encode(),
                    value: None,
                    level,
                    composite: key,
                },
            });
        }

        Ok((trees, encoded))
    }
}

impl Storage for SledStore {
    fn get(&self, level: &str, key: &CompositeKey) -> Result<Option<Row>, Error> {
        match self.tree(level)?.get(key.encode())? {
            Some(bytes) => Ok(Some(Row::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, level: &str, prefix: &[Value]) -> Result<Vec<Row>, Error> {
        let tree = self.tree(level)?;
        let mut rows = Vec::new();
        for item in tree.scan_prefix(CompositeKey::encode_values(prefix)) {
            let (_, bytes) = item?;
            rows.push(Row::from_bytes(&bytes)?);
        }
        Ok(rows)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }

        let (trees, ops) = self.encode(batch)?;

        let result: Result<(), TransactionError<Error>> = trees.as_slice().transaction(|txs| {
            for op in &ops {
                let tx = &txs[op.tree];
                match &op.value {
                    Some(bytes) => {
                        tx.insert(op.key.as_slice(), bytes.as_slice())?;
                    }
                    None => {
                        if tx.remove(op.key.as_slice())?.is_none() {
                            return Err(ConflictableTransactionError::Abort(Error::NotFound {
                                level: op.level.clone(),
                                key: op.composite.clone(),
                            }));
                        }
                    }
                }
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                debug!(ops = ops.len(), trees = trees.len(), "Batch committed");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(Error::from(e)),
        }
    }
}
