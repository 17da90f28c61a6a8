//! In-memory storage collaborator.

use std::collections::{BTreeMap, HashMap};

use geotdb_proto::{CompositeKey, Row, Value};
use parking_lot::RwLock;

use super::{Storage, StorageOp, WriteBatch};
use crate::error::Error;

type LevelRows = BTreeMap<CompositeKey, Row>;

/// Ordered in-memory store, one map per level.
///
/// Batches are staged on copies of the touched levels and swapped in only
/// when every operation succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    levels: RwLock<HashMap<String, LevelRows>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows stored for a level.
    pub fn count(&self, level: &str) -> usize {
        self.levels.read().get(level).map_or(0, BTreeMap::len)
    }

    /// Total number of rows across all levels.
    pub fn total_rows(&self) -> usize {
        self.levels.read().values().map(BTreeMap::len).sum()
    }

    /// Copy of every row, grouped by level, for comparisons in tests and
    /// diagnostics.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<Row>> {
        self.levels
            .read()
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(level, rows)| (level.clone(), rows.values().cloned().collect()))
            .collect()
    }
}

impl Storage for MemoryStore {
    fn get(&self, level: &str, key: &CompositeKey) -> Result<Option<Row>, Error> {
        Ok(self
            .levels
            .read()
            .get(level)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    fn scan_prefix(&self, level: &str, prefix: &[Value]) -> Result<Vec<Row>, Error> {
        let guard = self.levels.read();
        let Some(rows) = guard.get(level) else {
            return Ok(Vec::new());
        };

        let start = CompositeKey::new(prefix.to_vec());
        Ok(rows
            .range(start..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut guard = self.levels.write();
        let mut staged: HashMap<String, LevelRows> = HashMap::new();

        for op in batch.into_ops() {
            let rows = staged
                .entry(op.level().to_string())
                .or_insert_with_key(|level| guard.get(level).cloned().unwrap_or_default());

            match op {
                StorageOp::Put { row, .. } => {
                    rows.insert(row.key.clone(), row);
                }
                StorageOp::Delete { level, key } => {
                    if rows.remove(&key).is_none() {
                        return Err(Error::NotFound { level, key });
                    }
                }
            }
        }

        guard.extend(staged);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotdb_proto::key;

    fn point(id: &str) -> Row {
        Row::new(key!["C1", "P1", id]).with_field("TYPE", "BH")
    }

    #[test]
    fn test_put_get_scan() {
        let store = MemoryStore::new();
        store.put("POINT", point("PT1")).unwrap();
        store.put("POINT", point("PT2")).unwrap();
        store
            .put("POINT", Row::new(key!["C1", "P2", "PT1"]))
            .unwrap();

        assert_eq!(
            store.get("POINT", &key!["C1", "P1", "PT1"]).unwrap(),
            Some(point("PT1"))
        );
        assert!(store.get("SAMPLE", &key!["C1"]).unwrap().is_none());

        let scanned = store.scan_prefix("POINT", key!["C1", "P1"].values()).unwrap();
        assert_eq!(scanned, vec![point("PT1"), point("PT2")]);
        assert_eq!(store.scan_prefix("POINT", &[]).unwrap().len(), 3);
        assert_eq!(store.count("POINT"), 3);
    }

    #[test]
    fn test_failed_batch_applies_nothing() {
        let store = MemoryStore::new();
        store.put("POINT", point("PT1")).unwrap();
        let before = store.snapshot();

        let mut batch = WriteBatch::new();
        batch.put("POINT", point("PT2"));
        batch.delete("POINT", key!["C1", "P1", "PT1"]);
        batch.delete("POINT", key!["C1", "P1", "PT9"]);

        let err = store.apply(batch).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref level, .. } if level == "POINT"));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_delete_then_put_same_key() {
        let store = MemoryStore::new();
        store.put("POINT", point("PT1")).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete("POINT", key!["C1", "P1", "PT1"]);
        batch.put("POINT", point("PT1").with_field("TYPE", "TP"));
        store.apply(batch).unwrap();

        let row = store.get("POINT", &key!["C1", "P1", "PT1"]).unwrap().unwrap();
        assert_eq!(row.value("TYPE"), &Value::from("TP"));
    }
}
