//! Cascade tests against the sled store.

mod common;

use common::*;
use geotdb_core::proto::{key, FieldValue, Row, Value};
use geotdb_core::{CascadeEngine, Error, SledStore, Storage, StorageConfig};

struct TestContext {
    engine: CascadeEngine<SledStore>,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let (engine, storage_dir) = sled_engine();
        seed_point_with_sample(&engine);
        Self {
            engine,
            _storage_dir: storage_dir,
        }
    }

    fn store(&self) -> &SledStore {
        self.engine.storage()
    }

    fn rows(&self, level: &str) -> Vec<Row> {
        self.store().scan_prefix(level, &[]).unwrap()
    }
}

#[test]
fn test_delete_point_on_disk() {
    let ctx = TestContext::new();

    let plan = ctx.engine.delete("POINT", point_key("PT1")).unwrap();

    assert_eq!(plan.deleted().len(), 3);
    assert!(ctx.rows("POINT").is_empty());
    assert!(ctx.rows("SAMPLE").is_empty());
    assert!(ctx.rows("SPECIMEN").is_empty());
    assert_eq!(ctx.rows("PROJECT").len(), 1);
}

#[test]
fn test_rename_point_on_disk() {
    let ctx = TestContext::new();

    ctx.engine
        .update_key("POINT", point_key("PT1"), vec![Value::from("PT2")])
        .unwrap();

    let samples = ctx.rows("SAMPLE");
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].key, sample_key("PT2", 0));
    assert_eq!(samples[0].value("BTM"), &depth(50));

    let specimens = ctx.rows("SPECIMEN");
    assert_eq!(specimens.len(), 1);
    assert_eq!(specimens[0].key, specimen_key("PT2", 0, 10));
}

#[test]
fn test_rename_collision_on_disk() {
    let ctx = TestContext::new();
    ctx.store()
        .put("SPECIMEN", Row::new(specimen_key("PT2", 0, 10)))
        .unwrap();

    let err = ctx
        .engine
        .update_key("POINT", point_key("PT1"), vec![Value::from("PT2")])
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateKey { ref level, .. } if level == "SPECIMEN"));
    assert!(ctx.engine.get("POINT", &point_key("PT1")).unwrap().is_some());
    assert!(ctx.engine.get("POINT", &point_key("PT2")).unwrap().is_none());
    assert_eq!(ctx.rows("SAMPLE")[0].key, sample_key("PT1", 0));
}

#[test]
fn test_client_delete_on_disk() {
    let ctx = TestContext::new();

    ctx.engine.delete("CLIENT", key!["CL1"]).unwrap();

    let project = ctx.engine.get("PROJECT", &key!["C1", "P1"]).unwrap().unwrap();
    assert!(project.value("CLIENT_ID").is_null());
}

#[test]
fn test_rows_survive_reopen() {
    let (engine, storage_dir) = sled_engine();
    seed_point_with_sample(&engine);
    engine
        .update_attributes(
            "POINT",
            point_key("PT1"),
            vec![FieldValue::new("LOGGED_BY", "JS")],
        )
        .unwrap();
    engine.storage().flush().unwrap();
    drop(engine);

    let store = SledStore::open(StorageConfig::new(storage_dir.path())).unwrap();
    assert!(store.was_recovered());

    let point = store.get("POINT", &point_key("PT1")).unwrap().unwrap();
    assert_eq!(point.value("LOGGED_BY"), &Value::from("JS"));
    assert_eq!(point.value("FINAL_DEPTH"), &depth(1000));
    assert!(store.contains("SPECIMEN", &specimen_key("PT1", 0, 10)).unwrap());
}

#[test]
fn test_sled_scan_orders_depths_numerically() {
    let ctx = TestContext::new();
    seed_sample(&ctx.engine, "PT1", 900, 950);
    seed_sample(&ctx.engine, "PT1", 100, 150);

    let tops: Vec<_> = ctx
        .rows("SAMPLE")
        .iter()
        .map(|row| row.key.values()[5].clone())
        .collect();
    assert_eq!(tops, vec![depth(0), depth(100), depth(900)]);
}
