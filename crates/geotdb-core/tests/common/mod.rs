//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use geotdb_core::proto::{key, CompositeKey, FieldValue, Value};
use geotdb_core::{CascadeEngine, EngineConfig, MemoryStore, Registry, SledStore, Storage, StorageConfig};
use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn registry() -> Arc<Registry> {
    Arc::new(Registry::geotechnical().unwrap())
}

pub fn memory_engine() -> (CascadeEngine<Arc<MemoryStore>>, Arc<MemoryStore>) {
    memory_engine_with(EngineConfig::default())
}

pub fn memory_engine_with(config: EngineConfig) -> (CascadeEngine<Arc<MemoryStore>>, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let engine = CascadeEngine::with_config(registry(), Arc::clone(&store), config);
    (engine, store)
}

pub fn sled_engine() -> (CascadeEngine<SledStore>, tempfile::TempDir) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = SledStore::open(StorageConfig::new(dir.path())).unwrap();
    (CascadeEngine::new(registry(), store), dir)
}

/// Depth in centimetres as a `decimal(2)` metre value.
pub fn depth(cm: i64) -> Value {
    Value::decimal(cm, 2)
}

pub fn point_key(point: &str) -> CompositeKey {
    key!["C1", "P1", point]
}

pub fn sample_key(point: &str, top_cm: i64) -> CompositeKey {
    point_key(point).concat(&[Value::from("D"), Value::from("1"), depth(top_cm)])
}

pub fn specimen_key(point: &str, sample_top_cm: i64, top_cm: i64) -> CompositeKey {
    sample_key(point, sample_top_cm).concat(&[depth(top_cm), Value::from("A")])
}

/// COMPANY C1, CLIENT CL1 and PROJECT (C1, P1) referencing CL1.
pub fn seed_project<S: Storage>(engine: &CascadeEngine<S>) {
    engine.insert("COMPANY", key!["C1"], vec![]).unwrap();
    engine.insert("CLIENT", key!["CL1"], vec![]).unwrap();
    engine
        .insert(
            "PROJECT",
            key!["C1", "P1"],
            vec![
                FieldValue::new("NAME", "Bridge"),
                FieldValue::new("CLIENT_ID", "CL1"),
            ],
        )
        .unwrap();
}

pub fn seed_point<S: Storage>(engine: &CascadeEngine<S>, point: &str, final_depth_cm: i64) {
    engine
        .insert(
            "POINT",
            point_key(point),
            vec![
                FieldValue::new("TYPE", "BH"),
                FieldValue::new("FINAL_DEPTH", depth(final_depth_cm)),
            ],
        )
        .unwrap();
}

pub fn seed_sample<S: Storage>(engine: &CascadeEngine<S>, point: &str, top_cm: i64, btm_cm: i64) {
    engine
        .insert(
            "SAMPLE",
            sample_key(point, top_cm),
            vec![FieldValue::new("BTM", depth(btm_cm))],
        )
        .unwrap();
}

pub fn seed_specimen<S: Storage>(
    engine: &CascadeEngine<S>,
    point: &str,
    sample_top_cm: i64,
    top_cm: i64,
    btm_cm: i64,
) {
    engine
        .insert(
            "SPECIMEN",
            specimen_key(point, sample_top_cm, top_cm),
            vec![FieldValue::new("BTM", depth(btm_cm))],
        )
        .unwrap();
}

/// Project with point PT1 (FINAL_DEPTH 10.00) owning one sample at 0.00-0.50
/// and one specimen at 0.10-0.20.
pub fn seed_point_with_sample<S: Storage>(engine: &CascadeEngine<S>) {
    seed_project(engine);
    seed_point(engine, "PT1", 1000);
    seed_sample(engine, "PT1", 0, 50);
    seed_specimen(engine, "PT1", 0, 10, 20);
}
