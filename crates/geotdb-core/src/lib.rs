//! geotdb Core - schema registry, key resolver and cascade engine.
//!
//! This crate keeps hierarchical geotechnical records consistent: every row
//! below the top level is identified by the concatenated keys of all its
//! ancestors, and renames and deletes cascade through the whole chain.

pub mod cascade;
pub mod catalog;
pub mod config;
pub mod error;
pub mod keys;
pub mod lock;
pub mod storage;

pub use cascade::{CascadeEngine, CascadePlan, PlannedMutation};
pub use catalog::{
    geotechnical_schema, ColumnDef, DepthIntervalDef, EntityDescriptor, IncomingReference,
    KeySegment, LevelDef, ReferenceDef, ReferentialAction, Registry, ScalarType,
    SchemaDescription,
};
pub use config::EngineConfig;
pub use error::Error;
pub use keys::KeyResolver;
pub use lock::{LockManager, LockScope};
pub use storage::{MemoryStore, SledStore, Storage, StorageConfig, StorageOp, WriteBatch};

/// Re-export shared data types.
pub use geotdb_proto as proto;
