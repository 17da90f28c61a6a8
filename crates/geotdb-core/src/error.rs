//! Core error types.

use geotdb_proto::CompositeKey;
use thiserror::Error;

/// Errors raised by the registry, key resolver, cascade engine and storage
/// collaborators.
///
/// Every variant except [`Error::StorageUnavailable`] describes a caller or
/// schema problem; none of them is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The level is not registered.
    #[error("unknown level: {0}")]
    UnknownLevel(String),

    /// A key or key fragment has the wrong number of segments.
    #[error("arity mismatch for {level}: expected {expected} key segments, got {actual}")]
    ArityMismatch {
        level: String,
        expected: usize,
        actual: usize,
    },

    /// The parent row of an insert does not exist.
    #[error("orphan insert into {level}: parent {parent_level} {parent_key} does not exist")]
    OrphanInsert {
        level: String,
        parent_level: String,
        parent_key: CompositeKey,
    },

    /// A depth interval is inverted or outside its depth limit.
    #[error("interval violation in {level} {key}: {reason}")]
    IntervalViolation {
        level: String,
        key: CompositeKey,
        reason: String,
    },

    /// A row outside the cascade's subtree references a mutated row without
    /// a policy that allows the cascade.
    #[error(
        "cascade conflict: {referencing_level} {referencing_key} references {level} through {relation}"
    )]
    CascadeConflict {
        level: String,
        relation: String,
        referencing_level: String,
        referencing_key: CompositeKey,
    },

    /// Lookup miss.
    #[error("{level} {key} not found")]
    NotFound { level: String, key: CompositeKey },

    /// A row with this key already exists.
    #[error("duplicate key in {level}: {key}")]
    DuplicateKey { level: String, key: CompositeKey },

    /// A non-owning reference points at a row that does not exist.
    #[error("dangling reference {relation} from {level}: {target_level} {target_key} does not exist")]
    DanglingReference {
        level: String,
        relation: String,
        target_level: String,
        target_key: CompositeKey,
    },

    /// A required column is missing or null.
    #[error("{level}.{column} must not be null")]
    NullViolation { level: String, column: String },

    /// A value does not fit its column.
    #[error("invalid value for {level}.{column}: {reason}")]
    InvalidValue {
        level: String,
        column: String,
        reason: String,
    },

    /// The cascade walked deeper than the configured limit.
    #[error("maximum cascade depth exceeded: {depth}")]
    MaxDepthExceeded { depth: usize },

    /// The schema description is inconsistent.
    #[error("schema error: {0}")]
    Schema(String),

    /// The storage collaborator could not serve the request.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Check if this is a caller or schema error rather than a storage fault.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Error::StorageUnavailable(_) | Error::Serialization(_) | Error::Deserialization(_)
        )
    }
}

impl From<sled::Error> for Error {
    fn from(e: sled::Error) -> Self {
        Error::StorageUnavailable(e.to_string())
    }
}

impl From<geotdb_proto::Error> for Error {
    fn from(e: geotdb_proto::Error) -> Self {
        match e {
            geotdb_proto::Error::Serialization(msg) => Error::Serialization(msg),
            geotdb_proto::Error::Deserialization(msg) => Error::Deserialization(msg),
            other => Error::InvalidValue {
                level: String::new(),
                column: String::new(),
                reason: other.to_string(),
            },
        }
    }
}
