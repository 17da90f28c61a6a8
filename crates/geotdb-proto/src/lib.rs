//! geotdb shared data types.
//!
//! This crate defines the values, composite keys, rows and mutation intents
//! exchanged between the integrity engine and its storage collaborators.
//!
//! # Modules
//!
//! - [`value`] - Runtime values and fixed-precision decimals
//! - [`key`] - Composite keys and their order-preserving byte encoding
//! - [`row`] - Stored rows
//! - [`mutation`] - Mutation intents
//! - [`error`] - Error types
//!
//! Stored types derive `rkyv::Archive`, `rkyv::Serialize` and
//! `rkyv::Deserialize` for the on-disk encoding, and serde for schema and
//! configuration input.

pub mod error;
pub mod key;
pub mod mutation;
pub mod row;
pub mod value;

pub use error::Error;

pub use key::CompositeKey;
pub use mutation::{FieldValue, Mutation, MutationKind};
pub use row::Row;
pub use value::{Decimal, Value};
