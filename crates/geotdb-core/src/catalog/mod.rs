//! Schema registry for geotdb.
//!
//! The catalog declares entity levels, their composite key shapes,
//! attributes and relations. It is built once from a [`SchemaDescription`]
//! and never mutated afterwards.

mod field;
mod geotech;
mod level;
mod registry;
mod relation;
mod schema;
mod types;

pub use field::ColumnDef;
pub use geotech::geotechnical_schema;
pub use level::{DepthIntervalDef, EntityDescriptor, IncomingReference, KeySegment, LevelDef};
pub use registry::Registry;
pub use relation::{ReferenceDef, ReferentialAction};
pub use schema::SchemaDescription;
pub use types::ScalarType;
