//! Cascade engine.
//!
//! A [`Mutation`](geotdb_proto::Mutation) on one row expands into a
//! [`CascadePlan`]: the row itself plus every dependent row that must be
//! renamed, nulled or deleted to keep the hierarchy and its references
//! consistent. The plan is validated in full before any of it is applied.

mod engine;
mod plan;

pub use engine::CascadeEngine;
pub use plan::{CascadePlan, PlannedMutation};
