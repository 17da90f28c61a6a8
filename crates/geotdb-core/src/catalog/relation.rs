//! Non-owning references between levels.
//!
//! Ownership (parent/child) is not declared here: it follows from
//! [`LevelDef::parent`](super::LevelDef) and always cascades on update and
//! delete. A reference is an attribute-level link to another level's full
//! composite key, with its own update and delete behaviour.

use serde::{Deserialize, Serialize};

/// What happens to referencing rows when the referenced row changes key or
/// is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Follow the change (rewrite the referencing columns).
    Cascade,
    /// Set the referencing columns to null.
    SetNull,
    /// Refuse the change while references exist.
    Restrict,
}

/// A reference from attributes of one level to the full key of another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDef {
    /// Reference name (unique within the level).
    pub name: String,
    /// Referencing attribute columns, aligned with the target's key shape.
    pub columns: Vec<String>,
    /// Referenced level.
    pub target: String,
    /// Behaviour when the referenced key is renamed.
    pub on_update: ReferentialAction,
    /// Behaviour when the referenced row is deleted.
    pub on_delete: ReferentialAction,
}

impl ReferenceDef {
    /// Create a reference that cascades renames and restricts deletes.
    pub fn new<I, C>(name: impl Into<String>, columns: I, target: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            target: target.into(),
            on_update: ReferentialAction::Cascade,
            on_delete: ReferentialAction::Restrict,
        }
    }

    /// Create an optional single-column reference: CASCADE on update,
    /// SET NULL on delete.
    pub fn optional(
        name: impl Into<String>,
        column: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(name, [column.into()], target).with_on_delete(ReferentialAction::SetNull)
    }

    /// Set update behaviour.
    pub fn with_on_update(mut self, on_update: ReferentialAction) -> Self {
        self.on_update = on_update;
        self
    }

    /// Set delete behaviour.
    pub fn with_on_delete(mut self, on_delete: ReferentialAction) -> Self {
        self.on_delete = on_delete;
        self
    }

    /// Check if either action nulls the referencing columns.
    pub fn nulls_columns(&self) -> bool {
        self.on_update == ReferentialAction::SetNull || self.on_delete == ReferentialAction::SetNull
    }
}
