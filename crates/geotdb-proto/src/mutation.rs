//! Mutation intents submitted to the cascade engine.

use std::fmt;

use crate::key::CompositeKey;
use crate::row::Row;
use crate::value::Value;

/// A field name and value pair.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldValue {
    /// Field name.
    pub field: String,
    /// Field value.
    pub value: Value,
}

impl FieldValue {
    /// Create a new field-value pair.
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// The kind of a mutation, for logging and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Create a row.
    Insert,
    /// Change a row's local identity columns.
    UpdateKey,
    /// Change non-key attributes.
    UpdateAttribute,
    /// Remove a row and its descendants.
    Delete,
}

impl MutationKind {
    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::UpdateKey => "update_key",
            MutationKind::UpdateAttribute => "update_attribute",
            MutationKind::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mutation request on one row.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mutation {
    /// Insert a new row. The row carries its full composite key.
    Insert {
        /// Level to insert into.
        level: String,
        /// The new row.
        row: Row,
    },
    /// Replace the row's local key columns; descendants follow.
    UpdateKey {
        /// Level of the row.
        level: String,
        /// Current full key.
        key: CompositeKey,
        /// New values for the level's local key columns.
        new_local: Vec<Value>,
    },
    /// Change non-key attributes.
    UpdateAttribute {
        /// Level of the row.
        level: String,
        /// Full key of the row.
        key: CompositeKey,
        /// Attribute values to set.
        data: Vec<FieldValue>,
    },
    /// Delete the row and everything it owns.
    Delete {
        /// Level of the row.
        level: String,
        /// Full key of the row.
        key: CompositeKey,
    },
}

impl Mutation {
    /// Create an insert mutation.
    pub fn insert(level: impl Into<String>, key: CompositeKey, data: Vec<FieldValue>) -> Self {
        let mut row = Row::new(key);
        for fv in data {
            row.set(fv.field, fv.value);
        }
        Mutation::Insert {
            level: level.into(),
            row,
        }
    }

    /// Create a key rename mutation.
    pub fn update_key(level: impl Into<String>, key: CompositeKey, new_local: Vec<Value>) -> Self {
        Mutation::UpdateKey {
            level: level.into(),
            key,
            new_local,
        }
    }

    /// Create an attribute update mutation.
    pub fn update_attributes(
        level: impl Into<String>,
        key: CompositeKey,
        data: Vec<FieldValue>,
    ) -> Self {
        Mutation::UpdateAttribute {
            level: level.into(),
            key,
            data,
        }
    }

    /// Create a delete mutation.
    pub fn delete(level: impl Into<String>, key: CompositeKey) -> Self {
        Mutation::Delete {
            level: level.into(),
            key,
        }
    }

    /// Get the level this mutation operates on.
    pub fn level(&self) -> &str {
        match self {
            Mutation::Insert { level, .. } => level,
            Mutation::UpdateKey { level, .. } => level,
            Mutation::UpdateAttribute { level, .. } => level,
            Mutation::Delete { level, .. } => level,
        }
    }

    /// Get the key of the row this mutation targets.
    pub fn key(&self) -> &CompositeKey {
        match self {
            Mutation::Insert { row, .. } => &row.key,
            Mutation::UpdateKey { key, .. } => key,
            Mutation::UpdateAttribute { key, .. } => key,
            Mutation::Delete { key, .. } => key,
        }
    }

    /// Get the mutation kind.
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Insert { .. } => MutationKind::Insert,
            Mutation::UpdateKey { .. } => MutationKind::UpdateKey,
            Mutation::UpdateAttribute { .. } => MutationKind::UpdateAttribute,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }
}
