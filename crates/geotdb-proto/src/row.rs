//! Stored rows.

use std::collections::BTreeMap;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;
use crate::key::CompositeKey;
use crate::value::Value;

/// A row: its full composite key plus named non-key attributes.
///
/// Key columns live only in `key`, positionally. An attribute that is absent
/// from `fields` reads as null.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Row {
    /// Full composite key.
    pub key: CompositeKey,
    /// Attribute values keyed by column name.
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    /// Create a row with no attributes.
    pub fn new(key: CompositeKey) -> Self {
        Self {
            key,
            fields: BTreeMap::new(),
        }
    }

    /// Add an attribute value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get an attribute value. Absent attributes are `None`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Get an attribute value, treating absence as null.
    pub fn value(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(name).unwrap_or(&NULL)
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// The same attributes under a different key.
    pub fn rekeyed(&self, key: CompositeKey) -> Self {
        Self {
            key,
            fields: self.fields.clone(),
        }
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    ///
    /// The bytes are copied into an aligned buffer first, so slices handed
    /// out by the storage engine can be decoded directly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned: rkyv::util::AlignedVec<16> = rkyv::util::AlignedVec::new();
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}
