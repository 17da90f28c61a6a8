//! Column definitions for levels.

use geotdb_proto::{Decimal, Value};
use serde::{Deserialize, Serialize};

use super::types::ScalarType;
use crate::error::Error;

/// A key column or attribute within a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub scalar: ScalarType,
    /// Whether null is accepted.
    #[serde(default)]
    pub nullable: bool,
    /// Value used on insert when the column is absent.
    #[serde(default)]
    pub default: Option<Value>,
}

impl ColumnDef {
    /// Create a new required column.
    pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: false,
            default: None,
        }
    }

    /// Create a nullable column.
    pub fn optional(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar,
            nullable: true,
            default: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Check if this column has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Check a value against this column and bring it to the column's
    /// precision.
    ///
    /// Decimals are rounded half away from zero to the column scale and
    /// integers are widened into decimal columns. Null is accepted only for
    /// nullable columns.
    pub fn coerce(&self, level: &str, value: Value) -> Result<Value, Error> {
        let invalid = |reason: String| Error::InvalidValue {
            level: level.to_string(),
            column: self.name.clone(),
            reason,
        };

        match (self.scalar, value) {
            (_, Value::Null) => {
                if self.nullable {
                    Ok(Value::Null)
                } else {
                    Err(Error::NullViolation {
                        level: level.to_string(),
                        column: self.name.clone(),
                    })
                }
            }
            (ScalarType::String, v @ Value::String(_)) => Ok(v),
            (ScalarType::Integer, v @ Value::Integer(_)) => Ok(v),
            (ScalarType::Boolean, v @ Value::Bool(_)) => Ok(v),
            (ScalarType::Date, v @ Value::Date(_)) => Ok(v),
            (ScalarType::Decimal { scale }, Value::Decimal(d)) => d
                .rescale(scale)
                .map(Value::Decimal)
                .ok_or_else(|| invalid(format!("{} overflows decimal({})", d, scale))),
            (ScalarType::Decimal { scale }, Value::Integer(i)) => Decimal::from_i64(i, scale)
                .map(Value::Decimal)
                .ok_or_else(|| invalid(format!("{} overflows decimal({})", i, scale))),
            (expected, v) => Err(invalid(format!(
                "expected {}, got {}",
                expected,
                v.type_name()
            ))),
        }
    }
}
