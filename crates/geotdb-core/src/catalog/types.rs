//! Core type definitions for the catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Integer,
    /// Boolean value.
    Boolean,
    /// Calendar date.
    Date,
    /// Fixed-precision decimal.
    Decimal {
        /// Number of digits after the decimal point.
        scale: u8,
    },
}

impl ScalarType {
    /// Shorthand for a decimal column.
    pub fn decimal(scale: u8) -> Self {
        ScalarType::Decimal { scale }
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Integer | ScalarType::Decimal { .. })
    }

    /// Decimal scale, if this is a decimal type.
    pub fn scale(&self) -> Option<u8> {
        match self {
            ScalarType::Decimal { scale } => Some(*scale),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarType::String => f.write_str("string"),
            ScalarType::Integer => f.write_str("integer"),
            ScalarType::Boolean => f.write_str("bool"),
            ScalarType::Date => f.write_str("date"),
            ScalarType::Decimal { scale } => write!(f, "decimal({})", scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_checks() {
        assert!(ScalarType::Integer.is_numeric());
        assert!(ScalarType::decimal(2).is_numeric());
        assert!(!ScalarType::String.is_numeric());
        assert_eq!(ScalarType::decimal(3).scale(), Some(3));
        assert_eq!(ScalarType::Date.scale(), None);
        assert_eq!(ScalarType::decimal(8).to_string(), "decimal(8)");
    }
}
