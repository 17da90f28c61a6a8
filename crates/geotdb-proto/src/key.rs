//! Composite keys.
//!
//! A composite key is the ordered concatenation of every ancestor's local key
//! columns, root first, ending with the row's own local columns.

use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::value::Value;

const TAG_NULL: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INTEGER: u8 = 0x02;
const TAG_DECIMAL: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_DATE: u8 = 0x05;

/// An ordered tuple of key segments.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct CompositeKey(Vec<Value>);

impl CompositeKey {
    /// Create a key from its segments.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The empty key (parent of every root row).
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Key segments, root first.
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// Consume the key and return its segments.
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no segments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` segments. Saturates at the key's own length.
    pub fn prefix(&self, len: usize) -> CompositeKey {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Check if `prefix` is a leading run of this key's segments.
    pub fn starts_with(&self, prefix: &[Value]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Append local segments to this key.
    pub fn concat(&self, local: &[Value]) -> CompositeKey {
        let mut values = Vec::with_capacity(self.0.len() + local.len());
        values.extend_from_slice(&self.0);
        values.extend_from_slice(local);
        Self(values)
    }

    /// Encode the key into bytes.
    ///
    /// Every segment is self-delimiting, so the encoding of a prefix is a
    /// byte prefix of the encoding of any key that extends it. Numerically
    /// equal decimals encode identically.
    pub fn encode(&self) -> Vec<u8> {
        Self::encode_values(&self.0)
    }

    /// Encode a run of segments (e.g. a scan prefix).
    pub fn encode_values(values: &[Value]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(values.len() * 10);
        for value in values {
            encode_value(value, &mut buf);
        }
        buf
    }
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Bool(b) => {
            buf.push(TAG_BOOL);
            buf.push(*b as u8);
        }
        Value::Integer(i) => {
            buf.push(TAG_INTEGER);
            buf.extend_from_slice(&((*i as u64) ^ (1 << 63)).to_be_bytes());
        }
        Value::Decimal(d) => {
            buf.push(TAG_DECIMAL);
            buf.extend_from_slice(&((d.normalized_units() as u128) ^ (1 << 127)).to_be_bytes());
        }
        Value::String(s) => {
            buf.push(TAG_STRING);
            for &b in s.as_bytes() {
                buf.push(b);
                if b == 0 {
                    buf.push(0xFF);
                }
            }
            buf.push(0x00);
            buf.push(0x00);
        }
        Value::Date(d) => {
            buf.push(TAG_DATE);
            buf.extend_from_slice(&((*d as u32) ^ (1 << 31)).to_be_bytes());
        }
    }
}

impl From<Vec<Value>> for CompositeKey {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for CompositeKey {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str(")")
    }
}

/// Build a [`CompositeKey`] from values convertible into [`Value`].
///
/// ```
/// use geotdb_proto::{key, Value};
///
/// let k = key!["C1", "P1", "PT1"];
/// assert_eq!(k.values()[2], Value::from("PT1"));
/// ```
#[macro_export]
macro_rules! key {
    ($($value:expr),* $(,)?) => {
        $crate::CompositeKey::new(vec![$($crate::Value::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Decimal;

    #[test]
    fn test_prefix_and_concat() {
        let point = key!["C1", "P1", "PT1"];
        let sample = point.concat(&[Value::from("D"), Value::from("1"), Value::decimal(0, 2)]);

        assert_eq!(sample.len(), 6);
        assert!(sample.starts_with(point.values()));
        assert_eq!(sample.prefix(3), point);
        assert_eq!(sample.prefix(10), sample);
        assert!(!sample.starts_with(key!["C1", "P2"].values()));
    }

    #[test]
    fn test_encoded_prefix_is_byte_prefix() {
        let project = key!["C1", "P1"];
        let point = key!["C1", "P1", "PT1"];
        let other = key!["C1", "P10", "PT1"];

        assert!(point.encode().starts_with(&project.encode()));
        assert!(!other.encode().starts_with(&project.encode()));
    }

    #[test]
    fn test_embedded_nul_does_not_break_prefix() {
        let a = key!["A\0B", "x"];
        let b = key!["A", "B"];
        assert!(!a.encode().starts_with(&key!["A"].encode()));
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_numerically_equal_decimals_encode_identically() {
        let a = CompositeKey::new(vec![Value::Decimal(Decimal::new(150, 2))]);
        let b = CompositeKey::new(vec![Value::Decimal(Decimal::new(15, 1))]);
        assert_eq!(a, b);
        assert_eq!(a.encode(), b.encode());
    }

    #[test]
    fn test_ordering_groups_prefix_runs() {
        let mut keys = vec![
            key!["C1", "P2"],
            key!["C1", "P1", "PT2"],
            key!["C1", "P1"],
            key!["C1", "P1", "PT1"],
        ];
        keys.sort();

        assert_eq!(
            keys,
            vec![
                key!["C1", "P1"],
                key!["C1", "P1", "PT1"],
                key!["C1", "P1", "PT2"],
                key!["C1", "P2"],
            ]
        );
    }

    #[test]
    fn test_encoding_orders_like_keys() {
        let mut keys = vec![
            key!["PT1", Value::decimal(30, 0)],
            key!["PT1", Value::decimal(5, 1)],
            key!["PT1", Value::decimal(-125, 2)],
            key!["PT1", Value::decimal(250, 2)],
            key!["PT1", Value::Integer(-4)],
        ];
        let mut encoded: Vec<_> = keys.iter().map(CompositeKey::encode).collect();
        keys.sort();
        encoded.sort();

        assert_eq!(encoded, keys.iter().map(CompositeKey::encode).collect::<Vec<_>>());
        assert_eq!(keys[0], key!["PT1", Value::Integer(-4)]);
        assert_eq!(keys[1], key!["PT1", Value::decimal(-125, 2)]);
    }

    #[test]
    fn test_display() {
        let k = CompositeKey::new(vec![Value::from("C1"), Value::from(1i64), Value::decimal(0, 2)]);
        assert_eq!(k.to_string(), "('C1', 1, 0.00)");
    }
}
