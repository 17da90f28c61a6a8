//! Runtime value types for keys and attributes.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;

/// Largest supported number of fractional digits.
pub const MAX_SCALE: u8 = 18;

/// Powers of ten up to `10^MAX_SCALE`.
const POW10: [i64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

/// A fixed-precision decimal number stored as `units * 10^-scale`.
///
/// Equality, ordering and hashing are numeric, so `1.50` and `1.5` are the
/// same value. Rounding (in [`Decimal::from_f64`] and [`Decimal::rescale`])
/// is half away from zero.
///
/// Every constructor keeps `scale <= MAX_SCALE`; serde input with a larger
/// scale is rejected.
#[derive(Debug, Clone, Copy, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawDecimal")]
pub struct Decimal {
    units: i64,
    scale: u8,
}

impl Decimal {
    /// Create a decimal from raw units and a scale.
    ///
    /// `scale` must not exceed [`MAX_SCALE`]; debug builds panic if it does.
    /// Use [`Decimal::try_new`] for unchecked input.
    pub fn new(units: i64, scale: u8) -> Self {
        debug_assert!(scale <= MAX_SCALE, "decimal scale {} exceeds {}", scale, MAX_SCALE);
        Self {
            units,
            scale: scale.min(MAX_SCALE),
        }
    }

    /// Create a decimal from raw units and a scale, or `None` if the scale
    /// exceeds [`MAX_SCALE`].
    pub fn try_new(units: i64, scale: u8) -> Option<Self> {
        (scale <= MAX_SCALE).then_some(Self { units, scale })
    }

    /// Create a decimal holding an integer at the given scale.
    pub fn from_i64(value: i64, scale: u8) -> Option<Self> {
        if scale > MAX_SCALE {
            return None;
        }
        value
            .checked_mul(POW10[scale as usize])
            .map(|units| Self { units, scale })
    }

    /// Round a float to the given scale.
    ///
    /// Returns `None` for non-finite input or values that overflow.
    pub fn from_f64(value: f64, scale: u8) -> Option<Self> {
        if !value.is_finite() || scale > MAX_SCALE {
            return None;
        }
        let scaled = (value * POW10[scale as usize] as f64).round();
        if scaled < i64::MIN as f64 || scaled >= i64::MAX as f64 {
            return None;
        }
        Some(Self {
            units: scaled as i64,
            scale,
        })
    }

    /// Raw units.
    pub fn units(&self) -> i64 {
        self.units
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Convert to another scale, rounding half away from zero when digits
    /// are dropped. Returns `None` on overflow.
    pub fn rescale(&self, scale: u8) -> Option<Self> {
        if scale > MAX_SCALE || self.scale > MAX_SCALE {
            return None;
        }
        match scale.cmp(&self.scale) {
            Ordering::Equal => Some(*self),
            Ordering::Greater => {
                let factor = POW10[(scale - self.scale) as usize];
                self.units
                    .checked_mul(factor)
                    .map(|units| Self { units, scale })
            }
            Ordering::Less => {
                let factor = POW10[(self.scale - scale) as usize];
                let mut units = self.units / factor;
                let remainder = (self.units % factor).unsigned_abs();
                if remainder * 2 >= factor as u64 {
                    units += self.units.signum();
                }
                Some(Self { units, scale })
            }
        }
    }

    /// Check whether the value is below zero.
    pub fn is_negative(&self) -> bool {
        self.units < 0
    }

    /// Smallest representation of the same number (trailing zeros removed).
    pub fn canonical(&self) -> Self {
        let mut units = self.units;
        let mut scale = self.scale;
        while scale > 0 && units % 10 == 0 {
            units /= 10;
            scale -= 1;
        }
        Self { units, scale }
    }

    /// The value as a count of `10^-MAX_SCALE` units. Numerically equal
    /// decimals return the same count, and the count orders like the value.
    pub fn normalized_units(&self) -> i128 {
        self.widened(MAX_SCALE)
    }

    fn widened(&self, scale: u8) -> i128 {
        self.units as i128 * POW10[(scale - self.scale) as usize] as i128
    }
}

/// Wire form of [`Decimal`], validated on the way in.
#[derive(serde::Deserialize)]
struct RawDecimal {
    units: i64,
    scale: u8,
}

impl TryFrom<RawDecimal> for Decimal {
    type Error = Error;

    fn try_from(raw: RawDecimal) -> Result<Self, Self::Error> {
        Decimal::try_new(raw.units, raw.scale).ok_or_else(|| {
            Error::InvalidDecimal(format!(
                "{}e-{} (scale exceeds {})",
                raw.units, raw.scale, MAX_SCALE
            ))
        })
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.widened(scale).cmp(&other.widened(scale))
    }
}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let canonical = self.canonical();
        canonical.units.hash(state);
        canonical.scale.hash(state);
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let abs = self.units.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, abs);
        }
        let factor = POW10[self.scale as usize] as u64;
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            abs / factor,
            abs % factor,
            width = self.scale as usize
        )
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidDecimal(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac_part.len() > MAX_SCALE as usize {
            return Err(invalid());
        }

        let mut units: i64 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            units = units
                .checked_mul(10)
                .and_then(|u| u.checked_add((b - b'0') as i64))
                .ok_or_else(invalid)?;
        }
        if negative {
            units = -units;
        }

        Ok(Self {
            units,
            scale: frac_part.len() as u8,
        })
    }
}

/// A runtime value for key segments and attributes.
///
/// There is no floating-point variant: numeric columns carry a fixed scale
/// and use [`Decimal`]. Dates are days since 1970-01-01.
#[derive(
    Debug,
    Clone,
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
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// Fixed-precision decimal.
    Decimal(Decimal),
    /// UTF-8 string.
    String(String),
    /// Calendar date as days since the Unix epoch.
    Date(i32),
}

impl Value {
    /// Create a decimal value from units and scale.
    pub fn decimal(units: i64, scale: u8) -> Self {
        Value::Decimal(Decimal::new(units, scale))
    }

    /// Round a float into a decimal value.
    pub fn from_f64(value: f64, scale: u8) -> Option<Self> {
        Decimal::from_f64(value, scale).map(Value::Decimal)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as a decimal. Integers are widened to scale 0.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::new(*i, 0)),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a date.
    pub fn as_date(&self) -> Option<i32> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s),
            Value::Date(d) => write!(f, "date({})", d),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(d: &Decimal) -> u64 {
        let mut hasher = DefaultHasher::new();
        d.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_decimal_numeric_equality() {
        let a = Decimal::new(150, 2);
        let b = Decimal::new(15, 1);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert!(Decimal::new(299, 2) < Decimal::new(3, 0));
        assert!(Decimal::new(-5, 1) < Decimal::new(0, 3));
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        assert_eq!(Decimal::new(2345, 3).rescale(2).unwrap().units(), 235);
        assert_eq!(Decimal::new(2344, 3).rescale(2).unwrap().units(), 234);
        assert_eq!(Decimal::new(-2345, 3).rescale(2).unwrap().units(), -235);
        assert_eq!(Decimal::new(3, 0).rescale(2).unwrap().units(), 300);
        assert!(Decimal::new(i64::MAX, 0).rescale(2).is_none());
    }

    #[test]
    fn test_from_f64() {
        let depth = Decimal::from_f64(2.456, 2).unwrap();
        assert_eq!(depth.units(), 246);
        assert_eq!(depth.scale(), 2);

        assert!(Decimal::from_f64(f64::NAN, 2).is_none());
        assert!(Decimal::from_f64(1e30, 2).is_none());
    }

    #[test]
    fn test_parse_and_display() {
        let d: Decimal = "-12.050".parse().unwrap();
        assert_eq!(d.units(), -12050);
        assert_eq!(d.scale(), 3);
        assert_eq!(d.to_string(), "-12.050");

        assert_eq!(Decimal::new(5, 2).to_string(), "0.05");
        assert_eq!(Decimal::new(90, 0).to_string(), "90");

        assert!("".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::from(7i64).as_i64(), Some(7));
        assert_eq!(Value::from(7i64).as_decimal(), Some(Decimal::new(7, 0)));
        assert_eq!(Value::from("PT1").as_str(), Some("PT1"));
        assert_eq!(Value::from(None::<&str>), Value::Null);
        assert_eq!(Value::from(Some(true)).as_bool(), Some(true));
        assert_eq!(Value::Date(19000).as_date(), Some(19000));
        assert_eq!(Value::decimal(350, 2).type_name(), "decimal");
    }

    #[test]
    fn test_try_new_rejects_large_scale() {
        assert_eq!(Decimal::try_new(125, 2), Some(Decimal::new(125, 2)));
        assert!(Decimal::try_new(1, MAX_SCALE).is_some());
        assert!(Decimal::try_new(1, MAX_SCALE + 1).is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds")]
    fn test_new_asserts_scale() {
        Decimal::new(1, 30);
    }

    #[test]
    fn test_serde_rejects_large_scale() {
        let err = serde_json::from_str::<Decimal>(r#"{"units":1,"scale":40}"#).unwrap_err();
        assert!(err.to_string().contains("scale exceeds"), "{}", err);

        let err = serde_json::from_str::<Value>(r#"{"Decimal":{"units":1,"scale":19}}"#);
        assert!(err.is_err());

        let ok: Decimal = serde_json::from_str(r#"{"units":1,"scale":18}"#).unwrap();
        assert_eq!(ok.scale(), MAX_SCALE);
    }

    #[test]
    fn test_value_serde_json() {
        let value = Value::decimal(90, 0);
        let json = serde_json::to_string(&value).unwrap();
        let decoded: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, decoded);
    }
}
