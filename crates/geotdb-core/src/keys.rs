//! Key composition resolver.
//!
//! Pure functions over the registry's key shapes: composing a child key from
//! its parent key, decomposing a key into parent and local parts, and
//! translating descendant keys when an ancestor is renamed.

use std::sync::Arc;

use geotdb_proto::{CompositeKey, Value};

use crate::catalog::{EntityDescriptor, Registry};
use crate::error::Error;

/// Composes, decomposes and rebases composite keys for registered levels.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    registry: Arc<Registry>,
}

impl KeyResolver {
    /// Create a resolver over a registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry this resolver reads key shapes from.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Build a full key from the parent's key and the local segments.
    pub fn compose(
        &self,
        level: &str,
        parent_key: &CompositeKey,
        local: &[Value],
    ) -> Result<CompositeKey, Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.parent_width(), parent_key.len())?;
        check_arity(desc.name(), desc.local_width(), local.len())?;
        Ok(parent_key.concat(local))
    }

    /// The parent row's key, or `None` for root levels.
    pub fn parent_key_of(
        &self,
        level: &str,
        key: &CompositeKey,
    ) -> Result<Option<CompositeKey>, Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.key_width(), key.len())?;
        Ok(desc.parent().map(|_| key.prefix(desc.parent_width())))
    }

    /// The level's own segments of `key`.
    pub fn local_of<'k>(&self, level: &str, key: &'k CompositeKey) -> Result<&'k [Value], Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.key_width(), key.len())?;
        Ok(&key.values()[desc.parent_width()..])
    }

    /// The key `old_key` would have with `new_local` as its local segments.
    pub fn rename(
        &self,
        level: &str,
        old_key: &CompositeKey,
        new_local: &[Value],
    ) -> Result<CompositeKey, Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.key_width(), old_key.len())?;
        check_arity(desc.name(), desc.local_width(), new_local.len())?;
        Ok(old_key.prefix(desc.parent_width()).concat(new_local))
    }

    /// Substitute `new_prefix` for the leading `old_prefix` segments of a
    /// descendant key.
    ///
    /// Substitution is positional. A key that does not start with
    /// `old_prefix` is returned unchanged.
    pub fn rebase(
        key: &CompositeKey,
        old_prefix: &CompositeKey,
        new_prefix: &CompositeKey,
    ) -> CompositeKey {
        if !key.starts_with(old_prefix.values()) {
            return key.clone();
        }
        new_prefix.concat(&key.values()[old_prefix.len()..])
    }

    /// Check a full key's arity and bring every segment to its column's
    /// type and precision. Key segments are never null.
    pub fn normalize_key(&self, level: &str, key: CompositeKey) -> Result<CompositeKey, Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.key_width(), key.len())?;
        normalize_segments(desc, 0, key.into_values()).map(CompositeKey::new)
    }

    /// Like [`normalize_key`](Self::normalize_key) for the local segments
    /// only.
    pub fn normalize_local(&self, level: &str, local: Vec<Value>) -> Result<Vec<Value>, Error> {
        let desc = self.registry.describe(level)?;
        check_arity(desc.name(), desc.local_width(), local.len())?;
        normalize_segments(desc, desc.parent_width(), local)
    }
}

fn check_arity(level: &str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::ArityMismatch {
            level: level.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

fn normalize_segments(
    desc: &EntityDescriptor,
    offset: usize,
    values: Vec<Value>,
) -> Result<Vec<Value>, Error> {
    desc.key_shape()[offset..]
        .iter()
        .zip(values)
        .map(|(segment, value)| {
            if value.is_null() {
                return Err(Error::NullViolation {
                    level: segment.level.clone(),
                    column: segment.column.name.clone(),
                });
            }
            segment.column.coerce(&segment.level, value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;
    use geotdb_proto::key;

    fn resolver() -> KeyResolver {
        KeyResolver::new(Arc::new(Registry::geotechnical().unwrap()))
    }

    fn sample_value(scalar: ScalarType, i: usize) -> Value {
        match scalar {
            ScalarType::String => Value::from(format!("S{}", i)),
            ScalarType::Integer => Value::Integer(i as i64),
            ScalarType::Boolean => Value::Bool(i % 2 == 0),
            ScalarType::Date => Value::Date(i as i32),
            ScalarType::Decimal { scale } => Value::decimal(i as i64 * 25, scale),
        }
    }

    #[test]
    fn test_compose_decompose_roundtrip_every_level() {
        let resolver = resolver();

        for desc in resolver.registry().levels() {
            let key: CompositeKey = desc
                .key_shape()
                .iter()
                .enumerate()
                .map(|(i, s)| sample_value(s.column.scalar, i))
                .collect();

            let parent = resolver
                .parent_key_of(desc.name(), &key)
                .unwrap()
                .unwrap_or_else(CompositeKey::empty);
            let local = resolver.local_of(desc.name(), &key).unwrap();
            let composed = resolver.compose(desc.name(), &parent, local).unwrap();

            assert_eq!(composed, key, "round trip failed for {}", desc.name());
        }
    }

    #[test]
    fn test_parent_key_of() {
        let resolver = resolver();

        let sample = key!["C1", "P1", "PT1", "D", "1", Value::decimal(0, 2)];
        assert_eq!(
            resolver.parent_key_of("SAMPLE", &sample).unwrap(),
            Some(key!["C1", "P1", "PT1"])
        );
        assert_eq!(resolver.parent_key_of("COMPANY", &key!["C1"]).unwrap(), None);
        assert_eq!(resolver.parent_key_of("CLIENT", &key!["CL1"]).unwrap(), None);
    }

    #[test]
    fn test_arity_mismatch() {
        let resolver = resolver();

        let err = resolver
            .compose("POINT", &key!["C1"], &[Value::from("PT1")])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ArityMismatch { expected: 2, actual: 1, .. }
        ));

        assert!(matches!(
            resolver.parent_key_of("POINT", &key!["C1", "P1"]),
            Err(Error::ArityMismatch { expected: 3, actual: 2, .. })
        ));
        assert!(matches!(
            resolver.local_of("BOREHOLE", &key!["C1"]),
            Err(Error::UnknownLevel(_))
        ));
    }

    #[test]
    fn test_zero_width_local_key() {
        let resolver = resolver();
        let specimen = key![
            "C1", "P1", "PT1", "D", "1", Value::decimal(0, 2), Value::decimal(10, 2), "A"
        ];

        let ucs = resolver.compose("UCS", &specimen, &[]).unwrap();
        assert_eq!(ucs, specimen);
        assert!(resolver.local_of("UCS", &ucs).unwrap().is_empty());
        assert_eq!(resolver.parent_key_of("UCS", &ucs).unwrap(), Some(specimen));
    }

    #[test]
    fn test_rename_and_rebase() {
        let resolver = resolver();

        let old_point = key!["C1", "P1", "PT1"];
        let new_point = resolver
            .rename("POINT", &old_point, &[Value::from("PT2")])
            .unwrap();
        assert_eq!(new_point, key!["C1", "P1", "PT2"]);

        let sample = key!["C1", "P1", "PT1", "D", "1", Value::decimal(0, 2)];
        assert_eq!(
            KeyResolver::rebase(&sample, &old_point, &new_point),
            key!["C1", "P1", "PT2", "D", "1", Value::decimal(0, 2)]
        );

        let unrelated = key!["C1", "P1", "PT3", "D", "1", Value::decimal(0, 2)];
        assert_eq!(
            KeyResolver::rebase(&unrelated, &old_point, &new_point),
            unrelated
        );
    }

    #[test]
    fn test_normalize_key() {
        let resolver = resolver();

        let key = resolver
            .normalize_key(
                "GEOLOGY",
                key!["C1", "P1", "PT1", Value::decimal(1234, 3)],
            )
            .unwrap();
        assert_eq!(key, key!["C1", "P1", "PT1", Value::decimal(123, 2)]);

        let widened = resolver
            .normalize_key("GEOLOGY", key!["C1", "P1", "PT1", 2i64])
            .unwrap();
        assert_eq!(widened.values()[3], Value::decimal(200, 2));

        assert!(matches!(
            resolver.normalize_key("POINT", key!["C1", Value::Null, "PT1"]),
            Err(Error::NullViolation { ref level, ref column })
                if level == "PROJECT" && column == "PROJECT_ID"
        ));
        assert!(matches!(
            resolver.normalize_key("POINT", key!["C1", "P1", 7i64]),
            Err(Error::InvalidValue { .. })
        ));
    }
}
