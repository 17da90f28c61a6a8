//! Schema registry - the resolved, immutable view of a schema description.

use std::collections::{HashMap, HashSet};

use geotdb_proto::value::MAX_SCALE;
use tracing::debug;

use super::geotech::geotechnical_schema;
use super::level::{EntityDescriptor, IncomingReference, KeySegment, LevelDef};
use super::schema::SchemaDescription;
use super::types::ScalarType;
use crate::error::Error;

/// Resolved schema: every level with its full key shape, children and
/// incoming references.
///
/// Built once from a [`SchemaDescription`] and shared read-only (usually as
/// `Arc<Registry>`) by the key resolver and the cascade engine.
#[derive(Debug, Clone)]
pub struct Registry {
    levels: Vec<EntityDescriptor>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Validate a description and resolve it into a registry.
    pub fn build(description: SchemaDescription) -> Result<Self, Error> {
        let mut registry = Self {
            levels: Vec::with_capacity(description.levels.len()),
            index: HashMap::with_capacity(description.levels.len()),
        };

        for def in description.levels {
            registry.add_level(def)?;
        }
        registry.resolve_references()?;
        registry.resolve_reach();

        debug!(levels = registry.levels.len(), "Schema registry built");
        Ok(registry)
    }

    /// Registry for the built-in geotechnical schema.
    pub fn geotechnical() -> Result<Self, Error> {
        Self::build(geotechnical_schema())
    }

    /// Get the descriptor of a level.
    pub fn describe(&self, level: &str) -> Result<&EntityDescriptor, Error> {
        self.index
            .get(level)
            .map(|&i| &self.levels[i])
            .ok_or_else(|| Error::UnknownLevel(level.to_string()))
    }

    /// Child levels in declaration order.
    pub fn children(&self, level: &str) -> Result<&[String], Error> {
        Ok(self.describe(level)?.children())
    }

    /// Check if a level is subject to the TOP/BTM invariant.
    pub fn is_depth_interval(&self, level: &str) -> Result<bool, Error> {
        Ok(self.describe(level)?.is_depth_interval())
    }

    /// References from other levels that point at `level`.
    pub fn referencing(&self, level: &str) -> Result<&[IncomingReference], Error> {
        Ok(self.describe(level)?.referenced_by())
    }

    /// All descriptors in declaration order.
    pub fn levels(&self) -> &[EntityDescriptor] {
        &self.levels
    }

    /// Check if a level is registered.
    pub fn contains(&self, level: &str) -> bool {
        self.index.contains_key(level)
    }

    /// Number of registered levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the registry has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn add_level(&mut self, def: LevelDef) -> Result<(), Error> {
        let name = def.name.clone();
        if name.is_empty() {
            return Err(Error::Schema("level name must not be empty".into()));
        }
        if self.index.contains_key(&name) {
            return Err(Error::Schema(format!("duplicate level {}", name)));
        }

        let parent = match &def.parent {
            Some(parent) => Some(*self.index.get(parent).ok_or_else(|| {
                Error::Schema(format!(
                    "parent {} of {} must be declared before it",
                    parent, name
                ))
            })?),
            None => None,
        };

        if parent.is_none() && def.key_columns.is_empty() {
            return Err(Error::Schema(format!(
                "root level {} needs at least one key column",
                name
            )));
        }

        validate_columns(&def)?;
        validate_depth_columns(&def)?;

        let (ancestors, mut key_shape, limit_ancestor) = match parent {
            Some(p) => {
                let parent = &self.levels[p];
                let mut ancestors = parent.ancestors.clone();
                ancestors.push(parent.name().to_string());
                let limit = match parent.depth_limit() {
                    Some(_) => Some(parent.name().to_string()),
                    None => parent.limit_ancestor.clone(),
                };
                (ancestors, parent.key_shape.clone(), limit)
            }
            None => (Vec::new(), Vec::new(), None),
        };
        key_shape.extend(def.key_columns.iter().map(|column| KeySegment {
            level: name.clone(),
            column: column.clone(),
        }));

        if let Some(p) = parent {
            self.levels[p].children.push(name.clone());
        }
        self.index.insert(name, self.levels.len());
        self.levels.push(EntityDescriptor {
            def,
            ancestors,
            key_shape,
            children: Vec::new(),
            referenced_by: Vec::new(),
            limit_ancestor,
            reaches_outside: false,
        });
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), Error> {
        let mut incoming: Vec<(usize, IncomingReference)> = Vec::new();

        for level in &self.levels {
            let mut names = HashSet::new();
            for reference in level.references() {
                let context = format!("reference {} on {}", reference.name, level.name());
                if !names.insert(reference.name.as_str()) {
                    return Err(Error::Schema(format!("duplicate {}", context)));
                }

                let target_index = *self.index.get(&reference.target).ok_or_else(|| {
                    Error::Schema(format!(
                        "{} targets unknown level {}",
                        context, reference.target
                    ))
                })?;
                let target = &self.levels[target_index];

                if reference.columns.len() != target.key_width() {
                    return Err(Error::Schema(format!(
                        "{} has {} columns but {} keys have {} segments",
                        context,
                        reference.columns.len(),
                        target.name(),
                        target.key_width()
                    )));
                }

                for (column, segment) in reference.columns.iter().zip(target.key_shape()) {
                    let attribute = level.attribute(column).ok_or_else(|| {
                        Error::Schema(format!("{}: {} is not an attribute", context, column))
                    })?;
                    if attribute.scalar != segment.column.scalar {
                        return Err(Error::Schema(format!(
                            "{}: {} is {} but {} is {}",
                            context,
                            column,
                            attribute.scalar,
                            segment.qualified_name(),
                            segment.column.scalar
                        )));
                    }
                    if reference.nulls_columns() && !attribute.nullable {
                        return Err(Error::Schema(format!(
                            "{}: SET NULL requires {} to be nullable",
                            context, column
                        )));
                    }
                }

                incoming.push((
                    target_index,
                    IncomingReference {
                        from_level: level.name().to_string(),
                        reference: reference.clone(),
                    },
                ));
            }
        }

        for (target, reference) in incoming {
            self.levels[target].referenced_by.push(reference);
        }
        Ok(())
    }

    /// Children are always declared after their parent, so a reverse pass
    /// sees every child before the level itself.
    fn resolve_reach(&mut self) {
        for i in (0..self.levels.len()).rev() {
            let level = &self.levels[i];
            let reaches = !level.referenced_by.is_empty()
                || level
                    .children
                    .iter()
                    .any(|child| self.levels[self.index[child]].reaches_outside);
            self.levels[i].reaches_outside = reaches;
        }
    }
}

fn validate_columns(def: &LevelDef) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for column in def.key_columns.iter().chain(&def.attributes) {
        if !seen.insert(column.name.as_str()) {
            return Err(Error::Schema(format!(
                "duplicate column {} on {}",
                column.name, def.name
            )));
        }
        if let ScalarType::Decimal { scale } = column.scalar {
            if scale > MAX_SCALE {
                return Err(Error::Schema(format!(
                    "{}.{} is decimal({}), scale must not exceed {}",
                    def.name, column.name, scale, MAX_SCALE
                )));
            }
        }
        if let Some(default) = &column.default {
            column.coerce(&def.name, default.clone()).map_err(|e| {
                Error::Schema(format!(
                    "default for {}.{} does not fit: {}",
                    def.name, column.name, e
                ))
            })?;
        }
    }

    if let Some(column) = def.key_columns.iter().find(|c| c.nullable) {
        return Err(Error::Schema(format!(
            "key column {}.{} must not be nullable",
            def.name, column.name
        )));
    }
    Ok(())
}

fn validate_depth_columns(def: &LevelDef) -> Result<(), Error> {
    let is_decimal = |scalar: ScalarType| matches!(scalar, ScalarType::Decimal { .. });

    if let Some(interval) = &def.depth_interval {
        let top = def
            .key_columns
            .iter()
            .find(|c| c.name == interval.top)
            .ok_or_else(|| {
                Error::Schema(format!(
                    "depth interval top {}.{} must be a local key column",
                    def.name, interval.top
                ))
            })?;
        if !is_decimal(top.scalar) {
            return Err(Error::Schema(format!(
                "depth interval top {}.{} must be decimal",
                def.name, interval.top
            )));
        }

        if let Some(btm) = &interval.btm {
            match def.get_attribute(btm) {
                Some(column) if is_decimal(column.scalar) => {}
                _ => {
                    return Err(Error::Schema(format!(
                        "depth interval bottom {}.{} must be a decimal attribute",
                        def.name, btm
                    )))
                }
            }
        }
    }

    if let Some(limit) = &def.depth_limit {
        match def.get_attribute(limit) {
            Some(column) if is_decimal(column.scalar) => {}
            _ => {
                return Err(Error::Schema(format!(
                    "depth limit {}.{} must be a decimal attribute",
                    def.name, limit
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ReferenceDef};

    fn string_key(name: &str) -> ColumnDef {
        ColumnDef::new(name, ScalarType::String)
    }

    #[test]
    fn test_geotechnical_key_shapes() {
        let registry = Registry::geotechnical().unwrap();

        let point = registry.describe("POINT").unwrap();
        let names: Vec<_> = point.key_shape().iter().map(|s| s.qualified_name()).collect();
        assert_eq!(
            names,
            vec!["COMPANY.COMPANY_ID", "PROJECT.PROJECT_ID", "POINT.POINT_ID"]
        );
        assert_eq!(point.parent_width(), 2);
        assert_eq!(point.ancestors(), ["COMPANY", "PROJECT"]);

        let specimen = registry.describe("SPECIMEN").unwrap();
        assert_eq!(specimen.key_width(), 8);
        assert_eq!(specimen.parent_width(), 6);
        assert_eq!(specimen.top_position(), Some(6));

        let grading = registry.describe("GRADING_DATA").unwrap();
        assert_eq!(grading.key_width(), 9);
        assert_eq!(grading.root(), "COMPANY");
        assert_eq!(grading.limit_ancestor(), Some("POINT"));

        let ucs = registry.describe("UCS").unwrap();
        assert_eq!(ucs.local_width(), 0);
        assert_eq!(ucs.key_width(), specimen.key_width());
    }

    #[test]
    fn test_children_in_declaration_order() {
        let registry = Registry::geotechnical().unwrap();

        let children = registry.children("POINT").unwrap();
        assert_eq!(children.first().map(String::as_str), Some("CONSTRUCTION"));
        assert!(children.iter().any(|c| c == "SAMPLE"));
        assert_eq!(
            registry.children("GRADING_SUMMARY").unwrap(),
            ["GRADING_DATA".to_string()]
        );
        assert!(registry.children("GRADING_DATA").unwrap().is_empty());
    }

    #[test]
    fn test_depth_interval_flags() {
        let registry = Registry::geotechnical().unwrap();

        assert!(registry.is_depth_interval("GEOLOGY").unwrap());
        assert!(registry.is_depth_interval("SAMPLE").unwrap());
        assert!(registry.is_depth_interval("LFWD").unwrap());
        assert!(!registry.is_depth_interval("POINT").unwrap());
        assert!(!registry.is_depth_interval("UCS").unwrap());
    }

    #[test]
    fn test_unknown_level() {
        let registry = Registry::geotechnical().unwrap();
        assert!(matches!(
            registry.describe("BOREHOLE"),
            Err(Error::UnknownLevel(ref name)) if name == "BOREHOLE"
        ));
        assert!(!registry.contains("BOREHOLE"));
    }

    #[test]
    fn test_reach_outside_chain() {
        let registry = Registry::geotechnical().unwrap();

        let incoming = registry.referencing("CLIENT").unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].from_level, "PROJECT");

        assert!(registry.describe("CLIENT").unwrap().reaches_outside());
        assert!(!registry.describe("COMPANY").unwrap().reaches_outside());
        assert!(!registry.describe("SAMPLE").unwrap().reaches_outside());
    }

    #[test]
    fn test_parent_must_be_declared_first() {
        let desc = SchemaDescription::new()
            .with_level(LevelDef::child_of("PROJECT", "COMPANY").with_key(string_key("PROJECT_ID")))
            .with_level(LevelDef::new("COMPANY").with_key(string_key("COMPANY_ID")));

        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_duplicate_level_and_column() {
        let desc = SchemaDescription::new()
            .with_level(LevelDef::new("COMPANY").with_key(string_key("COMPANY_ID")))
            .with_level(LevelDef::new("COMPANY").with_key(string_key("COMPANY_ID")));
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));

        let desc = SchemaDescription::new().with_level(
            LevelDef::new("COMPANY")
                .with_key(string_key("COMPANY_ID"))
                .with_attribute(string_key("COMPANY_ID")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_root_needs_key() {
        let desc = SchemaDescription::new().with_level(LevelDef::new("COMPANY"));
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_depth_interval_columns_checked() {
        let desc = SchemaDescription::new()
            .with_level(LevelDef::new("POINT").with_key(string_key("POINT_ID")))
            .with_level(
                LevelDef::child_of("GEOLOGY", "POINT")
                    .with_key(ColumnDef::new("TOP", ScalarType::decimal(2)))
                    .with_attribute(ColumnDef::optional("BTM", ScalarType::String))
                    .with_depth_interval("TOP", Some("BTM")),
            );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));

        let desc = SchemaDescription::new()
            .with_level(LevelDef::new("POINT").with_key(string_key("POINT_ID")))
            .with_level(
                LevelDef::child_of("GEOLOGY", "POINT")
                    .with_attribute(ColumnDef::new("TOP", ScalarType::decimal(2)))
                    .with_depth_interval("TOP", None),
            );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_reference_validation() {
        let base = || {
            SchemaDescription::new()
                .with_level(LevelDef::new("CLIENT").with_key(string_key("CLIENT_ID")))
        };

        // Unknown target.
        let desc = base().with_level(
            LevelDef::new("PROJECT")
                .with_key(string_key("PROJECT_ID"))
                .with_attribute(ColumnDef::optional("OWNER_ID", ScalarType::String))
                .with_reference(ReferenceDef::optional("owner", "OWNER_ID", "OWNER")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));

        // SET NULL on a required column.
        let desc = base().with_level(
            LevelDef::new("PROJECT")
                .with_key(string_key("PROJECT_ID"))
                .with_attribute(string_key("CLIENT_ID"))
                .with_reference(ReferenceDef::optional("client", "CLIENT_ID", "CLIENT")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));

        // Type mismatch with the target key.
        let desc = base().with_level(
            LevelDef::new("PROJECT")
                .with_key(string_key("PROJECT_ID"))
                .with_attribute(ColumnDef::optional("CLIENT_ID", ScalarType::Integer))
                .with_reference(ReferenceDef::optional("client", "CLIENT_ID", "CLIENT")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));

        // Reference through a key column.
        let desc = base().with_level(
            LevelDef::new("PROJECT")
                .with_key(string_key("CLIENT_ID"))
                .with_reference(ReferenceDef::new("client", ["CLIENT_ID"], "CLIENT")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_bad_default_rejected() {
        let desc = SchemaDescription::new().with_level(
            LevelDef::new("POINT")
                .with_key(string_key("POINT_ID"))
                .with_attribute(ColumnDef::new("PAGE_DEPTH", ScalarType::Integer).with_default("six")),
        );
        assert!(matches!(Registry::build(desc), Err(Error::Schema(_))));
    }

    #[test]
    fn test_decimal_scale_limit() {
        let desc = SchemaDescription::new().with_level(
            LevelDef::new("POINT")
                .with_key(string_key("POINT_ID"))
                .with_attribute(ColumnDef::optional("FINAL_DEPTH", ScalarType::decimal(MAX_SCALE + 1))),
        );
        assert!(matches!(
            Registry::build(desc),
            Err(Error::Schema(ref msg)) if msg.contains("POINT.FINAL_DEPTH")
        ));

        let desc = SchemaDescription::new().with_level(
            LevelDef::new("POINT")
                .with_key(string_key("POINT_ID"))
                .with_attribute(ColumnDef::optional("FINAL_DEPTH", ScalarType::decimal(MAX_SCALE))),
        );
        assert!(Registry::build(desc).is_ok());
    }
}
