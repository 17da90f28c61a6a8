//! Schema description - the declarative input to the registry.

use serde::{Deserialize, Serialize};

use super::level::LevelDef;
use super::relation::ReferenceDef;

/// Ordered list of level definitions.
///
/// Declaration order matters: a parent must be declared before its children,
/// and children are enumerated in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescription {
    /// Level definitions in declaration order.
    pub levels: Vec<LevelDef>,
}

impl SchemaDescription {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a level to the description.
    pub fn with_level(mut self, level: LevelDef) -> Self {
        self.levels.push(level);
        self
    }

    /// Get a level by name.
    pub fn get_level(&self, name: &str) -> Option<&LevelDef> {
        self.levels.iter().find(|l| l.name == name)
    }

    /// Levels directly owned by `parent`.
    pub fn levels_under(&self, parent: &str) -> Vec<&LevelDef> {
        self.levels
            .iter()
            .filter(|l| l.parent.as_deref() == Some(parent))
            .collect()
    }

    /// All references that point at `target`, with the referencing level.
    pub fn references_to(&self, target: &str) -> Vec<(&str, &ReferenceDef)> {
        self.levels
            .iter()
            .flat_map(|l| l.references.iter().map(move |r| (l.name.as_str(), r)))
            .filter(|(_, r)| r.target == target)
            .collect()
    }

    /// List all level names in declaration order.
    pub fn level_names(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnDef, ScalarType};

    fn sample_description() -> SchemaDescription {
        SchemaDescription::new()
            .with_level(
                LevelDef::new("CLIENT").with_key(ColumnDef::new("CLIENT_ID", ScalarType::String)),
            )
            .with_level(
                LevelDef::new("COMPANY").with_key(ColumnDef::new("COMPANY_ID", ScalarType::String)),
            )
            .with_level(
                LevelDef::child_of("PROJECT", "COMPANY")
                    .with_key(ColumnDef::new("PROJECT_ID", ScalarType::String))
                    .with_attribute(ColumnDef::optional("CLIENT_ID", ScalarType::String))
                    .with_reference(ReferenceDef::optional(
                        "project_client",
                        "CLIENT_ID",
                        "CLIENT",
                    )),
            )
    }

    #[test]
    fn test_description_builder() {
        let desc = sample_description();

        assert_eq!(desc.level_names(), vec!["CLIENT", "COMPANY", "PROJECT"]);
        assert!(desc.get_level("PROJECT").is_some());
        assert!(desc.get_level("POINT").is_none());
    }

    #[test]
    fn test_levels_under_and_references_to() {
        let desc = sample_description();

        let owned = desc.levels_under("COMPANY");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "PROJECT");
        assert!(desc.levels_under("CLIENT").is_empty());

        let incoming = desc.references_to("CLIENT");
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].0, "PROJECT");
        assert_eq!(incoming[0].1.name, "project_client");
    }
}
