//! Level definitions and their resolved descriptors.

use serde::{Deserialize, Serialize};

use super::field::ColumnDef;
use super::relation::ReferenceDef;

/// TOP/BTM columns of a depth-interval level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthIntervalDef {
    /// Local key column holding the top of the interval.
    pub top: String,
    /// Attribute holding the bottom. `None` for open-ended levels.
    #[serde(default)]
    pub btm: Option<String>,
}

/// One level of the hierarchy as declared by the schema description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    /// Level name (unique within the schema).
    pub name: String,
    /// Owning parent level, `None` for roots.
    #[serde(default)]
    pub parent: Option<String>,
    /// Local identity columns, in key order.
    #[serde(default)]
    pub key_columns: Vec<ColumnDef>,
    /// Non-key attributes.
    #[serde(default)]
    pub attributes: Vec<ColumnDef>,
    /// Non-owning references to other levels.
    #[serde(default)]
    pub references: Vec<ReferenceDef>,
    /// Depth interval columns, if the level is a depth interval.
    #[serde(default)]
    pub depth_interval: Option<DepthIntervalDef>,
    /// Attribute that bounds the depth intervals of every descendant.
    #[serde(default)]
    pub depth_limit: Option<String>,
}

impl LevelDef {
    /// Create a root level.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            key_columns: Vec::new(),
            attributes: Vec::new(),
            references: Vec::new(),
            depth_interval: None,
            depth_limit: None,
        }
    }

    /// Create a level owned by `parent`.
    pub fn child_of(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Self::new(name)
        }
    }

    /// Add a local key column.
    pub fn with_key(mut self, column: ColumnDef) -> Self {
        self.key_columns.push(column);
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, column: ColumnDef) -> Self {
        self.attributes.push(column);
        self
    }

    /// Add multiple attributes.
    pub fn with_attributes(mut self, columns: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.attributes.extend(columns);
        self
    }

    /// Add a non-owning reference.
    pub fn with_reference(mut self, reference: ReferenceDef) -> Self {
        self.references.push(reference);
        self
    }

    /// Mark the level as a depth interval.
    pub fn with_depth_interval(mut self, top: impl Into<String>, btm: Option<&str>) -> Self {
        self.depth_interval = Some(DepthIntervalDef {
            top: top.into(),
            btm: btm.map(str::to_string),
        });
        self
    }

    /// Declare the attribute that bounds descendant depth intervals.
    pub fn with_depth_limit(mut self, column: impl Into<String>) -> Self {
        self.depth_limit = Some(column.into());
        self
    }

    /// Get an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&ColumnDef> {
        self.attributes.iter().find(|c| c.name == name)
    }

    /// Position of a local key column.
    pub fn key_position(&self, name: &str) -> Option<usize> {
        self.key_columns.iter().position(|c| c.name == name)
    }
}

/// One segment of a full key shape: the level that contributes it and the
/// column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct KeySegment {
    /// Level that declares the column.
    pub level: String,
    /// Column definition.
    pub column: ColumnDef,
}

impl KeySegment {
    /// `LEVEL.COLUMN`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.level, self.column.name)
    }
}

/// A reference pointing at a level, seen from the target side.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingReference {
    /// Level holding the referencing columns.
    pub from_level: String,
    /// The reference definition.
    pub reference: ReferenceDef,
}

/// A level definition resolved against the rest of the schema.
///
/// Key inheritance is structural: the descriptor stores the full key shape
/// (every ancestor's local columns, root first) followed by its own local
/// columns.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub(crate) def: LevelDef,
    pub(crate) ancestors: Vec<String>,
    pub(crate) key_shape: Vec<KeySegment>,
    pub(crate) children: Vec<String>,
    pub(crate) referenced_by: Vec<IncomingReference>,
    pub(crate) limit_ancestor: Option<String>,
    pub(crate) reaches_outside: bool,
}

impl EntityDescriptor {
    /// Level name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Owning parent level.
    pub fn parent(&self) -> Option<&str> {
        self.def.parent.as_deref()
    }

    /// Ancestor levels, root first, excluding this level.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Root level of this level's chain (itself for roots).
    pub fn root(&self) -> &str {
        self.ancestors.first().map(String::as_str).unwrap_or(self.name())
    }

    /// Full key shape, root first.
    pub fn key_shape(&self) -> &[KeySegment] {
        &self.key_shape
    }

    /// Number of segments in a full key.
    pub fn key_width(&self) -> usize {
        self.key_shape.len()
    }

    /// Number of segments inherited from the parent.
    pub fn parent_width(&self) -> usize {
        self.key_shape.len() - self.def.key_columns.len()
    }

    /// Number of local key segments.
    pub fn local_width(&self) -> usize {
        self.def.key_columns.len()
    }

    /// Non-key attributes.
    pub fn attributes(&self) -> &[ColumnDef] {
        &self.def.attributes
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&ColumnDef> {
        self.def.get_attribute(name)
    }

    /// Outgoing non-owning references.
    pub fn references(&self) -> &[ReferenceDef] {
        &self.def.references
    }

    /// References from other levels that point at this level.
    pub fn referenced_by(&self) -> &[IncomingReference] {
        &self.referenced_by
    }

    /// Child levels in declaration order.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Check if the level is subject to the TOP/BTM invariant.
    pub fn is_depth_interval(&self) -> bool {
        self.def.depth_interval.is_some()
    }

    /// Depth interval columns.
    pub fn depth_interval(&self) -> Option<&DepthIntervalDef> {
        self.def.depth_interval.as_ref()
    }

    /// Position of the TOP column within the full key.
    pub fn top_position(&self) -> Option<usize> {
        let interval = self.def.depth_interval.as_ref()?;
        self.def
            .key_position(&interval.top)
            .map(|local| self.parent_width() + local)
    }

    /// Attribute bounding the depth intervals of descendants.
    pub fn depth_limit(&self) -> Option<&str> {
        self.def.depth_limit.as_deref()
    }

    /// Nearest strict ancestor that declares a depth limit.
    pub fn limit_ancestor(&self) -> Option<&str> {
        self.limit_ancestor.as_deref()
    }

    /// Whether a cascade from this level can reach rows outside its own
    /// ancestor chain (through references into it or its descendants).
    pub fn reaches_outside(&self) -> bool {
        self.reaches_outside
    }
}
