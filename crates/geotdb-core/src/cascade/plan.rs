//! Cascade plans: the linearized mutations a single request expands into.

use geotdb_proto::{CompositeKey, Row};
use tracing::warn;

use crate::storage::WriteBatch;

/// One row-level change produced by planning.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedMutation {
    /// Store a new row.
    Insert { level: String, row: Row },
    /// Move a row from `from` to `row.key`.
    UpdateKey {
        level: String,
        from: CompositeKey,
        row: Row,
    },
    /// Overwrite attributes of an existing row.
    UpdateAttribute {
        level: String,
        row: Row,
        changed: Vec<String>,
    },
    /// Clear reference columns of an existing row.
    SetNull {
        level: String,
        row: Row,
        columns: Vec<String>,
    },
    /// Remove a row.
    Delete { level: String, key: CompositeKey },
}

impl PlannedMutation {
    /// Level of the affected row.
    pub fn level(&self) -> &str {
        match self {
            PlannedMutation::Insert { level, .. }
            | PlannedMutation::UpdateKey { level, .. }
            | PlannedMutation::UpdateAttribute { level, .. }
            | PlannedMutation::SetNull { level, .. }
            | PlannedMutation::Delete { level, .. } => level,
        }
    }

    /// Key of the affected row after the change (the removed key for
    /// deletes).
    pub fn key(&self) -> &CompositeKey {
        match self {
            PlannedMutation::Insert { row, .. }
            | PlannedMutation::UpdateKey { row, .. }
            | PlannedMutation::UpdateAttribute { row, .. }
            | PlannedMutation::SetNull { row, .. } => &row.key,
            PlannedMutation::Delete { key, .. } => key,
        }
    }

    /// Number of storage operations this lowers into.
    pub fn op_count(&self) -> usize {
        match self {
            PlannedMutation::UpdateKey { .. } => 2,
            _ => 1,
        }
    }

    fn lower_into(&self, batch: &mut WriteBatch) {
        match self {
            PlannedMutation::Insert { level, row }
            | PlannedMutation::UpdateAttribute { level, row, .. }
            | PlannedMutation::SetNull { level, row, .. } => batch.put(level.as_str(), row.clone()),
            PlannedMutation::UpdateKey { level, from, row } => {
                batch.delete(level.as_str(), from.clone());
                batch.put(level.as_str(), row.clone());
            }
            PlannedMutation::Delete { level, key } => batch.delete(level.as_str(), key.clone()),
        }
    }
}

/// The ordered mutations for one request.
///
/// A plan is made of units. A unit is a run of mutations that must be applied
/// together; units of a delete plan are independent child subtrees (the
/// target row and its own nulled referencers form the last unit). Plans for
/// every other mutation kind are a single unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadePlan {
    mutations: Vec<PlannedMutation>,
    unit_starts: Vec<usize>,
}

impl CascadePlan {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// A plan of one unit.
    pub fn single(mutations: Vec<PlannedMutation>) -> Self {
        let mut plan = Self::new();
        plan.push_unit(mutations);
        plan
    }

    /// Append a unit. Empty units are ignored.
    pub fn push_unit(&mut self, mutations: Vec<PlannedMutation>) {
        if mutations.is_empty() {
            return;
        }
        self.unit_starts.push(self.mutations.len());
        self.mutations.extend(mutations);
    }

    /// Every planned mutation in apply order.
    pub fn mutations(&self) -> &[PlannedMutation] {
        &self.mutations
    }

    /// Number of units.
    pub fn unit_count(&self) -> usize {
        self.unit_starts.len()
    }

    /// Check if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Number of rows the plan touches.
    pub fn affected_count(&self) -> usize {
        self.mutations.len()
    }

    /// Rows removed, as `(level, key)`.
    pub fn deleted(&self) -> Vec<(&str, &CompositeKey)> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                PlannedMutation::Delete { level, key } => Some((level.as_str(), key)),
                _ => None,
            })
            .collect()
    }

    /// Rows whose reference columns were cleared, as `(level, key, columns)`.
    pub fn nullified(&self) -> Vec<(&str, &CompositeKey, &[String])> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                PlannedMutation::SetNull {
                    level,
                    row,
                    columns,
                } => Some((level.as_str(), &row.key, columns.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// Renamed rows, as `(level, old key, new key)`.
    pub fn key_updates(&self) -> Vec<(&str, &CompositeKey, &CompositeKey)> {
        self.mutations
            .iter()
            .filter_map(|m| match m {
                PlannedMutation::UpdateKey { level, from, row } => {
                    Some((level.as_str(), from, &row.key))
                }
                _ => None,
            })
            .collect()
    }

    /// Number of storage operations the whole plan lowers into.
    pub fn op_count(&self) -> usize {
        self.mutations.iter().map(PlannedMutation::op_count).sum()
    }

    /// Lower the plan into write batches.
    ///
    /// With `max_ops` set, consecutive units are packed into batches of at
    /// most `max_ops` operations; a unit is never split, so a unit larger
    /// than the cap gets a batch of its own. Without a cap the whole plan is
    /// one batch.
    pub fn to_batches(&self, max_ops: Option<usize>) -> Vec<WriteBatch> {
        if self.is_empty() {
            return Vec::new();
        }

        let Some(max_ops) = max_ops else {
            let mut batch = WriteBatch::new();
            for m in &self.mutations {
                m.lower_into(&mut batch);
            }
            return vec![batch];
        };

        let mut batches = Vec::new();
        let mut current = WriteBatch::new();
        for unit in self.units() {
            let unit_ops: usize = unit.iter().map(PlannedMutation::op_count).sum();
            if !current.is_empty() && current.len() + unit_ops > max_ops {
                batches.push(std::mem::take(&mut current));
            }
            if unit_ops > max_ops {
                warn!(
                    unit_ops,
                    max_ops, "Cascade unit exceeds batch cap, applying it whole"
                );
            }
            for m in unit {
                m.lower_into(&mut current);
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }

    fn units(&self) -> impl Iterator<Item = &[PlannedMutation]> {
        self.unit_starts.iter().enumerate().map(|(i, &start)| {
            let end = self
                .unit_starts
                .get(i + 1)
                .copied()
                .unwrap_or(self.mutations.len());
            &self.mutations[start..end]
        })
    }
}
