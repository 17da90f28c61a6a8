//! Cascade engine: turns one mutation into a validated, ordered plan and
//! applies it.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use geotdb_proto::{CompositeKey, Decimal, FieldValue, Mutation, Row, Value};
use tracing::{debug, info, instrument};

use super::plan::{CascadePlan, PlannedMutation};
use crate::catalog::{ColumnDef, EntityDescriptor, ReferenceDef, ReferentialAction, Registry};
use crate::config::EngineConfig;
use crate::error::Error;
use crate::keys::KeyResolver;
use crate::lock::{LockManager, LockScope};
use crate::storage::Storage;

/// `(level, key)` of a stored row.
type RowId = (String, CompositeKey);

/// A row collected for deletion with its depth below the target.
type Doomed = (String, CompositeKey, usize);

/// Edits to a row outside the renamed subtree.
struct ReferencerEdit {
    row: Row,
    rewritten: Vec<String>,
    nulled: Vec<String>,
}

impl ReferencerEdit {
    fn into_mutation(self, level: String) -> PlannedMutation {
        if self.rewritten.is_empty() {
            PlannedMutation::SetNull {
                level,
                row: self.row,
                columns: self.nulled,
            }
        } else {
            let mut changed = self.rewritten;
            changed.extend(self.nulled);
            PlannedMutation::UpdateAttribute {
                level,
                row: self.row,
                changed,
            }
        }
    }
}

/// Plans and applies mutations with full referential integrity.
///
/// Every mutation runs under the lock scope of its row, so planning and
/// apply see the same state. Structural violations abort planning before
/// anything reaches storage.
pub struct CascadeEngine<S: Storage> {
    registry: Arc<Registry>,
    resolver: KeyResolver,
    storage: S,
    locks: LockManager,
    config: EngineConfig,
}

impl<S: Storage> CascadeEngine<S> {
    /// Create an engine with the default configuration.
    pub fn new(registry: Arc<Registry>, storage: S) -> Self {
        Self::with_config(registry, storage, EngineConfig::default())
    }

    /// Create an engine with an explicit configuration.
    pub fn with_config(registry: Arc<Registry>, storage: S, config: EngineConfig) -> Self {
        Self {
            resolver: KeyResolver::new(Arc::clone(&registry)),
            registry,
            storage,
            locks: LockManager::new(),
            config,
        }
    }

    /// The schema registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The key resolver.
    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    /// The storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Plan and apply a mutation. Returns the applied plan.
    #[instrument(skip(self, mutation), fields(level = %mutation.level(), kind = %mutation.kind()))]
    pub fn execute(&self, mutation: Mutation) -> Result<CascadePlan, Error> {
        let scope = self.lock_scope(&mutation)?;
        self.locks.with_scope(&scope, || {
            let plan = self.plan(&mutation)?;
            self.apply(mutation.level(), &plan)?;
            Ok(plan)
        })
    }

    /// Insert a row.
    pub fn insert(
        &self,
        level: &str,
        key: CompositeKey,
        data: Vec<FieldValue>,
    ) -> Result<CascadePlan, Error> {
        self.execute(Mutation::insert(level, key, data))
    }

    /// Rename a row's local key; descendants and referencers follow.
    pub fn update_key(
        &self,
        level: &str,
        key: CompositeKey,
        new_local: Vec<Value>,
    ) -> Result<CascadePlan, Error> {
        self.execute(Mutation::update_key(level, key, new_local))
    }

    /// Change non-key attributes of a row.
    pub fn update_attributes(
        &self,
        level: &str,
        key: CompositeKey,
        data: Vec<FieldValue>,
    ) -> Result<CascadePlan, Error> {
        self.execute(Mutation::update_attributes(level, key, data))
    }

    /// Delete a row and everything it owns.
    pub fn delete(&self, level: &str, key: CompositeKey) -> Result<CascadePlan, Error> {
        self.execute(Mutation::delete(level, key))
    }

    /// Read a row. The key is normalized first, so `1` and `1.00` find the
    /// same depth.
    pub fn get(&self, level: &str, key: &CompositeKey) -> Result<Option<Row>, Error> {
        let key = self.resolver.normalize_key(level, key.clone())?;
        self.storage.get(level, &key)
    }

    /// Build the plan for a mutation without applying it or taking locks.
    pub fn plan(&self, mutation: &Mutation) -> Result<CascadePlan, Error> {
        match mutation {
            Mutation::Insert { level, row } => self.plan_insert(level, row),
            Mutation::UpdateKey {
                level,
                key,
                new_local,
            } => self.plan_update_key(level, key, new_local),
            Mutation::UpdateAttribute { level, key, data } => {
                self.plan_update_attributes(level, key, data)
            }
            Mutation::Delete { level, key } => self.plan_delete(level, key),
        }
    }

    fn lock_scope(&self, mutation: &Mutation) -> Result<LockScope, Error> {
        let level = mutation.level();
        let desc = self.registry.describe(level)?;
        let depth = self.config.lock_depth;
        let key = self.resolver.normalize_key(level, mutation.key().clone())?;

        let mut scope = LockScope::for_key(desc.root(), &key, depth);
        if let Mutation::UpdateKey { new_local, .. } = mutation {
            let new_local = self.resolver.normalize_local(level, new_local.clone())?;
            let new_key = self.resolver.rename(level, &key, &new_local)?;
            scope = scope.with_key(desc.root(), &new_key, depth);
        }

        let cascades = matches!(
            mutation,
            Mutation::UpdateKey { .. } | Mutation::Delete { .. }
        );
        if cascades && desc.reaches_outside() {
            scope = scope.with_exclusive_gate();
        }
        Ok(scope)
    }

    fn apply(&self, level: &str, plan: &CascadePlan) -> Result<(), Error> {
        if plan.is_empty() {
            debug!("Nothing to apply");
            return Ok(());
        }

        let batches = plan.to_batches(self.config.max_batch_ops);
        let batch_count = batches.len();
        for batch in batches {
            self.storage.apply(batch)?;
        }

        info!(
            level,
            affected = plan.affected_count(),
            batches = batch_count,
            "Cascade applied"
        );
        Ok(())
    }

    fn plan_insert(&self, level: &str, row: &Row) -> Result<CascadePlan, Error> {
        let desc = self.registry.describe(level)?;
        let key = self.resolver.normalize_key(level, row.key.clone())?;

        for name in row.fields.keys() {
            attribute_column(desc, name)?;
        }

        let mut stored = Row::new(key);
        for column in desc.attributes() {
            let value = match row.get(&column.name) {
                Some(value) => value.clone(),
                None => column.default.clone().unwrap_or(Value::Null),
            };
            stored.set(column.name.clone(), column.coerce(level, value)?);
        }

        if self.storage.contains(level, &stored.key)? {
            return Err(Error::DuplicateKey {
                level: level.to_string(),
                key: stored.key,
            });
        }

        if let (Some(parent_level), Some(parent_key)) = (
            desc.parent(),
            self.resolver.parent_key_of(level, &stored.key)?,
        ) {
            if !self.storage.contains(parent_level, &parent_key)? {
                return Err(Error::OrphanInsert {
                    level: level.to_string(),
                    parent_level: parent_level.to_string(),
                    parent_key,
                });
            }
        }

        self.check_references(desc, &stored, None)?;
        self.check_interval(desc, &stored, None)?;

        debug!(key = %stored.key, "Insert planned");
        Ok(CascadePlan::single(vec![PlannedMutation::Insert {
            level: level.to_string(),
            row: stored,
        }]))
    }

    fn plan_update_key(
        &self,
        level: &str,
        key: &CompositeKey,
        new_local: &[Value],
    ) -> Result<CascadePlan, Error> {
        let desc = self.registry.describe(level)?;
        let old_key = self.resolver.normalize_key(level, key.clone())?;
        let new_local = self.resolver.normalize_local(level, new_local.to_vec())?;
        let new_key = self.resolver.rename(level, &old_key, &new_local)?;

        if new_key == old_key {
            debug!(key = %old_key, "Rename to the same key");
            return Ok(CascadePlan::new());
        }

        let row = self
            .storage
            .get(level, &old_key)?
            .ok_or_else(|| not_found(level, &old_key))?;
        if self.storage.contains(level, &new_key)? {
            return Err(Error::DuplicateKey {
                level: level.to_string(),
                key: new_key,
            });
        }

        let renamed = row.rekeyed(new_key.clone());
        self.check_interval(desc, &renamed, None)?;

        let mut moved = vec![(level.to_string(), old_key.clone(), renamed)];
        self.collect_moved(level, &old_key, &new_key, &mut moved)?;

        let outside = self.rewrite_references(&mut moved)?;

        debug!(
            from = %old_key,
            to = %new_key,
            moved = moved.len(),
            referencers = outside.len(),
            "Rename planned"
        );

        let mut mutations: Vec<PlannedMutation> = moved
            .into_iter()
            .map(|(level, from, row)| PlannedMutation::UpdateKey { level, from, row })
            .collect();
        mutations.extend(
            outside
                .into_iter()
                .map(|((level, _), edit)| edit.into_mutation(level)),
        );
        Ok(CascadePlan::single(mutations))
    }

    /// Breadth-first walk below a renamed row, rebasing every descendant.
    fn collect_moved(
        &self,
        level: &str,
        old_key: &CompositeKey,
        new_key: &CompositeKey,
        moved: &mut Vec<(String, CompositeKey, Row)>,
    ) -> Result<(), Error> {
        let mut queue = VecDeque::from([(level.to_string(), old_key.clone(), 0usize)]);

        while let Some((parent_level, parent_key, depth)) = queue.pop_front() {
            for child in self.registry.children(&parent_level)? {
                let rows = self.storage.scan_prefix(child, parent_key.values())?;
                if !rows.is_empty() && depth + 1 > self.config.max_cascade_depth {
                    return Err(Error::MaxDepthExceeded { depth: depth + 1 });
                }

                for row in rows {
                    let rebased = KeyResolver::rebase(&row.key, old_key, new_key);
                    if self.storage.contains(child, &rebased)? {
                        return Err(Error::DuplicateKey {
                            level: child.clone(),
                            key: rebased,
                        });
                    }
                    queue.push_back((child.clone(), row.key.clone(), depth + 1));
                    moved.push((child.clone(), row.key.clone(), row.rekeyed(rebased)));
                }
            }
        }
        Ok(())
    }

    /// Apply every incoming reference's update action for the moved rows.
    ///
    /// Referencers inside the moved set are edited in place; the others are
    /// returned as cumulative edits.
    fn rewrite_references(
        &self,
        moved: &mut [(String, CompositeKey, Row)],
    ) -> Result<BTreeMap<RowId, ReferencerEdit>, Error> {
        let index: HashMap<RowId, usize> = moved
            .iter()
            .enumerate()
            .map(|(i, (level, from, _))| ((level.clone(), from.clone()), i))
            .collect();
        let mut outside: BTreeMap<RowId, ReferencerEdit> = BTreeMap::new();

        for i in 0..moved.len() {
            let (moved_level, from) = (moved[i].0.clone(), moved[i].1.clone());
            let to = moved[i].2.key.clone();

            for incoming in self.registry.referencing(&moved_level)? {
                let reference = &incoming.reference;
                for referencer in self.find_referencing(&incoming.from_level, reference, &from)? {
                    if reference.on_update == ReferentialAction::Restrict {
                        return Err(Error::CascadeConflict {
                            level: moved_level,
                            relation: reference.name.clone(),
                            referencing_level: incoming.from_level.clone(),
                            referencing_key: referencer.key,
                        });
                    }

                    let id = (incoming.from_level.clone(), referencer.key.clone());
                    if let Some(&j) = index.get(&id) {
                        follow_reference(&mut moved[j].2, reference, &to);
                        continue;
                    }

                    let edit = outside.entry(id).or_insert_with(|| ReferencerEdit {
                        row: referencer,
                        rewritten: Vec::new(),
                        nulled: Vec::new(),
                    });
                    follow_reference(&mut edit.row, reference, &to);
                    let touched = match reference.on_update {
                        ReferentialAction::SetNull => &mut edit.nulled,
                        _ => &mut edit.rewritten,
                    };
                    touched.extend(reference.columns.iter().cloned());
                }
            }
        }
        Ok(outside)
    }

    fn plan_delete(&self, level: &str, key: &CompositeKey) -> Result<CascadePlan, Error> {
        let desc = self.registry.describe(level)?;
        let key = self.resolver.normalize_key(level, key.clone())?;
        if !self.storage.contains(level, &key)? {
            return Err(not_found(level, &key));
        }

        let mut units: Vec<Vec<Doomed>> = Vec::new();
        for child in desc.children() {
            for row in self.storage.scan_prefix(child, key.values())? {
                let mut unit = Vec::new();
                self.collect_subtree(child, row.key, 1, &mut unit)?;
                units.push(unit);
            }
        }

        let deleted: HashSet<RowId> = units
            .iter()
            .flatten()
            .map(|(level, key, _)| (level.clone(), key.clone()))
            .chain(std::iter::once((level.to_string(), key.clone())))
            .collect();

        let mut snapshots: HashMap<RowId, Row> = HashMap::new();
        let mut plan = CascadePlan::new();
        for mut unit in units {
            unit.sort_by(|a, b| b.2.cmp(&a.2));

            let mut mutations = Vec::with_capacity(unit.len());
            for (doomed_level, doomed_key, _) in &unit {
                self.null_referencers(
                    doomed_level,
                    doomed_key,
                    &deleted,
                    &mut snapshots,
                    &mut mutations,
                )?;
            }
            mutations.extend(
                unit.into_iter()
                    .map(|(level, key, _)| PlannedMutation::Delete { level, key }),
            );
            plan.push_unit(mutations);
        }

        let mut last = Vec::new();
        self.null_referencers(level, &key, &deleted, &mut snapshots, &mut last)?;
        last.push(PlannedMutation::Delete {
            level: level.to_string(),
            key,
        });
        plan.push_unit(last);

        debug!(
            deleted = deleted.len(),
            nullified = snapshots.len(),
            units = plan.unit_count(),
            "Delete planned"
        );
        Ok(plan)
    }

    /// Post-order collection of a row and everything it owns.
    fn collect_subtree(
        &self,
        level: &str,
        key: CompositeKey,
        depth: usize,
        out: &mut Vec<Doomed>,
    ) -> Result<(), Error> {
        if depth > self.config.max_cascade_depth {
            return Err(Error::MaxDepthExceeded { depth });
        }

        for child in self.registry.children(level)? {
            for row in self.storage.scan_prefix(child, key.values())? {
                self.collect_subtree(child, row.key, depth + 1, out)?;
            }
        }
        out.push((level.to_string(), key, depth));
        Ok(())
    }

    /// Clear references to a deleted row from rows that survive the delete.
    fn null_referencers(
        &self,
        level: &str,
        key: &CompositeKey,
        deleted: &HashSet<RowId>,
        snapshots: &mut HashMap<RowId, Row>,
        out: &mut Vec<PlannedMutation>,
    ) -> Result<(), Error> {
        for incoming in self.registry.referencing(level)? {
            let reference = &incoming.reference;
            for referencer in self.find_referencing(&incoming.from_level, reference, key)? {
                let id = (incoming.from_level.clone(), referencer.key.clone());
                if deleted.contains(&id) {
                    continue;
                }
                if reference.on_delete != ReferentialAction::SetNull {
                    return Err(Error::CascadeConflict {
                        level: level.to_string(),
                        relation: reference.name.clone(),
                        referencing_level: incoming.from_level.clone(),
                        referencing_key: referencer.key,
                    });
                }

                let row = snapshots.entry(id).or_insert(referencer);
                for column in &reference.columns {
                    row.set(column.clone(), Value::Null);
                }
                out.push(PlannedMutation::SetNull {
                    level: incoming.from_level.clone(),
                    row: row.clone(),
                    columns: reference.columns.clone(),
                });
            }
        }
        Ok(())
    }

    fn plan_update_attributes(
        &self,
        level: &str,
        key: &CompositeKey,
        data: &[FieldValue],
    ) -> Result<CascadePlan, Error> {
        let desc = self.registry.describe(level)?;
        let key = self.resolver.normalize_key(level, key.clone())?;
        let mut row = self
            .storage
            .get(level, &key)?
            .ok_or_else(|| not_found(level, &key))?;

        let mut changed: Vec<String> = Vec::new();
        for fv in data {
            let column = attribute_column(desc, &fv.field)?;
            let value = column.coerce(level, fv.value.clone())?;
            if row.value(&column.name) != &value {
                row.set(column.name.clone(), value);
                if !changed.contains(&column.name) {
                    changed.push(column.name.clone());
                }
            }
        }

        if changed.is_empty() {
            debug!(key = %row.key, "Attribute update changes nothing");
            return Ok(CascadePlan::new());
        }

        self.check_references(desc, &row, Some(&changed))?;
        self.check_interval(desc, &row, None)?;
        if let Some(limit) = desc.depth_limit() {
            if changed.iter().any(|c| c == limit) {
                self.check_bounded_descendants(desc, &row)?;
            }
        }

        Ok(CascadePlan::single(vec![PlannedMutation::UpdateAttribute {
            level: level.to_string(),
            row,
            changed,
        }]))
    }

    /// Re-validate every interval bounded by `row`'s depth limit.
    fn check_bounded_descendants(&self, desc: &EntityDescriptor, row: &Row) -> Result<(), Error> {
        let mut pending: Vec<&str> = desc.children().iter().map(String::as_str).collect();

        while let Some(level) = pending.pop() {
            let child = self.registry.describe(level)?;
            if child.limit_ancestor() != Some(desc.name()) {
                continue;
            }
            if child.is_depth_interval() {
                for bounded in self.storage.scan_prefix(level, row.key.values())? {
                    self.check_interval(child, &bounded, Some(row))?;
                }
            }
            pending.extend(child.children().iter().map(String::as_str));
        }
        Ok(())
    }

    /// Every fully non-null reference must resolve. With `only`, references
    /// that do not use any of those columns are skipped.
    fn check_references(
        &self,
        desc: &EntityDescriptor,
        row: &Row,
        only: Option<&[String]>,
    ) -> Result<(), Error> {
        for reference in desc.references() {
            if let Some(only) = only {
                if !reference.columns.iter().any(|c| only.contains(c)) {
                    continue;
                }
            }

            let values: Vec<Value> = reference
                .columns
                .iter()
                .map(|c| row.value(c).clone())
                .collect();
            if values.iter().any(Value::is_null) {
                continue;
            }

            let target_key = CompositeKey::new(values);
            if !self.storage.contains(&reference.target, &target_key)? {
                return Err(Error::DanglingReference {
                    level: desc.name().to_string(),
                    relation: reference.name.clone(),
                    target_level: reference.target.clone(),
                    target_key,
                });
            }
        }
        Ok(())
    }

    /// `TOP <= BTM`, and `0 <= TOP <= BTM <= limit` when the nearest
    /// limit-declaring ancestor has a limit. `limit_row` stands in for that
    /// ancestor's stored row.
    fn check_interval(
        &self,
        desc: &EntityDescriptor,
        row: &Row,
        limit_row: Option<&Row>,
    ) -> Result<(), Error> {
        let Some(interval) = desc.depth_interval() else {
            return Ok(());
        };
        let Some(top) = desc
            .top_position()
            .and_then(|i| row.key.values().get(i))
            .and_then(Value::as_decimal)
        else {
            return Ok(());
        };
        let btm = interval
            .btm
            .as_deref()
            .and_then(|column| row.value(column).as_decimal());

        let violation = |reason: String| Error::IntervalViolation {
            level: desc.name().to_string(),
            key: row.key.clone(),
            reason,
        };

        if let Some(btm) = btm {
            if top > btm {
                return Err(violation(format!("TOP {} is below BTM {}", top, btm)));
            }
        }

        let Some((column, limit)) = self.depth_limit_for(desc, &row.key, limit_row)? else {
            return Ok(());
        };
        if top.is_negative() {
            return Err(violation(format!("TOP {} is above zero depth", top)));
        }
        let deepest = btm.map_or(top, |btm| btm.max(top));
        if deepest > limit {
            return Err(violation(format!(
                "depth {} is below {} {}",
                deepest, column, limit
            )));
        }
        Ok(())
    }

    fn depth_limit_for(
        &self,
        desc: &EntityDescriptor,
        key: &CompositeKey,
        limit_row: Option<&Row>,
    ) -> Result<Option<(String, Decimal)>, Error> {
        let Some(ancestor) = desc.limit_ancestor() else {
            return Ok(None);
        };
        let ancestor = self.registry.describe(ancestor)?;
        let Some(column) = ancestor.depth_limit() else {
            return Ok(None);
        };

        let fetched;
        let ancestor_row = match limit_row {
            Some(row) => Some(row),
            None => {
                fetched = self
                    .storage
                    .get(ancestor.name(), &key.prefix(ancestor.key_width()))?;
                fetched.as_ref()
            }
        };

        Ok(ancestor_row
            .and_then(|row| row.value(column).as_decimal())
            .map(|limit| (format!("{}.{}", ancestor.name(), column), limit)))
    }

    fn find_referencing(
        &self,
        from_level: &str,
        reference: &ReferenceDef,
        target_key: &CompositeKey,
    ) -> Result<Vec<Row>, Error> {
        Ok(self
            .storage
            .scan_prefix(from_level, &[])?
            .into_iter()
            .filter(|row| {
                reference
                    .columns
                    .iter()
                    .zip(target_key.values())
                    .all(|(column, value)| row.value(column) == value)
            })
            .collect())
    }
}

/// Rewrite or clear a referencer's columns after its target moved to `to`.
fn follow_reference(row: &mut Row, reference: &ReferenceDef, to: &CompositeKey) {
    match reference.on_update {
        ReferentialAction::SetNull => {
            for column in &reference.columns {
                row.set(column.clone(), Value::Null);
            }
        }
        _ => {
            for (column, value) in reference.columns.iter().zip(to.values()) {
                row.set(column.clone(), value.clone());
            }
        }
    }
}

/// Resolve a writable attribute, rejecting key columns and unknown names.
fn attribute_column<'d>(desc: &'d EntityDescriptor, name: &str) -> Result<&'d ColumnDef, Error> {
    desc.attribute(name).ok_or_else(|| {
        let is_key = desc.key_shape().iter().any(|s| s.column.name == name);
        Error::InvalidValue {
            level: desc.name().to_string(),
            column: name.to_string(),
            reason: if is_key {
                "key columns change through a key update".into()
            } else {
                "unknown column".into()
            },
        }
    })
}

fn not_found(level: &str, key: &CompositeKey) -> Error {
    Error::NotFound {
        level: level.to_string(),
        key: key.clone(),
    }
}
