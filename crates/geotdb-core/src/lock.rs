//! Ancestor-chain mutual exclusion.
//!
//! Every mutation runs inside a [`LockScope`]: a gate lock that is shared by
//! mutations confined to their own ancestor chain and exclusive for
//! mutations that can reach rows in other chains, plus a set of key-prefix
//! locks. Prefix locks are always acquired in `(length, root, key)` order.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use geotdb_proto::CompositeKey;
use parking_lot::RwLock;

/// Lock table size above which unused entries are dropped.
const PRUNE_THRESHOLD: usize = 1024;

/// Identifies one prefix lock. Field order is the acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PrefixId {
    len: usize,
    root: String,
    prefix: CompositeKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Mode {
    Shared,
    Exclusive,
}

/// The set of locks a mutation holds while it plans and applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockScope {
    exclusive_gate: bool,
    prefixes: BTreeMap<PrefixId, Mode>,
}

impl LockScope {
    /// An empty scope (shared gate, no prefixes).
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope for a mutation of the row at `key` under `root`: the key
    /// truncated to `depth` segments exclusively, every shorter prefix
    /// shared.
    pub fn for_key(root: &str, key: &CompositeKey, depth: usize) -> Self {
        Self::new().with_key(root, key, depth)
    }

    /// Add another key's prefixes (e.g. the destination of a rename).
    pub fn with_key(mut self, root: &str, key: &CompositeKey, depth: usize) -> Self {
        let exclusive_len = depth.max(1).min(key.len());
        for len in 1..exclusive_len {
            self.add(root, key.prefix(len), Mode::Shared);
        }
        if exclusive_len > 0 {
            self.add(root, key.prefix(exclusive_len), Mode::Exclusive);
        }
        self
    }

    /// Take the gate exclusively.
    pub fn with_exclusive_gate(mut self) -> Self {
        self.exclusive_gate = true;
        self
    }

    /// Check if the gate is taken exclusively.
    pub fn is_gate_exclusive(&self) -> bool {
        self.exclusive_gate
    }

    /// Number of prefix locks in the scope.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Check if the scope holds no prefix locks.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Prefixes locked exclusively, in acquisition order.
    pub fn exclusive_prefixes(&self) -> Vec<&CompositeKey> {
        self.prefixes
            .iter()
            .filter(|(_, mode)| **mode == Mode::Exclusive)
            .map(|(id, _)| &id.prefix)
            .collect()
    }

    fn add(&mut self, root: &str, prefix: CompositeKey, mode: Mode) {
        let id = PrefixId {
            len: prefix.len(),
            root: root.to_string(),
            prefix,
        };
        let entry = self.prefixes.entry(id).or_insert(mode);
        *entry = (*entry).max(mode);
    }
}

/// Table of prefix locks plus the gate.
#[derive(Debug, Default)]
pub struct LockManager {
    gate: RwLock<()>,
    prefixes: DashMap<PrefixId, Arc<RwLock<()>>>,
}

impl LockManager {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding every lock in `scope`.
    pub fn with_scope<T>(&self, scope: &LockScope, f: impl FnOnce() -> T) -> T {
        let _shared_gate = (!scope.exclusive_gate).then(|| self.gate.read());
        let _exclusive_gate = scope.exclusive_gate.then(|| self.gate.write());

        let locks: Vec<(Arc<RwLock<()>>, Mode)> = scope
            .prefixes
            .iter()
            .map(|(id, mode)| (self.lock_for(id), *mode))
            .collect();

        let mut shared = Vec::new();
        let mut exclusive = Vec::new();
        for (lock, mode) in &locks {
            match mode {
                Mode::Shared => shared.push(lock.read()),
                Mode::Exclusive => exclusive.push(lock.write()),
            }
        }

        let out = f();

        drop(exclusive);
        drop(shared);
        drop(locks);
        if self.prefixes.len() > PRUNE_THRESHOLD {
            self.prune();
        }
        out
    }

    /// Drop prefix locks nobody holds.
    pub fn prune(&self) {
        self.prefixes.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of prefix locks in the table.
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    fn lock_for(&self, id: &PrefixId) -> Arc<RwLock<()>> {
        self.prefixes
            .entry(id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }
}
