//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Lock granularity that serializes mutations per Project.
pub const PROJECT_LOCK_DEPTH: usize = 2;

/// Lock granularity that serializes mutations per Point.
pub const POINT_LOCK_DEPTH: usize = 3;

/// Configuration for the cascade engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of leading key segments that identify a lock scope.
    ///
    /// A mutation locks its key truncated to this many segments exclusively,
    /// and every shorter prefix shared.
    pub lock_depth: usize,

    /// Split delete plans into batches of at most this many operations, at
    /// independent child-subtree boundaries. None applies every plan as one
    /// batch.
    pub max_batch_ops: Option<usize>,

    /// Maximum ownership depth a cascade may walk.
    pub max_cascade_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_depth: PROJECT_LOCK_DEPTH,
            max_batch_ops: None,
            max_cascade_depth: 16,
        }
    }
}

impl EngineConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize mutations per Point instead of per Project.
    pub fn per_point_locks(mut self) -> Self {
        self.lock_depth = POINT_LOCK_DEPTH;
        self
    }

    /// Serialize mutations per Project.
    pub fn per_project_locks(mut self) -> Self {
        self.lock_depth = PROJECT_LOCK_DEPTH;
        self
    }

    /// Set the lock depth directly. Zero is treated as one.
    pub fn with_lock_depth(mut self, depth: usize) -> Self {
        self.lock_depth = depth.max(1);
        self
    }

    /// Cap the number of operations per delete batch. Zero is treated as one.
    pub fn with_max_batch_ops(mut self, max: usize) -> Self {
        self.max_batch_ops = Some(max.max(1));
        self
    }

    /// Set the maximum cascade depth.
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }
}
