//! Configuration for the vector-box phase.
//!
//! This module provides [`VectorConfig`], which controls which optional stages of the
//! phase run and the resource limits of a compilation session.

/// Configuration for the vector-box phase.
///
/// Controls the reboxing switches, the node budget, the merge recursion cap, and the
/// post-phase housekeeping.
#[derive(Debug, Clone)]
pub struct VectorConfig {
    /// Scalarize boxes referenced only by safepoint debug info (default: false).
    pub enable_reboxing: bool,

    /// Clone one box allocation per Java call site that consumes a merged box
    /// (default: false). Only effective together with `enable_reboxing`.
    pub enable_aggressive_reboxing: bool,

    /// Maximum number of live nodes before the session bails out (default: 80 000).
    pub max_nodes: usize,

    /// Maximum nesting of merged allocations expanded for one box (default: 64).
    pub max_merge_depth: usize,

    /// Renumber the graph densely after cleanup (default: false).
    pub compact_after_cleanup: bool,

    /// Verify the graph structure after the phase (default: on in debug builds).
    pub verify_result: bool,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            enable_reboxing: false,
            enable_aggressive_reboxing: false,
            max_nodes: 80_000,
            max_merge_depth: 64,
            compact_after_cleanup: false,
            verify_result: cfg!(debug_assertions),
        }
    }
}

impl VectorConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with every reboxing stage enabled.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            enable_reboxing: true,
            enable_aggressive_reboxing: true,
            ..Self::default()
        }
    }

    /// Sets the reboxing switches.
    ///
    /// # Arguments
    ///
    /// * `reboxing` - Scalarize debug-only boxes.
    /// * `aggressive` - Clone allocations per call site.
    #[must_use]
    pub fn with_reboxing(mut self, reboxing: bool, aggressive: bool) -> Self {
        self.enable_reboxing = reboxing;
        self.enable_aggressive_reboxing = aggressive;
        self
    }

    /// Sets the node budget.
    #[must_use]
    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// Sets the merge recursion cap.
    #[must_use]
    pub fn with_max_merge_depth(mut self, depth: usize) -> Self {
        self.max_merge_depth = depth;
        self
    }

    /// Enables or disables compaction after cleanup.
    #[must_use]
    pub fn with_compaction(mut self, enable: bool) -> Self {
        self.compact_after_cleanup = enable;
        self
    }

    /// Enables or disables post-phase verification.
    #[must_use]
    pub fn with_verification(mut self, enable: bool) -> Self {
        self.verify_result = enable;
        self
    }

    /// Returns `true` if the aggressive reboxing stage will run.
    #[must_use]
    pub fn aggressive_reboxing_active(&self) -> bool {
        self.enable_reboxing && self.enable_aggressive_reboxing
    }
}
