//! Tunables for the scene graph.
//!
//! The defaults reproduce the behaviour the engine was calibrated against;
//! changing them trades bookkeeping cost for precision.

// ---------------------------------------------------------------------------
// SceneConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every scene in a [`SceneGraph`](crate::graph::SceneGraph).
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Child count above which a container tracks bounds-dirty children in an
    /// explicit list instead of scanning.
    pub dirty_children_threshold: usize,
    /// Removed children accumulated per sync before a container reports its
    /// whole child list as dirty instead.
    pub removed_children_threshold: usize,
    /// Capacity of the pending-sync list seeded after the first full sync.
    pub initial_dirty_capacity: usize,
    /// Layout iterations attempted per pulse before deferring.
    pub layout_passes_per_pulse: usize,
    /// Layout iterations attempted when preparing a snapshot.
    pub snapshot_layout_attempts: usize,
    /// Touch point count up to which the touch map uses linear lookups.
    pub touch_fast_path_threshold: usize,
    /// Pointer travel (in scene units) before a press becomes a drag.
    pub drag_threshold: f64,
    /// Log a warning when a child is moved from one parent to another implicitly.
    pub warn_on_auto_move: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            dirty_children_threshold: 10,
            removed_children_threshold: 20,
            initial_dirty_capacity: 30,
            layout_passes_per_pulse: 2,
            snapshot_layout_attempts: 3,
            touch_fast_path_threshold: 10,
            drag_threshold: 5.0,
            warn_on_auto_move: false,
        }
    }
}

impl SceneConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dirty-children promotion threshold (builder).
    pub fn with_dirty_children_threshold(mut self, threshold: usize) -> Self {
        self.dirty_children_threshold = threshold;
        self
    }

    /// Set the removed-children threshold (builder).
    pub fn with_removed_children_threshold(mut self, threshold: usize) -> Self {
        self.removed_children_threshold = threshold;
        self
    }

    /// Set the initial pending-sync capacity (builder).
    pub fn with_initial_dirty_capacity(mut self, capacity: usize) -> Self {
        self.initial_dirty_capacity = capacity;
        self
    }

    /// Set the per-pulse layout iterations (builder). At least one pass always runs.
    pub fn with_layout_passes_per_pulse(mut self, passes: usize) -> Self {
        self.layout_passes_per_pulse = passes.max(1);
        self
    }

    /// Set the snapshot layout iterations (builder).
    pub fn with_snapshot_layout_attempts(mut self, attempts: usize) -> Self {
        self.snapshot_layout_attempts = attempts.max(1);
        self
    }

    /// Set the touch fast-path threshold (builder).
    pub fn with_touch_fast_path_threshold(mut self, threshold: usize) -> Self {
        self.touch_fast_path_threshold = threshold;
        self
    }

    /// Set the drag detection threshold (builder).
    pub fn with_drag_threshold(mut self, threshold: f64) -> Self {
        self.drag_threshold = threshold;
        self
    }

    /// Enable or disable the implicit-move warning (builder).
    pub fn with_warn_on_auto_move(mut self, warn: bool) -> Self {
        self.warn_on_auto_move = warn;
        self
    }
}

// ===========================================================================
// Tests
// ===========================================================================
