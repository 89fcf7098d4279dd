//! Demand-driven layout: requests, dirty layout roots, passes.
//!
//! A container moves from [`LayoutFlag::Clean`] to
//! [`LayoutFlag::NeedsLayout`] when something asks for layout. The request
//! travels up the managed parent chain until it reaches a layout root
//! (an unmanaged node or the scene root), which registers itself in its
//! scene's dirty-layout-root list. A pass lays out each registered root and
//! then descends into every container child whose flag is not clean.

use crate::geometry::{Bounds, Size};
use crate::graph::{DirtyBits, NodeId, SceneGraph, SceneId};

use super::policy::LayoutPolicy;

/// Per-container layout state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutFlag {
    #[default]
    Clean,
    NeedsLayout,
    /// Some descendant needs layout; this node itself does not.
    DirtyBranch,
}

#[derive(Debug, Clone)]
pub(crate) struct LayoutState {
    pub(crate) flag: LayoutFlag,
    pub(crate) performing: bool,
    /// Layout was requested again while this node was performing.
    pub(crate) rerequested: bool,
    /// Scene whose dirty-layout-root list currently holds this node.
    pub(crate) registered_in: Option<SceneId>,
    pub(crate) pref: Option<Size>,
    pub(crate) min: Option<Size>,
}

impl LayoutState {
    pub(crate) fn new() -> Self {
        Self {
            flag: LayoutFlag::NeedsLayout,
            performing: false,
            rerequested: false,
            registered_in: None,
            pref: None,
            min: None,
        }
    }
}

impl SceneGraph {
    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Ask for `id` to be laid out on the next pass.
    ///
    /// A leaf forwards the request to its parent.
    pub fn request_layout(&mut self, id: NodeId) {
        if !self.is_container(id) {
            if let Some(parent) = self.parent(id) {
                self.request_layout(parent);
            }
            return;
        }
        self.clear_size_cache(id);
        let Some(state) = self.layout.get_mut(id) else { return };
        if state.performing {
            state.rerequested = true;
            self.mark_layout_branch(id);
            return;
        }
        if state.flag == LayoutFlag::NeedsLayout {
            return;
        }
        state.flag = LayoutFlag::NeedsLayout;

        if self.is_layout_root(id) {
            if let Some(scene) = self.scene_of(id) {
                self.add_to_dirty_layout_list(scene, id);
            }
            return;
        }
        let Some(parent) = self.parent(id) else { return };
        if self.layout.get(parent).is_some_and(|s| s.performing) {
            // The parent descends into us after its own layout; if it has
            // already passed us, the next iteration picks us up.
            self.mark_layout_branch(id);
        } else {
            self.request_layout(parent);
        }
    }

    /// Whether `id` or something below it still needs layout.
    pub fn needs_layout(&self, id: NodeId) -> bool {
        self.layout.get(id).is_some_and(|s| s.flag != LayoutFlag::Clean)
    }

    pub fn layout_flag(&self, id: NodeId) -> Option<LayoutFlag> {
        self.layout.get(id).map(|s| s.flag)
    }

    /// Flag the path above `id` as a dirty branch and register the layout
    /// root it leads to.
    fn mark_layout_branch(&mut self, id: NodeId) {
        let mut current = id;
        while !self.is_layout_root(current) {
            let Some(parent) = self.parent(current) else { return };
            if let Some(state) = self.layout.get_mut(parent) {
                if state.flag == LayoutFlag::Clean {
                    state.flag = LayoutFlag::DirtyBranch;
                }
            }
            current = parent;
        }
        if let Some(scene) = self.scene_of(current) {
            self.add_to_dirty_layout_list(scene, current);
        }
    }

    /// Register `id` as a dirty layout root of `scene`. At most once.
    pub(crate) fn add_to_dirty_layout_list(&mut self, scene: SceneId, id: NodeId) {
        let Some(state) = self.layout.get_mut(id) else { return };
        if state.registered_in == Some(scene) {
            return;
        }
        let Some(s) = self.scenes.get_mut(scene) else { return };
        s.layout_roots[s.active_layout].push(id);
        state.registered_in = Some(scene);
        self.pulse_requested = true;
    }

    /// Drop cached preferred and minimum sizes from `id` up to its layout root.
    fn clear_size_cache(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(c) = current {
            let Some(state) = self.layout.get_mut(c) else { break };
            state.pref = None;
            state.min = None;
            if self.is_layout_root(c) {
                break;
            }
            current = self.parent(c);
        }
    }

    // -----------------------------------------------------------------------
    // Passes
    // -----------------------------------------------------------------------

    /// Lay out `id` if needed, then every container child that needs it.
    pub(crate) fn layout_node(&mut self, id: NodeId) {
        let Some(state) = self.layout.get_mut(id) else { return };
        let flag = state.flag;
        if flag == LayoutFlag::Clean || state.performing {
            return;
        }
        state.performing = true;
        if flag == LayoutFlag::NeedsLayout {
            let outcome = self.with_policy(id, |policy, graph| policy.layout_children(graph, id));
            if let Some(Err(e)) = outcome {
                log::warn!("layout of {id:?} failed: {e}");
            }
        }

        let children: Vec<NodeId> = self
            .children(id)
            .iter()
            .copied()
            .filter(|&c| self.is_container(c))
            .collect();
        for child in &children {
            self.layout_node(*child);
        }

        let branch_dirty = children.iter().any(|&c| self.needs_layout(c));
        let Some(state) = self.layout.get_mut(id) else { return };
        state.performing = false;
        state.flag = if std::mem::take(&mut state.rerequested) {
            LayoutFlag::NeedsLayout
        } else if branch_dirty {
            LayoutFlag::DirtyBranch
        } else {
            LayoutFlag::Clean
        };
    }

    /// Drain `scene`'s dirty layout roots once.
    ///
    /// Registrations made while the pass runs go to the other buffer and
    /// wait for the next iteration.
    pub(crate) fn layout_dirty_roots(&mut self, scene: SceneId) {
        let Some(s) = self.scenes.get_mut(scene) else { return };
        let drained = s.active_layout;
        s.active_layout = 1 - drained;
        let mut roots = std::mem::take(&mut s.layout_roots[drained]);

        for &root in &roots {
            let Some(state) = self.layout.get_mut(root) else { continue };
            if state.registered_in == Some(scene) {
                state.registered_in = None;
            }
            if self.scene_of(root) == Some(scene) && self.needs_layout(root) {
                self.layout_node(root);
            }
        }

        roots.clear();
        if let Some(s) = self.scenes.get_mut(scene) {
            s.layout_roots[drained] = roots;
        }
    }

    /// One layout pass of a pulse: up to `attempts` iterations over the dirty
    /// layout roots. Returns the number of iterations that ran.
    ///
    /// Roots still dirty afterwards are left registered and a follow-up
    /// pulse is requested.
    pub(crate) fn do_layout_pass(&mut self, scene: SceneId, attempts: usize) -> usize {
        self.size_scene_root(scene);
        let mut ran = 0;
        while ran < attempts && self.has_pending_layout(scene) {
            self.layout_dirty_roots(scene);
            ran += 1;
        }
        if self.has_pending_layout(scene) {
            log::debug!("layout of {scene:?} did not converge after {ran} iterations, deferring");
            self.pulse_requested = true;
        }
        ran
    }

    pub(crate) fn has_pending_layout(&self, scene: SceneId) -> bool {
        self.scenes
            .get(scene)
            .is_some_and(|s| !s.layout_roots[s.active_layout].is_empty())
    }

    /// Resize a resizable scene root to the scene size.
    fn size_scene_root(&mut self, scene: SceneId) {
        let Some(s) = self.scenes.get(scene) else { return };
        let (Some(root), width, height) = (s.root, s.width, s.height) else { return };
        if self.nodes.get(root).is_some_and(|n| n.sizing.is_some()) {
            if let Err(e) = self.resize(root, width, height) {
                log::warn!("cannot size root of {scene:?}: {e}");
            }
        }
    }

    /// Lay out the tree containing `id` right away, outside any pulse.
    pub fn layout_now(&mut self, id: NodeId) -> crate::Result<()> {
        self.node(id)?;
        let top = self.ancestors(id).last().copied().unwrap_or(id);
        let attempts = self.config.snapshot_layout_attempts;
        if let Some(scene) = self.scene_of(top) {
            self.do_layout_pass(scene, attempts);
            return Ok(());
        }
        for _ in 0..attempts {
            if !self.needs_layout(top) {
                break;
            }
            self.layout_node(top);
        }
        Ok(())
    }

    /// Run `f` with the layout policy of `id` taken out of the graph.
    pub(crate) fn with_policy<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn LayoutPolicy, &mut SceneGraph) -> R,
    ) -> Option<R> {
        let mut policy = self.policies.remove(id)?;
        let result = f(policy.as_mut(), self);
        if self.nodes.contains_key(id) && !self.policies.contains_key(id) {
            self.policies.insert(id, policy);
        }
        Some(result)
    }

    // -----------------------------------------------------------------------
    // Sizing
    // -----------------------------------------------------------------------

    /// Preferred size. Explicit preferences win; a container asks its policy
    /// and caches the answer, a leaf prefers its current size.
    pub fn pref_size(&mut self, id: NodeId) -> Size {
        let Some(node) = self.nodes.get(id) else { return Size::ZERO };
        let sizing = node.sizing;
        if let Some(pref) = sizing.and_then(|s| s.pref) {
            return self.clamp_to_limits(id, pref);
        }
        if !node.is_container() {
            return match sizing {
                Some(s) => s.size(),
                None => bounds_size(&node.content),
            };
        }
        if let Some(cached) = self.layout.get(id).and_then(|s| s.pref) {
            return cached;
        }
        let computed = self
            .with_policy(id, |policy, graph| policy.pref_size(graph, id))
            .unwrap_or(Size::ZERO);
        let computed = self.clamp_to_limits(id, computed);
        if let Some(state) = self.layout.get_mut(id) {
            state.pref = Some(computed);
        }
        computed
    }

    /// Minimum size. Defaults to the preferred size for non-resizable nodes.
    pub fn min_size(&mut self, id: NodeId) -> Size {
        let Some(node) = self.nodes.get(id) else { return Size::ZERO };
        let sizing = node.sizing;
        if let Some(min) = sizing.and_then(|s| s.min) {
            return min;
        }
        if sizing.is_none() || !node.is_container() {
            return self.pref_size(id);
        }
        if let Some(cached) = self.layout.get(id).and_then(|s| s.min) {
            return cached;
        }
        let computed = self
            .with_policy(id, |policy, graph| policy.min_size(graph, id))
            .unwrap_or(Size::ZERO);
        if let Some(state) = self.layout.get_mut(id) {
            state.min = Some(computed);
        }
        computed
    }

    /// Maximum size. Unbounded for resizable nodes without an explicit maximum.
    pub fn max_size(&mut self, id: NodeId) -> Size {
        match self.nodes.get(id).map(|n| n.sizing) {
            Some(Some(sizing)) => sizing.max.unwrap_or(Size::MAX),
            Some(None) => self.pref_size(id),
            None => Size::ZERO,
        }
    }

    fn clamp_to_limits(&self, id: NodeId, size: Size) -> Size {
        let Some(sizing) = self.nodes.get(id).and_then(|n| n.sizing) else { return size };
        size.clamp(sizing.min.unwrap_or(Size::ZERO), sizing.max.unwrap_or(Size::MAX))
    }

    /// Resize a resizable node. Non-resizable nodes ignore the call.
    pub fn resize(&mut self, id: NodeId, width: f64, height: f64) -> crate::Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        let Some(sizing) = node.sizing.as_mut() else { return Ok(()) };
        if sizing.width == width && sizing.height == height {
            return Ok(());
        }
        sizing.width = width;
        sizing.height = height;
        if node.is_container() {
            self.mark_dirty(id, DirtyBits::CONTENTS);
            self.request_layout(id);
        } else {
            node.content = Bounds::from_rect(0.0, 0.0, width, height);
            self.mark_dirty(id, DirtyBits::CONTENTS);
            self.geom_changed(id);
        }
        Ok(())
    }

    /// Move a node's layout position.
    pub fn relocate(&mut self, id: NodeId, x: f64, y: f64) -> crate::Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.layout_x == x && node.layout_y == y {
            return Ok(());
        }
        node.layout_x = x;
        node.layout_y = y;
        self.mark_dirty(id, DirtyBits::TRANSFORM);
        self.notify_parent_of_bounds_change(id);
        Ok(())
    }

    /// Resize a resizable node to its preferred size.
    pub fn autosize(&mut self, id: NodeId) -> crate::Result<()> {
        if !self.node(id)?.is_resizable() {
            return Ok(());
        }
        let pref = self.pref_size(id);
        self.resize(id, pref.width, pref.height)
    }
}

fn bounds_size(bounds: &Bounds) -> Size {
    if bounds.is_empty() {
        Size::ZERO
    } else {
        Size::new(bounds.width(), bounds.height())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
