//! Dirty propagation: render-sync bits, pending-sync lists, geometry
//! invalidation.
//!
//! Setting a bit that is already set does nothing. A node enters its
//! scene's pending-sync list the first time any bit is set, and at most
//! once per scene.

use super::node::{DirtyBits, NodeId, SceneId};
use super::tree::SceneGraph;

impl SceneGraph {
    /// Set `bits` on `id` and schedule it for render sync.
    pub(crate) fn mark_dirty(&mut self, id: NodeId, bits: DirtyBits) {
        let Some(node) = self.nodes.get_mut(id) else { return };
        if node.dirty.contains(bits) {
            return;
        }
        let was_clean = node.dirty.is_empty();
        node.dirty |= bits;
        if was_clean {
            if let Some(scene) = node.scene {
                self.enqueue_for_sync(scene, id);
            }
        }
    }

    /// Add `id` to `scene`'s pending-sync list unless it is already there.
    ///
    /// Before the first sync there is no list yet: the first sync walks the
    /// whole tree anyway.
    pub(crate) fn enqueue_for_sync(&mut self, scene: SceneId, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else { return };
        if node.queued_in == Some(scene) {
            return;
        }
        let Some(s) = self.scenes.get_mut(scene) else { return };
        if let Some(list) = s.dirty_nodes.as_mut() {
            list.push(id);
            node.queued_in = Some(scene);
        }
        self.pulse_requested = true;
    }

    pub(crate) fn request_pulse(&mut self) {
        self.pulse_requested = true;
    }

    /// Whether anything asked for a pulse since the last one ran.
    pub fn needs_pulse(&self) -> bool {
        self.pulse_requested
    }

    /// Whether `id` has any of `bits` pending.
    pub fn is_dirty(&self, id: NodeId, bits: DirtyBits) -> bool {
        self.nodes.get(id).is_some_and(|n| n.dirty.intersects(bits))
    }

    /// `id`'s own geometry changed: schedule it and tell its parent.
    pub(crate) fn geom_changed(&mut self, id: NodeId) {
        self.mark_dirty(id, DirtyBits::BOUNDS);
        self.notify_parent_of_bounds_change(id);
    }

    /// `id`'s bounds in its parent changed.
    ///
    /// The parent's cache is invalidated and the parent is scheduled for
    /// sync. Further ancestors only have their caches invalidated and the
    /// path flagged, so their bounds are recomputed when next queried. The
    /// walk stops at the first ancestor that already knows.
    pub(crate) fn notify_parent_of_bounds_change(&mut self, id: NodeId) {
        let mut child = id;
        let mut first = true;
        loop {
            let Some(node) = self.nodes.get(child) else { return };
            if !node.visible {
                return;
            }
            let Some(parent) = node.parent else { return };
            let already_flagged = node.bounds_changed;
            if let Some(cache) = self.bounds.get_mut(parent) {
                cache.invalid = true;
            }
            if first {
                self.mark_dirty(parent, DirtyBits::BOUNDS);
                first = false;
            }
            if already_flagged {
                return;
            }
            self.set_child_dirty(parent, child, true);
            child = parent;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds;
    use crate::graph::NodeData;

    fn synced_scene() -> (SceneGraph, SceneId, NodeId, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene(100.0, 100.0);
        let root = graph.create(NodeData::container());
        let mid = graph.create_child(root, NodeData::container()).unwrap();
        let leaf = graph
            .create_child(mid, NodeData::leaf(Bounds::from_rect(0.0, 0.0, 5.0, 5.0)))
            .unwrap();
        graph.set_root(scene, root).unwrap();
        // Pretend the first sync happened.
        graph.scenes[scene].dirty_nodes = Some(Vec::new());
        for id in [root, mid, leaf] {
            graph.nodes[id].dirty = DirtyBits::empty();
            graph.nodes[id].queued_in = None;
        }
        graph.bounds_in_local(root);
        graph.pulse_requested = false;
        (graph, scene, root, mid, leaf)
    }

    #[test]
    fn mark_dirty_enqueues_once() {
        let (mut graph, scene, _root, _mid, leaf) = synced_scene();
        graph.mark_dirty(leaf, DirtyBits::CONTENTS);
        graph.mark_dirty(leaf, DirtyBits::CONTENTS);
        graph.mark_dirty(leaf, DirtyBits::TRANSFORM);
        assert_eq!(graph.scenes[scene].dirty_nodes.as_deref(), Some(&[leaf][..]));
        assert!(graph.needs_pulse());
        assert!(graph.is_dirty(leaf, DirtyBits::TRANSFORM));
    }

    #[test]
    fn detached_nodes_are_not_enqueued() {
        let (mut graph, scene, ..) = synced_scene();
        let loose = graph.create(NodeData::leaf(Bounds::EMPTY));
        graph.nodes[loose].dirty = DirtyBits::empty();
        graph.mark_dirty(loose, DirtyBits::CONTENTS);
        assert_eq!(graph.scenes[scene].dirty_nodes.as_deref(), Some(&[][..]));
    }

    #[test]
    fn geometry_change_schedules_parent_only() {
        let (mut graph, scene, root, mid, leaf) = synced_scene();
        graph.geom_changed(leaf);
        assert!(graph.is_dirty(leaf, DirtyBits::BOUNDS));
        assert!(graph.is_dirty(mid, DirtyBits::BOUNDS));
        assert!(!graph.is_dirty(root, DirtyBits::BOUNDS));
        assert!(graph.bounds[root].invalid);
        assert_eq!(graph.scenes[scene].dirty_nodes.as_deref(), Some(&[leaf, mid][..]));
    }

    #[test]
    fn repeated_geometry_change_stops_early() {
        let (mut graph, _scene, root, mid, leaf) = synced_scene();
        graph.geom_changed(leaf);
        let count = graph.bounds[root].dirty_count;
        graph.geom_changed(leaf);
        assert_eq!(graph.bounds[root].dirty_count, count);
        assert!(graph.get(mid).unwrap().bounds_changed);
    }

    #[test]
    fn invisible_nodes_do_not_propagate() {
        let (mut graph, _scene, _root, mid, leaf) = synced_scene();
        graph.nodes[leaf].visible = false;
        graph.geom_changed(leaf);
        assert!(!graph.bounds[mid].invalid);
    }
}
