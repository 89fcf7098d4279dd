//! Hit-testing.
//!
//! Picking walks the tree back to front: children are tried in reverse
//! paint order, so the topmost node wins. Each node tests the point in its
//! own local space.

use crate::geometry::Point;
use crate::graph::{NodeId, SceneGraph, SceneId};

impl SceneGraph {
    /// The topmost node of `scene` under `point` (scene coordinates).
    pub fn pick(&mut self, scene: SceneId, point: Point) -> Option<NodeId> {
        let root = self.scenes.get(scene)?.root?;
        self.pick_node(root, point)
    }

    /// `point` is in `id`'s parent space.
    ///
    /// Invisible and mouse-transparent nodes hide their whole subtree. A
    /// container is only hit itself when none of its children is and it
    /// picks on bounds.
    fn pick_node(&mut self, id: NodeId, point: Point) -> Option<NodeId> {
        let node = self.nodes.get(id)?;
        if !node.visible || node.mouse_transparent {
            return None;
        }
        let local = node.local_to_parent().inverse_transform_point(point)?;
        let (clip, pick_on_bounds, content) = (node.clip, node.pick_on_bounds, node.content);

        if let Some(clip) = clip {
            if !self.clip_contains(clip, local) {
                return None;
            }
        }
        if !self.is_container(id) {
            return content.contains(local).then_some(id);
        }
        let children = self.children(id).to_vec();
        for &child in children.iter().rev() {
            if let Some(hit) = self.pick_node(child, local) {
                return Some(hit);
            }
        }
        (pick_on_bounds && self.bounds_in_local(id).contains(local)).then_some(id)
    }

    /// Whether `point`, in the clip owner's local space, lies inside `clip`.
    fn clip_contains(&mut self, clip: NodeId, point: Point) -> bool {
        let Some(node) = self.nodes.get(clip) else { return true };
        let Some(local) = node.local_to_parent().inverse_transform_point(point) else { return false };
        self.bounds_in_local(clip).contains(local)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
