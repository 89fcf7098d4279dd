//! Per-container bounds cache with extremal-child memoization.
//!
//! Each container remembers its untransformed bounds and, for each of the
//! six box edges, the child that currently realizes it. When children
//! change, the dirty ones are re-examined first; a full rescan of the child
//! list only happens when some edge lost its holder and no dirty child
//! reclaimed it.
//!
//! The incremental path claims edges with `<=` / `>=` while the full rescan
//! uses strict `<` / `>`, so on ties a freshly dirty child takes over the
//! edge in the incremental pass and the first child keeps it in a rescan.

use super::node::NodeId;
use super::tree::SceneGraph;
use crate::geometry::{Bounds, Transform};

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

const MIN_X: usize = 0;
const MIN_Y: usize = 1;
const MIN_Z: usize = 2;
const MAX_X: usize = 3;
const MAX_Y: usize = 4;
const MAX_Z: usize = 5;

/// The children realizing each edge of a container's bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtremalChildren {
    pub min_x: Option<NodeId>,
    pub min_y: Option<NodeId>,
    pub min_z: Option<NodeId>,
    pub max_x: Option<NodeId>,
    pub max_y: Option<NodeId>,
    pub max_z: Option<NodeId>,
}

// ---------------------------------------------------------------------------
// BoundsCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct BoundsCache {
    pub(crate) cached: Bounds,
    pub(crate) invalid: bool,
    pub(crate) edges: [Option<NodeId>; 6],
    /// Number of children flagged `bounds_changed`.
    pub(crate) dirty_count: usize,
    /// Explicit dirty-children list, created once the container is wide.
    pub(crate) dirty_children: Option<Vec<NodeId>>,
}

impl BoundsCache {
    pub(crate) fn new() -> Self {
        Self {
            cached: Bounds::EMPTY,
            invalid: true,
            edges: [None; 6],
            dirty_count: 0,
            dirty_children: None,
        }
    }
}

/// Six extents of a box as an array indexed by the edge constants.
fn extents(b: &Bounds) -> [f64; 6] {
    [b.min_x, b.min_y, b.min_z, b.max_x, b.max_y, b.max_z]
}

fn from_extents(e: [f64; 6]) -> Bounds {
    Bounds::new(e[MIN_X], e[MIN_Y], e[MIN_Z], e[MAX_X], e[MAX_Y], e[MAX_Z])
}

impl SceneGraph {
    // -----------------------------------------------------------------------
    // Public queries
    // -----------------------------------------------------------------------

    /// Geometric bounds in the node's own coordinate space.
    pub fn bounds_in_local(&mut self, id: NodeId) -> Bounds {
        self.compute_geom_bounds(id, &Transform::IDENTITY)
    }

    /// Geometric bounds in the parent's coordinate space.
    pub fn bounds_in_parent(&mut self, id: NodeId) -> Bounds {
        let tx = self.local_to_parent(id);
        self.compute_geom_bounds(id, &tx)
    }

    /// Geometric bounds in scene space.
    pub fn bounds_in_scene(&mut self, id: NodeId) -> Bounds {
        let tx = self.local_to_scene(id);
        self.compute_geom_bounds(id, &tx)
    }

    /// Bounds used by layout: the current size for resizable nodes,
    /// geometry otherwise.
    pub fn layout_bounds(&mut self, id: NodeId) -> Bounds {
        match self.nodes.get(id).and_then(|n| n.sizing) {
            Some(sizing) => Bounds::from_rect(0.0, 0.0, sizing.width, sizing.height),
            None => self.bounds_in_local(id),
        }
    }

    /// Which children currently hold each edge of `id`'s cached bounds.
    ///
    /// Validates the cache first. `None` for leaves.
    pub fn extremal_children(&mut self, id: NodeId) -> Option<ExtremalChildren> {
        self.bounds_in_local(id);
        let edges = self.bounds.get(id)?.edges;
        Some(ExtremalChildren {
            min_x: edges[MIN_X],
            min_y: edges[MIN_Y],
            min_z: edges[MIN_Z],
            max_x: edges[MAX_X],
            max_y: edges[MAX_Y],
            max_z: edges[MAX_Z],
        })
    }

    // -----------------------------------------------------------------------
    // Computation
    // -----------------------------------------------------------------------

    pub(crate) fn compute_geom_bounds(&mut self, id: NodeId, tx: &Transform) -> Bounds {
        let Some(node) = self.nodes.get(id) else { return Bounds::EMPTY };
        if !node.is_container() {
            return tx.transform_bounds(&node.content);
        }
        let len = self.child_count(id);
        if len == 0 {
            return Bounds::EMPTY;
        }
        if tx.is_translate_or_identity() {
            if self.bounds.get(id).is_some_and(|c| c.invalid) {
                self.recompute_bounds(id);
                if let Some(cache) = self.bounds.get_mut(id) {
                    if let Some(list) = cache.dirty_children.as_mut() {
                        list.clear();
                    }
                    cache.invalid = false;
                    cache.dirty_count = 0;
                }
            }
            let cached = self.bounds.get(id).map_or(Bounds::EMPTY, |c| c.cached);
            return cached.translate(tx.tx, tx.ty, tx.tz);
        }
        // Rotation, scale or shear: axis alignment does not survive, so
        // every visible child is transformed and unioned from scratch.
        let mut result = Bounds::EMPTY;
        for i in 0..len {
            let Some(child) = self.child_at(id, i) else { break };
            if !self.nodes.get(child).is_some_and(|n| n.visible) {
                continue;
            }
            let b = self.child_transformed_bounds(child, tx);
            if !b.is_empty() {
                result = result.union(&b);
            }
        }
        result
    }

    /// `child`'s geometry mapped through its own transform and then `tx`.
    fn child_transformed_bounds(&mut self, child: NodeId, tx: &Transform) -> Bounds {
        let composed = tx.concat(&self.local_to_parent(child));
        self.compute_geom_bounds(child, &composed)
    }

    fn recompute_bounds(&mut self, id: NodeId) {
        let len = self.child_count(id);
        if len == 0 {
            if let Some(cache) = self.bounds.get_mut(id) {
                cache.cached = Bounds::EMPTY;
            }
            return;
        }
        if len == 1 {
            let Some(only) = self.child_at(id, 0) else { return };
            let visible = match self.nodes.get_mut(only) {
                Some(node) => {
                    node.bounds_changed = false;
                    node.visible
                }
                None => false,
            };
            let b = if visible {
                self.child_transformed_bounds(only, &Transform::IDENTITY)
            } else {
                Bounds::EMPTY
            };
            if let Some(cache) = self.bounds.get_mut(id) {
                cache.cached = b;
                cache.edges = if visible { [Some(only); 6] } else { [None; 6] };
            }
            return;
        }
        let dirty_count = self.bounds.get(id).map_or(0, |c| c.dirty_count);
        if dirty_count == 0 || !self.update_cached_bounds(id, dirty_count) {
            let all = self.children(id).to_vec();
            self.create_cached_bounds(id, &all);
        }
    }

    /// Dirty children to examine: the explicit list when present, the whole
    /// child list otherwise.
    fn dirty_candidates(&self, id: NodeId) -> Vec<NodeId> {
        match self.bounds.get(id).and_then(|c| c.dirty_children.as_ref()) {
            Some(list) => list.clone(),
            None => self.children(id).to_vec(),
        }
    }

    /// Try to revalidate the cache from the dirty children alone.
    ///
    /// Returns false when some edge is still unaccounted for, in which case
    /// the caller must rescan every child.
    fn update_cached_bounds(&mut self, id: NodeId, dirty_count: usize) -> bool {
        let Some(cache) = self.bounds.get(id) else { return false };
        if cache.cached.is_empty() {
            let nodes = self.dirty_candidates(id);
            self.create_cached_bounds(id, &nodes);
            return true;
        }

        let mut invalid = [false; 6];
        for (edge, holder) in cache.edges.iter().enumerate() {
            invalid[edge] = match holder {
                None => true,
                Some(h) => self.nodes.get(*h).is_none_or(|n| n.bounds_changed),
            };
        }
        let mut ext = extents(&cache.cached);
        let mut edges = cache.edges;

        let nodes = self.dirty_candidates(id);
        let mut remaining = dirty_count;
        for &node in nodes.iter().rev() {
            if remaining == 0 {
                break;
            }
            let Some(data) = self.nodes.get_mut(node) else { continue };
            if !data.bounds_changed {
                continue;
            }
            data.bounds_changed = false;
            remaining -= 1;
            let b = self.child_transformed_bounds(node, &Transform::IDENTITY);
            if b.is_empty() {
                continue;
            }
            let nb = extents(&b);
            for edge in MIN_X..=MIN_Z {
                if nb[edge] <= ext[edge] {
                    ext[edge] = nb[edge];
                    edges[edge] = Some(node);
                    invalid[edge] = false;
                }
            }
            for edge in MAX_X..=MAX_Z {
                if nb[edge] >= ext[edge] {
                    ext[edge] = nb[edge];
                    edges[edge] = Some(node);
                    invalid[edge] = false;
                }
            }
        }

        if invalid.iter().any(|&e| e) {
            return false;
        }
        if let Some(cache) = self.bounds.get_mut(id) {
            cache.cached = from_extents(ext);
            cache.edges = edges;
        }
        true
    }

    /// Rebuild the cache by scanning `nodes`.
    fn create_cached_bounds(&mut self, id: NodeId, nodes: &[NodeId]) {
        let mut ext = [0.0; 6];
        let mut edges: [Option<NodeId>; 6] = [None; 6];
        let mut found = false;
        for &node in nodes {
            let visible = match self.nodes.get_mut(node) {
                Some(data) => {
                    data.bounds_changed = false;
                    data.visible
                }
                None => false,
            };
            if !visible {
                continue;
            }
            let b = self.child_transformed_bounds(node, &Transform::IDENTITY);
            if b.is_empty() {
                continue;
            }
            let nb = extents(&b);
            if !found {
                ext = nb;
                edges = [Some(node); 6];
                found = true;
                continue;
            }
            for edge in MIN_X..=MIN_Z {
                if nb[edge] < ext[edge] {
                    ext[edge] = nb[edge];
                    edges[edge] = Some(node);
                }
            }
            for edge in MAX_X..=MAX_Z {
                if nb[edge] > ext[edge] {
                    ext[edge] = nb[edge];
                    edges[edge] = Some(node);
                }
            }
        }
        if let Some(cache) = self.bounds.get_mut(id) {
            cache.cached = if found { from_extents(ext) } else { Bounds::EMPTY };
            cache.edges = edges;
        }
    }

    // -----------------------------------------------------------------------
    // Child notifications
    // -----------------------------------------------------------------------

    /// Flag or unflag `child` as pending in `parent`'s cache.
    pub(crate) fn set_child_dirty(&mut self, parent: NodeId, child: NodeId, dirty: bool) {
        let Some(node) = self.nodes.get_mut(child) else { return };
        if node.bounds_changed == dirty {
            return;
        }
        node.bounds_changed = dirty;
        let Some(cache) = self.bounds.get_mut(parent) else { return };
        if dirty {
            if let Some(list) = cache.dirty_children.as_mut() {
                list.push(child);
            }
            cache.dirty_count += 1;
        } else {
            if let Some(list) = cache.dirty_children.as_mut() {
                list.retain(|&n| n != child);
            }
            cache.dirty_count = cache.dirty_count.saturating_sub(1);
        }
    }

    /// A visible child joined the bounds computation.
    pub(crate) fn child_included(&mut self, parent: NodeId, child: NodeId) {
        if let Some(cache) = self.bounds.get_mut(parent) {
            cache.invalid = true;
        }
        self.set_child_dirty(parent, child, true);
    }

    /// A child left the bounds computation; release any edge it held.
    pub(crate) fn child_excluded(&mut self, parent: NodeId, child: NodeId) {
        if let Some(cache) = self.bounds.get_mut(parent) {
            for edge in cache.edges.iter_mut() {
                if *edge == Some(child) {
                    *edge = None;
                    cache.invalid = true;
                }
            }
        }
        self.set_child_dirty(parent, child, false);
    }

    pub(crate) fn child_visibility_changed(&mut self, parent: NodeId, child: NodeId) {
        if self.nodes.get(child).is_some_and(|n| n.visible) {
            self.child_included(parent, child);
        } else {
            self.child_excluded(parent, child);
        }
        self.geom_changed(parent);
    }

    /// Create the explicit dirty-children list once `parent` is wide enough.
    pub(crate) fn promote_dirty_children(&mut self, parent: NodeId) {
        let threshold = self.config.dirty_children_threshold;
        let (Some(list), Some(cache)) = (self.child_lists.get(parent), self.bounds.get_mut(parent)) else {
            return;
        };
        if cache.dirty_children.is_some() || list.children.len() <= threshold {
            return;
        }
        let mut dirty = Vec::with_capacity(2 * threshold);
        if cache.dirty_count > 0 {
            dirty.extend(
                list.children
                    .iter()
                    .copied()
                    .filter(|&c| self.nodes.get(c).is_some_and(|n| n.visible && n.bounds_changed)),
            );
        }
        cache.dirty_children = Some(dirty);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeData;
    use crate::testing::reference_bounds;
    use pretty_assertions::assert_eq;

    fn rect(graph: &mut SceneGraph, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> NodeId {
        graph.create(NodeData::leaf(Bounds::new_2d(min_x, min_y, max_x, max_y)))
    }

    // ── Basic cases ──────────────────────────────────────────────────

    #[test]
    fn empty_container() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        assert!(graph.bounds_in_local(parent).is_empty());
    }

    #[test]
    fn single_child() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        graph.add_child(parent, a).unwrap();
        assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 10.0, 10.0));
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.min_x, Some(a));
        assert_eq!(edges.max_y, Some(a));
    }

    #[test]
    fn single_invisible_child() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = graph.create(NodeData::leaf(Bounds::new_2d(0.0, 0.0, 4.0, 4.0)).visible(false));
        graph.add_child(parent, a).unwrap();
        assert!(graph.bounds_in_local(parent).is_empty());
    }

    #[test]
    fn leaf_bounds_follow_layout_position() {
        let mut graph = SceneGraph::new();
        let a = graph.create(NodeData::leaf(Bounds::new_2d(0.0, 0.0, 2.0, 2.0)).at(5.0, 5.0));
        assert_eq!(graph.bounds_in_local(a), Bounds::new_2d(0.0, 0.0, 2.0, 2.0));
        assert_eq!(graph.bounds_in_parent(a), Bounds::new_2d(5.0, 5.0, 7.0, 7.0));
    }

    // ── Extremal edges ───────────────────────────────────────────────

    #[test]
    fn second_child_claims_far_edges() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 5.0, 5.0, 20.0, 20.0);
        graph.add_child(parent, a).unwrap();
        graph.bounds_in_local(parent);
        graph.add_child(parent, b).unwrap();
        assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 20.0, 20.0));
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.min_x, Some(a));
        assert_eq!(edges.max_x, Some(b));
        assert_eq!(edges.max_y, Some(b));
    }

    #[test]
    fn hiding_edge_holder_falls_back_to_rescan() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 5.0, 5.0, 20.0, 20.0);
        graph.add_children(parent, [a, b]).unwrap();
        graph.bounds_in_local(parent);
        graph.set_visible(b, false).unwrap();
        assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 10.0, 10.0));
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.max_x, Some(a));
        assert_eq!(edges.max_z, Some(a));
    }

    #[test]
    fn full_rescan_keeps_first_on_ties() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let c = rect(&mut graph, 2.0, 2.0, 3.0, 3.0);
        graph.add_children(parent, [a, b, c]).unwrap();
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.min_x, Some(a));
        assert_eq!(edges.max_x, Some(a));
    }

    #[test]
    fn incremental_update_hands_ties_to_dirty_child() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        graph.add_children(parent, [a, b]).unwrap();
        graph.bounds_in_local(parent);

        // Same extents again: b is re-examined incrementally and, with
        // `<=` / `>=`, takes every edge it ties on.
        graph.set_content(b, Bounds::new_2d(0.0, 0.0, 10.0, 10.0)).unwrap();
        graph.geom_changed(b);
        assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 10.0, 10.0));
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.min_x, Some(b));
        assert_eq!(edges.max_y, Some(b));

        // Hiding b forces a rescan, which leaves a holding every edge.
        graph.set_visible(b, false).unwrap();
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.min_x, Some(a));
        assert_eq!(edges.max_y, Some(a));
    }

    #[test]
    fn shrinking_edge_holder_forces_rescan() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 0.0, 0.0, 30.0, 30.0);
        let c = rect(&mut graph, 0.0, 0.0, 20.0, 5.0);
        graph.add_children(parent, [a, b, c]).unwrap();
        graph.bounds_in_local(parent);
        graph.set_content(b, Bounds::new_2d(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 20.0, 10.0));
        let edges = graph.extremal_children(parent).unwrap();
        assert_eq!(edges.max_x, Some(c));
        assert_eq!(edges.max_y, Some(a));
    }

    // ── Transforms ───────────────────────────────────────────────────

    #[test]
    fn translation_reuses_cache() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container().at(100.0, 50.0));
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        graph.add_child(parent, a).unwrap();
        assert_eq!(graph.bounds_in_parent(parent), Bounds::new_2d(100.0, 50.0, 110.0, 60.0));
        assert!(!graph.bounds[parent].invalid);
    }

    #[test]
    fn rotation_retransforms_children() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container().with_transform(Transform::scale(2.0, 3.0)));
        let a = rect(&mut graph, 0.0, 0.0, 10.0, 10.0);
        let b = rect(&mut graph, 10.0, 10.0, 20.0, 20.0);
        graph.add_children(parent, [a, b]).unwrap();
        assert_eq!(graph.bounds_in_parent(parent), Bounds::new_2d(0.0, 0.0, 40.0, 60.0));
    }

    // ── Propagation ──────────────────────────────────────────────────

    #[test]
    fn nested_change_reaches_grandparent() {
        let mut graph = SceneGraph::new();
        let outer = graph.create(NodeData::container());
        let inner = graph.create_child(outer, NodeData::container().at(10.0, 0.0)).unwrap();
        let a = rect(&mut graph, 0.0, 0.0, 5.0, 5.0);
        graph.add_child(inner, a).unwrap();
        assert_eq!(graph.bounds_in_local(outer), Bounds::new_2d(10.0, 0.0, 15.0, 5.0));
        graph.set_content(a, Bounds::new_2d(0.0, 0.0, 50.0, 5.0)).unwrap();
        assert_eq!(graph.bounds_in_local(outer), Bounds::new_2d(10.0, 0.0, 60.0, 5.0));
    }

    #[test]
    fn wide_container_matches_reference() {
        let mut graph = SceneGraph::new();
        let parent = graph.create(NodeData::container());
        let kids: Vec<NodeId> = (0..25)
            .map(|i| {
                let x = i as f64;
                rect(&mut graph, x, -x, x + 3.0, x * 2.0)
            })
            .collect();
        graph.add_children(parent, kids.iter().copied()).unwrap();
        assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));

        for (step, &kid) in kids.iter().enumerate().step_by(3) {
            let s = step as f64;
            graph.set_content(kid, Bounds::new_2d(-s, 0.0, s * 4.0, 1.0)).unwrap();
            assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));
        }
        graph.set_visible(kids[24], false).unwrap();
        graph.remove_child(parent, kids[0]).unwrap();
        graph.set_transform(kids[5], Transform::rotation(30.0)).unwrap();
        assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));
    }
}
