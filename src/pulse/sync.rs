//! Render synchronization: push pending node state into the backend.
//!
//! The first sync of a scene walks its whole tree and creates the pending
//! list. Later syncs only visit nodes enqueued since the previous one. The
//! graph refuses mutation while a sync runs.

use crate::graph::{DirtyBits, NodeId, SceneGraph, SceneId};
use crate::scene::SceneDirty;

use super::backend::{PeerUpdate, RemovedChildren, RenderBackend, SceneProperties};

/// What one sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub synced_nodes: usize,
    /// This was the scene's first, full-tree sync.
    pub full_sync: bool,
    pub scene_properties: bool,
}

impl SyncOutcome {
    pub fn did_work(&self) -> bool {
        self.synced_nodes > 0 || self.scene_properties
    }
}

/// Clears the sync guard even on early return.
struct SyncGuard<'a> {
    graph: &'a mut SceneGraph,
}

impl<'a> SyncGuard<'a> {
    fn enter(graph: &'a mut SceneGraph) -> Self {
        graph.in_sync = true;
        Self { graph }
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.graph.in_sync = false;
    }
}

impl SceneGraph {
    /// Whether a sync of `scene` would push anything.
    pub fn needs_sync(&self, scene: SceneId) -> bool {
        let Some(s) = self.scenes.get(scene) else { return false };
        !s.dirty.is_empty()
            || s.dirty_nodes.as_ref().is_none_or(|list| !list.is_empty())
            || !self.disposed.is_empty()
    }

    /// Whether a sync is running.
    pub fn is_syncing(&self) -> bool {
        self.in_sync
    }

    /// Push every pending change of `scene` to `backend`.
    pub(crate) fn synchronize(&mut self, scene: SceneId, backend: &mut dyn RenderBackend) -> SyncOutcome {
        let mut guard = SyncGuard::enter(self);
        let graph = &mut *guard.graph;

        let scene_properties = graph.synchronize_scene_properties(scene, backend);
        for id in std::mem::take(&mut graph.disposed) {
            backend.destroy_peer(id);
        }

        let Some(s) = graph.scenes.get_mut(scene) else {
            return SyncOutcome { scene_properties, ..SyncOutcome::default() };
        };
        let full_sync = s.dirty_nodes.is_none();
        let mut pending = if full_sync {
            s.dirty_nodes = Some(Vec::with_capacity(graph.config.initial_dirty_capacity));
            let root = s.root;
            root.map(|r| graph.scene_order(r)).unwrap_or_default()
        } else {
            let spare = std::mem::take(&mut s.spare_dirty);
            s.dirty_nodes.replace(spare).unwrap_or_default()
        };

        let mut synced_nodes = 0;
        for &id in &pending {
            let Some(node) = graph.nodes.get_mut(id) else { continue };
            if node.queued_in == Some(scene) {
                node.queued_in = None;
            }
            // Detached since it was enqueued; its bits wait for the next scene.
            if node.scene != Some(scene) {
                continue;
            }
            graph.sync_peer(id, backend);
            synced_nodes += 1;
        }

        pending.clear();
        if let Some(s) = graph.scenes.get_mut(scene) {
            s.spare_dirty = pending;
        }
        SyncOutcome { synced_nodes, full_sync, scene_properties }
    }

    /// Every node of the tree under `root`, clips included, parents first.
    fn scene_order(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
            if let Some(clip) = node.clip {
                stack.push(clip);
            }
        }
        order
    }

    fn synchronize_scene_properties(&mut self, scene: SceneId, backend: &mut dyn RenderBackend) -> bool {
        let Some(s) = self.scenes.get_mut(scene) else { return false };
        if s.dirty.is_empty() {
            return false;
        }
        let properties = SceneProperties {
            scene,
            dirty: s.dirty,
            root: s.root,
            width: s.width,
            height: s.height,
            fill: s.fill,
            camera: s.camera,
        };
        s.dirty = SceneDirty::empty();
        backend.set_scene_properties(&properties);
        true
    }

    /// Create the peer of `id` if the backend has not seen it yet.
    fn ensure_peer(&mut self, id: NodeId, backend: &mut dyn RenderBackend) {
        let Some(node) = self.nodes.get_mut(id) else { return };
        if !node.has_peer {
            backend.create_peer(id, node.kind);
            node.has_peer = true;
        }
    }

    fn sync_peer(&mut self, id: NodeId, backend: &mut dyn RenderBackend) {
        self.ensure_peer(id, backend);
        let clip = self.nodes.get(id).and_then(|n| n.clip);
        if let Some(clip) = clip {
            self.ensure_peer(clip, backend);
        }
        let bounds = self.bounds_in_local(id);
        let Some(node) = self.nodes.get(id) else { return };
        let dirty = node.dirty;
        log::trace!("sync {id:?} {dirty:?}");
        backend.update_peer(&PeerUpdate {
            node: id,
            dirty,
            visible: node.visible,
            local_to_parent: node.local_to_parent(),
            bounds,
            clip: node.clip,
            style: self.styles.get(id),
        });

        if let Some(list) = self.child_lists.get_mut(id) {
            if dirty.contains(DirtyBits::CHILDREN) {
                let from = list.start_index.min(list.children.len());
                // Children enqueued after their parent would otherwise be
                // referenced before their peers exist.
                for &child in &list.children[from..] {
                    if let Some(data) = self.nodes.get_mut(child) {
                        if !data.has_peer {
                            backend.create_peer(child, data.kind);
                            data.has_peer = true;
                        }
                    }
                }
                let removed = if list.removed_overflow {
                    RemovedChildren::All
                } else {
                    RemovedChildren::Listed(&list.removed)
                };
                backend.set_children(id, from, &list.children[from..], removed);
            }
            list.start_index = list.children.len();
            list.removed.clear();
            list.removed_overflow = false;
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.dirty = DirtyBits::empty();
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
    use crate::graph::{NodeData, NodeKind};
    use crate::testing::{BackendCall, RecordingBackend};
    use pretty_assertions::assert_eq;

    fn rect() -> NodeData {
        NodeData::leaf(Bounds::from_rect(0.0, 0.0, 2.0, 2.0))
    }

    fn build_scene() -> (SceneGraph, SceneId, NodeId, NodeId, NodeId) {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene(10.0, 10.0);
        let root = graph.create(NodeData::container());
        let a = graph.create_child(root, rect()).unwrap();
        let b = graph.create_child(root, rect()).unwrap();
        graph.set_root(scene, root).unwrap();
        (graph, scene, root, a, b)
    }

    // ── First sync ───────────────────────────────────────────────────

    #[test]
    fn first_sync_walks_whole_tree() {
        let (mut graph, scene, root, a, b) = build_scene();
        let mut backend = RecordingBackend::new();
        let outcome = graph.synchronize(scene, &mut backend);
        assert!(outcome.full_sync);
        assert_eq!(outcome.synced_nodes, 3);
        assert!(outcome.scene_properties);
        assert_eq!(backend.created(), vec![root, a, b]);
        assert!(backend.calls().contains(&BackendCall::SetChildren {
            parent: root,
            from: 0,
            children: vec![a, b],
            removed: Some(vec![]),
        }));
        assert!(graph.get(a).unwrap().has_peer());
        assert!(graph.get(a).unwrap().dirty_bits().is_empty());
        assert_eq!(graph.scene(scene).unwrap().pending_sync(), Some(&[][..]));
    }

    #[test]
    fn pending_list_gets_initial_capacity() {
        let (mut graph, scene, ..) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        let capacity = graph.scenes[scene].dirty_nodes.as_ref().map(Vec::capacity);
        assert!(capacity.is_some_and(|c| c >= graph.config().initial_dirty_capacity));
    }

    // ── Incremental sync ─────────────────────────────────────────────

    #[test]
    fn later_syncs_visit_only_enqueued_nodes() {
        let (mut graph, scene, _root, a, b) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        graph.set_visible(b, false).unwrap();
        let mut backend = RecordingBackend::new();
        let outcome = graph.synchronize(scene, &mut backend);
        assert!(!outcome.full_sync);
        assert!(!outcome.scene_properties);
        assert!(backend.updated().contains(&b));
        assert!(!backend.updated().contains(&a));
        assert!(backend.created().is_empty());
    }

    #[test]
    fn detached_after_enqueue_is_skipped() {
        let (mut graph, scene, root, a, _b) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        graph.set_visible(a, false).unwrap();
        graph.remove_child(root, a).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert!(!backend.updated().contains(&a));
        assert!(graph.is_dirty(a, DirtyBits::VISIBILITY));
    }

    #[test]
    fn children_resent_from_first_changed_index() {
        let (mut graph, scene, root, a, b) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        let c = graph.create_child(root, rect()).unwrap();
        graph.remove_child(root, a).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert!(backend.calls().contains(&BackendCall::SetChildren {
            parent: root,
            from: 0,
            children: vec![b, c],
            removed: Some(vec![a]),
        }));
        assert_eq!(graph.first_dirty_index(root), Some(2));
        assert_eq!(graph.pending_removals(root), Some(&[][..]));
    }

    #[test]
    fn late_children_get_peers_before_parent_lists_them() {
        let (mut graph, scene, root, a, _b) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        graph.set_visible(a, false).unwrap();
        graph.relocate(root, 1.0, 1.0).unwrap();
        let c = graph.create(rect());
        graph.add_child(root, c).unwrap();

        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        let calls = backend.calls();
        let created = calls.iter().position(|call| *call == BackendCall::CreatePeer(c, NodeKind::Leaf));
        let listed = calls
            .iter()
            .position(|call| matches!(call, BackendCall::SetChildren { parent, .. } if *parent == root));
        assert!(created.is_some() && listed.is_some());
        assert!(created < listed);
        assert_eq!(backend.created(), vec![c]);
        assert!(backend.updated().contains(&c));
    }

    #[test]
    fn clip_peer_exists_before_owner_update() {
        let (mut graph, scene, root, ..) = build_scene();
        let clip = graph.create(rect());
        graph.set_clip(root, Some(clip)).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        let calls = backend.calls();
        let created = calls.iter().position(|call| *call == BackendCall::CreatePeer(clip, NodeKind::Leaf));
        let updated = calls
            .iter()
            .position(|call| matches!(call, BackendCall::UpdatePeer { node, .. } if *node == root));
        assert!(created.is_some() && created < updated);
        assert_eq!(backend.created().iter().filter(|&&n| n == clip).count(), 1);
    }

    // ── Removed children ─────────────────────────────────────────────

    /// A synced scene whose root holds `count` leaves.
    fn build_wide_scene(count: usize) -> (SceneGraph, SceneId, NodeId) {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene(10.0, 10.0);
        let root = graph.create(NodeData::container());
        for _ in 0..count {
            graph.create_child(root, rect()).unwrap();
        }
        graph.set_root(scene, root).unwrap();
        graph.synchronize(scene, &mut RecordingBackend::new());
        (graph, scene, root)
    }

    fn removed_reported(backend: &RecordingBackend, root: NodeId) -> Option<Option<Vec<NodeId>>> {
        backend.calls().iter().find_map(|call| match call {
            BackendCall::SetChildren { parent, removed, .. } if *parent == root => Some(removed.clone()),
            _ => None,
        })
    }

    #[test]
    fn many_removals_in_one_batch_report_whole_list() {
        let (mut graph, scene, root) = build_wide_scene(25);
        graph.remove_children_at(root, 0..21).unwrap();
        assert_eq!(graph.pending_removals(root), None);

        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert_eq!(removed_reported(&backend, root), Some(None));
        assert_eq!(graph.pending_removals(root), Some(&[][..]));
    }

    #[test]
    fn removals_accumulate_across_batches_until_threshold() {
        let (mut graph, scene, root) = build_wide_scene(25);
        graph.remove_children_at(root, 0..10).unwrap();
        graph.remove_children_at(root, 0..10).unwrap();
        assert_eq!(graph.pending_removals(root).map(<[NodeId]>::len), Some(20));

        graph.remove_children_at(root, 0..1).unwrap();
        assert_eq!(graph.pending_removals(root), None);
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert_eq!(removed_reported(&backend, root), Some(None));

        // The next sync enumerates removals again.
        let last = graph.children(root)[0];
        graph.remove_child(root, last).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert_eq!(removed_reported(&backend, root), Some(Some(vec![last])));
    }

    #[test]
    fn removal_under_hidden_tree_reports_whole_list() {
        let (mut graph, scene, root) = build_wide_scene(3);
        graph.set_visible(root, false).unwrap();
        let first = graph.children(root)[0];
        graph.remove_child(root, first).unwrap();

        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert_eq!(removed_reported(&backend, root), Some(None));
    }

    #[test]
    fn destroyed_peers_are_released() {
        let (mut graph, scene, _root, a, _b) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        graph.destroy(a).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert!(backend.calls().contains(&BackendCall::DestroyPeer(a)));
    }

    #[test]
    fn guard_clears_after_sync() {
        let (mut graph, scene, ..) = build_scene();
        graph.synchronize(scene, &mut RecordingBackend::new());
        assert!(!graph.is_syncing());
        assert!(!graph.needs_sync(scene));
    }

    #[test]
    fn clip_nodes_are_synced() {
        let (mut graph, scene, root, ..) = build_scene();
        let clip = graph.create(rect());
        graph.set_clip(root, Some(clip)).unwrap();
        let mut backend = RecordingBackend::new();
        graph.synchronize(scene, &mut backend);
        assert!(backend.created().contains(&clip));
    }
}
