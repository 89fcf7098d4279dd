//! Root contexts and focus.
//!
//! A [`Scene`] owns one root node, the double-buffered dirty layout roots
//! and pending-sync lists, its scene-level properties, and the focus
//! owner. [`FocusChain`] lists the focusable, visible, enabled nodes of a
//! scene in traversal order.

use bitflags::bitflags;

use crate::error::{Result, SceneError};
use crate::graph::{CssFlag, NodeId, SceneGraph, SceneId};

bitflags! {
    /// Scene-level properties pending push to the renderer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SceneDirty: u8 {
        const ROOT   = 1 << 0;
        const FILL   = 1 << 1;
        const CAMERA = 1 << 2;
        const SIZE   = 1 << 3;
    }
}

/// Projection used to render and pick a scene.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Camera {
    #[default]
    Parallel,
    Perspective { field_of_view: f64 },
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

/// One root context.
#[derive(Debug)]
pub struct Scene {
    pub(crate) root: Option<NodeId>,
    pub(crate) width: f64,
    pub(crate) height: f64,
    /// Background as `0xRRGGBBAA`.
    pub(crate) fill: Option<u32>,
    pub(crate) camera: Camera,
    pub(crate) window_attached: bool,
    pub(crate) dirty: SceneDirty,
    /// Dirty layout roots; new registrations go to `layout_roots[active_layout]`.
    pub(crate) layout_roots: [Vec<NodeId>; 2],
    pub(crate) active_layout: usize,
    /// Pending-sync nodes. `None` until the first full sync.
    pub(crate) dirty_nodes: Option<Vec<NodeId>>,
    /// Second buffer swapped in while `dirty_nodes` is being drained.
    pub(crate) spare_dirty: Vec<NodeId>,
    pub(crate) focus_owner: Option<NodeId>,
    pub(crate) focus_dirty: bool,
}

impl Scene {
    fn new(width: f64, height: f64) -> Self {
        Self {
            root: None,
            width,
            height,
            fill: None,
            camera: Camera::Parallel,
            window_attached: false,
            dirty: SceneDirty::all(),
            layout_roots: [Vec::new(), Vec::new()],
            active_layout: 0,
            dirty_nodes: None,
            spare_dirty: Vec::new(),
            focus_owner: None,
            focus_dirty: true,
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn fill(&self) -> Option<u32> {
        self.fill
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn is_window_attached(&self) -> bool {
        self.window_attached
    }

    pub fn dirty_bits(&self) -> SceneDirty {
        self.dirty
    }

    pub fn focus_owner(&self) -> Option<NodeId> {
        self.focus_owner
    }

    pub fn is_focus_dirty(&self) -> bool {
        self.focus_dirty
    }

    /// Layout roots waiting for the next layout pass.
    pub fn pending_layout_roots(&self) -> &[NodeId] {
        &self.layout_roots[self.active_layout]
    }

    /// Nodes waiting for render sync, or `None` before the first sync.
    pub fn pending_sync(&self) -> Option<&[NodeId]> {
        self.dirty_nodes.as_deref()
    }
}

// ---------------------------------------------------------------------------
// FocusChain
// ---------------------------------------------------------------------------

/// Maintains an ordered list of focusable nodes for traversal.
///
/// Focus cycles through the chain in forward or backward order.
#[derive(Debug, Default)]
pub struct FocusChain {
    /// Focusable nodes in traversal order (depth-first).
    nodes: Vec<NodeId>,
    /// Index of the current node, or `None` if no focus.
    current: Option<usize>,
}

impl FocusChain {
    /// Create a new, empty focus chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the chain from `scene`'s tree, keeping the current node
    /// when it is still eligible.
    pub fn rebuild(&mut self, graph: &SceneGraph, scene: SceneId) {
        let old = self.current_node();
        self.nodes.clear();
        self.current = None;
        let Some(root) = graph.scene(scene).and_then(Scene::root) else { return };
        self.nodes
            .extend(graph.walk_depth_first(root).into_iter().filter(|&id| graph.can_receive_focus(id)));
        if let Some(old) = old {
            self.current = self.nodes.iter().position(|&n| n == old);
        }
    }

    /// The first eligible node after `from` in traversal order, wrapping.
    ///
    /// `from` itself may be ineligible; it only marks the position. Falls
    /// back to the first eligible node when `from` is not in the tree.
    pub fn successor(graph: &SceneGraph, scene: SceneId, from: NodeId) -> Option<NodeId> {
        let root = graph.scene(scene)?.root?;
        let order = graph.walk_depth_first(root);
        let start = order.iter().position(|&n| n == from).map_or(0, |p| p + 1);
        order[start..]
            .iter()
            .chain(order[..start].iter())
            .copied()
            .find(|&n| n != from && graph.can_receive_focus(n))
    }

    /// The currently focused node, if any.
    pub fn current_node(&self) -> Option<NodeId> {
        self.current.and_then(|idx| self.nodes.get(idx).copied())
    }

    /// Focus a specific node. Returns `true` if the node is in the chain.
    pub fn focus_node(&mut self, id: NodeId) -> bool {
        match self.nodes.iter().position(|&n| n == id) {
            Some(pos) => {
                self.current = Some(pos);
                true
            }
            None => false,
        }
    }

    /// Move focus to the next node in the chain. Wraps around.
    pub fn focus_next(&mut self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        let next = match self.current {
            Some(idx) => (idx + 1) % self.nodes.len(),
            None => 0,
        };
        self.current = Some(next);
        self.nodes.get(next).copied()
    }

    /// Move focus to the previous node in the chain. Wraps around.
    pub fn focus_previous(&mut self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            return None;
        }
        let prev = match self.current {
            Some(0) | None => self.nodes.len() - 1,
            Some(idx) => idx - 1,
        };
        self.current = Some(prev);
        self.nodes.get(prev).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scene API
// ---------------------------------------------------------------------------

impl SceneGraph {
    /// Create an empty root context of the given size.
    pub fn create_scene(&mut self, width: f64, height: f64) -> SceneId {
        self.pulse_requested = true;
        self.scenes.insert(Scene::new(width, height))
    }

    pub fn scene(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub(crate) fn scene_mut(&mut self, id: SceneId) -> Result<&mut Scene> {
        self.scenes.get_mut(id).ok_or(SceneError::NoSuchScene(id))
    }

    /// Reject changes to a window-attached scene from off its thread, and to
    /// any scene while a sync runs.
    pub(crate) fn check_scene_mutation(&self, scene: SceneId) -> Result<()> {
        let s = self.scenes.get(scene).ok_or(SceneError::NoSuchScene(scene))?;
        if self.in_sync {
            return Err(SceneError::SyncInProgress);
        }
        if s.window_attached {
            self.check_thread()?;
        }
        Ok(())
    }

    /// Detach the root and drop the scene.
    pub fn destroy_scene(&mut self, id: SceneId) -> Result<()> {
        self.check_scene_mutation(id)?;
        self.clear_root(id);
        self.scenes.remove(id);
        Ok(())
    }

    /// Install `root` as the scene's root node.
    pub fn set_root(&mut self, scene: SceneId, root: NodeId) -> Result<()> {
        self.check_scene_mutation(scene)?;
        let current = self.scene_mut(scene)?.root;
        if current == Some(root) {
            return Ok(());
        }
        let data = self.node(root)?;
        if data.parent.is_some() {
            return Err(SceneError::RootHasParent { node: root });
        }
        if data.clip_parent.is_some() {
            return Err(SceneError::ClipTarget { parent: root, node: root });
        }
        if data.scene.is_some() && self.is_scene_root(root) {
            return Err(SceneError::AlreadySceneRoot { node: root });
        }
        if let Some(current) = current {
            self.check_mutation(current)?;
        }
        self.clear_root(scene);
        let s = self.scene_mut(scene)?;
        s.root = Some(root);
        s.dirty |= SceneDirty::ROOT;
        self.set_scenes(root, Some(scene));
        self.request_layout(root);
        self.epoch += 1;
        self.pulse_requested = true;
        Ok(())
    }

    pub(crate) fn clear_root(&mut self, scene: SceneId) {
        let Some(s) = self.scenes.get_mut(scene) else { return };
        let Some(old) = s.root.take() else { return };
        s.dirty |= SceneDirty::ROOT;
        self.set_scenes(old, None);
        self.departures.push((scene, old));
        self.epoch += 1;
        self.pulse_requested = true;
    }

    /// Resize the scene. A resizable root follows on the next layout pass.
    pub fn set_scene_size(&mut self, scene: SceneId, width: f64, height: f64) -> Result<()> {
        self.check_scene_mutation(scene)?;
        let s = self.scene_mut(scene)?;
        if s.width == width && s.height == height {
            return Ok(());
        }
        s.width = width;
        s.height = height;
        s.dirty |= SceneDirty::SIZE;
        let root = s.root;
        self.pulse_requested = true;
        if let Some(root) = root {
            self.request_layout(root);
        }
        Ok(())
    }

    pub fn set_fill(&mut self, scene: SceneId, fill: Option<u32>) -> Result<()> {
        self.check_scene_mutation(scene)?;
        let s = self.scene_mut(scene)?;
        if s.fill != fill {
            s.fill = fill;
            s.dirty |= SceneDirty::FILL;
            self.pulse_requested = true;
        }
        Ok(())
    }

    pub fn set_camera(&mut self, scene: SceneId, camera: Camera) -> Result<()> {
        self.check_scene_mutation(scene)?;
        let s = self.scene_mut(scene)?;
        if s.camera != camera {
            s.camera = camera;
            s.dirty |= SceneDirty::CAMERA;
            self.pulse_requested = true;
        }
        Ok(())
    }

    /// Mark the scene as shown in a window. From then on its tree may only
    /// be mutated from the scene thread. Detaching is itself such a mutation.
    pub fn attach_window(&mut self, scene: SceneId, attached: bool) -> Result<()> {
        self.check_scene_mutation(scene)?;
        self.scene_mut(scene)?.window_attached = attached;
        Ok(())
    }

    /// Move `id` and its subtree (and clips) into `scene`.
    pub(crate) fn set_scenes(&mut self, id: NodeId, scene: Option<SceneId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else { continue };
            let old = node.scene;
            if old == scene {
                continue;
            }
            node.scene = scene;
            node.css_flag = CssFlag::Reapply;
            let dirty = !node.dirty.is_empty();
            let clip = node.clip;

            if let Some(s) = old.and_then(|old| self.scenes.get_mut(old)) {
                if s.focus_owner == Some(current) {
                    s.focus_dirty = true;
                    self.pulse_requested = true;
                }
            }
            if let Some(new) = scene {
                if dirty {
                    self.enqueue_for_sync(new, current);
                }
                if self.needs_layout(current) && self.is_layout_root(current) {
                    self.add_to_dirty_layout_list(new, current);
                }
            }
            if let Some(clip) = clip {
                stack.push(clip);
            }
            stack.extend(self.children(current).iter().copied());
        }
        if scene.is_some() {
            self.request_style_reapply(id);
        }
    }

    // -----------------------------------------------------------------------
    // Focus
    // -----------------------------------------------------------------------

    /// Focusable, enabled, visible, and part of a scene.
    pub fn can_receive_focus(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.focusable && n.scene.is_some())
            && self.is_tree_visible(id)
            && !self.is_tree_disabled(id)
    }

    pub fn focus_owner(&self, scene: SceneId) -> Option<NodeId> {
        self.scenes.get(scene).and_then(|s| s.focus_owner)
    }

    /// Give focus to `id`. Returns `false` when it cannot take focus.
    pub fn request_focus(&mut self, id: NodeId) -> bool {
        let Some(scene) = self.scene_of(id) else { return false };
        if !self.can_receive_focus(id) {
            return false;
        }
        match self.scenes.get_mut(scene) {
            Some(s) => {
                s.focus_owner = Some(id);
                true
            }
            None => false,
        }
    }

    /// Move focus forward in traversal order.
    pub fn focus_next(&mut self, scene: SceneId) -> Option<NodeId> {
        self.traverse_focus(scene, true)
    }

    /// Move focus backward in traversal order.
    pub fn focus_previous(&mut self, scene: SceneId) -> Option<NodeId> {
        self.traverse_focus(scene, false)
    }

    fn traverse_focus(&mut self, scene: SceneId, forward: bool) -> Option<NodeId> {
        let mut chain = FocusChain::new();
        chain.rebuild(self, scene);
        if let Some(owner) = self.focus_owner(scene) {
            chain.focus_node(owner);
        }
        let next = if forward { chain.focus_next() } else { chain.focus_previous() };
        if let Some(s) = self.scenes.get_mut(scene) {
            s.focus_owner = next;
        }
        next
    }

    /// Re-validate the focus owner if something may have invalidated it.
    ///
    /// No owner: pick the first eligible node. Owner left the scene: clear
    /// and pick the first. Owner became ineligible: clear and move to the
    /// next eligible node after it. The dirty flag is always cleared.
    pub(crate) fn focus_cleanup(&mut self, scene: SceneId) {
        let Some(s) = self.scenes.get(scene) else { return };
        if !s.focus_dirty {
            return;
        }
        let next = match s.focus_owner {
            None => self.initial_focus(scene),
            Some(owner) if self.scene_of(owner) != Some(scene) => self.initial_focus(scene),
            Some(owner) if !self.can_receive_focus(owner) => FocusChain::successor(self, scene, owner),
            Some(owner) => Some(owner),
        };
        if let Some(s) = self.scenes.get_mut(scene) {
            s.focus_owner = next;
            s.focus_dirty = false;
        }
    }

    fn initial_focus(&self, scene: SceneId) -> Option<NodeId> {
        let mut chain = FocusChain::new();
        chain.rebuild(self, scene);
        chain.focus_next()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
