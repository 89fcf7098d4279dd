//! The scene-graph arena: node storage, queries and property setters.

use slotmap::{SecondaryMap, SlotMap};

use super::bounds::BoundsCache;
use super::children::ChildList;
use super::node::{DirtyBits, NodeData, NodeId, NodeKind, SceneId};
use crate::config::SceneConfig;
use crate::context::{ExecutionContext, ThreadBound};
use crate::error::{Result, SceneError};
use crate::geometry::{Bounds, Transform};
use crate::layout::{Autosize, LayoutPolicy, LayoutState};
use crate::scene::Scene;
use crate::style::StyleContext;

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// The central scene graph, backed by a slotmap arena.
///
/// Nodes live in a single `SlotMap`; container-only state (child lists,
/// bounds caches, layout state, layout policies) lives in secondary maps
/// keyed by the same [`NodeId`]. Parents are plain handles, children are
/// owned ordered lists of handles.
pub struct SceneGraph {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    pub(crate) child_lists: SecondaryMap<NodeId, ChildList>,
    pub(crate) bounds: SecondaryMap<NodeId, BoundsCache>,
    pub(crate) layout: SecondaryMap<NodeId, LayoutState>,
    pub(crate) policies: SecondaryMap<NodeId, Box<dyn LayoutPolicy>>,
    pub(crate) styles: SecondaryMap<NodeId, StyleContext>,
    pub(crate) scenes: SlotMap<SceneId, Scene>,
    pub(crate) config: SceneConfig,
    context: Box<dyn ExecutionContext>,
    /// Set for the duration of render synchronization.
    pub(crate) in_sync: bool,
    pub(crate) pulse_requested: bool,
    /// Bumped on every committed child-list change.
    pub(crate) epoch: u64,
    /// Destroyed nodes whose renderer peers still exist.
    pub(crate) disposed: Vec<NodeId>,
    /// Nodes that left a scene since the input layer last looked.
    pub(crate) departures: Vec<(SceneId, NodeId)>,
}

impl SceneGraph {
    /// Create an empty graph bound to the calling thread.
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create an empty graph with the given tunables.
    pub fn with_config(config: SceneConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            child_lists: SecondaryMap::new(),
            bounds: SecondaryMap::new(),
            layout: SecondaryMap::new(),
            policies: SecondaryMap::new(),
            styles: SecondaryMap::new(),
            scenes: SlotMap::with_key(),
            config,
            context: Box::new(ThreadBound::current()),
            in_sync: false,
            pulse_requested: false,
            epoch: 0,
            disposed: Vec::new(),
            departures: Vec::new(),
        }
    }

    /// Replace the execution context (builder).
    pub fn with_context(mut self, context: impl ExecutionContext + 'static) -> Self {
        self.context = Box::new(context);
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Creation / destruction
    // -----------------------------------------------------------------------

    /// Insert a detached node.
    ///
    /// Containers get the default [`Autosize`] layout policy.
    pub fn create(&mut self, data: NodeData) -> NodeId {
        self.create_with_policy(data, Autosize)
    }

    /// Insert a detached node with a layout policy. The policy is ignored for leaves.
    pub fn create_with_policy(&mut self, mut data: NodeData, policy: impl LayoutPolicy + 'static) -> NodeId {
        data.parent = None;
        data.scene = None;
        data.clip = None;
        data.clip_parent = None;
        data.bounds_changed = false;
        data.queued_in = None;
        data.has_peer = false;
        data.dirty = DirtyBits::all();
        let kind = data.kind;
        let id = self.nodes.insert(data);
        if kind == NodeKind::Container {
            self.child_lists.insert(id, ChildList::default());
            self.bounds.insert(id, BoundsCache::new());
            self.layout.insert(id, LayoutState::new());
            self.policies.insert(id, Box::new(policy));
        }
        id
    }

    /// Create a node and append it to `parent`.
    pub fn create_child(&mut self, parent: NodeId, data: NodeData) -> Result<NodeId> {
        let id = self.create(data);
        match self.add_child(parent, id) {
            Ok(()) => Ok(id),
            Err(e) => {
                self.nodes.remove(id);
                self.child_lists.remove(id);
                self.bounds.remove(id);
                self.layout.remove(id);
                self.policies.remove(id);
                Err(e)
            }
        }
    }

    /// Replace a container's layout policy and request a new layout.
    pub fn set_layout_policy(&mut self, id: NodeId, policy: impl LayoutPolicy + 'static) -> Result<()> {
        self.check_mutation(id)?;
        if !self.node(id)?.is_container() {
            return Err(SceneError::NotAContainer(id));
        }
        self.policies.insert(id, Box::new(policy));
        self.request_layout(id);
        Ok(())
    }

    /// Destroy a node.
    ///
    /// The node is detached from its parent (or scene) first. Its children
    /// are evicted, not destroyed: they become detached roots the caller
    /// still owns. The renderer peer is released on the next sync.
    pub fn destroy(&mut self, id: NodeId) -> Result<NodeData> {
        self.check_mutation(id)?;
        let node = self.node(id)?;
        let parent = node.parent;
        let clip = node.clip;
        let clip_parent = node.clip_parent;
        let scene = node.scene;

        if let Some(parent) = parent {
            self.remove_child(parent, id)?;
        } else if let Some(scene) = scene {
            if self.scenes.get(scene).and_then(|s| s.root) == Some(id) {
                self.clear_root(scene);
            }
        }
        if let Some(owner) = clip_parent {
            self.set_clip(owner, None)?;
        }
        if clip.is_some() {
            self.set_clip(id, None)?;
        }
        if self.child_count(id) > 0 {
            self.clear_children(id)?;
        }

        self.child_lists.remove(id);
        self.bounds.remove(id);
        self.layout.remove(id);
        self.policies.remove(id);
        self.styles.remove(id);
        let data = self.nodes.remove(id).ok_or(SceneError::NoSuchNode(id))?;
        self.epoch += 1;
        if data.has_peer {
            self.disposed.push(id);
            self.request_pulse();
        }
        Ok(data)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Like [`get`](Self::get) but failing with [`SceneError::NoSuchNode`].
    pub fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id).ok_or(SceneError::NoSuchNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes.get_mut(id).ok_or(SceneError::NoSuchNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Total number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of a node in paint order. Leaves return an empty slice.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.child_lists
            .get(id)
            .map_or(EMPTY_CHILDREN, |list| list.children.as_slice())
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.child_lists.get(id).map_or(0, |list| list.children.len())
    }

    #[inline]
    pub(crate) fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.child_lists.get(id).and_then(|list| list.children.get(index)).copied()
    }

    pub fn scene_of(&self, id: NodeId) -> Option<SceneId> {
        self.nodes.get(id).and_then(|n| n.scene)
    }

    /// All ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            result.push(p);
            current = self.parent(p);
        }
        result
    }

    /// Whether `ancestor` is `node` or lies on its parent chain. Clip
    /// ownership counts as parenthood.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.nodes.get(c).and_then(|n| n.parent.or(n.clip_parent));
        }
        false
    }

    /// Depth-first (pre-order) traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Push children in reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Visible and every ancestor visible.
    pub fn is_tree_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.nodes.get(c) {
                Some(n) if n.visible => current = n.parent,
                _ => return false,
            }
        }
        true
    }

    /// Disabled itself or through any ancestor.
    pub fn is_tree_disabled(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            match self.nodes.get(c) {
                Some(n) if n.disabled => return true,
                Some(n) => current = n.parent,
                None => return false,
            }
        }
        false
    }

    pub fn local_to_parent(&self, id: NodeId) -> Transform {
        self.nodes.get(id).map_or(Transform::IDENTITY, NodeData::local_to_parent)
    }

    /// Composite transform from `id`'s space into scene space.
    pub fn local_to_scene(&self, id: NodeId) -> Transform {
        let mut transform = self.local_to_parent(id);
        let mut current = self.parent(id);
        while let Some(p) = current {
            transform = self.local_to_parent(p).concat(&transform);
            current = self.parent(p);
        }
        transform
    }

    /// Whether this node is the root of the scene it belongs to.
    pub fn is_scene_root(&self, id: NodeId) -> bool {
        self.nodes
            .get(id)
            .and_then(|n| if n.parent.is_none() { n.scene } else { None })
            .and_then(|s| self.scenes.get(s))
            .is_some_and(|s| s.root == Some(id))
    }

    /// Layout roots are driven directly by their scene: unmanaged nodes
    /// and scene roots.
    pub fn is_layout_root(&self, id: NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.managed) || self.is_scene_root(id)
    }

    pub(crate) fn is_container(&self, id: NodeId) -> bool {
        self.child_lists.contains_key(id)
    }

    // -----------------------------------------------------------------------
    // Execution checks
    // -----------------------------------------------------------------------

    /// Reject calls from outside the scene thread.
    pub(crate) fn check_thread(&self) -> Result<()> {
        self.context.check_scene_thread()
    }

    /// Reject the mutation of `id` during sync, or off-thread when its
    /// scene is shown in a window.
    pub(crate) fn check_mutation(&self, id: NodeId) -> Result<()> {
        if self.in_sync {
            return Err(SceneError::SyncInProgress);
        }
        let attached = self
            .scene_of(id)
            .and_then(|s| self.scenes.get(s))
            .is_some_and(|s| s.window_attached);
        if attached {
            self.context.check_scene_thread()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.visible == visible {
            return Ok(());
        }
        node.visible = visible;
        let parent = node.parent;
        self.mark_dirty(id, DirtyBits::VISIBILITY);
        if let Some(parent) = parent {
            self.child_visibility_changed(parent, id);
        }
        self.mark_focus_dirty(id);
        Ok(())
    }

    /// Include or exclude the node from its parent's layout.
    pub fn set_managed(&mut self, id: NodeId, managed: bool) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.managed == managed {
            return Ok(());
        }
        node.managed = managed;
        let parent = node.parent;
        let scene = node.scene;
        if let Some(parent) = parent {
            self.request_layout(parent);
        }
        // An unmanaged container that still needs layout is now its own root.
        if !managed && self.needs_layout(id) {
            if let Some(scene) = scene {
                self.add_to_dirty_layout_list(scene, id);
            }
        }
        Ok(())
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.transform == transform {
            return Ok(());
        }
        node.transform = transform;
        self.mark_dirty(id, DirtyBits::TRANSFORM);
        self.notify_parent_of_bounds_change(id);
        Ok(())
    }

    /// Replace a leaf's local geometry. Ignored for containers, whose
    /// geometry is the union of their children.
    pub fn set_content(&mut self, id: NodeId, content: Bounds) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.kind == NodeKind::Container || node.content == content {
            return Ok(());
        }
        node.content = content;
        let relayout = node.managed && node.sizing.is_none();
        let parent = node.parent;
        self.mark_dirty(id, DirtyBits::CONTENTS);
        self.geom_changed(id);
        if let (true, Some(parent)) = (relayout, parent) {
            self.request_layout(parent);
        }
        Ok(())
    }

    pub fn set_focusable(&mut self, id: NodeId, focusable: bool) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.focusable != focusable {
            node.focusable = focusable;
            self.mark_focus_dirty(id);
        }
        Ok(())
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        if node.disabled != disabled {
            node.disabled = disabled;
            self.mark_focus_dirty(id);
            self.request_style_update(id);
        }
        Ok(())
    }

    pub fn set_mouse_transparent(&mut self, id: NodeId, transparent: bool) -> Result<()> {
        self.check_mutation(id)?;
        self.node_mut(id)?.mouse_transparent = transparent;
        Ok(())
    }

    pub fn set_pick_on_bounds(&mut self, id: NodeId, pick: bool) -> Result<()> {
        self.check_mutation(id)?;
        self.node_mut(id)?.pick_on_bounds = pick;
        Ok(())
    }

    /// Add a style class and schedule a restyle of the subtree.
    pub fn add_class(&mut self, id: NodeId, class: impl Into<String>) -> Result<()> {
        self.check_mutation(id)?;
        let class = class.into();
        let node = self.node_mut(id)?;
        if !node.classes.contains(&class) {
            node.classes.push(class);
            self.request_style_reapply(id);
        }
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<()> {
        self.check_mutation(id)?;
        let node = self.node_mut(id)?;
        let before = node.classes.len();
        node.classes.retain(|c| c != class);
        if node.classes.len() != before {
            self.request_style_reapply(id);
        }
        Ok(())
    }

    /// Attach (or with `None`, detach) a clip node.
    ///
    /// The clip must be detached from any parent and must not already clip
    /// another node.
    pub fn set_clip(&mut self, id: NodeId, clip: Option<NodeId>) -> Result<()> {
        self.check_mutation(id)?;
        let old = self.node(id)?.clip;
        if old == clip {
            return Ok(());
        }
        if let Some(clip) = clip {
            let data = self.node(clip)?;
            if data.clip_parent.is_some() {
                return Err(SceneError::ClipTarget { parent: id, node: clip });
            }
            if data.parent.is_some() || self.is_scene_root(clip) {
                return Err(SceneError::InvalidBatch(format!(
                    "clip {clip:?} is already part of a scene graph"
                )));
            }
            if self.is_ancestor(clip, id) {
                return Err(SceneError::Cycle { parent: id, node: clip });
            }
        }
        if let Some(old) = old {
            if let Some(data) = self.nodes.get_mut(old) {
                data.clip_parent = None;
            }
            self.set_scenes(old, None);
        }
        let scene = self.scene_of(id);
        self.node_mut(id)?.clip = clip;
        if let Some(clip) = clip {
            self.node_mut(clip)?.clip_parent = Some(id);
            self.set_scenes(clip, scene);
        }
        self.epoch += 1;
        self.mark_dirty(id, DirtyBits::CLIP);
        Ok(())
    }

    /// Mark the focus of `id`'s scene for re-validation at the next pulse.
    pub(crate) fn mark_focus_dirty(&mut self, id: NodeId) {
        if let Some(scene) = self.scene_of(id).and_then(|s| self.scenes.get_mut(s)) {
            scene.focus_dirty = true;
            self.pulse_requested = true;
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("nodes", &self.nodes.len())
            .field("scenes", &self.scenes.len())
            .field("in_sync", &self.in_sync)
            .field("pulse_requested", &self.pulse_requested)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
