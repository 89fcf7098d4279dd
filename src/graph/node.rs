//! Node types: NodeId, SceneId, NodeData and per-node flags.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::geometry::{Bounds, Size, Transform};

new_key_type! {
    /// Unique identifier for a scene-graph node. Copy, lightweight (u64).
    pub struct NodeId;
    /// Unique identifier for a root context.
    pub struct SceneId;
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Per-node render-sync dirty bits.
    ///
    /// A node with any bit set is pending synchronization. Bits are cleared
    /// only by the pass that consumes them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DirtyBits: u16 {
        const TRANSFORM  = 1 << 0;
        const BOUNDS     = 1 << 1;
        const VISIBILITY = 1 << 2;
        const CHILDREN   = 1 << 3;
        const CLIP       = 1 << 4;
        const CONTENTS   = 1 << 5;
        const CSS        = 1 << 6;
        const FORCE_SYNC = 1 << 7;
    }
}

/// Capability fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Paints its own content; never has children.
    Leaf,
    /// Owns an ordered child list.
    Container,
}

/// Style-resolution state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum CssFlag {
    #[default]
    Clean,
    /// Some descendant needs styling.
    DirtyBranch,
    /// This node's own styles must be recomputed.
    Update,
    /// This node and its whole subtree must be restyled from scratch.
    Reapply,
}

/// Size constraints of a resizable node.
///
/// Unset preferences are computed: a leaf prefers its current size, a
/// container asks its layout policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sizing {
    pub width: f64,
    pub height: f64,
    pub min: Option<Size>,
    pub pref: Option<Size>,
    pub max: Option<Size>,
}

impl Sizing {
    /// A resizable node with the given current size.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, ..Self::default() }
    }

    pub fn with_pref(mut self, width: f64, height: f64) -> Self {
        self.pref = Some(Size::new(width, height));
        self
    }

    pub fn with_min(mut self, width: f64, height: f64) -> Self {
        self.min = Some(Size::new(width, height));
        self
    }

    pub fn with_max(mut self, width: f64, height: f64) -> Self {
        self.max = Some(Size::new(width, height));
        self
    }

    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// NodeData
// ---------------------------------------------------------------------------

/// Data associated with a single scene-graph node.
///
/// Construct with [`NodeData::leaf`] or [`NodeData::container`] and the
/// builder methods, then hand it to
/// [`SceneGraph::create`](super::SceneGraph::create). After creation the
/// structural fields are owned by the graph and only change through its API.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub(crate) kind: NodeKind,
    /// Optional unique id (CSS #id selector).
    pub id: Option<String>,
    /// CSS classes (for .class selector).
    pub classes: Vec<String>,

    pub(crate) parent: Option<NodeId>,
    pub(crate) scene: Option<SceneId>,
    pub(crate) clip: Option<NodeId>,
    pub(crate) clip_parent: Option<NodeId>,

    pub(crate) content: Bounds,
    pub(crate) layout_x: f64,
    pub(crate) layout_y: f64,
    pub(crate) transform: Transform,
    pub(crate) sizing: Option<Sizing>,

    pub(crate) visible: bool,
    pub(crate) managed: bool,
    pub(crate) focusable: bool,
    pub(crate) disabled: bool,
    pub(crate) mouse_transparent: bool,
    pub(crate) pick_on_bounds: bool,

    /// Set while this node's bounds are pending in its parent's cache.
    pub(crate) bounds_changed: bool,
    pub(crate) dirty: DirtyBits,
    /// Scene whose pending-sync list currently holds this node.
    pub(crate) queued_in: Option<SceneId>,
    pub(crate) has_peer: bool,
    pub(crate) css_flag: CssFlag,
}

impl NodeData {
    fn new(kind: NodeKind, content: Bounds) -> Self {
        Self {
            kind,
            id: None,
            classes: Vec::new(),
            parent: None,
            scene: None,
            clip: None,
            clip_parent: None,
            content,
            layout_x: 0.0,
            layout_y: 0.0,
            transform: Transform::IDENTITY,
            sizing: None,
            visible: true,
            managed: true,
            focusable: false,
            disabled: false,
            mouse_transparent: false,
            pick_on_bounds: false,
            bounds_changed: false,
            // Never synced: everything about it is new to the renderer.
            dirty: DirtyBits::all(),
            queued_in: None,
            has_peer: false,
            css_flag: CssFlag::Reapply,
        }
    }

    /// A leaf whose local geometry is `content`.
    pub fn leaf(content: Bounds) -> Self {
        Self::new(NodeKind::Leaf, content)
    }

    /// An empty container.
    pub fn container() -> Self {
        Self::new(NodeKind::Container, Bounds::EMPTY)
    }

    /// Set the CSS id (builder).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Add a single CSS class (builder).
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !self.classes.contains(&class) {
            self.classes.push(class);
        }
        self
    }

    /// Make the node resizable with the given constraints (builder).
    ///
    /// A resizable leaf's content becomes `(0, 0, width, height)`.
    pub fn resizable(mut self, sizing: Sizing) -> Self {
        if self.kind == NodeKind::Leaf {
            self.content = Bounds::from_rect(0.0, 0.0, sizing.width, sizing.height);
        }
        self.sizing = Some(sizing);
        self
    }

    /// Set the layout position (builder).
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.layout_x = x;
        self.layout_y = y;
        self
    }

    /// Set the node transform (builder).
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Set visibility (builder).
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set whether the parent's layout positions this node (builder).
    pub fn managed(mut self, managed: bool) -> Self {
        self.managed = managed;
        self
    }

    /// Set whether this node can receive focus (builder).
    pub fn focusable(mut self, focusable: bool) -> Self {
        self.focusable = focusable;
        self
    }

    /// Set whether this node is disabled (builder).
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Set whether picking ignores this node and its subtree (builder).
    pub fn mouse_transparent(mut self, transparent: bool) -> Self {
        self.mouse_transparent = transparent;
        self
    }

    /// Let a container be picked anywhere inside its bounds (builder).
    pub fn pick_on_bounds(mut self, pick: bool) -> Self {
        self.pick_on_bounds = pick;
        self
    }

    /// Check whether this node has a given CSS class.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    // -- accessors ----------------------------------------------------------

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_container(&self) -> bool {
        self.kind == NodeKind::Container
    }

    pub fn is_resizable(&self) -> bool {
        self.sizing.is_some()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    pub fn clip(&self) -> Option<NodeId> {
        self.clip
    }

    /// The node this node clips, if it serves as a clip.
    pub fn clip_parent(&self) -> Option<NodeId> {
        self.clip_parent
    }

    pub fn content(&self) -> Bounds {
        self.content
    }

    pub fn layout_x(&self) -> f64 {
        self.layout_x
    }

    pub fn layout_y(&self) -> f64 {
        self.layout_y
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn sizing(&self) -> Option<&Sizing> {
        self.sizing.as_ref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    pub fn is_focusable(&self) -> bool {
        self.focusable
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_mouse_transparent(&self) -> bool {
        self.mouse_transparent
    }

    pub fn picks_on_bounds(&self) -> bool {
        self.pick_on_bounds
    }

    pub fn dirty_bits(&self) -> DirtyBits {
        self.dirty
    }

    pub fn css_flag(&self) -> CssFlag {
        self.css_flag
    }

    /// Whether a renderer peer exists for this node.
    pub fn has_peer(&self) -> bool {
        self.has_peer
    }

    /// Transform from this node's space into its parent's space.
    pub fn local_to_parent(&self) -> Transform {
        Transform::translation(self.layout_x, self.layout_y).concat(&self.transform)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
