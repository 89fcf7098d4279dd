//! Test support: a recording render backend and tree inspection helpers.
//!
//! [`RecordingBackend`] keeps every call the pulse makes so tests can assert
//! on the peer stream. [`tree_to_string`] dumps a subtree as indented text
//! for snapshot assertions, and [`reference_bounds`] recomputes bounds the
//! slow way to cross-check the incremental cache.

use std::fmt::Write;

use crate::context::ExecutionContext;
use crate::error::{Result, SceneError};
use crate::geometry::{Bounds, Point, Transform};
use crate::graph::{DirtyBits, NodeId, NodeKind, SceneGraph, SceneId};
use crate::pulse::backend::{PeerUpdate, RemovedChildren, RenderBackend, SceneProperties};
use crate::pulse::snapshot::{SnapshotImage, SnapshotRequest};

// ---------------------------------------------------------------------------
// RecordingBackend
// ---------------------------------------------------------------------------

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreatePeer(NodeId, NodeKind),
    DestroyPeer(NodeId),
    UpdatePeer { node: NodeId, dirty: DirtyBits, bounds: Bounds },
    SetChildren {
        parent: NodeId,
        from: usize,
        children: Vec<NodeId>,
        /// `None` when the whole list was reported dirty.
        removed: Option<Vec<NodeId>>,
    },
    SceneProperties(SceneProperties),
    MarkDirty(SceneId),
    RequestNextFrame,
    Snapshot { node: NodeId, bounds: Bounds },
}

/// A backend that renders nothing and remembers everything.
///
/// Snapshots come back as solid images of the requested fill, sized to the
/// requested bounds rounded up.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
    pick_ray: Option<NodeId>,
    fail_snapshots: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node returned by every perspective pick.
    pub fn set_pick_ray(&mut self, node: Option<NodeId>) {
        self.pick_ray = node;
    }

    /// Make every snapshot fail with [`SceneError::Backend`].
    pub fn fail_snapshots(mut self) -> Self {
        self.fail_snapshots = true;
        self
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Nodes whose peers were created, in order.
    pub fn created(&self) -> Vec<NodeId> {
        self.filter(|c| match c {
            BackendCall::CreatePeer(id, _) => Some(*id),
            _ => None,
        })
    }

    pub fn updated(&self) -> Vec<NodeId> {
        self.filter(|c| match c {
            BackendCall::UpdatePeer { node, .. } => Some(*node),
            _ => None,
        })
    }

    pub fn destroyed(&self) -> Vec<NodeId> {
        self.filter(|c| match c {
            BackendCall::DestroyPeer(id) => Some(*id),
            _ => None,
        })
    }

    fn filter(&self, f: impl Fn(&BackendCall) -> Option<NodeId>) -> Vec<NodeId> {
        self.calls.iter().filter_map(f).collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_peer(&mut self, node: NodeId, kind: NodeKind) {
        self.calls.push(BackendCall::CreatePeer(node, kind));
    }

    fn destroy_peer(&mut self, node: NodeId) {
        self.calls.push(BackendCall::DestroyPeer(node));
    }

    fn update_peer(&mut self, update: &PeerUpdate<'_>) {
        self.calls.push(BackendCall::UpdatePeer { node: update.node, dirty: update.dirty, bounds: update.bounds });
    }

    fn set_children(&mut self, parent: NodeId, from: usize, children: &[NodeId], removed: RemovedChildren<'_>) {
        let removed = match removed {
            RemovedChildren::Listed(nodes) => Some(nodes.to_vec()),
            RemovedChildren::All => None,
        };
        self.calls.push(BackendCall::SetChildren { parent, from, children: children.to_vec(), removed });
    }

    fn set_scene_properties(&mut self, properties: &SceneProperties) {
        self.calls.push(BackendCall::SceneProperties(*properties));
    }

    fn mark_dirty(&mut self, scene: SceneId) {
        self.calls.push(BackendCall::MarkDirty(scene));
    }

    fn request_next_frame(&mut self) {
        self.calls.push(BackendCall::RequestNextFrame);
    }

    fn render_snapshot(&mut self, request: &SnapshotRequest) -> Result<SnapshotImage> {
        self.calls.push(BackendCall::Snapshot { node: request.node, bounds: request.bounds });
        if self.fail_snapshots {
            return Err(SceneError::Backend("snapshots disabled".into()));
        }
        let width = request.bounds.width().ceil() as u32;
        let height = request.bounds.height().ceil() as u32;
        let pixel = request.params.fill.unwrap_or(0).to_be_bytes();
        let data = pixel.repeat(pixel_count(width, height));
        Ok(SnapshotImage { width, height, data })
    }

    fn pick_ray(&mut self, _scene: SceneId, _point: Point, _field_of_view: f64) -> Option<NodeId> {
        self.pick_ray
    }
}

/// Pixels in a `width` x `height` image, counted without `u32` overflow.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

// ---------------------------------------------------------------------------
// ForeignThread
// ---------------------------------------------------------------------------

/// An execution context that behaves as if every caller were off-thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForeignThread;

impl ExecutionContext for ForeignThread {
    fn check_scene_thread(&self) -> Result<()> {
        Err(SceneError::ThreadAffinity { thread: "foreign".into() })
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// Dump the subtree under `root` as indented lines:
/// kind, `#id`, `.classes`, parent-space bounds, and `hidden` when invisible.
pub fn tree_to_string(graph: &mut SceneGraph, root: NodeId) -> String {
    let mut out = String::new();
    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let bounds = graph.bounds_in_parent(id);
        let Some(node) = graph.get(id) else { continue };
        let _ = write!(out, "{:indent$}{:?}", "", node.kind(), indent = depth * 2);
        if let Some(style_id) = &node.id {
            let _ = write!(out, " #{style_id}");
        }
        for class in &node.classes {
            let _ = write!(out, " .{class}");
        }
        if bounds.is_empty() {
            out.push_str(" [empty]");
        } else {
            let _ = write!(
                out,
                " [{},{} {}x{}]",
                bounds.min_x,
                bounds.min_y,
                bounds.width(),
                bounds.height()
            );
        }
        if !node.is_visible() {
            out.push_str(" hidden");
        }
        out.push('\n');
        stack.extend(graph.children(id).iter().rev().map(|&c| (c, depth + 1)));
    }
    out
}

/// Local bounds of `id` recomputed from scratch, ignoring every cache.
pub fn reference_bounds(graph: &SceneGraph, id: NodeId) -> Bounds {
    composed_bounds(graph, id, &Transform::IDENTITY)
}

fn composed_bounds(graph: &SceneGraph, id: NodeId, tx: &Transform) -> Bounds {
    let Some(node) = graph.get(id) else { return Bounds::EMPTY };
    if !node.is_container() {
        return tx.transform_bounds(&node.content());
    }
    let mut result = Bounds::EMPTY;
    for &child in graph.children(id) {
        let Some(data) = graph.get(child) else { continue };
        if !data.is_visible() {
            continue;
        }
        let child_tx = tx.concat(&data.local_to_parent());
        result = result.union(&composed_bounds(graph, child, &child_tx));
    }
    result
}

// ===========================================================================
// Tests
// ===========================================================================
