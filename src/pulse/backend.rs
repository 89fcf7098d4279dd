//! The renderer collaborator.
//!
//! The pulse pushes scene changes into a [`RenderBackend`] as a stream of
//! peer updates; the backend owns whatever retained render-side objects
//! (peers) it keeps per node.

use crate::error::Result;
use crate::geometry::{Bounds, Point, Transform};
use crate::graph::{DirtyBits, NodeId, NodeKind, SceneId};
use crate::scene::{Camera, SceneDirty};
use crate::style::StyleContext;

use super::snapshot::{SnapshotImage, SnapshotRequest};

/// Children removed from a peer's child list since the last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovedChildren<'a> {
    /// Exactly these nodes left.
    Listed(&'a [NodeId]),
    /// Too many to track: the backend should rebuild the whole list.
    All,
}

/// State of one node pushed to its peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerUpdate<'a> {
    pub node: NodeId,
    /// What changed since the last sync.
    pub dirty: DirtyBits,
    pub visible: bool,
    pub local_to_parent: Transform,
    /// Local geometry: content for leaves, cached child union for containers.
    pub bounds: Bounds,
    pub clip: Option<NodeId>,
    pub style: Option<&'a StyleContext>,
}

/// Scene-level properties pushed before the node sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneProperties {
    pub scene: SceneId,
    pub dirty: SceneDirty,
    pub root: Option<NodeId>,
    pub width: f64,
    pub height: f64,
    pub fill: Option<u32>,
    pub camera: Camera,
}

/// Render-side sink fed by the pulse.
pub trait RenderBackend {
    /// Create the peer of `node`. Called once, on the node's first sync.
    fn create_peer(&mut self, node: NodeId, kind: NodeKind);

    /// Release the peer of a destroyed node.
    fn destroy_peer(&mut self, node: NodeId);

    fn update_peer(&mut self, update: &PeerUpdate<'_>);

    /// Replace the peer's children from index `from` on with `children`.
    fn set_children(&mut self, parent: NodeId, from: usize, children: &[NodeId], removed: RemovedChildren<'_>);

    fn set_scene_properties(&mut self, properties: &SceneProperties);

    /// Something in `scene` changed; it must be redrawn.
    fn mark_dirty(&mut self, scene: SceneId);

    /// Ask the host to schedule another pulse.
    fn request_next_frame(&mut self);

    fn render_snapshot(&mut self, request: &SnapshotRequest) -> Result<SnapshotImage>;

    /// Resolve the node hit by a ray through `point` under a perspective
    /// camera. Backends without 3D picking return `None`.
    fn pick_ray(&mut self, scene: SceneId, point: Point, field_of_view: f64) -> Option<NodeId> {
        let _ = (scene, point, field_of_view);
        None
    }
}
