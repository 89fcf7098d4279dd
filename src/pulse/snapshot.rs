//! Rendering nodes to images.
//!
//! Every snapshot form funnels through one preparation step (styles, then a
//! bounded layout, then render sync) before the backend renders. Deferred
//! snapshots run at the next post-sync point of the node's scene and are
//! dropped if the node left that scene in the meantime.

use tokio::sync::oneshot;

use crate::error::{ListenerError, Result, SceneError};
use crate::geometry::{Bounds, Transform};
use crate::graph::{NodeId, SceneId};
use crate::stage::Stage;

use super::backend::RenderBackend;

/// Options of one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SnapshotParams {
    /// Area to render, in the node's parent space. Defaults to the node's
    /// transformed bounds.
    pub viewport: Option<Bounds>,
    /// Background as `0xRRGGBBAA`; `None` keeps the scene fill.
    pub fill: Option<u32>,
    /// Applied on top of the node's own transforms.
    pub transform: Transform,
}

impl SnapshotParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(mut self, viewport: Bounds) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn with_fill(mut self, fill: u32) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// What the backend is asked to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotRequest {
    pub scene: SceneId,
    pub node: NodeId,
    /// Area to render.
    pub bounds: Bounds,
    pub params: SnapshotParams,
}

/// An RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Receives a deferred snapshot.
pub type SnapshotCallback = Box<dyn FnOnce(Result<SnapshotImage>) -> std::result::Result<(), ListenerError>>;

pub(crate) struct PendingSnapshot {
    node: NodeId,
    params: SnapshotParams,
    callback: SnapshotCallback,
}

impl<B: RenderBackend> Stage<B> {
    /// Render `node` now.
    ///
    /// A node outside any scene is rendered through a temporary scene
    /// rooted at the top of its tree.
    pub fn snapshot(&mut self, node: NodeId, params: SnapshotParams) -> Result<SnapshotImage> {
        self.graph.node(node)?;
        if let Some(scene) = self.graph.scene_of(node) {
            self.prepare_snapshot(scene);
            return self.render(scene, node, params);
        }

        let top = self.graph.ancestors(node).last().copied().unwrap_or(node);
        let size = self.graph.layout_bounds(top);
        let scene = self.graph.create_scene(size.width().max(0.0), size.height().max(0.0));
        let result = self
            .graph
            .set_root(scene, top)
            .and_then(|()| {
                self.prepare_snapshot(scene);
                self.render(scene, node, params)
            });
        self.graph.destroy_scene(scene)?;
        result
    }

    /// Render `node` at the next post-sync point of its scene and hand the
    /// image to `callback`. A node outside any scene is rendered right away.
    pub fn snapshot_later<F>(&mut self, node: NodeId, params: SnapshotParams, callback: F) -> Result<()>
    where
        F: FnOnce(Result<SnapshotImage>) -> std::result::Result<(), ListenerError> + 'static,
    {
        self.graph.node(node)?;
        let Some(scene) = self.graph.scene_of(node) else {
            let image = self.snapshot(node, params);
            if let Err(e) = callback(image) {
                log::error!("snapshot callback for {node:?} failed: {e}");
            }
            return Ok(());
        };
        let pending = PendingSnapshot { node, params, callback: Box::new(callback) };
        match self.snapshots.get_mut(scene) {
            Some(queue) => queue.push(pending),
            None => {
                self.snapshots.insert(scene, vec![pending]);
            }
        }
        self.graph.request_pulse();
        self.backend.request_next_frame();
        Ok(())
    }

    /// Deferred snapshot as a future-friendly channel. The sender is dropped
    /// without a value if the snapshot is cancelled.
    pub fn snapshot_async(
        &mut self,
        node: NodeId,
        params: SnapshotParams,
    ) -> Result<oneshot::Receiver<Result<SnapshotImage>>> {
        let (tx, rx) = oneshot::channel();
        self.snapshot_later(node, params, move |image| {
            // The receiver may have given up; that is not a failure.
            let _ = tx.send(image);
            Ok(())
        })?;
        Ok(rx)
    }

    /// Deferred snapshots waiting for `scene`'s next pulse.
    pub fn pending_snapshots(&self, scene: SceneId) -> usize {
        self.snapshots.get(scene).map_or(0, Vec::len)
    }

    /// Styles, bounded layout and sync, outside the regular pulse.
    fn prepare_snapshot(&mut self, scene: SceneId) {
        self.graph.css_pass(scene, self.styles.as_mut());
        let attempts = self.graph.config().snapshot_layout_attempts;
        self.graph.do_layout_pass(scene, attempts);
        if self.graph.needs_sync(scene) {
            let outcome = self.graph.synchronize(scene, &mut self.backend);
            if outcome.did_work() {
                self.backend.mark_dirty(scene);
            }
        }
    }

    fn render(&mut self, scene: SceneId, node: NodeId, params: SnapshotParams) -> Result<SnapshotImage> {
        let bounds = match params.viewport {
            Some(viewport) => viewport,
            None => {
                let tx = params.transform.concat(&self.graph.local_to_parent(node));
                self.graph.compute_geom_bounds(node, &tx)
            }
        };
        if bounds.is_empty() {
            return Err(SceneError::Backend(format!("nothing to render for {node:?}")));
        }
        self.backend.render_snapshot(&SnapshotRequest { scene, node, bounds, params })
    }

    /// Run `scene`'s deferred snapshots. Called right after its sync.
    pub(crate) fn run_pending_snapshots(&mut self, scene: SceneId) {
        let Some(queue) = self.snapshots.get_mut(scene) else { return };
        if queue.is_empty() {
            return;
        }
        for pending in std::mem::take(queue) {
            if self.graph.scene_of(pending.node) != Some(scene) {
                log::debug!("dropping snapshot of {:?}: no longer in {scene:?}", pending.node);
                continue;
            }
            let image = self.render(scene, pending.node, pending.params);
            if let Err(e) = (pending.callback)(image) {
                log::error!("snapshot callback for {:?} failed: {e}", pending.node);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
