//! Layout policies: how a container sizes and positions its children.

use std::fmt::Debug;

use crate::error::Result;
use crate::geometry::Size;
use crate::graph::{NodeId, SceneGraph};

/// Measurement and arrangement strategy for a container.
///
/// The policy is taken out of the graph while it runs, so it may freely
/// call back into the graph, including [`SceneGraph::resize`] and
/// [`SceneGraph::relocate`] on the container's children.
pub trait LayoutPolicy: Debug {
    /// Size and position the children of `container`.
    fn layout_children(&mut self, graph: &mut SceneGraph, container: NodeId) -> Result<()>;

    /// Preferred size of `container`.
    fn pref_size(&mut self, graph: &mut SceneGraph, container: NodeId) -> Size;

    /// Minimum size of `container`. Defaults to the preferred size.
    fn min_size(&mut self, graph: &mut SceneGraph, container: NodeId) -> Size {
        self.pref_size(graph, container)
    }
}

/// Managed children of `container` that take part in layout.
pub(crate) fn managed_children(graph: &SceneGraph, container: NodeId) -> Vec<NodeId> {
    graph
        .children(container)
        .iter()
        .copied()
        .filter(|&c| graph.get(c).is_some_and(|n| n.is_managed()))
        .collect()
}

/// Children keep their positions; resizable ones are set to their
/// preferred size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autosize;

impl LayoutPolicy for Autosize {
    fn layout_children(&mut self, graph: &mut SceneGraph, container: NodeId) -> Result<()> {
        for child in managed_children(graph, container) {
            graph.autosize(child)?;
        }
        Ok(())
    }

    fn pref_size(&mut self, graph: &mut SceneGraph, container: NodeId) -> Size {
        let mut extent = crate::geometry::Bounds::EMPTY;
        for child in managed_children(graph, container) {
            if graph.get(child).is_some_and(|n| n.is_visible()) {
                extent = extent.union(&graph.bounds_in_parent(child));
            }
        }
        if extent.is_empty() {
            Size::ZERO
        } else {
            Size::new(extent.width(), extent.height())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
