//! Row and column layout computed by taffy's flexbox.

use taffy::geometry::Rect;
use taffy::prelude::{AvailableSpace, Dimension, Display, FlexDirection, FromLength, LengthPercentage, Style, TaffyTree};

use crate::error::{Result, SceneError};
use crate::geometry::Size;
use crate::graph::{NodeId, SceneGraph};

use super::policy::{managed_children, LayoutPolicy};

/// Main axis of a [`FlexLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Row,
    Column,
}

/// Lays managed children out in a line at their preferred sizes, separated
/// by `gap` and inset by `padding` on every side. Children may shrink down
/// to their minimum size when the container is too small.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlexLayout {
    pub direction: Direction,
    pub gap: f64,
    pub padding: f64,
}

impl FlexLayout {
    pub fn row() -> Self {
        Self::default()
    }

    pub fn column() -> Self {
        Self { direction: Direction::Column, ..Self::default() }
    }

    pub fn with_gap(mut self, gap: f64) -> Self {
        self.gap = gap;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    fn container_style(&self, size: Size) -> Style {
        let gap = LengthPercentage::from_length(self.gap as f32);
        let padding = LengthPercentage::from_length(self.padding as f32);
        Style {
            display: Display::Flex,
            flex_direction: match self.direction {
                Direction::Row => FlexDirection::Row,
                Direction::Column => FlexDirection::Column,
            },
            gap: taffy::geometry::Size { width: gap, height: gap },
            padding: Rect { left: padding, right: padding, top: padding, bottom: padding },
            size: taffy::geometry::Size {
                width: Dimension::from_length(size.width as f32),
                height: Dimension::from_length(size.height as f32),
            },
            ..Style::default()
        }
    }
}

fn child_style(pref: Size, min: Size) -> Style {
    Style {
        flex_grow: 0.0,
        flex_shrink: 1.0,
        size: taffy::geometry::Size {
            width: Dimension::from_length(pref.width as f32),
            height: Dimension::from_length(pref.height as f32),
        },
        min_size: taffy::geometry::Size {
            width: Dimension::from_length(min.width as f32),
            height: Dimension::from_length(min.height as f32),
        },
        ..Style::default()
    }
}

fn layout_error(e: taffy::TaffyError) -> SceneError {
    SceneError::Layout(e.to_string())
}

impl LayoutPolicy for FlexLayout {
    fn layout_children(&mut self, graph: &mut SceneGraph, container: NodeId) -> Result<()> {
        let children = managed_children(graph, container);
        if children.is_empty() {
            return Ok(());
        }
        let size = match graph.get(container).and_then(|n| n.sizing()) {
            Some(sizing) => sizing.size(),
            None => graph.pref_size(container),
        };

        let mut tree: TaffyTree<()> = TaffyTree::new();
        let mut leaves = Vec::with_capacity(children.len());
        for &child in &children {
            let style = child_style(graph.pref_size(child), graph.min_size(child));
            leaves.push(tree.new_leaf(style).map_err(layout_error)?);
        }
        let root = tree
            .new_with_children(self.container_style(size), &leaves)
            .map_err(layout_error)?;
        tree.compute_layout(
            root,
            taffy::geometry::Size {
                width: AvailableSpace::Definite(size.width as f32),
                height: AvailableSpace::Definite(size.height as f32),
            },
        )
        .map_err(layout_error)?;

        for (&child, &leaf) in children.iter().zip(&leaves) {
            let layout = tree.layout(leaf).map_err(layout_error)?;
            let (x, y) = (f64::from(layout.location.x), f64::from(layout.location.y));
            let (w, h) = (f64::from(layout.size.width), f64::from(layout.size.height));
            graph.relocate(child, x, y)?;
            graph.resize(child, w, h)?;
        }
        Ok(())
    }

    fn pref_size(&mut self, graph: &mut SceneGraph, container: NodeId) -> Size {
        let children = managed_children(graph, container);
        let mut main = 0.0_f64;
        let mut cross = 0.0_f64;
        for &child in &children {
            let pref = graph.pref_size(child);
            let (m, c) = match self.direction {
                Direction::Row => (pref.width, pref.height),
                Direction::Column => (pref.height, pref.width),
            };
            main += m;
            cross = cross.max(c);
        }
        main += self.gap * children.len().saturating_sub(1) as f64;
        let inset = 2.0 * self.padding;
        match self.direction {
            Direction::Row => Size::new(main + inset, cross + inset),
            Direction::Column => Size::new(cross + inset, main + inset),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
