//! Scene graph: node arena, child lists, bounds caches, dirty propagation.

pub mod bounds;
pub mod children;
pub mod dirty;
pub mod node;
pub mod tree;

pub use bounds::ExtremalChildren;
pub use children::{ChildBatch, ValidatedBatch};
pub use node::{CssFlag, DirtyBits, NodeData, NodeId, NodeKind, SceneId, Sizing};
pub use tree::SceneGraph;
