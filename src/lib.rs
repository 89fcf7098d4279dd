//! # gilt-scene
//!
//! A retained-mode scene graph with incremental bounds, layout roots and
//! pulse-driven render synchronization.
//!
//! Applications build a tree of leaf and container nodes in a [`SceneGraph`],
//! install a root into a scene, and let a [`Stage`] drive it: each pulse runs
//! the style pass, lays out the dirty layout roots, pushes pending node state
//! into a [`RenderBackend`] and re-validates focus. Raw input is picked
//! against the tree and routed with capture/bubble dispatch and enter/exit
//! tracking for pointer, drag and touch gestures.
//!
//! ## Core Systems
//!
//! - **[`graph`]**: Node arena, two-phase child-list mutation, bounds caches, dirty bits
//! - **[`layout`]**: Layout roots, per-node sizing, `Autosize` and taffy-backed flex policies
//! - **[`style`]**: Style resolution over dirty branches
//! - **[`scene`]**: Root contexts, scene properties, focus
//! - **[`pulse`]**: Render backend trait, synchronization, the pulse, snapshots
//! - **[`event`]**: Input, picking, dispatch, mouse/drag and touch routing
//! - **[`stage`]**: Ties the graph to its renderer, styles and input
//! - **[`geometry`]**: Point, Size, Bounds, Transform primitives

// Foundation
pub mod config;
pub mod context;
pub mod error;
pub mod geometry;

// Core systems
pub mod graph;
pub mod layout;
pub mod scene;
pub mod style;

// Frame and input
pub mod event;
pub mod pulse;
pub mod stage;

// Test support
pub mod testing;

pub use config::SceneConfig;
pub use context::{ExecutionContext, ThreadBound, Unchecked};
pub use error::{ErrorKind, ListenerError, Result, SceneError};
pub use geometry::{Bounds, Point, Size, Transform};
pub use graph::{ChildBatch, DirtyBits, NodeData, NodeId, NodeKind, SceneGraph, SceneId, Sizing, ValidatedBatch};
pub use layout::{Autosize, FlexLayout, LayoutPolicy};
pub use pulse::{PulseReport, RenderBackend, SnapshotImage, SnapshotParams};
pub use scene::{Camera, FocusChain, Scene};
pub use stage::Stage;
pub use style::{NoStyles, RuleStyles, Selector, StyleContext, StyleResolver};
