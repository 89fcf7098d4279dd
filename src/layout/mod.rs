//! Layout engine: dirty layout roots, per-pulse passes, layout policies.

pub mod engine;
pub mod flex;
pub mod policy;

pub use engine::LayoutFlag;
pub(crate) use engine::LayoutState;
pub use flex::{Direction, FlexLayout};
pub use policy::{Autosize, LayoutPolicy};
