//! Pulse: style, layout and render synchronization of one frame.

pub mod backend;
pub mod scheduler;
pub mod snapshot;
pub mod sync;

pub use backend::{PeerUpdate, RemovedChildren, RenderBackend, SceneProperties};
pub use scheduler::PulseReport;
pub use snapshot::{SnapshotCallback, SnapshotImage, SnapshotParams, SnapshotRequest};
pub use sync::SyncOutcome;
