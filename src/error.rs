//! Error types for scene-graph operations.
//!
//! Every fallible public operation returns [`Result`]. Structural errors
//! leave the graph exactly as it was before the attempt.

use crate::graph::{NodeId, SceneId};

/// Errors surfaced by the scene graph and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SceneError {
    #[error("child is null or destroyed: parent = {parent:?}")]
    NullChild { parent: NodeId },
    #[error("duplicate child added: parent = {parent:?}, node = {node:?}")]
    DuplicateChild { parent: NodeId, node: NodeId },
    #[error("node is already used as a clip: parent = {parent:?}, node = {node:?}")]
    ClipTarget { parent: NodeId, node: NodeId },
    #[error("cycle detected: parent = {parent:?}, node = {node:?}")]
    Cycle { parent: NodeId, node: NodeId },
    #[error("scene root cannot be added as a child: parent = {parent:?}, node = {node:?}")]
    SceneRootAsChild { parent: NodeId, node: NodeId },
    #[error("invalid child batch: {0}")]
    InvalidBatch(String),
    #[error("node {0:?} is not a container")]
    NotAContainer(NodeId),
    #[error("no such node: {0:?}")]
    NoSuchNode(NodeId),
    #[error("no such scene: {0:?}")]
    NoSuchScene(SceneId),
    #[error("node {node:?} is already the root of another scene")]
    AlreadySceneRoot { node: NodeId },
    #[error("scene root {node:?} must not have a parent")]
    RootHasParent { node: NodeId },
    #[error("not on scene thread; current thread = {thread}")]
    ThreadAffinity { thread: String },
    #[error("scene graph mutated while render synchronization is in progress")]
    SyncInProgress,
    #[error("cannot start drag and drop outside of a drag-detected handler")]
    DragOutsideDetection,
    #[error("platform reported wrong touch point id: {0}")]
    UnknownTouchPoint(u64),
    #[error("wrong number of touch points reported: expected {expected}, got {actual}")]
    TouchPointCount { expected: usize, actual: usize },
    #[error("render backend: {0}")]
    Backend(String),
    #[error("layout: {0}")]
    Layout(String),
}

/// Coarse classification of [`SceneError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A structural invariant would have been violated; nothing was applied.
    Structural,
    /// The call came from the wrong context (thread or sync window).
    Affinity,
    /// The operation is not valid in the current gesture or platform state.
    State,
    /// A collaborator (renderer, layout solver) failed.
    Collaborator,
}

impl SceneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SceneError::NullChild { .. }
            | SceneError::DuplicateChild { .. }
            | SceneError::ClipTarget { .. }
            | SceneError::Cycle { .. }
            | SceneError::SceneRootAsChild { .. }
            | SceneError::InvalidBatch(_)
            | SceneError::NotAContainer(_)
            | SceneError::NoSuchNode(_)
            | SceneError::NoSuchScene(_)
            | SceneError::AlreadySceneRoot { .. }
            | SceneError::RootHasParent { .. } => ErrorKind::Structural,
            SceneError::ThreadAffinity { .. } | SceneError::SyncInProgress => ErrorKind::Affinity,
            SceneError::DragOutsideDetection
            | SceneError::UnknownTouchPoint(_)
            | SceneError::TouchPointCount { .. } => ErrorKind::State,
            SceneError::Backend(_) | SceneError::Layout(_) => ErrorKind::Collaborator,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T, E = SceneError> = std::result::Result<T, E>;

/// Error type returned by application event handlers and snapshot callbacks.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn node(n: u64) -> NodeId {
        NodeId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn messages_name_the_offender() {
        let err = SceneError::Cycle { parent: node(1), node: node(2) };
        let msg = err.to_string();
        assert!(msg.starts_with("cycle detected"));
        assert!(msg.contains("node = "));
    }

    #[test]
    fn kinds() {
        assert_eq!(SceneError::NullChild { parent: node(1) }.kind(), ErrorKind::Structural);
        assert_eq!(SceneError::SyncInProgress.kind(), ErrorKind::Affinity);
        assert_eq!(SceneError::UnknownTouchPoint(7).kind(), ErrorKind::State);
        assert_eq!(SceneError::Backend("gone".into()).kind(), ErrorKind::Collaborator);
    }

    #[test]
    fn touch_message() {
        assert_eq!(
            SceneError::UnknownTouchPoint(3).to_string(),
            "platform reported wrong touch point id: 3"
        );
    }
}
