//! Execution context: where scene-graph mutation is allowed to happen.
//!
//! The graph is single-threaded. Rather than a global debug flag, every
//! [`SceneGraph`](crate::graph::SceneGraph) carries one [`ExecutionContext`]
//! that mutation entry points consult.

use std::fmt;
use std::thread::{self, ThreadId};

use crate::error::{Result, SceneError};

/// Decides whether the calling thread may mutate a live scene.
pub trait ExecutionContext: fmt::Debug + Send + Sync {
    /// Fail with [`SceneError::ThreadAffinity`] when called off the scene thread.
    fn check_scene_thread(&self) -> Result<()>;
}

/// Binds the scene to the thread that created it.
#[derive(Debug, Clone)]
pub struct ThreadBound {
    owner: ThreadId,
}

impl ThreadBound {
    /// Bind to the calling thread.
    pub fn current() -> Self {
        Self { owner: thread::current().id() }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }
}

impl Default for ThreadBound {
    fn default() -> Self {
        Self::current()
    }
}

impl ExecutionContext for ThreadBound {
    fn check_scene_thread(&self) -> Result<()> {
        let current = thread::current();
        if current.id() == self.owner {
            Ok(())
        } else {
            Err(SceneError::ThreadAffinity {
                thread: current.name().map_or_else(|| format!("{:?}", current.id()), str::to_owned),
            })
        }
    }
}

/// Accepts every caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unchecked;

impl ExecutionContext for Unchecked {
    fn check_scene_thread(&self) -> Result<()> {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
