//! Enter/exit bookkeeping for one gesture class.
//!
//! An [`EnterExitTracker`] remembers the chain of targets the pointer (or a
//! touch point, or a drag) is currently inside: the picked node, its
//! ancestors, then the scene. Moving to a new chain exits the old chain's
//! unique part innermost first and enters the new chain's unique part
//! outermost first. Targets both chains share are left alone.

use crate::graph::{NodeId, SceneGraph, SceneId};

use super::handler::{DispatchOutcome, Event, EventDispatcher, EventTarget, EventType};

/// Targets to notify after a chain change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Innermost first.
    pub exited: Vec<EventTarget>,
    /// Outermost first.
    pub entered: Vec<EventTarget>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.exited.is_empty() && self.entered.is_empty()
    }
}

/// The currently entered chain of one gesture, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnterExitTracker {
    chain: Vec<EventTarget>,
}

impl EnterExitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &[EventTarget] {
        &self.chain
    }

    /// The innermost entered node.
    pub fn target(&self) -> Option<NodeId> {
        self.chain.first().and_then(|t| t.node())
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// `node`, its ancestors, then `scene`. No node means the scene alone.
    pub fn target_chain(graph: &SceneGraph, scene: SceneId, node: Option<NodeId>) -> Vec<EventTarget> {
        let mut chain = Vec::new();
        if let Some(node) = node {
            chain.push(EventTarget::Node(node));
            chain.extend(graph.ancestors(node).into_iter().map(EventTarget::Node));
        }
        chain.push(EventTarget::Scene(scene));
        chain
    }

    /// The part of `picked` that also lies on `capture`: during a captured
    /// gesture nothing outside the press target's chain is entered.
    pub fn captured(picked: &[EventTarget], capture: &[EventTarget]) -> Vec<EventTarget> {
        let shared = common_suffix(picked, capture);
        picked[picked.len() - shared..].to_vec()
    }

    /// Switch to `new` and report what was exited and entered.
    pub fn update(&mut self, new: Vec<EventTarget>) -> Transition {
        let shared = common_suffix(&self.chain, &new);
        let exited = self.chain[..self.chain.len() - shared].to_vec();
        let entered = new[..new.len() - shared].iter().rev().copied().collect();
        self.chain = new;
        Transition { exited, entered }
    }

    /// Exit everything.
    pub fn clear(&mut self) -> Vec<EventTarget> {
        std::mem::take(&mut self.chain)
    }

    /// Drop entries that no longer hang together in `scene`: nodes that
    /// were destroyed, left the scene, or were moved under another parent.
    /// Everything inside the outermost broken entry is exited.
    pub fn handle_removal(&mut self, graph: &SceneGraph, scene: SceneId) -> Vec<EventTarget> {
        let broken = (0..self.chain.len()).rev().find(|&i| {
            let EventTarget::Node(node) = self.chain[i] else { return false };
            if graph.scene_of(node) != Some(scene) {
                return true;
            }
            match self.chain.get(i + 1) {
                Some(EventTarget::Node(outer)) => graph.parent(node) != Some(*outer),
                Some(EventTarget::Scene(_)) => graph.parent(node).is_some(),
                None => false,
            }
        });
        match broken {
            Some(i) => self.chain.drain(..=i).collect(),
            None => Vec::new(),
        }
    }
}

/// Graph, handlers and scene of one routing step.
pub(crate) struct Router<'a> {
    pub graph: &'a mut SceneGraph,
    pub dispatcher: &'a mut EventDispatcher,
    pub scene: SceneId,
}

impl Router<'_> {
    /// `node`, or the scene when nothing was hit.
    pub fn target(&self, node: Option<NodeId>) -> EventTarget {
        node.map_or(EventTarget::Scene(self.scene), EventTarget::Node)
    }

    pub fn chain(&self, node: Option<NodeId>) -> Vec<EventTarget> {
        EnterExitTracker::target_chain(&*self.graph, self.scene, node)
    }

    pub fn fire(&mut self, base: &Event, event_type: EventType, target: EventTarget) -> DispatchOutcome {
        let event = base.retarget(event_type, target);
        self.dispatcher.dispatch(&mut *self.graph, &event)
    }

    pub fn fire_exits(&mut self, base: &Event, event_type: EventType, exited: &[EventTarget]) {
        for &target in exited {
            self.fire(base, event_type, target);
        }
    }

    pub fn fire_transition(&mut self, base: &Event, transition: &Transition, exit: EventType, enter: EventType) {
        self.fire_exits(base, exit, &transition.exited);
        for &target in &transition.entered {
            self.fire(base, enter, target);
        }
    }
}

/// Length of the longest common tail of `a` and `b`.
fn common_suffix(a: &[EventTarget], b: &[EventTarget]) -> usize {
    a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count()
}

// ===========================================================================
// Tests
// ===========================================================================
