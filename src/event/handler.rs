//! Event types, handler registration, and capture/bubble dispatch.
//!
//! Handlers are registered per [`EventTarget`], per [`EventType`] and per
//! [`Phase`]. [`EventDispatcher::dispatch`] walks the chain from the scene
//! down to the target (capture) and back up (bubble). Enter and exit events
//! are delivered to their target only.

use std::collections::HashMap;

use crate::error::{ListenerError, Result, SceneError};
use crate::geometry::Point;
use crate::graph::{NodeId, SceneGraph, SceneId};

use super::input::{KeyEvent, Modifiers, MouseButton, TouchState};

// ---------------------------------------------------------------------------
// Event data
// ---------------------------------------------------------------------------

/// Every event the router delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    KeyPressed,

    MouseEntered,
    MouseExited,
    MouseMoved,
    MousePressed,
    MouseReleased,
    MouseDragged,
    MouseClicked,

    DragDetected,

    MouseDragEntered,
    MouseDragExited,
    MouseDragOver,
    MouseDragReleased,

    DragEntered,
    DragExited,
    DragOver,
    DragDropped,
    DragDone,

    TouchPressed,
    TouchMoved,
    TouchStationary,
    TouchReleased,
    TouchEntered,
    TouchExited,
}

impl EventType {
    /// Enter and exit events do not propagate.
    pub fn is_enter_exit(self) -> bool {
        matches!(
            self,
            EventType::MouseEntered
                | EventType::MouseExited
                | EventType::MouseDragEntered
                | EventType::MouseDragExited
                | EventType::DragEntered
                | EventType::DragExited
                | EventType::TouchEntered
                | EventType::TouchExited
        )
    }
}

/// Something that can receive events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Node(NodeId),
    Scene(SceneId),
}

impl EventTarget {
    pub fn node(self) -> Option<NodeId> {
        match self {
            EventTarget::Node(id) => Some(id),
            EventTarget::Scene(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Scene first, target last.
    Capture,
    /// Target first, scene last.
    Bubble,
}

/// Touch-specific event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchDetail {
    /// Ordinal id, starting at 1 for the first contact of a gesture.
    pub id: u32,
    pub point_count: usize,
    pub state: TouchState,
}

/// One delivered event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    /// The innermost target.
    pub target: EventTarget,
    pub scene: SceneId,
    /// Scene coordinates.
    pub position: Point,
    pub button: Option<MouseButton>,
    pub modifiers: Modifiers,
    pub key: Option<KeyEvent>,
    pub touch: Option<TouchDetail>,
    /// The node a drag gesture started on.
    pub gesture_source: Option<NodeId>,
}

impl Event {
    pub fn new(event_type: EventType, scene: SceneId, target: EventTarget, position: Point) -> Self {
        Self {
            event_type,
            target,
            scene,
            position,
            button: None,
            modifiers: Modifiers::NONE,
            key: None,
            touch: None,
            gesture_source: None,
        }
    }

    pub fn with_button(mut self, button: Option<MouseButton>) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_key(mut self, key: KeyEvent) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_touch(mut self, touch: TouchDetail) -> Self {
        self.touch = Some(touch);
        self
    }

    pub fn with_gesture_source(mut self, source: Option<NodeId>) -> Self {
        self.gesture_source = source;
        self
    }

    /// Same payload, different type and target.
    pub(crate) fn retarget(&self, event_type: EventType, target: EventTarget) -> Self {
        Self { event_type, target, ..self.clone() }
    }
}

// ---------------------------------------------------------------------------
// Handler context
// ---------------------------------------------------------------------------

/// Gesture a `DragDetected` handler asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragRequest {
    /// Full press-drag-release: other nodes receive `MouseDrag*` events.
    FullPdr,
    DragAndDrop,
}

/// What a handler sees while it runs.
pub struct EventContext<'a> {
    pub graph: &'a mut SceneGraph,
    pub event: &'a Event,
    current: EventTarget,
    phase: Phase,
    consumed: bool,
    drag: Option<DragRequest>,
}

impl EventContext<'_> {
    /// The target whose handler is running.
    pub fn current_target(&self) -> EventTarget {
        self.current
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Stop propagation after the current target.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Turn the current press into a full press-drag-release gesture.
    pub fn start_full_drag(&mut self) -> Result<()> {
        self.request_drag(DragRequest::FullPdr)
    }

    /// Start drag and drop from the press target.
    pub fn start_drag_and_drop(&mut self) -> Result<()> {
        self.request_drag(DragRequest::DragAndDrop)
    }

    fn request_drag(&mut self, request: DragRequest) -> Result<()> {
        if self.event.event_type != EventType::DragDetected {
            return Err(SceneError::DragOutsideDetection);
        }
        self.drag = Some(request);
        Ok(())
    }
}

/// An application event handler.
pub type Handler = Box<dyn FnMut(&mut EventContext<'_>) -> std::result::Result<(), ListenerError>>;

/// Returned by [`EventDispatcher::add_handler`]; pass to `remove_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Result of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub consumed: bool,
    /// Handlers that ran, failed ones included.
    pub delivered: usize,
    pub drag: Option<DragRequest>,
}

// ---------------------------------------------------------------------------
// EventDispatcher
// ---------------------------------------------------------------------------

type Slot = (EventTarget, EventType, Phase);

/// Handler registry and capture/bubble router.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<Slot, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event_type` on `target` in `phase`.
    /// Handlers on one target run in registration order.
    pub fn add_handler<F>(&mut self, target: EventTarget, event_type: EventType, phase: Phase, handler: F) -> HandlerId
    where
        F: FnMut(&mut EventContext<'_>) -> std::result::Result<(), ListenerError> + 'static,
    {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers
            .entry((target, event_type, phase))
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        let mut removed = false;
        self.handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(h, _)| *h != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    /// Drop every handler of `target`.
    pub fn remove_target(&mut self, target: EventTarget) {
        self.handlers.retain(|(t, ..), _| *t != target);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Targets from `event.target` outwards: the node, its ancestors, then
    /// the scene. Enter and exit events stop at the target.
    pub fn dispatch_chain(graph: &SceneGraph, event: &Event) -> Vec<EventTarget> {
        let mut chain = vec![event.target];
        if event.event_type.is_enter_exit() {
            return chain;
        }
        if let EventTarget::Node(id) = event.target {
            chain.extend(graph.ancestors(id).into_iter().map(EventTarget::Node));
            chain.push(EventTarget::Scene(event.scene));
        }
        chain
    }

    /// Deliver `event` through its dispatch chain.
    ///
    /// Consuming stops propagation once the current target's handlers for
    /// the current phase have all run. A failing handler is logged and the
    /// remaining handlers still run.
    pub fn dispatch(&mut self, graph: &mut SceneGraph, event: &Event) -> DispatchOutcome {
        let chain = Self::dispatch_chain(graph, event);
        let mut outcome = DispatchOutcome::default();

        let capture = chain.iter().rev().map(|&t| (t, Phase::Capture));
        let bubble = chain.iter().map(|&t| (t, Phase::Bubble));
        for (target, phase) in capture.chain(bubble) {
            self.run_handlers(graph, event, target, phase, &mut outcome);
            if outcome.consumed {
                break;
            }
        }
        outcome
    }

    fn run_handlers(
        &mut self,
        graph: &mut SceneGraph,
        event: &Event,
        target: EventTarget,
        phase: Phase,
        outcome: &mut DispatchOutcome,
    ) {
        let Some(list) = self.handlers.get_mut(&(target, event.event_type, phase)) else { return };
        let mut cx = EventContext {
            graph,
            event,
            current: target,
            phase,
            consumed: false,
            drag: outcome.drag,
        };
        for (_, handler) in list.iter_mut() {
            outcome.delivered += 1;
            if let Err(e) = handler(&mut cx) {
                log::error!("{:?} handler on {target:?} failed: {e}", event.event_type);
            }
        }
        outcome.consumed |= cx.consumed;
        outcome.drag = cx.drag;
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
