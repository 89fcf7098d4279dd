//! Pointer routing: hover, press/release/click, drag detection, full
//! press-drag-release and drag and drop.
//!
//! While a button is held the gesture is captured by the press target:
//! pressed, dragged and released events go to it, and hover enter/exit is
//! limited to the press target's chain. A `DragDetected` handler can widen
//! the gesture to full press-drag-release (`MouseDrag*` events to whatever
//! is under the pointer) or drag and drop (`Drag*` events).

use crate::geometry::Point;
use crate::graph::NodeId;

use super::handler::{DragRequest, Event, EventTarget, EventType};
use super::input::{Modifiers, MouseButton, PointerAction, PointerEvent};
use super::routing::{EnterExitTracker, Router};

#[derive(Debug, Clone, PartialEq, Eq)]
enum DragState {
    /// Pressed, not yet moved past the threshold.
    Detecting,
    /// `DragDetected` fired; no handler asked for a gesture.
    Detected,
    FullPdr(EnterExitTracker),
    DragAndDrop(EnterExitTracker),
}

#[derive(Debug, Clone, PartialEq)]
struct Press {
    button: MouseButton,
    target: Option<NodeId>,
    point: Point,
    chain: Vec<EventTarget>,
    drag: DragState,
}

/// Pointer state of one scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouseState {
    hover: EnterExitTracker,
    position: Option<Point>,
    modifiers: Modifiers,
    press: Option<Press>,
}

impl MouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost hovered node.
    pub fn hovered(&self) -> Option<NodeId> {
        self.hover.target()
    }

    pub fn hover_chain(&self) -> &[EventTarget] {
        self.hover.chain()
    }

    /// Last pointer position in the scene, `None` once the pointer left.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    pub fn press_target(&self) -> Option<NodeId> {
        self.press.as_ref().and_then(|p| p.target)
    }

    /// The gesture a `DragDetected` handler started, if still running.
    pub fn active_drag(&self) -> Option<DragRequest> {
        match self.press.as_ref().map(|p| &p.drag) {
            Some(DragState::FullPdr(_)) => Some(DragRequest::FullPdr),
            Some(DragState::DragAndDrop(_)) => Some(DragRequest::DragAndDrop),
            _ => None,
        }
    }

    /// Route one pointer event. `picked` is the node under the pointer.
    pub(crate) fn handle(&mut self, router: &mut Router<'_>, event: &PointerEvent, picked: Option<NodeId>) {
        let point = event.position();
        self.modifiers = event.modifiers;
        let button = match event.action {
            PointerAction::Pressed(b) | PointerAction::Released(b) | PointerAction::Dragged(b) => Some(b),
            PointerAction::Moved | PointerAction::Exited => None,
        };
        let base = Event::new(EventType::MouseMoved, router.scene, router.target(picked), point)
            .with_button(button)
            .with_modifiers(event.modifiers);

        match event.action {
            PointerAction::Exited => {
                self.position = None;
                let exited = self.hover.clear();
                router.fire_exits(&base, EventType::MouseExited, &exited);
            }
            PointerAction::Moved => {
                self.position = Some(point);
                self.update_hover(router, &base, picked);
                router.fire(&base, EventType::MouseMoved, router.target(picked));
            }
            PointerAction::Pressed(b) => {
                self.position = Some(point);
                self.update_hover(router, &base, picked);
                if self.press.is_none() {
                    self.press = Some(Press {
                        button: b,
                        target: picked,
                        point,
                        chain: router.chain(picked),
                        drag: DragState::Detecting,
                    });
                }
                let target = router.target(self.press_target());
                router.fire(&base, EventType::MousePressed, target);
            }
            PointerAction::Dragged(_) if self.press.is_none() => {
                self.position = Some(point);
                self.update_hover(router, &base, picked);
                router.fire(&base, EventType::MouseMoved, router.target(picked));
            }
            PointerAction::Dragged(_) => {
                self.position = Some(point);
                self.update_hover(router, &base, picked);
                let target = router.target(self.press_target());
                router.fire(&base, EventType::MouseDragged, target);
                self.detect_drag(router, &base, point);
                self.drag_over(router, &base, picked);
            }
            PointerAction::Released(b) => {
                self.position = Some(point);
                self.release(router, &base, b, picked);
            }
        }
    }

    /// Re-pick under the last known position after the scene changed.
    /// Nodes that left the scene while entered get their exit events first.
    pub(crate) fn repick(&mut self, router: &mut Router<'_>, picked: Option<NodeId>) {
        let base = Event::new(EventType::MouseMoved, router.scene, router.target(picked), Point::ZERO)
            .with_modifiers(self.modifiers);
        let base = match self.position {
            Some(point) => Event { position: point, ..base },
            None => base,
        };

        let hover_exits = self.hover.handle_removal(&*router.graph, router.scene);
        router.fire_exits(&base, EventType::MouseExited, &hover_exits);
        if let Some(press) = self.press.as_mut() {
            match &mut press.drag {
                DragState::FullPdr(tracker) => {
                    let exits = tracker.handle_removal(&*router.graph, router.scene);
                    router.fire_exits(&base, EventType::MouseDragExited, &exits);
                }
                DragState::DragAndDrop(tracker) => {
                    let exits = tracker.handle_removal(&*router.graph, router.scene);
                    router.fire_exits(&base, EventType::DragExited, &exits);
                }
                DragState::Detecting | DragState::Detected => {}
            }
        }
        if self.position.is_some() {
            self.update_hover(router, &base, picked);
        }
    }

    fn update_hover(&mut self, router: &mut Router<'_>, base: &Event, picked: Option<NodeId>) {
        let picked_chain = router.chain(picked);
        let chain = match &self.press {
            Some(press) => EnterExitTracker::captured(&picked_chain, &press.chain),
            None => picked_chain,
        };
        let transition = self.hover.update(chain);
        router.fire_transition(base, &transition, EventType::MouseExited, EventType::MouseEntered);
    }

    fn detect_drag(&mut self, router: &mut Router<'_>, base: &Event, point: Point) {
        let threshold = router.graph.config().drag_threshold;
        let Some(press) = self.press.as_mut() else { return };
        if press.drag != DragState::Detecting || press.point.distance(point) <= threshold {
            return;
        }
        press.drag = DragState::Detected;
        let source = press.target;
        let event = base.clone().with_gesture_source(source);
        let outcome = router.fire(&event, EventType::DragDetected, router.target(source));
        press.drag = match outcome.drag {
            Some(DragRequest::FullPdr) => DragState::FullPdr(EnterExitTracker::new()),
            Some(DragRequest::DragAndDrop) => DragState::DragAndDrop(EnterExitTracker::new()),
            None => DragState::Detected,
        };
    }

    fn drag_over(&mut self, router: &mut Router<'_>, base: &Event, picked: Option<NodeId>) {
        let Some(press) = self.press.as_mut() else { return };
        let event = base.clone().with_gesture_source(press.target);
        let chain = router.chain(picked);
        let target = router.target(picked);
        match &mut press.drag {
            DragState::FullPdr(tracker) => {
                let transition = tracker.update(chain);
                router.fire_transition(&event, &transition, EventType::MouseDragExited, EventType::MouseDragEntered);
                router.fire(&event, EventType::MouseDragOver, target);
            }
            DragState::DragAndDrop(tracker) => {
                let transition = tracker.update(chain);
                router.fire_transition(&event, &transition, EventType::DragExited, EventType::DragEntered);
                router.fire(&event, EventType::DragOver, target);
            }
            DragState::Detecting | DragState::Detected => {}
        }
    }

    fn release(&mut self, router: &mut Router<'_>, base: &Event, button: MouseButton, picked: Option<NodeId>) {
        let Some(press) = self.press.take_if(|p| p.button == button) else {
            router.fire(base, EventType::MouseReleased, router.target(picked));
            return;
        };
        let source = press.target;
        router.fire(base, EventType::MouseReleased, router.target(source));

        let event = base.clone().with_gesture_source(source);
        let target = router.target(picked);
        match press.drag {
            DragState::FullPdr(mut tracker) => {
                router.fire(&event, EventType::MouseDragReleased, target);
                let exited = tracker.clear();
                router.fire_exits(&event, EventType::MouseDragExited, &exited);
            }
            DragState::DragAndDrop(mut tracker) => {
                router.fire(&event, EventType::DragDropped, target);
                let exited = tracker.clear();
                router.fire_exits(&event, EventType::DragExited, &exited);
                router.fire(&event, EventType::DragDone, router.target(source));
            }
            DragState::Detecting | DragState::Detected => {}
        }
        if source.is_some() && picked == source {
            router.fire(base, EventType::MouseClicked, target);
        }
        // Capture is over: enter whatever is under the pointer now.
        self.update_hover(router, base, picked);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
