//! Multi-touch routing.
//!
//! Each contact is grabbed by the node it was pressed on: its pressed,
//! moved, stationary and released events go there. Independently, each
//! contact keeps its own enter/exit chain for the node currently under it.
//! Contacts get ordinal ids starting at 1; the numbering restarts once every
//! contact of a gesture has been released.

use std::collections::HashMap;

use crate::error::{Result, SceneError};
use crate::geometry::Point;
use crate::graph::NodeId;

use super::handler::{Event, EventType, TouchDetail};
use super::input::{TouchEvent, TouchPoint, TouchState};
use super::routing::{EnterExitTracker, Router};

// ---------------------------------------------------------------------------
// TouchMap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Contact {
    platform_id: u64,
    ordinal: u32,
    grab: Option<NodeId>,
    tracker: EnterExitTracker,
    released: bool,
}

/// Platform ids to contacts.
///
/// Lookups scan linearly while the gesture has few contacts; past the
/// threshold an index is built. Released contacts stay until the whole
/// gesture ends so their ordinals are not reused mid-gesture.
#[derive(Debug, Clone, Default)]
struct TouchMap {
    contacts: Vec<Contact>,
    index: Option<HashMap<u64, usize>>,
    threshold: usize,
    next_ordinal: u32,
}

impl TouchMap {
    fn new(threshold: usize) -> Self {
        Self { threshold, next_ordinal: 1, ..Self::default() }
    }

    fn position(&self, platform_id: u64) -> Option<usize> {
        match &self.index {
            Some(index) => index.get(&platform_id).copied(),
            None => self.contacts.iter().position(|c| c.platform_id == platform_id),
        }
    }

    fn get(&self, platform_id: u64) -> Option<&Contact> {
        self.position(platform_id).map(|i| &self.contacts[i])
    }

    fn get_mut(&mut self, platform_id: u64) -> Option<&mut Contact> {
        self.position(platform_id).map(|i| &mut self.contacts[i])
    }

    fn is_active(&self, platform_id: u64) -> bool {
        self.get(platform_id).is_some_and(|c| !c.released)
    }

    fn add(&mut self, platform_id: u64, grab: Option<NodeId>) -> u32 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        // A released contact's id may come back within the same gesture.
        if let Some(i) = self.position(platform_id) {
            self.contacts[i] = Contact { platform_id, ordinal, grab, tracker: EnterExitTracker::new(), released: false };
            return ordinal;
        }
        self.contacts.push(Contact { platform_id, ordinal, grab, tracker: EnterExitTracker::new(), released: false });
        let last = self.contacts.len() - 1;
        match &mut self.index {
            Some(index) => {
                index.insert(platform_id, last);
            }
            None if self.contacts.len() > self.threshold => {
                let index = self.contacts.iter().enumerate().map(|(i, c)| (c.platform_id, i)).collect();
                self.index = Some(index);
            }
            None => {}
        }
        ordinal
    }

    /// Forget everything once no contact is down.
    fn cleanup(&mut self) {
        if self.contacts.iter().all(|c| c.released) {
            self.contacts.clear();
            self.index = None;
            self.next_ordinal = 1;
        }
    }

    fn len(&self) -> usize {
        self.contacts.len()
    }
}

// ---------------------------------------------------------------------------
// TouchTracker
// ---------------------------------------------------------------------------

/// Touch state of one scene.
#[derive(Debug, Clone)]
pub struct TouchTracker {
    map: TouchMap,
}

impl TouchTracker {
    /// `fast_path_threshold` is the contact count up to which lookups scan.
    pub fn new(fast_path_threshold: usize) -> Self {
        Self { map: TouchMap::new(fast_path_threshold) }
    }

    /// Contacts of the current gesture, released ones included.
    pub fn contact_count(&self) -> usize {
        self.map.len()
    }

    /// Ordinal id of an active contact.
    pub fn ordinal(&self, platform_id: u64) -> Option<u32> {
        self.map.get(platform_id).filter(|c| !c.released).map(|c| c.ordinal)
    }

    /// Node grabbing an active contact.
    pub fn grab(&self, platform_id: u64) -> Option<NodeId> {
        self.map.get(platform_id).filter(|c| !c.released).and_then(|c| c.grab)
    }

    /// Whether the platform's view of the gesture agrees with ours.
    ///
    /// Every point but a newly pressed one must be a known active contact;
    /// a pressed point must not be. The announced count must match.
    fn validate(&self, event: &TouchEvent) -> Result<()> {
        if event.points.len() != event.count {
            return Err(SceneError::TouchPointCount { expected: event.count, actual: event.points.len() });
        }
        for point in &event.points {
            let active = self.map.is_active(point.id);
            if active == (point.state == TouchState::Pressed) {
                return Err(SceneError::UnknownTouchPoint(point.id));
            }
        }
        Ok(())
    }

    /// Route one touch event. `picked[i]` is the node under `event.points[i]`.
    ///
    /// The event is checked as a whole first; an inconsistent event is
    /// rejected before anything is delivered.
    pub(crate) fn handle(&mut self, router: &mut Router<'_>, event: &TouchEvent, picked: &[Option<NodeId>]) -> Result<()> {
        self.validate(event)?;
        for (point, &node) in event.points.iter().zip(picked) {
            if point.state == TouchState::Pressed {
                self.map.add(point.id, node);
            }
        }
        for (point, &node) in event.points.iter().zip(picked) {
            self.deliver(router, event, point, node);
        }
        self.map.cleanup();
        Ok(())
    }

    fn deliver(&mut self, router: &mut Router<'_>, event: &TouchEvent, point: &TouchPoint, node: Option<NodeId>) {
        let chain = router.chain(node);
        let Some(contact) = self.map.get_mut(point.id) else { return };
        let detail = TouchDetail { id: contact.ordinal, point_count: event.count, state: point.state };
        let base = Event::new(EventType::TouchMoved, router.scene, router.target(node), point.position())
            .with_modifiers(event.modifiers)
            .with_touch(detail);

        let transition = contact.tracker.update(chain);
        router.fire_transition(&base, &transition, EventType::TouchExited, EventType::TouchEntered);

        let event_type = match point.state {
            TouchState::Pressed => EventType::TouchPressed,
            TouchState::Moved => EventType::TouchMoved,
            TouchState::Stationary => EventType::TouchStationary,
            TouchState::Released => EventType::TouchReleased,
        };
        router.fire(&base, event_type, router.target(contact.grab));

        if point.state == TouchState::Released {
            contact.released = true;
            let exited = contact.tracker.clear();
            router.fire_exits(&base, EventType::TouchExited, &exited);
        }
    }

    /// Exit nodes that left the scene while a contact was over them.
    pub(crate) fn handle_removal(&mut self, router: &mut Router<'_>) {
        for contact in self.map.contacts.iter_mut().filter(|c| !c.released) {
            let exited = contact.tracker.handle_removal(&*router.graph, router.scene);
            if exited.is_empty() {
                continue;
            }
            let detail = TouchDetail { id: contact.ordinal, point_count: 0, state: TouchState::Stationary };
            let base = Event::new(EventType::TouchExited, router.scene, router.target(None), Point::ZERO)
                .with_touch(detail);
            router.fire_exits(&base, EventType::TouchExited, &exited);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::handler::{EventDispatcher, EventTarget, Phase};
    use crate::geometry::{Bounds, Point};
    use crate::graph::{NodeData, SceneGraph, SceneId};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(EventType, EventTarget, u32)>>>;

    struct Fixture {
        graph: SceneGraph,
        dispatcher: EventDispatcher,
        touch: TouchTracker,
        scene: SceneId,
        root: NodeId,
        left: NodeId,
        right: NodeId,
        log: Log,
    }

    fn fixture(threshold: usize) -> Fixture {
        let mut graph = SceneGraph::new();
        let scene = graph.create_scene(100.0, 100.0);
        let root = graph.create(NodeData::container());
        let left = graph
            .create_child(root, NodeData::leaf(Bounds::from_rect(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        let right = graph
            .create_child(root, NodeData::leaf(Bounds::from_rect(20.0, 0.0, 10.0, 10.0)))
            .unwrap();
        graph.set_root(scene, root).unwrap();

        let mut dispatcher = EventDispatcher::new();
        let log: Log = Rc::default();
        for node in [root, left, right] {
            for event_type in [
                EventType::TouchPressed,
                EventType::TouchMoved,
                EventType::TouchStationary,
                EventType::TouchReleased,
                EventType::TouchEntered,
                EventType::TouchExited,
            ] {
                let log = Rc::clone(&log);
                dispatcher.add_handler(EventTarget::Node(node), event_type, Phase::Bubble, move |cx| {
                    if cx.current_target() == cx.event.target {
                        let ordinal = cx.event.touch.map_or(0, |t| t.id);
                        log.borrow_mut().push((cx.event.event_type, cx.current_target(), ordinal));
                    }
                    Ok(())
                });
            }
        }
        Fixture { graph, dispatcher, touch: TouchTracker::new(threshold), scene, root, left, right, log }
    }

    impl Fixture {
        fn send(&mut self, event: TouchEvent) -> Result<()> {
            let picked: Vec<_> = event
                .points
                .iter()
                .map(|p| self.graph.pick(self.scene, Point::new(p.x, p.y)))
                .collect();
            let mut router = Router { graph: &mut self.graph, dispatcher: &mut self.dispatcher, scene: self.scene };
            self.touch.handle(&mut router, &event, &picked)
        }

        fn take(&self) -> Vec<(EventType, EventTarget, u32)> {
            std::mem::take(&mut *self.log.borrow_mut())
        }
    }

    fn pt(id: u64, state: TouchState, x: f64) -> TouchPoint {
        TouchPoint::new(id, state, x, 5.0)
    }

    fn n(id: NodeId) -> EventTarget {
        EventTarget::Node(id)
    }

    // ── Ordinals ─────────────────────────────────────────────────────

    #[test]
    fn ordinals_start_at_one_and_restart_per_gesture() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(40, TouchState::Pressed, 5.0)])).unwrap();
        f.send(TouchEvent::new(vec![pt(40, TouchState::Stationary, 5.0), pt(41, TouchState::Pressed, 25.0)]))
            .unwrap();
        assert_eq!(f.touch.ordinal(40), Some(1));
        assert_eq!(f.touch.ordinal(41), Some(2));

        f.send(TouchEvent::new(vec![pt(40, TouchState::Released, 5.0), pt(41, TouchState::Released, 25.0)]))
            .unwrap();
        assert_eq!(f.touch.contact_count(), 0);
        f.send(TouchEvent::new(vec![pt(99, TouchState::Pressed, 5.0)])).unwrap();
        assert_eq!(f.touch.ordinal(99), Some(1));
    }

    #[test]
    fn released_contact_waits_for_gesture_end() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0), pt(2, TouchState::Pressed, 25.0)]))
            .unwrap();
        f.send(TouchEvent::new(vec![pt(1, TouchState::Released, 5.0), pt(2, TouchState::Stationary, 25.0)]))
            .unwrap();
        assert_eq!(f.touch.contact_count(), 2);
        assert_eq!(f.touch.ordinal(1), None);
        assert_eq!(f.touch.ordinal(2), Some(2));
    }

    #[test]
    fn index_takes_over_past_threshold() {
        let mut f = fixture(2);
        let points: Vec<_> = (0..4).map(|i| pt(100 + i, TouchState::Pressed, 50.0)).collect();
        f.send(TouchEvent::new(points)).unwrap();
        assert!(f.touch.map.index.is_some());
        assert_eq!(f.touch.ordinal(103), Some(4));
        assert_eq!(f.touch.ordinal(7), None);
    }

    // ── Validation ───────────────────────────────────────────────────

    #[test]
    fn unknown_id_is_rejected_before_delivery() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0)])).unwrap();
        f.take();
        let err = f
            .send(TouchEvent::new(vec![pt(1, TouchState::Moved, 6.0), pt(9, TouchState::Moved, 25.0)]))
            .unwrap_err();
        assert_eq!(err, SceneError::UnknownTouchPoint(9));
        assert!(f.take().is_empty());
    }

    #[test]
    fn pressing_an_active_id_is_rejected() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0)])).unwrap();
        let err = f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0)])).unwrap_err();
        assert_eq!(err, SceneError::UnknownTouchPoint(1));
    }

    #[test]
    fn wrong_point_count_is_rejected() {
        let mut f = fixture(10);
        let event = TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0)]).with_count(2);
        assert_eq!(f.send(event), Err(SceneError::TouchPointCount { expected: 2, actual: 1 }));
        assert_eq!(f.touch.contact_count(), 0);
    }

    // ── Delivery ─────────────────────────────────────────────────────

    #[test]
    fn contact_is_grabbed_by_press_target() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 5.0)])).unwrap();
        assert_eq!(
            f.take(),
            vec![
                (EventType::TouchEntered, n(f.root), 1),
                (EventType::TouchEntered, n(f.left), 1),
                (EventType::TouchPressed, n(f.left), 1),
            ]
        );

        // Sliding onto `right` moves the enter/exit chain but not the grab.
        f.send(TouchEvent::new(vec![pt(1, TouchState::Moved, 25.0)])).unwrap();
        assert_eq!(
            f.take(),
            vec![
                (EventType::TouchExited, n(f.left), 1),
                (EventType::TouchEntered, n(f.right), 1),
                (EventType::TouchMoved, n(f.left), 1),
            ]
        );
        assert_eq!(f.touch.grab(1), Some(f.left));

        f.send(TouchEvent::new(vec![pt(1, TouchState::Released, 25.0)])).unwrap();
        assert_eq!(
            f.take(),
            vec![
                (EventType::TouchReleased, n(f.left), 1),
                (EventType::TouchExited, n(f.right), 1),
                (EventType::TouchExited, n(f.root), 1),
            ]
        );
    }

    #[test]
    fn removal_exits_per_contact() {
        let mut f = fixture(10);
        f.send(TouchEvent::new(vec![pt(1, TouchState::Pressed, 25.0)])).unwrap();
        f.take();
        f.graph.remove_child(f.root, f.right).unwrap();
        let mut router = Router { graph: &mut f.graph, dispatcher: &mut f.dispatcher, scene: f.scene };
        f.touch.handle_removal(&mut router);
        assert_eq!(f.take(), vec![(EventType::TouchExited, n(f.right), 1)]);
    }
}
