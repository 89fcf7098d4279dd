//! The pulse.
//!
//! One pulse of a scene runs, in order: the style pass, the layout passes,
//! render sync, the renderer redraw notice, deferred snapshots, the
//! post-pulse input re-pick, focus cleanup and finally the host hook. If
//! anything is still dirty afterwards another pulse is requested.

use crate::error::{Result, SceneError};
use crate::event::routing::Router;
use crate::graph::{NodeId, SceneGraph, SceneId};
use crate::stage::Stage;

use super::backend::RenderBackend;

/// What one pulse did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PulseReport {
    pub css_ran: bool,
    /// Layout passes that found dirty roots.
    pub layout_passes: usize,
    pub synced_nodes: usize,
    pub full_sync: bool,
    /// Work was left over and another pulse was requested.
    pub follow_up_requested: bool,
}

impl<B: RenderBackend> Stage<B> {
    /// Run one pulse of `scene`.
    pub fn pulse(&mut self, scene: SceneId) -> Result<PulseReport> {
        self.graph.scene(scene).ok_or(SceneError::NoSuchScene(scene))?;
        self.graph.check_thread()?;
        let mut report = PulseReport::default();

        report.css_ran = self.graph.css_pass(scene, self.styles.as_mut());

        let passes = self.graph.config().layout_passes_per_pulse;
        report.layout_passes = self.graph.do_layout_pass(scene, passes);

        if self.graph.needs_sync(scene) {
            let outcome = self.graph.synchronize(scene, &mut self.backend);
            report.synced_nodes = outcome.synced_nodes;
            report.full_sync = outcome.full_sync;
            if outcome.did_work() {
                self.backend.mark_dirty(scene);
            }
        }
        self.run_pending_snapshots(scene);
        self.repick_after_pulse(scene);
        self.graph.focus_cleanup(scene);

        if let Some(hook) = self.hook.as_mut() {
            hook(&self.graph, scene);
        }

        report.follow_up_requested = self.has_pending_work(scene);
        let any_pending = self.graph.scenes.keys().any(|s| self.has_pending_work(s));
        self.graph.pulse_requested = any_pending;
        if report.follow_up_requested {
            self.backend.request_next_frame();
        }
        log::debug!("pulse {scene:?}: {report:?}");
        Ok(report)
    }

    /// Pulse every scene that has pending work.
    pub fn pulse_all(&mut self) -> Result<Vec<(SceneId, PulseReport)>> {
        let scenes: Vec<SceneId> = self.graph.scenes.keys().filter(|&s| self.has_pending_work(s)).collect();
        let mut reports = Vec::with_capacity(scenes.len());
        for scene in scenes {
            reports.push((scene, self.pulse(scene)?));
        }
        Ok(reports)
    }

    /// Whether `scene` would do anything in its next pulse.
    pub fn has_pending_work(&self, scene: SceneId) -> bool {
        let graph = &self.graph;
        graph.needs_css_pass(scene)
            || graph.has_pending_layout(scene)
            || graph.needs_sync(scene)
            || graph.scene(scene).is_some_and(|s| s.is_focus_dirty())
            || self.pending_snapshots(scene) > 0
    }

    /// The tree may have moved under a resting pointer. Re-pick at the last
    /// known position; subtrees that left the scene get their exits.
    fn repick_after_pulse(&mut self, scene: SceneId) {
        let departed = take_departures(&mut self.graph, scene);
        let Some(input) = self.input.get_mut(scene) else { return };
        let position = input.mouse.position();
        let picked = position.and_then(|p| self.graph.pick(scene, p));

        let mut router = Router { graph: &mut self.graph, dispatcher: &mut self.dispatcher, scene };
        input.mouse.repick(&mut router, picked);
        if !departed.is_empty() {
            log::trace!("{} subtree(s) left {scene:?}", departed.len());
            input.touch.handle_removal(&mut router);
        }
    }
}

/// Subtrees detached from `scene` since its last pulse. Entries of scenes
/// that no longer exist are dropped.
fn take_departures(graph: &mut SceneGraph, scene: SceneId) -> Vec<NodeId> {
    let mut departed = Vec::new();
    let scenes = &graph.scenes;
    graph.departures.retain(|&(s, node)| {
        if s == scene {
            departed.push(node);
            false
        } else {
            scenes.contains_key(s)
        }
    });
    departed
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventTarget, EventType, InputEvent, Phase, PointerAction, PointerEvent};
    use crate::geometry::Bounds;
    use crate::graph::NodeData;
    use crate::graph::Sizing;
    use crate::testing::{BackendCall, RecordingBackend};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn build_stage() -> (Stage<RecordingBackend>, SceneId, NodeId, NodeId) {
        let mut stage = Stage::new(RecordingBackend::new());
        let graph = stage.graph_mut();
        let scene = graph.create_scene(20.0, 20.0);
        let root = graph.create(NodeData::container());
        let leaf = graph
            .create_child(root, NodeData::leaf(Bounds::from_rect(0.0, 0.0, 5.0, 5.0)).focusable(true))
            .unwrap();
        graph.set_root(scene, root).unwrap();
        (stage, scene, root, leaf)
    }

    // ── Ordering ─────────────────────────────────────────────────────

    #[test]
    fn first_pulse_does_full_sync() {
        let (mut stage, scene, root, leaf) = build_stage();
        let report = stage.pulse(scene).unwrap();
        assert!(report.full_sync);
        assert_eq!(report.synced_nodes, 2);
        assert_eq!(stage.backend().created(), vec![root, leaf]);
        assert!(stage.backend().calls().contains(&BackendCall::MarkDirty(scene)));
        assert!(!report.follow_up_requested);
        assert!(!stage.graph().needs_pulse());
    }

    #[test]
    fn clean_scene_pulse_does_nothing() {
        let (mut stage, scene, ..) = build_stage();
        stage.pulse(scene).unwrap();
        stage.backend_mut().clear();
        let report = stage.pulse(scene).unwrap();
        assert_eq!(report, PulseReport::default());
        assert!(stage.backend().calls().is_empty());
    }

    #[test]
    fn hook_sees_synced_and_focused_state() {
        let (mut stage, scene, _root, leaf) = build_stage();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        stage.set_pulse_hook(move |graph, s| {
            *sink.borrow_mut() = Some((graph.needs_sync(s), graph.focus_owner(s)));
        });
        stage.pulse(scene).unwrap();
        assert_eq!(*seen.borrow(), Some((false, Some(leaf))));
    }

    #[test]
    fn layout_runs_before_sync() {
        let (mut stage, scene, root, _leaf) = build_stage();
        let graph = stage.graph_mut();
        let sized = graph
            .create_child(root, NodeData::leaf(Bounds::EMPTY).resizable(Sizing::new(1.0, 1.0).with_pref(8.0, 3.0)))
            .unwrap();
        stage.pulse(scene).unwrap();
        // The peer saw the laid-out size, not the initial one.
        let pushed = stage.backend().calls().iter().find_map(|c| match c {
            BackendCall::UpdatePeer { node, bounds, .. } if *node == sized => Some(*bounds),
            _ => None,
        });
        assert_eq!(pushed, Some(Bounds::from_rect(0.0, 0.0, 8.0, 3.0)));
    }

    #[test]
    fn unknown_scene_is_rejected() {
        let (mut stage, scene, ..) = build_stage();
        stage.destroy_scene(scene).unwrap();
        assert_eq!(stage.pulse(scene), Err(SceneError::NoSuchScene(scene)));
    }

    // ── Follow-up ────────────────────────────────────────────────────

    #[test]
    fn mutation_between_pulses_syncs_incrementally() {
        let (mut stage, scene, ..) = build_stage();
        stage.pulse(scene).unwrap();
        stage.backend_mut().clear();
        let graph = stage.graph_mut();
        let root = graph.scene(scene).and_then(|s| s.root()).unwrap();
        graph.set_visible(root, false).unwrap();
        assert!(stage.has_pending_work(scene));
        let report = stage.pulse(scene).unwrap();
        assert_eq!(report.synced_nodes, 1);
        assert!(!report.follow_up_requested);
    }

    #[test]
    fn pulse_all_visits_dirty_scenes_only() {
        let (mut stage, scene, ..) = build_stage();
        stage.pulse(scene).unwrap();
        let other = stage.graph_mut().create_scene(5.0, 5.0);
        let reports = stage.pulse_all().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, other);
    }

    // ── Post-pulse picking ───────────────────────────────────────────

    #[test]
    fn removal_under_resting_pointer_fires_exit() {
        let (mut stage, scene, root, leaf) = build_stage();
        stage.pulse(scene).unwrap();
        let exits = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&exits);
        stage.add_handler(EventTarget::Node(leaf), EventType::MouseExited, Phase::Bubble, move |cx| {
            sink.borrow_mut().push(cx.current_target());
            Ok(())
        });
        stage
            .process_input(scene, InputEvent::Pointer(PointerEvent::new(PointerAction::Moved, 1.0, 1.0)))
            .unwrap();
        assert_eq!(stage.mouse(scene).and_then(|m| m.hovered()), Some(leaf));

        stage.graph_mut().remove_child(root, leaf).unwrap();
        stage.pulse(scene).unwrap();
        assert_eq!(*exits.borrow(), vec![EventTarget::Node(leaf)]);
        assert_eq!(stage.mouse(scene).and_then(|m| m.hovered()), None);
        assert!(stage.graph().departures.is_empty());
    }

    #[test]
    fn departures_of_dead_scenes_are_dropped() {
        let (mut stage, scene, ..) = build_stage();
        let other = stage.graph_mut().create_scene(1.0, 1.0);
        let lone = stage.graph_mut().create(NodeData::container());
        stage.graph_mut().set_root(other, lone).unwrap();
        stage.graph_mut().destroy_scene(other).unwrap();
        stage.pulse(scene).unwrap();
        assert!(stage.graph().departures.is_empty());
    }
}
