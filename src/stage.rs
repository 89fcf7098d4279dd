//! Stage: the graph, its renderer and its input, driven together.
//!
//! [`Stage`] ties a [`SceneGraph`] to a [`RenderBackend`], a style resolver,
//! an [`EventDispatcher`] and the per-scene pointer and touch state. The
//! host calls [`Stage::process_input`] for raw input and [`Stage::pulse`]
//! once per frame.

use slotmap::SecondaryMap;

use crate::config::SceneConfig;
use crate::error::{ListenerError, Result};
use crate::event::handler::{Event, EventContext, EventDispatcher, EventTarget, EventType, HandlerId, Phase};
use crate::event::input::{InputEvent, Key, KeyEvent, Modifiers};
use crate::event::mouse::MouseState;
use crate::event::routing::Router;
use crate::event::touch::TouchTracker;
use crate::event::DispatchOutcome;
use crate::geometry::Point;
use crate::graph::{NodeData, NodeId, SceneGraph, SceneId};
use crate::pulse::backend::RenderBackend;
use crate::pulse::snapshot::PendingSnapshot;
use crate::scene::Camera;
use crate::style::{NoStyles, StyleResolver};

type PulseHook = Box<dyn FnMut(&SceneGraph, SceneId)>;

/// Pointer and touch state of one scene.
#[derive(Debug, Clone)]
pub(crate) struct InputState {
    pub mouse: MouseState,
    pub touch: TouchTracker,
}

impl InputState {
    fn new(touch_threshold: usize) -> Self {
        Self { mouse: MouseState::new(), touch: TouchTracker::new(touch_threshold) }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Owns a scene graph and everything that drives it.
pub struct Stage<B: RenderBackend> {
    pub(crate) graph: SceneGraph,
    pub(crate) backend: B,
    pub(crate) styles: Box<dyn StyleResolver>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) input: SecondaryMap<SceneId, InputState>,
    pub(crate) snapshots: SecondaryMap<SceneId, Vec<PendingSnapshot>>,
    pub(crate) hook: Option<PulseHook>,
}

impl<B: RenderBackend> Stage<B> {
    /// Create a stage with an empty graph bound to the calling thread.
    pub fn new(backend: B) -> Self {
        Self::with_graph(SceneGraph::new(), backend)
    }

    /// Create a stage with the given tunables.
    pub fn with_config(config: SceneConfig, backend: B) -> Self {
        Self::with_graph(SceneGraph::with_config(config), backend)
    }

    /// Drive an existing graph.
    pub fn with_graph(graph: SceneGraph, backend: B) -> Self {
        Self {
            graph,
            backend,
            styles: Box::new(NoStyles),
            dispatcher: EventDispatcher::new(),
            input: SecondaryMap::new(),
            snapshots: SecondaryMap::new(),
            hook: None,
        }
    }

    /// Replace the style resolver (builder).
    pub fn with_styles(mut self, styles: impl StyleResolver + 'static) -> Self {
        self.styles = Box::new(styles);
        self
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Register an event handler.
    pub fn add_handler<F>(&mut self, target: EventTarget, event_type: EventType, phase: Phase, handler: F) -> HandlerId
    where
        F: FnMut(&mut EventContext<'_>) -> std::result::Result<(), ListenerError> + 'static,
    {
        self.dispatcher.add_handler(target, event_type, phase, handler)
    }

    /// Called after every pulse, once focus has settled.
    pub fn set_pulse_hook(&mut self, hook: impl FnMut(&SceneGraph, SceneId) + 'static) {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_pulse_hook(&mut self) {
        self.hook = None;
    }

    pub fn mouse(&self, scene: SceneId) -> Option<&MouseState> {
        self.input.get(scene).map(|i| &i.mouse)
    }

    pub fn touch(&self, scene: SceneId) -> Option<&TouchTracker> {
        self.input.get(scene).map(|i| &i.touch)
    }

    /// The scene's stylesheet went away: reset every node to its initial
    /// properties and style again from the root on the next pulse.
    pub fn stylesheet_removed(&mut self, scene: SceneId) {
        self.graph.reset_styles(scene, self.styles.as_mut());
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Destroy a node and drop its handlers.
    pub fn destroy_node(&mut self, id: NodeId) -> Result<NodeData> {
        let data = self.graph.destroy(id)?;
        self.dispatcher.remove_target(EventTarget::Node(id));
        Ok(data)
    }

    /// Destroy a scene with its input state, handlers and deferred snapshots.
    pub fn destroy_scene(&mut self, scene: SceneId) -> Result<()> {
        self.graph.destroy_scene(scene)?;
        self.input.remove(scene);
        if let Some(pending) = self.snapshots.remove(scene) {
            log::debug!("dropping {} snapshot(s) of destroyed {scene:?}", pending.len());
        }
        self.dispatcher.remove_target(EventTarget::Scene(scene));
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    /// The node under `point`, in scene coordinates.
    pub fn pick(&mut self, scene: SceneId, point: Point) -> Option<NodeId> {
        match self.graph.scene(scene)?.camera() {
            Camera::Parallel => self.graph.pick(scene, point),
            Camera::Perspective { field_of_view } => self.backend.pick_ray(scene, point, field_of_view),
        }
    }

    /// Route one raw input event into `scene`.
    pub fn process_input(&mut self, scene: SceneId, event: InputEvent) -> Result<()> {
        self.graph.scene_mut(scene)?;
        self.graph.check_thread()?;
        match event {
            InputEvent::Key(key) => {
                self.process_key(scene, key);
                Ok(())
            }
            InputEvent::Pointer(pointer) => {
                let picked = self.pick(scene, pointer.position());
                let threshold = self.graph.config().touch_fast_path_threshold;
                let Some(entry) = self.input.entry(scene) else { return Ok(()) };
                let input = entry.or_insert_with(|| InputState::new(threshold));
                let mut router = Router { graph: &mut self.graph, dispatcher: &mut self.dispatcher, scene };
                input.mouse.handle(&mut router, &pointer, picked);
                Ok(())
            }
            InputEvent::Touch(touch) => {
                let picked: Vec<Option<NodeId>> =
                    touch.points.iter().map(|p| self.pick(scene, p.position())).collect();
                let threshold = self.graph.config().touch_fast_path_threshold;
                let Some(entry) = self.input.entry(scene) else { return Ok(()) };
                let input = entry.or_insert_with(|| InputState::new(threshold));
                let mut router = Router { graph: &mut self.graph, dispatcher: &mut self.dispatcher, scene };
                input.touch.handle(&mut router, &touch, &picked)
            }
            InputEvent::Resize { width, height } => self.graph.set_scene_size(scene, width, height),
        }
    }

    /// Keys go to the focus owner, or the scene when nothing has focus.
    /// An unconsumed Tab moves focus.
    fn process_key(&mut self, scene: SceneId, key: KeyEvent) -> DispatchOutcome {
        let target = self.graph.focus_owner(scene).map_or(EventTarget::Scene(scene), EventTarget::Node);
        let event = Event::new(EventType::KeyPressed, scene, target, Point::ZERO)
            .with_key(key)
            .with_modifiers(key.modifiers);
        let outcome = self.dispatcher.dispatch(&mut self.graph, &event);
        if !outcome.consumed {
            match key.code {
                Key::Tab if key.modifiers.contains(Modifiers::SHIFT) => {
                    self.graph.focus_previous(scene);
                }
                Key::Tab => {
                    self.graph.focus_next(scene);
                }
                Key::BackTab => {
                    self.graph.focus_previous(scene);
                }
                _ => {}
            }
        }
        outcome
    }
}

// ===========================================================================
// Tests
// ===========================================================================
