//! Integration tests for gilt-scene.
//!
//! These tests exercise the public API from outside the crate: structural
//! mutation, bounds, the pulse, input routing and snapshots working together.

use std::cell::RefCell;
use std::rc::Rc;

use gilt_scene::event::{EventTarget, EventType, InputEvent, Phase, PointerAction, PointerEvent};
use gilt_scene::testing::{reference_bounds, tree_to_string, BackendCall, ForeignThread, RecordingBackend};
use gilt_scene::{
    Bounds, ErrorKind, NodeData, NodeId, RuleStyles, SceneError, SceneGraph, SceneId, Sizing, SnapshotParams,
    Stage,
};
use pretty_assertions::assert_eq;

fn leaf(x: f64, y: f64, w: f64, h: f64) -> NodeData {
    NodeData::leaf(Bounds::from_rect(x, y, w, h))
}

// ---------------------------------------------------------------------------
// Structure and bounds
// ---------------------------------------------------------------------------

#[test]
fn test_bounds_follow_children_and_visibility() {
    let mut graph = SceneGraph::new();
    let parent = graph.create(NodeData::container());
    assert!(graph.bounds_in_local(parent).is_empty());

    let first = graph.create_child(parent, NodeData::leaf(Bounds::new_2d(0.0, 0.0, 10.0, 10.0))).unwrap();
    assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 10.0, 10.0));

    let second = graph.create_child(parent, NodeData::leaf(Bounds::new_2d(5.0, 5.0, 20.0, 20.0))).unwrap();
    assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 20.0, 20.0));
    let edges = graph.extremal_children(parent).unwrap();
    assert_eq!((edges.max_x, edges.max_y), (Some(second), Some(second)));

    graph.set_visible(second, false).unwrap();
    assert_eq!(graph.bounds_in_local(parent), Bounds::new_2d(0.0, 0.0, 10.0, 10.0));
    let edges = graph.extremal_children(parent).unwrap();
    assert_eq!((edges.max_x, edges.max_y), (Some(first), Some(first)));
    assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));
}

#[test]
fn test_incremental_bounds_match_full_rescan() {
    let mut graph = SceneGraph::new();
    let parent = graph.create(NodeData::container());
    let mut children = Vec::new();
    for i in 0..15 {
        let f = f64::from(i);
        children.push(graph.create_child(parent, leaf(f * 3.0, 20.0 - f, 4.0, 2.0 + f)).unwrap());
    }
    assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));

    graph.relocate(children[14], -5.0, 0.0).unwrap();
    graph.set_visible(children[0], false).unwrap();
    graph.remove_child(parent, children[7]).unwrap();
    graph.set_content(children[3], Bounds::from_rect(0.0, -40.0, 1.0, 1.0)).unwrap();
    assert_eq!(graph.bounds_in_local(parent), reference_bounds(&graph, parent));
}

#[test]
fn test_cycle_is_rejected_and_tree_unchanged() {
    let mut graph = SceneGraph::new();
    let root = graph.create(NodeData::container());
    let middle = graph.create_child(root, NodeData::container()).unwrap();
    let bottom = graph.create_child(middle, NodeData::container()).unwrap();
    let before = tree_to_string(&mut graph, root);

    let err = graph.add_child(bottom, root).unwrap_err();
    assert!(matches!(err, SceneError::Cycle { .. }));
    assert_eq!(err.kind(), ErrorKind::Structural);
    assert_eq!(graph.parent(root), None);
    assert!(graph.children(bottom).is_empty());
    assert_eq!(tree_to_string(&mut graph, root), before);
}

#[test]
fn test_tree_dump() {
    let mut graph = SceneGraph::new();
    let root = graph.create(NodeData::container().with_id("root"));
    let row = graph.create_child(root, NodeData::container().with_class("row").at(2.0, 1.0)).unwrap();
    graph.create_child(row, leaf(0.0, 0.0, 3.0, 1.0)).unwrap();
    graph.create_child(row, leaf(0.0, 0.0, 2.0, 2.0).at(4.0, 0.0)).unwrap();
    graph.create_child(root, leaf(0.0, 0.0, 1.0, 1.0).visible(false)).unwrap();
    insta::assert_snapshot!(tree_to_string(&mut graph, root), @r"
    Container #root [2,1 6x2]
      Container .row [2,1 6x2]
        Leaf [0,0 3x1]
        Leaf [4,0 2x2]
      Leaf [0,0 1x1] hidden
    ");
}

// ---------------------------------------------------------------------------
// Pulse
// ---------------------------------------------------------------------------

#[test]
fn test_pulse_runs_styles_layout_sync_and_focus_before_hook() {
    let mut stage = Stage::new(RecordingBackend::new()).with_styles(RuleStyles::new().rule(".hot", &[("color", "red")]));
    let graph = stage.graph_mut();
    let scene = graph.create_scene(30.0, 10.0);
    let root = graph.create(NodeData::container());
    let button = graph
        .create_child(
            root,
            NodeData::leaf(Bounds::EMPTY)
                .resizable(Sizing::new(1.0, 1.0).with_pref(6.0, 2.0))
                .with_class("hot")
                .focusable(true),
        )
        .unwrap();
    graph.set_root(scene, root).unwrap();

    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    stage.set_pulse_hook(move |graph, s| {
        let color = graph.computed_style(button).and_then(|c| c.get("color")).map(str::to_owned);
        let size = graph.get(button).and_then(|n| n.sizing()).map(|z| (z.width, z.height));
        *sink.borrow_mut() = Some((color, size, graph.needs_sync(s), graph.focus_owner(s)));
    });

    let report = stage.pulse(scene).unwrap();
    assert!(report.css_ran);
    assert!(report.full_sync);
    assert_eq!(
        *seen.borrow(),
        Some((Some("red".to_string()), Some((6.0, 2.0)), false, Some(button)))
    );
}

#[test]
fn test_incremental_sync_after_full_sync() {
    let mut stage = Stage::new(RecordingBackend::new());
    let graph = stage.graph_mut();
    let scene = graph.create_scene(10.0, 10.0);
    let root = graph.create(NodeData::container());
    let a = graph.create_child(root, leaf(0.0, 0.0, 1.0, 1.0)).unwrap();
    let b = graph.create_child(root, leaf(0.0, 0.0, 1.0, 1.0)).unwrap();
    graph.set_root(scene, root).unwrap();
    stage.pulse(scene).unwrap();
    stage.backend_mut().clear();

    stage.graph_mut().relocate(b, 4.0, 4.0).unwrap();
    let report = stage.pulse(scene).unwrap();
    assert!(!report.full_sync);
    assert!(stage.backend().updated().contains(&b));
    assert!(!stage.backend().updated().contains(&a));

    stage.backend_mut().clear();
    stage.destroy_node(a).unwrap();
    stage.pulse(scene).unwrap();
    assert_eq!(stage.backend().destroyed(), vec![a]);
    assert!(stage.backend().calls().iter().any(|c| matches!(
        c,
        BackendCall::SetChildren { parent, .. } if *parent == root
    )));
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// ```text
///     root
///      |
///      b
///    /   \
///   a     c
/// ```
fn build_pointer_stage() -> (Stage<RecordingBackend>, SceneId, [NodeId; 4]) {
    let mut stage = Stage::new(RecordingBackend::new());
    let graph = stage.graph_mut();
    let scene = graph.create_scene(40.0, 10.0);
    let root = graph.create(NodeData::container());
    let b = graph.create_child(root, NodeData::container()).unwrap();
    let a = graph.create_child(b, leaf(0.0, 0.0, 10.0, 10.0)).unwrap();
    let c = graph.create_child(b, leaf(0.0, 0.0, 10.0, 10.0).at(20.0, 0.0)).unwrap();
    graph.set_root(scene, root).unwrap();
    stage.pulse(scene).unwrap();
    (stage, scene, [root, a, b, c])
}

type Log = Rc<RefCell<Vec<(EventType, EventTarget)>>>;

fn watch_enter_exit(stage: &mut Stage<RecordingBackend>, targets: &[EventTarget]) -> Log {
    let log: Log = Rc::default();
    for &target in targets {
        for event_type in [EventType::MouseEntered, EventType::MouseExited] {
            let sink = Rc::clone(&log);
            stage.add_handler(target, event_type, Phase::Bubble, move |cx| {
                sink.borrow_mut().push((cx.event.event_type, cx.current_target()));
                Ok(())
            });
        }
    }
    log
}

fn move_to(stage: &mut Stage<RecordingBackend>, scene: SceneId, x: f64) {
    stage
        .process_input(scene, InputEvent::Pointer(PointerEvent::new(PointerAction::Moved, x, 5.0)))
        .unwrap();
}

#[test]
fn test_enter_exit_keeps_common_ancestors() {
    let (mut stage, scene, [root, a, b, c]) = build_pointer_stage();
    let [root_t, a_t, b_t, c_t] = [root, a, b, c].map(EventTarget::Node);
    let log = watch_enter_exit(&mut stage, &[root_t, a_t, b_t, c_t, EventTarget::Scene(scene)]);

    move_to(&mut stage, scene, 5.0);
    assert_eq!(
        log.borrow_mut().drain(..).collect::<Vec<_>>(),
        vec![
            (EventType::MouseEntered, EventTarget::Scene(scene)),
            (EventType::MouseEntered, root_t),
            (EventType::MouseEntered, b_t),
            (EventType::MouseEntered, a_t),
        ]
    );

    move_to(&mut stage, scene, 25.0);
    assert_eq!(
        *log.borrow(),
        vec![(EventType::MouseExited, a_t), (EventType::MouseEntered, c_t)]
    );
}

#[test]
fn test_detached_hover_target_gets_exit_on_next_pulse() {
    let (mut stage, scene, [_root, a, b, _c]) = build_pointer_stage();
    let log = watch_enter_exit(&mut stage, &[EventTarget::Node(a)]);
    move_to(&mut stage, scene, 5.0);
    log.borrow_mut().clear();

    stage.graph_mut().remove_child(b, a).unwrap();
    stage.pulse(scene).unwrap();
    assert_eq!(*log.borrow(), vec![(EventType::MouseExited, EventTarget::Node(a))]);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn test_async_snapshot_resolves_on_pulse() {
    let (mut stage, scene, [_root, _a, b, _c]) = build_pointer_stage();
    let rx = stage.snapshot_async(b, SnapshotParams::new().with_fill(0x00ff_00ff)).unwrap();
    stage.pulse(scene).unwrap();
    let image = tokio_test::block_on(rx).unwrap().unwrap();
    assert_eq!((image.width, image.height), (30, 10));
    assert_eq!(&image.data[..4], &[0x00, 0xff, 0x00, 0xff]);
}

// ---------------------------------------------------------------------------
// Thread affinity
// ---------------------------------------------------------------------------

#[test]
fn test_window_attached_scene_rejects_foreign_mutation() {
    let mut graph = SceneGraph::new().with_context(ForeignThread);
    let scene = graph.create_scene(10.0, 10.0);
    let root = graph.create(NodeData::container());
    let child = graph.create_child(root, leaf(0.0, 0.0, 1.0, 1.0)).unwrap();
    graph.set_root(scene, root).unwrap();
    graph.attach_window(scene, true).unwrap();

    let err = graph.set_visible(child, false).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Affinity);
    assert!(graph.get(child).unwrap().is_visible());

    // Detached trees can still be built anywhere.
    let spare = graph.create(NodeData::container());
    assert!(graph.create_child(spare, leaf(0.0, 0.0, 1.0, 1.0)).is_ok());
}
