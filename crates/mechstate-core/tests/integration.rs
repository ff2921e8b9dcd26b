//! Integration tests for the mechstate control engine.
//!
//! These tests exercise end-to-end behavior across the full tick pipeline:
//! goal requests, planning, waypoint advancement, dependency gating across
//! machines, trigger bindings, reactive handlers, and topology loading.

use mechstate_core::engine::Engine;
use mechstate_core::event::{Event, EventKind};
use mechstate_core::id::{MachineId, StateId};
use mechstate_core::machine::StateMachine;
use mechstate_core::test_utils::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Door mechanism on ramp servos: open(0) - mid(50) - closed(100), moving
/// at most 25 units per tick, reached within 0.5.
fn door_engine() -> (Engine, SharedValue, MachineId, [StateId; 3]) {
    let mut engine = Engine::new();
    let open = engine.graph_mut().add_state("open", 0.0).unwrap();
    let mid = engine.graph_mut().add_state("mid", 50.0).unwrap();
    let closed = engine.graph_mut().add_state("closed", 100.0).unwrap();
    engine.graph_mut().add_edge(open, mid).unwrap();
    engine.graph_mut().add_edge(mid, closed).unwrap();

    let position = SharedValue::new(0.0);
    for &state in &[open, mid, closed] {
        let target = engine.graph().target(state).unwrap();
        engine
            .attach_io(state, ramp_servo(&position, target, 25.0, 0.5))
            .unwrap();
    }

    let mut machine = StateMachine::new("door", open);
    machine.bind_all([mid, closed]);
    let id = engine.add_machine(machine).unwrap();
    engine.validate().unwrap();
    (engine, position, id, [open, mid, closed])
}

// ===========================================================================
// Test 1: Door end-to-end
// ===========================================================================
//
// Request closed from open; the machine must pass through mid, advancing
// only when each waypoint's target is physically reached, and then hold.

#[test]
fn door_closes_through_mid() {
    let (mut engine, position, id, [open, mid, closed]) = door_engine();

    let waypoints: Rc<RefCell<Vec<StateId>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&waypoints);
    engine.events_mut().on_passive(
        EventKind::WaypointReached,
        Box::new(move |event| {
            if let Event::WaypointReached { state, .. } = event {
                sink.borrow_mut().push(*state);
            }
        }),
    );
    let arrivals: Rc<RefCell<Vec<StateId>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&arrivals);
    engine.events_mut().on_passive(
        EventKind::GoalReached,
        Box::new(move |event| {
            if let Event::GoalReached { state, .. } = event {
                sink.borrow_mut().push(*state);
            }
        }),
    );

    engine.request_goal(closed);
    for _ in 0..12 {
        engine.step();
    }

    let machine = engine.machine(id).unwrap();
    assert_eq!(machine.current(), closed);
    assert!(machine.at_goal());
    assert_eq!(position.get(), 100.0);

    // Waypoints were reached in path order, never skipped.
    assert_eq!(*waypoints.borrow(), vec![open, mid]);
    assert_eq!(*arrivals.borrow(), vec![closed]);
}

// ===========================================================================
// Test 2: Holding actuates, advancement does not
// ===========================================================================
//
// While holding at the goal the mechanism keeps being driven; a disturbance
// is corrected without any goal change.

#[test]
fn holding_corrects_disturbance() {
    let (mut engine, position, id, [.., closed]) = door_engine();

    engine.request_goal(closed);
    for _ in 0..12 {
        engine.step();
    }
    assert_eq!(position.get(), 100.0);

    // Knock the door off its target while the machine holds.
    position.set(80.0);
    for _ in 0..3 {
        engine.step();
    }
    assert_eq!(position.get(), 100.0);
    assert!(engine.machine(id).unwrap().at_goal());
}

// ===========================================================================
// Test 3: Goal change mid-travel replans from the current waypoint
// ===========================================================================

#[test]
fn mid_travel_goal_change_turns_around() {
    let (mut engine, position, id, [open, mid, closed]) = door_engine();

    engine.request_goal(closed);
    // Tick until the machine occupies mid, partway through the plan.
    for _ in 0..5 {
        engine.step();
        if engine.machine(id).unwrap().current() == mid {
            break;
        }
    }
    assert_eq!(engine.machine(id).unwrap().current(), mid);

    // The recorded plan still contains the goal, so the machine finishes
    // walking it to closed, replans from there, and comes back through mid.
    engine.request_goal(open);
    for _ in 0..20 {
        engine.step();
    }

    let machine = engine.machine(id).unwrap();
    assert_eq!(machine.current(), open);
    assert!(machine.at_goal());
    assert_eq!(position.get(), 0.0);
}

// ===========================================================================
// Test 4: Several requests in one tick — the last one wins
// ===========================================================================

#[test]
fn last_queued_goal_wins() {
    let (mut engine, _, id, [_, mid, closed]) = door_engine();

    engine.request_goal(mid);
    engine.request_goal(closed);
    engine.step();

    assert_eq!(engine.machine(id).unwrap().goal(), closed);
}

// ===========================================================================
// Test 5: Unreachable goal keeps retrying and recovers when an edge appears
// ===========================================================================

#[test]
fn unreachable_goal_recovers_after_edge_added() {
    let mut engine = Engine::new();
    let a = engine.graph_mut().add_state("a", 0.0).unwrap();
    let b = engine.graph_mut().add_state("b", 10.0).unwrap();

    let position = SharedValue::new(0.0);
    engine
        .attach_io(a, ramp_servo(&position, 0.0, 5.0, 0.1))
        .unwrap();
    engine
        .attach_io(b, ramp_servo(&position, 10.0, 5.0, 0.1))
        .unwrap();

    let mut machine = StateMachine::new("m", a);
    machine.bind(b);
    let id = engine.add_machine(machine).unwrap();
    engine.validate().unwrap();

    let unreachable = CallCounter::new();
    let probe = unreachable.clone();
    engine
        .events_mut()
        .on_passive(EventKind::GoalUnreachable, Box::new(move |_| probe.bump()));

    engine.request_goal(b);
    for _ in 0..3 {
        engine.step();
    }
    // No edge between a and b: every replan attempt fails.
    assert!(unreachable.count() >= 2);
    assert_eq!(engine.machine(id).unwrap().current(), a);

    // Wire the edge in; the standing goal now succeeds.
    engine.graph_mut().add_edge(a, b).unwrap();
    for _ in 0..6 {
        engine.step();
    }
    assert_eq!(engine.machine(id).unwrap().current(), b);
    assert_eq!(position.get(), 10.0);
}

// ===========================================================================
// Test 6: Cross-machine dependency handoff
// ===========================================================================
//
// The arm may not extend until the wrist reaches its safe position. The arm
// machine must not actuate the extend state early; instead the engine
// redirects effort by targeting the wrist's safe state, and the arm follows
// once the wrist is in position.

#[test]
fn arm_waits_for_wrist() {
    let mut engine = Engine::new();
    let graph = engine.graph_mut();
    let stow = graph.add_state("arm_stow", 0.0).unwrap();
    let extend = graph.add_state("arm_extend", 90.0).unwrap();
    let wrist_in = graph.add_state("wrist_in", 0.0).unwrap();
    let wrist_safe = graph.add_state("wrist_safe", 45.0).unwrap();
    graph.add_edge(stow, extend).unwrap();
    graph.add_edge(wrist_in, wrist_safe).unwrap();
    graph.set_dependency(extend, wrist_safe).unwrap();

    let arm_pos = SharedValue::new(0.0);
    let wrist_pos = SharedValue::new(0.0);
    engine
        .attach_io(stow, ramp_servo(&arm_pos, 0.0, 30.0, 0.5))
        .unwrap();
    engine
        .attach_io(extend, ramp_servo(&arm_pos, 90.0, 30.0, 0.5))
        .unwrap();
    engine
        .attach_io(wrist_in, ramp_servo(&wrist_pos, 0.0, 15.0, 0.5))
        .unwrap();
    engine
        .attach_io(wrist_safe, ramp_servo(&wrist_pos, 45.0, 15.0, 0.5))
        .unwrap();

    let mut arm = StateMachine::new("arm", stow);
    arm.bind(extend);
    let arm_id = engine.add_machine(arm).unwrap();
    let mut wrist = StateMachine::new("wrist", wrist_in);
    wrist.bind(wrist_safe);
    let wrist_id = engine.add_machine(wrist).unwrap();
    engine.validate().unwrap();

    engine.request_machine_goal(arm_id, extend);
    for _ in 0..24 {
        engine.step();
        // Invariant: the arm never moves while the wrist is short of safe.
        if wrist_pos.get() < 44.5 {
            assert_eq!(arm_pos.get(), 0.0, "arm actuated before wrist was safe");
        }
    }

    assert_eq!(engine.machine(wrist_id).unwrap().goal(), wrist_safe);
    assert_eq!(wrist_pos.get(), 45.0);
    assert_eq!(arm_pos.get(), 90.0);
    assert!(engine.machine(arm_id).unwrap().at_goal());
}

// ===========================================================================
// Test 7: Gated trigger binding
// ===========================================================================
//
// An operator button closes the door, but only once the latch has released.

#[test]
fn gated_trigger_waits_for_prerequisite() {
    let (mut engine, _, id, [_, _, closed]) = door_engine();
    let latch_pos = SharedValue::new(0.0);
    let released = engine.graph_mut().add_state("latch_released", 1.0).unwrap();
    engine
        .attach_io(released, ramp_servo(&latch_pos, 1.0, 1.0, 0.1))
        .unwrap();

    let button = SharedValue::new(0.0);
    let reader = button.clone();
    engine
        .bindings_mut()
        .bind_when(Box::new(move || reader.get() > 0.5), released, closed);

    // Button pressed while the latch is engaged: the edge is dropped.
    button.set(1.0);
    for _ in 0..3 {
        engine.step();
    }
    assert_ne!(engine.machine(id).unwrap().goal(), closed);

    // Release the latch, release and re-press the button.
    latch_pos.set(1.0);
    button.set(0.0);
    engine.step();
    button.set(1.0);
    engine.step(); // edge sampled, command queued
    engine.step(); // command applied
    assert_eq!(engine.machine(id).unwrap().goal(), closed);
}

// ===========================================================================
// Test 8: Reactive handler chains machines
// ===========================================================================
//
// When the door reaches closed, a reactive handler targets the latch. The
// handler's command applies on the tick after delivery.

#[test]
fn reactive_handler_chains_goals() {
    let (mut engine, _, door_id, [_, _, closed]) = door_engine();

    let latch_pos = SharedValue::new(0.0);
    let latch_open = engine.graph_mut().add_state("latch_open", 0.0).unwrap();
    let latch_shut = engine.graph_mut().add_state("latch_shut", 1.0).unwrap();
    engine.graph_mut().add_edge(latch_open, latch_shut).unwrap();
    engine
        .attach_io(latch_open, ramp_servo(&latch_pos, 0.0, 1.0, 0.1))
        .unwrap();
    engine
        .attach_io(latch_shut, ramp_servo(&latch_pos, 1.0, 1.0, 0.1))
        .unwrap();
    let mut latch = StateMachine::new("latch", latch_open);
    latch.bind(latch_shut);
    let latch_id = engine.add_machine(latch).unwrap();
    engine.validate().unwrap();

    engine.events_mut().on_reactive(
        EventKind::GoalReached,
        Box::new(move |event| match event {
            Event::GoalReached { machine, state, .. }
                if *machine == door_id && *state == closed =>
            {
                vec![mechstate_core::goal_queue::GoalCommand::SetGoal {
                    machine: latch_id,
                    state: latch_shut,
                }]
            }
            _ => Vec::new(),
        }),
    );

    engine.request_goal(closed);
    for _ in 0..16 {
        engine.step();
    }

    assert!(engine.machine(door_id).unwrap().at_goal());
    assert_eq!(engine.machine(latch_id).unwrap().current(), latch_shut);
    assert_eq!(latch_pos.get(), 1.0);
}

// ===========================================================================
// Test 9: Queued reset returns the machine to its default state
// ===========================================================================

#[test]
fn queued_reset_returns_to_default() {
    let (mut engine, position, id, [open, _, closed]) = door_engine();

    engine.request_goal(closed);
    for _ in 0..12 {
        engine.step();
    }
    assert_eq!(engine.measure(closed), Some(100.0));

    let goal_changes = CallCounter::new();
    let probe = goal_changes.clone();
    engine
        .events_mut()
        .on_passive(EventKind::GoalChanged, Box::new(move |_| probe.bump()));

    engine.request_reset(id);
    for _ in 0..20 {
        engine.step();
    }

    let door = engine.machine(id).unwrap();
    assert_eq!(door.goal(), open);
    assert!(door.at_goal());
    assert_eq!(position.get(), 0.0);
    // Exactly one goal change: the reset itself.
    assert_eq!(goal_changes.count(), 1);
}

// ===========================================================================
// Test 10: A blocked dependency stays observable while it never converges
// ===========================================================================
//
// The wrist machine already targets its safe position but the mechanism is
// stuck, so the arm can never proceed. The engine must keep reporting the
// redirect every blocked tick rather than going silent after the first one.

#[test]
fn blocked_dependency_keeps_reporting() {
    let mut engine = Engine::new();
    let graph = engine.graph_mut();
    let stow = graph.add_state("arm_stow", 0.0).unwrap();
    let extend = graph.add_state("arm_extend", 90.0).unwrap();
    let wrist_in = graph.add_state("wrist_in", 0.0).unwrap();
    let wrist_safe = graph.add_state("wrist_safe", 45.0).unwrap();
    graph.add_edge(stow, extend).unwrap();
    graph.add_edge(wrist_in, wrist_safe).unwrap();
    graph.set_dependency(extend, wrist_safe).unwrap();

    let arm_pos = SharedValue::new(0.0);
    engine
        .attach_io(stow, ramp_servo(&arm_pos, 0.0, 30.0, 0.5))
        .unwrap();
    engine
        .attach_io(extend, ramp_servo(&arm_pos, 90.0, 30.0, 0.5))
        .unwrap();
    // The wrist mechanism is stuck: its measurement never moves no matter
    // how often it is driven.
    let stuck = SharedValue::new(0.0);
    let wrist_drive = CallCounter::new();
    engine
        .attach_io(wrist_in, mechstate_core::io::StateIo::new(stuck.measure(), wrist_drive.actuate()))
        .unwrap();
    engine
        .attach_io(
            wrist_safe,
            mechstate_core::io::StateIo::new(stuck.measure(), wrist_drive.actuate()),
        )
        .unwrap();

    let mut arm = StateMachine::new("arm", stow);
    arm.bind(extend);
    let arm_id = engine.add_machine(arm).unwrap();
    let mut wrist = StateMachine::new("wrist", wrist_in);
    wrist.bind(wrist_safe);
    let wrist_id = engine.add_machine(wrist).unwrap();
    engine.validate().unwrap();

    let redirects = CallCounter::new();
    let probe = redirects.clone();
    engine.events_mut().on_passive(
        EventKind::DependencyRedirected,
        Box::new(move |_| probe.bump()),
    );

    engine.request_machine_goal(arm_id, extend);
    for _ in 0..16 {
        engine.step();
    }

    // The wrist adopted the redirect goal but never converges; the arm
    // stays put and the redirect keeps being reported each blocked tick.
    assert_eq!(engine.machine(wrist_id).unwrap().goal(), wrist_safe);
    assert_eq!(arm_pos.get(), 0.0);
    assert!(redirects.count() >= 10, "redirects: {}", redirects.count());
}

// ===========================================================================
// Test 11: Snapshots carry names in tick order
// ===========================================================================

#[test]
fn snapshot_reflects_machines() {
    let (mut engine, _, _, [_, _, closed]) = door_engine();
    engine.request_goal(closed);
    engine.step(); // goal applied, plan computed

    let snap = engine.snapshot();
    assert_eq!(snap.tick, 1);
    assert_eq!(snap.machines.len(), 1);
    let door = &snap.machines[0];
    assert_eq!(door.machine, "door");
    assert_eq!(door.current, "open");
    assert_eq!(door.goal, "closed");
    assert_eq!(door.path, vec!["open", "mid", "closed"]);
    assert!(!door.at_goal);
}

// ===========================================================================
// Test 12: Topology loading end-to-end
// ===========================================================================

#[test]
fn loaded_topology_drives_like_hand_built() {
    use mechstate_core::topology::Topology;

    let topo = Topology::from_json(
        r#"{
            "states": [
                { "name": "open", "target": 0.0 },
                { "name": "mid", "target": 50.0 },
                { "name": "closed", "target": 100.0 }
            ],
            "edges": [["open", "mid"], ["mid", "closed"]],
            "machines": [
                { "name": "door", "default": "open", "states": ["mid", "closed"] }
            ]
        }"#,
    )
    .unwrap();

    let mut engine = Engine::new();
    *engine.graph_mut() = topo.graph;
    let position = SharedValue::new(0.0);
    let ids: Vec<StateId> = engine.graph().states().map(|(id, _)| id).collect();
    for state in ids {
        let target = engine.graph().target(state).unwrap();
        engine
            .attach_io(state, ramp_servo(&position, target, 25.0, 0.5))
            .unwrap();
    }
    let mut machine_ids = Vec::new();
    for machine in topo.machines {
        machine_ids.push(engine.add_machine(machine).unwrap());
    }
    engine.validate().unwrap();

    let closed = engine.graph().state_id("closed").unwrap();
    engine.request_goal(closed);
    for _ in 0..12 {
        engine.step();
    }
    assert_eq!(engine.machine(machine_ids[0]).unwrap().current(), closed);
    assert_eq!(position.get(), 100.0);
}
