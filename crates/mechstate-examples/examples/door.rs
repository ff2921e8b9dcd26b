//! Door example: a three-state mechanism driven to a goal through a
//! waypoint.
//!
//! Builds a door with states open(0) - mid(50) - closed(100) on a simulated
//! rate-limited servo, requests `closed`, and ticks the engine while
//! printing a snapshot each cycle. The machine passes through `mid` and
//! advances only once each waypoint's position is physically reached.
//!
//! Run with: `cargo run -p mechstate-examples --example door`

use mechstate_core::engine::Engine;
use mechstate_core::event::{Event, EventKind};
use mechstate_core::machine::StateMachine;
use mechstate_core::test_utils::{ramp_servo, SharedValue};

fn main() {
    tracing_subscriber::fmt::init();

    let mut engine = Engine::new();
    let open = engine.graph_mut().add_state("open", 0.0).unwrap();
    let mid = engine.graph_mut().add_state("mid", 50.0).unwrap();
    let closed = engine.graph_mut().add_state("closed", 100.0).unwrap();
    engine.graph_mut().add_edge(open, mid).unwrap();
    engine.graph_mut().add_edge(mid, closed).unwrap();

    // One simulated servo position shared by all three states; each state
    // drives it toward its own target at 20 units per tick.
    let position = SharedValue::new(0.0);
    for &state in &[open, mid, closed] {
        let target = engine.graph().target(state).unwrap();
        engine
            .attach_io(state, ramp_servo(&position, target, 20.0, 0.5))
            .unwrap();
    }

    let mut door = StateMachine::new("door", open);
    door.bind_all([mid, closed]);
    let door_id = engine.add_machine(door).unwrap();
    engine.validate().expect("configuration error");

    // Print arrivals as they happen.
    engine.events_mut().on_passive(
        EventKind::GoalReached,
        Box::new(|event| {
            if let Event::GoalReached { tick, .. } = event {
                println!("  -> goal reached at tick {tick}");
            }
        }),
    );

    engine.request_goal(closed);
    for _ in 0..10 {
        engine.step();
        let snap = engine.snapshot();
        let door = &snap.machines[0];
        println!(
            "tick {:>2}: current={:<6} goal={:<6} position={:>5.1}",
            snap.tick,
            door.current,
            door.goal,
            position.get(),
        );
    }

    let door = engine.machine(door_id).unwrap();
    assert!(door.at_goal());
    println!("door closed; final position {}", position.get());
}
