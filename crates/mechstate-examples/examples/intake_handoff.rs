//! Intake handoff example: dependencies, triggers, and reactive handlers.
//!
//! Two mechanisms cooperate: an arm that must not extend until the wrist is
//! in its safe position (a state dependency), and a trigger binding that
//! requests the extension when a simulated operator button rises. A
//! reactive handler stows the arm again once it reports arrival.
//!
//! Run with: `cargo run -p mechstate-examples --example intake_handoff`

use mechstate_core::engine::Engine;
use mechstate_core::event::{Event, EventKind};
use mechstate_core::goal_queue::GoalCommand;
use mechstate_core::machine::StateMachine;
use mechstate_core::test_utils::{ramp_servo, SharedValue};

fn main() {
    tracing_subscriber::fmt::init();

    let mut engine = Engine::new();
    let graph = engine.graph_mut();
    let stow = graph.add_state("arm_stow", 0.0).unwrap();
    let extend = graph.add_state("arm_extend", 90.0).unwrap();
    let wrist_in = graph.add_state("wrist_in", 0.0).unwrap();
    let wrist_safe = graph.add_state("wrist_safe", 45.0).unwrap();
    graph.add_edge(stow, extend).unwrap();
    graph.add_edge(wrist_in, wrist_safe).unwrap();
    // The arm may not extend until the wrist has cleared to its safe angle.
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
    engine.add_machine(wrist).unwrap();
    engine.validate().expect("configuration error");

    // Operator button: a rising edge requests the extension.
    let button = SharedValue::new(0.0);
    let reader = button.clone();
    engine
        .bindings_mut()
        .bind(Box::new(move || reader.get() > 0.5), extend);

    // Once the arm reports arrival at extend, stow it again.
    engine.events_mut().on_reactive(
        EventKind::GoalReached,
        Box::new(move |event| match event {
            Event::GoalReached { machine, state, .. }
                if *machine == arm_id && *state == extend =>
            {
                println!("  -> arm extended; stowing");
                vec![GoalCommand::Activate { state: stow }]
            }
            _ => Vec::new(),
        }),
    );
    engine.events_mut().on_passive(
        EventKind::DependencyRedirected,
        Box::new(|event| {
            if let Event::DependencyRedirected { tick, .. } = event {
                println!("  -> tick {tick}: arm waiting on wrist; redirecting");
            }
        }),
    );

    // Press the button on tick 2.
    for tick in 0..30 {
        if tick == 2 {
            button.set(1.0);
        }
        engine.step();
        println!(
            "tick {tick:>2}: arm={:>5.1} wrist={:>5.1}",
            arm_pos.get(),
            wrist_pos.get(),
        );
    }

    println!("final: arm={} wrist={}", arm_pos.get(), wrist_pos.get());
}
