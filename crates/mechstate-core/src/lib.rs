//! Mechstate Core -- a goal-directed state-machine engine for mechanism
//! control.
//!
//! Mechanisms are modeled as named states in a transition graph; each state
//! carries a scalar target and injected measurement/actuation closures. A
//! [`machine::StateMachine`] owns a current and a goal state, plans the
//! shortest transition path between them, and advances one waypoint per
//! tick, only once the current waypoint's target is physically reached.
//!
//! # Five-Phase Tick Pipeline
//!
//! Each call to [`engine::Engine::step`] runs one control cycle:
//!
//! 1. **Pre-tick** -- Apply queued goal commands (activations, resets).
//! 2. **Machines** -- Step every machine in registration order: replan if
//!    stale, advance if the current waypoint is reached, otherwise actuate
//!    the current state (or redirect to an unmet dependency).
//! 3. **Triggers** -- Sample trigger bindings; edges queue goal commands.
//! 4. **Post-tick** -- Deliver buffered events; reactive handlers may queue
//!    further goal commands.
//! 5. **Bookkeeping** -- Increment the tick counter.
//!
//! # Goal Mutation Pattern
//!
//! Goals are never changed mid-tick. Requests are queued and applied at the
//! next pre-tick:
//!
//! ```rust,ignore
//! engine.request_goal(closed);
//! engine.step(); // goal applied, machine plans
//! engine.step(); // machine drives or advances
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Graph, machines, IO, and the tick pipeline.
//! - [`graph::StateGraph`] -- Arena of named states with a symmetric
//!   transition relation and optional dependencies.
//! - [`machine::StateMachine`] -- Per-mechanism controller: goal, plan,
//!   one-waypoint-per-tick advancement.
//! - [`plan`] -- Exhaustive path enumeration and shortest-path selection.
//! - [`io::StateIo`] -- Injected measure/actuate closures plus a reach
//!   tolerance.
//! - [`bindings::TriggerBindings`] -- Edge-detected boolean inputs that
//!   request goals.
//! - [`event::EventBus`] -- Buffered diagnostic events with passive and
//!   reactive subscribers.
//! - [`topology`] -- JSON topology loading (feature `topology-loader`).

pub mod bindings;
pub mod engine;
pub mod event;
pub mod goal_queue;
pub mod graph;
pub mod id;
pub mod io;
pub mod machine;
pub mod plan;
pub mod query;
#[cfg(feature = "topology-loader")]
pub mod topology;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
