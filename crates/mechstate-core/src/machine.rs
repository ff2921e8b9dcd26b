//! The per-mechanism controller: owns a current and a goal state, plans a
//! path between them, and advances one waypoint per tick once the current
//! waypoint has been physically reached.
//!
//! A machine never reads hardware itself; [`StateMachine::step`] is handed a
//! `reached` predicate by the engine, so the advancement logic stays testable
//! with plain closures.

use crate::graph::StateGraph;
use crate::id::StateId;
use crate::plan;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from machine configuration and goal assignment.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("machine '{machine}': goal state {state:?} is not bound to this machine")]
    GoalNotBound { machine: String, state: StateId },
}

// ---------------------------------------------------------------------------
// Step outcome
// ---------------------------------------------------------------------------

/// What a machine decided to do on one tick. The engine turns this into
/// actuation calls and diagnostic events; the machine itself only mutates
/// its own plan and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A stale plan was recomputed. No actuation this cycle.
    Planned {
        /// Number of states on the new plan, including the current one.
        path_len: usize,
    },
    /// Replanning found no route to the goal. The plan is empty; the next
    /// tick will retry. `first` is true only for the first failure since the
    /// goal was last changed, so the engine can log once rather than every
    /// cycle.
    NoPath { first: bool },
    /// Current state equals the goal: keep actuating to hold position.
    Hold { state: StateId },
    /// Mid-path and the current waypoint is not yet reached: keep driving it.
    Drive { state: StateId },
    /// The current waypoint was reached; the machine advanced one element.
    /// The newly current state is acted on next cycle, not this one.
    Advanced { from: StateId, to: StateId },
}

// ---------------------------------------------------------------------------
// StateMachine
// ---------------------------------------------------------------------------

/// A goal-directed controller for one mechanism.
///
/// Construction requires a default state, which becomes the initial current
/// and goal state — a machine with nothing to tick is unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachine {
    name: String,
    /// States this machine may legally target, in bind order.
    bound: Vec<StateId>,
    default_state: StateId,
    current: StateId,
    goal: StateId,
    /// The currently computed plan from current to goal. Empty when no plan
    /// exists (either never planned or goal unreachable).
    path: Vec<StateId>,
    /// Set once an unreachable goal has been reported; cleared when the goal
    /// changes or a plan is found.
    #[serde(skip)]
    unreachable_reported: bool,
}

impl StateMachine {
    /// Create a machine assuming `default_state` at startup.
    pub fn new(name: &str, default_state: StateId) -> Self {
        Self {
            name: name.to_string(),
            bound: vec![default_state],
            default_state,
            current: default_state,
            goal: default_state,
            path: Vec::new(),
            unreachable_reported: false,
        }
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Bind a state, making it a legal goal for this machine. Idempotent.
    pub fn bind(&mut self, state: StateId) {
        if !self.bound.contains(&state) {
            self.bound.push(state);
        }
    }

    /// Bind several states at once.
    pub fn bind_all(&mut self, states: impl IntoIterator<Item = StateId>) {
        for state in states {
            self.bind(state);
        }
    }

    /// Whether `state` is a legal goal for this machine.
    pub fn is_bound(&self, state: StateId) -> bool {
        self.bound.contains(&state)
    }

    /// The bound states in bind order.
    pub fn bound_states(&self) -> &[StateId] {
        &self.bound
    }

    // -----------------------------------------------------------------------
    // Goals
    // -----------------------------------------------------------------------

    /// Set the goal state. A goal outside the bound set is rejected and the
    /// prior goal is left intact.
    pub fn set_goal(&mut self, goal: StateId) -> Result<(), MachineError> {
        if !self.is_bound(goal) {
            return Err(MachineError::GoalNotBound {
                machine: self.name.clone(),
                state: goal,
            });
        }
        if goal != self.goal {
            self.goal = goal;
            self.unreachable_reported = false;
        }
        Ok(())
    }

    /// Reset the goal to the default state, abandoning any in-flight plan at
    /// the next replan check.
    pub fn reset_to_default(&mut self) {
        self.goal = self.default_state;
        self.unreachable_reported = false;
    }

    /// Replace the default state. Also binds it and resets the goal to it.
    pub fn set_default(&mut self, state: StateId) {
        self.bind(state);
        self.default_state = state;
        self.goal = state;
        self.unreachable_reported = false;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_state(&self) -> StateId {
        self.default_state
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    pub fn goal(&self) -> StateId {
        self.goal
    }

    /// The current plan from current to goal; empty if none exists.
    pub fn current_path(&self) -> &[StateId] {
        &self.path
    }

    /// Whether the machine currently occupies its goal state.
    pub fn at_goal(&self) -> bool {
        self.current == self.goal
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// A plan is stale when none exists, or when the recorded plan no longer
    /// leads to the goal while we are not already at it.
    pub fn needs_replan(&self) -> bool {
        self.path.is_empty() || (!self.path.contains(&self.goal) && self.current != self.goal)
    }

    /// Run one tick of the advancement logic.
    ///
    /// `reached` reports whether a state's mechanism target has been
    /// physically reached; it is only ever queried for the current state.
    /// Replanning consumes the whole tick: no actuation happens on a cycle
    /// that recomputes the plan, and advancement likewise defers actuation
    /// of the newly current state to the next cycle.
    pub fn step(
        &mut self,
        graph: &StateGraph,
        reached: &mut dyn FnMut(StateId) -> bool,
    ) -> StepOutcome {
        if self.needs_replan() {
            return match plan::shortest_path(graph, self.current, self.goal) {
                Some(path) => {
                    let path_len = path.len();
                    self.path = path;
                    self.unreachable_reported = false;
                    StepOutcome::Planned { path_len }
                }
                None => {
                    self.path.clear();
                    let first = !self.unreachable_reported;
                    self.unreachable_reported = true;
                    StepOutcome::NoPath { first }
                }
            };
        }

        if self.current == self.goal {
            return StepOutcome::Hold {
                state: self.current,
            };
        }

        if !reached(self.current) {
            return StepOutcome::Drive {
                state: self.current,
            };
        }

        // Waypoint reached: advance to the element after the current one.
        let next = self
            .path
            .iter()
            .position(|&s| s == self.current)
            .and_then(|idx| self.path.get(idx + 1))
            .copied();
        match next {
            Some(to) => {
                let from = self.current;
                self.current = to;
                StepOutcome::Advanced { from, to }
            }
            None => {
                // Current state fell off the plan; force a replan next tick.
                self.path.clear();
                StepOutcome::Drive {
                    state: self.current,
                }
            }
        }
    }
}
