//! Queued goal commands.
//!
//! Goal changes are requested by trigger bindings, dependency redirects,
//! reactive event handlers, and host code, then applied at the start of the
//! next tick. Nothing mutates a machine's goal mid-tick, which keeps the
//! tick boundary the single synchronization point the concurrency model
//! promises.

use crate::id::{MachineId, StateId};

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single goal command waiting to be applied at the next tick boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalCommand {
    /// Make `state` the goal of whichever machine it is bound to.
    Activate { state: StateId },
    /// Set a specific machine's goal directly.
    SetGoal { machine: MachineId, state: StateId },
    /// Reset a machine's goal to its default state.
    ResetToDefault { machine: MachineId },
}

// ---------------------------------------------------------------------------
// GoalQueue
// ---------------------------------------------------------------------------

/// Commands pending application, with optional history for debugging.
#[derive(Debug, Default)]
pub struct GoalQueue {
    pending: Vec<GoalCommand>,
    /// Applied commands as (tick, command) pairs.
    history: Vec<(u64, GoalCommand)>,
    /// Maximum history entries retained. 0 = no history.
    max_history: usize,
}

impl GoalQueue {
    /// Create an empty queue with no history tracking.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue retaining up to `max_history` applied commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: Vec::new(),
            max_history,
        }
    }

    /// Queue a single command.
    pub fn push(&mut self, command: GoalCommand) {
        self.pending.push(command);
    }

    /// Queue several commands at once.
    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = GoalCommand>) {
        self.pending.extend(commands);
    }

    /// Drain all pending commands in submission order, recording them in
    /// history against the given tick.
    pub fn drain(&mut self, tick: u64) -> Vec<GoalCommand> {
        let commands: Vec<GoalCommand> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            for cmd in &commands {
                self.history.push((tick, *cmd));
            }
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    /// Number of commands waiting.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether no commands are waiting.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Applied (tick, command) history.
    pub fn history(&self) -> &[(u64, GoalCommand)] {
        &self.history
    }
}
