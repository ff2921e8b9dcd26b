//! Startup configuration checks.
//!
//! Called once after assembly and before the control loop. Anything caught
//! here would otherwise surface as a silent stall at runtime (a bound state
//! without IO never reports reached, so its machine drives it forever).

use crate::graph::StateGraph;
use crate::id::{MachineId, StateId};
use crate::io::StateIo;
use crate::machine::StateMachine;
use slotmap::{SecondaryMap, SlotMap};

/// Configuration errors found by [`validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The dependency relation contains a cycle; the named states would
    /// deadlock waiting on each other.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),
    /// A machine binds a state that does not exist in the graph.
    #[error("machine '{machine}' binds a state that is not in the graph")]
    UnknownBoundState { machine: String, state: StateId },
    /// A bound state has no attached measurement/actuation IO.
    #[error("state '{state}' (machine '{machine}') has no attached IO")]
    MissingIo { machine: String, state: String },
}

/// Validate the assembled configuration. Returns the first problem found.
pub fn validate(
    graph: &StateGraph,
    io: &SecondaryMap<StateId, StateIo>,
    machines: &SlotMap<MachineId, StateMachine>,
) -> Result<(), ConfigError> {
    if let Some(cycle) = graph.find_dependency_cycle() {
        let names = cycle.iter().map(|&id| graph.name(id).to_string()).collect();
        return Err(ConfigError::DependencyCycle(names));
    }

    for (_, machine) in machines.iter() {
        for &state in machine.bound_states() {
            if !graph.contains(state) {
                return Err(ConfigError::UnknownBoundState {
                    machine: machine.name().to_string(),
                    state,
                });
            }
            if !io.contains_key(state) {
                return Err(ConfigError::MissingIo {
                    machine: machine.name().to_string(),
                    state: graph.name(state).to_string(),
                });
            }
        }
    }

    Ok(())
}
