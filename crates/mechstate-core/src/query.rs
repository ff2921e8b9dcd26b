//! Read-only telemetry snapshots.
//!
//! Snapshots carry state names rather than IDs so they serialize into
//! something a dashboard or log line can show directly.

use crate::graph::StateGraph;
use crate::id::MachineId;
use crate::machine::StateMachine;
use serde::Serialize;

/// A point-in-time view of one machine.
#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    pub machine: String,
    pub current: String,
    pub goal: String,
    pub default: String,
    /// The remaining plan as state names; empty when no plan exists.
    pub path: Vec<String>,
    pub at_goal: bool,
}

impl MachineSnapshot {
    pub fn capture(graph: &StateGraph, machine: &StateMachine) -> Self {
        Self {
            machine: machine.name().to_string(),
            current: graph.name(machine.current()).to_string(),
            goal: graph.name(machine.goal()).to_string(),
            default: graph.name(machine.default_state()).to_string(),
            path: machine
                .current_path()
                .iter()
                .map(|&id| graph.name(id).to_string())
                .collect(),
            at_goal: machine.at_goal(),
        }
    }
}

/// A point-in-time view of the whole engine, machines in tick order.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub tick: u64,
    pub machines: Vec<MachineSnapshot>,
}

impl EngineSnapshot {
    pub fn capture<'a>(
        tick: u64,
        graph: &StateGraph,
        machines: impl Iterator<Item = (MachineId, &'a StateMachine)>,
    ) -> Self {
        Self {
            tick,
            machines: machines
                .map(|(_, m)| MachineSnapshot::capture(graph, m))
                .collect(),
        }
    }
}
