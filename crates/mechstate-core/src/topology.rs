//! JSON topology loader (feature `topology-loader`).
//!
//! Loads the declarative part of a configuration — states, transition
//! edges, dependencies, and machine definitions — from JSON. Hardware IO
//! cannot be described declaratively; the host attaches [`StateIo`]
//! closures after loading.
//!
//! ```json
//! {
//!   "states": [
//!     { "name": "open", "target": 0.0 },
//!     { "name": "mid", "target": 50.0 },
//!     { "name": "closed", "target": 100.0, "dependency": "latch_released" }
//!   ],
//!   "edges": [["open", "mid"], ["mid", "closed"]],
//!   "machines": [
//!     { "name": "door", "default": "open", "states": ["mid", "closed"] }
//!   ]
//! }
//! ```
//!
//! [`StateIo`]: crate::io::StateIo

use crate::graph::{GraphError, StateGraph};
use crate::machine::StateMachine;
use serde::Deserialize;

/// Errors from topology loading.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("topology parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("{context} references unknown state '{name}'")]
    UnknownState { context: String, name: String },
}

#[derive(Debug, Deserialize)]
struct TopologyFile {
    states: Vec<StateDef>,
    #[serde(default)]
    edges: Vec<(String, String)>,
    #[serde(default)]
    machines: Vec<MachineDef>,
}

#[derive(Debug, Deserialize)]
struct StateDef {
    name: String,
    target: f64,
    #[serde(default)]
    dependency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MachineDef {
    name: String,
    default: String,
    /// Additional bound states beyond the default.
    #[serde(default)]
    states: Vec<String>,
}

/// A loaded topology: the graph plus machines ready for
/// `Engine::add_machine`, in file order.
#[derive(Debug)]
pub struct Topology {
    pub graph: StateGraph,
    pub machines: Vec<StateMachine>,
}

impl Topology {
    /// Parse a topology from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        let file: TopologyFile = serde_json::from_str(json)?;

        let mut graph = StateGraph::new();
        for def in &file.states {
            graph.add_state(&def.name, def.target)?;
        }

        // Dependencies second, so forward references resolve.
        for def in &file.states {
            if let Some(dep_name) = &def.dependency {
                let state = graph.state_id(&def.name).expect("just inserted");
                let dep = graph.state_id(dep_name).ok_or_else(|| {
                    TopologyError::UnknownState {
                        context: format!("state '{}' dependency", def.name),
                        name: dep_name.clone(),
                    }
                })?;
                graph.set_dependency(state, dep)?;
            }
        }

        for (a, b) in &file.edges {
            let from = graph
                .state_id(a)
                .ok_or_else(|| TopologyError::UnknownState {
                    context: "edge".to_string(),
                    name: a.clone(),
                })?;
            let to = graph
                .state_id(b)
                .ok_or_else(|| TopologyError::UnknownState {
                    context: "edge".to_string(),
                    name: b.clone(),
                })?;
            graph.add_edge(from, to)?;
        }

        let mut machines = Vec::with_capacity(file.machines.len());
        for def in &file.machines {
            let default =
                graph
                    .state_id(&def.default)
                    .ok_or_else(|| TopologyError::UnknownState {
                        context: format!("machine '{}' default", def.name),
                        name: def.default.clone(),
                    })?;
            let mut machine = StateMachine::new(&def.name, default);
            for name in &def.states {
                let state = graph
                    .state_id(name)
                    .ok_or_else(|| TopologyError::UnknownState {
                        context: format!("machine '{}'", def.name),
                        name: name.clone(),
                    })?;
                machine.bind(state);
            }
            machines.push(machine);
        }

        Ok(Self { graph, machines })
    }
}
