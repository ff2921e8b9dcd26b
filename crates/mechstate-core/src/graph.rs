//! The state graph: an arena of named states with a symmetric adjacency
//! relation and optional inter-state dependencies.
//!
//! States are stored in a `SlotMap` and referenced everywhere by [`StateId`],
//! so dependency edges are indices into an explicit table rather than live
//! references. That makes dependency cycles detectable at configuration time,
//! before the control loop starts.
//!
//! Adjacency is stored in a `SecondaryMap` keyed by `StateId`, with both a
//! `targets` and an `origins` list per state. [`StateGraph::add_edge`] keeps
//! the relation symmetric by construction: the graph is logically undirected
//! even though planning walks only the `targets` lists.

use crate::id::StateId;
use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while assembling the state graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate state name: '{0}'")]
    DuplicateName(String),
    #[error("state not found: {0:?}")]
    StateNotFound(StateId),
    #[error("state '{0}' cannot have an edge to itself")]
    SelfEdge(String),
    #[error("state '{0}' cannot depend on itself")]
    SelfDependency(String),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Per-state data stored in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateData {
    /// Unique name, used for telemetry and diagnostics.
    pub name: String,
    /// Scalar value the bound mechanism aims for while this state is active.
    pub target: f64,
    /// Optional prerequisite: this state may not actuate until the
    /// dependency state reports reached.
    pub dependency: Option<StateId>,
}

/// Adjacency lists for a single state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StateAdjacency {
    /// States this state may transition to.
    targets: Vec<StateId>,
    /// States that may transition to this state.
    origins: Vec<StateId>,
}

// ---------------------------------------------------------------------------
// StateGraph
// ---------------------------------------------------------------------------

/// The set of states and their transition relation. Assembled once at
/// startup through in-process construction calls; no removal path exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateGraph {
    states: SlotMap<StateId, StateData>,
    adjacency: SecondaryMap<StateId, StateAdjacency>,
    name_to_id: HashMap<String, StateId>,
}

impl StateGraph {
    /// Create a new, empty state graph.
    pub fn new() -> Self {
        Self {
            states: SlotMap::with_key(),
            adjacency: SecondaryMap::new(),
            name_to_id: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Add a state. Names are identity: a duplicate name is rejected eagerly
    /// rather than silently aliasing an existing state.
    pub fn add_state(&mut self, name: &str, target: f64) -> Result<StateId, GraphError> {
        if self.name_to_id.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        let id = self.states.insert(StateData {
            name: name.to_string(),
            target,
            dependency: None,
        });
        self.adjacency.insert(id, StateAdjacency::default());
        self.name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Establish a bidirectional transition edge between two states.
    ///
    /// After this call each state appears in the other's `targets` and
    /// `origins` lists, so the edge may be walked in either direction during
    /// planning. Idempotent: re-adding an existing edge is a no-op and never
    /// produces a duplicate entry. Self-edges are rejected, so a mistaken or
    /// aliased ID cannot install a silent self-loop.
    pub fn add_edge(&mut self, a: StateId, b: StateId) -> Result<(), GraphError> {
        if !self.states.contains_key(a) {
            return Err(GraphError::StateNotFound(a));
        }
        if !self.states.contains_key(b) {
            return Err(GraphError::StateNotFound(b));
        }
        if a == b {
            return Err(GraphError::SelfEdge(self.name(a).to_string()));
        }
        Self::link(&mut self.adjacency, a, b);
        Self::link(&mut self.adjacency, b, a);
        Ok(())
    }

    /// Record `to` as a target of `from` and `from` as an origin of `to`,
    /// skipping entries that already exist.
    fn link(adjacency: &mut SecondaryMap<StateId, StateAdjacency>, from: StateId, to: StateId) {
        if let Some(adj) = adjacency.get_mut(from)
            && !adj.targets.contains(&to)
        {
            adj.targets.push(to);
        }
        if let Some(adj) = adjacency.get_mut(to)
            && !adj.origins.contains(&from)
        {
            adj.origins.push(from);
        }
    }

    /// Declare `to` reachable from `from`. Alias of [`add_edge`]; provided
    /// so graph assembly can read in either direction.
    ///
    /// [`add_edge`]: StateGraph::add_edge
    pub fn add_target(&mut self, from: StateId, to: StateId) -> Result<(), GraphError> {
        self.add_edge(from, to)
    }

    /// Declare `from` an origin of `to`. The reverse spelling of
    /// [`add_target`]; the symmetric edge it creates is identical.
    ///
    /// [`add_target`]: StateGraph::add_target
    pub fn add_origin(&mut self, to: StateId, from: StateId) -> Result<(), GraphError> {
        self.add_edge(from, to)
    }

    /// Set (overwriting any previous value) the dependency of `state`:
    /// `state` may not actuate until `on` reports reached. A state has at
    /// most one dependency.
    pub fn set_dependency(&mut self, state: StateId, on: StateId) -> Result<(), GraphError> {
        if state == on {
            let name = self
                .states
                .get(state)
                .map(|s| s.name.clone())
                .unwrap_or_default();
            return Err(GraphError::SelfDependency(name));
        }
        if !self.states.contains_key(on) {
            return Err(GraphError::StateNotFound(on));
        }
        let data = self
            .states
            .get_mut(state)
            .ok_or(GraphError::StateNotFound(state))?;
        data.dependency = Some(on);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Get the state data for a given ID.
    pub fn state(&self, id: StateId) -> Option<&StateData> {
        self.states.get(id)
    }

    /// Look up a state by its unique name.
    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.name_to_id.get(name).copied()
    }

    /// The state's name, or `"<unknown>"` for a stale ID. Diagnostics only.
    pub fn name(&self, id: StateId) -> &str {
        self.states.get(id).map(|s| s.name.as_str()).unwrap_or("<unknown>")
    }

    /// The state's target value.
    pub fn target(&self, id: StateId) -> Option<f64> {
        self.states.get(id).map(|s| s.target)
    }

    /// The state's dependency, if any.
    pub fn dependency(&self, id: StateId) -> Option<StateId> {
        self.states.get(id).and_then(|s| s.dependency)
    }

    /// States this state may transition to, in edge-insertion order.
    /// Planning iterates this list, so insertion order is the deterministic
    /// tie-break among equal-length paths.
    pub fn targets_of(&self, id: StateId) -> &[StateId] {
        self.adjacency
            .get(id)
            .map(|adj| adj.targets.as_slice())
            .unwrap_or(&[])
    }

    /// States that may transition to this state.
    pub fn origins_of(&self, id: StateId) -> &[StateId] {
        self.adjacency
            .get(id)
            .map(|adj| adj.origins.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `from` may transition directly to `to`.
    pub fn has_target(&self, from: StateId, to: StateId) -> bool {
        self.targets_of(from).contains(&to)
    }

    /// Whether `from` is recorded as an origin of `to`.
    pub fn has_origin(&self, to: StateId, from: StateId) -> bool {
        self.origins_of(to).contains(&from)
    }

    /// Total number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Returns true if the state exists.
    pub fn contains(&self, id: StateId) -> bool {
        self.states.contains_key(id)
    }

    /// Iterate over all state IDs and their data.
    pub fn states(&self) -> impl Iterator<Item = (StateId, &StateData)> {
        self.states.iter()
    }

    // -----------------------------------------------------------------------
    // Dependency cycle detection
    // -----------------------------------------------------------------------

    /// Find a dependency cycle, if one exists.
    ///
    /// Each state has at most one dependency, so the dependency relation is a
    /// set of chains; a cycle is a chain that revisits a state. Returns the
    /// states on the first cycle found, starting at its entry point.
    pub fn find_dependency_cycle(&self) -> Option<Vec<StateId>> {
        for (start, _) in self.states.iter() {
            let mut walked: Vec<StateId> = Vec::new();
            let mut cursor = Some(start);
            while let Some(id) = cursor {
                if let Some(pos) = walked.iter().position(|&w| w == id) {
                    return Some(walked[pos..].to_vec());
                }
                walked.push(id);
                cursor = self.dependency(id);
            }
        }
        None
    }
}
