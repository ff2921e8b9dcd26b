//! The control engine: owns the state graph, the injected hardware IO, the
//! machines, and the tick pipeline.
//!
//! One [`Engine::step`] call runs five phases in a fixed order:
//!
//! 1. **Pre-tick** — drain the goal queue and apply queued goal commands.
//! 2. **Machines** — step every machine in registration order; actuate the
//!    active state or redirect to an unmet dependency.
//! 3. **Triggers** — sample trigger bindings; edges queue goal commands for
//!    the next tick.
//! 4. **Post-tick** — deliver buffered events; reactive handler commands are
//!    queued for the next tick.
//! 5. **Bookkeeping** — advance the tick counter.
//!
//! Goal mutations only ever enter through the queue, so mid-tick requests
//! (from triggers, reactive handlers, or dependency redirects) cannot change
//! a machine's goal while the machine phase is iterating.

use crate::bindings::TriggerBindings;
use crate::event::{Event, EventBus};
use crate::goal_queue::{GoalCommand, GoalQueue};
use crate::graph::{GraphError, StateGraph};
use crate::id::{MachineId, StateId};
use crate::io::StateIo;
use crate::machine::{MachineError, StateMachine, StepOutcome};
use crate::query::EngineSnapshot;
use crate::validation::{self, ConfigError};
use slotmap::{SecondaryMap, SlotMap};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from engine assembly.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error("state '{state}' is already bound to machine '{machine}'")]
    StateAlreadyBound { state: String, machine: String },
    #[error("machine not found: {0:?}")]
    MachineNotFound(MachineId),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The single-threaded control engine. All construction happens before the
/// control loop; [`Engine::validate`] checks the wiring, and
/// [`Engine::step`] is then called once per control cycle.
pub struct Engine {
    graph: StateGraph,
    /// Injected measurement/actuation per state. A bound state without IO is
    /// a configuration error caught by [`Engine::validate`].
    io: SecondaryMap<StateId, StateIo>,
    machines: SlotMap<MachineId, StateMachine>,
    /// Machines tick in registration order.
    machine_order: Vec<MachineId>,
    /// Reverse index: which machine owns each bound state.
    bound_machine: SecondaryMap<StateId, MachineId>,
    goal_queue: GoalQueue,
    bindings: TriggerBindings,
    event_bus: EventBus,
    tick: u64,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("states", &self.graph.state_count())
            .field("machines", &self.machine_order.len())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            graph: StateGraph::new(),
            io: SecondaryMap::new(),
            machines: SlotMap::with_key(),
            machine_order: Vec::new(),
            bound_machine: SecondaryMap::new(),
            goal_queue: GoalQueue::new(),
            bindings: TriggerBindings::new(),
            event_bus: EventBus::default(),
            tick: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Assembly
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    /// Mutable graph access for assembly (states, edges, dependencies).
    pub fn graph_mut(&mut self) -> &mut StateGraph {
        &mut self.graph
    }

    /// Attach the measurement source and actuation sink for a state.
    /// Replaces any previous IO for that state.
    pub fn attach_io(&mut self, state: StateId, io: StateIo) -> Result<(), EngineError> {
        if !self.graph.contains(state) {
            return Err(GraphError::StateNotFound(state).into());
        }
        self.io.insert(state, io);
        Ok(())
    }

    /// Register a machine. Its bound states must exist in the graph and must
    /// not be bound to any other machine. Machines tick in the order they
    /// are added.
    pub fn add_machine(&mut self, machine: StateMachine) -> Result<MachineId, EngineError> {
        for &state in machine.bound_states() {
            if !self.graph.contains(state) {
                return Err(GraphError::StateNotFound(state).into());
            }
            if let Some(&owner) = self.bound_machine.get(state) {
                return Err(EngineError::StateAlreadyBound {
                    state: self.graph.name(state).to_string(),
                    machine: self.machines[owner].name().to_string(),
                });
            }
        }
        let bound: Vec<StateId> = machine.bound_states().to_vec();
        let id = self.machines.insert(machine);
        for state in bound {
            self.bound_machine.insert(state, id);
        }
        self.machine_order.push(id);
        Ok(id)
    }

    /// Bind an additional state to an already-registered machine.
    pub fn bind(&mut self, machine_id: MachineId, state: StateId) -> Result<(), EngineError> {
        if !self.graph.contains(state) {
            return Err(GraphError::StateNotFound(state).into());
        }
        if let Some(&owner) = self.bound_machine.get(state)
            && owner != machine_id
        {
            return Err(EngineError::StateAlreadyBound {
                state: self.graph.name(state).to_string(),
                machine: self.machines[owner].name().to_string(),
            });
        }
        let machine = self
            .machines
            .get_mut(machine_id)
            .ok_or(EngineError::MachineNotFound(machine_id))?;
        machine.bind(state);
        self.bound_machine.insert(state, machine_id);
        Ok(())
    }

    /// Check the full configuration before entering the control loop:
    /// dependency cycles, bound states missing from the graph, and bound
    /// states without attached IO.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate(&self.graph, &self.io, &self.machines)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn machine(&self, id: MachineId) -> Option<&StateMachine> {
        self.machines.get(id)
    }

    /// Look up a machine by name.
    pub fn machine_id(&self, name: &str) -> Option<MachineId> {
        self.machines
            .iter()
            .find(|(_, m)| m.name() == name)
            .map(|(id, _)| id)
    }

    /// The machine a state is bound to, if any.
    pub fn machine_of(&self, state: StateId) -> Option<MachineId> {
        self.bound_machine.get(state).copied()
    }

    /// Registered machines in tick order.
    pub fn machines(&self) -> impl Iterator<Item = (MachineId, &StateMachine)> {
        self.machine_order
            .iter()
            .filter_map(|&id| self.machines.get(id).map(|m| (id, m)))
    }

    pub fn events(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.event_bus
    }

    pub fn bindings_mut(&mut self) -> &mut TriggerBindings {
        &mut self.bindings
    }

    /// Completed tick count.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Capture a serializable snapshot of every machine, in tick order.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot::capture(self.tick, &self.graph, self.machines())
    }

    /// Read a state's mechanism measurement through its attached IO.
    pub fn measure(&mut self, state: StateId) -> Option<f64> {
        self.io.get_mut(state).map(|io| (io.measure)())
    }

    /// Whether a state's mechanism target is currently reached. A state
    /// without IO is never reached.
    pub fn reached(&mut self, state: StateId) -> bool {
        is_reached(&self.graph, &mut self.io, state)
    }

    // -----------------------------------------------------------------------
    // Goal requests (queued; applied at the next tick boundary)
    // -----------------------------------------------------------------------

    /// Request activation of a state: the machine it is bound to will adopt
    /// it as a goal at the next pre-tick.
    pub fn request_goal(&mut self, state: StateId) {
        self.goal_queue.push(GoalCommand::Activate { state });
    }

    /// Request a specific machine adopt a goal at the next pre-tick.
    pub fn request_machine_goal(&mut self, machine: MachineId, state: StateId) {
        self.goal_queue.push(GoalCommand::SetGoal { machine, state });
    }

    /// Request a machine return to its default state at the next pre-tick.
    pub fn request_reset(&mut self, machine: MachineId) {
        self.goal_queue.push(GoalCommand::ResetToDefault { machine });
    }

    // -----------------------------------------------------------------------
    // Tick pipeline
    // -----------------------------------------------------------------------

    /// Run one control cycle.
    pub fn step(&mut self) {
        // Phase 1: apply queued goal commands.
        for command in self.goal_queue.drain(self.tick) {
            self.apply_command(command);
        }

        // Phase 2: machines.
        self.run_machines();

        // Phase 3: triggers.
        self.poll_triggers();

        // Phase 4: deliver events; reactive commands queue for next tick.
        self.event_bus.deliver();
        let reactive = self.event_bus.drain_commands();
        self.goal_queue.push_batch(reactive);

        // Phase 5: bookkeeping.
        self.tick += 1;
    }

    fn apply_command(&mut self, command: GoalCommand) {
        let tick = self.tick;
        match command {
            GoalCommand::Activate { state } => {
                let Some(&machine_id) = self.bound_machine.get(state) else {
                    tracing::warn!(
                        state = self.graph.name(state),
                        "activate request for a state bound to no machine"
                    );
                    self.event_bus.emit(Event::GoalRejected {
                        machine: None,
                        state,
                        tick,
                    });
                    return;
                };
                self.set_machine_goal(machine_id, state);
            }
            GoalCommand::SetGoal { machine, state } => {
                self.set_machine_goal(machine, state);
            }
            GoalCommand::ResetToDefault { machine } => {
                if let Some(m) = self.machines.get_mut(machine) {
                    let before = m.goal();
                    m.reset_to_default();
                    if m.goal() != before {
                        let goal = m.goal();
                        self.event_bus.emit(Event::GoalChanged { machine, goal, tick });
                    }
                }
            }
        }
    }

    fn set_machine_goal(&mut self, machine_id: MachineId, state: StateId) {
        let tick = self.tick;
        let Some(machine) = self.machines.get_mut(machine_id) else {
            tracing::warn!(?machine_id, "goal request for an unknown machine");
            return;
        };
        let before = machine.goal();
        match machine.set_goal(state) {
            Ok(()) => {
                if machine.goal() != before {
                    self.event_bus.emit(Event::GoalChanged {
                        machine: machine_id,
                        goal: state,
                        tick,
                    });
                }
            }
            Err(err) => {
                tracing::warn!(
                    machine = machine.name(),
                    state = self.graph.name(state),
                    error = %err,
                    "goal rejected"
                );
                self.event_bus.emit(Event::GoalRejected {
                    machine: Some(machine_id),
                    state,
                    tick,
                });
            }
        }
    }

    fn run_machines(&mut self) {
        let Engine {
            graph,
            io,
            machines,
            machine_order,
            bound_machine,
            goal_queue,
            event_bus,
            tick,
            ..
        } = self;
        let tick = *tick;

        for &machine_id in machine_order.iter() {
            let (outcome, current, goal) = {
                let Some(machine) = machines.get_mut(machine_id) else {
                    continue;
                };
                let outcome = machine.step(graph, &mut |s| is_reached(graph, io, s));
                if let StepOutcome::NoPath { first: true } = outcome {
                    tracing::warn!(
                        machine = machine.name(),
                        from = graph.name(machine.current()),
                        to = graph.name(machine.goal()),
                        "no path to goal; retrying each tick"
                    );
                }
                (outcome, machine.current(), machine.goal())
            };

            match outcome {
                StepOutcome::Planned { path_len } => {
                    event_bus.emit(Event::PathPlanned {
                        machine: machine_id,
                        from: current,
                        to: goal,
                        path_len,
                        tick,
                    });
                }
                StepOutcome::NoPath { .. } => {
                    event_bus.emit(Event::GoalUnreachable {
                        machine: machine_id,
                        from: current,
                        to: goal,
                        tick,
                    });
                }
                StepOutcome::Hold { state } | StepOutcome::Drive { state } => {
                    if let Some(dep) = graph.dependency(state)
                        && !is_reached(graph, io, dep)
                    {
                        // Unmet dependency: do not actuate; redirect effort
                        // by queueing the dependency as a goal, unless its
                        // machine is already targeting it. The event repeats
                        // every blocked tick, so a dependency that never
                        // converges stays observable.
                        let already_targeted = bound_machine
                            .get(dep)
                            .and_then(|&owner| machines.get(owner))
                            .is_some_and(|m| m.goal() == dep);
                        if !already_targeted {
                            goal_queue.push(GoalCommand::Activate { state: dep });
                        }
                        event_bus.emit(Event::DependencyRedirected {
                            machine: machine_id,
                            waiting: state,
                            dependency: dep,
                            tick,
                        });
                    } else if let Some(state_io) = io.get_mut(state) {
                        (state_io.actuate)();
                    }
                }
                StepOutcome::Advanced { from, to } => {
                    event_bus.emit(Event::WaypointReached {
                        machine: machine_id,
                        state: from,
                        tick,
                    });
                    if to == goal {
                        event_bus.emit(Event::GoalReached {
                            machine: machine_id,
                            state: to,
                            tick,
                        });
                    }
                }
            }
        }
    }

    fn poll_triggers(&mut self) {
        let Engine {
            graph,
            io,
            bindings,
            goal_queue,
            ..
        } = self;
        let commands = bindings.poll(&mut |s| is_reached(graph, io, s));
        goal_queue.push_batch(commands);
    }
}

/// Whether `state`'s target is reached under its attached IO. A state with
/// no IO or no graph entry is never reached.
fn is_reached(
    graph: &StateGraph,
    io: &mut SecondaryMap<StateId, StateIo>,
    state: StateId,
) -> bool {
    match (io.get_mut(state), graph.target(state)) {
        (Some(state_io), Some(target)) => {
            let measured = (state_io.measure)();
            state_io.is_reached(measured, target)
        }
        _ => false,
    }
}
