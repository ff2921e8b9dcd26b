//! Trigger bindings: edge-detected boolean inputs that request goals.
//!
//! A binding samples an externally supplied boolean closure once per tick
//! and queues an activate request on a rising edge (and optionally a second
//! state on the falling edge). A binding may be gated on another state
//! having been reached, so an operator input is ignored until a
//! prerequisite mechanism is in position.

use crate::goal_queue::GoalCommand;
use crate::id::StateId;

/// An externally supplied boolean input, sampled once per tick.
pub type TriggerFn = Box<dyn FnMut() -> bool>;

struct TriggerBinding {
    trigger: TriggerFn,
    /// State activated on the false -> true edge.
    on_rise: StateId,
    /// State activated on the true -> false edge, if any.
    on_fall: Option<StateId>,
    /// When set, edges are ignored unless this state is currently reached.
    gate: Option<StateId>,
    /// Last sampled value, for edge detection.
    last: bool,
}

impl std::fmt::Debug for TriggerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerBinding")
            .field("trigger", &"<fn>")
            .field("on_rise", &self.on_rise)
            .field("on_fall", &self.on_fall)
            .field("gate", &self.gate)
            .field("last", &self.last)
            .finish()
    }
}

/// The set of trigger bindings, polled once per tick in registration order.
#[derive(Debug, Default)]
pub struct TriggerBindings {
    bindings: Vec<TriggerBinding>,
}

impl TriggerBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a rising edge to a state activation.
    pub fn bind(&mut self, trigger: TriggerFn, on_rise: StateId) {
        self.bindings.push(TriggerBinding {
            trigger,
            on_rise,
            on_fall: None,
            gate: None,
            last: false,
        });
    }

    /// Bind a rising edge to one state and the falling edge to another.
    pub fn bind_dual(&mut self, trigger: TriggerFn, on_rise: StateId, on_fall: StateId) {
        self.bindings.push(TriggerBinding {
            trigger,
            on_rise,
            on_fall: Some(on_fall),
            gate: None,
            last: false,
        });
    }

    /// Bind a rising edge to a state activation, gated on `gate` being
    /// reached at the time of the edge.
    pub fn bind_when(&mut self, trigger: TriggerFn, gate: StateId, on_rise: StateId) {
        self.bindings.push(TriggerBinding {
            trigger,
            on_rise,
            on_fall: None,
            gate: Some(gate),
            last: false,
        });
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Sample every trigger once and collect the goal commands produced by
    /// edges this tick. `reached` reports whether a gate state is currently
    /// in position.
    pub fn poll(&mut self, reached: &mut dyn FnMut(StateId) -> bool) -> Vec<GoalCommand> {
        let mut commands = Vec::new();
        for binding in &mut self.bindings {
            let value = (binding.trigger)();
            let rising = value && !binding.last;
            let falling = !value && binding.last;
            binding.last = value;

            if let Some(gate) = binding.gate
                && !reached(gate)
            {
                continue;
            }
            if rising {
                commands.push(GoalCommand::Activate {
                    state: binding.on_rise,
                });
            } else if falling && let Some(state) = binding.on_fall {
                commands.push(GoalCommand::Activate { state });
            }
        }
        commands
    }
}
