//! Typed diagnostic events with pre-allocated ring buffers.
//!
//! Events are emitted during the machine phase and delivered in batch during
//! post-tick. Each event kind has its own [`EventBuffer`] ring buffer with a
//! configurable capacity, so a misconfigured machine that reports every tick
//! cannot grow memory without bound.
//!
//! Two subscriber types:
//! - **Passive listeners**: read-only; dashboards, logging, test probes.
//! - **Reactive handlers**: return goal commands that are queued for the
//!   next tick, which is how event-driven goal changes stay inside the tick
//!   boundary.

use crate::goal_queue::GoalCommand;
use crate::id::{MachineId, StateId};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A control-engine event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // -- Goals --
    /// A machine's goal changed (via queue application).
    GoalChanged {
        machine: MachineId,
        goal: StateId,
        tick: u64,
    },
    /// A goal assignment was rejected. `machine` is `None` when an activate
    /// request named a state bound to no machine at all.
    GoalRejected {
        machine: Option<MachineId>,
        state: StateId,
        tick: u64,
    },

    // -- Planning --
    /// A machine computed a new plan.
    PathPlanned {
        machine: MachineId,
        from: StateId,
        to: StateId,
        path_len: usize,
        tick: u64,
    },
    /// Replanning found no route to the goal.
    GoalUnreachable {
        machine: MachineId,
        from: StateId,
        to: StateId,
        tick: u64,
    },

    // -- Advancement --
    /// A machine advanced one waypoint along its plan.
    WaypointReached {
        machine: MachineId,
        state: StateId,
        tick: u64,
    },
    /// A machine entered its goal state.
    GoalReached {
        machine: MachineId,
        state: StateId,
        tick: u64,
    },

    // -- Dependencies --
    /// An active state had an unmet dependency; effort was redirected by
    /// queueing a goal request for the dependency instead of actuating.
    DependencyRedirected {
        machine: MachineId,
        waiting: StateId,
        dependency: StateId,
        tick: u64,
    },
}

/// Discriminant tag for event types, used for suppression and subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GoalChanged,
    GoalRejected,
    PathPlanned,
    GoalUnreachable,
    WaypointReached,
    GoalReached,
    DependencyRedirected,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 7;

impl Event {
    /// Get the discriminant kind for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GoalChanged { .. } => EventKind::GoalChanged,
            Event::GoalRejected { .. } => EventKind::GoalRejected,
            Event::PathPlanned { .. } => EventKind::PathPlanned,
            Event::GoalUnreachable { .. } => EventKind::GoalUnreachable,
            Event::WaypointReached { .. } => EventKind::WaypointReached,
            Event::GoalReached { .. } => EventKind::GoalReached,
            Event::DependencyRedirected { .. } => EventKind::DependencyRedirected,
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer — pre-allocated ring buffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer for events; when full, the oldest events are
/// dropped.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<Event>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
}

impl EventBuffer {
    /// Create a ring buffer with the given capacity (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Push an event, dropping the oldest if full.
    pub fn push(&mut self, event: Event) {
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        let start = if self.len < self.capacity() {
            0
        } else {
            // head is the next write position, i.e. the oldest entry
            self.head
        };
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    /// Drop all buffered events.
    pub fn clear(&mut self) {
        for slot in &mut self.events {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// A reactive handler receives an event and returns zero or more goal
/// commands to queue for the next tick.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<GoalCommand>>;

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Passive(_) => write!(f, "Passive(<fn>)"),
            Subscriber::Reactive(_) => write!(f, "Reactive(<fn>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// The diagnostic event bus: one ring buffer per event kind, subscriber
/// lists, and suppression flags.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    /// Suppressed kinds are never buffered; zero cost.
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: [Vec<Subscriber>; EVENT_KIND_COUNT],
    /// Goal commands collected from reactive handlers during delivery.
    pending_commands: Vec<GoalCommand>,
    default_capacity: usize,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("pending_commands", &self.pending_commands)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    /// Create a bus with the given default per-kind buffer capacity.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: Default::default(),
            pending_commands: Vec::new(),
            default_capacity,
        }
    }

    /// Suppress an event kind. Suppressed events are never allocated or
    /// buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    /// Check whether an event kind is suppressed.
    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Emit an event into its ring buffer. No-op if the kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        // Lazily allocate the buffer on first emit.
        let buffer = self.buffers[idx].get_or_insert_with(|| EventBuffer::new(self.default_capacity));
        buffer.push(event);
    }

    /// Register a passive listener for an event kind. Listeners run in
    /// registration order during delivery.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) {
        self.subscribers[kind.index()].push(Subscriber::Passive(listener));
    }

    /// Register a reactive handler for an event kind.
    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) {
        self.subscribers[kind.index()].push(Subscriber::Reactive(handler));
    }

    /// Deliver all buffered events to subscribers, oldest first, then clear
    /// the buffers. Reactive handler commands accumulate in
    /// `pending_commands` until [`drain_commands`] is called.
    ///
    /// [`drain_commands`]: EventBus::drain_commands
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            if self.suppressed[idx] {
                continue;
            }
            let Some(buffer) = self.buffers[idx].as_ref() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }

            // Copy out to avoid borrowing the buffer across subscriber calls.
            let events: Vec<Event> = buffer.iter().copied().collect();

            for subscriber in &mut self.subscribers[idx] {
                for event in &events {
                    match subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_commands.extend(handler(event));
                        }
                    }
                }
            }

            if let Some(buffer) = self.buffers[idx].as_mut() {
                buffer.clear();
            }
        }
    }

    /// Drain goal commands collected from reactive handlers.
    pub fn drain_commands(&mut self) -> Vec<GoalCommand> {
        std::mem::take(&mut self.pending_commands)
    }

    /// Read the buffer for a kind (events not yet delivered).
    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }
}
