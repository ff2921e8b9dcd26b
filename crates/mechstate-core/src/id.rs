use slotmap::new_key_type;

new_key_type! {
    /// Identifies a state (node) in the state graph.
    pub struct StateId;

    /// Identifies a state machine registered with the engine.
    pub struct MachineId;
}
