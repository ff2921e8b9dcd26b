//! Injected hardware capabilities for a state.
//!
//! A state does not know how to read its mechanism or how to drive it; both
//! capabilities are injected as closures when the state is wired up. Vendor-
//! or simulation-specific behavior lives entirely in the closures, never in
//! state variants.

/// Reads the mechanism's current measured value. Called once per tick while
/// the owning state is active; must be side-effect-free and fast.
pub type MeasureFn = Box<dyn FnMut() -> f64>;

/// Drives the mechanism toward the state's target. Called at most once per
/// tick per active state; must be safe to call redundantly while holding.
pub type ActuateFn = Box<dyn FnMut()>;

/// The measurement source and actuation sink bound to one state, plus the
/// tolerance used to decide whether the state's target has been reached.
pub struct StateIo {
    pub(crate) measure: MeasureFn,
    pub(crate) actuate: ActuateFn,
    pub(crate) tolerance: f64,
}

impl StateIo {
    /// Create a new IO binding with exact-match reach detection
    /// (tolerance 0.0).
    pub fn new(measure: MeasureFn, actuate: ActuateFn) -> Self {
        Self {
            measure,
            actuate,
            tolerance: 0.0,
        }
    }

    /// Create a new IO binding that considers the target reached when the
    /// measured value is within `tolerance` of it. Recommended whenever the
    /// measurement comes from a real encoder.
    pub fn with_tolerance(measure: MeasureFn, actuate: ActuateFn, tolerance: f64) -> Self {
        Self {
            measure,
            actuate,
            tolerance: tolerance.abs(),
        }
    }

    /// The configured reach tolerance.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Whether `measured` counts as having reached `target` under this
    /// binding's tolerance.
    pub fn is_reached(&self, measured: f64, target: f64) -> bool {
        (measured - target).abs() <= self.tolerance
    }
}

impl std::fmt::Debug for StateIo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateIo")
            .field("measure", &"<fn>")
            .field("actuate", &"<fn>")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}
