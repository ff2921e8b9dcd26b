//! Simulation helpers for tests and examples.
//!
//! Mechanisms here are plain shared values driven by actuation closures, so
//! control behavior is exercised without hardware: an instant servo snaps to
//! its target in one actuation, a ramp servo moves a bounded amount per
//! tick, and a scripted sensor replays a fixed reading sequence.

use crate::io::{MeasureFn, StateIo};
use std::cell::Cell;
use std::rc::Rc;

/// A shared scalar readable from measurement closures and writable from the
/// test body. Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct SharedValue(Rc<Cell<f64>>);

impl SharedValue {
    pub fn new(initial: f64) -> Self {
        Self(Rc::new(Cell::new(initial)))
    }

    pub fn get(&self) -> f64 {
        self.0.get()
    }

    pub fn set(&self, value: f64) {
        self.0.set(value);
    }

    /// A measurement closure reading this value.
    pub fn measure(&self) -> MeasureFn {
        let value = Rc::clone(&self.0);
        Box::new(move || value.get())
    }
}

/// IO for a mechanism that snaps to `target` on the first actuation.
pub fn instant_servo(position: &SharedValue, target: f64) -> StateIo {
    let pos = position.clone();
    StateIo::new(position.measure(), Box::new(move || pos.set(target)))
}

/// IO for a mechanism that moves toward `target` by at most `rate` per
/// actuation, reached within `tolerance`.
pub fn ramp_servo(position: &SharedValue, target: f64, rate: f64, tolerance: f64) -> StateIo {
    let pos = position.clone();
    let actuate = Box::new(move || {
        let current = pos.get();
        let delta = (target - current).clamp(-rate, rate);
        pos.set(current + delta);
    });
    StateIo::with_tolerance(position.measure(), actuate, tolerance)
}

/// A shared call counter for probing actuation and event delivery.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Rc<Cell<usize>>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }

    /// An actuation closure that only counts its invocations.
    pub fn actuate(&self) -> Box<dyn FnMut()> {
        let counter = self.clone();
        Box::new(move || counter.bump())
    }
}

/// A sensor replaying a fixed sequence of readings; the final reading
/// repeats once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedSensor {
    readings: Rc<Cell<usize>>,
    script: Rc<Vec<f64>>,
}

impl ScriptedSensor {
    pub fn new(script: impl Into<Vec<f64>>) -> Self {
        let script: Vec<f64> = script.into();
        assert!(!script.is_empty(), "scripted sensor needs at least one reading");
        Self {
            readings: Rc::new(Cell::new(0)),
            script: Rc::new(script),
        }
    }

    pub fn measure(&self) -> MeasureFn {
        let index = Rc::clone(&self.readings);
        let script = Rc::clone(&self.script);
        Box::new(move || {
            let i = index.get();
            let reading = script[i.min(script.len() - 1)];
            index.set(i + 1);
            reading
        })
    }
}
