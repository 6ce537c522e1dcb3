//! Steppers
//!
//! A stepper turns runner progress into a value. Easing steppers take the
//! normalized position; controllers take the raw frame delta and decide for
//! themselves when they have converged.

use crate::easing::Easing;
use std::rc::Rc;

/// Per-value state kept for a controller between frames
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControllerState {
    pub velocity: f32,
    pub done: bool,
}

/// A declarative, time-driven stepper
pub trait Controller {
    /// Advance `current` toward `target` by `dt` milliseconds
    ///
    /// `dt` may be infinite, which must land exactly on `target`.
    fn step(&self, current: f32, target: f32, dt: f64, state: &mut ControllerState) -> f32;

    fn done(&self, state: &ControllerState) -> bool {
        state.done
    }

    /// Nominal duration used for chaining, if the controller has one
    fn duration(&self) -> Option<f64> {
        None
    }
}

/// How a runner's queue entries turn progress into values
#[derive(Clone)]
pub enum Stepper {
    Ease(Easing),
    Controller(Rc<dyn Controller>),
}

impl Stepper {
    pub fn is_declarative(&self) -> bool {
        matches!(self, Stepper::Controller(_))
    }
}

impl Default for Stepper {
    fn default() -> Self {
        Stepper::Ease(Easing::default())
    }
}

impl From<Easing> for Stepper {
    fn from(easing: Easing) -> Self {
        Stepper::Ease(easing)
    }
}

impl std::fmt::Debug for Stepper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stepper::Ease(easing) => f.debug_tuple("Ease").field(easing).finish(),
            Stepper::Controller(_) => f.write_str("Controller(..)"),
        }
    }
}
