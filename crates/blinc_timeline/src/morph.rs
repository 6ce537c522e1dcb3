//! Scalar morphing
//!
//! A [`Morpher`] interpolates one value from `from` to `to` through a
//! [`Stepper`]. Easing steppers are fed a normalized position, controllers
//! are fed the frame delta in milliseconds.

use crate::stepper::{ControllerState, Stepper};

/// Interpolates a single animated value
#[derive(Clone, Debug)]
pub struct Morpher {
    from: f32,
    to: f32,
    stepper: Stepper,
    state: ControllerState,
    current: f32,
    /// Eased fraction of the last position fed to an easing stepper
    eased: f32,
}

impl Morpher {
    pub fn new(stepper: Stepper) -> Self {
        Self {
            from: 0.0,
            to: 0.0,
            stepper,
            state: ControllerState::default(),
            current: 0.0,
            eased: 0.0,
        }
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    /// Last value produced
    pub fn value(&self) -> f32 {
        self.current
    }

    /// Set the start value, also making it the current value
    ///
    /// Controller state (velocity) is kept so a declarative morph can re-read
    /// the live value every frame.
    pub fn set_from(&mut self, from: f32) {
        self.from = from;
        self.current = from;
        self.eased = 0.0;
    }

    pub fn set_to(&mut self, to: f32) {
        self.to = to;
        self.state.done = false;
    }

    /// Value at an eased position in `[0, 1]`, or after `dt` ms of a controller
    pub fn at(&mut self, position_or_dt: f64) -> f32 {
        match &self.stepper {
            Stepper::Ease(easing) => {
                let position = position_or_dt.clamp(0.0, 1.0) as f32;
                self.eased = easing.apply(position);
                self.current = self.from + (self.to - self.from) * self.eased;
            }
            Stepper::Controller(controller) => {
                self.current = controller.step(self.current, self.to, position_or_dt, &mut self.state);
            }
        }
        self.current
    }

    /// Whether a controller has converged. Eased morphs never report done;
    /// their runner's clock decides.
    pub fn done(&self) -> bool {
        match &self.stepper {
            Stepper::Ease(_) => false,
            Stepper::Controller(controller) => controller.done(&self.state),
        }
    }

    /// Redirect toward a new target without a jump
    ///
    /// For eased morphs the start value is rebased so the value at the
    /// current eased position stays where it is.
    pub fn retarget(&mut self, to: f32) {
        if let Stepper::Ease(_) = self.stepper {
            let e = self.eased;
            if (1.0 - e).abs() > f32::EPSILON {
                self.from = (self.current - to * e) / (1.0 - e);
            }
        }
        self.set_to(to);
    }
}
