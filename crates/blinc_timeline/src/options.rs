//! Scheduling and loop options
//!
//! Everything a caller can say about *when* and *how often* a runner plays,
//! resolved once when the runner is built.

use crate::config::TimelineConfig;
use crate::easing::Easing;
use crate::error::TimelineError;
use crate::stepper::{Controller, Stepper};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::str::FromStr;

/// Where on the timeline a scheduled runner starts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum When {
    /// After the previously chained runner (`after` is an alias)
    #[default]
    #[serde(alias = "after")]
    Last,
    /// At `delay` from timeline zero (`start` is an alias)
    #[serde(alias = "start")]
    Absolute,
    /// At `delay` from the timeline's current time
    Now,
    /// At `delay` from this runner's previous start, or from zero
    Relative,
}

impl FromStr for When {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last" | "after" => Ok(When::Last),
            "absolute" | "start" => Ok(When::Absolute),
            "now" => Ok(When::Now),
            "relative" => Ok(When::Relative),
            other => Err(TimelineError::InvalidPlacement(other.to_string())),
        }
    }
}

/// Number of loop passes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Times {
    Count(u32),
    Infinite,
}

impl Times {
    /// Zero passes means unbounded
    pub fn normalized(self) -> Self {
        match self {
            Times::Count(0) => Times::Infinite,
            other => other,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self.normalized() {
            Times::Count(n) => n as f64,
            Times::Infinite => f64::INFINITY,
        }
    }

    /// Whether the pass count is odd, `None` when unbounded
    pub fn is_odd(self) -> Option<bool> {
        match self.normalized() {
            Times::Count(n) => Some(n % 2 == 1),
            Times::Infinite => None,
        }
    }
}

impl Default for Times {
    fn default() -> Self {
        Times::Count(1)
    }
}

impl From<u32> for Times {
    fn from(n: u32) -> Self {
        Times::Count(n).normalized()
    }
}

/// Loop repetition settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopConfig {
    pub times: Times,
    /// Alternate direction on every pass
    pub swing: bool,
    /// Pause after each pass, in milliseconds
    pub wait: f64,
}

impl LoopConfig {
    /// `times` of zero loops forever
    pub fn new(times: u32, swing: bool, wait: f64) -> Self {
        Self {
            times: Times::from(times),
            swing,
            wait,
        }
        .sanitized()
    }

    /// Loop forever
    pub fn infinite() -> Self {
        Self::new(0, false, 0.0)
    }

    /// Clamp values that would break duration arithmetic
    pub fn sanitized(self) -> Self {
        Self {
            times: self.times.normalized(),
            swing: self.swing,
            wait: if self.wait.is_finite() { self.wait.max(0.0) } else { 0.0 },
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            times: Times::Count(1),
            swing: false,
            wait: 0.0,
        }
    }
}

/// The "duration, delay, when and loop" bundle accepted by `animate`
///
/// Unset fields fall back to the timeline configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AnimateOptions {
    pub duration: Option<f64>,
    pub delay: Option<f64>,
    pub when: Option<When>,
    pub looping: Option<LoopConfig>,
    pub ease: Option<Easing>,
}

impl AnimateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = Some(ms);
        self
    }

    pub fn delay(mut self, ms: f64) -> Self {
        self.delay = Some(ms);
        self
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }

    pub fn looping(mut self, times: u32, swing: bool, wait: f64) -> Self {
        self.looping = Some(LoopConfig::new(times, swing, wait));
        self
    }

    pub fn ease(mut self, ease: Easing) -> Self {
        self.ease = Some(ease);
        self
    }

    /// Fill every unset field from the configuration
    pub fn sanitize(self, config: &TimelineConfig) -> Sanitized {
        let duration = self
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(config.duration);
        Sanitized {
            duration,
            delay: self.delay.filter(|d| d.is_finite()).unwrap_or(config.delay),
            when: self.when.unwrap_or(config.when),
            looping: self.looping.unwrap_or_default().sanitized(),
            ease: self.ease.unwrap_or(config.ease),
        }
    }
}

impl From<f64> for AnimateOptions {
    fn from(duration: f64) -> Self {
        Self::new().duration(duration)
    }
}

/// Fully resolved [`AnimateOptions`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sanitized {
    pub duration: f64,
    pub delay: f64,
    pub when: When,
    pub looping: LoopConfig,
    pub ease: Easing,
}

/// How long a finished runner stays scheduled
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Persist {
    /// Evict once this many milliseconds have passed since the runner ended
    For(f64),
    /// Never evict automatically
    Forever,
}

impl Persist {
    /// Whether a runner that ended at `end` should be evicted at `now`
    pub fn should_evict(self, end: f64, now: f64) -> bool {
        match self {
            Persist::For(window) => now >= end + window.max(0.0),
            Persist::Forever => false,
        }
    }
}

impl Default for Persist {
    fn default() -> Self {
        Persist::For(0.0)
    }
}

/// What a runner is built from
///
/// Resolved once at construction: a plain duration eases by position, a
/// controller drives the runner declaratively by raw time deltas.
#[derive(Clone)]
pub enum RunnerOptions {
    Duration(f64),
    Controller(Rc<dyn Controller>),
    Config(Sanitized),
}

impl RunnerOptions {
    /// Resolve to (per-pass duration, stepper, loop settings)
    pub(crate) fn resolve(self, config: &TimelineConfig) -> (f64, Stepper, LoopConfig) {
        match self {
            RunnerOptions::Duration(ms) => {
                let ms = if ms.is_finite() && ms >= 0.0 { ms } else { config.duration };
                (ms, Stepper::Ease(config.ease), LoopConfig::default())
            }
            RunnerOptions::Controller(controller) => {
                let ms = controller.duration().unwrap_or(0.0).max(0.0);
                (ms, Stepper::Controller(controller), LoopConfig::default())
            }
            RunnerOptions::Config(options) => {
                (options.duration, Stepper::Ease(options.ease), options.looping)
            }
        }
    }
}

impl std::fmt::Debug for RunnerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerOptions::Duration(ms) => f.debug_tuple("Duration").field(ms).finish(),
            RunnerOptions::Controller(_) => f.write_str("Controller(..)"),
            RunnerOptions::Config(options) => f.debug_tuple("Config").field(options).finish(),
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions::Config(AnimateOptions::default().sanitize(&TimelineConfig::default()))
    }
}

impl From<f64> for RunnerOptions {
    fn from(ms: f64) -> Self {
        RunnerOptions::Duration(ms)
    }
}

impl From<Sanitized> for RunnerOptions {
    fn from(options: Sanitized) -> Self {
        RunnerOptions::Config(options)
    }
}

impl<C: Controller + 'static> From<C> for RunnerOptions {
    fn from(controller: C) -> Self {
        RunnerOptions::Controller(Rc::new(controller))
    }
}
