//! Time sources
//!
//! Timelines read time in milliseconds from a [`TimeSource`]. The default is
//! a monotonic clock; tests and offline rendering inject a [`ManualClock`].

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A monotonically increasing millisecond clock
pub trait TimeSource {
    fn now(&self) -> f64;
}

impl<F> TimeSource for F
where
    F: Fn() -> f64,
{
    fn now(&self) -> f64 {
        self()
    }
}

#[derive(Clone, Copy, Debug)]
enum ClockKind {
    Monotonic(Instant),
    Wall,
}

/// Clock backed by the operating system
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    kind: ClockKind,
}

impl SystemClock {
    /// High-resolution clock measuring from its creation
    pub fn monotonic() -> Self {
        Self {
            kind: ClockKind::Monotonic(Instant::now()),
        }
    }

    /// Wall clock in milliseconds since the Unix epoch
    ///
    /// Used where no monotonic clock is available. Not guaranteed monotonic.
    pub fn wall() -> Self {
        Self {
            kind: ClockKind::Wall,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::monotonic()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> f64 {
        match self.kind {
            ClockKind::Monotonic(origin) => origin.elapsed().as_secs_f64() * 1000.0,
            ClockKind::Wall => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs_f64()
                * 1000.0,
        }
    }
}

/// Externally advanced clock
///
/// Clones share the same time, so a test can keep one clone and hand the
/// other to a timeline.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(ms)),
        }
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn get(&self) -> f64 {
        self.now.get()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}
