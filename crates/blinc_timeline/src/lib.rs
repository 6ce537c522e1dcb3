//! Blinc Timeline
//!
//! Frame-driven animation runners and the timeline that schedules them.
//!
//! # Features
//!
//! - **Runners**: per-animation clocks with looping, swing, wait and reverse
//! - **Timelines**: chained scheduling, speed, seeking and persistence
//! - **Retargeting**: animating a property again redirects it mid-flight
//! - **Steppers**: easing curves or declarative springs
//!
//! # Example
//!
//! ```rust
//! use blinc_core::{shared, FrameQueue, ManualClock, PropertyBag, SharedTarget};
//! use blinc_timeline::{AnimateOptions, Easing, Timeline};
//!
//! let clock = ManualClock::new();
//! let frames = FrameQueue::new();
//! let timeline = Timeline::new(frames.clone());
//! timeline.set_source(clock.clone());
//!
//! let bag = shared(PropertyBag::new().with_attr("x", 0.0));
//! let target: SharedTarget = bag.clone();
//! timeline.animate(target, AnimateOptions::new().duration(100.0).ease(Easing::Linear), |r| {
//!     r.x(50.0);
//! });
//!
//! for _ in 0..10 {
//!     clock.advance(16.0);
//!     frames.run_frame();
//! }
//!
//! assert_eq!(bag.borrow().attr("x"), Some(50.0));
//! ```

pub mod config;
pub mod easing;
pub mod error;
pub mod morph;
pub mod options;
pub mod properties;
pub mod runner;
pub mod spring;
pub mod stepper;
pub mod timeline;

pub use config::TimelineConfig;
pub use easing::Easing;
pub use error::{Result, TimelineError};
pub use morph::Morpher;
pub use options::{AnimateOptions, LoopConfig, Persist, RunnerOptions, Sanitized, Times, When};
pub use runner::{Runner, RunnerEvent};
pub use spring::{Spring, SpringConfig};
pub use stepper::{Controller, ControllerState, Stepper};
pub use timeline::{RunnerId, ScheduledRunner, Timeline, TimelineEvent, TimelineHandle};
