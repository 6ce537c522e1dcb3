//! Blinc Core Runtime
//!
//! The collaborators an animation engine drives but does not own:
//!
//! - **Events**: named fire-and-subscribe dispatch
//! - **Targets**: objects exposing animatable properties
//! - **Clocks**: injectable millisecond time sources
//! - **Frames**: display-refresh requests with cancellation
//!
//! # Example
//!
//! ```rust
//! use blinc_core::frame::{FrameQueue, FrameRequester};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let frames = FrameQueue::new();
//! let ticks = Rc::new(Cell::new(0));
//!
//! let t = ticks.clone();
//! frames.request(Box::new(move || t.set(t.get() + 1)));
//! frames.run_frame();
//!
//! assert_eq!(ticks.get(), 1);
//! ```

pub mod clock;
pub mod events;
pub mod frame;
pub mod target;

pub use clock::{ManualClock, SystemClock, TimeSource};
pub use events::{EventEmitter, Listener, ListenerId};
pub use frame::{FrameCallback, FrameQueue, FrameRequester, FrameToken};
pub use target::{shared, Animatable, PropertyBag, PropertyKey, PropertyKind, SharedTarget};
