//! Frame requests
//!
//! The display-refresh primitive: a requester invokes each callback once on
//! the next refresh and lets the caller withdraw a pending request.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Callback run on the next frame
pub type FrameCallback = Box<dyn FnOnce()>;

/// Identifies a pending frame request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

/// Something that can schedule work for the next display refresh
///
/// Implementations must not invoke the callback synchronously from
/// `request`; callers may hold state that the callback needs.
pub trait FrameRequester {
    fn request(&self, callback: FrameCallback) -> FrameToken;

    /// Withdraw a pending request. Unknown or already-run tokens are ignored.
    fn cancel(&self, token: FrameToken);
}

/// Manually pumped frame requester
///
/// Collects callbacks until [`FrameQueue::run_frame`] is called, which plays
/// the role of one display refresh. Clones share the same queue.
#[derive(Clone, Default)]
pub struct FrameQueue {
    pending: Rc<RefCell<Vec<(FrameToken, FrameCallback)>>>,
    next_token: Rc<Cell<u64>>,
    frames_run: Rc<Cell<u64>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback requested before this call, in request order
    ///
    /// Callbacks requested while running are kept for the next frame.
    /// Returns the number of callbacks invoked.
    pub fn run_frame(&self) -> usize {
        let batch = std::mem::take(&mut *self.pending.borrow_mut());
        let count = batch.len();
        for (_, callback) in batch {
            callback();
        }
        self.frames_run.set(self.frames_run.get() + 1);
        count
    }

    /// Run frames until nothing is pending or `max_frames` is reached
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.pending_count() > 0 {
            self.run_frame();
            frames += 1;
        }
        frames
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run.get()
    }
}

impl FrameRequester for FrameQueue {
    fn request(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        self.pending.borrow_mut().push((token, callback));
        token
    }

    fn cancel(&self, token: FrameToken) {
        self.pending.borrow_mut().retain(|(t, _)| *t != token);
    }
}
