//! Timeline orchestration for multiple runners
//!
//! A [`Timeline`] owns a clock and a set of scheduled runners, each anchored
//! at an absolute start offset. It pulls frames from a [`FrameRequester`]:
//! while any runner still needs time it keeps requesting the next frame,
//! otherwise it goes idle until scheduling, seeking or `play` wakes it.
//!
//! Runners execute in the order they were scheduled. A runner is moved out
//! of its slot while it steps, so listeners and step functions may call back
//! into the timeline (schedule, unschedule, seek) without conflicting
//! borrows. Removals are compacted once the frame is over.

use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::options::{AnimateOptions, Persist, RunnerOptions, When};
use crate::runner::Runner;
use blinc_core::{
    EventEmitter, FrameRequester, FrameToken, ListenerId, SharedTarget, SystemClock, TimeSource,
};
use slotmap::{new_key_type, SlotMap};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};

new_key_type! {
    /// Handle to a runner scheduled on a timeline
    pub struct RunnerId;
}

/// Events fired by a timeline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimelineEvent {
    /// Every frame, with the new logical time
    Time,
}

/// Placement of one scheduled runner
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledRunner {
    pub id: RunnerId,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
}

struct RunnerSlot {
    /// `None` while the runner is stepping or lent out
    runner: Option<Runner>,
    start: f64,
    /// Bumped on reschedule so stale order entries can be told apart
    seq: u64,
}

struct TimelineInner {
    runners: SlotMap<RunnerId, RunnerSlot>,
    order: Vec<(RunnerId, u64)>,
    next_seq: u64,

    time: f64,
    speed: f64,
    start_cursor: f64,
    persist: Persist,
    paused: bool,
    last_source_time: f64,
    last_step_time: f64,

    next_frame: Option<FrameToken>,
    source: Rc<dyn TimeSource>,
    frames: Rc<dyn FrameRequester>,
    events: EventEmitter<TimelineEvent, f64>,

    stepping: bool,
    wake_requested: bool,
    config: TimelineConfig,
}

impl TimelineInner {
    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Absolute start for a runner of `duration`
    fn place(&mut self, duration: f64, previous_start: Option<f64>, delay: f64, when: When) -> f64 {
        match when {
            When::Last => {
                // An empty timeline chains from now rather than from a
                // cursor left behind by evicted runners
                let base = if self.runners.is_empty() {
                    self.start_cursor.max(self.time)
                } else {
                    self.start_cursor
                };
                let start = base + delay;
                self.start_cursor = start + duration;
                start
            }
            When::Absolute => delay,
            When::Now => self.time + delay,
            When::Relative => previous_start.unwrap_or(0.0) + delay,
        }
    }

    fn is_current(&self, id: RunnerId, seq: u64) -> bool {
        self.runners.get(id).is_some_and(|slot| slot.seq == seq)
    }

    /// Latest finite end time of the schedule, with unbounded loops
    /// stopping at the end of their current pass
    fn schedule_end(&self) -> f64 {
        self.runners
            .values()
            .filter_map(|slot| slot.runner.as_ref().map(|r| slot.start + r.end_time()))
            .filter(|end| end.is_finite())
            .fold(0.0, f64::max)
    }
}

/// Shared clock and scheduler for a set of runners
///
/// Cloning yields another handle to the same timeline.
#[derive(Clone)]
pub struct Timeline {
    inner: Rc<RefCell<TimelineInner>>,
}

/// Non-owning reference to a [`Timeline`]
#[derive(Clone, Default)]
pub struct TimelineHandle {
    inner: Weak<RefCell<TimelineInner>>,
}

impl TimelineHandle {
    pub fn upgrade(&self) -> Option<Timeline> {
        self.inner.upgrade().map(|inner| Timeline { inner })
    }
}

impl Timeline {
    /// Create a timeline on the system clock with default configuration
    pub fn new(frames: impl FrameRequester + 'static) -> Self {
        Self::with_config(TimelineConfig::default(), frames)
    }

    pub fn with_config(config: TimelineConfig, frames: impl FrameRequester + 'static) -> Self {
        let source: Rc<dyn TimeSource> = Rc::new(SystemClock::default());
        let now = source.now();
        Self {
            inner: Rc::new(RefCell::new(TimelineInner {
                runners: SlotMap::with_key(),
                order: Vec::new(),
                next_seq: 0,
                time: 0.0,
                speed: 1.0,
                start_cursor: 0.0,
                persist: config.persist,
                paused: false,
                last_source_time: now,
                last_step_time: 0.0,
                next_frame: None,
                source,
                frames: Rc::new(frames),
                events: EventEmitter::new(),
                stepping: false,
                wake_requested: false,
                config,
            })),
        }
    }

    pub fn handle(&self) -> TimelineHandle {
        TimelineHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> TimelineConfig {
        self.inner.borrow().config.clone()
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule a runner and return its id
    ///
    /// The runner's clock is set so that its elapsed time is zero at the
    /// computed start instant.
    pub fn schedule(&self, mut runner: Runner, delay: f64, when: When) -> RunnerId {
        let delay = if delay.is_finite() { delay } else { 0.0 };
        let (id, now, start) = {
            let mut inner = self.inner.borrow_mut();
            let start = inner.place(runner.duration(), runner.last_start, delay, when);
            let seq = inner.bump_seq();
            let id = inner.runners.insert(RunnerSlot {
                runner: None,
                start,
                seq,
            });
            inner.order.push((id, seq));
            (id, inner.time, start)
        };

        tracing::debug!("Scheduled runner {:?} at {} ({:?})", id, start, when);
        runner.attach(self.handle(), id, start);
        runner.set_time(now - start);
        self.restore(id, runner);
        self.wake();
        id
    }

    /// Move a scheduled runner to a new start, keeping its id
    pub fn reschedule(&self, id: RunnerId, delay: f64, when: When) -> Result<()> {
        let delay = if delay.is_finite() { delay } else { 0.0 };
        let (mut runner, now, start) = {
            let mut inner = self.inner.borrow_mut();
            let (runner, previous) = match inner.runners.get_mut(id) {
                Some(slot) => (slot.runner.take(), slot.start),
                None => return Err(TimelineError::UnknownRunner(id)),
            };
            let runner = runner.ok_or(TimelineError::UnknownRunner(id))?;

            let start = inner.place(runner.duration(), Some(previous), delay, when);
            let seq = inner.bump_seq();
            if let Some(slot) = inner.runners.get_mut(id) {
                slot.start = start;
                slot.seq = seq;
            }
            inner.order.push((id, seq));
            if !inner.stepping {
                inner.order.retain(|&(other, other_seq)| other != id || other_seq == seq);
            }
            (runner, inner.time, start)
        };

        tracing::debug!("Rescheduled runner {:?} at {}", id, start);
        runner.attach(self.handle(), id, start);
        runner.set_time(now - start);
        self.restore(id, runner);
        self.wake();
        Ok(())
    }

    /// Remove a runner, handing it back detached
    ///
    /// Returns `None` for unknown ids, or when the runner is the one
    /// currently stepping (it is dropped once its step returns).
    pub fn unschedule(&self, id: RunnerId) -> Option<Runner> {
        let slot = {
            let mut inner = self.inner.borrow_mut();
            let slot = inner.runners.remove(id)?;
            if !inner.stepping {
                inner.order.retain(|&(other, _)| other != id);
            }
            slot
        };
        tracing::debug!("Unscheduled runner {:?}", id);
        let mut runner = slot.runner?;
        runner.detach();
        Some(runner)
    }

    /// Mutate a scheduled runner, then wake the frame loop
    pub fn with_runner<R>(&self, id: RunnerId, f: impl FnOnce(&mut Runner) -> R) -> Option<R> {
        let mut runner = self.inner.borrow_mut().runners.get_mut(id)?.runner.take()?;
        let result = f(&mut runner);
        self.restore(id, runner);
        self.wake();
        Some(result)
    }

    /// Create a runner on `target`, let `build` queue its effects, schedule it
    pub fn animate<F>(&self, target: SharedTarget, options: AnimateOptions, build: F) -> RunnerId
    where
        F: FnOnce(&mut Runner),
    {
        let config = self.config();
        let options = options.sanitize(&config);
        let mut runner = Runner::with_config(RunnerOptions::Config(options), &config);
        runner.element(target).set_timeline(self);
        build(&mut runner);
        self.schedule(runner, options.delay, options.when)
    }

    /// Put a lent-out runner back, or drop it if it was unscheduled meanwhile
    fn restore(&self, id: RunnerId, runner: Runner) {
        let orphaned = {
            let mut inner = self.inner.borrow_mut();
            match inner.runners.get_mut(id) {
                Some(slot) => {
                    slot.runner = Some(runner);
                    None
                }
                None => Some(runner),
            }
        };
        if let Some(mut runner) = orphaned {
            runner.detach();
        }
    }

    /// The whole schedule, ordered by start then duration
    pub fn schedule_info(&self) -> Vec<ScheduledRunner> {
        let inner = self.inner.borrow();
        let mut info: Vec<ScheduledRunner> = inner
            .order
            .iter()
            .filter(|&&(id, seq)| inner.is_current(id, seq))
            .filter_map(|&(id, _)| {
                let slot = inner.runners.get(id)?;
                let duration = slot.runner.as_ref()?.duration();
                Some(ScheduledRunner {
                    id,
                    start: slot.start,
                    duration,
                    end: slot.start + duration,
                })
            })
            .collect();
        info.sort_by(|a, b| {
            a.start
                .total_cmp(&b.start)
                .then(a.duration.total_cmp(&b.duration))
        });
        info
    }

    /// Ids in execution order
    pub fn runner_ids(&self) -> Vec<RunnerId> {
        let inner = self.inner.borrow();
        inner
            .order
            .iter()
            .filter(|&&(id, seq)| inner.is_current(id, seq))
            .map(|&(id, _)| id)
            .collect()
    }

    /// Ids of runners carrying `tag`, in execution order
    pub fn runners_tagged(&self, tag: &str) -> Vec<RunnerId> {
        let inner = self.inner.borrow();
        inner
            .order
            .iter()
            .filter(|&&(id, seq)| inner.is_current(id, seq))
            .filter(|&&(id, _)| {
                inner.runners[id]
                    .runner
                    .as_ref()
                    .is_some_and(|runner| runner.has_tag(tag))
            })
            .map(|&(id, _)| id)
            .collect()
    }

    pub fn runner_count(&self) -> usize {
        self.inner.borrow().runners.len()
    }

    pub fn contains(&self, id: RunnerId) -> bool {
        self.inner.borrow().runners.contains_key(id)
    }

    // =========================================================================
    // Playback control
    // =========================================================================

    pub fn play(&self) {
        self.inner.borrow_mut().paused = false;
        tracing::debug!("Timeline play");
        self.wake();
    }

    /// Halt and withdraw the pending frame
    pub fn pause(&self) {
        self.inner.borrow_mut().paused = true;
        self.cancel_frame();
        tracing::debug!("Timeline paused");
    }

    /// Seek back to time zero, then pause
    ///
    /// Applies immediately, even on a paused timeline.
    pub fn stop(&self) {
        self.inner.borrow_mut().time = 0.0;
        self.step_now();
        self.pause();
        tracing::debug!("Timeline stopped");
    }

    /// Force every runner to its end, then pause
    ///
    /// Runners report done one step after reaching their end, so a second
    /// zero-length step runs before pausing. `Finish` listeners have fired
    /// and finished runners are evicted by the time this returns.
    pub fn finish(&self) {
        self.inner.borrow_mut().time = f64::INFINITY;
        self.step_now();
        self.step_now();
        self.pause();
        tracing::debug!("Timeline finished at {}", self.time());
    }

    /// Step right away regardless of pause or a pending frame
    fn step_now(&self) {
        self.cancel_frame();
        self.inner.borrow_mut().paused = false;
        self.wake();
    }

    /// Jump by `dt`; folded into the next step
    pub fn seek(&self, dt: f64) {
        self.inner.borrow_mut().time += dt;
        self.wake();
    }

    pub fn time(&self) -> f64 {
        self.inner.borrow().time
    }

    pub fn set_time(&self, time: f64) {
        self.inner.borrow_mut().time = time;
        self.wake();
    }

    pub fn speed(&self) -> f64 {
        self.inner.borrow().speed
    }

    /// Negative speeds play backward; zero freezes time
    pub fn set_speed(&self, speed: f64) {
        self.inner.borrow_mut().speed = speed;
    }

    /// Flip the direction, or force it (`Some(true)` plays backward)
    pub fn reverse(&self, backward: Option<bool>) {
        let mut inner = self.inner.borrow_mut();
        let speed = inner.speed;
        inner.speed = match backward {
            None => -speed,
            Some(true) => -speed.abs(),
            Some(false) => speed.abs(),
        };
    }

    pub fn persist(&self) -> Persist {
        self.inner.borrow().persist
    }

    pub fn set_persist(&self, persist: Persist) {
        self.inner.borrow_mut().persist = persist;
    }

    /// Replace the time source
    pub fn set_source(&self, source: impl TimeSource + 'static) {
        let source: Rc<dyn TimeSource> = Rc::new(source);
        let now = source.now();
        let mut inner = self.inner.borrow_mut();
        inner.source = source;
        inner.last_source_time = now;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.borrow().paused
    }

    /// Whether a frame is pending
    pub fn is_running(&self) -> bool {
        self.inner.borrow().next_frame.is_some()
    }

    pub fn on<F>(&self, event: TimelineEvent, listener: F) -> ListenerId
    where
        F: Fn(&f64) + 'static,
    {
        self.inner.borrow_mut().events.on(event, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().events.off(id)
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Step right away if idle and not paused
    pub(crate) fn wake(&self) {
        let step_now = {
            let mut inner = self.inner.borrow_mut();
            if inner.stepping {
                inner.wake_requested = true;
                false
            } else {
                !inner.paused && inner.next_frame.is_none()
            }
        };
        if step_now {
            self.step_frame(true);
        }
    }

    fn cancel_frame(&self) {
        let (token, frames) = {
            let mut inner = self.inner.borrow_mut();
            (inner.next_frame.take(), inner.frames.clone())
        };
        if let Some(token) = token {
            frames.cancel(token);
        }
    }

    fn request_frame(&self) {
        let frames = self.inner.borrow().frames.clone();
        let handle = self.handle();
        let token = frames.request(Box::new(move || {
            if let Some(timeline) = handle.upgrade() {
                timeline.on_frame();
            }
        }));
        self.inner.borrow_mut().next_frame = Some(token);
    }

    fn on_frame(&self) {
        self.inner.borrow_mut().next_frame = None;
        self.step_frame(false);
    }

    /// Advance the clock and step every active runner
    ///
    /// `immediate` steps (wake-ups) ignore source time elapsed while idle.
    fn step_frame(&self, immediate: bool) {
        let (dt, time, listeners, len) = {
            let mut inner = self.inner.borrow_mut();
            if inner.paused {
                return;
            }

            let now = inner.source.now();
            let dt_source = if immediate { 0.0 } else { now - inner.last_source_time };
            inner.last_source_time = now;

            let last = inner.last_step_time;
            let dt = inner.speed * dt_source + (inner.time - last);
            let (dt, time) = if dt.is_finite() {
                (dt, last + dt)
            } else if dt > 0.0 {
                (dt, inner.schedule_end().max(last))
            } else {
                (-last, 0.0)
            };

            inner.time = time;
            inner.last_step_time = time;
            inner.stepping = true;
            (dt, time, inner.events.listeners(TimelineEvent::Time), inner.order.len())
        };

        tracing::trace!("Timeline step: time={} dt={}", time, dt);
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&time))).is_err() {
                tracing::error!("Time listener panicked at {}", time);
            }
        }

        let mut runners_left = false;
        for index in 0..len {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                let Some(&(id, seq)) = inner.order.get(index) else {
                    break;
                };
                match inner.runners.get_mut(id) {
                    Some(slot) if slot.seq == seq => slot.runner.take().map(|r| (id, r)),
                    _ => None,
                }
            };
            let Some((id, mut runner)) = taken else {
                continue;
            };
            if !runner.is_active() {
                self.restore(id, runner);
                continue;
            }

            let dropped = match catch_unwind(AssertUnwindSafe(|| runner.step(dt))) {
                Ok(done) => {
                    let (dropped, needs_frames) = self.settle(id, runner, done, time);
                    runners_left |= needs_frames;
                    dropped
                }
                Err(_) => {
                    tracing::error!("Runner {:?} panicked while stepping, unscheduling it", id);
                    self.inner.borrow_mut().runners.remove(id);
                    Some(runner)
                }
            };
            if let Some(mut runner) = dropped {
                runner.detach();
            }
        }

        let request = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let runners = &inner.runners;
            inner
                .order
                .retain(|&(id, seq)| runners.get(id).is_some_and(|slot| slot.seq == seq));
            inner.stepping = false;
            let woken = std::mem::take(&mut inner.wake_requested);
            (runners_left || woken) && !inner.paused
        };

        if request {
            self.request_frame();
        } else {
            self.inner.borrow_mut().next_frame = None;
        }
    }

    /// Return a stepped runner to its slot or evict it
    ///
    /// Yields the runner if it left the timeline, and whether it needs
    /// further frames.
    fn settle(&self, id: RunnerId, runner: Runner, done: bool, time: f64) -> (Option<Runner>, bool) {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let persist = inner.persist;
        let Some(slot) = inner.runners.get_mut(id) else {
            return (Some(runner), false);
        };
        if !done {
            slot.runner = Some(runner);
            return (None, true);
        }

        let end = slot.start + runner.end_time();
        if persist.should_evict(end, time) {
            inner.runners.remove(id);
            tracing::debug!("Evicted finished runner {:?} at {}", id, time);
            return (Some(runner), false);
        }
        slot.runner = Some(runner);
        // Keep ticking until the persistence window has passed
        (None, matches!(persist, Persist::For(_)))
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Timeline")
                .field("time", &inner.time)
                .field("speed", &inner.speed)
                .field("paused", &inner.paused)
                .field("runners", &inner.runners.len())
                .finish(),
            Err(_) => f.write_str("Timeline { .. }"),
        }
    }
}
