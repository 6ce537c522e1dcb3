//! Runner
//!
//! One scheduled animation: a local clock, a loop policy and an ordered
//! queue of (initializer, step) entries. Every [`Runner::step`] turns the
//! elapsed time into a direction-resolved position and feeds it to each
//! entry in declaration order.
//!
//! Elapsed time is relative to the runner's own start instant. A runner
//! scheduled in the future carries a negative elapsed time until the
//! timeline reaches it.

use crate::config::TimelineConfig;
use crate::easing::Easing;
use crate::error::{Result, TimelineError};
use crate::morph::Morpher;
use crate::options::{AnimateOptions, LoopConfig, RunnerOptions, When};
use crate::stepper::{Controller, Stepper};
use crate::timeline::{RunnerId, Timeline, TimelineHandle};
use blinc_core::{EventEmitter, ListenerId, PropertyKey, SharedTarget};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Events fired by a runner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunnerEvent {
    /// Elapsed time crossed from `<= 0` to `> 0`
    Start,
    /// Queue entries ran this frame
    Step,
    /// The runner became done
    Finish,
}

type Initializer = Box<dyn FnMut()>;
type StepFn = Box<dyn FnMut(f64) -> bool>;

struct QueueEntry {
    id: u64,
    initializer: Initializer,
    step: StepFn,
    always_reinitialize: bool,
    initialized: bool,
    finished: bool,
}

/// Registry entry for an animated property
pub(crate) struct Retarget {
    pub(crate) morpher: Rc<RefCell<Morpher>>,
    pub(crate) entry: u64,
    /// Delta of a relative animation and the base it was captured from
    pub(crate) delta: Option<(Rc<Cell<f32>>, Rc<Cell<Option<f32>>>)>,
}

/// A single animation instance
pub struct Runner {
    duration: f64,
    looping: LoopConfig,
    reversing: bool,
    stepper: Stepper,
    declarative: bool,
    frame_budget: f64,

    time: f64,
    last_time: f64,
    last_position: Option<f64>,
    /// End time and pass index of an unbounded loop forced to finish
    halt: Option<(f64, u64)>,

    queue: Vec<QueueEntry>,
    next_entry: u64,
    pub(crate) retargets: FxHashMap<(PropertyKey, bool), Retarget>,

    enabled: bool,
    done: bool,
    element: Option<SharedTarget>,
    timeline: Option<TimelineHandle>,
    id: Option<RunnerId>,
    pub(crate) last_start: Option<f64>,
    tags: FxHashSet<String>,
    events: EventEmitter<RunnerEvent, Runner>,
}

impl Runner {
    /// Create a runner with the default configuration
    pub fn new(options: impl Into<RunnerOptions>) -> Self {
        Self::with_config(options, &TimelineConfig::default())
    }

    /// Create a runner, filling unspecified values from `config`
    pub fn with_config(options: impl Into<RunnerOptions>, config: &TimelineConfig) -> Self {
        let (duration, stepper, looping) = options.into().resolve(config);
        let declarative = stepper.is_declarative();
        Self {
            duration,
            looping,
            reversing: false,
            stepper,
            declarative,
            frame_budget: config.frame_budget,
            time: 0.0,
            last_time: 0.0,
            last_position: None,
            halt: None,
            queue: Vec::new(),
            next_entry: 0,
            retargets: FxHashMap::default(),
            enabled: true,
            done: false,
            element: None,
            timeline: None,
            id: None,
            last_start: None,
            tags: FxHashSet::default(),
            events: EventEmitter::new(),
        }
    }

    // =========================================================================
    // Definition
    // =========================================================================

    /// Set the animated subject
    pub fn element(&mut self, target: SharedTarget) -> &mut Self {
        self.element = Some(target);
        self
    }

    pub fn target(&self) -> Option<&SharedTarget> {
        self.element.as_ref()
    }

    /// Remember a timeline without scheduling on it
    pub fn set_timeline(&mut self, timeline: &Timeline) -> &mut Self {
        self.timeline = Some(timeline.handle());
        self
    }

    /// The timeline this runner belongs to, if it is still alive
    pub fn timeline(&self) -> Option<Timeline> {
        self.timeline.as_ref().and_then(TimelineHandle::upgrade)
    }

    /// Id on the timeline that scheduled this runner
    pub fn id(&self) -> Option<RunnerId> {
        self.id
    }

    pub(crate) fn attach(&mut self, handle: TimelineHandle, id: RunnerId, start: f64) {
        self.timeline = Some(handle);
        self.id = Some(id);
        self.last_start = Some(start);
    }

    pub(crate) fn detach(&mut self) {
        self.timeline = None;
        self.id = None;
    }

    /// Schedule on `timeline`, or on the remembered timeline when `None`
    pub fn schedule(self, timeline: Option<&Timeline>, delay: f64, when: When) -> Result<RunnerId> {
        let timeline = match timeline {
            Some(timeline) => timeline.clone(),
            None => {
                let handle = self.timeline.as_ref().ok_or(TimelineError::NoTimeline)?;
                handle.upgrade().ok_or(TimelineError::TimelineDropped)?
            }
        };
        Ok(timeline.schedule(self, delay, when))
    }

    /// Schedule a follow-up runner on the same target and timeline
    ///
    /// `build` queues the follow-up's effects before it is scheduled.
    pub fn animate<F>(&self, options: AnimateOptions, build: F) -> Result<RunnerId>
    where
        F: FnOnce(&mut Runner),
    {
        let handle = self.timeline.as_ref().ok_or(TimelineError::NoTimeline)?;
        let timeline = handle.upgrade().ok_or(TimelineError::TimelineDropped)?;
        let config = timeline.config();
        let options = options.sanitize(&config);

        let mut runner = Runner::with_config(RunnerOptions::Config(options), &config);
        runner.set_timeline(&timeline);
        if let Some(element) = &self.element {
            runner.element(element.clone());
        }
        build(&mut runner);
        Ok(timeline.schedule(runner, options.delay, options.when))
    }

    /// Schedule an empty runner that only takes up time
    pub fn delay(&self, by: f64, when: When) -> Result<RunnerId> {
        self.animate(AnimateOptions::new().duration(0.0).delay(by).when(when), |_| {})
    }

    /// Repeat `times` passes (zero means forever)
    pub fn looping(&mut self, times: u32, swing: bool, wait: f64) -> &mut Self {
        self.set_loop(LoopConfig::new(times, swing, wait))
    }

    pub fn set_loop(&mut self, looping: LoopConfig) -> &mut Self {
        self.looping = looping.sanitized();
        self
    }

    pub fn loop_config(&self) -> LoopConfig {
        self.looping
    }

    // =========================================================================
    // Queue
    // =========================================================================

    /// Append an effect
    ///
    /// `initializer` runs before the first step of every active span (or
    /// before every step when `always_reinitialize`). `step` receives the
    /// position, or the frame delta for declarative runners, and returns
    /// whether it has converged.
    pub fn queue<I, S>(&mut self, initializer: I, step: S, always_reinitialize: bool) -> &mut Self
    where
        I: FnMut() + 'static,
        S: FnMut(f64) -> bool + 'static,
    {
        self.push_entry(Box::new(initializer), Box::new(step), always_reinitialize);
        self.wake_timeline();
        self
    }

    /// Run `step` on every qualifying frame
    pub fn during<S>(&mut self, mut step: S) -> &mut Self
    where
        S: FnMut(f64) + 'static,
    {
        self.queue(
            || {},
            move |position| {
                step(position);
                false
            },
            false,
        )
    }

    /// Run `listener` once the runner is done
    pub fn after<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&Runner) + 'static,
    {
        self.on(RunnerEvent::Finish, listener)
    }

    pub(crate) fn push_entry(&mut self, initializer: Initializer, step: StepFn, always_reinitialize: bool) -> u64 {
        let id = self.next_entry;
        self.next_entry += 1;
        self.queue.push(QueueEntry {
            id,
            initializer,
            step,
            always_reinitialize,
            initialized: false,
            finished: false,
        });
        id
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Redirect the morph already animating `key`, if any
    ///
    /// Returns false when nothing animates the property yet.
    pub(crate) fn try_retarget(&mut self, key: &PropertyKey, relative: bool, value: f32) -> bool {
        let Some(retarget) = self.retargets.get(&(key.clone(), relative)) else {
            return false;
        };
        let Some(entry) = self.queue.iter_mut().find(|entry| entry.id == retarget.entry) else {
            return false;
        };

        match &retarget.delta {
            Some((delta, base)) => {
                delta.set(value);
                if let Some(base) = base.get() {
                    retarget.morpher.borrow_mut().retarget(base + value);
                }
            }
            None if entry.initialized => retarget.morpher.borrow_mut().retarget(value),
            None => retarget.morpher.borrow_mut().set_to(value),
        }

        entry.finished = false;
        self.last_position = None;
        self.done = false;
        tracing::trace!("Retargeted {} to {}", key, value);
        self.wake_timeline();
        true
    }

    pub(crate) fn wake_timeline(&self) {
        if let Some(timeline) = self.timeline() {
            timeline.wake();
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn on<F>(&mut self, event: RunnerEvent, listener: F) -> ListenerId
    where
        F: Fn(&Runner) + 'static,
    {
        self.events.on(event, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    fn fire(&self, event: RunnerEvent) {
        self.events.emit(event, self);
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Total duration of every pass and the waits between them
    pub fn duration(&self) -> f64 {
        let times = self.looping.times.as_f64();
        let loop_duration = self.duration + self.looping.wait;
        if times.is_infinite() && loop_duration <= 0.0 {
            return 0.0;
        }
        times * loop_duration - self.looping.wait
    }

    /// Duration of a single pass
    pub fn pass_duration(&self) -> f64 {
        self.duration
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Jump to an elapsed time and step there
    pub fn set_time(&mut self, time: f64) -> &mut Self {
        self.step(time - self.time);
        self
    }

    /// Loop-relative position: completed passes plus progress in the current one
    pub fn position(&self) -> f64 {
        let times = self.looping.times.as_f64();
        let loop_duration = self.duration + self.looping.wait;
        if loop_duration <= 0.0 || self.duration <= 0.0 {
            return match (self.time >= 0.0, times.is_finite()) {
                (false, _) => 0.0,
                (true, true) => times,
                (true, false) => 1.0,
            };
        }
        let loops_done = (self.time / loop_duration).floor();
        let relative = self.time - loops_done * loop_duration;
        let position = (relative / self.duration).min(1.0);
        (loops_done + position).clamp(0.0, times)
    }

    /// Move to a loop-relative position
    pub fn set_position(&mut self, position: f64) -> &mut Self {
        let whole = position.floor();
        let partial = position - whole;
        let time = (self.duration + self.looping.wait) * whole + self.duration * partial;
        self.set_time(time)
    }

    /// Position normalized over the whole duration
    pub fn absolute(&self) -> f64 {
        let total = self.duration();
        if total <= 0.0 {
            return if self.time >= 0.0 { 1.0 } else { 0.0 };
        }
        (self.time / total).clamp(0.0, 1.0)
    }

    pub fn set_absolute(&mut self, position: f64) -> &mut Self {
        let total = self.duration();
        if total.is_finite() {
            self.set_time(position * total);
        }
        self
    }

    /// Elapsed time at which this runner stops if it is finished now
    ///
    /// Equals [`Runner::duration`] except for unbounded loops, which stop at
    /// the end of the pass in progress.
    pub fn end_time(&self) -> f64 {
        if let Some((time, _)) = self.halt {
            return time;
        }
        let total = self.duration();
        if total.is_finite() || self.declarative {
            return total;
        }
        self.pass_end().0
    }

    /// End of the pass in progress and its index
    fn pass_end(&self) -> (f64, u64) {
        let loop_duration = self.duration + self.looping.wait;
        let elapsed = self.time.max(0.0);
        if loop_duration <= 0.0 {
            return (elapsed, 0);
        }
        let pass = (elapsed / loop_duration).floor();
        ((pass * loop_duration + self.duration).max(elapsed), pass as u64)
    }

    /// Position fed to the queue on the last qualifying step
    pub fn progress(&self) -> Option<f64> {
        self.last_position
    }

    /// Step by the default frame budget
    pub fn step_frame(&mut self) -> bool {
        self.step(self.frame_budget)
    }

    /// Advance the clock by `dt` and run the queue
    ///
    /// Returns whether the runner is done.
    pub fn step(&mut self, dt: f64) -> bool {
        let dt = if dt.is_nan() { 0.0 } else { dt };
        if dt < 0.0 {
            self.halt = None;
        } else if dt == f64::INFINITY && !self.declarative && self.duration().is_infinite() {
            self.halt = Some(self.pass_end());
        }
        let total = self.halt.map_or_else(|| self.duration(), |(time, _)| time);
        let entering = self.last_time < 0.0;

        if self.declarative {
            self.time = if dt.is_infinite() {
                self.time.max(0.0)
            } else {
                self.time + dt
            };
        } else {
            self.time = (self.time + dt).min(total);
        }

        let position = self.stepper_position(total);
        let active = self.time >= 0.0;
        let changed = active && self.last_position != Some(position);
        self.last_position = if active { Some(position) } else { None };

        let just_started = self.last_time <= 0.0 && self.time > 0.0;
        let just_finished = self.last_time < total && self.time >= total;
        self.last_time = self.time;

        if just_started {
            self.fire(RunnerEvent::Start);
        }

        let was_done = self.done;
        let mut converged = false;
        if active {
            self.initialise();
            if changed || self.declarative {
                // A declarative runner entering its span only gets the part
                // of the frame after its start
                let input = match (self.declarative, entering) {
                    (true, true) => self.time.min(dt),
                    (true, false) => dt,
                    (false, _) => position,
                };
                converged = self.run(input);
                self.fire(RunnerEvent::Step);
            }
        } else {
            for entry in &mut self.queue {
                entry.initialized = false;
            }
        }

        self.done = if self.declarative {
            active && converged
        } else {
            self.time >= total && !just_finished
        };
        if self.done && !was_done {
            self.fire(RunnerEvent::Finish);
        }
        self.done
    }

    /// Direction-resolved position in `[0, 1]` for the current time
    fn stepper_position(&mut self, total: f64) -> f64 {
        let loop_duration = self.duration + self.looping.wait;
        let loops_done = if loop_duration > 0.0 {
            (self.time / loop_duration).floor()
        } else {
            0.0
        };

        let swinging = self.looping.swing && loops_done.rem_euclid(2.0) == 1.0;
        let reversing = swinging != self.reversing;

        let starting = if self.reversing { 1.0 } else { 0.0 };
        // The final pass runs backward when swing flips it or reverse does,
        // but not both. A halted unbounded loop ends on its current pass.
        let final_backward = match (self.halt, self.looping.times.is_odd()) {
            (Some((_, pass)), _) => (self.looping.swing && pass % 2 == 1) != self.reversing,
            (None, Some(odd)) => (self.looping.swing && !odd) != self.reversing,
            (None, None) => self.reversing,
        };
        let ending = if final_backward { 0.0 } else { 1.0 };

        if self.time < 0.0 || (self.time == 0.0 && total > 0.0) {
            return starting;
        }
        if self.time >= total {
            return ending;
        }

        let clip = if self.duration > 0.0 {
            (self.time.rem_euclid(loop_duration) / self.duration).min(1.0)
        } else {
            1.0
        };
        if reversing { 1.0 - clip } else { clip }
    }

    fn initialise(&mut self) {
        for entry in &mut self.queue {
            let needs_init = entry.always_reinitialize || !entry.initialized;
            if needs_init && !entry.finished {
                (entry.initializer)();
                entry.initialized = true;
            }
        }
    }

    fn run(&mut self, position_or_dt: f64) -> bool {
        let mut all_finished = true;
        for entry in &mut self.queue {
            if !entry.finished {
                entry.finished = (entry.step)(position_or_dt);
            }
            all_finished &= entry.finished;
        }
        all_finished
    }

    /// Jump to the end and settle there
    pub fn finish(&mut self) -> &mut Self {
        if !self.step(f64::INFINITY) {
            self.step(0.0);
        }
        self
    }

    /// Toggle direction, or set it explicitly
    pub fn reverse(&mut self, reverse: Option<bool>) -> &mut Self {
        self.reversing = reverse.unwrap_or(!self.reversing);
        self
    }

    pub fn is_reversed(&self) -> bool {
        self.reversing
    }

    /// Ease effects queued from now on with `easing`
    ///
    /// A runner's mode is fixed when it is built, so this is ignored on a
    /// controller-driven runner.
    pub fn ease(&mut self, easing: Easing) -> &mut Self {
        if self.declarative {
            tracing::warn!("Ignoring easing {:?} on a controller-driven runner", easing);
            return self;
        }
        self.stepper = Stepper::Ease(easing);
        self
    }

    /// Drive effects queued from now on with another controller
    ///
    /// Ignored on an eased runner; build the runner from a controller instead.
    pub fn controller(&mut self, controller: impl Controller + 'static) -> &mut Self {
        if !self.declarative {
            tracing::warn!("Ignoring controller on an eased runner");
            return self;
        }
        self.stepper = Stepper::Controller(Rc::new(controller));
        self
    }

    pub(crate) fn stepper(&self) -> &Stepper {
        &self.stepper
    }

    pub fn is_declarative(&self) -> bool {
        self.declarative
    }

    pub fn is_active(&self) -> bool {
        self.enabled
    }

    /// Inactive runners stay scheduled but are not stepped
    pub fn set_active(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    // =========================================================================
    // Tags
    // =========================================================================

    pub fn tag(&mut self, name: impl Into<String>) -> &mut Self {
        self.tags.insert(name.into());
        self
    }

    pub fn untag(&mut self, name: &str) -> &mut Self {
        self.tags.remove(name);
        self
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains(name)
    }

    /// Tags in name order
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("duration", &self.duration)
            .field("looping", &self.looping)
            .field("time", &self.time)
            .field("reversing", &self.reversing)
            .field("declarative", &self.declarative)
            .field("entries", &self.queue.len())
            .field("done", &self.done)
            .finish()
    }
}
