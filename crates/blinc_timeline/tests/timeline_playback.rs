//! Integration tests for timeline playback
//!
//! These tests drive a timeline deterministically with a manual clock and a
//! manually pumped frame queue, verifying that:
//! - Runners chain end to end and are retired on time
//! - Pause, stop, finish, speed and seek behave like a transport
//! - Retargeting and re-entrant scheduling work from inside a frame
//! - A failing runner cannot stall its siblings

use blinc_core::{shared, FrameQueue, ManualClock, PropertyBag, SharedTarget};
use blinc_timeline::{
    AnimateOptions, Easing, Persist, Runner, RunnerEvent, RunnerId, SpringConfig, Timeline,
    TimelineConfig, TimelineError, TimelineEvent, When,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

struct Harness {
    timeline: Timeline,
    clock: ManualClock,
    frames: FrameQueue,
    bag: Rc<RefCell<PropertyBag>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(TimelineConfig::default())
    }

    fn with_config(config: TimelineConfig) -> Self {
        let clock = ManualClock::new();
        let frames = FrameQueue::new();
        let timeline = Timeline::with_config(config, frames.clone());
        timeline.set_source(clock.clone());
        Self {
            timeline,
            clock,
            frames,
            bag: shared(PropertyBag::new().with_attr("x", 0.0)),
        }
    }

    fn target(&self) -> SharedTarget {
        self.bag.clone()
    }

    /// Linear animation of `x`
    fn slide(&self, to: f32, duration: f64) -> RunnerId {
        let options = AnimateOptions::new().duration(duration).ease(Easing::Linear);
        self.timeline.animate(self.target(), options, |r| {
            r.x(to);
        })
    }

    fn frame(&self, ms: f64) {
        self.clock.advance(ms);
        self.frames.run_frame();
    }

    fn frames(&self, count: usize, ms: f64) {
        for _ in 0..count {
            self.frame(ms);
        }
    }

    fn x(&self) -> f32 {
        self.bag.borrow().attr("x").unwrap_or(f32::NAN)
    }
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

/// Two runners placed with `Last` run back to back on the same property
#[test]
fn test_runners_chain_and_play_in_sequence() {
    let h = Harness::new();
    let first = h.slide(100.0, 500.0);
    let second = h.slide(200.0, 500.0);

    let info = h.timeline.schedule_info();
    assert_eq!(info[0].id, first);
    assert_eq!(info[1].id, second);
    assert_eq!(info[1].start, 500.0);

    h.frames(5, 50.0);
    assert_close(h.x(), 50.0);

    // Second runner picks up where the first left off
    h.frames(5, 50.0);
    assert_close(h.x(), 100.0);

    h.frames(5, 50.0);
    assert_close(h.x(), 150.0);
    assert!(!h.timeline.contains(first));

    h.frames(10, 50.0);
    assert_close(h.x(), 200.0);
    assert_eq!(h.timeline.runner_count(), 0);
    assert!(!h.timeline.is_running());
}

/// Done is reported one frame after the end, and eviction follows at once
#[test]
fn test_finished_runner_is_evicted_the_frame_after_its_end() {
    let h = Harness::new();
    let id = h.slide(100.0, 100.0);

    h.frames(2, 50.0);
    assert_close(h.x(), 100.0);
    assert!(h.timeline.contains(id));

    h.frame(50.0);
    assert!(!h.timeline.contains(id));
    assert!(!h.timeline.is_running());
}

#[test]
fn test_persist_forever_keeps_runner() {
    let h = Harness::new();
    h.timeline.set_persist(Persist::Forever);
    let id = h.slide(100.0, 100.0);

    h.frames(10, 50.0);
    assert!(h.timeline.contains(id));
    assert!(!h.timeline.is_running());
}

#[test]
fn test_persist_window_delays_eviction() {
    let h = Harness::new();
    h.timeline.set_persist(Persist::For(100.0));
    let id = h.slide(100.0, 100.0);

    h.frames(3, 50.0);
    assert!(h.timeline.contains(id));
    assert!(h.timeline.is_running());

    h.frame(50.0);
    assert!(!h.timeline.contains(id));
}

/// Paused timelines ignore source time and step nothing
#[test]
fn test_pause_suspends_runner_steps() {
    let h = Harness::new();
    let steps = Rc::new(Cell::new(0));
    let mut runner = Runner::new(1000.0);
    let s = steps.clone();
    runner.during(move |_| s.set(s.get() + 1));
    let id = h.timeline.schedule(runner, 0.0, When::Now);

    h.frame(100.0);
    let before = steps.get();

    h.timeline.pause();
    assert!(h.timeline.is_paused());
    assert!(!h.timeline.is_running());
    h.clock.advance(5000.0);
    h.frames.run_frame();
    h.frames.run_frame();
    assert_eq!(steps.get(), before);
    assert_eq!(h.timeline.time(), 100.0);

    // Time spent paused does not reach the runner
    h.timeline.play();
    h.frame(100.0);
    assert_eq!(steps.get(), before + 1);
    assert_eq!(h.timeline.with_runner(id, |r| r.time()), Some(200.0));
}

/// A runner sitting at its end moves back toward the start
#[test]
fn test_negative_speed_plays_backward() {
    let h = Harness::new();
    h.timeline.set_persist(Persist::Forever);
    let id = h.slide(100.0, 200.0);

    h.frames(4, 50.0);
    assert_close(h.x(), 100.0);

    h.timeline.set_speed(-1.0);
    h.frame(50.0);
    assert_close(h.x(), 75.0);
    assert_eq!(h.timeline.time(), 150.0);
    assert_eq!(h.timeline.with_runner(id, |r| r.is_done()), Some(false));
}

#[test]
fn test_stop_returns_to_start_and_pauses() {
    let h = Harness::new();
    h.slide(100.0, 100.0);
    h.frame(50.0);
    assert_close(h.x(), 50.0);

    h.timeline.stop();
    assert_close(h.x(), 0.0);
    assert_eq!(h.timeline.time(), 0.0);
    assert!(h.timeline.is_paused());
    assert!(!h.timeline.is_running());
}

/// Finishing reaches every end state and reports it before pausing
#[test]
fn test_finish_jumps_to_end_and_pauses() {
    let h = Harness::new();
    let finished = Rc::new(Cell::new(0));
    let mut ids = Vec::new();
    for to in [100.0, 300.0] {
        let f = finished.clone();
        let options = AnimateOptions::new().duration(100.0).ease(Easing::Linear);
        ids.push(h.timeline.animate(h.target(), options, |r| {
            r.x(to).after(move |_| f.set(f.get() + 1));
        }));
    }
    h.frame(50.0);

    h.timeline.finish();
    assert_close(h.x(), 300.0);
    assert_eq!(h.timeline.time(), 200.0);
    assert_eq!(finished.get(), 2);
    assert!(ids.iter().all(|&id| !h.timeline.contains(id)));
    assert!(h.timeline.is_paused());
    assert!(!h.timeline.is_running());
}

#[test]
fn test_finish_applies_while_paused() {
    let h = Harness::new();
    h.timeline.set_persist(Persist::Forever);
    let id = h.slide(100.0, 100.0);
    h.frame(50.0);
    h.timeline.pause();

    h.timeline.finish();
    assert_close(h.x(), 100.0);
    assert_eq!(h.timeline.with_runner(id, |r| r.is_done()), Some(true));
    assert!(h.timeline.is_paused());
}

/// An endless loop stops at the end of its pass and can be rewound
#[test]
fn test_finishing_endless_loop_then_stopping() {
    let h = Harness::new();
    h.timeline.set_persist(Persist::Forever);
    let options = AnimateOptions::new()
        .duration(100.0)
        .ease(Easing::Linear)
        .looping(0, false, 0.0);
    let id = h.timeline.animate(h.target(), options, |r| {
        r.x(100.0);
    });
    h.frame(50.0);

    h.timeline.finish();
    assert_close(h.x(), 100.0);
    assert_eq!(h.timeline.time(), 100.0);
    assert_eq!(
        h.timeline.with_runner(id, |r| (r.is_done(), r.time())),
        Some((true, 100.0))
    );

    // Nothing left to animate, so no frames are requested
    h.timeline.play();
    h.frames(5, 16.0);
    assert!(!h.timeline.is_running());

    h.timeline.stop();
    assert_close(h.x(), 0.0);
    assert_eq!(
        h.timeline.with_runner(id, |r| (r.is_done(), r.time())),
        Some((false, 0.0))
    );
}

#[test]
fn test_finished_endless_loop_is_evicted() {
    let h = Harness::new();
    let options = AnimateOptions::new().duration(100.0).looping(0, true, 0.0);
    let id = h.timeline.animate(h.target(), options, |r| {
        r.x(100.0);
    });
    h.frame(150.0);

    h.timeline.finish();
    assert!(!h.timeline.contains(id));
    assert!(!h.timeline.is_running());
    assert_eq!(h.frames.pending_count(), 0);
}

#[test]
fn test_seek_is_folded_into_next_frame() {
    let h = Harness::new();
    let id = h.slide(100.0, 1000.0);

    h.frame(100.0);
    h.timeline.seek(300.0);
    h.frame(100.0);

    assert_eq!(h.timeline.time(), 500.0);
    assert_eq!(h.timeline.with_runner(id, |r| r.time()), Some(500.0));
    assert_close(h.x(), 50.0);
}

/// Redirecting a running property neither jumps nor adds a second entry
#[test]
fn test_retarget_mid_flight_is_continuous() {
    let h = Harness::new();
    let id = h.slide(100.0, 1000.0);

    h.frames(5, 100.0);
    assert_close(h.x(), 50.0);

    let entries = h.timeline.with_runner(id, |r| r.x(200.0).queue_len());
    assert_eq!(entries, Some(1));
    assert_close(h.x(), 50.0);

    h.frame(10.0);
    assert!((h.x() - 50.0).abs() < 5.0, "jumped to {}", h.x());

    h.frames(5, 100.0);
    assert_close(h.x(), 200.0);
}

#[test]
fn test_swinging_loop_mirrors_position() {
    let h = Harness::new();
    let options = AnimateOptions::new()
        .duration(100.0)
        .ease(Easing::Linear)
        .looping(2, true, 0.0);
    h.timeline.animate(h.target(), options, |r| {
        r.x(100.0);
    });

    h.frame(50.0);
    assert_close(h.x(), 50.0);
    h.frame(75.0);
    assert_close(h.x(), 75.0);
    h.frame(25.0);
    assert_close(h.x(), 50.0);
    h.frames(2, 50.0);
    assert_close(h.x(), 0.0);
}

#[test]
fn test_time_event_reports_logical_time() {
    let h = Harness::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = seen.clone();
    let listener = h.timeline.on(TimelineEvent::Time, move |t| s.borrow_mut().push(*t));

    h.slide(100.0, 100.0);
    h.frames(2, 16.0);
    assert_eq!(*seen.borrow(), vec![0.0, 16.0, 32.0]);

    assert!(h.timeline.off(listener));
    h.frame(16.0);
    assert_eq!(seen.borrow().len(), 3);
}

/// A panicking step removes only its own runner
#[test]
fn test_panicking_time_listener_is_isolated() {
    let h = Harness::new();
    h.timeline.on(TimelineEvent::Time, |_| panic!("broken listener"));
    let seen = Rc::new(Cell::new(0));
    let s = seen.clone();
    h.timeline.on(TimelineEvent::Time, move |_| s.set(s.get() + 1));

    h.slide(100.0, 100.0);
    h.frame(50.0);
    assert_close(h.x(), 50.0);
    assert!(h.timeline.is_running());

    h.frame(50.0);
    assert_close(h.x(), 100.0);
    assert_eq!(seen.get(), 3);
}

#[test]
fn test_panicking_runner_does_not_stall_siblings() {
    let h = Harness::new();
    let mut broken = Runner::new(100.0);
    broken.during(|_| panic!("broken step"));
    let broken = h.timeline.schedule(broken, 50.0, When::Absolute);
    let healthy = h.slide(100.0, 200.0);

    h.frames(2, 50.0);
    assert!(!h.timeline.contains(broken));
    assert!(h.timeline.contains(healthy));

    h.frames(3, 50.0);
    assert_close(h.x(), 100.0);
}

/// Listeners may schedule on the timeline while it is stepping
#[test]
fn test_scheduling_from_a_finish_listener() {
    let h = Harness::new();
    let ran = Rc::new(Cell::new(false));

    let mut first = Runner::new(100.0);
    let r = ran.clone();
    first.after(move |runner| {
        let Some(timeline) = runner.timeline() else {
            return;
        };
        let mut follow_up = Runner::new(100.0);
        let r = r.clone();
        follow_up.during(move |_| r.set(true));
        timeline.schedule(follow_up, 0.0, When::Now);
    });
    h.timeline.schedule(first, 0.0, When::Last);

    h.frames(3, 50.0);
    assert_eq!(h.timeline.runner_count(), 1);

    h.frames(5, 50.0);
    assert!(ran.get());
    assert_eq!(h.timeline.runner_count(), 0);
}

#[test]
fn test_delay_pushes_the_cursor() {
    let h = Harness::new();
    let first = h.slide(100.0, 500.0);

    let gap = h
        .timeline
        .with_runner(first, |r| r.delay(300.0, When::Last))
        .unwrap()
        .unwrap();
    let next = h.slide(0.0, 100.0);

    let info = h.timeline.schedule_info();
    let start = |id| info.iter().find(|i| i.id == id).map(|i| i.start);
    assert_eq!(start(gap), Some(800.0));
    assert_eq!(start(next), Some(800.0));
}

#[test]
fn test_spring_runner_settles_and_retires() {
    let h = Harness::new();
    let mut runner = Runner::new(SpringConfig::stiff());
    runner.element(h.target()).x(80.0);
    let id = runner.schedule(Some(&h.timeline), 0.0, When::Now).unwrap();

    for _ in 0..600 {
        if !h.timeline.contains(id) {
            break;
        }
        h.frame(16.0);
    }

    assert!(!h.timeline.contains(id));
    assert_eq!(h.x(), 80.0);
}

#[test]
fn test_inactive_runner_is_skipped() {
    let h = Harness::new();
    let id = h.slide(100.0, 1000.0);
    h.frame(100.0);

    h.timeline.with_runner(id, |r| {
        r.set_active(false);
    });
    h.frames(3, 100.0);
    assert_eq!(h.timeline.with_runner(id, |r| r.time()), Some(100.0));
    assert_close(h.x(), 10.0);
}

#[test]
fn test_runner_events_fire_through_timeline() {
    let h = Harness::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut runner = Runner::new(100.0);
    for event in [RunnerEvent::Start, RunnerEvent::Finish] {
        let log = log.clone();
        runner.on(event, move |_| log.borrow_mut().push(event));
    }
    h.timeline.schedule(runner, 0.0, When::Last);

    h.frames(5, 50.0);
    assert_eq!(*log.borrow(), vec![RunnerEvent::Start, RunnerEvent::Finish]);
}

#[test]
fn test_configuration_drives_defaults() {
    let config = TimelineConfig::from_toml(
        r#"
        duration = 200
        ease = "-"
        persist = "forever"
        "#,
    )
    .unwrap();
    let h = Harness::with_config(config);
    let id = h.timeline.animate(h.target(), AnimateOptions::new(), |r| {
        r.x(100.0);
    });

    assert_eq!(h.timeline.schedule_info()[0].duration, 200.0);
    h.frame(100.0);
    assert_close(h.x(), 50.0);

    h.frames(5, 100.0);
    assert!(h.timeline.contains(id));
    assert_close(h.x(), 100.0);
}

#[test]
fn test_schedule_on_dropped_timeline_fails() {
    let timeline = Timeline::new(FrameQueue::new());
    let mut runner = Runner::new(100.0);
    runner.set_timeline(&timeline);
    drop(timeline);

    assert!(matches!(
        runner.schedule(None, 0.0, When::Last),
        Err(TimelineError::TimelineDropped)
    ));
}
