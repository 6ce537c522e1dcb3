//! Headless sequence demo
//!
//! Chains a few runners on one target, retargets one mid-flight and settles
//! a spring, pumping frames by hand with a manual clock.
//!
//! Run with: cargo run -p blinc_timeline --example headless_sequence

use blinc_core::{shared, FrameQueue, ManualClock, PropertyBag};
use blinc_timeline::{AnimateOptions, Easing, Runner, SpringConfig, Timeline, TimelineConfig, When};

const FRAME_MS: f64 = 16.0;

fn main() -> blinc_timeline::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = TimelineConfig::from_toml(
        r#"
        duration = 300
        ease = "<>"
        "#,
    )?;

    let clock = ManualClock::new();
    let frames = FrameQueue::new();
    let timeline = Timeline::with_config(config, frames.clone());
    timeline.set_source(clock.clone());

    let bag = shared(
        PropertyBag::new()
            .with_attr("x", 0.0)
            .with_attr("y", 0.0)
            .with_attr("width", 40.0)
            .with_attr("height", 20.0)
            .with_style("opacity", 0.0),
    );

    // Fade in, then slide and grow, then a swinging nudge
    timeline.animate(bag.clone(), AnimateOptions::new().duration(200.0), |r| {
        r.css("opacity", 1.0);
    });
    let slide = timeline.animate(bag.clone(), AnimateOptions::new(), |r| {
        r.move_to(120.0, 40.0).size(Some(80.0), None);
    });
    timeline.animate(
        bag.clone(),
        AnimateOptions::new()
            .duration(150.0)
            .ease(Easing::Linear)
            .looping(2, true, 0.0),
        |r| {
            r.dy(-10.0);
        },
    );

    for info in timeline.schedule_info() {
        println!(
            "runner {:?}: {:>6.1} .. {:>6.1} ms",
            info.id, info.start, info.end
        );
    }

    let mut frame = 0;
    while frames.pending_count() > 0 && frame < 200 {
        clock.advance(FRAME_MS);
        frames.run_frame();
        frame += 1;

        // Redirect the slide halfway through
        if frame == 25 {
            timeline.with_runner(slide, |r| {
                r.x(200.0);
            });
        }

        let bag = bag.borrow();
        println!(
            "t={:>6.1} x={:>7.2} y={:>6.2} w={:>6.2} h={:>6.2} opacity={:.2}",
            timeline.time(),
            bag.attr("x").unwrap_or_default(),
            bag.attr("y").unwrap_or_default(),
            bag.attr("width").unwrap_or_default(),
            bag.attr("height").unwrap_or_default(),
            bag.style("opacity").unwrap_or_default(),
        );
    }

    // Springs have no fixed duration; they run until they settle
    let mut spring = Runner::new(SpringConfig::wobbly());
    spring.element(bag.clone()).x(0.0);
    spring.schedule(Some(&timeline), 0.0, When::Now)?;

    let mut settled = 0;
    while frames.pending_count() > 0 && settled < 600 {
        clock.advance(FRAME_MS);
        frames.run_frame();
        settled += 1;
    }
    println!(
        "spring settled after {} frames at x={:.2}",
        settled,
        bag.borrow().attr("x").unwrap_or_default()
    );

    Ok(())
}
