//! Property helpers
//!
//! The fixed set of effects a runner can queue against its target. Every
//! helper registers its morph so that animating the same property again on
//! the same runner redirects the running morph instead of stacking a second
//! one.

use crate::morph::Morpher;
use crate::runner::{Retarget, Runner};
use blinc_core::PropertyKey;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

impl Runner {
    /// Animate an attribute to `value`
    pub fn attr(&mut self, name: impl Into<Cow<'static, str>>, value: f32) -> &mut Self {
        self.queue_property(PropertyKey::attr(name), value, false)
    }

    /// Animate several attributes at once
    pub fn attrs<I, K>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, f32)>,
        K: Into<Cow<'static, str>>,
    {
        for (name, value) in values {
            self.attr(name, value);
        }
        self
    }

    /// Animate a style property to `value`
    pub fn css(&mut self, name: impl Into<Cow<'static, str>>, value: f32) -> &mut Self {
        self.queue_property(PropertyKey::style(name), value, false)
    }

    pub fn x(&mut self, x: f32) -> &mut Self {
        self.attr("x", x)
    }

    pub fn y(&mut self, y: f32) -> &mut Self {
        self.attr("y", y)
    }

    pub fn cx(&mut self, cx: f32) -> &mut Self {
        self.attr("cx", cx)
    }

    pub fn cy(&mut self, cy: f32) -> &mut Self {
        self.attr("cy", cy)
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.x(x).y(y)
    }

    pub fn center(&mut self, cx: f32, cy: f32) -> &mut Self {
        self.cx(cx).cy(cy)
    }

    pub fn width(&mut self, width: f32) -> &mut Self {
        self.attr("width", width)
    }

    pub fn height(&mut self, height: f32) -> &mut Self {
        self.attr("height", height)
    }

    /// Animate width and height
    ///
    /// A missing side is derived from the target's current aspect ratio.
    pub fn size(&mut self, width: Option<f32>, height: Option<f32>) -> &mut Self {
        let aspect = self.target().and_then(|target| {
            let target = target.borrow();
            let w = target.get(&PropertyKey::attr("width"))?;
            let h = target.get(&PropertyKey::attr("height"))?;
            (w > 0.0 && h > 0.0).then(|| w / h)
        });

        match (width, height, aspect) {
            (Some(w), Some(h), _) => self.width(w).height(h),
            (Some(w), None, Some(aspect)) => self.width(w).height(w / aspect),
            (None, Some(h), Some(aspect)) => self.width(h * aspect).height(h),
            (Some(w), None, None) => self.width(w),
            (None, Some(h), None) => self.height(h),
            (None, None, _) => self,
        }
    }

    /// Move `x` by `dx` from wherever it is when the runner starts
    pub fn dx(&mut self, dx: f32) -> &mut Self {
        self.queue_property(PropertyKey::attr("x"), dx, true)
    }

    /// Move `y` by `dy` from wherever it is when the runner starts
    pub fn dy(&mut self, dy: f32) -> &mut Self {
        self.queue_property(PropertyKey::attr("y"), dy, true)
    }

    fn queue_property(&mut self, key: PropertyKey, value: f32, relative: bool) -> &mut Self {
        let Some(element) = self.target().cloned() else {
            tracing::warn!("Ignoring {} animation on a runner without a target", key);
            return self;
        };
        if self.try_retarget(&key, relative, value) {
            return self;
        }

        let morpher = Rc::new(RefCell::new(Morpher::new(self.stepper().clone())));
        morpher.borrow_mut().set_to(value);
        let delta = relative.then(|| (Rc::new(Cell::new(value)), Rc::new(Cell::new(None))));

        let initializer = {
            let element = element.clone();
            let key = key.clone();
            let morpher = morpher.clone();
            let delta = delta.clone();
            move || {
                let live = element.borrow().get(&key).unwrap_or(0.0);
                let mut morpher = morpher.borrow_mut();
                morpher.set_from(live);
                if let Some((delta, base)) = &delta {
                    let base = base.get().unwrap_or_else(|| {
                        base.set(Some(live));
                        live
                    });
                    morpher.set_to(base + delta.get());
                }
            }
        };

        let step = {
            let key = key.clone();
            let morpher = morpher.clone();
            move |position_or_dt: f64| {
                let mut morpher = morpher.borrow_mut();
                let value = morpher.at(position_or_dt);
                element.borrow_mut().set(&key, value);
                morpher.done()
            }
        };

        // Declarative morphs pick up the live value every frame
        let always_reinitialize = self.is_declarative();
        let entry = self.push_entry(Box::new(initializer), Box::new(step), always_reinitialize);
        self.retargets.insert(
            (key, relative),
            Retarget {
                morpher,
                entry,
                delta,
            },
        );
        self.wake_timeline();
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::easing::Easing;
    use crate::runner::Runner;
    use crate::spring::SpringConfig;
    use blinc_core::{shared, Animatable, PropertyBag, PropertyKey, SharedTarget};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn bag(seed: PropertyBag) -> (Rc<RefCell<PropertyBag>>, SharedTarget) {
        let bag = shared(seed);
        let target: SharedTarget = bag.clone();
        (bag, target)
    }

    #[test]
    fn test_attr_reads_live_value_on_start() {
        let (bag, target) = bag(PropertyBag::new().with_attr("x", 10.0));
        let mut runner = Runner::new(100.0);
        runner.element(target).ease(Easing::Linear).x(110.0);

        // Changed after the effect was queued but before it started
        bag.borrow_mut().set(&PropertyKey::attr("x"), 50.0);

        runner.step(50.0);
        assert_eq!(bag.borrow().attr("x"), Some(80.0));
        runner.step(50.0);
        assert_eq!(bag.borrow().attr("x"), Some(110.0));
    }

    #[test]
    fn test_retarget_is_continuous_and_reuses_entry() {
        let (bag, target) = bag(PropertyBag::new().with_attr("x", 0.0));
        let mut runner = Runner::new(1000.0);
        runner.element(target).ease(Easing::Linear).x(100.0);

        runner.step(500.0);
        let before = bag.borrow().attr("x").unwrap();
        assert_eq!(before, 50.0);

        runner.x(200.0);
        assert_eq!(runner.queue_len(), 1);

        runner.step(10.0);
        let after = bag.borrow().attr("x").unwrap();
        assert!(after > before && after - before < 5.0, "jumped from {before} to {after}");

        runner.step(490.0);
        assert!((bag.borrow().attr("x").unwrap() - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_relative_delta() {
        let (bag, target) = bag(PropertyBag::new().with_attr("x", 30.0));
        let mut runner = Runner::new(100.0);
        runner.element(target).ease(Easing::Linear).dx(20.0);

        runner.step(100.0);
        assert_eq!(bag.borrow().attr("x"), Some(50.0));
    }

    #[test]
    fn test_size_keeps_aspect_ratio() {
        let (bag, target) = bag(PropertyBag::new().with_attr("width", 200.0).with_attr("height", 100.0));
        let mut runner = Runner::new(100.0);
        runner.element(target).size(Some(400.0), None);

        runner.finish();
        assert_eq!(bag.borrow().attr("width"), Some(400.0));
        assert_eq!(bag.borrow().attr("height"), Some(200.0));
    }

    #[test]
    fn test_css_and_attrs() {
        let (bag, target) = bag(PropertyBag::new().with_style("opacity", 0.0));
        let mut runner = Runner::new(100.0);
        runner
            .element(target)
            .css("opacity", 1.0)
            .attrs([("width", 10.0), ("height", 20.0)]);
        assert_eq!(runner.queue_len(), 3);

        runner.finish();
        let bag = bag.borrow();
        assert_eq!(bag.style("opacity"), Some(1.0));
        assert_eq!(bag.attr("width"), Some(10.0));
        assert_eq!(bag.attr("height"), Some(20.0));
    }

    #[test]
    fn test_spring_runner_settles_on_target() {
        let (bag, target) = bag(PropertyBag::new().with_attr("cx", 0.0));
        let mut runner = Runner::new(SpringConfig::stiff());
        runner.element(target).cx(80.0);

        let mut frames = 0;
        while !runner.step_frame() && frames < 600 {
            frames += 1;
        }

        assert!(runner.is_done());
        assert_eq!(bag.borrow().attr("cx"), Some(80.0));
    }

    #[test]
    fn test_controller_on_eased_runner_keeps_easing() {
        let (bag, target) = bag(PropertyBag::new().with_attr("x", 0.0).with_attr("y", 0.0));
        let mut runner = Runner::new(100.0);
        runner.element(target).ease(Easing::Linear).x(100.0);
        runner.controller(SpringConfig::stiff()).y(50.0);

        runner.step(25.0);
        assert_eq!(bag.borrow().attr("x"), Some(25.0));
        assert_eq!(bag.borrow().attr("y"), Some(12.5));

        assert!(!runner.step(75.0));
        assert!(runner.step(16.0));
        assert_eq!(bag.borrow().attr("x"), Some(100.0));
        assert_eq!(bag.borrow().attr("y"), Some(50.0));
    }

    #[test]
    fn test_helpers_without_target_are_ignored() {
        let mut runner = Runner::new(100.0);
        runner.move_to(10.0, 20.0);
        assert_eq!(runner.queue_len(), 0);
    }
}
