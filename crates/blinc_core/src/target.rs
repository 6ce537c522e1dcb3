//! Animatable targets
//!
//! The subject an animation writes to. A target exposes one getter/setter
//! pair per animatable property, addressed by [`PropertyKey`].

use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

/// Which property namespace a key lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    /// Geometry and other element attributes (`x`, `width`, `opacity`, ...)
    Attr,
    /// Style properties
    Style,
}

/// Name of an animatable property
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    pub kind: PropertyKind,
    pub name: Cow<'static, str>,
}

impl PropertyKey {
    pub fn attr(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: PropertyKind::Attr,
            name: name.into(),
        }
    }

    pub fn style(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: PropertyKind::Style,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            PropertyKind::Attr => write!(f, "attr:{}", self.name),
            PropertyKind::Style => write!(f, "style:{}", self.name),
        }
    }
}

/// An object whose properties can be animated
pub trait Animatable {
    /// Read the live value of a property, `None` if the target lacks it
    fn get(&self, key: &PropertyKey) -> Option<f32>;

    /// Write a property
    fn set(&mut self, key: &PropertyKey, value: f32);
}

/// A target shared between the caller and the animations driving it
pub type SharedTarget = Rc<RefCell<dyn Animatable>>;

/// Wrap a target for sharing with runners
pub fn shared<T: Animatable + 'static>(target: T) -> Rc<RefCell<T>> {
    Rc::new(RefCell::new(target))
}

/// In-memory target storing plain property values
///
/// Useful headless and in tests; unknown properties read as `None`.
#[derive(Clone, Debug, Default)]
pub struct PropertyBag {
    values: FxHashMap<PropertyKey, f32>,
    writes: usize,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: seed an attribute
    pub fn with_attr(mut self, name: &'static str, value: f32) -> Self {
        self.values.insert(PropertyKey::attr(name), value);
        self
    }

    /// Builder: seed a style property
    pub fn with_style(mut self, name: &'static str, value: f32) -> Self {
        self.values.insert(PropertyKey::style(name), value);
        self
    }

    pub fn attr(&self, name: &'static str) -> Option<f32> {
        self.values.get(&PropertyKey::attr(name)).copied()
    }

    pub fn style(&self, name: &'static str) -> Option<f32> {
        self.values.get(&PropertyKey::style(name)).copied()
    }

    /// Number of setter calls received
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl Animatable for PropertyBag {
    fn get(&self, key: &PropertyKey) -> Option<f32> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &PropertyKey, value: f32) {
        self.writes += 1;
        self.values.insert(key.clone(), value);
    }
}
