//! Timeline defaults
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! duration = 250
//! ease = "<>"
//! when = "now"
//! persist = "forever"
//! ```

use crate::easing::Easing;
use crate::error::Result;
use crate::options::{Persist, When};
use serde::{Deserialize, Serialize};

/// Defaults applied to runners built through a timeline
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TimelineConfig {
    /// Per-pass duration in milliseconds
    #[serde(default = "default_duration")]
    pub duration: f64,
    /// Start delay in milliseconds
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub when: When,
    #[serde(default)]
    pub ease: Easing,
    #[serde(default, with = "persist_repr")]
    pub persist: Persist,
    /// Time advanced by a runner step without an explicit delta
    #[serde(default = "default_frame_budget")]
    pub frame_budget: f64,
}

fn default_duration() -> f64 {
    400.0
}

fn default_frame_budget() -> f64 {
    16.0
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            delay: 0.0,
            when: When::Last,
            ease: Easing::EaseOutSine,
            persist: Persist::default(),
            frame_budget: default_frame_budget(),
        }
    }
}

impl TimelineConfig {
    /// Parse a configuration document
    pub fn from_toml(source: &str) -> Result<Self> {
        let config: TimelineConfig = toml::from_str(source)?;
        tracing::debug!(
            "TimelineConfig loaded: duration={} ease={:?} persist={:?}",
            config.duration,
            config.ease,
            config.persist
        );
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string(self).unwrap_or_default()
    }
}

/// `persist = 250` or `persist = "forever"`
mod persist_repr {
    use crate::options::Persist;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize, Serialize)]
    #[serde(untagged)]
    enum Repr {
        Millis(f64),
        Keyword(String),
    }

    pub fn serialize<S: Serializer>(persist: &Persist, serializer: S) -> Result<S::Ok, S::Error> {
        match persist {
            Persist::For(ms) => Repr::Millis(*ms),
            Persist::Forever => Repr::Keyword("forever".to_string()),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Persist, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Millis(ms) if ms.is_finite() => Ok(Persist::For(ms.max(0.0))),
            Repr::Millis(_) => Ok(Persist::Forever),
            Repr::Keyword(word) if word == "forever" => Ok(Persist::Forever),
            Repr::Keyword(word) => Err(de::Error::custom(format!(
                "expected milliseconds or \"forever\", got {word:?}"
            ))),
        }
    }
}
