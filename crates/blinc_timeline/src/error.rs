//! Timeline error types

use crate::timeline::RunnerId;
use thiserror::Error;

/// Errors raised by runners and timelines
#[derive(Error, Debug)]
pub enum TimelineError {
    /// A runner was scheduled with no timeline to schedule it on
    #[error("Runner cannot be scheduled without a timeline")]
    NoTimeline,

    /// The runner's timeline has been dropped
    #[error("Timeline no longer exists")]
    TimelineDropped,

    /// No runner with this id is scheduled on the timeline
    #[error("Runner {0:?} is not scheduled on this timeline")]
    UnknownRunner(RunnerId),

    /// Failed to parse timeline configuration
    #[error("Invalid timeline configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Unknown easing name
    #[error("Unknown easing: {0}")]
    InvalidEasing(String),

    /// Unknown scheduling placement
    #[error("Unknown placement: {0}")]
    InvalidPlacement(String),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
