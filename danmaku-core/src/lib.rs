//! Danmaku Core Library
//!
//! This library provides the canonical comment record schema, keyframed
//! motion data and the comparator-sorted timeline that the playback engine
//! schedules from.

pub mod motion;
pub mod ordered;
pub mod record;
pub mod timeline;

pub use motion::{AlphaTrack, Easing, MotionProperty, MotionSegment, Tween};
pub use record::{Comment, FieldValue, Mode};
pub use timeline::Timeline;

/// Result type for danmaku-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Inconsistent ordering around index {index}: sequence is not sorted under its comparator")]
    InconsistentOrdering { index: usize },
}
