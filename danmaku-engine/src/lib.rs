//! Danmaku Engine Library
//!
//! This library schedules timestamped comments against a media play-head,
//! assigns them collision-free lanes and animates them on a host [`Stage`].

pub mod active;
pub mod allocator;
pub mod events;
pub mod filter;
pub mod manager;
pub mod stage;
pub mod ticker;

pub use active::{ActiveComment, CommentId, LifecycleState, Movement};
pub use allocator::{Footprint, Lane, OccupantSource, Placement, SpaceAllocator};
pub use events::{Bounds, Channel, Cleared, EngineEvents, Loaded, SubscriptionId};
pub use filter::{CommentFilter, FilterRule, RuleMode, RuleOp, RuleValue};
pub use manager::CommentManager;
pub use stage::{HeadlessStage, NodeId, NodeStyle, Point, Size, Stage, Transform};

use danmaku_core::Mode;
use std::collections::HashMap;
use std::time::Duration;

/// Result type for danmaku-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for danmaku-engine operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Danmaku core error: {0}")]
    Core(#[from] danmaku_core::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Render mode {0:?} is not supported by this stage")]
    UnsupportedRenderMode(RenderMode),

    #[error("Invalid filter rule: {0}")]
    InvalidRule(String),

    #[error("Invalid filter pattern: {0}")]
    Regex(#[from] regex::Error),
}

/// How scrolling comments are moved on the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Position is recomputed and written on every tick
    #[default]
    PerTick,
    /// The stage interpolates natively; positions are only written on
    /// discontinuities (mount, freeze, resume)
    Transition,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Opacity multiplier applied to every comment (0.0 - 1.0)
    pub global_opacity: f64,
    /// Lifetime multiplier applied to every comment
    pub global_scale: f64,
    /// Extra lifetime multiplier per movement category (missing = 1.0)
    pub category_scale: HashMap<Mode, f64>,
    /// Maximum simultaneously active comments (0 = unlimited)
    pub concurrency_limit: usize,
    /// Play-head jump, in ms, treated as a seek by `time()`
    pub seek_trigger_ms: f64,
    /// Vertical gap between stacked comments in pixels
    pub lane_spacing: f64,
    /// Interval of the internal tick driver
    pub tick_interval: Duration,
    pub render_mode: RenderMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_opacity: 1.0,
            global_scale: 1.0,
            category_scale: HashMap::new(),
            concurrency_limit: 0,
            seek_trigger_ms: 2000.0,
            lane_spacing: 3.0,
            tick_interval: Duration::from_millis(10),
            render_mode: RenderMode::PerTick,
        }
    }
}

impl EngineConfig {
    /// Lifetime multiplier for comments of `mode`
    pub fn scale_for(&self, mode: Mode) -> f64 {
        self.global_scale * self.category_scale.get(&mode).copied().unwrap_or(1.0)
    }

    /// Checks that every setting is within range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.global_opacity) {
            return Err(Error::InvalidConfig(format!(
                "global_opacity must be within 0.0..=1.0, got {}",
                self.global_opacity
            )));
        }
        if !(self.global_scale.is_finite() && self.global_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "global_scale must be positive, got {}",
                self.global_scale
            )));
        }
        if let Some((mode, scale)) = self
            .category_scale
            .iter()
            .find(|(_, s)| !(s.is_finite() && **s > 0.0))
        {
            return Err(Error::InvalidConfig(format!(
                "scale for mode {mode} must be positive, got {scale}"
            )));
        }
        if !(self.seek_trigger_ms.is_finite() && self.seek_trigger_ms > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "seek_trigger_ms must be positive, got {}",
                self.seek_trigger_ms
            )));
        }
        if !(self.lane_spacing.is_finite() && self.lane_spacing >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "lane_spacing must not be negative, got {}",
                self.lane_spacing
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(Error::InvalidConfig("tick_interval must be non-zero".into()));
        }
        Ok(())
    }
}
