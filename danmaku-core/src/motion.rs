//! Keyframed motion data for positioned comments

use std::collections::BTreeMap;

/// Easing curve applied to a single tween
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Easing {
    #[default]
    Linear,
    QuadIn,
    QuadOut,
    QuadInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    ExpoIn,
    ExpoOut,
    SineInOut,
}

impl Easing {
    /// Evaluates the curve.
    ///
    /// `t` is the elapsed time, `b` the start value, `c` the total change and
    /// `d` the duration. A non-positive duration jumps straight to `b + c`.
    pub fn apply(self, t: f64, b: f64, c: f64, d: f64) -> f64 {
        if d <= 0.0 {
            return b + c;
        }
        let p = (t / d).clamp(0.0, 1.0);
        let eased = match self {
            Easing::Linear => p,
            Easing::QuadIn => p * p,
            Easing::QuadOut => p * (2.0 - p),
            Easing::QuadInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    -1.0 + (4.0 - 2.0 * p) * p
                }
            }
            Easing::CubicIn => p * p * p,
            Easing::CubicOut => {
                let q = p - 1.0;
                q * q * q + 1.0
            }
            Easing::CubicInOut => {
                if p < 0.5 {
                    4.0 * p * p * p
                } else {
                    let q = 2.0 * p - 2.0;
                    0.5 * q * q * q + 1.0
                }
            }
            Easing::ExpoIn => {
                if p == 0.0 {
                    0.0
                } else {
                    2f64.powf(10.0 * (p - 1.0))
                }
            }
            Easing::ExpoOut => {
                if p == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * p)
                }
            }
            Easing::SineInOut => -0.5 * ((std::f64::consts::PI * p).cos() - 1.0),
        };
        b + c * eased
    }
}

/// Property a tween drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MotionProperty {
    X,
    Y,
    Alpha,
    Color,
    Rz,
    Ry,
    Scale,
}

/// Interpolation of one property from `from` to `to`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tween {
    pub from: f64,
    pub to: f64,
    /// Duration in milliseconds
    pub dur: f64,
    /// Delay before the tween starts, in milliseconds
    #[cfg_attr(feature = "serde", serde(default))]
    pub delay: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub easing: Easing,
}

impl Tween {
    /// Creates a linear tween with no delay
    pub fn linear(from: f64, to: f64, dur: f64) -> Self {
        Self {
            from,
            to,
            dur,
            delay: 0.0,
            easing: Easing::Linear,
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Value at `elapsed` ms into the owning segment
    pub fn value_at(&self, elapsed: f64) -> f64 {
        let t = (elapsed - self.delay).clamp(0.0, self.dur.max(0.0));
        self.easing.apply(t, self.from, self.to - self.from, self.dur)
    }

    /// Fraction of the tween completed at `elapsed`, eased
    pub fn progress_at(&self, elapsed: f64) -> f64 {
        let t = (elapsed - self.delay).clamp(0.0, self.dur.max(0.0));
        self.easing.apply(t, 0.0, 1.0, self.dur)
    }

    /// Time from segment start until this tween is done
    pub fn span(&self) -> f64 {
        self.dur.max(0.0) + self.delay.max(0.0)
    }
}

/// One keyframe segment: a set of tweens that run concurrently
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MotionSegment {
    pub tweens: BTreeMap<MotionProperty, Tween>,
}

impl MotionSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the tween for `property`
    pub fn with(mut self, property: MotionProperty, tween: Tween) -> Self {
        self.tweens.insert(property, tween);
        self
    }

    /// Length of the segment: the longest `dur + delay` among its tweens
    pub fn span(&self) -> f64 {
        self.tweens.values().map(Tween::span).fold(0.0, f64::max)
    }

    pub fn is_empty(&self) -> bool {
        self.tweens.is_empty()
    }
}

/// Linear opacity range interpolated over a comment's whole lifetime
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlphaTrack {
    pub from: f64,
    pub to: f64,
}

impl AlphaTrack {
    /// Alpha after `elapsed` of `duration` ms
    pub fn value_at(&self, elapsed: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return self.to;
        }
        let p = (elapsed / duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * p
    }
}

/// Interpolates two packed RGB colors channel by channel
pub fn lerp_color(from: u32, to: u32, progress: f64) -> u32 {
    let p = progress.clamp(0.0, 1.0);
    let channel = |shift: u32| {
        let a = ((from >> shift) & 0xff) as f64;
        let b = ((to >> shift) & 0xff) as f64;
        ((a + (b - a) * p).round() as u32) & 0xff
    };
    (channel(16) << 16) | (channel(8) << 8) | channel(0)
}
