//! Canonical comment record

use crate::motion::{AlphaTrack, MotionSegment};
use std::cmp::Ordering;
use std::fmt;

/// Default on-screen lifetime in milliseconds
pub const DEFAULT_DURATION_MS: f64 = 4000.0;

/// Default font size in pixels
pub const DEFAULT_FONT_SIZE: f64 = 25.0;

/// Movement category of a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u32", into = "u32"))]
pub enum Mode {
    /// Scrolls right to left along the top half
    ScrollLeft,
    /// Scrolls right to left, stacked from the bottom edge
    ScrollBottom,
    /// Static, anchored to the bottom edge
    Bottom,
    /// Static, anchored to the top edge
    Top,
    /// Scrolls left to right
    Reverse,
    /// Absolutely positioned, optionally keyframed
    Positioned,
    /// Script payload
    Code,
    /// Positioned variant used by some sources
    Advanced,
    /// Any code outside the known table
    Unknown(u32),
}

impl Mode {
    /// All known categories, in code order
    pub const KNOWN: [Mode; 8] = [
        Mode::ScrollLeft,
        Mode::ScrollBottom,
        Mode::Bottom,
        Mode::Top,
        Mode::Reverse,
        Mode::Positioned,
        Mode::Code,
        Mode::Advanced,
    ];

    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Mode::ScrollLeft,
            2 => Mode::ScrollBottom,
            4 => Mode::Bottom,
            5 => Mode::Top,
            6 => Mode::Reverse,
            7 => Mode::Positioned,
            8 => Mode::Code,
            17 => Mode::Advanced,
            other => Mode::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Mode::ScrollLeft => 1,
            Mode::ScrollBottom => 2,
            Mode::Bottom => 4,
            Mode::Top => 5,
            Mode::Reverse => 6,
            Mode::Positioned => 7,
            Mode::Code => 8,
            Mode::Advanced => 17,
            Mode::Unknown(code) => code,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Mode::Unknown(_))
    }

    /// Whether comments of this mode move across the surface on their own
    pub fn is_scrolling(self) -> bool {
        matches!(self, Mode::ScrollLeft | Mode::ScrollBottom | Mode::Reverse)
    }
}

impl From<u32> for Mode {
    fn from(code: u32) -> Self {
        Mode::from_code(code)
    }
}

impl From<Mode> for u32 {
    fn from(mode: Mode) -> Self {
        mode.code()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single timestamped comment as loaded from a source
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Comment {
    /// Activation offset in milliseconds
    pub stime: f64,
    /// Movement category; `None` when the source did not provide one
    pub mode: Option<Mode>,
    pub text: String,
    /// Font size in pixels
    pub size: f64,
    /// Packed 0xRRGGBB color
    pub color: u32,
    /// Lifetime in milliseconds
    pub dur: f64,
    /// Posting timestamp, first tie-breaker
    pub date: Option<i64>,
    /// Database id, second tie-breaker
    pub dbid: Option<i64>,
    pub pool: i32,
    pub hash: Option<String>,
    pub motion: Vec<MotionSegment>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    /// `x`/`y` are fractions of the surface rather than pixels
    pub relative: bool,
    /// Anchor corner: bit 0 selects the right edge, bit 1 the bottom edge
    pub align: u8,
    /// Axis flip, same bit layout as `align`
    pub axis: u8,
    pub opacity: f64,
    pub alpha: Option<AlphaTrack>,
    pub rz: f64,
    pub ry: f64,
    pub shadow: bool,
    pub border: bool,
    pub font: Option<String>,
}

impl Default for Comment {
    fn default() -> Self {
        Self {
            stime: 0.0,
            mode: None,
            text: String::new(),
            size: DEFAULT_FONT_SIZE,
            color: 0xffffff,
            dur: DEFAULT_DURATION_MS,
            date: None,
            dbid: None,
            pool: 0,
            hash: None,
            motion: Vec::new(),
            x: None,
            y: None,
            relative: false,
            align: 0,
            axis: 0,
            opacity: 1.0,
            alpha: None,
            rz: 0.0,
            ry: 0.0,
            shadow: true,
            border: false,
            font: None,
        }
    }
}

/// Value a dotted subject path resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl Comment {
    /// Creates a comment with default styling
    pub fn new(stime: f64, mode: Mode, text: impl Into<String>) -> Self {
        Self {
            stime,
            mode: Some(mode),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_dur(mut self, dur: f64) -> Self {
        self.dur = dur;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }

    pub fn with_date(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_dbid(mut self, dbid: i64) -> Self {
        self.dbid = Some(dbid);
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = Some(x);
        self.y = Some(y);
        self
    }

    pub fn with_motion(mut self, motion: Vec<MotionSegment>) -> Self {
        self.motion = motion;
        self
    }

    /// Timeline comparator: stime, then date, then dbid.
    ///
    /// A missing date or dbid sorts before any present one, which keeps the
    /// order total. Records equal on all three keep their relative order.
    pub fn compare(a: &Comment, b: &Comment) -> Ordering {
        a.stime
            .total_cmp(&b.stime)
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.dbid.cmp(&b.dbid))
    }

    /// Resolves a dotted subject path such as `text.length` or `alpha.from`.
    ///
    /// Empty path segments are skipped. Returns `None` for anything the
    /// record does not carry.
    pub fn field(&self, path: &str) -> Option<FieldValue> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let head = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        let number = |n: f64| Some(FieldValue::Number(n));
        let value = match head {
            "stime" => number(self.stime),
            "mode" => self.mode.map(|m| FieldValue::Number(m.code() as f64)),
            "size" => number(self.size),
            "color" => number(self.color as f64),
            "dur" => number(self.dur),
            "date" => self.date.map(|d| FieldValue::Number(d as f64)),
            "dbid" => self.dbid.map(|d| FieldValue::Number(d as f64)),
            "pool" => number(self.pool as f64),
            "x" => self.x.map(FieldValue::Number),
            "y" => self.y.map(FieldValue::Number),
            "align" => number(self.align as f64),
            "axis" => number(self.axis as f64),
            "opacity" => number(self.opacity),
            "rz" => number(self.rz),
            "ry" => number(self.ry),
            "text" => Some(FieldValue::Text(self.text.clone())),
            "hash" => self.hash.clone().map(FieldValue::Text),
            "font" => self.font.clone().map(FieldValue::Text),
            "alpha" => {
                let alpha = self.alpha?;
                return match rest.as_slice() {
                    ["from"] => number(alpha.from),
                    ["to"] => number(alpha.to),
                    _ => None,
                };
            }
            "motion" => {
                return match rest.as_slice() {
                    ["length"] => number(self.motion.len() as f64),
                    _ => None,
                };
            }
            _ => None,
        }?;

        match rest.as_slice() {
            [] => Some(value),
            ["length"] => match value {
                FieldValue::Text(s) => number(s.chars().count() as f64),
                FieldValue::Number(_) => None,
            },
            _ => None,
        }
    }
}
