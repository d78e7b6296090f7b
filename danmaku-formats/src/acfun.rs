//! AcFun JSON comment documents
//!
//! A document is an array of `{ "c": "stime,color,mode,size,user,date",
//! "m": text }` objects, sometimes wrapped in an outer array of pages.
//! Positioned comments (mode 7) put a JSON object in `m`.

use crate::{normalize_newlines, CommentFormat};
use danmaku_core::{Comment, Mode, MotionProperty, MotionSegment, Tween};
use serde::Deserialize;
use serde_json::Value;

/// Default length of one motion step
const STEP_DURATION_MS: f64 = 500.0;

/// Parser for AcFun JSON documents
#[derive(Debug, Clone, Copy, Default)]
pub struct AcfunFormat;

#[derive(Debug, Deserialize)]
struct RawComment {
    c: String,
    #[serde(default)]
    m: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FontSpec {
    f: Option<String>,
}

/// One step of a positioned comment's motion list
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Step {
    /// Length in seconds
    l: Option<f64>,
    /// Position in thousandths of the surface
    x: Option<f64>,
    y: Option<f64>,
    /// Alpha
    t: Option<f64>,
    /// Color
    c: Option<u32>,
    /// Scale
    f: Option<f64>,
    /// Z rotation
    d: Option<f64>,
    /// Y rotation
    e: Option<f64>,
}

/// Body of a positioned comment
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Advanced {
    n: String,
    a: Option<f64>,
    p: Option<Point>,
    c: Option<i64>,
    b: Option<bool>,
    l: Option<f64>,
    z: Vec<Step>,
    r: Option<f64>,
    k: Option<f64>,
    w: Option<FontSpec>,
}

impl CommentFormat for AcfunFormat {
    /// One `{c, m}` object
    type Unit = Value;
    /// A whole JSON document
    type Batch = str;

    fn parse_one(&self, unit: &Value) -> Option<Comment> {
        let raw = RawComment::deserialize(unit).ok()?;
        let fields: Vec<&str> = raw.c.split(',').map(str::trim).collect();
        let stime: f64 = fields.first()?.parse().ok()?;
        let field = |i: usize| fields.get(i).filter(|s| !s.is_empty());
        let mode = Mode::from_code(field(2)?.parse().ok()?);

        let mut comment = Comment::new(stime * 1000.0, mode, "");
        if let Some(color) = field(1).and_then(|s| s.parse().ok()) {
            comment.color = color;
        }
        if let Some(size) = field(3).and_then(|s| s.parse().ok()) {
            comment.size = size;
        }
        comment.hash = field(4).map(|s| s.to_string());
        comment.date = field(5).and_then(|s| s.parse().ok());

        if mode == Mode::Positioned {
            let body: Advanced = serde_json::from_str(&raw.m).ok()?;
            apply_advanced(&mut comment, body);
        } else {
            comment.text = normalize_newlines(&raw.m);
        }
        Some(comment)
    }

    fn parse_many(&self, batch: &str) -> Option<Vec<Comment>> {
        let value: Value = serde_json::from_str(batch).ok()?;
        let Value::Array(items) = value else {
            return None;
        };
        let mut comments = Vec::new();
        for item in flatten(&items) {
            match self.parse_one(item) {
                Some(comment) => comments.push(comment),
                None => tracing::debug!(unit = %item, "Skipped malformed comment"),
            }
        }
        Some(comments)
    }
}

/// Units of a document, looking through one level of page arrays
fn flatten(items: &[Value]) -> impl Iterator<Item = &Value> {
    items.iter().flat_map(|item| match item {
        Value::Array(page) => page.iter().collect::<Vec<_>>(),
        other => vec![other],
    })
}

/// Whether a parsed JSON document has the AcFun `{c, m}` shape
pub(crate) fn looks_like_acfun(value: &Value) -> bool {
    let Value::Array(items) = value else {
        return false;
    };
    flatten(items)
        .next()
        .and_then(Value::as_object)
        .is_some_and(|unit| unit.get("c").is_some_and(Value::is_string) && unit.contains_key("m"))
}

fn apply_advanced(comment: &mut Comment, body: Advanced) {
    comment.relative = true;
    comment.text = body.n;
    comment.opacity = body.a.unwrap_or(1.0);
    let (x, y) = body.p.map_or((0.0, 0.0), |p| (p.x / 1000.0, p.y / 1000.0));
    comment.x = Some(x);
    comment.y = Some(y);
    comment.align = match body.c {
        Some(2) => 1,
        Some(6) => 2,
        Some(8) => 3,
        Some(0) | None => 0,
        Some(other) => {
            tracing::warn!(alignment = other, "Unsupported alignment, using top-left");
            0
        }
    };
    comment.axis = 0;
    comment.shadow = body.b.unwrap_or(true);
    comment.dur = body.l.map_or(4000.0, |secs| secs * 1000.0);
    if let (Some(rz), Some(ry)) = (body.r, body.k) {
        comment.rz = rz;
        comment.ry = ry;
    }
    if let Some(font) = body.w.and_then(|w| w.f) {
        comment.font = Some(font);
    }

    if body.z.is_empty() {
        return;
    }
    let mut last_x = x;
    let mut last_y = y;
    let mut last_alpha = comment.opacity;
    let mut last_color = comment.color as f64;
    let mut last_scale = 1.0;
    let mut last_rz = comment.rz;
    let mut last_ry = comment.ry;
    let mut total = 0.0;
    let mut motion = Vec::with_capacity(body.z.len());
    for step in body.z {
        let dur = step.l.map_or(STEP_DURATION_MS, |secs| secs * 1000.0);
        total += dur;
        let mut segment = MotionSegment::new();
        let mut track = |property, last: &mut f64, to: Option<f64>| {
            if let Some(to) = to {
                segment.tweens.insert(property, Tween::linear(*last, to, dur));
                *last = to;
            }
        };
        track(MotionProperty::X, &mut last_x, step.x.map(|v| v / 1000.0));
        track(MotionProperty::Y, &mut last_y, step.y.map(|v| v / 1000.0));
        track(MotionProperty::Alpha, &mut last_alpha, step.t);
        track(MotionProperty::Color, &mut last_color, step.c.map(f64::from));
        track(MotionProperty::Scale, &mut last_scale, step.f);
        track(MotionProperty::Rz, &mut last_rz, step.d);
        track(MotionProperty::Ry, &mut last_ry, step.e);
        if segment.is_empty() {
            // keeps later steps on schedule
            segment.tweens.insert(MotionProperty::X, Tween::linear(last_x, last_x, dur));
        }
        motion.push(segment);
    }
    comment.motion = motion;
    comment.dur = total;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_plain_comments() {
        let doc = r#"[
            {"c": "1.5,16711680,1,25,user1,1500000000", "m": "first\\nline"},
            {"c": "broken", "m": "skip"},
            {"c": "3,255,5,18,user2,1500000001", "m": "top"},
            {"m": "no params"}
        ]"#;
        let comments = AcfunFormat.parse_many(doc).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].stime, 1500.0);
        assert_eq!(comments[0].color, 0xff0000);
        assert_eq!(comments[0].mode, Some(Mode::ScrollLeft));
        assert_eq!(comments[0].text, "first\nline");
        assert_eq!(comments[0].hash.as_deref(), Some("user1"));
        assert_eq!(comments[1].mode, Some(Mode::Top));
        assert_eq!(comments[1].size, 18.0);
        assert_eq!(comments[1].date, Some(1500000001));
    }

    #[test]
    fn test_pages_are_flattened() {
        let doc = r#"[[{"c": "0,0,1,25,u,0", "m": "a"}], [{"c": "1,0,1,25,u,0", "m": "b"}]]"#;
        let texts: Vec<String> = AcfunFormat
            .parse_many(doc)
            .unwrap()
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert!(looks_like_acfun(&serde_json::from_str(doc).unwrap()));
    }

    #[test]
    fn test_not_an_array() {
        assert_eq!(AcfunFormat.parse_many(r#"{"c": "0,0,1,25,u,0"}"#), None);
        assert_eq!(AcfunFormat.parse_many("<i/>"), None);
    }

    #[test]
    fn test_positioned_comment() {
        let body = json!({
            "n": "pos",
            "a": 0.8,
            "p": {"x": 250, "y": 500},
            "c": 6,
            "b": false,
            "l": 2.5,
            "r": 10,
            "k": 20,
            "w": {"f": "Heiti"}
        });
        let unit = json!({"c": "2,16777215,7,25,u,0", "m": body.to_string()});
        let comment = AcfunFormat.parse_one(&unit).unwrap();
        assert!(comment.relative);
        assert_eq!(comment.text, "pos");
        assert_eq!(comment.opacity, 0.8);
        assert_eq!((comment.x, comment.y), (Some(0.25), Some(0.5)));
        assert_eq!(comment.align, 2);
        assert!(!comment.shadow);
        assert_eq!(comment.dur, 2500.0);
        assert_eq!((comment.rz, comment.ry), (10.0, 20.0));
        assert_eq!(comment.font.as_deref(), Some("Heiti"));
        assert!(comment.motion.is_empty());
    }

    #[test]
    fn test_motion_steps_chain() {
        let body = json!({
            "n": "move",
            "p": {"x": 0, "y": 0},
            "z": [
                {"l": 1, "x": 500, "t": 0.5},
                {"y": 1000},
                {"l": 0.25}
            ]
        });
        let unit = json!({"c": "0,0,7,25,u,0", "m": body.to_string()});
        let comment = AcfunFormat.parse_one(&unit).unwrap();
        assert_eq!(
            comment.motion,
            vec![
                MotionSegment::new()
                    .with(MotionProperty::X, Tween::linear(0.0, 0.5, 1000.0))
                    .with(MotionProperty::Alpha, Tween::linear(1.0, 0.5, 1000.0)),
                MotionSegment::new().with(MotionProperty::Y, Tween::linear(0.0, 1.0, 500.0)),
                MotionSegment::new().with(MotionProperty::X, Tween::linear(0.5, 0.5, 250.0)),
            ]
        );
        assert_eq!(comment.dur, 1750.0);
    }

    #[test]
    fn test_malformed_body_is_skipped() {
        let unit = json!({"c": "0,0,7,25,u,0", "m": "{not json"});
        assert!(AcfunFormat.parse_one(&unit).is_none());
    }
}
