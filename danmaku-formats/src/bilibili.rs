//! Bilibili XML comment documents
//!
//! Each comment is a `<d p="stime,mode,size,color,date,pool,hash,dbid">`
//! element. Positioned comments (mode 7) carry a JSON array in their text
//! that is often truncated or badly escaped, so it is repaired before
//! decoding.

use crate::{normalize_newlines, number, CommentFormat};
use danmaku_core::{AlphaTrack, Comment, Mode, MotionProperty, MotionSegment, Tween};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Lifetime of positioned comments whose duration field is missing or too long
const ADVANCED_FALLBACK_DURATION_MS: f64 = 2500.0;
/// Default length of a linear move in positioned comments
const MOVE_DURATION_MS: f64 = 500.0;

fn element_regex() -> &'static Regex {
    static ELEMENT_RE: OnceLock<Regex> = OnceLock::new();
    ELEMENT_RE.get_or_init(|| {
        Regex::new(r#"(?s)<d\s[^>]*?\bp\s*=\s*(?:"([^"]*)"|'([^']*)')[^>]*>(.*?)</d\s*>"#)
            .expect("element regex should compile")
    })
}

fn path_regex() -> &'static Regex {
    static PATH_RE: OnceLock<Regex> = OnceLock::new();
    PATH_RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z])\s*(\d+)[, ](\d+)").expect("path regex should compile")
    })
}

/// Parser for Bilibili XML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct BilibiliFormat;

impl CommentFormat for BilibiliFormat {
    /// One `<d>` element
    type Unit = str;
    /// A whole XML document
    type Batch = str;

    fn parse_one(&self, unit: &str) -> Option<Comment> {
        let captures = element_regex().captures(unit)?;
        let params = captures.get(1).or_else(|| captures.get(2))?.as_str();
        let text = captures.get(3).map_or("", |m| m.as_str());
        parse_element(params, &unescape(text))
    }

    fn parse_many(&self, batch: &str) -> Option<Vec<Comment>> {
        let trimmed = batch.trim_start_matches('\u{feff}').trim_start();
        if !trimmed.starts_with('<') {
            return None;
        }
        let mut comments = Vec::new();
        for element in element_regex().find_iter(trimmed) {
            match self.parse_one(element.as_str()) {
                Some(comment) => comments.push(comment),
                None => tracing::debug!(element = element.as_str(), "Skipped malformed comment"),
            }
        }
        Some(comments)
    }
}

fn parse_element(params: &str, text: &str) -> Option<Comment> {
    let fields: Vec<&str> = params.split(',').map(str::trim).collect();
    let stime: f64 = fields.first()?.parse().ok()?;
    let mode = Mode::from_code(fields.get(1)?.parse().ok()?);
    let field = |i: usize| fields.get(i).filter(|s| !s.is_empty());

    let mut comment = Comment::new((stime * 1000.0).round(), mode, "");
    if let Some(size) = field(2).and_then(|s| s.parse().ok()) {
        comment.size = size;
    }
    if let Some(color) = field(3).and_then(|s| s.parse().ok()) {
        comment.color = color;
    }
    comment.date = field(4).and_then(|s| s.parse().ok());
    comment.pool = field(5).and_then(|s| s.parse().ok()).unwrap_or(0);
    comment.hash = field(6).map(|s| s.to_string());
    comment.dbid = field(7).and_then(|s| s.parse().ok());
    comment.border = false;

    match mode {
        Mode::Positioned => apply_advanced(&mut comment, text)?,
        Mode::Code => comment.text = text.to_string(),
        _ => comment.text = normalize_newlines(text),
    }
    Some(comment)
}

/// Decodes the JSON array of a positioned comment:
/// `[x, y, "alpha-from-alpha-to", lifetime_s, text, rz, ry, to_x, to_y,
///   move_ms, delay_ms, shadow, font, linear_speedup, path]`
fn apply_advanced(comment: &mut Comment, text: &str) -> Option<()> {
    let values = match repair_json(text)? {
        Value::Array(values) => values,
        _ => return None,
    };
    if values.len() < 5 {
        return None;
    }

    let x = number(&values[0]).unwrap_or(0.0);
    let y = number(&values[1]).unwrap_or(0.0);
    comment.x = Some(x);
    comment.y = Some(y);
    comment.relative = x.fract() != 0.0 || y.fract() != 0.0;
    comment.text = match &values[4] {
        Value::String(s) => normalize_newlines(s),
        other => other.to_string(),
    };
    comment.shadow = true;

    if values.len() >= 7 {
        comment.rz = number(&values[5]).map(f64::trunc).unwrap_or(0.0);
        comment.ry = number(&values[6]).map(f64::trunc).unwrap_or(0.0);
    }

    if values.len() >= 11 {
        apply_motion(comment, &values, x, y);
    }

    comment.dur = match number(&values[3]) {
        Some(secs) if secs < 12.0 => secs * 1000.0,
        _ => ADVANCED_FALLBACK_DURATION_MS,
    };

    match &values[2] {
        Value::String(range) => {
            let bounds: Vec<f64> = range.split('-').filter_map(|s| s.trim().parse().ok()).collect();
            if let &[from, to] = bounds.as_slice() {
                comment.opacity = from;
                if from != to {
                    comment.alpha = Some(AlphaTrack { from, to });
                }
            } else if let &[only] = bounds.as_slice() {
                comment.opacity = only;
            }
        }
        Value::Number(n) => comment.opacity = n.as_f64().unwrap_or(1.0),
        _ => {}
    }
    Some(())
}

fn apply_motion(comment: &mut Comment, values: &[Value], x: f64, y: f64) {
    let present = |v: &Value| !matches!(v, Value::Null) && v.as_str() != Some("");
    let step = if present(&values[9]) {
        number(&values[9]).map(f64::trunc).unwrap_or(MOVE_DURATION_MS)
    } else {
        MOVE_DURATION_MS
    };
    let delay = if present(&values[10]) {
        number(&values[10]).map(f64::trunc).unwrap_or(0.0)
    } else {
        0.0
    };
    let to_x = number(&values[7]).unwrap_or(x);
    let to_y = number(&values[8]).unwrap_or(y);
    let mut motion = vec![MotionSegment::new()
        .with(MotionProperty::X, Tween::linear(x, to_x, step).with_delay(delay))
        .with(MotionProperty::Y, Tween::linear(y, to_y, step).with_delay(delay))];

    if values.len() > 11 {
        match &values[11] {
            Value::Bool(shadow) => comment.shadow = *shadow,
            Value::String(s) if s == "false" => comment.shadow = false,
            Value::String(s) if s == "true" => comment.shadow = true,
            _ => {}
        }
        if let Some(Value::String(font)) = values.get(12) {
            if !font.is_empty() {
                comment.font = Some(font.clone());
            }
        }
        if let Some(Value::String(path)) = values.get(14) {
            if !path.trim().is_empty() {
                if comment.relative {
                    tracing::warn!("Path motion with relative coordinates, treating them as absolute");
                    comment.relative = false;
                }
                motion = path_motion(path, x, y, step);
            }
        }
    }
    comment.motion = motion;
}

/// Expands `M x,y L x,y ...` into one linear segment per line command,
/// sharing `total_ms` evenly across all commands.
fn path_motion(path: &str, x: f64, y: f64, total_ms: f64) -> Vec<MotionSegment> {
    let commands = path.chars().filter(char::is_ascii_alphabetic).count().max(1);
    let step = total_ms / commands as f64;
    let mut last = (x, y);
    let mut segments = Vec::new();
    for captures in path_regex().captures_iter(path) {
        let (Ok(px), Ok(py)) = (captures[2].parse::<f64>(), captures[3].parse::<f64>()) else {
            continue;
        };
        match &captures[1] {
            "M" => last = (px, py),
            "L" => {
                segments.push(
                    MotionSegment::new()
                        .with(MotionProperty::X, Tween::linear(last.0, px, step))
                        .with(MotionProperty::Y, Tween::linear(last.1, py, step)),
                );
                last = (px, py);
            }
            _ => {}
        }
    }
    segments
}

/// Parses the positional array, closing truncated input and escaping raw
/// control characters when the text is not valid JSON as is.
fn repair_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if !text.starts_with('[') {
        return None;
    }
    let mut json = match text.chars().last() {
        Some(']') => text.to_string(),
        Some('"') => format!("{text}]"),
        _ => format!("{text}\"]"),
    };
    json = json.replace('\t', "\\t");
    if let Ok(value) = serde_json::from_str(&json) {
        return Some(value);
    }
    let escaped = json.replace("\r\n", "\\n").replace('\n', "\\n").replace('\r', "\\n");
    match serde_json::from_str(&escaped) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Unrecoverable positioned comment payload");
            None
        }
    }
}

fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
