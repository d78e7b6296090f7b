//! Canonical JSON records, the serialized form of [`Comment`]

use crate::CommentFormat;
use danmaku_core::Comment;
use serde::Deserialize;
use serde_json::Value;

/// Parser for arrays of canonical records, or `{ "comments": [...] }`
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonFormat;

impl CommentFormat for CommonFormat {
    type Unit = Value;
    type Batch = str;

    fn parse_one(&self, unit: &Value) -> Option<Comment> {
        if !unit.is_object() {
            return None;
        }
        Comment::deserialize(unit).ok()
    }

    fn parse_many(&self, batch: &str) -> Option<Vec<Comment>> {
        let value: Value = serde_json::from_str(batch).ok()?;
        let items = match &value {
            Value::Array(items) => items,
            Value::Object(map) => map.get("comments")?.as_array()?,
            _ => return None,
        };
        let mut comments = Vec::with_capacity(items.len());
        for item in items {
            match self.parse_one(item) {
                Some(comment) => comments.push(comment),
                None => tracing::debug!(unit = %item, "Skipped malformed record"),
            }
        }
        Some(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use danmaku_core::{Mode, MotionProperty, MotionSegment, Tween};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_records() {
        let doc = r#"[
            {"stime": 500, "mode": 1, "text": "a", "color": 255},
            {"stime": "late"},
            {"stime": 100, "text": "no mode"},
            7
        ]"#;
        let comments = CommonFormat.parse_many(doc).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].mode, Some(Mode::ScrollLeft));
        assert_eq!(comments[0].color, 255);
        assert_eq!(comments[0].dur, 4000.0);
        assert_eq!(comments[1].mode, None);
    }

    #[test]
    fn test_wrapped_document_with_motion() {
        let doc = r#"{"comments": [{
            "stime": 0, "mode": 7, "text": "m",
            "motion": [{"x": {"from": 0, "to": 10, "dur": 100}}]
        }]}"#;
        let comments = CommonFormat.parse_many(doc).unwrap();
        assert_eq!(
            comments[0].motion,
            vec![MotionSegment::new().with(MotionProperty::X, Tween::linear(0.0, 10.0, 100.0))]
        );
    }

    #[test]
    fn test_unrecognized_document() {
        assert_eq!(CommonFormat.parse_many("42"), None);
        assert_eq!(CommonFormat.parse_many(r#"{"items": []}"#), None);
    }
}
