//! Danmaku Formats Library
//!
//! This library converts source-specific comment encodings into the
//! canonical [`Comment`] record. Malformed units are skipped, never raised.

pub mod acfun;
pub mod bilibili;
pub mod common;

pub use acfun::AcfunFormat;
pub use bilibili::BilibiliFormat;
pub use common::CommonFormat;

use danmaku_core::Comment;
use serde_json::Value;
use std::fmt;

/// A decoder from one source encoding to canonical records
pub trait CommentFormat {
    /// A single raw comment
    type Unit: ?Sized;
    /// A whole raw document
    type Batch: ?Sized;

    /// Decodes one unit; `None` if it is malformed
    fn parse_one(&self, unit: &Self::Unit) -> Option<Comment>;

    /// Decodes a batch, skipping malformed units. `None` only when the batch
    /// itself is not in this format.
    fn parse_many(&self, batch: &Self::Batch) -> Option<Vec<Comment>>;
}

/// Encodings understood by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Bilibili,
    Acfun,
    Common,
}

impl SourceFormat {
    /// Guesses the encoding of a document from its content
    pub fn detect(input: &str) -> Option<Self> {
        let trimmed = input.trim_start_matches('\u{feff}').trim_start();
        match trimmed.chars().next()? {
            '<' => Some(SourceFormat::Bilibili),
            '[' | '{' => {
                let value: Value = serde_json::from_str(trimmed).ok()?;
                if acfun::looks_like_acfun(&value) {
                    Some(SourceFormat::Acfun)
                } else {
                    Some(SourceFormat::Common)
                }
            }
            _ => None,
        }
    }

    /// Parses a whole document in this encoding
    pub fn parse(self, input: &str) -> Option<Vec<Comment>> {
        match self {
            SourceFormat::Bilibili => BilibiliFormat.parse_many(input),
            SourceFormat::Acfun => AcfunFormat.parse_many(input),
            SourceFormat::Common => CommonFormat.parse_many(input),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceFormat::Bilibili => "bilibili",
            SourceFormat::Acfun => "acfun",
            SourceFormat::Common => "json",
        };
        f.write_str(name)
    }
}

/// Reads a JSON value that may be a number or a numeric string
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Replaces the newline spellings found in comment sources with `\n`
pub(crate) fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace("\\n", "\n")
        .replace("/n", "\n")
        .replace("\\r", "\n")
        .replace('\r', "\n")
}
