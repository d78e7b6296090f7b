//! Accept/reject rules and record modifiers applied before activation

use crate::{Error, Result};
use danmaku_core::{Comment, FieldValue, Mode};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Whether a rule must match or must not match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMode {
    Accept,
    Reject,
}

/// Comparison performed by a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOp {
    /// `<`, numeric
    Less,
    /// `>`, numeric
    Greater,
    /// `~`, regular expression
    Matches,
    /// `=`, numeric or string equality
    Equals,
    /// `!`, inverts a nested rule
    Not,
    /// `&&`, every nested rule matches
    All,
    /// `||`, at least one nested rule matches
    Any,
}

impl RuleOp {
    /// Parses the operator token used in rule definitions
    pub fn from_token(token: &str) -> Result<Self> {
        match token {
            "<" => Ok(RuleOp::Less),
            ">" => Ok(RuleOp::Greater),
            "~" => Ok(RuleOp::Matches),
            "=" => Ok(RuleOp::Equals),
            "!" => Ok(RuleOp::Not),
            "&&" => Ok(RuleOp::All),
            "||" => Ok(RuleOp::Any),
            other => Err(Error::InvalidRule(format!("unknown operator {other:?}"))),
        }
    }
}

/// Operand of a rule
#[derive(Debug, Clone)]
pub enum RuleValue {
    Number(f64),
    Text(String),
    Pattern(Regex),
    Rule(Box<FilterRule>),
    Rules(Vec<FilterRule>),
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        RuleValue::Number(n)
    }
}

impl From<i64> for RuleValue {
    fn from(n: i64) -> Self {
        RuleValue::Number(n as f64)
    }
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::Text(s.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(s: String) -> Self {
        RuleValue::Text(s)
    }
}

impl From<FilterRule> for RuleValue {
    fn from(rule: FilterRule) -> Self {
        RuleValue::Rule(Box::new(rule))
    }
}

impl From<Vec<FilterRule>> for RuleValue {
    fn from(rules: Vec<FilterRule>) -> Self {
        RuleValue::Rules(rules)
    }
}

/// A single filter condition over a dotted subject path
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub subject: String,
    pub op: RuleOp,
    pub value: RuleValue,
    pub mode: RuleMode,
}

impl FilterRule {
    /// Builds a rule, checking that the operand fits the operator.
    ///
    /// Patterns for `~` are compiled here, so a bad expression fails at setup
    /// rather than during playback.
    pub fn new(
        subject: impl Into<String>,
        op: RuleOp,
        value: impl Into<RuleValue>,
        mode: RuleMode,
    ) -> Result<Self> {
        let subject = subject.into();
        let value = match (op, value.into()) {
            (RuleOp::Less | RuleOp::Greater, RuleValue::Number(n)) => RuleValue::Number(n),
            (RuleOp::Matches, RuleValue::Text(pattern)) => RuleValue::Pattern(Regex::new(&pattern)?),
            (RuleOp::Matches, RuleValue::Pattern(re)) => RuleValue::Pattern(re),
            (RuleOp::Equals, v @ (RuleValue::Number(_) | RuleValue::Text(_))) => v,
            (RuleOp::Not, RuleValue::Rule(rule)) => RuleValue::Rule(rule),
            (RuleOp::All | RuleOp::Any, RuleValue::Rules(rules)) => RuleValue::Rules(rules),
            (op, value) => {
                return Err(Error::InvalidRule(format!(
                    "operator {op:?} cannot take {} on subject {subject:?}",
                    value.kind()
                )))
            }
        };
        Ok(Self {
            subject,
            op,
            value,
            mode,
        })
    }

    /// Rule whose matching records are dropped
    pub fn reject(subject: impl Into<String>, op: RuleOp, value: impl Into<RuleValue>) -> Result<Self> {
        Self::new(subject, op, value, RuleMode::Reject)
    }

    /// Rule every activated record has to match
    pub fn accept(subject: impl Into<String>, op: RuleOp, value: impl Into<RuleValue>) -> Result<Self> {
        Self::new(subject, op, value, RuleMode::Accept)
    }

    /// Evaluates the condition. A subject the record does not carry matches;
    /// an operand the subject cannot be compared with does not.
    pub fn matches(&self, record: &Comment) -> bool {
        match (&self.op, &self.value) {
            (RuleOp::Not, RuleValue::Rule(inner)) => return !inner.matches(record),
            (RuleOp::All, RuleValue::Rules(rules)) => return rules.iter().all(|r| r.matches(record)),
            (RuleOp::Any, RuleValue::Rules(rules)) => return rules.iter().any(|r| r.matches(record)),
            _ => {}
        }

        let Some(field) = record.field(&self.subject) else {
            return true;
        };
        match (&self.op, &self.value) {
            (RuleOp::Less, RuleValue::Number(n)) => field.as_number().is_some_and(|f| f < *n),
            (RuleOp::Greater, RuleValue::Number(n)) => field.as_number().is_some_and(|f| f > *n),
            (RuleOp::Matches, RuleValue::Pattern(re)) => re.is_match(&field.to_string()),
            (RuleOp::Equals, RuleValue::Number(n)) => field.as_number().is_some_and(|f| f == *n),
            (RuleOp::Equals, RuleValue::Text(s)) => match &field {
                FieldValue::Text(t) => t == s,
                FieldValue::Number(f) => s.trim().parse::<f64>().is_ok_and(|n| n == *f),
            },
            _ => false,
        }
    }
}

impl RuleValue {
    fn kind(&self) -> &'static str {
        match self {
            RuleValue::Number(_) => "a number",
            RuleValue::Text(_) => "a string",
            RuleValue::Pattern(_) => "a pattern",
            RuleValue::Rule(_) => "a rule",
            RuleValue::Rules(_) => "a rule list",
        }
    }
}

type Modifier = Box<dyn Fn(Comment) -> Comment>;

/// Validation and transformation applied to records before activation
pub struct CommentFilter {
    rules: Vec<FilterRule>,
    modifiers: Vec<Modifier>,
    allowed_modes: HashMap<Mode, bool>,
    allow_unknown: bool,
}

impl Default for CommentFilter {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            modifiers: Vec::new(),
            allowed_modes: Mode::KNOWN.iter().map(|m| (*m, true)).collect(),
            allow_unknown: true,
        }
    }
}

impl fmt::Debug for CommentFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommentFilter")
            .field("rules", &self.rules)
            .field("modifiers", &self.modifiers.len())
            .field("allowed_modes", &self.allowed_modes)
            .field("allow_unknown", &self.allow_unknown)
            .finish()
    }
}

impl CommentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: FilterRule) {
        self.rules.push(rule);
    }

    /// Removes every rule on `subject`, returning how many were dropped
    pub fn remove_rules(&mut self, subject: &str) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.subject != subject);
        before - self.rules.len()
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    /// Registers a transform; transforms run in registration order
    pub fn add_modifier(&mut self, modifier: impl Fn(Comment) -> Comment + 'static) {
        self.modifiers.push(Box::new(modifier));
    }

    /// Enables or disables a known movement category
    pub fn set_mode_allowed(&mut self, mode: Mode, allowed: bool) {
        if mode.is_known() {
            self.allowed_modes.insert(mode, allowed);
        }
    }

    pub fn set_allow_unknown(&mut self, allowed: bool) {
        self.allow_unknown = allowed;
    }

    pub fn is_mode_allowed(&self, mode: Mode) -> bool {
        if mode.is_known() {
            self.allowed_modes.get(&mode).copied().unwrap_or(true)
        } else {
            self.allow_unknown
        }
    }

    /// Whether `record` may be activated
    pub fn validate(&self, record: &Comment) -> bool {
        let Some(mode) = record.mode else {
            return false;
        };
        if !self.is_mode_allowed(mode) {
            return false;
        }
        self.rules.iter().all(|rule| match rule.mode {
            RuleMode::Accept => rule.matches(record),
            RuleMode::Reject => !rule.matches(record),
        })
    }

    /// Runs every modifier over the record
    pub fn modify(&self, record: Rc<Comment>) -> Rc<Comment> {
        if self.modifiers.is_empty() {
            return record;
        }
        let owned = Rc::try_unwrap(record).unwrap_or_else(|shared| (*shared).clone());
        Rc::new(self.modifiers.iter().fold(owned, |acc, modifier| modifier(acc)))
    }
}
