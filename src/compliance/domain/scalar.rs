use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// A single value observed on the target: one query cell or one registry value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn text(value: impl Into<String>) -> Self {
        Scalar::Text(value.into())
    }

    /// Numeric view of the value. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            Scalar::Bool(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            Scalar::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Trimmed textual form, used for list membership.
    pub fn normalized_text(&self) -> String {
        self.to_string().trim().to_string()
    }

    /// Loose equality: numbers numerically (so `"1"` equals `1`), booleans
    /// against "true"/"false", everything else as case-insensitive text.
    pub fn loosely_equals(&self, other: &Scalar) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (self.as_bool(), other.as_bool()) {
            return a == b;
        }
        self.normalized_text()
            .eq_ignore_ascii_case(&other.normalized_text())
    }

    /// Numeric ordering; `None` when either side is not a number.
    pub fn compare_numeric(&self, other: &Scalar) -> Option<Ordering> {
        let a = self.as_number()?;
        let b = other.as_number()?;
        a.partial_cmp(&b)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

/// One result row. Column names are matched case-insensitively, the way the
/// database engine resolves them; NULL cells are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Option<Scalar>>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<Scalar>) -> Self {
        self.0.insert(column.to_string(), Some(value.into()));
        self
    }

    pub fn with_null(mut self, column: &str) -> Self {
        self.0.insert(column.to_string(), None);
        self
    }

    /// Non-null value of `column`, if present.
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_ref())
    }
}
