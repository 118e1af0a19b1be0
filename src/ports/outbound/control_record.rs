use crate::compliance::domain::{AbsencePolicy, Operator, Scalar};
use serde::Deserialize;
use std::collections::BTreeMap;

/// ControlRecord is one control as it appears in a catalog file
///
/// Every field is optional at this level so that the loader can report a
/// missing id or narrative field precisely instead of a generic parse error.
/// Unknown keys are rejected: a misspelled key must not silently drop a
/// constraint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default, alias = "severity")]
    pub impact: Option<f64>,
    #[serde(default, alias = "check")]
    pub check_text: Option<String>,
    #[serde(default, alias = "fix")]
    pub fix_text: Option<String>,
    #[serde(default, alias = "tags")]
    pub references: BTreeMap<String, OneOrMany>,
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub verify: Option<ProcedureRecord>,
    #[serde(default)]
    pub follow_up: Option<String>,
}

/// A reference entry may be a single identifier or a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(value) => vec![value.as_str()],
            OneOrMany::Many(values) => values.iter().map(|v| v.as_str()).collect(),
        }
    }
}

/// Expected value as written in the catalog: literal, list, or a named input
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ValueRecord {
    Input { input: String },
    List(Vec<Scalar>),
    One(Scalar),
}

/// Automated verification as written in the catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case", deny_unknown_fields)]
pub enum ProcedureRecord {
    SingleValue {
        query: Option<String>,
        column: Option<String>,
        path: Option<String>,
        operator: Option<Operator>,
        expected: ValueRecord,
        when_absent: Option<AbsencePolicy>,
    },
    SetMembership {
        query: String,
        column: String,
        allowed: Option<ValueRecord>,
        forbidden: Option<ValueRecord>,
    },
    Existence {
        query: Option<String>,
        column: Option<String>,
        path: Option<String>,
        operator: Option<Operator>,
        expected: Option<ValueRecord>,
        when_absent: Option<AbsencePolicy>,
    },
}
