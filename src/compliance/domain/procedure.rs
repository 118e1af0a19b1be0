use super::scalar::Scalar;
use crate::shared::Result;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Where a procedure reads its value from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A read-only query; the named column is taken from the result rows
    Query { expression: String, column: String },
    /// A key/value lookup, e.g. a registry property path
    Path { path: String },
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Query { expression, column } => {
                write!(f, "column '{}' of query `{}`", column, squash(expression))
            }
            Lookup::Path { path } => write!(f, "path '{}'", path),
        }
    }
}

/// Collapses runs of whitespace so multi-line queries read well in messages
pub(crate) fn squash(expression: &str) -> String {
    expression.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comparison operator for single-value checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[serde(alias = "==", alias = "cmp")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Le,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Ge,
    In,
    NotIn,
}

impl Operator {
    fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
        }
    }
}

/// Expected side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Expected {
    One(Scalar),
    Many(Vec<Scalar>),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::One(value) => write!(f, "{}", value),
            Expected::Many(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// Operator plus expected value, validated for shape at construction
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    operator: Operator,
    expected: Expected,
}

impl Comparison {
    pub fn new(operator: Operator, expected: Expected) -> Result<Self> {
        match (&expected, operator.takes_list()) {
            (Expected::Many(_), false) => anyhow::bail!(
                "operator '{}' needs a single expected value, not a list",
                operator.symbol()
            ),
            (Expected::One(_), true) => anyhow::bail!(
                "operator '{}' needs a list of expected values",
                operator.symbol()
            ),
            _ => {}
        }

        if let (Expected::One(value), Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge) =
            (&expected, operator)
        {
            if value.as_number().is_none() {
                anyhow::bail!(
                    "operator '{}' needs a numeric expected value, got '{}'",
                    operator.symbol(),
                    value
                );
            }
        }

        Ok(Self { operator, expected })
    }

    pub fn equals(expected: Scalar) -> Self {
        Self {
            operator: Operator::Eq,
            expected: Expected::One(expected),
        }
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn expected(&self) -> &Expected {
        &self.expected
    }

    /// Whether `observed` satisfies the comparison
    pub fn holds(&self, observed: &Scalar) -> bool {
        match (&self.expected, self.operator) {
            (Expected::One(expected), Operator::Eq) => observed.loosely_equals(expected),
            (Expected::One(expected), Operator::Ne) => !observed.loosely_equals(expected),
            (Expected::One(expected), op) => {
                let Some(ordering) = observed.compare_numeric(expected) else {
                    return false;
                };
                match op {
                    Operator::Lt => ordering == Ordering::Less,
                    Operator::Le => ordering != Ordering::Greater,
                    Operator::Gt => ordering == Ordering::Greater,
                    Operator::Ge => ordering != Ordering::Less,
                    _ => false,
                }
            }
            (Expected::Many(values), Operator::In) => contains(values, observed),
            (Expected::Many(values), Operator::NotIn) => !contains(values, observed),
            (Expected::Many(_), _) => false,
        }
    }
}

fn contains(values: &[Scalar], observed: &Scalar) -> bool {
    let needle = observed.normalized_text();
    values.iter().any(|v| v.normalized_text() == needle)
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.operator.symbol(), self.expected)
    }
}

/// Per-element predicate of a set-membership check.
/// Elements are compared as trimmed text, case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipPredicate {
    /// Every observed element must appear in the list
    Allowed(BTreeSet<String>),
    /// No observed element may appear in the list
    Forbidden(BTreeSet<String>),
}

impl MembershipPredicate {
    pub fn admits(&self, element: &str) -> bool {
        let element = element.trim();
        match self {
            MembershipPredicate::Allowed(list) => list.contains(element),
            MembershipPredicate::Forbidden(list) => !list.contains(element),
        }
    }
}

/// What a check concludes when the target returns no value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsencePolicy {
    /// Absence is a tooling problem: `error` with `MissingTargetData`
    Error,
    /// The audited condition does not arise on this target
    NotApplicable,
    /// Absence is itself the finding
    Fail,
}

/// How a control is verified. Chosen once, at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationProcedure {
    SingleValue {
        lookup: Lookup,
        comparison: Comparison,
        when_absent: AbsencePolicy,
    },
    SetMembership {
        query: String,
        column: String,
        predicate: MembershipPredicate,
    },
    Existence {
        lookup: Lookup,
        expected: Option<Comparison>,
        when_absent: AbsencePolicy,
    },
    ManualOnly {
        instructions: String,
    },
}

impl VerificationProcedure {
    pub fn is_automated(&self) -> bool {
        !matches!(self, VerificationProcedure::ManualOnly { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VerificationProcedure::SingleValue { .. } => "single-value",
            VerificationProcedure::SetMembership { .. } => "set-membership",
            VerificationProcedure::Existence { .. } => "existence",
            VerificationProcedure::ManualOnly { .. } => "manual",
        }
    }
}
