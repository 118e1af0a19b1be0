use crate::compliance::domain::{
    AbsencePolicy, CheckFailure, Comparison, Lookup, MembershipPredicate, Outcome, Scalar,
};

/// ProcedureJudge turns observed target data into a verdict
///
/// Pure: it never talks to the target. The evaluator performs the reads and
/// hands the observed values over, so every verdict rule is testable without
/// a session.
pub struct ProcedureJudge;

impl ProcedureJudge {
    /// Verdict for a single observed value
    pub fn single_value(
        lookup: &Lookup,
        comparison: &Comparison,
        observed: Option<Scalar>,
        when_absent: AbsencePolicy,
    ) -> Outcome {
        match observed {
            None => Self::absent(lookup, when_absent),
            Some(value) if comparison.holds(&value) => Outcome::pass(vec![value]),
            Some(value) => {
                let reason = format!("expected {} but found {}", comparison, value);
                Outcome::fail(vec![value]).with_reason(reason)
            }
        }
    }

    /// Verdict for the column values a query returned
    ///
    /// No rows means the condition being audited does not arise, so the
    /// control is not applicable rather than passing vacuously. Rows without
    /// a value in the column are missing data, not an empty set. On failure
    /// the evidence holds only the offending elements.
    pub fn set_membership(
        lookup: &Lookup,
        predicate: &MembershipPredicate,
        row_count: usize,
        elements: Vec<Scalar>,
    ) -> Outcome {
        if row_count == 0 {
            return Outcome::not_applicable("query returned no rows; nothing to compare");
        }
        if elements.is_empty() {
            return Outcome::error(CheckFailure::MissingTargetData {
                lookup: lookup.to_string(),
            });
        }

        let offending: Vec<Scalar> = elements
            .iter()
            .filter(|element| !predicate.admits(&element.normalized_text()))
            .cloned()
            .collect();

        if offending.is_empty() {
            return Outcome::pass(elements);
        }

        let list = match predicate {
            MembershipPredicate::Allowed(_) => "not on the allowed list",
            MembershipPredicate::Forbidden(_) => "on the forbidden list",
        };
        let reason = format!("{} of {} element(s) {}", offending.len(), elements.len(), list);
        Outcome::fail(offending).with_reason(reason)
    }

    /// Verdict for an artifact that should exist, optionally with a value
    pub fn existence(
        lookup: &Lookup,
        expected: Option<&Comparison>,
        observed: Option<Scalar>,
        when_absent: AbsencePolicy,
    ) -> Outcome {
        match (observed, expected) {
            (None, _) => Self::absent(lookup, when_absent),
            (Some(value), None) => Outcome::pass(vec![value]),
            (Some(value), Some(comparison)) => {
                Self::single_value(lookup, comparison, Some(value), when_absent)
            }
        }
    }

    fn absent(lookup: &Lookup, policy: AbsencePolicy) -> Outcome {
        match policy {
            AbsencePolicy::Error => Outcome::error(CheckFailure::MissingTargetData {
                lookup: lookup.to_string(),
            }),
            AbsencePolicy::NotApplicable => {
                Outcome::not_applicable(format!("{} returned no value", lookup))
            }
            AbsencePolicy::Fail => {
                Outcome::fail(Vec::new()).with_reason(format!("{} does not exist", lookup))
            }
        }
    }
}
