use crate::compliance::domain::{
    AbsencePolicy, Comparison, ControlDefinition, ControlId, ControlSet, Expected, Impact,
    InputValue, Inputs, Lookup, MembershipPredicate, Narrative, Operator, References,
    VerificationProcedure,
};
use crate::ports::outbound::{ControlRecord, ProcedureRecord, ValueRecord};
use crate::shared::error::AuditError;
use crate::shared::Result;
use std::collections::{BTreeSet, HashSet};

/// ControlLoader turns catalog records into validated control definitions
///
/// Loading is all-or-nothing: the first missing or duplicate id, or the first
/// malformed record, aborts the whole load. Named inputs referenced by a
/// record are resolved here, so procedures never consult global state.
pub struct ControlLoader<'a> {
    inputs: &'a Inputs,
}

impl<'a> ControlLoader<'a> {
    pub fn new(inputs: &'a Inputs) -> Self {
        Self { inputs }
    }

    /// Builds the control set, preserving record order
    ///
    /// # Errors
    /// - `AuditError::DuplicateOrMissingIdentifier` for a record without an id
    ///   or with an id already used by an earlier record
    /// - `AuditError::InvalidControlDefinition` for any other malformed record
    pub fn load(&self, records: Vec<ControlRecord>) -> Result<ControlSet> {
        let mut seen = HashSet::new();
        let mut controls = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let id = Self::identify(index, &record)?;
            if !seen.insert(id.clone()) {
                return Err(AuditError::DuplicateOrMissingIdentifier {
                    details: format!(
                        "control #{} reuses id '{}' of an earlier control",
                        index + 1,
                        id
                    ),
                }
                .into());
            }
            controls.push(self.build(id, record)?);
        }

        ControlSet::new(controls)
    }

    fn identify(index: usize, record: &ControlRecord) -> Result<ControlId> {
        let raw = record
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AuditError::DuplicateOrMissingIdentifier {
                details: format!("control #{} has no id", index + 1),
            })?;

        ControlId::new(raw.to_string()).map_err(|e| {
            AuditError::invalid_control(format!("#{}", index + 1), e.to_string()).into()
        })
    }

    fn build(&self, id: ControlId, record: ControlRecord) -> Result<ControlDefinition> {
        let narrative = Narrative {
            title: required(&id, "title", record.title)?,
            description: record.description.unwrap_or_default().trim().to_string(),
            check_text: required(&id, "check_text", record.check_text)?,
            fix_text: required(&id, "fix_text", record.fix_text)?,
        };

        let impact_value = record
            .impact
            .ok_or_else(|| AuditError::invalid_control(id.as_str(), "missing 'impact'"))?;
        let impact = Impact::new(impact_value)
            .map_err(|e| AuditError::invalid_control(id.as_str(), e.to_string()))?;

        let mut references = References::new();
        for (taxonomy, values) in &record.references {
            for value in values.values() {
                references.insert(taxonomy, value);
            }
        }

        let procedure = match (record.manual, record.verify) {
            (true, Some(_)) => {
                return Err(AuditError::invalid_control(
                    id.as_str(),
                    "a manual control cannot also declare 'verify'",
                )
                .into())
            }
            (true, None) => VerificationProcedure::ManualOnly {
                instructions: record
                    .instructions
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| narrative.check_text.clone()),
            },
            (false, Some(verify)) => self.build_procedure(&id, verify)?,
            (false, None) => {
                return Err(AuditError::invalid_control(
                    id.as_str(),
                    "no 'verify' procedure; mark the control 'manual: true' \
                     if it cannot be automated",
                )
                .into())
            }
        };

        Ok(
            ControlDefinition::new(id, narrative, impact, references, procedure)
                .with_follow_up(record.follow_up),
        )
    }

    fn build_procedure(
        &self,
        id: &ControlId,
        record: ProcedureRecord,
    ) -> Result<VerificationProcedure> {
        let invalid = |reason: String| -> anyhow::Error {
            AuditError::invalid_control(id.as_str(), reason).into()
        };

        match record {
            ProcedureRecord::SingleValue {
                query,
                column,
                path,
                operator,
                expected,
                when_absent,
            } => {
                let lookup = lookup_from(query, column, path).map_err(invalid)?;
                let expected = self.resolve(&expected).map_err(invalid)?;
                let comparison = Comparison::new(operator.unwrap_or(Operator::Eq), expected)
                    .map_err(|e| invalid(e.to_string()))?;
                Ok(VerificationProcedure::SingleValue {
                    lookup,
                    comparison,
                    when_absent: when_absent.unwrap_or(AbsencePolicy::Error),
                })
            }
            ProcedureRecord::SetMembership {
                query,
                column,
                allowed,
                forbidden,
            } => {
                let predicate = match (allowed, forbidden) {
                    (Some(list), None) => {
                        MembershipPredicate::Allowed(self.resolve_set(&list).map_err(invalid)?)
                    }
                    (None, Some(list)) => {
                        MembershipPredicate::Forbidden(self.resolve_set(&list).map_err(invalid)?)
                    }
                    _ => {
                        return Err(invalid(
                            "set_membership needs exactly one of 'allowed' or 'forbidden'"
                                .to_string(),
                        ))
                    }
                };
                if query.trim().is_empty() || column.trim().is_empty() {
                    return Err(invalid(
                        "set_membership needs a 'query' and a 'column'".to_string(),
                    ));
                }
                Ok(VerificationProcedure::SetMembership {
                    query,
                    column,
                    predicate,
                })
            }
            ProcedureRecord::Existence {
                query,
                column,
                path,
                operator,
                expected,
                when_absent,
            } => {
                let lookup = lookup_from(query, column, path).map_err(invalid)?;
                let expected = match expected {
                    Some(value) => {
                        let value = self.resolve(&value).map_err(invalid)?;
                        Some(
                            Comparison::new(operator.unwrap_or(Operator::Eq), value)
                                .map_err(|e| invalid(e.to_string()))?,
                        )
                    }
                    None => None,
                };
                Ok(VerificationProcedure::Existence {
                    lookup,
                    expected,
                    when_absent: when_absent.unwrap_or(AbsencePolicy::Fail),
                })
            }
        }
    }

    fn resolve(&self, value: &ValueRecord) -> std::result::Result<Expected, String> {
        match value {
            ValueRecord::One(scalar) => Ok(Expected::One(scalar.clone())),
            ValueRecord::List(values) => Ok(Expected::Many(values.clone())),
            ValueRecord::Input { input } => match self.inputs.get(input) {
                Some(InputValue::One(scalar)) => Ok(Expected::One(scalar.clone())),
                Some(InputValue::List(values)) => Ok(Expected::Many(values.clone())),
                None => Err(format!(
                    "input '{}' is not defined; add it under 'inputs' in the configuration",
                    input
                )),
            },
        }
    }

    fn resolve_set(&self, value: &ValueRecord) -> std::result::Result<BTreeSet<String>, String> {
        let values = match self.resolve(value)? {
            Expected::One(scalar) => vec![scalar],
            Expected::Many(values) => values,
        };
        Ok(values.iter().map(|v| v.normalized_text()).collect())
    }
}

fn required(id: &ControlId, field: &str, value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AuditError::invalid_control(id.as_str(), format!("missing '{}'", field)).into()
        })
}

fn lookup_from(
    query: Option<String>,
    column: Option<String>,
    path: Option<String>,
) -> std::result::Result<Lookup, String> {
    match (query, path) {
        (Some(expression), None) => {
            let column = column
                .filter(|c| !c.trim().is_empty())
                .ok_or_else(|| "a query lookup needs a 'column'".to_string())?;
            if expression.trim().is_empty() {
                return Err("'query' is empty".to_string());
            }
            Ok(Lookup::Query { expression, column })
        }
        (None, Some(path)) if !path.trim().is_empty() => Ok(Lookup::Path { path }),
        (None, Some(_)) => Err("'path' is empty".to_string()),
        (Some(_), Some(_)) => Err("declare either 'query' or 'path', not both".to_string()),
        (None, None) => Err("missing 'query' or 'path'".to_string()),
    }
}
