use crate::compliance::domain::{
    CheckFailure, ControlDefinition, Lookup, Outcome, QueryFailure, Row, Scalar,
    VerificationProcedure,
};
use crate::compliance::services::ProcedureJudge;
use crate::ports::outbound::{QueryResult, TargetSession};
use std::future::Future;
use std::time::Duration;

/// What a control may read from during a run
pub(super) enum TargetAccess<'a, S> {
    Session(&'a S),
    /// No session; automated controls report this as `TargetUnavailable`
    Unavailable(String),
}

/// Evaluates one control: reads from the session, then lets the judge decide
///
/// Never fails as a whole. Read failures become an `error` outcome for this
/// control only.
pub(super) async fn evaluate<S: TargetSession>(
    control: &ControlDefinition,
    target: &TargetAccess<'_, S>,
    timeout: Duration,
) -> Outcome {
    let procedure = control.procedure();
    if let VerificationProcedure::ManualOnly { instructions } = procedure {
        return Outcome::skipped_manual(instructions.as_str());
    }

    let session = match target {
        TargetAccess::Session(session) => *session,
        TargetAccess::Unavailable(details) => {
            return Outcome::error(CheckFailure::TargetUnavailable {
                details: details.clone(),
            })
        }
    };

    let reader = Reader { session, timeout };
    let outcome = match procedure {
        VerificationProcedure::SingleValue {
            lookup,
            comparison,
            when_absent,
        } => match reader.first_value(lookup).await {
            Ok(observed) => {
                ProcedureJudge::single_value(lookup, comparison, observed, *when_absent)
            }
            Err(failure) => failure,
        },
        VerificationProcedure::SetMembership {
            query,
            column,
            predicate,
        } => {
            let lookup = Lookup::Query {
                expression: query.clone(),
                column: column.clone(),
            };
            match reader.rows(query).await {
                Ok(rows) => ProcedureJudge::set_membership(
                    &lookup,
                    predicate,
                    rows.len(),
                    column_values(&rows, column),
                ),
                Err(reason) => query_error(&lookup, reason),
            }
        }
        VerificationProcedure::Existence {
            lookup,
            expected,
            when_absent,
        } => match reader.any_value(lookup).await {
            Ok(observed) => {
                ProcedureJudge::existence(lookup, expected.as_ref(), observed, *when_absent)
            }
            Err(failure) => failure,
        },
        VerificationProcedure::ManualOnly { instructions } => {
            Outcome::skipped_manual(instructions.as_str())
        }
    };

    match control.follow_up() {
        Some(note) if outcome.failure().is_none() => outcome.with_note(note),
        _ => outcome,
    }
}

struct Reader<'a, S> {
    session: &'a S,
    timeout: Duration,
}

impl<S: TargetSession> Reader<'_, S> {
    async fn rows(&self, expression: &str) -> QueryResult<Vec<Row>> {
        bounded(self.timeout, self.session.query(expression, self.timeout)).await
    }

    async fn lookup(&self, path: &str) -> QueryResult<Option<Scalar>> {
        bounded(self.timeout, self.session.lookup(path, self.timeout)).await
    }

    /// Value of the first row's column for queries, the value at the path otherwise
    async fn first_value(&self, lookup: &Lookup) -> Result<Option<Scalar>, Outcome> {
        let observed = match lookup {
            Lookup::Query { expression, column } => self
                .rows(expression)
                .await
                .map(|rows| rows.first().and_then(|row| row.get(column)).cloned()),
            Lookup::Path { path } => self.lookup(path).await,
        };
        observed.map_err(|reason| query_error(lookup, reason))
    }

    /// First non-null value of the column in any row, or the value at the path
    async fn any_value(&self, lookup: &Lookup) -> Result<Option<Scalar>, Outcome> {
        let observed = match lookup {
            Lookup::Query { expression, column } => self
                .rows(expression)
                .await
                .map(|rows| rows.iter().find_map(|row| row.get(column)).cloned()),
            Lookup::Path { path } => self.lookup(path).await,
        };
        observed.map_err(|reason| query_error(lookup, reason))
    }
}

/// Applies the deadline even when the session itself ignores it
async fn bounded<T>(
    timeout: Duration,
    read: impl Future<Output = QueryResult<T>>,
) -> QueryResult<T> {
    match tokio::time::timeout(timeout, read).await {
        Ok(result) => result,
        Err(_) => Err(QueryFailure::Timeout(timeout)),
    }
}

/// Non-null cells of `column`, text trimmed
fn column_values(rows: &[Row], column: &str) -> Vec<Scalar> {
    rows.iter()
        .filter_map(|row| row.get(column))
        .map(|value| match value {
            Scalar::Text(text) => Scalar::Text(text.trim().to_string()),
            other => other.clone(),
        })
        .collect()
}

fn query_error(lookup: &Lookup, reason: QueryFailure) -> Outcome {
    Outcome::error(CheckFailure::Query {
        lookup: lookup.to_string(),
        reason,
    })
}
