use super::scalar::Scalar;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Terminal status of one control in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// The policy holds on the target
    Pass,
    /// A finding: the policy is violated
    Fail,
    /// The status could not be determined
    Error,
    /// Requires human judgment
    SkippedManual,
    /// The audited condition does not arise on this target
    NotApplicable,
    /// The run stopped before this control was started
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Pass,
        Status::Fail,
        Status::Error,
        Status::SkippedManual,
        Status::NotApplicable,
        Status::Cancelled,
    ];

    /// Statuses that make an automated gate fail
    pub fn is_blocking(&self) -> bool {
        matches!(self, Status::Fail | Status::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Fail => "fail",
            Status::Error => "error",
            Status::SkippedManual => "skipped-manual",
            Status::NotApplicable => "not-applicable",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single query or lookup failed on the target
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryFailure {
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("rejected by target: {0}")]
    Rejected(String),
    #[error("malformed expression: {0}")]
    Malformed(String),
}

/// A failure local to one control; always surfaces as an `error` result
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckFailure {
    #[error("QueryError: {lookup}: {reason}")]
    Query { lookup: String, reason: QueryFailure },
    #[error("MissingTargetData: no value returned for {lookup}")]
    MissingTargetData { lookup: String },
    #[error("TargetUnavailable: {details}")]
    TargetUnavailable { details: String },
    #[error("Unexpected failure: {details}")]
    Unexpected { details: String },
}

impl CheckFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckFailure::Query { .. } => "QueryError",
            CheckFailure::MissingTargetData { .. } => "MissingTargetData",
            CheckFailure::TargetUnavailable { .. } => "TargetUnavailable",
            CheckFailure::Unexpected { .. } => "Unexpected",
        }
    }
}

/// Result of evaluating one control
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    status: Status,
    evidence: Vec<Scalar>,
    reason: Option<String>,
    failure: Option<CheckFailure>,
    duration: Duration,
}

impl Outcome {
    fn new(status: Status, evidence: Vec<Scalar>) -> Self {
        Self {
            status,
            evidence,
            reason: None,
            failure: None,
            duration: Duration::ZERO,
        }
    }

    pub fn pass(evidence: Vec<Scalar>) -> Self {
        Self::new(Status::Pass, evidence)
    }

    pub fn fail(evidence: Vec<Scalar>) -> Self {
        Self::new(Status::Fail, evidence)
    }

    pub fn not_applicable(reason: impl Into<String>) -> Self {
        Self::new(Status::NotApplicable, Vec::new()).with_reason(reason)
    }

    pub fn skipped_manual(instructions: impl Into<String>) -> Self {
        Self::new(Status::SkippedManual, Vec::new()).with_reason(instructions)
    }

    /// The failure description doubles as evidence
    pub fn error(failure: CheckFailure) -> Self {
        let mut outcome = Self::new(Status::Error, vec![Scalar::Text(failure.to_string())]);
        outcome.failure = Some(failure);
        outcome
    }

    pub fn cancelled() -> Self {
        Self::new(Status::Cancelled, Vec::new())
            .with_reason("run cancelled before this control was evaluated")
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Keeps an existing reason and appends `note` after it
    pub fn with_note(self, note: &str) -> Self {
        let reason = match self.reason.as_deref() {
            Some(existing) => format!("{}\n{}", existing, note),
            None => note.to_string(),
        };
        self.with_reason(reason)
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn evidence(&self) -> &[Scalar] {
        &self.evidence
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn failure(&self) -> Option<&CheckFailure> {
        self.failure.as_ref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}
