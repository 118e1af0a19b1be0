use crate::compliance::domain::{ControlSet, RunReport};
use crate::shared::error::ExitCode;

/// RunResponse - result of the run-controls use case
#[derive(Debug, Clone)]
pub struct RunResponse {
    /// Controls selected after filtering, in run order
    pub controls: ControlSet,
    /// Final report; `None` for a dry run
    pub report: Option<RunReport>,
}

impl RunResponse {
    pub fn new(controls: ControlSet, report: Option<RunReport>) -> Self {
        Self { controls, report }
    }

    /// Process exit status for this run
    ///
    /// Cancellation wins over findings; manual and not-applicable controls
    /// never make a run non-compliant.
    pub fn exit_code(&self) -> ExitCode {
        match &self.report {
            None => ExitCode::Compliant,
            Some(report) if report.was_cancelled() => ExitCode::Cancelled,
            Some(report) if report.has_blocking_results() => ExitCode::FindingsDetected,
            Some(_) => ExitCode::Compliant,
        }
    }
}
