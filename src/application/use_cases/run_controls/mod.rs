mod evaluation;

use crate::application::cancellation::CancellationSignal;
use crate::application::dto::{RunPolicy, RunRequest, RunResponse};
use crate::compliance::domain::{
    CheckFailure, ControlDefinition, ControlSet, Outcome, RunReport, RunReportBuilder, Status,
};
use crate::compliance::services::{ControlFilter, ControlLoader, RunMetadataGenerator};
use crate::ports::outbound::{ControlSource, ProgressReporter, TargetConnector, TargetSession};
use crate::shared::Result;
use evaluation::{evaluate, TargetAccess};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

/// RunControlsUseCase - evaluates a control catalog against one target
///
/// Loads and validates the controls, narrows them by id, opens a single
/// read-only session when any selected control is automated, evaluates every
/// control and returns a report in catalog order.
///
/// # Type Parameters
/// * `CS` - ControlSource implementation
/// * `TC` - TargetConnector implementation
/// * `PR` - ProgressReporter implementation
pub struct RunControlsUseCase<CS, TC, PR> {
    control_source: CS,
    connector: TC,
    progress_reporter: PR,
    signal: CancellationSignal,
}

impl<CS, TC, PR> RunControlsUseCase<CS, TC, PR>
where
    CS: ControlSource,
    TC: TargetConnector,
    PR: ProgressReporter,
{
    pub fn new(control_source: CS, connector: TC, progress_reporter: PR) -> Self {
        Self {
            control_source,
            connector,
            progress_reporter,
            signal: CancellationSignal::new(),
        }
    }

    /// Uses `signal` to stop the run early
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Executes the use case
    ///
    /// # Errors
    /// Fatal errors only: unreadable or invalid control definitions, filters
    /// that select nothing, or a session that cannot be opened (unless the
    /// policy continues without a target). Per-control problems end up in
    /// the report as `error` outcomes.
    pub async fn execute(&self, request: RunRequest) -> Result<RunResponse> {
        let controls = self.load_controls(&request)?;
        let controls = self.apply_filters(controls, &request)?;

        if request.dry_run {
            self.progress_reporter.report_completion(&format!(
                "Success: {} control(s) validated. No session opened.",
                controls.len()
            ));
            return Ok(RunResponse::new(controls, None));
        }

        let report = self.run(&controls, &request.policy).await?;
        self.report_summary(&report);
        Ok(RunResponse::new(controls, Some(report)))
    }

    fn load_controls(&self, request: &RunRequest) -> Result<ControlSet> {
        self.progress_reporter.report(&format!(
            "📖 Loading controls from: {}",
            self.control_source.describe()
        ));

        let records = self.control_source.read_controls()?;
        let controls = ControlLoader::new(&request.inputs).load(records)?;

        let automated = controls
            .controls()
            .iter()
            .filter(|c| c.is_automatable())
            .count();
        self.progress_reporter.report(&format!(
            "✅ Loaded {} control(s): {} automated, {} manual",
            controls.len(),
            automated,
            controls.len() - automated
        ));
        Ok(controls)
    }

    fn apply_filters(&self, controls: ControlSet, request: &RunRequest) -> Result<ControlSet> {
        let filter = ControlFilter::new(
            request.include_patterns.clone(),
            request.exclude_patterns.clone(),
        )?;
        if filter.is_empty() {
            return Ok(controls);
        }

        let before = controls.len();
        let outcome = filter.apply(controls)?;
        let skipped = before - outcome.controls.len();
        if skipped > 0 {
            self.progress_reporter
                .report(&format!("🚫 Skipped {} control(s) based on filters", skipped));
        }
        for pattern in outcome.unmatched_patterns {
            self.progress_reporter.report_error(&format!(
                "⚠️  Warning: Pattern '{}' did not match any control id.",
                pattern
            ));
        }
        Ok(outcome.controls)
    }

    /// Evaluates `controls` against the target and finalizes the report
    ///
    /// The session is opened lazily (only when an automated control exists)
    /// and is always closed before returning.
    ///
    /// # Errors
    /// Returns the connection error when the session cannot be opened and
    /// the policy does not allow continuing without a target.
    pub async fn run(&self, controls: &ControlSet, policy: &RunPolicy) -> Result<RunReport> {
        let target = self.connector.describe();
        let metadata = RunMetadataGenerator::generate_default(&target);
        let builder = Mutex::new(RunReportBuilder::new(metadata, controls.ids()));

        let session = self.open_session(controls, &target, policy).await?;
        let access = match &session {
            Ok(session) => TargetAccess::Session(session),
            Err(details) => TargetAccess::Unavailable(details.clone()),
        };
        let concurrency = match &access {
            TargetAccess::Session(session) if session.supports_concurrent_reads() => {
                policy.max_concurrency.max(1)
            }
            _ => 1,
        };

        let total = controls.len();
        let (access, shared) = (&access, &builder);
        stream::iter(controls.controls().iter().enumerate())
            .map(move |(index, control)| {
                self.run_one(index, control, access, shared, policy, total)
            })
            .buffered(concurrency)
            .collect::<Vec<()>>()
            .await;

        if let Ok(session) = session {
            if let Err(e) = session.close().await {
                self.progress_reporter
                    .report_error(&format!("⚠️  Warning: Failed to close session: {}", e));
            }
        }

        let builder = builder.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let report = builder.finalize(RunMetadataGenerator::timestamp());
        if report.was_cancelled() {
            self.progress_reporter
                .report_error("⚠️  Run cancelled; remaining controls were not evaluated.");
        }
        Ok(report)
    }

    /// Outer `Err` aborts the run; inner `Err` carries why no session is available
    async fn open_session(
        &self,
        controls: &ControlSet,
        target: &str,
        policy: &RunPolicy,
    ) -> Result<std::result::Result<TC::Session, String>> {
        if !controls.any_automatable() {
            return Ok(Err("no automated control selected".to_string()));
        }
        if self.signal.is_cancelled() {
            return Ok(Err("run cancelled before the session was opened".to_string()));
        }

        self.progress_reporter
            .report(&format!("🔌 Opening session to {}", target));
        let opened = tokio::select! {
            biased;
            _ = self.signal.cancelled() => {
                return Ok(Err("run cancelled while the session was opening".to_string()));
            }
            opened = self.connector.open() => opened,
        };
        match opened {
            Ok(session) => Ok(Ok(session)),
            Err(e) if policy.continue_without_target => {
                self.progress_reporter.report_error(&format!(
                    "⚠️  Warning: Continuing without a target; \
                     automated controls will report errors.\n{}",
                    e
                ));
                Ok(Err(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_one(
        &self,
        index: usize,
        control: &ControlDefinition,
        access: &TargetAccess<'_, TC::Session>,
        builder: &Mutex<RunReportBuilder>,
        policy: &RunPolicy,
        total: usize,
    ) {
        if self.signal.is_cancelled() {
            return;
        }
        if let Err(e) = lock(builder).start(index) {
            self.progress_reporter.report_error(&format!("❌ {}", e));
            return;
        }

        let started = Instant::now();
        let evaluation = AssertUnwindSafe(evaluate(control, access, policy.query_timeout))
            .catch_unwind()
            .map(|result| {
                result.unwrap_or_else(|panic| {
                    Outcome::error(CheckFailure::Unexpected {
                        details: panic_message(panic.as_ref()),
                    })
                })
            });

        let outcome = tokio::select! {
            biased;
            outcome = evaluation => outcome,
            // Leaves the control running; finalize marks it cancelled
            _ = self.signal.cancelled() => return,
        };
        let outcome = outcome.with_duration(started.elapsed());
        let status = outcome.status();

        let completed = {
            let mut builder = lock(builder);
            if let Err(e) = builder.record(index, outcome) {
                self.progress_reporter.report_error(&format!("❌ {}", e));
                return;
            }
            builder.completed()
        };

        self.progress_reporter
            .report_status(control.id().as_str(), status);
        self.progress_reporter
            .report_progress(completed, total, Some(control.id().as_str()));
    }

    fn report_summary(&self, report: &RunReport) {
        let counts = report.status_counts();
        let summary = Status::ALL
            .iter()
            .filter(|status| counts[*status] > 0)
            .map(|status| format!("{} {}", counts[status], status))
            .collect::<Vec<_>>()
            .join(", ");

        let message = if summary.is_empty() {
            "No controls evaluated".to_string()
        } else {
            format!("Evaluated {} control(s): {}", report.entries().len(), summary)
        };
        self.progress_reporter.report_completion(&message);
    }
}

fn lock(builder: &Mutex<RunReportBuilder>) -> MutexGuard<'_, RunReportBuilder> {
    builder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("evaluation panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("evaluation panicked: {}", message)
    } else {
        "evaluation panicked".to_string()
    }
}

#[cfg(test)]
mod tests;
