use super::run_policy::{RunPolicy, MAX_CONCURRENCY_LIMIT};
use crate::compliance::domain::Inputs;
use crate::shared::error::AuditError;
use crate::shared::Result;
use std::time::Duration;

/// RunRequest - request DTO for the run-controls use case
///
/// The control source and the target are injected into the use case as
/// ports; the request carries everything that shapes a single run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Site parameters resolved into control procedures at load time
    pub inputs: Inputs,
    /// Id patterns to run; empty means every control
    pub include_patterns: Vec<String>,
    /// Id patterns to skip
    pub exclude_patterns: Vec<String>,
    pub policy: RunPolicy,
    /// Load and validate controls without opening a session
    pub dry_run: bool,
}

impl RunRequest {
    pub fn builder() -> RunRequestBuilder {
        RunRequestBuilder::default()
    }
}

/// Builder for [`RunRequest`] that validates the run policy
#[derive(Debug, Default)]
pub struct RunRequestBuilder {
    inputs: Inputs,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    query_timeout: Option<Duration>,
    max_concurrency: Option<usize>,
    continue_without_target: bool,
    dry_run: bool,
}

impl RunRequestBuilder {
    pub fn inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn include_patterns(mut self, patterns: Vec<String>) -> Self {
        self.include_patterns = patterns;
        self
    }

    pub fn exclude_patterns(mut self, patterns: Vec<String>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn continue_without_target(mut self, value: bool) -> Self {
        self.continue_without_target = value;
        self
    }

    pub fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// # Errors
    /// Returns `AuditError::Validation` for a zero timeout or a concurrency
    /// outside `1..=32`
    pub fn build(self) -> Result<RunRequest> {
        let defaults = RunPolicy::default();

        let query_timeout = self.query_timeout.unwrap_or(defaults.query_timeout);
        if query_timeout.is_zero() {
            return Err(AuditError::Validation {
                message: "query timeout must be greater than zero".to_string(),
            }
            .into());
        }

        let max_concurrency = self.max_concurrency.unwrap_or(defaults.max_concurrency);
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&max_concurrency) {
            return Err(AuditError::Validation {
                message: format!(
                    "max concurrency must be between 1 and {}, got {}",
                    MAX_CONCURRENCY_LIMIT, max_concurrency
                ),
            }
            .into());
        }

        Ok(RunRequest {
            inputs: self.inputs,
            include_patterns: self.include_patterns,
            exclude_patterns: self.exclude_patterns,
            policy: RunPolicy {
                query_timeout,
                max_concurrency,
                continue_without_target: self.continue_without_target,
            },
            dry_run: self.dry_run,
        })
    }
}
