use std::time::Duration;

/// Default per-read deadline
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for parallel reads against one session
pub const MAX_CONCURRENCY_LIMIT: usize = 32;

/// How the runner treats the target during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPolicy {
    /// Deadline for every single query or lookup
    pub query_timeout: Duration,
    /// Parallel reads, honored only when the session supports concurrent reads
    pub max_concurrency: usize,
    /// Report automated controls as `error` instead of aborting when the
    /// session cannot be opened
    pub continue_without_target: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            max_concurrency: 1,
            continue_without_target: false,
        }
    }
}
