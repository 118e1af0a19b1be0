use crate::compliance::domain::Status;

/// ProgressReporter port for reporting progress during a run
///
/// This port abstracts progress reporting (e.g., to stderr)
/// so that the report on stdout stays machine-readable.
pub trait ProgressReporter: Send + Sync {
    /// Reports a progress message
    fn report(&self, message: &str);

    /// Reports progress with a count of finished controls
    fn report_progress(&self, current: usize, total: usize, message: Option<&str>);

    /// Reports the terminal status of one control
    fn report_status(&self, control_id: &str, status: Status);

    /// Reports an error or warning message
    fn report_error(&self, message: &str);

    /// Reports completion of an operation
    fn report_completion(&self, message: &str);
}
