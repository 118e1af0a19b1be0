/// Mock implementations for testing
mod mock_control_source;
mod mock_progress_reporter;
mod mock_target;

pub use mock_control_source::MockControlSource;
pub use mock_progress_reporter::MockProgressReporter;
pub use mock_target::{MockConnector, MockSession};
