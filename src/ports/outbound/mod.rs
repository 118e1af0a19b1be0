/// Outbound ports (Driven ports) - Infrastructure interfaces
///
/// These ports define the interfaces that the application core uses
/// to interact with external systems (control catalogs, audited targets,
/// the console and output destinations).
pub mod control_record;
pub mod control_source;
pub mod formatter;
pub mod output_presenter;
pub mod progress_reporter;
pub mod target_connector;

pub use control_record::{ControlRecord, OneOrMany, ProcedureRecord, ValueRecord};
pub use control_source::ControlSource;
pub use formatter::ReportFormatter;
pub use output_presenter::OutputPresenter;
pub use progress_reporter::ProgressReporter;
pub use target_connector::{QueryResult, TargetConnector, TargetSession};
