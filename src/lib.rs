//! stig-audit - STIG compliance runner for SQL Server instances
//!
//! This library evaluates declarative security controls (automated checks and
//! manual review items) against one audited target through a read-only
//! session, and produces an ordered pass/fail/error report. It follows
//! hexagonal architecture and Domain-Driven Design principles.
//!
//! # Architecture
//!
//! The library is organized into the following layers:
//!
//! - **Domain Layer** (`compliance`): Controls, verification procedures, outcomes and the pure services over them
//! - **Application Layer** (`application`): The run-controls use case, DTOs and read models
//! - **Ports** (`ports`): Interface definitions for infrastructure
//! - **Adapters** (`adapters`): Concrete implementations of ports
//! - **Shared** (`shared`): Common utilities and error types
//!
//! # Example
//!
//! ```no_run
//! use stig_audit::prelude::*;
//! use std::path::PathBuf;
//!
//! # async fn audit() -> Result<()> {
//! // Create adapters
//! let control_source = FileSystemControlSource::new(PathBuf::from("controls"));
//! let connector = SnapshotConnector::new(PathBuf::from("target.yml"));
//! let progress_reporter = StderrProgressReporter::new();
//!
//! // Create use case
//! let use_case = RunControlsUseCase::new(control_source, connector, progress_reporter);
//!
//! // Execute
//! let response = use_case.execute(RunRequest::builder().build()?).await?;
//!
//! // Format output
//! if let Some(report) = response.report.as_ref() {
//!     let model = ReportReadModelBuilder::build(&response.controls, report);
//!     println!("{}", JsonReportFormatter::new().format(&model)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod compliance;
pub mod config;
pub mod ports;
pub mod shared;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::outbound::console::StderrProgressReporter;
    pub use crate::adapters::outbound::filesystem::{
        FileSystemControlSource, FileSystemWriter, SnapshotConnector, StdoutPresenter,
    };
    pub use crate::adapters::outbound::formatters::{
        JsonReportFormatter, MarkdownReportFormatter,
    };
    pub use crate::adapters::outbound::network::{
        CachingConnector, GatewayConnector, GatewaySettings,
    };
    pub use crate::application::dto::{OutputFormat, RunPolicy, RunRequest, RunResponse};
    pub use crate::application::read_models::{ReportReadModel, ReportReadModelBuilder};
    pub use crate::application::use_cases::RunControlsUseCase;
    pub use crate::application::CancellationSignal;
    pub use crate::compliance::domain::{
        CheckFailure, ControlDefinition, ControlId, ControlSet, InputValue, Inputs, Outcome,
        QueryFailure, Row, RunReport, Scalar, Status, VerificationProcedure,
    };
    pub use crate::compliance::services::{ControlLoader, ProcedureJudge};
    pub use crate::ports::outbound::{
        ControlRecord, ControlSource, OutputPresenter, ProgressReporter, QueryResult,
        ReportFormatter, TargetConnector, TargetSession,
    };
    pub use crate::shared::error::{AuditError, ExitCode};
    pub use crate::shared::Result;
}
