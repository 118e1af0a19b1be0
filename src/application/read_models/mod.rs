//! Read models for CQRS-lite pattern
//!
//! View-optimized structs that join control definitions with run outcomes.

mod report_read_model;
mod report_read_model_builder;

pub use report_read_model::{ReportEntryView, ReportMetadataView, ReportReadModel, SummaryView};
pub use report_read_model_builder::ReportReadModelBuilder;
