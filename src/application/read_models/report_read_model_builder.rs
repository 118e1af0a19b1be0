//! Builder for constructing ReportReadModel from domain objects

use super::report_read_model::{ReportEntryView, ReportMetadataView, ReportReadModel, SummaryView};
use crate::compliance::domain::{ControlDefinition, ControlSet, ReportEntry, RunReport};
use std::collections::HashMap;

/// Joins the control definitions with the outcomes of a run
pub struct ReportReadModelBuilder;

impl ReportReadModelBuilder {
    /// Builds the read model; entries follow the report order
    pub fn build(controls: &ControlSet, report: &RunReport) -> ReportReadModel {
        let by_id: HashMap<&str, &ControlDefinition> = controls
            .controls()
            .iter()
            .map(|control| (control.id().as_str(), control))
            .collect();

        let entries = report
            .entries()
            .iter()
            .map(|entry| Self::build_entry(entry, by_id.get(entry.id.as_str()).copied()))
            .collect();

        ReportReadModel {
            metadata: Self::build_metadata(report),
            summary: Self::build_summary(report),
            controls: entries,
        }
    }

    fn build_metadata(report: &RunReport) -> ReportMetadataView {
        let metadata = report.metadata();
        ReportMetadataView {
            tool_name: metadata.tool_name().to_string(),
            tool_version: metadata.tool_version().to_string(),
            run_id: metadata.run_id().to_string(),
            target: metadata.target().to_string(),
            started_at: metadata.started_at().to_string(),
            finished_at: report.finished_at().to_string(),
        }
    }

    fn build_summary(report: &RunReport) -> SummaryView {
        SummaryView {
            total: report.entries().len(),
            by_status: report
                .status_counts()
                .into_iter()
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
            compliant: !report.has_blocking_results(),
            cancelled: report.was_cancelled(),
        }
    }

    fn build_entry(entry: &ReportEntry, control: Option<&ControlDefinition>) -> ReportEntryView {
        let outcome = &entry.outcome;
        let (title, severity, category, references, follow_up) = match control {
            Some(control) => (
                control.title().to_string(),
                control.impact().value(),
                control.impact().category().to_string(),
                control
                    .references()
                    .iter()
                    .map(|(taxonomy, ids)| (taxonomy.clone(), ids.iter().cloned().collect()))
                    .collect(),
                control.follow_up().is_some(),
            ),
            None => (String::new(), 0.0, String::new(), Default::default(), false),
        };

        ReportEntryView {
            id: entry.id.to_string(),
            title,
            severity,
            category,
            status: outcome.status(),
            evidence: outcome.evidence().to_vec(),
            reason: outcome.reason().map(str::to_string),
            failure_kind: outcome.failure().map(|f| f.kind().to_string()),
            duration_ms: outcome.duration().as_millis() as u64,
            references,
            follow_up,
        }
    }
}
