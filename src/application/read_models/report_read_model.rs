//! Report read model for rendering
//!
//! A denormalized view of one run: control narrative and severity joined
//! with the outcome, ready for any formatter.

use crate::compliance::domain::{Scalar, Status};
use serde::Serialize;
use std::collections::BTreeMap;

/// Main read model for a finished run
#[derive(Debug, Clone, Serialize)]
pub struct ReportReadModel {
    pub metadata: ReportMetadataView,
    pub summary: SummaryView,
    /// One entry per control, in run order
    pub controls: Vec<ReportEntryView>,
}

impl ReportReadModel {
    /// Entries a human still has to review, whatever their automated status
    pub fn manual_reviews(&self) -> impl Iterator<Item = &ReportEntryView> {
        self.controls.iter().filter(|entry| {
            entry.status == Status::SkippedManual
                || (entry.follow_up && entry.status != Status::Cancelled)
        })
    }
}

/// Who ran what, against which target, and when
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadataView {
    pub tool_name: String,
    pub tool_version: String,
    pub run_id: String,
    pub target: String,
    pub started_at: String,
    pub finished_at: String,
}

/// Count of controls per status
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub total: usize,
    /// Keyed by the status label, every status present
    pub by_status: BTreeMap<String, usize>,
    /// No control failed or errored
    pub compliant: bool,
    pub cancelled: bool,
}

impl SummaryView {
    pub fn count(&self, status: Status) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// One control's line in the report
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntryView {
    pub id: String,
    pub title: String,
    pub severity: f64,
    /// STIG category label, e.g. "CAT I"
    pub category: String,
    pub status: Status,
    pub evidence: Vec<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Kind of the failure behind an `error` status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    pub follow_up: bool,
}
