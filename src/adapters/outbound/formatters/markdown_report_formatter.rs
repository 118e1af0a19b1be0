use crate::application::read_models::{ReportEntryView, ReportReadModel};
use crate::compliance::domain::Status;
use crate::ports::outbound::ReportFormatter;
use crate::shared::Result;

/// Markdown table header for the per-control results
const TABLE_HEADER: &str = "| Control | Severity | Status | Evidence | Reason |\n";

/// Markdown table separator line
const TABLE_SEPARATOR: &str = "|---------|----------|--------|----------|--------|\n";

/// Evidence cells list at most this many values
const MAX_EVIDENCE_IN_CELL: usize = 5;

/// MarkdownReportFormatter adapter for human-readable reports
///
/// Renders a summary table, one row per control in run order, and a section
/// listing every control that still needs a reviewer.
pub struct MarkdownReportFormatter;

impl MarkdownReportFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Escapes pipe characters and newlines for safe Markdown table rendering
    fn escape_markdown_table_cell(text: &str) -> String {
        text.replace('|', "\\|").replace('\n', " ")
    }

    fn format_evidence(entry: &ReportEntryView) -> String {
        if entry.evidence.is_empty() {
            return String::new();
        }
        let mut shown: Vec<String> = entry
            .evidence
            .iter()
            .take(MAX_EVIDENCE_IN_CELL)
            .map(|value| format!("`{}`", value))
            .collect();
        if entry.evidence.len() > MAX_EVIDENCE_IN_CELL {
            shown.push(format!(
                "(+{} more)",
                entry.evidence.len() - MAX_EVIDENCE_IN_CELL
            ));
        }
        Self::escape_markdown_table_cell(&shown.join(", "))
    }

    fn status_badge(status: Status) -> &'static str {
        match status {
            Status::Pass => "✅ pass",
            Status::Fail => "❌ fail",
            Status::Error => "⚠️ error",
            Status::SkippedManual => "📝 skipped-manual",
            Status::NotApplicable => "➖ not-applicable",
            Status::Cancelled => "⏹️ cancelled",
        }
    }
}

impl Default for MarkdownReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper methods for rendering sections
impl MarkdownReportFormatter {
    fn render_header(&self, output: &mut String, model: &ReportReadModel) {
        let metadata = &model.metadata;
        output.push_str("# STIG Compliance Report\n\n");
        output.push_str(&format!("- **Target:** {}\n", metadata.target));
        output.push_str(&format!(
            "- **Tool:** {} {}\n",
            metadata.tool_name, metadata.tool_version
        ));
        output.push_str(&format!("- **Run:** {}\n", metadata.run_id));
        output.push_str(&format!(
            "- **Started:** {}  \n- **Finished:** {}\n\n",
            metadata.started_at, metadata.finished_at
        ));
    }

    fn render_summary(&self, output: &mut String, model: &ReportReadModel) {
        let summary = &model.summary;
        output.push_str("## Summary\n\n");

        let verdict = if summary.cancelled {
            "⏹️ Run cancelled before every control was evaluated."
        } else if summary.compliant {
            "✅ No failed or errored controls."
        } else {
            "❌ Findings detected."
        };
        output.push_str(verdict);
        output.push_str("\n\n| Status | Count |\n|--------|-------|\n");
        for status in Status::ALL {
            output.push_str(&format!("| {} | {} |\n", status, summary.count(status)));
        }
        output.push_str(&format!("| **total** | **{}** |\n\n", summary.total));
    }

    fn render_results(&self, output: &mut String, model: &ReportReadModel) {
        output.push_str("## Results\n\n");
        if model.controls.is_empty() {
            output.push_str("*No controls were selected.*\n\n");
            return;
        }

        output.push_str(TABLE_HEADER);
        output.push_str(TABLE_SEPARATOR);
        for entry in &model.controls {
            output.push_str(&format!(
                "| **{}** {} | {} ({:.1}) | {} | {} | {} |\n",
                Self::escape_markdown_table_cell(&entry.id),
                Self::escape_markdown_table_cell(&entry.title),
                entry.category,
                entry.severity,
                Self::status_badge(entry.status),
                Self::format_evidence(entry),
                Self::escape_markdown_table_cell(entry.reason.as_deref().unwrap_or("")),
            ));
        }
        output.push('\n');
    }

    fn render_manual_reviews(&self, output: &mut String, model: &ReportReadModel) {
        let reviews: Vec<&ReportEntryView> = model.manual_reviews().collect();
        if reviews.is_empty() {
            return;
        }

        output.push_str("## Manual Review Required\n\n");
        output.push_str(
            "These controls need a reviewer regardless of their automated result.\n\n",
        );
        for entry in reviews {
            output.push_str(&format!("### {} {}\n\n", entry.id, entry.title));
            if let Some(reason) = &entry.reason {
                output.push_str(reason.trim());
                output.push_str("\n\n");
            }
        }
    }
}

impl ReportFormatter for MarkdownReportFormatter {
    fn format(&self, model: &ReportReadModel) -> Result<String> {
        let mut output = String::new();
        self.render_header(&mut output, model);
        self.render_summary(&mut output, model);
        self.render_results(&mut output, model);
        self.render_manual_reviews(&mut output, model);
        Ok(output)
    }
}
