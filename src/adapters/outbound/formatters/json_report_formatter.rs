use crate::application::read_models::ReportReadModel;
use crate::ports::outbound::ReportFormatter;
use crate::shared::Result;

/// Version of the JSON report layout, bumped on breaking changes
pub const REPORT_FORMAT_VERSION: &str = "1";

/// JsonReportFormatter adapter for machine-readable reports
///
/// Emits the read model as pretty-printed JSON under a small envelope that
/// carries the layout version, so CI consumers can gate on it.
pub struct JsonReportFormatter;

impl JsonReportFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReportFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Serialize)]
struct Envelope<'a> {
    report_format_version: &'static str,
    #[serde(flatten)]
    report: &'a ReportReadModel,
}

impl ReportFormatter for JsonReportFormatter {
    fn format(&self, model: &ReportReadModel) -> Result<String> {
        let envelope = Envelope {
            report_format_version: REPORT_FORMAT_VERSION,
            report: model,
        };
        serde_json::to_string_pretty(&envelope).map_err(Into::into)
    }
}
