mod json_report_formatter;
mod markdown_report_formatter;

pub use json_report_formatter::{JsonReportFormatter, REPORT_FORMAT_VERSION};
pub use markdown_report_formatter::MarkdownReportFormatter;
