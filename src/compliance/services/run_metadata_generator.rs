use crate::compliance::domain::RunMetadata;
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Name recorded in every report
pub const TOOL_NAME: &str = "stig-audit";

/// RunMetadataGenerator stamps a run with an id and its start time
pub struct RunMetadataGenerator;

impl RunMetadataGenerator {
    /// Metadata for a run against `target`, started now
    pub fn generate(tool_name: &str, tool_version: &str, target: &str) -> RunMetadata {
        RunMetadata::new(
            format!("urn:uuid:{}", Uuid::new_v4()),
            tool_name.to_string(),
            tool_version.to_string(),
            target.to_string(),
            Self::timestamp(),
        )
    }

    /// Metadata carrying this build's name and version
    pub fn generate_default(target: &str) -> RunMetadata {
        Self::generate(TOOL_NAME, env!("CARGO_PKG_VERSION"), target)
    }

    /// Current UTC time in RFC 3339, millisecond precision
    pub fn timestamp() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
