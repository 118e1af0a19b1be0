use stig_audit::prelude::*;

/// Mock ControlSource serving records parsed from an inline YAML list
pub struct MockControlSource {
    records: Vec<ControlRecord>,
}

impl MockControlSource {
    pub fn from_yaml(yaml: &str) -> Self {
        Self {
            records: serde_yaml_ng::from_str(yaml).unwrap(),
        }
    }
}

impl ControlSource for MockControlSource {
    fn read_controls(&self) -> Result<Vec<ControlRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        "mock catalog".to_string()
    }
}
