use crate::ports::outbound::{ControlRecord, ControlSource};
use crate::shared::error::AuditError;
use crate::shared::security::{read_input_file, validate_directory};
use crate::shared::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions recognised as control catalog files
const CONTROL_EXTENSIONS: [&str; 4] = ["yml", "yaml", "json", "toml"];

/// FileSystemControlSource adapter reading controls from catalog files
///
/// `path` may be a single file or a directory. In a directory every
/// `.yml`, `.yaml`, `.json` and `.toml` file is read in file-name order;
/// other files are ignored. A document holds one control, a list of
/// controls, or a `controls:` list.
pub struct FileSystemControlSource {
    path: PathBuf,
}

impl FileSystemControlSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn catalog_files(&self) -> Result<Vec<PathBuf>> {
        let metadata = fs::symlink_metadata(&self.path).map_err(|e| AuditError::ControlSource {
            path: self.path.clone(),
            details: e.to_string(),
        })?;

        if !metadata.is_dir() {
            return Ok(vec![self.path.clone()]);
        }

        validate_directory(&self.path, "control directory")?;
        let mut files = Vec::new();
        let entries = fs::read_dir(&self.path).map_err(|e| AuditError::ControlSource {
            path: self.path.clone(),
            details: e.to_string(),
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| AuditError::ControlSource {
                path: self.path.clone(),
                details: e.to_string(),
            })?;
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if !hidden && has_control_extension(&path) && path.is_file() {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(AuditError::ControlSource {
                path: self.path.clone(),
                details: "directory contains no .yml, .yaml, .json or .toml control files"
                    .to_string(),
            }
            .into());
        }

        files.sort();
        Ok(files)
    }
}

impl ControlSource for FileSystemControlSource {
    fn read_controls(&self) -> Result<Vec<ControlRecord>> {
        let mut records = Vec::new();
        for file in self.catalog_files()? {
            let content = read_input_file(&file, "control file")?;
            let parsed = parse_document(&file, &content).map_err(|details| {
                AuditError::ControlSource {
                    path: file.clone(),
                    details,
                }
            })?;
            records.extend(parsed);
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn has_control_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CONTROL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Parses one catalog document into records, whatever its shape
fn parse_document(path: &Path, content: &str) -> std::result::Result<Vec<ControlRecord>, String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let document: serde_json::Value = match extension.as_str() {
        "json" => serde_json::from_str(content).map_err(|e| e.to_string())?,
        "toml" => toml::from_str(content).map_err(|e| e.to_string())?,
        _ => serde_yaml_ng::from_str(content).map_err(|e| e.to_string())?,
    };

    match document {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(_) => serde_json::from_value(document).map_err(|e| e.to_string()),
        serde_json::Value::Object(mut map) if map.contains_key("controls") => {
            let controls = map.remove("controls").unwrap_or_default();
            serde_json::from_value(controls).map_err(|e| format!("in 'controls': {}", e))
        }
        serde_json::Value::Object(_) => serde_json::from_value::<ControlRecord>(document)
            .map(|record| vec![record])
            .map_err(|e| e.to_string()),
        other => Err(format!(
            "expected a control, a list of controls or a 'controls' list, found {}",
            other
        )),
    }
}
