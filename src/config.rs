//! Configuration file support for stig-audit.
//!
//! Provides YAML-based configuration through `stig-audit.config.yml` files,
//! including data structures, file loading, and validation.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::application::dto::{OutputFormat, MAX_CONCURRENCY_LIMIT};
use crate::compliance::domain::Inputs;
use crate::shared::error::AuditError;
use crate::shared::Result;

pub const CONFIG_FILENAME: &str = "stig-audit.config.yml";

/// Top-level configuration file schema.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub connection: Option<ConnectionConfig>,
    pub query_timeout_secs: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub cache_queries: Option<bool>,
    pub continue_without_target: Option<bool>,
    pub format: Option<String>,
    /// Control file or directory
    pub controls: Option<PathBuf>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub inputs: Option<Inputs>,
    /// Captures unknown fields for warnings.
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

/// How the target is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Live instance behind the HTTP query gateway
    Gateway,
    /// Captured answers in a snapshot file
    Snapshot,
}

/// The `connection:` section.
#[derive(Debug, Deserialize, Default)]
pub struct ConnectionConfig {
    pub kind: Option<ConnectionKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub instance: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub tls: Option<bool>,
    pub snapshot: Option<PathBuf>,
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_yaml_ng::Value>,
}

/// Load config from an explicit path. Returns an error if the file is not found.
///
/// Relative `controls` and `connection.snapshot` paths are resolved against
/// the directory holding the config file.
pub fn load_config_from_path(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {}\n\n💡 Hint: Check that the file exists and is readable.",
            path.display()
        )
    })?;

    let mut config: ConfigFile = serde_yaml_ng::from_str(&content).with_context(|| {
        format!(
            "Failed to parse config file: {}\n\n💡 Hint: Ensure the file contains valid YAML syntax.",
            path.display()
        )
    })?;

    validate_config(&config)?;
    warn_unknown_fields(&config);

    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

/// Auto-discover config in a directory. Returns `None` silently if not found.
pub fn discover_config(dir: &Path) -> Result<Option<ConfigFile>> {
    let config_path = dir.join(CONFIG_FILENAME);

    if !config_path.exists() {
        return Ok(None);
    }

    let config = load_config_from_path(&config_path)?;
    Ok(Some(config))
}

impl ConfigFile {
    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() && !base.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        };
        if let Some(controls) = self.controls.as_mut() {
            resolve(controls);
        }
        if let Some(snapshot) = self
            .connection
            .as_mut()
            .and_then(|connection| connection.snapshot.as_mut())
        {
            resolve(snapshot);
        }
    }
}

/// Validate the loaded configuration.
fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.query_timeout_secs == Some(0) {
        return Err(AuditError::configuration(
            "query_timeout_secs must be greater than zero",
            "Give the per-query deadline in seconds (e.g., 30)",
        )
        .into());
    }

    if let Some(max) = config.max_concurrency {
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&max) {
            return Err(AuditError::configuration(
                format!(
                    "max_concurrency must be between 1 and {}, got {}",
                    MAX_CONCURRENCY_LIMIT, max
                ),
                "Use 1 for strictly sequential evaluation",
            )
            .into());
        }
    }

    if let Some(ref format) = config.format {
        format
            .parse::<OutputFormat>()
            .map_err(|e| AuditError::configuration(e, "Use 'json' or 'markdown'"))?;
    }

    for (key, patterns) in [("include", &config.include), ("exclude", &config.exclude)] {
        if let Some(patterns) = patterns {
            if let Some(i) = patterns.iter().position(|p| p.trim().is_empty()) {
                return Err(AuditError::configuration(
                    format!("{}[{}] must not be empty", key, i),
                    "Each pattern is a control id, optionally with * or ? wildcards (e.g., \"V-677*\")",
                )
                .into());
            }
        }
    }

    if let Some(ref connection) = config.connection {
        if connection.kind == Some(ConnectionKind::Snapshot) && connection.snapshot.is_none() {
            return Err(AuditError::configuration(
                "connection.kind is 'snapshot' but connection.snapshot is not set",
                "Point connection.snapshot at a captured target file",
            )
            .into());
        }
        if connection.port == Some(0) {
            return Err(AuditError::configuration(
                "connection.port must be between 1 and 65535",
                "Omit connection.port to use the default",
            )
            .into());
        }
    }
    Ok(())
}

/// Warn about unknown fields in the config file.
fn warn_unknown_fields(config: &ConfigFile) {
    let mut keys: Vec<String> = config.unknown_fields.keys().cloned().collect();
    if let Some(ref connection) = config.connection {
        keys.extend(
            connection
                .unknown_fields
                .keys()
                .map(|key| format!("connection.{}", key)),
        );
    }
    keys.sort();

    for key in keys {
        eprintln!(
            "⚠️  Warning: Unknown config field '{}' will be ignored.",
            key
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::domain::{InputValue, Scalar};
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let config_path = dir.path().join("config.yml");
        fs::write(&config_path, content).unwrap();
        config_path
    }

    fn load_error(content: &str) -> String {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(&dir, content);
        format!("{}", load_config_from_path(&config_path).unwrap_err())
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            r#"
connection:
  kind: gateway
  host: sql01.example.mil
  port: 1433
  instance: MSSQLSERVER
  user: auditor
  database: master
query_timeout_secs: 10
max_concurrency: 4
cache_queries: true
format: markdown
controls: controls
include: ["V-677*"]
exclude: ["V-67763"]
inputs:
  allowed_audit_permissions:
    - ALTER ANY SERVER AUDIT
  max_login_attempts: 3
"#,
        );

        let config = load_config_from_path(&config_path).unwrap();
        let connection = config.connection.unwrap();
        assert_eq!(connection.kind, Some(ConnectionKind::Gateway));
        assert_eq!(connection.host.as_deref(), Some("sql01.example.mil"));
        assert_eq!(connection.port, Some(1433));
        assert!(connection.password.is_none());
        assert_eq!(config.query_timeout_secs, Some(10));
        assert_eq!(config.max_concurrency, Some(4));
        assert_eq!(config.cache_queries, Some(true));
        assert_eq!(config.format.as_deref(), Some("markdown"));
        assert_eq!(config.controls, Some(dir.path().join("controls")));
        assert_eq!(config.include, Some(vec!["V-677*".to_string()]));

        let inputs = config.inputs.unwrap();
        assert_eq!(
            inputs.get("allowed_audit_permissions"),
            Some(&InputValue::List(vec![Scalar::text("ALTER ANY SERVER AUDIT")]))
        );
        assert_eq!(
            inputs.get("max_login_attempts"),
            Some(&InputValue::One(Scalar::Integer(3)))
        );
    }

    #[test]
    fn test_snapshot_path_is_resolved_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            "connection:\n  kind: snapshot\n  snapshot: targets/lab.yml\n",
        );
        let config = load_config_from_path(&config_path).unwrap();
        assert_eq!(
            config.connection.unwrap().snapshot,
            Some(dir.path().join("targets/lab.yml"))
        );
    }

    #[test]
    fn test_discover_config_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "format: json\n").unwrap();

        let config = discover_config(dir.path()).unwrap();
        assert_eq!(config.unwrap().format.as_deref(), Some("json"));
    }

    #[test]
    fn test_discover_config_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config_from_path(Path::new("/nonexistent/config.yml"));
        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_parse_error() {
        let err = load_error("invalid: yaml: [[[broken");
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_unknown_connection_kind_is_parse_error() {
        let err = load_error("connection:\n  kind: odbc\n");
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        assert!(load_error("query_timeout_secs: 0").contains("query_timeout_secs"));
        assert!(load_error("max_concurrency: 64").contains("between 1 and 32"));
        assert!(load_error("format: xml").contains("Invalid format"));
        assert!(load_error("include: ['']").contains("include[0] must not be empty"));
        assert!(load_error("connection:\n  kind: snapshot\n").contains("connection.snapshot"));
        assert!(load_error("connection:\n  port: 0\n").contains("connection.port"));
        assert!(load_error("max_concurrency: 0").contains("Invalid configuration"));
    }

    #[test]
    fn test_unknown_fields_are_collected() {
        let dir = TempDir::new().unwrap();
        let config_path = write_config(
            &dir,
            r#"
format: json
unknown_field: true
connection:
  hostname: typo
"#,
        );

        let config = load_config_from_path(&config_path).unwrap();
        assert_eq!(config.unknown_fields.len(), 1);
        assert!(config.unknown_fields.contains_key("unknown_field"));
        assert!(config
            .connection
            .unwrap()
            .unknown_fields
            .contains_key("hostname"));
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert!(config.connection.is_none());
        assert!(config.format.is_none());
        assert!(config.inputs.is_none());
        assert!(config.unknown_fields.is_empty());
    }
}
