use crate::compliance::domain::procedure::squash;
use crate::compliance::domain::{QueryFailure, Row, Scalar};
use crate::ports::outbound::{QueryResult, TargetConnector, TargetSession};
use crate::shared::error::AuditError;
use crate::shared::security::read_input_file;
use crate::shared::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

/// On-disk capture of a target's answers
///
/// ```yaml
/// target: sql01\MSSQLSERVER
/// queries:
///   - expression: SELECT name FROM master.sys.server_triggers WHERE is_disabled = 0
///     rows:
///       - { name: audit_logon }
///   - expression: SELECT 1/0
///     error: Divide by zero error encountered.
/// lookups:
///   HKEY_LOCAL_MACHINE\System\...\Enabled: 1
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotDocument {
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    queries: Vec<SnapshotQuery>,
    #[serde(default)]
    lookups: BTreeMap<String, Option<Scalar>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotQuery {
    expression: String,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    error: Option<String>,
}

/// SnapshotConnector adapter serving reads from a snapshot file
///
/// Lets a catalog be evaluated offline against answers captured from a real
/// instance. Queries are matched on their whitespace-normalized text, lookups
/// on the case-insensitive path.
pub struct SnapshotConnector {
    path: PathBuf,
}

impl SnapshotConnector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn connection_error(&self, details: String) -> anyhow::Error {
        AuditError::Connection {
            target: self.describe(),
            details,
        }
        .into()
    }
}

#[async_trait]
impl TargetConnector for SnapshotConnector {
    type Session = SnapshotSession;

    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }

    async fn open(&self) -> Result<SnapshotSession> {
        let content = read_input_file(&self.path, "snapshot file")
            .map_err(|e| self.connection_error(e.to_string()))?;
        let document: SnapshotDocument = serde_yaml_ng::from_str(&content)
            .map_err(|e| self.connection_error(format!("invalid snapshot: {}", e)))?;

        Ok(SnapshotSession::from_document(document))
    }
}

/// Read-only session over one loaded snapshot
#[derive(Debug)]
pub struct SnapshotSession {
    target: Option<String>,
    queries: HashMap<String, QueryResult<Vec<Row>>>,
    lookups: HashMap<String, Option<Scalar>>,
}

impl SnapshotSession {
    fn from_document(document: SnapshotDocument) -> Self {
        let queries = document
            .queries
            .into_iter()
            .map(|query| {
                let answer = match query.error {
                    Some(message) => Err(QueryFailure::Rejected(message)),
                    None => Ok(query.rows),
                };
                (squash(&query.expression), answer)
            })
            .collect();

        let lookups = document
            .lookups
            .into_iter()
            .map(|(path, value)| (path.to_lowercase(), value))
            .collect();

        Self {
            target: document.target,
            queries,
            lookups,
        }
    }

    /// Name of the captured target, when the snapshot records one
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

#[async_trait]
impl TargetSession for SnapshotSession {
    async fn query(&self, expression: &str, _timeout: Duration) -> QueryResult<Vec<Row>> {
        self.queries
            .get(&squash(expression))
            .cloned()
            .unwrap_or_else(|| {
                Err(QueryFailure::Rejected(
                    "query was not captured in the snapshot".to_string(),
                ))
            })
    }

    async fn lookup(&self, path: &str, _timeout: Duration) -> QueryResult<Option<Scalar>> {
        Ok(self.lookups.get(&path.to_lowercase()).cloned().flatten())
    }

    fn supports_concurrent_reads(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
