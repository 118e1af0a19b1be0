use crate::compliance::domain::{QueryFailure, Row, Scalar};
use crate::shared::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Result of a single read against the target
pub type QueryResult<T> = std::result::Result<T, QueryFailure>;

/// TargetSession port: one open, read-only session against the audited system
///
/// There are deliberately no write operations on this trait. Every read takes
/// the caller's timeout; implementations should honor it, and the runner
/// additionally bounds each call with the same timeout.
#[async_trait]
pub trait TargetSession: Send + Sync {
    /// Runs a read-only query and returns its rows in order
    ///
    /// # Errors
    /// `QueryFailure::Malformed` or `Rejected` when the target refuses the
    /// expression, `Timeout` when the deadline passes.
    async fn query(&self, expression: &str, timeout: Duration) -> QueryResult<Vec<Row>>;

    /// Looks up a single value by path (e.g. a registry property)
    ///
    /// Returns `Ok(None)` when the path does not exist on the target.
    async fn lookup(&self, path: &str, timeout: Duration) -> QueryResult<Option<Scalar>>;

    /// Whether concurrent reads on this one session are safe.
    /// Most database targets serialize session access, hence the default.
    fn supports_concurrent_reads(&self) -> bool {
        false
    }

    /// Releases the session
    async fn close(&self) -> Result<()>;
}

/// TargetConnector port for opening sessions against a configured target
///
/// Connection parameters are validated when the connector is constructed;
/// `open` only performs the (possibly blocking) connect.
#[async_trait]
pub trait TargetConnector: Send + Sync {
    type Session: TargetSession;

    /// Short description of the target for progress output and report metadata
    fn describe(&self) -> String;

    /// Opens a session
    ///
    /// # Errors
    /// Returns `AuditError::Connection` when the target is unreachable or
    /// rejects the credentials.
    async fn open(&self) -> Result<Self::Session>;
}
