use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stig_audit::prelude::*;

/// Canned answers and counters shared by a connector and its sessions
#[derive(Default)]
struct TargetState {
    queries: HashMap<String, QueryResult<Vec<Row>>>,
    lookups: HashMap<String, Scalar>,
    reads: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Mock TargetConnector with canned query rows and lookup values
///
/// Queries are matched on their whitespace-normalized text.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<TargetState>,
    fail_open: bool,
}

fn normalize(expression: &str) -> String {
    expression.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut TargetState {
        Arc::get_mut(&mut self.state).expect("configure the mock before cloning it")
    }

    pub fn with_rows(mut self, expression: &str, rows: Vec<Row>) -> Self {
        self.state_mut()
            .queries
            .insert(normalize(expression), Ok(rows));
        self
    }

    pub fn with_query_error(mut self, expression: &str, failure: QueryFailure) -> Self {
        self.state_mut()
            .queries
            .insert(normalize(expression), Err(failure));
        self
    }

    pub fn with_value(mut self, path: &str, value: Scalar) -> Self {
        self.state_mut().lookups.insert(path.to_lowercase(), value);
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetConnector for MockConnector {
    type Session = MockSession;

    fn describe(&self) -> String {
        "mock target".to_string()
    }

    async fn open(&self) -> Result<MockSession> {
        if self.fail_open {
            return Err(AuditError::Connection {
                target: self.describe(),
                details: "connection refused".to_string(),
            }
            .into());
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            state: Arc::clone(&self.state),
        })
    }
}

/// Session handed out by [`MockConnector`]
pub struct MockSession {
    state: Arc<TargetState>,
}

#[async_trait]
impl TargetSession for MockSession {
    async fn query(&self, expression: &str, _timeout: Duration) -> QueryResult<Vec<Row>> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        self.state
            .queries
            .get(&normalize(expression))
            .cloned()
            .unwrap_or_else(|| Err(QueryFailure::Rejected(format!("unknown query: {}", expression))))
    }

    async fn lookup(&self, path: &str, _timeout: Duration) -> QueryResult<Option<Scalar>> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.lookups.get(&path.to_lowercase()).cloned())
    }

    fn supports_concurrent_reads(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
