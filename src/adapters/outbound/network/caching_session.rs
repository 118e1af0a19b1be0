use crate::compliance::domain::procedure::squash;
use crate::compliance::domain::{Row, Scalar};
use crate::ports::outbound::{QueryResult, TargetConnector, TargetSession};
use crate::shared::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;

/// CachingConnector wraps a TargetConnector so that its sessions cache reads
///
/// Several controls often issue the same query (the same permission view,
/// the same registry value). Within one session the target state is treated
/// as fixed, so each distinct read goes to the target once. Failed reads are
/// not cached and are retried by the next control that asks.
pub struct CachingConnector<C: TargetConnector> {
    inner: C,
}

impl<C: TargetConnector> CachingConnector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: TargetConnector> TargetConnector for CachingConnector<C> {
    type Session = CachingSession<C::Session>;

    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn open(&self) -> Result<Self::Session> {
        Ok(CachingSession::new(self.inner.open().await?))
    }
}

/// Session decorator with per-session read caches keyed by normalized
/// query text and lower-cased lookup path
pub struct CachingSession<S: TargetSession> {
    inner: S,
    queries: DashMap<String, Vec<Row>>,
    lookups: DashMap<String, Option<Scalar>>,
}

impl<S: TargetSession> CachingSession<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            queries: DashMap::new(),
            lookups: DashMap::new(),
        }
    }

    /// Number of cached reads (for testing/monitoring)
    #[cfg(test)]
    pub fn cache_size(&self) -> usize {
        self.queries.len() + self.lookups.len()
    }
}

#[async_trait]
impl<S: TargetSession> TargetSession for CachingSession<S> {
    async fn query(&self, expression: &str, timeout: Duration) -> QueryResult<Vec<Row>> {
        let key = squash(expression);
        if let Some(cached) = self.queries.get(&key) {
            return Ok(cached.clone());
        }

        let rows = self.inner.query(expression, timeout).await?;
        self.queries.insert(key, rows.clone());
        Ok(rows)
    }

    async fn lookup(&self, path: &str, timeout: Duration) -> QueryResult<Option<Scalar>> {
        let key = path.to_lowercase();
        if let Some(cached) = self.lookups.get(&key) {
            return Ok(cached.clone());
        }

        let value = self.inner.lookup(path, timeout).await?;
        self.lookups.insert(key, value.clone());
        Ok(value)
    }

    fn supports_concurrent_reads(&self) -> bool {
        self.inner.supports_concurrent_reads()
    }

    async fn close(&self) -> Result<()> {
        self.queries.clear();
        self.lookups.clear();
        self.inner.close().await
    }
}
