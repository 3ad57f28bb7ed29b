//! In-memory store that rejects selected writes

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{LogStore, MemoryStore, ProxyStore, SignalStore, Store};
use crate::error::{HunterError, Result};
use crate::models::{
    ExecutionReport, LogLevel, LogRecord, MarketSignal, NewLogRecord, NodeStatus, ProxyNode,
    SignalStatus,
};

#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    /// Zero-based `upsert_nodes` calls to reject
    rejected_node_batches: HashSet<usize>,
    reject_all_nodes: bool,
    reject_signals: bool,
    node_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_node_batch(mut self, call: usize) -> Self {
        self.rejected_node_batches.insert(call);
        self
    }

    pub fn rejecting_all_nodes(mut self) -> Self {
        self.reject_all_nodes = true;
        self
    }

    pub fn rejecting_signals(mut self) -> Self {
        self.reject_signals = true;
        self
    }

    fn unavailable() -> HunterError {
        HunterError::Database(sqlx::Error::PoolTimedOut)
    }
}

#[async_trait]
impl ProxyStore for FaultyStore {
    async fn upsert_nodes(&self, nodes: &[ProxyNode]) -> Result<u64> {
        let call = self.node_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_all_nodes || self.rejected_node_batches.contains(&call) {
            return Err(Self::unavailable());
        }
        self.inner.upsert_nodes(nodes).await
    }

    async fn fastest_active(&self) -> Result<Option<ProxyNode>> {
        self.inner.fastest_active().await
    }

    async fn list_nodes(&self, status: Option<NodeStatus>, limit: i64) -> Result<Vec<ProxyNode>> {
        self.inner.list_nodes(status, limit).await
    }
}

#[async_trait]
impl SignalStore for FaultyStore {
    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<u64> {
        if self.reject_signals {
            return Err(Self::unavailable());
        }
        self.inner.insert_signals(signals).await
    }

    async fn list_signals(
        &self,
        status: Option<SignalStatus>,
        limit: i64,
    ) -> Result<Vec<MarketSignal>> {
        self.inner.list_signals(status, limit).await
    }

    async fn record_execution(
        &self,
        id: &str,
        report: &ExecutionReport,
    ) -> Result<MarketSignal> {
        self.inner.record_execution(id, report).await
    }
}

#[async_trait]
impl LogStore for FaultyStore {
    async fn append(&self, record: &NewLogRecord) -> Result<LogRecord> {
        self.inner.append(record).await
    }

    async fn list_logs(&self, level: Option<LogLevel>, limit: i64) -> Result<Vec<LogRecord>> {
        self.inner.list_logs(level, limit).await
    }

    async fn delete_older_than(&self, days: i32) -> Result<u64> {
        self.inner.delete_older_than(days).await
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn ping(&self) -> Result<Duration> {
        self.inner.ping().await
    }
}
