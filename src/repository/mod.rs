//! Persistence seams
//!
//! The fleet manager, the hunter engine and the API only see the [`Store`]
//! trait. [`PgStore`] backs it with PostgreSQL; [`MemoryStore`] keeps the same
//! semantics in process for tests and dry runs.

#[cfg(test)]
pub(crate) mod faulty;
pub mod log;
pub mod memory;
pub mod proxy;
pub mod signal;

pub use log::LogRepository;
pub use memory::MemoryStore;
pub use proxy::ProxyRepository;
pub use signal::SignalRepository;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::database::Database;
use crate::error::Result;
use crate::models::{
    ExecutionReport, LogLevel, LogRecord, MarketSignal, NewLogRecord, NodeStatus, ProxyNode,
    SignalStatus,
};

/// Default page size for list queries
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Upper bound for list queries
pub const MAX_LIST_LIMIT: i64 = 500;

/// Proxy fleet persistence
#[async_trait]
pub trait ProxyStore: Send + Sync {
    /// Upsert nodes by id, returning the number of rows written
    async fn upsert_nodes(&self, nodes: &[ProxyNode]) -> Result<u64>;

    /// ACTIVE node with the lowest latency, if any
    async fn fastest_active(&self) -> Result<Option<ProxyNode>>;

    /// Nodes ordered ACTIVE-by-latency first
    async fn list_nodes(&self, status: Option<NodeStatus>, limit: i64) -> Result<Vec<ProxyNode>>;
}

/// Market signal persistence
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Batched insert; rows that already left PENDING are left untouched
    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<u64>;

    /// Newest signals first
    async fn list_signals(
        &self,
        status: Option<SignalStatus>,
        limit: i64,
    ) -> Result<Vec<MarketSignal>>;

    /// Apply an execution report to a PENDING signal.
    ///
    /// Returns `NotFound` for unknown ids and `Conflict` when the signal is
    /// already closed.
    async fn record_execution(&self, id: &str, report: &ExecutionReport)
        -> Result<MarketSignal>;
}

/// System log persistence
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, record: &NewLogRecord) -> Result<LogRecord>;

    /// Newest records first
    async fn list_logs(&self, level: Option<LogLevel>, limit: i64) -> Result<Vec<LogRecord>>;

    async fn delete_older_than(&self, days: i32) -> Result<u64>;
}

/// Everything the service persists
#[async_trait]
pub trait Store: ProxyStore + SignalStore + LogStore {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<Duration>;
}

pub type SharedStore = Arc<dyn Store>;

/// Persist an operational event; failures are only traced
pub async fn record_log<S: LogStore + ?Sized>(store: &S, record: NewLogRecord) {
    if let Err(e) = store.append(&record).await {
        warn!(level = %record.level, "Failed to persist log record: {}", e);
    }
}

/// Clamp a user-supplied list limit
pub fn list_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Status a signal moves to after an execution report
pub fn execution_status(report: &ExecutionReport) -> SignalStatus {
    if report.success {
        SignalStatus::Executed
    } else {
        SignalStatus::Rejected
    }
}

/// Keep the last occurrence of each key, preserving first-seen order.
///
/// A single upsert statement cannot touch the same row twice.
pub(crate) fn latest_by_key<T, K, F>(items: &[T], key: F) -> Vec<&T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<&T> = Vec::with_capacity(items.len());

    for item in items {
        match index.get(&key(item)) {
            Some(&slot) => out[slot] = item,
            None => {
                index.insert(key(item), out.len());
                out.push(item);
            }
        }
    }

    out
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db: Database,
    proxies: ProxyRepository,
    signals: SignalRepository,
    logs: LogRepository,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        let pool = db.pool().clone();
        Self {
            proxies: ProxyRepository::new(pool.clone()),
            signals: SignalRepository::new(pool.clone()),
            logs: LogRepository::new(pool),
            db,
        }
    }
}

#[async_trait]
impl ProxyStore for PgStore {
    async fn upsert_nodes(&self, nodes: &[ProxyNode]) -> Result<u64> {
        self.proxies.upsert(nodes).await
    }

    async fn fastest_active(&self) -> Result<Option<ProxyNode>> {
        self.proxies.fastest_active().await
    }

    async fn list_nodes(&self, status: Option<NodeStatus>, limit: i64) -> Result<Vec<ProxyNode>> {
        self.proxies.list(status, limit).await
    }
}

#[async_trait]
impl SignalStore for PgStore {
    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<u64> {
        self.signals.insert_many(signals).await
    }

    async fn list_signals(
        &self,
        status: Option<SignalStatus>,
        limit: i64,
    ) -> Result<Vec<MarketSignal>> {
        self.signals.list(status, limit).await
    }

    async fn record_execution(
        &self,
        id: &str,
        report: &ExecutionReport,
    ) -> Result<MarketSignal> {
        self.signals.record_execution(id, report).await
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn append(&self, record: &NewLogRecord) -> Result<LogRecord> {
        self.logs.create(record).await
    }

    async fn list_logs(&self, level: Option<LogLevel>, limit: i64) -> Result<Vec<LogRecord>> {
        self.logs.list(level, limit).await
    }

    async fn delete_older_than(&self, days: i32) -> Result<u64> {
        self.logs.delete_older_than(days).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<Duration> {
        self.db.ping().await
    }
}
