use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::{LogStore, ProxyStore, SignalStore, Store};
use crate::error::{HunterError, Result};
use crate::models::{
    ChangeEvent, ChangeOp, ChangeTable, ExecutionReport, LogLevel, LogRecord, MarketSignal,
    NewLogRecord, NodeStatus, ProxyNode, SignalStatus,
};

/// In-process store with the same upsert rules as the PostgreSQL one.
///
/// When built with [`MemoryStore::with_changes`] it publishes the change
/// events the database triggers would emit.
#[derive(Default)]
pub struct MemoryStore {
    nodes: DashMap<String, ProxyNode>,
    signals: DashMap<String, MarketSignal>,
    logs: Mutex<Vec<LogRecord>>,
    next_log_id: AtomicI64,
    changes: Option<broadcast::Sender<ChangeEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_changes(changes: broadcast::Sender<ChangeEvent>) -> Self {
        Self {
            changes: Some(changes),
            ..Self::default()
        }
    }

    fn publish(&self, table: ChangeTable, op: ChangeOp, id: &str) {
        if let Some(ref tx) = self.changes {
            let _ = tx.send(ChangeEvent::new(table, op, id));
        }
    }
}

#[async_trait]
impl ProxyStore for MemoryStore {
    async fn upsert_nodes(&self, nodes: &[ProxyNode]) -> Result<u64> {
        let mut written = 0;

        for node in super::latest_by_key(nodes, |n| n.id.clone()) {
            let mut next = node.clone();
            let op = match self.nodes.get(&node.id) {
                Some(existing) => {
                    next.fail_count = match node.status {
                        NodeStatus::Active => 0,
                        NodeStatus::Dead => existing.fail_count + 1,
                        NodeStatus::Untested => existing.fail_count,
                    };
                    ChangeOp::Update
                }
                None => ChangeOp::Insert,
            };

            self.nodes.insert(next.id.clone(), next);
            self.publish(ChangeTable::ProxyNodes, op, &node.id);
            written += 1;
        }

        Ok(written)
    }

    async fn fastest_active(&self) -> Result<Option<ProxyNode>> {
        let fastest = self
            .nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .filter_map(|n| n.latency_ms.map(|latency| (latency, n.id.clone())))
            .min()
            .and_then(|(_, id)| self.nodes.get(&id).map(|n| n.clone()));

        Ok(fastest)
    }

    async fn list_nodes(&self, status: Option<NodeStatus>, limit: i64) -> Result<Vec<ProxyNode>> {
        let mut nodes: Vec<ProxyNode> = self
            .nodes
            .iter()
            .filter(|n| status.map_or(true, |s| n.status == s))
            .map(|n| n.clone())
            .collect();

        nodes.sort_by(|a, b| {
            let a_active = a.status == NodeStatus::Active;
            let b_active = b.status == NodeStatus::Active;
            b_active
                .cmp(&a_active)
                .then_with(|| match (a.latency_ms, b.latency_ms) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes.truncate(limit.max(0) as usize);

        Ok(nodes)
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<u64> {
        let mut written = 0;

        for signal in super::latest_by_key(signals, |s| s.id.clone()) {
            let op = match self.signals.get(&signal.id) {
                Some(existing) if !existing.status.is_open() => continue,
                Some(_) => ChangeOp::Update,
                None => ChangeOp::Insert,
            };

            self.signals.insert(signal.id.clone(), signal.clone());
            self.publish(ChangeTable::MarketSignals, op, &signal.id);
            written += 1;
        }

        Ok(written)
    }

    async fn list_signals(
        &self,
        status: Option<SignalStatus>,
        limit: i64,
    ) -> Result<Vec<MarketSignal>> {
        let mut signals: Vec<MarketSignal> = self
            .signals
            .iter()
            .filter(|s| status.map_or(true, |st| s.status == st))
            .map(|s| s.clone())
            .collect();

        signals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        signals.truncate(limit.max(0) as usize);

        Ok(signals)
    }

    async fn record_execution(
        &self,
        id: &str,
        report: &ExecutionReport,
    ) -> Result<MarketSignal> {
        let updated = {
            let mut entry = self
                .signals
                .get_mut(id)
                .ok_or_else(|| HunterError::NotFound(format!("Signal {} not found", id)))?;

            if !entry.status.is_open() {
                return Err(HunterError::Conflict(format!(
                    "Signal {} is already {}",
                    id, entry.status
                )));
            }

            entry.status = super::execution_status(report);
            entry.transaction_id = report.transaction_id.clone();
            entry.executed_at = Some(Utc::now());
            entry.clone()
        };

        self.publish(ChangeTable::MarketSignals, ChangeOp::Update, id);
        Ok(updated)
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append(&self, record: &NewLogRecord) -> Result<LogRecord> {
        let log = LogRecord {
            id: self.next_log_id.fetch_add(1, Ordering::SeqCst) + 1,
            level: record.level,
            message: record.message.clone(),
            timestamp: Utc::now(),
        };

        self.logs.lock().push(log.clone());
        Ok(log)
    }

    async fn list_logs(&self, level: Option<LogLevel>, limit: i64) -> Result<Vec<LogRecord>> {
        let logs = self.logs.lock();

        Ok(logs
            .iter()
            .rev()
            .filter(|l| level.map_or(true, |lv| l.level == lv))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn delete_older_than(&self, days: i32) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|l| l.timestamp >= cutoff);

        Ok((before - logs.len()) as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::change_channel;
    use rust_decimal_macros::dec;

    fn signal(id: &str) -> MarketSignal {
        MarketSignal {
            id: id.to_string(),
            source: "EBAY".to_string(),
            target_name: "Leica M6".to_string(),
            brand_category: "Leica".to_string(),
            condition_score: 4,
            listed_price: dec!(500),
            estimated_value: dec!(1020),
            profit_margin: dec!(520),
            url: "https://example.com/item".to_string(),
            status: SignalStatus::Pending,
            timestamp: Utc::now(),
            transaction_id: None,
            executed_at: None,
        }
    }

    #[tokio::test]
    async fn test_same_node_upserted_twice_keeps_latest() {
        let store = MemoryStore::new();

        store
            .upsert_nodes(&[ProxyNode::active("1.2.3.4:80", 90).unwrap()])
            .await
            .unwrap();
        store
            .upsert_nodes(&[ProxyNode::active("1.2.3.4:80", 30).unwrap()])
            .await
            .unwrap();

        let nodes = store.list_nodes(None, 10).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].latency_ms, Some(30));
    }

    #[tokio::test]
    async fn test_fail_count_accumulates_and_resets() {
        let store = MemoryStore::new();
        let dead = ProxyNode::dead("5.6.7.8:3128").unwrap();

        store.upsert_nodes(&[dead.clone()]).await.unwrap();
        store.upsert_nodes(&[dead.clone()]).await.unwrap();
        store.upsert_nodes(&[dead]).await.unwrap();
        let nodes = store.list_nodes(Some(NodeStatus::Dead), 10).await.unwrap();
        assert_eq!(nodes[0].fail_count, 3);

        store
            .upsert_nodes(&[ProxyNode::active("5.6.7.8:3128", 40).unwrap()])
            .await
            .unwrap();
        let nodes = store.list_nodes(None, 10).await.unwrap();
        assert_eq!(nodes[0].fail_count, 0);
        assert!(nodes[0].is_consistent());
    }

    #[tokio::test]
    async fn test_fastest_active_and_ordering() {
        let store = MemoryStore::new();
        store
            .upsert_nodes(&[
                ProxyNode::active("10.0.0.1:80", 50).unwrap(),
                ProxyNode::dead("10.0.0.9:80").unwrap(),
                ProxyNode::active("10.0.0.2:80", 20).unwrap(),
                ProxyNode::active("10.0.0.3:80", 80).unwrap(),
            ])
            .await
            .unwrap();

        let best = store.fastest_active().await.unwrap().unwrap();
        assert_eq!(best.id, "10.0.0.2:80");

        let ids: Vec<String> = store
            .list_nodes(None, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["10.0.0.2:80", "10.0.0.1:80", "10.0.0.3:80", "10.0.0.9:80"]);
    }

    #[tokio::test]
    async fn test_closed_signals_are_not_overwritten() {
        let store = MemoryStore::new();
        store.insert_signals(&[signal("EBAY-1")]).await.unwrap();

        let report = ExecutionReport {
            success: true,
            price: dec!(500),
            transaction_id: Some("tx-9".to_string()),
            error: None,
        };
        let executed = store.record_execution("EBAY-1", &report).await.unwrap();
        assert_eq!(executed.status, SignalStatus::Executed);
        assert_eq!(executed.transaction_id.as_deref(), Some("tx-9"));
        assert!(executed.executed_at.is_some());

        let written = store.insert_signals(&[signal("EBAY-1")]).await.unwrap();
        assert_eq!(written, 0);
        let stored = store.list_signals(None, 10).await.unwrap();
        assert_eq!(stored[0].status, SignalStatus::Executed);

        let again = store.record_execution("EBAY-1", &report).await;
        assert!(matches!(again, Err(HunterError::Conflict(_))));
        let missing = store.record_execution("EBAY-404", &report).await;
        assert!(matches!(missing, Err(HunterError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_logs_newest_first_with_level_filter() {
        let store = MemoryStore::new();
        store.append(&NewLogRecord::info("one")).await.unwrap();
        store.append(&NewLogRecord::warn("two")).await.unwrap();
        store.append(&NewLogRecord::info("three")).await.unwrap();

        let all = store.list_logs(None, 10).await.unwrap();
        assert_eq!(all[0].message, "three");
        assert_eq!(all.len(), 3);

        let warnings = store.list_logs(Some(LogLevel::Warn), 10).await.unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "two");

        assert_eq!(store.delete_older_than(1).await.unwrap(), 0);
        assert_eq!(store.delete_older_than(-1).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_publishes_change_events() {
        let tx = change_channel();
        let mut rx = tx.subscribe();
        let store = MemoryStore::with_changes(tx);

        store.insert_signals(&[signal("EBAY-7")]).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ChangeEvent::new(ChangeTable::MarketSignals, ChangeOp::Insert, "EBAY-7")
        );
    }
}
