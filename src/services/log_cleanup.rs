//! Log retention service
//!
//! Periodically deletes system log records older than the retention period.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::repository::{LogStore, SharedStore};

/// Log cleanup service configuration
#[derive(Debug, Clone)]
pub struct LogCleanupConfig {
    pub retention_days: i32,
}

impl LogCleanupConfig {
    /// Shorter retention is checked more often
    pub fn check_interval(&self) -> Duration {
        let secs = match self.retention_days {
            i32::MIN..=1 => 300,
            2..=7 => 3600,
            _ => 86400,
        };
        Duration::from_secs(secs)
    }
}

impl Default for LogCleanupConfig {
    fn default() -> Self {
        Self { retention_days: 14 }
    }
}

pub struct LogCleanupService {
    store: SharedStore,
    config: LogCleanupConfig,
}

impl LogCleanupService {
    pub fn new(store: SharedStore, config: LogCleanupConfig) -> Self {
        Self { store, config }
    }

    /// Run until shutdown; the first cleanup happens immediately
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting log cleanup service (retention: {} days)",
            self.config.retention_days
        );

        let mut ticker = interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.cleanup().await {
                        error!("Log cleanup failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Log cleanup service shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Delete expired records, returning how many were removed
    pub async fn cleanup(&self) -> Result<u64> {
        let deleted = self
            .store
            .delete_older_than(self.config.retention_days)
            .await?;

        if deleted > 0 {
            info!(
                "Deleted {} log records older than {} days",
                deleted, self.config.retention_days
            );
        } else {
            debug!("No expired log records");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewLogRecord;
    use crate::repository::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_check_interval_follows_retention() {
        assert_eq!(
            LogCleanupConfig { retention_days: 1 }.check_interval(),
            Duration::from_secs(300)
        );
        assert_eq!(
            LogCleanupConfig { retention_days: 7 }.check_interval(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            LogCleanupConfig::default().check_interval(),
            Duration::from_secs(86400)
        );
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_records() {
        let store = Arc::new(MemoryStore::new());
        store.append(&NewLogRecord::info("fresh")).await.unwrap();

        let service = LogCleanupService::new(store.clone(), LogCleanupConfig::default());
        assert_eq!(service.cleanup().await.unwrap(), 0);
        assert_eq!(store.list_logs(None, 10).await.unwrap().len(), 1);
    }
}
