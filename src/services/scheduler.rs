//! Periodic fleet syncs and sweeps
//!
//! Each job runs on its own interval; a job never overlaps itself because the
//! next tick is only awaited once the current run returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument};

use crate::fleet::FleetManager;
use crate::hunter::Hunter;

/// Job intervals; `None` disables a job
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    pub fleet_sync_interval: Option<Duration>,
    pub sweep_interval: Option<Duration>,
}

pub struct Scheduler {
    fleet: Arc<FleetManager>,
    hunter: Arc<Hunter>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(fleet: Arc<FleetManager>, hunter: Arc<Hunter>, config: SchedulerConfig) -> Self {
        Self {
            fleet,
            hunter,
            config,
        }
    }

    /// Run both jobs until shutdown
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            fleet_sync = ?self.config.fleet_sync_interval,
            sweep = ?self.config.sweep_interval,
            "Starting scheduler"
        );

        tokio::join!(
            self.fleet_loop(shutdown.clone()),
            self.sweep_loop(shutdown)
        );

        info!("Scheduler shutting down");
    }

    async fn fleet_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let Some(period) = self.config.fleet_sync_interval else {
            debug!("Periodic fleet sync disabled");
            return;
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.fleet.sync().await;
                    debug!(?summary, "Scheduled fleet sync finished");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn sweep_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let Some(period) = self.config.sweep_interval else {
            debug!("Periodic sweeps disabled");
            return;
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let signals = self.hunter.run_sweep().await;
                    debug!(signals = signals.len(), "Scheduled sweep finished");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
