//! Background services

pub mod log_cleanup;
pub mod scheduler;

pub use log_cleanup::{LogCleanupConfig, LogCleanupService};
pub use scheduler::{Scheduler, SchedulerConfig};

use tokio::sync::watch;

/// Shared stop switch for background tasks
pub struct ServiceHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ServiceHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for ServiceHandle {
    fn default() -> Self {
        Self::new().0
    }
}
