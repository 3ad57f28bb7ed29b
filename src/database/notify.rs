//! Change feed
//!
//! Relays Postgres NOTIFY payloads from the change triggers onto a bounded
//! broadcast channel that websocket subscribers read from.

use std::time::Duration;

use sqlx::postgres::PgListener;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, instrument, warn};

use super::migrations::CHANGE_CHANNEL;
use super::Database;
use crate::error::Result;
use crate::models::ChangeEvent;

/// Maximum number of undelivered change events kept per subscriber
pub const CHANGE_BUFFER_SIZE: usize = 1024;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Create the broadcast channel shared by the store and the API
pub fn change_channel() -> broadcast::Sender<ChangeEvent> {
    broadcast::channel(CHANGE_BUFFER_SIZE).0
}

/// Decode a trigger payload, ignoring anything malformed
pub fn parse_payload(payload: &str) -> Option<ChangeEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Ignoring malformed change payload: {}", e);
            None
        }
    }
}

/// Background task forwarding NOTIFY events to the broadcast channel
pub struct ChangeListener {
    db: Database,
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeListener {
    pub fn new(db: Database, sender: broadcast::Sender<ChangeEvent>) -> Self {
        Self { db, sender }
    }

    /// Run until shutdown; reconnects after listener failures
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting change listener on channel {}", CHANGE_CHANNEL);

        loop {
            match self.listen(&mut shutdown).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("Change listener failed: {}; reconnecting", e);
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!("Change listener shutting down");
    }

    async fn listen(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let mut listener = PgListener::connect_with(self.db.pool()).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        loop {
            tokio::select! {
                notification = listener.recv() => {
                    let notification = notification?;
                    if let Some(event) = parse_payload(notification.payload()) {
                        // No subscribers is not an error.
                        let _ = self.sender.send(event);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}
