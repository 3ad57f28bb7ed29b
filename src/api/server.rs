//! API server using Axum

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::sync::{broadcast, watch};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::config::ApiServerConfig;
use crate::error::{HunterError, Result};
use crate::fleet::FleetManager;
use crate::hunter::Hunter;
use crate::models::ChangeEvent;
use crate::repository::SharedStore;

use super::middleware::{cors_layer, SharedSecretAuth};
use super::routes;

/// Shared state for API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub fleet: Arc<FleetManager>,
    pub hunter: Arc<Hunter>,
    pub auth: SharedSecretAuth,
    pub changes: broadcast::Sender<ChangeEvent>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: &ApiServerConfig,
        store: SharedStore,
        fleet: Arc<FleetManager>,
        hunter: Arc<Hunter>,
        changes: broadcast::Sender<ChangeEvent>,
    ) -> Self {
        Self {
            store,
            fleet,
            hunter,
            auth: SharedSecretAuth::new(&config.api_secret),
            changes,
            started_at: Instant::now(),
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until the shutdown signal flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| HunterError::InvalidConfig(format!("Invalid API address: {}", e)))?;

        let router = self.build_router();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| HunterError::Internal(e.to_string()))?;

        info!("API server shut down");
        Ok(())
    }
}
