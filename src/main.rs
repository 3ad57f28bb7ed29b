//! Hunter - Entry Point
//!
//! Starts the API server and background services with graceful shutdown support.
//! Pass `--memory` to run against the in-process store instead of PostgreSQL.

use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hunter::api::server::AppState;
use hunter::api::ApiServer;
use hunter::config::LogConfig;
use hunter::database::{change_channel, ChangeListener};
use hunter::fleet::FleetManager;
use hunter::hunter::{BrowserBypass, BrowserBypassConfig, HttpTransport, Hunter};
use hunter::models::ValuationModel;
use hunter::repository::{MemoryStore, PgStore, SharedStore};
use hunter::services::{
    LogCleanupConfig, LogCleanupService, Scheduler, SchedulerConfig, ServiceHandle,
};
use hunter::{Config, Database};

#[tokio::main]
async fn main() -> hunter::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Hunter");

    let memory_mode = std::env::args().any(|arg| arg == "--memory");
    let changes = change_channel();
    let handle = ServiceHandle::default();
    let mut tasks = Vec::new();

    let store: SharedStore = if memory_mode {
        info!("Using in-memory store");
        Arc::new(MemoryStore::with_changes(changes.clone()))
    } else {
        let db = Database::new(&config).await?;
        info!("Connected to database");

        db.run_migrations().await?;
        info!("Database migrations complete");

        let listener = ChangeListener::new(db.clone(), changes.clone());
        let listener_shutdown = handle.subscribe();
        tasks.push(tokio::spawn(async move {
            listener.run(listener_shutdown).await;
        }));

        Arc::new(PgStore::new(db))
    };

    let fleet = Arc::new(FleetManager::new(store.clone(), config.fleet.clone())?);
    let transport = Arc::new(HttpTransport::new(
        config.hunter.fetch_timeout,
        config.hunter.market_token.clone(),
    ));
    let bypass = Arc::new(BrowserBypass::new(BrowserBypassConfig {
        navigation_timeout: config.hunter.navigation_timeout,
        settle: config.hunter.settle,
        chrome_executable: config.hunter.chrome_executable.clone(),
    }));
    let hunter = Arc::new(Hunter::new(
        store.clone(),
        fleet.clone(),
        transport,
        bypass,
        Arc::new(ValuationModel::standard()),
        config.hunter.clone(),
    ));
    info!(
        sources = config.hunter.sources.len(),
        "Hunter engine ready"
    );

    let scheduler = Scheduler::new(
        fleet.clone(),
        hunter.clone(),
        SchedulerConfig {
            fleet_sync_interval: config.fleet.sync_interval,
            sweep_interval: config.hunter.sweep_interval,
        },
    );
    let scheduler_shutdown = handle.subscribe();
    tasks.push(tokio::spawn(async move {
        scheduler.run(scheduler_shutdown).await;
    }));

    let cleanup = LogCleanupService::new(
        store.clone(),
        LogCleanupConfig {
            retention_days: config.log.retention_days,
        },
    );
    let cleanup_shutdown = handle.subscribe();
    tasks.push(tokio::spawn(async move {
        cleanup.run(cleanup_shutdown).await;
    }));

    let state = AppState::new(&config.api, store, fleet, hunter, changes);
    let api_server = ApiServer::new(config.api.clone(), state);
    let api_shutdown = handle.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = api_server.run(api_shutdown).await {
            error!("API server error: {}", e);
        }
    }));

    info!("API listening on {}", config.api_addr());

    shutdown_signal().await;
    info!("Shutdown signal received");

    handle.shutdown();
    futures::future::join_all(tasks).await;

    info!("Hunter stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("hunter={},tower_http=info", log.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if log.format == "pretty" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
