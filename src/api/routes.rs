//! API route definitions

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::middleware::require_bearer;
use super::server::AppState;
use super::websocket;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no auth required)
        .route("/health", get(handlers::health::health_check))
        .nest("/api", protected_routes(state.clone()))
        .with_state(state)
}

/// Routes that require the bearer secret
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Triggers
        .route("/sweep", post(handlers::sweep::trigger_sweep))
        .route("/fleet/sync", post(handlers::sweep::trigger_fleet_sync))
        // Signals
        .route("/signals", get(handlers::signals::list_signals))
        .route(
            "/signals/:id/execution",
            post(handlers::signals::record_execution),
        )
        // Fleet
        .route("/proxies", get(handlers::proxies::list_proxies))
        // Logs
        .route("/logs", get(handlers::logs::list_logs))
        // WebSocket endpoints
        .route("/ws/changes", get(websocket::changes::changes_ws))
        .route_layer(middleware::from_fn_with_state(state, require_bearer))
}
