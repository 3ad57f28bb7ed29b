//! Health check endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::api::server::AppState;
use crate::repository::Store;

/// Liveness plus a store round-trip
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().as_secs();

    match state.store.ping().await {
        Ok(latency) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "hunter",
                "uptime_secs": uptime_secs,
                "store_latency_ms": latency.as_millis() as u64,
            })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "hunter",
                    "uptime_secs": uptime_secs,
                    "error": e.to_string(),
                })),
            )
        }
    }
}
