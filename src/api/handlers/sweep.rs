//! Manual triggers for the two periodic jobs

use axum::extract::State;
use axum::Json;
use tracing::info;

use crate::api::server::AppState;
use crate::error::HunterError;
use crate::fleet::FleetSyncSummary;
use crate::hunter::SweepSummary;

/// Run one sweep and return its summary
pub async fn trigger_sweep(
    State(state): State<AppState>,
) -> Result<Json<SweepSummary>, HunterError> {
    info!("Sweep triggered over HTTP");
    let report = state.hunter.run_sweep_report().await?;
    Ok(Json(report.summary))
}

/// Run one fleet sync and return its summary
pub async fn trigger_fleet_sync(
    State(state): State<AppState>,
) -> Result<Json<FleetSyncSummary>, HunterError> {
    info!("Fleet sync triggered over HTTP");
    let summary = state.fleet.sync().await;

    if summary.store_failed() {
        return Err(HunterError::StoreUnavailable(format!(
            "{} proxy batches could not be persisted",
            summary.failed_batches
        )));
    }

    Ok(Json(summary))
}
