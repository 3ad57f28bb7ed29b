//! Signal listing and execution reports

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::info;

use crate::api::server::AppState;
use crate::error::{HunterError, Result};
use crate::models::{ExecutionReport, MarketSignal, NewLogRecord, SignalListParams, SignalStatus};
use crate::repository::{list_limit, record_log, SignalStore};

/// Newest signals first
pub async fn list_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalListParams>,
) -> Result<Json<Vec<MarketSignal>>> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(SignalStatus::from_str(raw).ok_or_else(|| {
            HunterError::InvalidRequest(format!("Unknown signal status: {}", raw))
        })?),
        None => None,
    };

    let signals = state
        .store
        .list_signals(status, list_limit(params.limit))
        .await?;

    Ok(Json(signals))
}

/// Apply the execution collaborator's report to a PENDING signal
pub async fn record_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(report): Json<ExecutionReport>,
) -> Result<Json<MarketSignal>> {
    let signal = state.store.record_execution(&id, &report).await?;

    let record = if report.success {
        NewLogRecord::info(format!(
            "Signal {} executed at {} (transaction {})",
            id,
            report.price,
            report.transaction_id.as_deref().unwrap_or("-")
        ))
    } else {
        NewLogRecord::error(format!(
            "Execution of signal {} failed: {}",
            id,
            report.error.as_deref().unwrap_or("no reason given")
        ))
    };
    info!(id = %id, status = %signal.status, "Execution report applied");
    record_log(&*state.store, record).await;

    Ok(Json(signal))
}
