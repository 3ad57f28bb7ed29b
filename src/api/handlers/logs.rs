//! System log listing

use axum::extract::{Query, State};
use axum::Json;

use crate::api::server::AppState;
use crate::error::{HunterError, Result};
use crate::models::{LogLevel, LogListParams, LogRecord};
use crate::repository::{list_limit, LogStore};

/// Newest records first
pub async fn list_logs(
    State(state): State<AppState>,
    Query(params): Query<LogListParams>,
) -> Result<Json<Vec<LogRecord>>> {
    let level = match params.level.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            LogLevel::from_str(raw)
                .ok_or_else(|| HunterError::InvalidRequest(format!("Unknown log level: {}", raw)))?,
        ),
        None => None,
    };

    let logs = state.store.list_logs(level, list_limit(params.limit)).await?;

    Ok(Json(logs))
}
