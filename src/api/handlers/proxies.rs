//! Proxy fleet listing

use axum::extract::{Query, State};
use axum::Json;

use crate::api::server::AppState;
use crate::error::{HunterError, Result};
use crate::models::{NodeStatus, ProxyListParams, ProxyNode};
use crate::repository::{list_limit, ProxyStore};

/// Fleet, ACTIVE nodes by latency first
pub async fn list_proxies(
    State(state): State<AppState>,
    Query(params): Query<ProxyListParams>,
) -> Result<Json<Vec<ProxyNode>>> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(NodeStatus::from_str(raw).ok_or_else(|| {
            HunterError::InvalidRequest(format!("Unknown proxy status: {}", raw))
        })?),
        None => None,
    };

    let nodes = state
        .store
        .list_nodes(status, list_limit(params.limit))
        .await?;

    Ok(Json(nodes))
}
