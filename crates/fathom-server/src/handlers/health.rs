//! Store health handler

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::{AppError, AppState};
use fathom_core::HealthStatus;

/// GET /api/health - Store reachability and index status
///
/// Answers 503 with the same body when the store is down or the index is
/// missing, so load balancers can use the status code alone.
pub async fn get_health(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<HealthStatus>), AppError> {
    let status = state.search.health(None).await?;
    let code = if status.reachable && status.index_exists {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((code, Json(status)))
}
