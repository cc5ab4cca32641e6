//! Spending summary handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{AppError, AppState};
use fathom_core::tools::SummaryParams;
use fathom_core::SummaryResult;

/// GET /api/summary - Totals, breakdowns and monthly trend
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<SummaryResult>, AppError> {
    let request = params.into_request()?;
    let summary = state.search.summarize(&request, None).await?;
    Ok(Json(summary))
}
