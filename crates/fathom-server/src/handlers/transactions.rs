//! Transaction search handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::debug;

use crate::{AppError, AppState};
use fathom_core::tools::SearchTransactionsParams;
use fathom_core::SearchResults;

/// GET /api/transactions - Search with query-string criteria
///
/// Tags may be given as a comma-separated list (`?tags=food,travel`).
pub async fn search_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchTransactionsParams>,
) -> Result<Json<SearchResults>, AppError> {
    run_search(&state, params).await
}

/// POST /api/transactions/search - Search with a JSON body
pub async fn search_transactions_json(
    State(state): State<Arc<AppState>>,
    Json(params): Json<SearchTransactionsParams>,
) -> Result<Json<SearchResults>, AppError> {
    run_search(&state, params).await
}

async fn run_search(
    state: &AppState,
    params: SearchTransactionsParams,
) -> Result<Json<SearchResults>, AppError> {
    let criteria = params.into_criteria()?;
    let results = state.search.search(&criteria, None).await?;
    debug!(
        total_hits = results.total_hits,
        returned = results.returned_count,
        "search complete"
    );
    Ok(Json(results))
}
