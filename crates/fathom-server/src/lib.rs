//! Fathom Web Server
//!
//! Exposes transaction search, spending summaries and store health over a
//! small JSON API:
//!
//! - `GET  /api/transactions` search with query-string criteria
//! - `POST /api/transactions/search` search with a JSON body
//! - `GET  /api/summary` spending summary
//! - `GET  /api/health` store reachability and index status
//!
//! The same operations are available to LLM clients through the MCP server
//! in [`mcp`], which runs on its own port.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use fathom_core::TransactionSearch;

mod handlers;
pub mod mcp;

/// Server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Read `FATHOM_ALLOWED_ORIGINS` (comma-separated)
    pub fn from_env() -> Self {
        let allowed_origins = std::env::var("FATHOM_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { allowed_origins }
    }
}

/// Shared application state
pub struct AppState {
    pub search: TransactionSearch,
}

/// Create the application router
pub fn create_router(search: TransactionSearch, config: ServerConfig) -> Router {
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    let state = Arc::new(AppState { search });

    let api_routes = Router::new()
        .route("/transactions", get(handlers::search_transactions))
        .route(
            "/transactions/search",
            post(handlers::search_transactions_json),
        )
        .route("/summary", get(handlers::get_summary))
        .route("/health", get(handlers::get_health));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(search: TransactionSearch, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(search, host, port, ServerConfig::from_env()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    search: TransactionSearch,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    check_store_connection(&search).await;

    let app = create_router(search, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Log store status at startup; the server still starts when it is down
async fn check_store_connection(search: &TransactionSearch) {
    match search.health(None).await {
        Ok(status) if status.reachable && status.index_exists => {
            info!(
                "Store connected: {} ({}), index '{}' holds {} documents",
                status.cluster_name.as_deref().unwrap_or("unknown"),
                status.status.as_deref().unwrap_or("unknown"),
                status.index_name,
                status.document_count
            );
        }
        Ok(status) if status.reachable => {
            warn!("Store reachable but index '{}' does not exist", status.index_name);
        }
        Ok(status) => {
            warn!(
                "Store not responding: {}",
                status.error.as_deref().unwrap_or("unknown error")
            );
        }
        Err(e) => {
            warn!("Store health check failed: {}", e);
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn unavailable(msg: &str) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.to_string(),
            internal: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(ref err) = self.internal {
            error!(error = %err, "Internal error");
        } else if self.status.is_server_error() {
            warn!(status = %self.status, "{}", self.message);
        }

        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err: anyhow::Error = err.into();
        match err.downcast_ref::<fathom_core::Error>() {
            Some(fathom_core::Error::InvalidCriteria(msg)) => Self::bad_request(msg),
            Some(core @ fathom_core::Error::StoreUnavailable(_)) => {
                Self::unavailable(&core.to_string())
            }
            Some(
                core @ (fathom_core::Error::QueryRejected { .. }
                | fathom_core::Error::InvalidResponse(_)),
            ) => Self::bad_gateway(&core.to_string()),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "An internal error occurred".to_string(),
                internal: Some(err),
            },
        }
    }
}
