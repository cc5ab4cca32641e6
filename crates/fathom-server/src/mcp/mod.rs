//! MCP (Model Context Protocol) Server for Fathom
//!
//! Exposes transaction search and spending analytics to LLMs via MCP tools.
//! All tools are read-only.
//!
//! # Architecture
//!
//! The MCP server runs on a separate port from the REST API, using
//! Streamable HTTP transport.
//!
//! ```bash
//! fathom serve --port 3000 --mcp-port 3001
//! ```
//!
//! # Available Tools
//!
//! - `search_transactions` - Find transactions by text, merchant, category, amount, date
//! - `get_transaction_summary` - Totals, breakdowns and monthly trend
//! - `health_check` - Store reachability and index status

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Serialize;
use tracing::info;

use fathom_core::tools::{SearchTransactionsParams, SummaryParams};
use fathom_core::TransactionSearch;

/// Fathom MCP Server state
#[derive(Clone)]
pub struct FathomMcpServer {
    search: TransactionSearch,
    tool_router: ToolRouter<Self>,
}

impl FathomMcpServer {
    pub fn new(search: TransactionSearch) -> Self {
        Self {
            search,
            tool_router: Self::tool_router(),
        }
    }
}

/// Map core errors onto MCP error codes
fn to_mcp_error(err: fathom_core::Error) -> McpError {
    match err {
        fathom_core::Error::InvalidCriteria(msg) => McpError::invalid_params(msg, None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

#[tool_handler]
impl ServerHandler for FathomMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "fathom".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Fathom Transaction Search".to_string()),
                website_url: None,
                icons: None,
            },
            instructions: Some(
                "Fathom searches a banking transaction store. Use search_transactions to find \
                 individual transactions and get_transaction_summary for spending totals, \
                 category and account breakdowns, and monthly trends. Amount bounds compare \
                 against the absolute value; spending amounts are negative."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl FathomMcpServer {
    #[tool(
        description = "Search banking transactions. All filters are optional and combined with AND. Returns matching transactions newest first, the total hit count, and the query that was run."
    )]
    async fn search_transactions(
        &self,
        Parameters(params): Parameters<SearchTransactionsParams>,
    ) -> Result<CallToolResult, McpError> {
        let criteria = params.into_criteria().map_err(to_mcp_error)?;
        let results = self
            .search
            .search(&criteria, None)
            .await
            .map_err(to_mcp_error)?;
        json_result(&results)
    }

    #[tool(
        description = "Summarize spending and income. Returns totals, average amount, breakdowns by category and account type, and a monthly trend."
    )]
    async fn get_transaction_summary(
        &self,
        Parameters(params): Parameters<SummaryParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = params.into_request().map_err(to_mcp_error)?;
        let summary = self
            .search
            .summarize(&request, None)
            .await
            .map_err(to_mcp_error)?;
        json_result(&summary)
    }

    #[tool(description = "Check whether the transaction store is reachable and the index exists.")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let status = self.search.health(None).await.map_err(to_mcp_error)?;
        json_result(&status)
    }
}

/// Start the MCP server on the given port
pub async fn start_mcp_server(search: TransactionSearch, host: &str, port: u16) -> anyhow::Result<()> {
    use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
    use rmcp::transport::streamable_http_server::StreamableHttpService;

    info!("Starting MCP server at http://{}:{}/mcp", host, port);

    let service = StreamableHttpService::new(
        move || Ok(FathomMcpServer::new(search.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("MCP server ready at http://{}/mcp", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
