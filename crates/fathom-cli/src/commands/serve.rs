//! Server command implementation

use anyhow::Result;
use fathom_core::{TransactionSearch, TransactionStore};

pub async fn cmd_serve(
    search: TransactionSearch,
    host: &str,
    port: u16,
    mcp_port: Option<u16>,
) -> Result<()> {
    println!("🚀 Starting Fathom web server...");
    println!("   Index: {}", search.store().index_name());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(mcp) = mcp_port {
        println!("   MCP server: http://{}:{}/mcp", host, mcp);
    }
    println!();

    // Start MCP server if port specified
    if let Some(mcp) = mcp_port {
        let mcp_search = search.clone();
        let mcp_host = host.to_string();
        tokio::spawn(async move {
            if let Err(e) =
                fathom_server::mcp::start_mcp_server(mcp_search, &mcp_host, mcp).await
            {
                eprintln!("MCP server error: {}", e);
            }
        });
    }

    fathom_server::serve(search, host, port).await
}
