//! Fathom CLI - Banking transaction search
//!
//! Usage:
//!   fathom search --merchant Starbucks    Search transactions
//!   fathom summary --from 2024-01-01      Spending summary
//!   fathom health                         Check the store
//!   fathom serve --port 3000              Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let source = commands::StoreSource {
        config: cli.config.as_deref(),
        data: cli.data.as_deref(),
        timeout_secs: cli.timeout,
    };

    match cli.command {
        Commands::Search(args) => commands::cmd_search(&source.open()?, args).await,
        Commands::Summary(args) => commands::cmd_summary(&source.open()?, args).await,
        Commands::Health { json } => commands::cmd_health(&source.open()?, json).await,
        Commands::Config => commands::cmd_config(cli.config.as_deref()),
        Commands::Serve {
            port,
            host,
            mcp_port,
        } => commands::cmd_serve(source.open()?, &host, port, mcp_port).await,
    }
}
