//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Fathom - Search and summarize banking transactions
#[derive(Parser)]
#[command(name = "fathom")]
#[command(about = "Transaction search and spending analytics over Elasticsearch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the per-user override, if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Query a JSON file of transactions instead of Elasticsearch
    ///
    /// The file holds an array of transaction documents in the same shape
    /// the index stores them.
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Per-query timeout in seconds (overrides the configured timeout)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search transactions
    Search(SearchArgs),

    /// Summarize spending and income
    Summary(SummaryArgs),

    /// Check store connectivity and index status
    Health {
        /// Print the raw status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for MCP (Model Context Protocol) server
        ///
        /// When set, starts an MCP server for LLM tool access on the specified port.
        /// Example: --mcp-port 3001
        #[arg(long)]
        mcp_port: Option<u16>,
    },
}

/// Output format for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Free text matched against description, memo and reference
    #[arg(short, long)]
    pub description: Option<String>,

    /// Text matched against the memo
    #[arg(long)]
    pub memo: Option<String>,

    /// Merchant name (fuzzy)
    #[arg(short, long)]
    pub merchant: Option<String>,

    /// Category (exact, case-insensitive)
    #[arg(short, long)]
    pub category: Option<String>,

    /// Subcategory (exact, case-insensitive)
    #[arg(long)]
    pub subcategory: Option<String>,

    /// City, state or street address
    #[arg(long)]
    pub location: Option<String>,

    /// Account identifier
    #[arg(long)]
    pub account_id: Option<String>,

    /// Account type: checking, savings, credit
    #[arg(long)]
    pub account_type: Option<String>,

    /// Transaction type: debit, credit, transfer, fee, interest
    #[arg(long)]
    pub transaction_type: Option<String>,

    /// Match any of these tags (comma-separated or repeated)
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Minimum absolute amount
    #[arg(long)]
    pub amount_min: Option<f64>,

    /// Maximum absolute amount
    #[arg(long)]
    pub amount_max: Option<f64>,

    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub to: Option<String>,

    /// Only pending (true) or only posted (false)
    #[arg(long)]
    pub pending: Option<bool>,

    /// Only recurring (true) or only one-off (false)
    #[arg(long)]
    pub recurring: Option<bool>,

    /// Maximum results to return
    #[arg(short, long, default_value = "10")]
    pub limit: i64,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Print the compiled store query before the results
    #[arg(long)]
    pub show_query: bool,
}

#[derive(Args, Debug, Default)]
pub struct SummaryArgs {
    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub from: Option<String>,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub to: Option<String>,

    /// Restrict to one category
    #[arg(short, long)]
    pub category: Option<String>,

    /// Restrict to one account type
    #[arg(long)]
    pub account_type: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}
