//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `search` - Transaction search with table, JSON and CSV output
//! - `summary` - Spending summary
//! - `status` - Store health and effective configuration
//! - `serve` - Web server command

pub mod search;
pub mod serve;
pub mod status;
pub mod summary;

// Re-export command functions for main.rs
pub use search::*;
pub use serve::*;
pub use status::*;
pub use summary::*;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use fathom_core::{Config, MemoryStore, QueryOptions, StoreClient, TransactionSearch};

/// Where commands read transactions from
pub struct StoreSource<'a> {
    /// Explicit config file
    pub config: Option<&'a Path>,
    /// JSON fixture file, replacing Elasticsearch when set
    pub data: Option<&'a Path>,
    /// Per-query timeout override
    pub timeout_secs: Option<u64>,
}

impl StoreSource<'_> {
    /// Load configuration and connect to the configured store
    pub fn open(&self) -> Result<TransactionSearch> {
        let config = Config::load(self.config).context("Failed to load configuration")?;

        let search = match self.data {
            Some(path) => {
                let store = MemoryStore::from_json_file(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?
                    .with_index(&config.store.index);
                TransactionSearch::new(StoreClient::memory(store))
                    .with_default_options(config.store.query_options())
                    .with_bucket_size(config.summary.bucket_size)
            }
            None => TransactionSearch::from_config(&config)
                .context("Failed to create Elasticsearch client")?,
        };

        Ok(match self.timeout_secs {
            Some(secs) => {
                search.with_default_options(QueryOptions::with_timeout(Duration::from_secs(secs)))
            }
            None => search,
        })
    }
}

/// Truncate a string to fit a table column
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Red for outflows, green for inflows
pub fn format_amount(amount: f64) -> String {
    if amount < 0.0 {
        format!("\x1b[31m-${:.2}\x1b[0m", amount.abs())
    } else {
        format!("\x1b[32m+${:.2}\x1b[0m", amount)
    }
}
