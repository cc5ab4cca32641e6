//! Fathom Core Library
//!
//! Query translation and spending analytics over a banking transaction store:
//! - Filter compiler: sparse, optional search criteria to a boolean filter
//! - Search executor: filtered, date-sorted, size-capped transaction search
//! - Summary aggregator: totals, averages, category/account breakdowns and
//!   monthly trends in a single aggregation round trip
//! - Store adapters for Elasticsearch and an in-memory fixture store
//! - Layered configuration (embedded defaults, override file, environment)

pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod query;
pub mod search;
pub mod service;
pub mod store;
pub mod summary;
pub mod tools;

/// Test utilities including mock Elasticsearch server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{Config, StoreConfig, SummaryConfig};
pub use error::{Error, Result};
pub use models::{
    AccountType, Coordinates, HealthStatus, Location, MonthlyTotal, QueryInfo, SearchCriteria,
    SearchResults, SummaryRequest, SummaryResult, Transaction, TransactionType,
};
pub use query::{compile_filter, FilterExpr, Predicate};
pub use service::TransactionSearch;
pub use store::{ElasticsearchStore, MemoryStore, QueryOptions, StoreClient, TransactionStore};
