//! Transaction store abstraction
//!
//! The engine talks to the document store through the [`TransactionStore`]
//! trait, one async call per operation. Two adapters ship with the crate:
//!
//! - `ElasticsearchStore`: REST client for an Elasticsearch-compatible cluster
//! - `MemoryStore`: evaluates the same requests over an in-process vector,
//!   used for tests and offline fixtures
//!
//! [`StoreClient`] wraps both, giving callers `Clone` and static dispatch.

mod elasticsearch;
mod memory;

pub use elasticsearch::ElasticsearchStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::query::{Field, FilterExpr};

/// Per-call options forwarded to the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound on the round trip; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// A filtered, sorted, size-capped search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub filter: FilterExpr,
    pub size: usize,
    /// Sorted on `transaction_date`
    pub sort: SortOrder,
    pub options: QueryOptions,
}

impl SearchRequest {
    /// Query DSL body: filter, sort and size
    pub fn to_body(&self) -> Value {
        json!({
            "query": self.filter.to_query(),
            "sort": [{ "transaction_date": { "order": self.sort.as_str() } }],
            "size": self.size,
        })
    }
}

/// One raw hit as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub id: Option<String>,
    pub score: Option<f64>,
    pub source: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    /// Total matches, independent of the size cap
    pub total_hits: u64,
    pub hits: Vec<RawHit>,
}

/// How an aggregation group partitions the matching transactions
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKind {
    /// Top `size` distinct keyword values
    Terms { field: Field, size: usize },
    /// Calendar months of `transaction_date`
    Monthly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub name: String,
    pub kind: GroupKind,
}

/// Overall stats plus named groups over the transactions matching `filter`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRequest {
    pub filter: FilterExpr,
    pub groups: Vec<GroupBy>,
    pub options: QueryOptions,
}

/// One bucket of a group: a key, how many transactions fell in it, and their
/// signed amount sum
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
    pub sum: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationResponse {
    pub count: u64,
    /// Signed sum of every amount
    pub sum: f64,
    /// Sum of negative amounts (still negative)
    pub spending_sum: f64,
    /// Sum of positive amounts
    pub income_sum: f64,
    pub groups: BTreeMap<String, Vec<Bucket>>,
}

/// Cluster reachability
#[derive(Debug, Clone, PartialEq)]
pub struct Ping {
    pub latency: Duration,
    pub cluster_name: Option<String>,
    pub status: Option<String>,
}

/// Index metadata
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    pub exists: bool,
    pub document_count: u64,
}

/// Outbound interface to the document store
///
/// Every method is a single round trip. Implementations honour
/// `QueryOptions::timeout` and report connection problems as
/// `Error::StoreUnavailable`.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse>;

    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse>;

    async fn ping(&self, options: &QueryOptions) -> Result<Ping>;

    async fn describe_index(&self, options: &QueryOptions) -> Result<IndexInfo>;

    /// Name of the index this store reads from
    fn index_name(&self) -> &str;
}

/// Concrete store enum
#[derive(Clone)]
pub enum StoreClient {
    Elasticsearch(ElasticsearchStore),
    Memory(MemoryStore),
}

impl StoreClient {
    /// Build an Elasticsearch client from configuration
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self::Elasticsearch(ElasticsearchStore::new(config)?))
    }

    pub fn memory(store: MemoryStore) -> Self {
        Self::Memory(store)
    }
}

#[async_trait]
impl TransactionStore for StoreClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        match self {
            Self::Elasticsearch(s) => s.search(request).await,
            Self::Memory(s) => s.search(request).await,
        }
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse> {
        match self {
            Self::Elasticsearch(s) => s.aggregate(request).await,
            Self::Memory(s) => s.aggregate(request).await,
        }
    }

    async fn ping(&self, options: &QueryOptions) -> Result<Ping> {
        match self {
            Self::Elasticsearch(s) => s.ping(options).await,
            Self::Memory(s) => s.ping(options).await,
        }
    }

    async fn describe_index(&self, options: &QueryOptions) -> Result<IndexInfo> {
        match self {
            Self::Elasticsearch(s) => s.describe_index(options).await,
            Self::Memory(s) => s.describe_index(options).await,
        }
    }

    fn index_name(&self) -> &str {
        match self {
            Self::Elasticsearch(s) => s.index_name(),
            Self::Memory(s) => s.index_name(),
        }
    }
}

/// Run a store call under the caller's timeout
///
/// Expiry is reported as `StoreUnavailable`; dropping the future cancels the
/// outstanding request.
pub(crate) async fn bounded<T, F>(options: &QueryOptions, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match options.timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            Error::store_unavailable(format!("no answer within {}ms", limit.as_millis()))
        })?,
        None => call.await,
    }
}
