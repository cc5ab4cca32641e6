//! In-memory transaction store
//!
//! Evaluates compiled filters in-process over a fixed set of transactions.
//! Used by tests and for running the CLI or server against a JSON fixture
//! without a cluster.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Transaction;
use crate::query::Field;

use super::{
    AggregationRequest, AggregationResponse, Bucket, GroupKind, IndexInfo, Ping, QueryOptions,
    RawHit, SearchRequest, SearchResponse, SortOrder, TransactionStore,
};

pub const DEFAULT_INDEX: &str = "banking_transactions";

#[derive(Clone)]
pub struct MemoryStore {
    transactions: Arc<Vec<Transaction>>,
    index: String,
    available: bool,
}

impl MemoryStore {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Arc::new(transactions),
            index: DEFAULT_INDEX.to_string(),
            available: true,
        }
    }

    /// A store that fails every call as unreachable
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_index(mut self, index: &str) -> Self {
        self.index = index.to_string();
        self
    }

    /// Load a JSON array of transactions
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let transactions: Vec<Transaction> = serde_json::from_str(&contents)?;
        debug!(
            "Loaded {} transactions from {}",
            transactions.len(),
            path.display()
        );
        Ok(Self::new(transactions))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::store_unavailable("memory store is offline"))
        }
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.check_available()?;

        let mut matched: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|tx| request.filter.matches(tx))
            .collect();
        // stable sort keeps insertion order within a day
        match request.sort {
            SortOrder::Desc => matched.sort_by_key(|tx| Reverse(tx.transaction_date)),
            SortOrder::Asc => matched.sort_by_key(|tx| tx.transaction_date),
        }

        let total_hits = matched.len() as u64;
        let hits = matched
            .into_iter()
            .take(request.size)
            .map(|tx| -> Result<RawHit> {
                Ok(RawHit {
                    id: Some(tx.transaction_id.clone()),
                    score: None,
                    source: serde_json::to_value(tx)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResponse { total_hits, hits })
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse> {
        self.check_available()?;

        let matched: Vec<&Transaction> = self
            .transactions
            .iter()
            .filter(|tx| request.filter.matches(tx))
            .collect();

        let mut response = AggregationResponse {
            count: matched.len() as u64,
            ..Default::default()
        };
        for tx in &matched {
            response.sum += tx.amount;
            if tx.amount < 0.0 {
                response.spending_sum += tx.amount;
            } else if tx.amount > 0.0 {
                response.income_sum += tx.amount;
            }
        }

        for group in &request.groups {
            let buckets = match &group.kind {
                GroupKind::Terms { field, size } => terms_buckets(&matched, *field, *size),
                GroupKind::Monthly => monthly_buckets(&matched),
            };
            response.groups.insert(group.name.clone(), buckets);
        }

        Ok(response)
    }

    async fn ping(&self, _options: &QueryOptions) -> Result<Ping> {
        let started = Instant::now();
        self.check_available()?;
        Ok(Ping {
            latency: started.elapsed().max(Duration::from_micros(1)),
            cluster_name: Some("memory".to_string()),
            status: Some("green".to_string()),
        })
    }

    async fn describe_index(&self, _options: &QueryOptions) -> Result<IndexInfo> {
        self.check_available()?;
        Ok(IndexInfo {
            exists: true,
            document_count: self.transactions.len() as u64,
        })
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

fn group_key(tx: &Transaction, field: Field) -> Option<&str> {
    match field {
        Field::Category => tx.category.as_deref(),
        Field::Subcategory => tx.subcategory.as_deref(),
        Field::AccountId => Some(tx.account_id.as_str()),
        Field::AccountType => Some(tx.account_type.as_str()),
        Field::TransactionType => Some(tx.transaction_type.as_str()),
        Field::Merchant => tx.merchant.as_deref(),
        _ => None,
    }
}

fn add_to(buckets: &mut BTreeMap<String, Bucket>, key: &str, amount: f64) {
    let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
        key: key.to_string(),
        doc_count: 0,
        sum: 0.0,
    });
    bucket.doc_count += 1;
    bucket.sum += amount;
}

/// Top `size` keys by document count, ties broken by key
fn terms_buckets(matched: &[&Transaction], field: Field, size: usize) -> Vec<Bucket> {
    let mut buckets = BTreeMap::new();
    for tx in matched {
        if field == Field::Tags {
            for tag in &tx.tags {
                add_to(&mut buckets, tag, tx.amount);
            }
        } else if let Some(key) = group_key(tx, field) {
            add_to(&mut buckets, key, tx.amount);
        }
    }

    let mut buckets: Vec<Bucket> = buckets.into_values().collect();
    buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
    buckets.truncate(size);
    buckets
}

/// One bucket per calendar month that has transactions, oldest first
fn monthly_buckets(matched: &[&Transaction]) -> Vec<Bucket> {
    let mut buckets = BTreeMap::new();
    for tx in matched {
        let month = tx.transaction_date.format("%Y-%m").to_string();
        add_to(&mut buckets, &month, tx.amount);
    }
    buckets.into_values().collect()
}
