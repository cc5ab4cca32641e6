//! Inbound facade over a transaction store

use crate::config::Config;
use crate::error::Result;
use crate::models::{HealthStatus, SearchCriteria, SearchResults, SummaryRequest, SummaryResult};
use crate::store::{QueryOptions, StoreClient, TransactionStore};
use crate::summary::DEFAULT_BUCKET_SIZE;
use crate::{health, search, summary};

/// Search, summary and health operations bound to one store
///
/// Holds no per-request state; cloning is cheap when the store is.
#[derive(Clone)]
pub struct TransactionSearch<S: TransactionStore = StoreClient> {
    store: S,
    default_options: QueryOptions,
    bucket_size: usize,
}

impl TransactionSearch<StoreClient> {
    /// Connect to the store described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = StoreClient::from_config(&config.store)?;
        Ok(Self::new(store)
            .with_default_options(config.store.query_options())
            .with_bucket_size(config.summary.bucket_size))
    }
}

impl<S: TransactionStore> TransactionSearch<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_options: QueryOptions::default(),
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }

    pub fn with_default_options(mut self, options: QueryOptions) -> Self {
        self.default_options = options;
        self
    }

    pub fn with_bucket_size(mut self, size: usize) -> Self {
        self.bucket_size = size.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Options used when a caller passes none
    pub fn default_options(&self) -> QueryOptions {
        self.default_options
    }

    pub async fn search(
        &self,
        criteria: &SearchCriteria,
        options: Option<QueryOptions>,
    ) -> Result<SearchResults> {
        let options = options.unwrap_or(self.default_options);
        search::search(&self.store, criteria, &options).await
    }

    pub async fn summarize(
        &self,
        request: &SummaryRequest,
        options: Option<QueryOptions>,
    ) -> Result<SummaryResult> {
        let options = options.unwrap_or(self.default_options);
        summary::summarize(&self.store, request, self.bucket_size, &options).await
    }

    pub async fn health(&self, options: Option<QueryOptions>) -> Result<HealthStatus> {
        let options = options.unwrap_or(self.default_options);
        health::health(&self.store, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::fixture_transactions;
    use std::time::Duration;

    #[tokio::test]
    async fn test_facade_over_memory_store() {
        let service = TransactionSearch::new(MemoryStore::new(fixture_transactions()))
            .with_default_options(QueryOptions::with_timeout(Duration::from_secs(1)));

        let results = service
            .search(&SearchCriteria::default(), None)
            .await
            .unwrap();
        assert_eq!(results.returned_count, 2);

        let summary = service
            .summarize(&SummaryRequest::default(), None)
            .await
            .unwrap();
        assert_eq!(summary.transaction_count, 2);

        let health = service.health(None).await.unwrap();
        assert!(health.reachable);
    }

    #[test]
    fn test_from_config_builds_elasticsearch_client() {
        let mut config = Config::default();
        config.store.timeout_secs = 3;
        config.summary.bucket_size = 15;
        let service = TransactionSearch::from_config(&config).unwrap();
        assert!(matches!(service.store(), StoreClient::Elasticsearch(_)));
        assert_eq!(service.store().index_name(), "banking_transactions");
        assert_eq!(
            service.default_options().timeout,
            Some(Duration::from_secs(3))
        );
    }
}
