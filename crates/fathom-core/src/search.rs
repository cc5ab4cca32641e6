//! Search executor
//!
//! Compiles criteria, issues one sorted, size-capped query and maps the raw
//! hits back into [`Transaction`] records.

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{QueryInfo, SearchCriteria, SearchResults, Transaction};
use crate::query::compile_filter;
use crate::store::{self, QueryOptions, RawHit, SearchRequest, SortOrder, TransactionStore};

/// Build the store request for a set of criteria
///
/// Fails with `InvalidCriteria` before anything is sent.
pub fn build_request(criteria: &SearchCriteria, options: &QueryOptions) -> Result<SearchRequest> {
    let size = criteria.validate_limit()?;
    let filter = compile_filter(criteria)?;
    Ok(SearchRequest {
        filter,
        size,
        sort: SortOrder::Desc,
        options: *options,
    })
}

/// Run a search, newest transactions first
pub async fn search<S>(
    store: &S,
    criteria: &SearchCriteria,
    options: &QueryOptions,
) -> Result<SearchResults>
where
    S: TransactionStore + ?Sized,
{
    let request = build_request(criteria, options)?;
    let response = store::bounded(options, store.search(&request)).await?;

    let transactions = response
        .hits
        .into_iter()
        .map(decode_hit)
        .collect::<Result<Vec<_>>>()?;
    debug!(
        total_hits = response.total_hits,
        returned = transactions.len(),
        "Search complete"
    );

    Ok(SearchResults {
        total_hits: response.total_hits,
        returned_count: transactions.len(),
        transactions,
        query_info: QueryInfo {
            search_params: criteria.clone(),
            store_query: request.to_body(),
        },
    })
}

/// Decode one hit; a hit that does not fit the transaction shape fails the
/// whole search rather than being dropped
fn decode_hit(hit: RawHit) -> Result<Transaction> {
    let mut tx: Transaction = serde_json::from_value(hit.source).map_err(|e| {
        Error::InvalidResponse(format!(
            "hit {} is not a transaction: {}",
            hit.id.as_deref().unwrap_or("<no id>"),
            e
        ))
    })?;
    tx.id = hit.id.or(tx.id);
    tx.score = hit.score;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::fixture_transactions;
    use serde_json::json;

    #[test]
    fn test_build_request_rejects_bad_limit() {
        let criteria = SearchCriteria {
            limit: 0,
            ..Default::default()
        };
        assert!(matches!(
            build_request(&criteria, &QueryOptions::default()),
            Err(Error::InvalidCriteria(_))
        ));
    }

    #[test]
    fn test_build_request_sorts_newest_first() {
        let criteria = SearchCriteria {
            limit: 25,
            ..Default::default()
        };
        let request = build_request(&criteria, &QueryOptions::default()).unwrap();
        assert_eq!(request.size, 25);
        assert_eq!(
            request.to_body(),
            json!({
                "query": { "match_all": {} },
                "sort": [{ "transaction_date": { "order": "desc" } }],
                "size": 25,
            })
        );
    }

    #[test]
    fn test_decode_hit_sets_store_metadata() {
        let source = serde_json::to_value(&fixture_transactions()[0]).unwrap();
        let tx = decode_hit(RawHit {
            id: Some("doc-1".into()),
            score: Some(1.5),
            source,
        })
        .unwrap();
        assert_eq!(tx.id.as_deref(), Some("doc-1"));
        assert_eq!(tx.score, Some(1.5));
    }

    #[test]
    fn test_decode_hit_rejects_malformed_source() {
        let err = decode_hit(RawHit {
            id: Some("doc-9".into()),
            score: None,
            source: json!({ "amount": "lots" }),
        })
        .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(ref m) if m.contains("doc-9")));
    }

    #[tokio::test]
    async fn test_search_reports_total_and_echo() {
        let store = MemoryStore::new(fixture_transactions());
        let criteria = SearchCriteria {
            limit: 1,
            ..Default::default()
        };
        let results = search(&store, &criteria, &QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(results.total_hits, 2);
        assert_eq!(results.returned_count, 1);
        assert_eq!(results.query_info.search_params, criteria);
        assert_eq!(results.query_info.store_query["size"], json!(1));
    }
}
