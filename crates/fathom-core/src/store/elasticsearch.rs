//! Elasticsearch REST adapter
//!
//! Speaks the plain JSON API over reqwest: `POST /{index}/_search` for hits
//! and aggregations, `GET /_cluster/health` for reachability, and
//! `HEAD /{index}` plus `GET /{index}/_count` for index metadata.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Error, Result};

use super::{
    AggregationRequest, AggregationResponse, Bucket, GroupKind, IndexInfo, Ping, QueryOptions,
    RawHit, SearchRequest, SearchResponse, TransactionStore,
};

/// Sub-aggregation name holding each bucket's amount sum
const SUM_AGG: &str = "total";

#[derive(Clone)]
enum Auth {
    ApiKey(String),
    Basic {
        username: String,
        password: Option<String>,
    },
    None,
}

/// Elasticsearch-backed transaction store
#[derive(Clone)]
pub struct ElasticsearchStore {
    http_client: Client,
    base_url: String,
    index: String,
    auth: Auth,
}

impl ElasticsearchStore {
    /// Create a client from store configuration
    ///
    /// An API key takes precedence over basic auth credentials.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let http_client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_certs)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let auth = match (&config.api_key, &config.username) {
            (Some(key), _) => Auth::ApiKey(key.clone()),
            (None, Some(username)) => Auth::Basic {
                username: username.clone(),
                password: config.password.clone(),
            },
            (None, None) => Auth::None,
        };

        Ok(Self {
            http_client,
            base_url: normalize_host(&config.host),
            index: config.index.clone(),
            auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, options: &QueryOptions) -> RequestBuilder {
        let mut builder = self
            .http_client
            .request(method, format!("{}/{}", self.base_url, path));
        builder = match &self.auth {
            Auth::ApiKey(key) => builder.header("Authorization", format!("ApiKey {}", key)),
            Auth::Basic { username, password } => builder.basic_auth(username, password.as_ref()),
            Auth::None => builder,
        };
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    /// Send a request and map transport failures and error statuses
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    async fn send_json(&self, builder: RequestBuilder) -> Result<Value> {
        let response = self.send(builder).await?;
        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body)
            .map_err(|e| Error::InvalidResponse(format!("undecodable store payload: {}", e)))
    }

    async fn post_search(&self, body: Value, options: &QueryOptions) -> Result<Value> {
        debug!("POST {}/_search {}", self.index, body);
        let path = format!("{}/_search", self.index);
        let payload = self
            .send_json(self.request(Method::POST, &path, options).json(&body))
            .await?;

        if payload.get("timed_out").and_then(Value::as_bool) == Some(true) {
            return Err(Error::store_unavailable(
                "store timed out before all shards answered",
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl TransactionStore for ElasticsearchStore {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let mut body = request.to_body();
        body["track_total_hits"] = json!(true);
        if let Some(timeout) = request.options.timeout {
            body["timeout"] = json!(es_duration(timeout));
        }

        let payload = self.post_search(body, &request.options).await?;
        let parsed: EsSearchResponse = serde_json::from_value(payload)
            .map_err(|e| Error::InvalidResponse(format!("unexpected search response: {}", e)))?;

        let hits = parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| RawHit {
                id: hit.id,
                score: hit.score,
                source: hit.source,
            })
            .collect::<Vec<_>>();
        let total_hits = match parsed.hits.total {
            Some(EsTotal::Object { value }) => value,
            Some(EsTotal::Count(value)) => value,
            None => hits.len() as u64,
        };

        Ok(SearchResponse { total_hits, hits })
    }

    async fn aggregate(&self, request: &AggregationRequest) -> Result<AggregationResponse> {
        let sum = json!({ SUM_AGG: { "sum": { "field": "amount" } } });
        let mut aggs = json!({
            "overall": { "stats": { "field": "amount" } },
            "spending": {
                "filter": { "range": { "amount": { "lt": 0 } } },
                "aggs": sum.clone(),
            },
            "income": {
                "filter": { "range": { "amount": { "gt": 0 } } },
                "aggs": sum.clone(),
            },
        });
        for group in &request.groups {
            let bucketing = match &group.kind {
                GroupKind::Terms { field, size } => json!({
                    "terms": { "field": field.keyword_path(), "size": size }
                }),
                GroupKind::Monthly => json!({
                    "date_histogram": {
                        "field": "transaction_date",
                        "calendar_interval": "month",
                        "format": "yyyy-MM",
                        "min_doc_count": 1,
                    }
                }),
            };
            let mut agg = bucketing;
            agg["aggs"] = sum.clone();
            aggs[group.name.as_str()] = agg;
        }

        let mut body = json!({
            "query": request.filter.to_query(),
            "size": 0,
            "track_total_hits": true,
            "aggs": aggs,
        });
        if let Some(timeout) = request.options.timeout {
            body["timeout"] = json!(es_duration(timeout));
        }

        let payload = self.post_search(body, &request.options).await?;
        let aggregations = payload
            .get("aggregations")
            .ok_or_else(|| Error::InvalidResponse("response has no aggregations".into()))?;

        let overall = aggregation(aggregations, "overall")?;
        let mut groups = BTreeMap::new();
        for group in &request.groups {
            let buckets = aggregation(aggregations, &group.name)?
                .get("buckets")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("aggregation {} has no buckets", group.name))
                })?
                .iter()
                .map(parse_bucket)
                .collect::<Result<Vec<_>>>()?;
            groups.insert(group.name.clone(), buckets);
        }

        Ok(AggregationResponse {
            count: overall.get("count").and_then(Value::as_u64).unwrap_or(0),
            sum: overall.get("sum").and_then(Value::as_f64).unwrap_or(0.0),
            spending_sum: sub_sum(aggregation(aggregations, "spending")?),
            income_sum: sub_sum(aggregation(aggregations, "income")?),
            groups,
        })
    }

    async fn ping(&self, options: &QueryOptions) -> Result<Ping> {
        let started = Instant::now();
        let payload = self
            .send_json(self.request(Method::GET, "_cluster/health", options))
            .await?;
        let latency = started.elapsed();

        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);
        let status = text("status");
        if status.as_deref() == Some("red") {
            warn!("Cluster health is red");
        }
        Ok(Ping {
            latency,
            cluster_name: text("cluster_name"),
            status,
        })
    }

    async fn describe_index(&self, options: &QueryOptions) -> Result<IndexInfo> {
        let response = self
            .request(Method::HEAD, &self.index, options)
            .send()
            .await
            .map_err(transport_error)?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Ok(IndexInfo {
                    exists: false,
                    document_count: 0,
                })
            }
            status if !status.is_success() => return Err(status_error(status, "")),
            _ => {}
        }

        let path = format!("{}/_count", self.index);
        let payload = self
            .send_json(self.request(Method::GET, &path, options))
            .await?;
        let document_count = payload
            .get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::InvalidResponse("count response has no count".into()))?;

        Ok(IndexInfo {
            exists: true,
            document_count,
        })
    }

    fn index_name(&self) -> &str {
        &self.index
    }
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    #[serde(default)]
    total: Option<EsTotal>,
    #[serde(default)]
    hits: Vec<EsHit>,
}

/// `hits.total` is an object on 7.x and later, a bare number before that
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EsTotal {
    Object { value: u64 },
    Count(u64),
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(rename = "_score", default)]
    score: Option<f64>,
    #[serde(rename = "_source", default)]
    source: Value,
}

/// Add a scheme when missing and drop any trailing slash
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

/// Elasticsearch time unit string
fn es_duration(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis().max(1))
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::store_unavailable(format!("request timed out: {}", e))
    } else {
        Error::store_unavailable(e.to_string())
    }
}

/// Map a non-success status to the error taxonomy
///
/// Auth failures, throttling and server errors mean the store cannot serve
/// us right now; any other client error means it refused the query itself.
fn status_error(status: StatusCode, body: &str) -> Error {
    let reason = error_reason(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Error::store_unavailable(format!("HTTP {}: {}", status.as_u16(), reason))
        }
        s if s.is_server_error() => {
            Error::store_unavailable(format!("HTTP {}: {}", s.as_u16(), reason))
        }
        s => Error::QueryRejected {
            status: s.as_u16(),
            reason,
        },
    }
}

/// Pull the most specific reason out of an Elasticsearch error body
fn error_reason(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    if let Some(reason) = error
        .get("root_cause")
        .and_then(|causes| causes.get(0))
        .and_then(|cause| cause.get("reason"))
        .and_then(Value::as_str)
    {
        return Some(reason.to_string());
    }
    error
        .get("reason")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

fn aggregation<'a>(aggregations: &'a Value, name: &str) -> Result<&'a Value> {
    aggregations
        .get(name)
        .ok_or_else(|| Error::InvalidResponse(format!("missing aggregation {}", name)))
}

fn sub_sum(agg: &Value) -> f64 {
    agg.get(SUM_AGG)
        .and_then(|total| total.get("value"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn parse_bucket(bucket: &Value) -> Result<Bucket> {
    let key = match bucket.get("key_as_string").or_else(|| bucket.get("key")) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => return Err(Error::InvalidResponse("bucket has no key".into())),
    };
    let doc_count = bucket
        .get("doc_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::InvalidResponse(format!("bucket {} has no doc_count", key)))?;

    Ok(Bucket {
        sum: sub_sum(bucket),
        key,
        doc_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SearchCriteria, SummaryRequest};
    use crate::test_utils::{Behaviour, MockElasticsearch, MOCK_INDEX};
    use crate::{health, search, summary};

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("localhost:9200"), "http://localhost:9200");
        assert_eq!(normalize_host("https://es.local:9200/"), "https://es.local:9200");
        assert_eq!(normalize_host(" http://es:9200 "), "http://es:9200");
    }

    #[test]
    fn test_auth_precedence() {
        let mut config = StoreConfig {
            username: Some("elastic".into()),
            password: Some("secret".into()),
            api_key: Some("abc123".into()),
            ..Default::default()
        };
        let store = ElasticsearchStore::new(&config).unwrap();
        assert!(matches!(store.auth, Auth::ApiKey(ref k) if k == "abc123"));

        config.api_key = None;
        let store = ElasticsearchStore::new(&config).unwrap();
        assert!(matches!(store.auth, Auth::Basic { ref username, .. } if username == "elastic"));

        config.username = None;
        let store = ElasticsearchStore::new(&config).unwrap();
        assert!(matches!(store.auth, Auth::None));
    }

    #[test]
    fn test_status_error_classes() {
        let body = r#"{"error":{"root_cause":[{"type":"query_shard_exception","reason":"failed to create query"}],"reason":"all shards failed"},"status":400}"#;
        match status_error(StatusCode::BAD_REQUEST, body) {
            Error::QueryRejected { status, reason } => {
                assert_eq!(status, 400);
                assert_eq!(reason, "failed to create query");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_unavailable());
        assert!(status_error(StatusCode::UNAUTHORIZED, "").is_unavailable());
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, r#"{"error":{"reason":"no such index"}}"#),
            Error::QueryRejected { status: 404, .. }
        ));
    }

    #[test]
    fn test_parse_histogram_bucket() {
        let bucket = json!({
            "key_as_string": "2024-06",
            "key": 1717200000000u64,
            "doc_count": 2,
            "total": { "value": -45.5 }
        });
        let parsed = parse_bucket(&bucket).unwrap();
        assert_eq!(parsed.key, "2024-06");
        assert_eq!(parsed.doc_count, 2);
        assert_eq!(parsed.sum, -45.5);
    }

    #[test]
    fn test_es_duration() {
        assert_eq!(es_duration(Duration::from_secs(5)), "5000ms");
        assert_eq!(es_duration(Duration::from_micros(10)), "1ms");
    }

    // ========== Against the mock cluster ==========

    fn store_for(mock: &MockElasticsearch) -> ElasticsearchStore {
        ElasticsearchStore::new(&StoreConfig {
            host: mock.host(),
            index: MOCK_INDEX.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_round_trip() {
        let mock = MockElasticsearch::start().await;
        let store = store_for(&mock);
        let options = QueryOptions::with_timeout(Duration::from_secs(5));
        let criteria = SearchCriteria {
            merchant: Some("Shell".into()),
            ..Default::default()
        };

        let results = search::search(&store, &criteria, &options).await.unwrap();
        assert_eq!(results.total_hits, 2);
        assert_eq!(results.transactions[0].id.as_deref(), Some("doc-txn_b"));

        let sent = &mock.requests()[0];
        assert_eq!(sent["size"], json!(10));
        assert_eq!(sent["timeout"], json!("5000ms"));
        assert_eq!(sent["sort"][0]["transaction_date"]["order"], json!("desc"));
        assert_eq!(
            sent["query"]["bool"]["must"][0]["bool"]["should"][0]["match"]["merchant"]["query"],
            json!("Shell")
        );
    }

    #[tokio::test]
    async fn test_summary_round_trip() {
        let mock = MockElasticsearch::start().await;
        let store = store_for(&mock);

        let result = summary::summarize(
            &store,
            &SummaryRequest::default(),
            20,
            &QueryOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(result.transaction_count, 2);
        assert_eq!(result.total_spending, 45.5);
        assert_eq!(result.by_category["gas"], -40.0);
        assert_eq!(result.by_account_type["credit"], -5.5);
        assert_eq!(result.monthly_trend[0].month, "2024-06");

        let sent = &mock.requests()[0];
        assert_eq!(sent["size"], json!(0));
        assert_eq!(sent["aggs"]["by_category"]["terms"]["field"], json!("category.keyword"));
        assert_eq!(sent["aggs"]["by_category"]["terms"]["size"], json!(20));
        assert_eq!(
            sent["aggs"]["by_month"]["date_histogram"]["calendar_interval"],
            json!("month")
        );
    }

    #[tokio::test]
    async fn test_rejected_query() {
        let mock = MockElasticsearch::with_behaviour(Behaviour::RejectQueries).await;
        let store = store_for(&mock);
        let err = search::search(&store, &SearchCriteria::default(), &QueryOptions::default())
            .await
            .unwrap_err();
        match err {
            Error::QueryRejected { status, reason } => {
                assert_eq!(status, 400);
                assert_eq!(reason, "unknown query [matchh]");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shard_timeout_is_unavailable() {
        let mock = MockElasticsearch::with_behaviour(Behaviour::ShardTimeout).await;
        let store = store_for(&mock);
        let err = search::search(&store, &SearchCriteria::default(), &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let mock =
            MockElasticsearch::with_behaviour(Behaviour::Slow(Duration::from_secs(2))).await;
        let store = store_for(&mock);
        let options = QueryOptions::with_timeout(Duration::from_millis(100));
        let err = summary::summarize(&store, &SummaryRequest::default(), 10, &options)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_malformed_hit_is_invalid_response() {
        let mock = MockElasticsearch::with_behaviour(Behaviour::MalformedHits).await;
        let store = store_for(&mock);
        let err = search::search(&store, &SearchCriteria::default(), &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_against_mock() {
        let mock = MockElasticsearch::start().await;
        let status = health::health(&store_for(&mock), &QueryOptions::default())
            .await
            .unwrap();
        assert!(status.reachable);
        assert_eq!(status.cluster_name.as_deref(), Some("mock-cluster"));
        assert_eq!(status.status.as_deref(), Some("yellow"));
        assert!(status.index_exists);
        assert_eq!(status.document_count, 2);
    }

    #[tokio::test]
    async fn test_health_missing_index() {
        let mock = MockElasticsearch::with_behaviour(Behaviour::MissingIndex).await;
        let status = health::health(&store_for(&mock), &QueryOptions::default())
            .await
            .unwrap();
        assert!(status.reachable);
        assert!(!status.index_exists);
        assert_eq!(status.document_count, 0);
    }

    #[tokio::test]
    async fn test_health_unavailable_cluster() {
        let mock = MockElasticsearch::with_behaviour(Behaviour::Unavailable).await;
        let status = health::health(&store_for(&mock), &QueryOptions::default())
            .await
            .unwrap();
        assert!(!status.reachable);
        assert!(status.error.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        let store = ElasticsearchStore::new(&StoreConfig {
            host: "127.0.0.1:1".into(),
            ..Default::default()
        })
        .unwrap();
        let options = QueryOptions::with_timeout(Duration::from_secs(2));
        let err = search::search(&store, &SearchCriteria::default(), &options)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
