//! Test utilities for fathom-core
//!
//! A mock Elasticsearch server plus a small set of fixture transactions, used
//! by the unit tests here and by the integration tests of the other crates.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::models::{AccountType, Location, Transaction, TransactionType};

/// Index name the mock serves
pub const MOCK_INDEX: &str = "banking_transactions";

/// Starbucks coffee, -5.50, dining, 2024-06-03
pub fn starbucks() -> Transaction {
    Transaction {
        transaction_id: "txn_a".to_string(),
        account_id: "acc_001".to_string(),
        account_type: AccountType::Credit,
        transaction_type: TransactionType::Debit,
        category: Some("dining".to_string()),
        subcategory: Some("coffee".to_string()),
        tags: vec!["food".to_string()],
        amount: -5.50,
        currency: "USD".to_string(),
        balance_after: Some(994.50),
        transaction_date: date(2024, 6, 3),
        posted_date: Some(date(2024, 6, 4)),
        created_at: None,
        updated_at: None,
        description: "Starbucks - Latte".to_string(),
        memo: None,
        reference: Some("REF-0001".to_string()),
        merchant: Some("Starbucks".to_string()),
        location: Some(Location {
            city: Some("Seattle".to_string()),
            state: Some("WA".to_string()),
            country: Some("USA".to_string()),
            ..Default::default()
        }),
        is_pending: false,
        is_recurring: false,
        id: None,
        score: None,
    }
}

/// Shell fuel, -40.00, gas, 2024-06-10
pub fn shell() -> Transaction {
    Transaction {
        transaction_id: "txn_b".to_string(),
        account_id: "acc_002".to_string(),
        account_type: AccountType::Checking,
        transaction_type: TransactionType::Debit,
        category: Some("gas".to_string()),
        subcategory: None,
        tags: vec!["auto".to_string()],
        amount: -40.00,
        currency: "USD".to_string(),
        balance_after: None,
        transaction_date: date(2024, 6, 10),
        posted_date: None,
        created_at: None,
        updated_at: None,
        description: "Shell Oil 57442".to_string(),
        memo: Some("fill up".to_string()),
        reference: None,
        merchant: Some("Shell".to_string()),
        location: Some(Location {
            city: Some("Portland".to_string()),
            state: Some("OR".to_string()),
            ..Default::default()
        }),
        is_pending: false,
        is_recurring: false,
        id: None,
        score: None,
    }
}

/// The two fixture transactions, oldest first
pub fn fixture_transactions() -> Vec<Transaction> {
    vec![starbucks(), shell()]
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// How the mock answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Serve the fixtures
    Healthy,
    /// Reject every search with a 400 parse error
    RejectQueries,
    /// Report partial results (`timed_out: true`)
    ShardTimeout,
    /// Sleep before answering
    Slow(Duration),
    /// 503 on every request
    Unavailable,
    /// Searches return a hit that is not a transaction
    MalformedHits,
    /// The index does not exist
    MissingIndex,
}

#[derive(Clone)]
struct MockState {
    behaviour: Behaviour,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// Mock Elasticsearch server for tests
pub struct MockElasticsearch {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockElasticsearch {
    /// Start a healthy mock on an available port
    pub async fn start() -> Self {
        Self::with_behaviour(Behaviour::Healthy).await
    }

    pub async fn with_behaviour(behaviour: Behaviour) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            behaviour,
            requests: requests.clone(),
        };
        let app = Router::new()
            .route("/_cluster/health", get(handle_health))
            .route("/:index", get(handle_index))
            .route("/:index/_count", get(handle_count))
            .route("/:index/_search", post(handle_search))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `host:port` without a scheme
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Search bodies received so far
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockElasticsearch {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Apply the failure behaviours shared by every route
async fn preflight(state: &MockState) -> Option<Response> {
    match state.behaviour {
        Behaviour::Slow(delay) => {
            tokio::time::sleep(delay).await;
            None
        }
        Behaviour::Unavailable => Some(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": { "reason": "cluster_block_exception" },
                    "status": 503
                })),
            )
                .into_response(),
        ),
        _ => None,
    }
}

async fn handle_health(State(state): State<MockState>) -> Response {
    if let Some(response) = preflight(&state).await {
        return response;
    }
    Json(json!({
        "cluster_name": "mock-cluster",
        "status": "yellow",
        "number_of_nodes": 1
    }))
    .into_response()
}

async fn handle_index(State(state): State<MockState>, Path(index): Path<String>) -> Response {
    if let Some(response) = preflight(&state).await {
        return response;
    }
    if index != MOCK_INDEX || state.behaviour == Behaviour::MissingIndex {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({ MOCK_INDEX: { "mappings": {} } })).into_response()
}

async fn handle_count(State(state): State<MockState>, Path(_index): Path<String>) -> Response {
    if let Some(response) = preflight(&state).await {
        return response;
    }
    Json(json!({ "count": fixture_transactions().len() })).into_response()
}

async fn handle_search(
    State(state): State<MockState>,
    Path(_index): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(body.clone());
    if let Some(response) = preflight(&state).await {
        return response;
    }

    match state.behaviour {
        Behaviour::RejectQueries => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "root_cause": [{
                        "type": "parsing_exception",
                        "reason": "unknown query [matchh]"
                    }],
                    "type": "parsing_exception",
                    "reason": "unknown query [matchh]"
                },
                "status": 400
            })),
        )
            .into_response(),
        Behaviour::ShardTimeout => Json(json!({
            "timed_out": true,
            "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
        }))
        .into_response(),
        Behaviour::MalformedHits => Json(json!({
            "timed_out": false,
            "hits": {
                "total": { "value": 1, "relation": "eq" },
                "hits": [{ "_id": "bad-1", "_score": null, "_source": { "amount": "n/a" } }]
            }
        }))
        .into_response(),
        _ if body.get("aggs").is_some() => Json(aggregation_response()).into_response(),
        _ => Json(search_response(&body)).into_response(),
    }
}

/// Fixtures newest first, capped at the requested size
fn search_response(body: &Value) -> Value {
    let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
    let mut fixtures = fixture_transactions();
    fixtures.reverse();
    let total = fixtures.len();
    let hits: Vec<Value> = fixtures
        .iter()
        .take(size)
        .map(|tx| {
            json!({
                "_index": MOCK_INDEX,
                "_id": format!("doc-{}", tx.transaction_id),
                "_score": null,
                "_source": tx,
            })
        })
        .collect();

    json!({
        "took": 1,
        "timed_out": false,
        "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
    })
}

/// Aggregations over both fixtures, shaped like a real cluster's answer
fn aggregation_response() -> Value {
    json!({
        "took": 2,
        "timed_out": false,
        "hits": { "total": { "value": 2, "relation": "eq" }, "hits": [] },
        "aggregations": {
            "overall": { "count": 2, "min": -40.0, "max": -5.5, "avg": -22.75, "sum": -45.5 },
            "spending": { "doc_count": 2, "total": { "value": -45.5 } },
            "income": { "doc_count": 0, "total": { "value": 0.0 } },
            "by_category": {
                "doc_count_error_upper_bound": 0,
                "sum_other_doc_count": 0,
                "buckets": [
                    { "key": "dining", "doc_count": 1, "total": { "value": -5.5 } },
                    { "key": "gas", "doc_count": 1, "total": { "value": -40.0 } }
                ]
            },
            "by_account_type": {
                "buckets": [
                    { "key": "checking", "doc_count": 1, "total": { "value": -40.0 } },
                    { "key": "credit", "doc_count": 1, "total": { "value": -5.5 } }
                ]
            },
            "by_month": {
                "buckets": [{
                    "key_as_string": "2024-06",
                    "key": 1717200000000u64,
                    "doc_count": 2,
                    "total": { "value": -45.5 }
                }]
            }
        }
    })
}
