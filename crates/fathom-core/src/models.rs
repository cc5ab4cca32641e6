//! Domain models for Fathom

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Default number of results returned by a search
pub const DEFAULT_SEARCH_LIMIT: i64 = 10;

/// Largest result window the store will serve in a single query
pub const MAX_SEARCH_LIMIT: i64 = 10_000;

/// Account types
///
/// Values the store holds outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountType {
    Checking,
    Savings,
    Credit,
    Other(String),
}

impl AccountType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::Credit => "credit",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for AccountType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "checking" => Self::Checking,
            "savings" => Self::Savings,
            "credit" => Self::Credit,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for AccountType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<AccountType> for String {
    fn from(t: AccountType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction types
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    Debit,
    Credit,
    Transfer,
    Fee,
    Interest,
    Other(String),
}

impl TransactionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
            Self::Transfer => "transfer",
            Self::Fee => "fee",
            Self::Interest => "interest",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for TransactionType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "debit" => Self::Debit,
            "credit" => Self::Credit,
            "transfer" => Self::Transfer,
            "fee" => Self::Fee,
            "interest" => Self::Interest,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for TransactionType {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<TransactionType> for String {
    fn from(t: TransactionType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geographic point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Where a transaction happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

/// A banking transaction as held in the document store
///
/// `amount` carries direction: negative is money out, positive is money in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub account_id: String,
    pub account_type: AccountType,
    pub transaction_type: TransactionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<f64>,

    #[serde(deserialize_with = "deserialize_date")]
    pub transaction_date: NaiveDate,
    #[serde(
        default,
        deserialize_with = "deserialize_date_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub posted_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<NaiveDateTime>,

    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default)]
    pub is_pending: bool,
    #[serde(default)]
    pub is_recurring: bool,

    /// Store document id (set from the search hit)
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Relevance score (absent when results are sorted by date)
    #[serde(rename = "_score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Parse a store date that may be a plain date or a full timestamp
pub fn parse_store_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    s.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// Parse a store timestamp (`yyyy-MM-ddTHH:mm:ss[.SSS][Z]`, or a bare date)
pub fn parse_store_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_end_matches('Z');
    if let Ok(ts) = s.parse::<NaiveDateTime>() {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    parse_store_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_store_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

fn deserialize_date_opt<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_store_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw))),
    }
}

fn deserialize_timestamp_opt<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_store_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw))),
    }
}

// ========== Criteria ==========

/// Optional search parameters
///
/// Every filter is an `Option`: `None` means "no condition", while
/// `Some(String::new())` is a real (if unusual) value and is compiled as such.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Free text over description, memo and reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    /// City, state or street address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    /// Matches transactions carrying any of these tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Inclusive lower bound on the magnitude of `amount`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_min: Option<f64>,
    /// Inclusive upper bound on the magnitude of `amount`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_pending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            description: None,
            memo: None,
            merchant: None,
            category: None,
            subcategory: None,
            location: None,
            account_id: None,
            account_type: None,
            transaction_type: None,
            tags: None,
            amount_min: None,
            amount_max: None,
            date_from: None,
            date_to: None,
            is_pending: None,
            is_recurring: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchCriteria {
    /// Check the result cap against what the store can serve
    pub fn validate_limit(&self) -> Result<usize> {
        if self.limit <= 0 {
            return Err(Error::invalid_criteria(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        if self.limit > MAX_SEARCH_LIMIT {
            return Err(Error::invalid_criteria(format!(
                "limit must be at most {}, got {}",
                MAX_SEARCH_LIMIT, self.limit
            )));
        }
        Ok(self.limit as usize)
    }
}

/// Parameters for a spending summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
}

impl From<&SummaryRequest> for SearchCriteria {
    fn from(request: &SummaryRequest) -> Self {
        Self {
            date_from: request.date_from,
            date_to: request.date_to,
            category: request.category.clone(),
            account_type: request.account_type.clone(),
            ..Default::default()
        }
    }
}

// ========== Results ==========

/// What a search sent to the store, for callers that want to show their work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryInfo {
    pub search_params: SearchCriteria,
    pub store_query: serde_json::Value,
}

/// Result of a transaction search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    /// Matches in the store, which may exceed the number returned
    pub total_hits: u64,
    pub returned_count: usize,
    pub transactions: Vec<Transaction>,
    pub query_info: QueryInfo,
}

/// Net amount for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// `YYYY-MM`
    pub month: String,
    pub total: f64,
    pub transaction_count: u64,
}

/// Spending summary over the transactions matching a `SummaryRequest`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Magnitude of all outflows
    pub total_spending: f64,
    /// Sum of all inflows
    pub total_income: f64,
    /// Signed sum of every amount
    pub total_amount: f64,
    pub transaction_count: u64,
    pub average_amount: f64,
    /// Signed sum per category
    pub by_category: BTreeMap<String, f64>,
    /// Signed sum per account type
    pub by_account_type: BTreeMap<String, f64>,
    /// Chronological, oldest month first
    pub monthly_trend: Vec<MonthlyTotal>,
}

/// Store reachability and index metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    /// Cluster status as reported by the store (green, yellow, red)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub index_name: String,
    pub index_exists: bool,
    pub document_count: u64,
    /// Why the store could not be reached
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Round a monetary value to cents, normalizing negative zero
pub fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
