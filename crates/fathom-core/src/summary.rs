//! Summary aggregator
//!
//! Issues one aggregation request and reshapes the raw buckets into a
//! [`SummaryResult`]. Group sums keep their sign; only the spending and income
//! totals are reported as magnitudes.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{round_cents, MonthlyTotal, SearchCriteria, SummaryRequest, SummaryResult};
use crate::query::{compile_filter, Field};
use crate::store::{
    self, AggregationRequest, AggregationResponse, Bucket, GroupBy, GroupKind, QueryOptions,
    TransactionStore,
};

/// Default number of category / account type buckets
pub const DEFAULT_BUCKET_SIZE: usize = 100;

const BY_CATEGORY: &str = "by_category";
const BY_ACCOUNT_TYPE: &str = "by_account_type";
const BY_MONTH: &str = "by_month";

/// Build the aggregation request for a summary
pub fn build_request(
    request: &SummaryRequest,
    bucket_size: usize,
    options: &QueryOptions,
) -> Result<AggregationRequest> {
    let filter = compile_filter(&SearchCriteria::from(request))?;
    let terms = |name: &str, field: Field| GroupBy {
        name: name.to_string(),
        kind: GroupKind::Terms {
            field,
            size: bucket_size,
        },
    };

    Ok(AggregationRequest {
        filter,
        groups: vec![
            terms(BY_CATEGORY, Field::Category),
            terms(BY_ACCOUNT_TYPE, Field::AccountType),
            GroupBy {
                name: BY_MONTH.to_string(),
                kind: GroupKind::Monthly,
            },
        ],
        options: *options,
    })
}

/// Summarize spending over the transactions matching `request`
pub async fn summarize<S>(
    store: &S,
    request: &SummaryRequest,
    bucket_size: usize,
    options: &QueryOptions,
) -> Result<SummaryResult>
where
    S: TransactionStore + ?Sized,
{
    let aggregation = build_request(request, bucket_size, options)?;
    let response = store::bounded(options, store.aggregate(&aggregation)).await?;
    let summary = reshape(response)?;
    debug!(
        count = summary.transaction_count,
        spending = summary.total_spending,
        "Summary complete"
    );
    Ok(summary)
}

/// Turn raw aggregation output into a summary
///
/// An empty response yields all zeros.
pub fn reshape(mut response: AggregationResponse) -> Result<SummaryResult> {
    let average = if response.count == 0 {
        0.0
    } else {
        response.sum / response.count as f64
    };

    let mut months = take_group(&mut response, BY_MONTH)?;
    // histogram buckets arrive ordered, but the contract is oldest first
    months.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(SummaryResult {
        total_spending: round_cents(response.spending_sum.abs()),
        total_income: round_cents(response.income_sum),
        total_amount: round_cents(response.sum),
        transaction_count: response.count,
        average_amount: round_cents(average),
        by_category: sums_by_key(take_group(&mut response, BY_CATEGORY)?),
        by_account_type: sums_by_key(take_group(&mut response, BY_ACCOUNT_TYPE)?),
        monthly_trend: months
            .into_iter()
            .map(|bucket| MonthlyTotal {
                month: bucket.key,
                total: round_cents(bucket.sum),
                transaction_count: bucket.doc_count,
            })
            .collect(),
    })
}

fn take_group(response: &mut AggregationResponse, name: &str) -> Result<Vec<Bucket>> {
    if response.count == 0 {
        return Ok(response.groups.remove(name).unwrap_or_default());
    }
    response
        .groups
        .remove(name)
        .ok_or_else(|| Error::InvalidResponse(format!("aggregation {} missing", name)))
}

fn sums_by_key(buckets: Vec<Bucket>) -> BTreeMap<String, f64> {
    buckets
        .into_iter()
        .map(|bucket| (bucket.key, round_cents(bucket.sum)))
        .collect()
}
