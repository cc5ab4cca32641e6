//! Tool parameters for Fathom
//!
//! String-typed parameter records shared by the MCP tools and the REST
//! handlers. Each converts into the typed request the core runs, rejecting
//! malformed dates with `InvalidCriteria`.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::models::{
    AccountType, SearchCriteria, SummaryRequest, TransactionType, DEFAULT_SEARCH_LIMIT,
};

/// Parse optional date strings
pub fn parse_date_opt(s: Option<&str>) -> Result<Option<NaiveDate>> {
    match s {
        None => Ok(None),
        Some(date_str) => {
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|_| {
                Error::invalid_criteria(format!(
                    "Invalid date format: {}. Use YYYY-MM-DD",
                    date_str
                ))
            })?;
            Ok(Some(date))
        }
    }
}

/// Accept either a list or a comma-separated string
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        None => None,
        Some(Tags::List(list)) => Some(list),
        Some(Tags::Joined(joined)) => Some(
            joined
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        ),
    })
}

// =============================================================================
// search_transactions
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SearchTransactionsParams {
    #[schemars(description = "Free text matched against description, memo and reference")]
    pub description: Option<String>,

    #[schemars(description = "Text matched against the transaction memo")]
    pub memo: Option<String>,

    #[schemars(description = "Merchant name (fuzzy match, e.g. 'Starbucks')")]
    pub merchant: Option<String>,

    #[schemars(description = "Category (exact, case-insensitive), e.g. dining, groceries, gas")]
    pub category: Option<String>,

    #[schemars(description = "Subcategory (exact, case-insensitive)")]
    pub subcategory: Option<String>,

    #[schemars(description = "City, state or street address")]
    pub location: Option<String>,

    #[schemars(description = "Account identifier (exact)")]
    pub account_id: Option<String>,

    #[schemars(description = "Account type: checking, savings or credit")]
    pub account_type: Option<String>,

    #[schemars(description = "Transaction type: debit, credit, transfer, fee or interest")]
    pub transaction_type: Option<String>,

    #[schemars(description = "Transactions carrying any of these tags")]
    #[schemars(with = "Option<Vec<String>>")]
    #[serde(default, deserialize_with = "string_or_list")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Minimum amount, compared against the absolute value")]
    pub amount_min: Option<f64>,

    #[schemars(description = "Maximum amount, compared against the absolute value")]
    pub amount_max: Option<f64>,

    #[schemars(description = "Start date (YYYY-MM-DD), inclusive")]
    pub date_from: Option<String>,

    #[schemars(description = "End date (YYYY-MM-DD), inclusive")]
    pub date_to: Option<String>,

    #[schemars(description = "Only pending (true) or only posted (false) transactions")]
    pub is_pending: Option<bool>,

    #[schemars(description = "Only recurring (true) or only one-off (false) transactions")]
    pub is_recurring: Option<bool>,

    #[schemars(description = "Maximum results to return (default: 10)")]
    pub limit: Option<i64>,
}

impl SearchTransactionsParams {
    pub fn into_criteria(self) -> Result<SearchCriteria> {
        Ok(SearchCriteria {
            date_from: parse_date_opt(self.date_from.as_deref())?,
            date_to: parse_date_opt(self.date_to.as_deref())?,
            description: self.description,
            memo: self.memo,
            merchant: self.merchant,
            category: self.category,
            subcategory: self.subcategory,
            location: self.location,
            account_id: self.account_id,
            account_type: self.account_type.map(AccountType::from),
            transaction_type: self.transaction_type.map(TransactionType::from),
            // callers that send an empty list mean "no tag filter"
            tags: self.tags.filter(|tags| !tags.is_empty()),
            amount_min: self.amount_min,
            amount_max: self.amount_max,
            is_pending: self.is_pending,
            is_recurring: self.is_recurring,
            limit: self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        })
    }
}

// =============================================================================
// get_transaction_summary
// =============================================================================

#[derive(Debug, Default, Deserialize, schemars::JsonSchema)]
pub struct SummaryParams {
    #[schemars(description = "Start date (YYYY-MM-DD), inclusive")]
    pub date_from: Option<String>,

    #[schemars(description = "End date (YYYY-MM-DD), inclusive")]
    pub date_to: Option<String>,

    #[schemars(description = "Restrict to one category")]
    pub category: Option<String>,

    #[schemars(description = "Restrict to one account type: checking, savings or credit")]
    pub account_type: Option<String>,
}

impl SummaryParams {
    pub fn into_request(self) -> Result<SummaryRequest> {
        Ok(SummaryRequest {
            date_from: parse_date_opt(self.date_from.as_deref())?,
            date_to: parse_date_opt(self.date_to.as_deref())?,
            category: self.category,
            account_type: self.account_type.map(AccountType::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_opt() {
        assert_eq!(parse_date_opt(None).unwrap(), None);
        assert_eq!(
            parse_date_opt(Some("2024-06-01")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert!(matches!(
            parse_date_opt(Some("06/01/2024")),
            Err(Error::InvalidCriteria(_))
        ));
    }

    #[test]
    fn test_search_params_from_json() {
        let params: SearchTransactionsParams = serde_json::from_value(serde_json::json!({
            "merchant": "Starbucks",
            "account_type": "Credit",
            "tags": ["food", "coffee"],
            "amount_min": 10.0,
            "date_from": "2024-06-01"
        }))
        .unwrap();
        let criteria = params.into_criteria().unwrap();
        assert_eq!(criteria.merchant.as_deref(), Some("Starbucks"));
        assert_eq!(criteria.account_type, Some(AccountType::Credit));
        assert_eq!(criteria.tags.as_ref().map(Vec::len), Some(2));
        assert_eq!(criteria.limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(criteria.date_from, NaiveDate::from_ymd_opt(2024, 6, 1));
    }

    #[test]
    fn test_tags_accept_comma_separated_string() {
        let params: SearchTransactionsParams =
            serde_json::from_value(serde_json::json!({ "tags": "food, travel" })).unwrap();
        assert_eq!(
            params.tags,
            Some(vec!["food".to_string(), "travel".to_string()])
        );
    }

    #[test]
    fn test_empty_tag_list_is_no_filter() {
        let params = SearchTransactionsParams {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(params.into_criteria().unwrap().tags.is_none());
    }

    #[test]
    fn test_summary_params_bad_date() {
        let params = SummaryParams {
            date_to: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(params.into_request().is_err());
    }
}
