//! Filter compiler
//!
//! Turns a sparse [`SearchCriteria`] into a [`FilterExpr`]: the conjunction of
//! one predicate per present field. The expression renders to Elasticsearch
//! query DSL with [`FilterExpr::to_query`] and can be evaluated in-process with
//! [`FilterExpr::matches`] (see `eval`).

mod eval;
mod predicates;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::SearchCriteria;

/// Store field a predicate targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Description,
    Memo,
    Reference,
    Merchant,
    Category,
    Subcategory,
    AccountId,
    AccountType,
    TransactionType,
    Tags,
    City,
    State,
    Address,
}

impl Field {
    /// Analyzed (text) path in the index
    pub fn path(self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Memo => "memo",
            Self::Reference => "reference",
            Self::Merchant => "merchant",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::AccountId => "account_id",
            Self::AccountType => "account_type",
            Self::TransactionType => "transaction_type",
            Self::Tags => "tags",
            Self::City => "location.city",
            Self::State => "location.state",
            Self::Address => "location.address",
        }
    }

    /// Path holding the untokenized value, used by exact terms and aggregations
    ///
    /// `account_id` and `tags` are mapped as keywords already and have no
    /// `.keyword` sub-field.
    pub fn keyword_path(self) -> String {
        match self {
            Self::AccountId | Self::Tags => self.path().to_string(),
            _ => format!("{}.keyword", self.path()),
        }
    }
}

/// How the tokens of a text query combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Every token must match
    And,
    /// Any token may match
    Or,
}

impl Operator {
    fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Fuzzy or substring full-text match over one or more fields
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub query: String,
    /// Target fields with an optional relevance boost
    pub fields: Vec<(Field, Option<u32>)>,
    pub operator: Operator,
}

impl TextMatch {
    pub fn single(field: Field, query: &str) -> Self {
        Self {
            query: query.to_string(),
            fields: vec![(field, None)],
            operator: Operator::Or,
        }
    }

    /// Lowercased tokens of the query
    pub fn tokens(&self) -> Vec<String> {
        tokenize(&self.query)
    }

    /// Fuzzy match, or every token (any token for `Or`) appearing inside a
    /// term of the same field
    fn to_query(&self) -> Value {
        let fuzzy = self.fuzzy_query();
        let tokens = self.tokens();
        // no tokens: the fuzzy match alone already matches nothing
        if tokens.is_empty() {
            return fuzzy;
        }
        json!({
            "bool": {
                "should": [fuzzy, self.substring_query(&tokens)],
                "minimum_should_match": 1,
            }
        })
    }

    fn fuzzy_query(&self) -> Value {
        match self.fields.as_slice() {
            [(field, None)] => json!({
                "match": {
                    field.path(): {
                        "query": self.query,
                        "fuzziness": "AUTO",
                        "operator": self.operator.as_str(),
                    }
                }
            }),
            fields => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(field, boost)| match boost {
                        Some(b) => format!("{}^{}", field.path(), b),
                        None => field.path().to_string(),
                    })
                    .collect();
                json!({
                    "multi_match": {
                        "query": self.query,
                        "fields": fields,
                        "fuzziness": "AUTO",
                        "operator": self.operator.as_str(),
                    }
                })
            }
        }
    }

    fn substring_query(&self, tokens: &[String]) -> Value {
        let mut per_field: Vec<Value> = self
            .fields
            .iter()
            .map(|(field, _)| {
                let wildcards: Vec<Value> = tokens
                    .iter()
                    .map(|token| {
                        json!({
                            "wildcard": {
                                field.path(): {
                                    "value": format!("*{}*", token),
                                    "case_insensitive": true,
                                }
                            }
                        })
                    })
                    .collect();
                match (self.operator, wildcards.len()) {
                    (_, 1) => wildcards[0].clone(),
                    (Operator::And, _) => json!({ "bool": { "must": wildcards } }),
                    (Operator::Or, _) => json!({
                        "bool": { "should": wildcards, "minimum_should_match": 1 }
                    }),
                }
            })
            .collect();

        if per_field.len() == 1 {
            per_field.remove(0)
        } else {
            json!({ "bool": { "should": per_field, "minimum_should_match": 1 } })
        }
    }
}

/// Lowercased alphanumeric tokens, roughly what the standard analyzer produces
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Exact term on a keyword field
#[derive(Debug, Clone, PartialEq)]
pub struct ExactMatch {
    pub field: Field,
    pub value: String,
    pub case_insensitive: bool,
}

/// Any-of membership on a keyword field
#[derive(Debug, Clone, PartialEq)]
pub struct TermsMatch {
    pub field: Field,
    pub values: Vec<String>,
}

/// Boolean flags on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Pending,
    Recurring,
}

impl Flag {
    pub fn path(self) -> &'static str {
        match self {
            Self::Pending => "is_pending",
            Self::Recurring => "is_recurring",
        }
    }
}

/// Inclusive bounds on the magnitude of `amount`
///
/// Debits are stored negative, so a magnitude range covers both the positive
/// interval and its mirror below zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmountRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AmountRange {
    fn to_query(self) -> Value {
        match (self.min, self.max) {
            (None, Some(max)) => json!({
                "range": { "amount": { "gte": -max, "lte": max } }
            }),
            (min, max) => {
                let min = min.unwrap_or(0.0);
                let mut positive = json!({ "gte": min });
                let mut negative = json!({ "lte": -min });
                if let Some(max) = max {
                    positive["lte"] = json!(max);
                    negative["gte"] = json!(-max);
                }
                json!({
                    "bool": {
                        "should": [
                            { "range": { "amount": positive } },
                            { "range": { "amount": negative } },
                        ],
                        "minimum_should_match": 1,
                    }
                })
            }
        }
    }
}

/// Inclusive day range on `transaction_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    fn to_query(self) -> Value {
        let mut bounds = json!({ "format": "yyyy-MM-dd" });
        if let Some(from) = self.from {
            bounds["gte"] = json!(from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = self.to {
            // round up so timestamps later on the last day are included
            bounds["lte"] = json!(format!("{}||/d", to.format("%Y-%m-%d")));
        }
        json!({ "range": { "transaction_date": bounds } })
    }
}

/// The `location` alias: matches when city, state or street address resembles
/// the query
#[derive(Debug, Clone, PartialEq)]
pub struct LocationMatch {
    pub query: String,
}

impl LocationMatch {
    pub const FIELDS: [Field; 3] = [Field::City, Field::State, Field::Address];

    pub fn alternatives(&self) -> Vec<TextMatch> {
        Self::FIELDS
            .iter()
            .map(|field| TextMatch::single(*field, &self.query))
            .collect()
    }

    fn to_query(&self) -> Value {
        let should: Vec<Value> = self.alternatives().iter().map(TextMatch::to_query).collect();
        json!({
            "bool": {
                "should": should,
                "minimum_should_match": 1,
            }
        })
    }
}

/// One condition on a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Text(TextMatch),
    Exact(ExactMatch),
    AnyOf(TermsMatch),
    Flag { flag: Flag, value: bool },
    AmountMagnitude(AmountRange),
    Date(DateRange),
    Location(LocationMatch),
}

impl Predicate {
    /// Render as Elasticsearch query DSL
    pub fn to_query(&self) -> Value {
        match self {
            Self::Text(text) => text.to_query(),
            Self::Exact(exact) => {
                let mut term = json!({ "value": exact.value });
                if exact.case_insensitive {
                    term["case_insensitive"] = json!(true);
                }
                json!({ "term": { exact.field.keyword_path(): term } })
            }
            Self::AnyOf(terms) => json!({
                "terms": { terms.field.keyword_path(): terms.values }
            }),
            Self::Flag { flag, value } => json!({ "term": { flag.path(): value } }),
            Self::AmountMagnitude(range) => range.to_query(),
            Self::Date(range) => range.to_query(),
            Self::Location(location) => location.to_query(),
        }
    }
}

/// Compiled filter: everything, or the conjunction of its predicates
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    MatchAll,
    All(Vec<Predicate>),
}

impl FilterExpr {
    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::MatchAll)
    }

    pub fn predicates(&self) -> &[Predicate] {
        match self {
            Self::MatchAll => &[],
            Self::All(predicates) => predicates,
        }
    }

    /// Render as Elasticsearch query DSL
    pub fn to_query(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::All(predicates) => {
                let must: Vec<Value> = predicates.iter().map(Predicate::to_query).collect();
                json!({ "bool": { "must": must } })
            }
        }
    }
}

/// Compile criteria into a filter expression
///
/// Absent fields contribute nothing. Amount bounds are magnitudes, so a
/// negative bound is read as its absolute value. Inverted ranges are
/// emitted as given and simply match nothing.
pub fn compile_filter(criteria: &SearchCriteria) -> Result<FilterExpr> {
    check_amount_bound("amount_min", criteria.amount_min)?;
    check_amount_bound("amount_max", criteria.amount_max)?;

    let predicates: Vec<Predicate> = predicates::CONSTRUCTORS
        .iter()
        .filter_map(|build| build(criteria))
        .collect();

    let expr = if predicates.is_empty() {
        FilterExpr::MatchAll
    } else {
        FilterExpr::All(predicates)
    };
    debug!(
        "Compiled {} predicate(s): {}",
        expr.predicates().len(),
        expr.to_query()
    );
    Ok(expr)
}

fn check_amount_bound(name: &str, bound: Option<f64>) -> Result<()> {
    match bound {
        Some(value) if !value.is_finite() => Err(Error::invalid_criteria(format!(
            "{} must be a finite number",
            name
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, TransactionType};

    #[test]
    fn test_empty_criteria_is_match_all() {
        let expr = compile_filter(&SearchCriteria::default()).unwrap();
        assert!(expr.is_match_all());
        assert_eq!(expr.to_query(), json!({ "match_all": {} }));
    }

    #[test]
    fn test_one_predicate_per_present_field() {
        let criteria = SearchCriteria {
            merchant: Some("Starbucks".into()),
            category: Some("dining".into()),
            is_pending: Some(false),
            ..Default::default()
        };
        let expr = compile_filter(&criteria).unwrap();
        assert_eq!(expr.predicates().len(), 3);
    }

    #[test]
    fn test_description_renders_boosted_multi_match() {
        let criteria = SearchCriteria {
            description: Some("coffee shop".into()),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        let text = &query["bool"]["must"][0]["bool"];
        assert_eq!(text["minimum_should_match"], json!(1));
        assert_eq!(
            text["should"][0],
            json!({
                "multi_match": {
                    "query": "coffee shop",
                    "fields": ["description^2", "memo", "reference"],
                    "fuzziness": "AUTO",
                    "operator": "and",
                }
            })
        );
        // every token inside one field, for each of the three fields
        let per_field = text["should"][1]["bool"]["should"].as_array().unwrap();
        assert_eq!(per_field.len(), 3);
        assert_eq!(
            per_field[1],
            json!({
                "bool": {
                    "must": [
                        { "wildcard": { "memo": { "value": "*coffee*", "case_insensitive": true } } },
                        { "wildcard": { "memo": { "value": "*shop*", "case_insensitive": true } } },
                    ]
                }
            })
        );
    }

    #[test]
    fn test_merchant_fragment_renders_wildcard_alternative() {
        let criteria = SearchCriteria {
            merchant: Some("Bucks".into()),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        assert_eq!(
            query["bool"]["must"][0],
            json!({
                "bool": {
                    "should": [
                        { "match": { "merchant": { "query": "Bucks", "fuzziness": "AUTO", "operator": "or" } } },
                        { "wildcard": { "merchant": { "value": "*bucks*", "case_insensitive": true } } },
                    ],
                    "minimum_should_match": 1,
                }
            })
        );
    }

    #[test]
    fn test_blank_text_renders_plain_match() {
        let criteria = SearchCriteria {
            memo: Some("  ".into()),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        assert!(query["bool"]["must"][0].get("match").is_some());
    }

    #[test]
    fn test_exact_fields_render_case_insensitive_keyword_terms() {
        let criteria = SearchCriteria {
            category: Some("Dining".into()),
            account_type: Some(AccountType::Credit),
            transaction_type: Some(TransactionType::Debit),
            account_id: Some("acc_001".into()),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        let must = query["bool"]["must"].as_array().unwrap();
        assert_eq!(
            must[0],
            json!({ "term": { "category.keyword": { "value": "Dining", "case_insensitive": true } } })
        );
        assert_eq!(
            must[1],
            json!({ "term": { "account_id": { "value": "acc_001" } } })
        );
        assert_eq!(
            must[2]["term"]["account_type.keyword"]["value"],
            json!("credit")
        );
        assert_eq!(
            must[3]["term"]["transaction_type.keyword"]["value"],
            json!("debit")
        );
    }

    #[test]
    fn test_location_is_or_over_three_fields() {
        let criteria = SearchCriteria {
            location: Some("Seattle".into()),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        let location = &query["bool"]["must"][0]["bool"];
        assert_eq!(location["minimum_should_match"], json!(1));
        let should = location["should"].as_array().unwrap();
        assert_eq!(should.len(), 3);
        for (alternative, path) in should
            .iter()
            .zip(["location.city", "location.state", "location.address"])
        {
            let text = &alternative["bool"]["should"];
            assert!(text[0]["match"].get(path).is_some());
            assert!(text[1]["wildcard"].get(path).is_some());
        }
    }

    #[test]
    fn test_amount_range_covers_both_signs() {
        let criteria = SearchCriteria {
            amount_min: Some(10.0),
            amount_max: Some(45.0),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        let should = query["bool"]["must"][0]["bool"]["should"].as_array().unwrap();
        assert_eq!(should[0], json!({ "range": { "amount": { "gte": 10.0, "lte": 45.0 } } }));
        assert_eq!(should[1], json!({ "range": { "amount": { "gte": -45.0, "lte": -10.0 } } }));
    }

    #[test]
    fn test_amount_max_only_is_symmetric_range() {
        let criteria = SearchCriteria {
            amount_max: Some(20.0),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        assert_eq!(
            query["bool"]["must"][0],
            json!({ "range": { "amount": { "gte": -20.0, "lte": 20.0 } } })
        );
    }

    #[test]
    fn test_non_finite_amounts_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let criteria = SearchCriteria {
                amount_min: Some(bad),
                ..Default::default()
            };
            assert!(matches!(
                compile_filter(&criteria),
                Err(Error::InvalidCriteria(_))
            ));
        }
    }

    #[test]
    fn test_negative_amount_bounds_are_magnitudes() {
        let criteria = SearchCriteria {
            amount_min: Some(-10.0),
            amount_max: Some(-45.0),
            ..Default::default()
        };
        let query = compile_filter(&criteria).unwrap().to_query();
        let should = query["bool"]["must"][0]["bool"]["should"].as_array().unwrap();
        assert_eq!(should[0], json!({ "range": { "amount": { "gte": 10.0, "lte": 45.0 } } }));
        assert_eq!(should[1], json!({ "range": { "amount": { "gte": -45.0, "lte": -10.0 } } }));
    }

    #[test]
    fn test_inverted_bounds_are_emitted_as_given() {
        let criteria = SearchCriteria {
            amount_min: Some(100.0),
            amount_max: Some(10.0),
            date_from: NaiveDate::from_ymd_opt(2024, 7, 1),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..Default::default()
        };
        let expr = compile_filter(&criteria).unwrap();
        assert_eq!(expr.predicates().len(), 2);
        let query = expr.to_query();
        assert_eq!(
            query["bool"]["must"][1],
            json!({
                "range": {
                    "transaction_date": {
                        "gte": "2024-07-01",
                        "lte": "2024-06-01||/d",
                        "format": "yyyy-MM-dd",
                    }
                }
            })
        );
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let criteria = SearchCriteria {
            description: Some("gas".into()),
            tags: Some(vec!["auto".into(), "fuel".into()]),
            date_from: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let first = compile_filter(&criteria).unwrap();
        let second = compile_filter(&criteria).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_query().to_string(), second.to_query().to_string());
    }

    #[test]
    fn test_empty_string_is_a_value_not_absence() {
        let criteria = SearchCriteria {
            merchant: Some(String::new()),
            ..Default::default()
        };
        let expr = compile_filter(&criteria).unwrap();
        assert!(!expr.is_match_all());
    }
}
