//! In-process evaluation of compiled filters
//!
//! Mirrors how the search engine treats each predicate closely enough for the
//! in-memory store. A text predicate holds when, within one field, the tokens
//! match whole terms with the typo budget of `fuzziness: AUTO`, or when they
//! all appear inside terms as `*token*` wildcards do.

use crate::models::Transaction;

use super::{
    tokenize, AmountRange, DateRange, ExactMatch, Field, FilterExpr, Flag, LocationMatch, Operator,
    Predicate, TermsMatch, TextMatch,
};

impl FilterExpr {
    /// Whether a transaction satisfies every predicate
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            Self::MatchAll => true,
            Self::All(predicates) => predicates.iter().all(|p| p.matches(tx)),
        }
    }
}

impl Predicate {
    pub fn matches(&self, tx: &Transaction) -> bool {
        match self {
            Self::Text(text) => text.matches(tx),
            Self::Exact(exact) => exact.matches(tx),
            Self::AnyOf(terms) => terms.matches(tx),
            Self::Flag { flag, value } => flag_value(*flag, tx) == *value,
            Self::AmountMagnitude(range) => range.matches(tx.amount),
            Self::Date(range) => range.matches(tx),
            Self::Location(location) => location.matches(tx),
        }
    }
}

impl TextMatch {
    fn matches(&self, tx: &Transaction) -> bool {
        let tokens = self.tokens();
        // an empty query matches no documents
        if tokens.is_empty() {
            return false;
        }

        let fields: Vec<Vec<String>> = self
            .fields
            .iter()
            .filter_map(|(field, _)| field_value(*field, tx))
            .map(tokenize)
            .collect();

        let fuzzy = |token: &String, terms: &[String]| {
            terms.iter().any(|term| fuzzy_term_matches(token, term))
        };
        let substring =
            |token: &String, terms: &[String]| terms.iter().any(|term| term.contains(token.as_str()));

        self.any_field(&tokens, &fields, fuzzy) || self.any_field(&tokens, &fields, substring)
    }

    fn any_field<F>(&self, tokens: &[String], fields: &[Vec<String>], hit: F) -> bool
    where
        F: Fn(&String, &[String]) -> bool,
    {
        fields.iter().any(|terms| match self.operator {
            Operator::And => tokens.iter().all(|token| hit(token, terms)),
            Operator::Or => tokens.iter().any(|token| hit(token, terms)),
        })
    }
}

impl ExactMatch {
    fn matches(&self, tx: &Transaction) -> bool {
        match field_value(self.field, tx) {
            Some(value) if self.case_insensitive => value.to_lowercase() == self.value.to_lowercase(),
            Some(value) => value == self.value,
            None => false,
        }
    }
}

impl TermsMatch {
    fn matches(&self, tx: &Transaction) -> bool {
        match self.field {
            Field::Tags => tx.tags.iter().any(|tag| self.values.contains(tag)),
            field => field_value(field, tx)
                .map(|value| self.values.iter().any(|v| v == value))
                .unwrap_or(false),
        }
    }
}

impl AmountRange {
    fn matches(self, amount: f64) -> bool {
        let magnitude = amount.abs();
        self.min.map_or(true, |min| magnitude >= min) && self.max.map_or(true, |max| magnitude <= max)
    }
}

impl DateRange {
    fn matches(self, tx: &Transaction) -> bool {
        let date = tx.transaction_date;
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }
}

impl LocationMatch {
    fn matches(&self, tx: &Transaction) -> bool {
        self.alternatives().iter().any(|alt| alt.matches(tx))
    }
}

fn flag_value(flag: Flag, tx: &Transaction) -> bool {
    match flag {
        Flag::Pending => tx.is_pending,
        Flag::Recurring => tx.is_recurring,
    }
}

fn field_value(field: Field, tx: &Transaction) -> Option<&str> {
    let location = tx.location.as_ref();
    match field {
        Field::Description => Some(tx.description.as_str()),
        Field::Memo => tx.memo.as_deref(),
        Field::Reference => tx.reference.as_deref(),
        Field::Merchant => tx.merchant.as_deref(),
        Field::Category => tx.category.as_deref(),
        Field::Subcategory => tx.subcategory.as_deref(),
        Field::AccountId => Some(tx.account_id.as_str()),
        Field::AccountType => Some(tx.account_type.as_str()),
        Field::TransactionType => Some(tx.transaction_type.as_str()),
        Field::Tags => None,
        Field::City => location.and_then(|l| l.city.as_deref()),
        Field::State => location.and_then(|l| l.state.as_deref()),
        Field::Address => location.and_then(|l| l.address.as_deref()),
    }
}

fn fuzzy_term_matches(token: &str, term: &str) -> bool {
    if token == term {
        return true;
    }
    let allowed = auto_fuzziness(token);
    allowed > 0 && levenshtein_distance(token, term) <= allowed
}

/// Edits tolerated for a token under `fuzziness: AUTO`
fn auto_fuzziness(token: &str) -> usize {
    match token.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    if left == right {
        return 0;
    }
    if left.is_empty() {
        return right.chars().count();
    }
    if right.is_empty() {
        return left.chars().count();
    }

    let right_chars: Vec<char> = right.chars().collect();
    let mut previous: Vec<usize> = (0..=right_chars.len()).collect();

    for (i, left_char) in left.chars().enumerate() {
        let mut current = Vec::with_capacity(right_chars.len() + 1);
        current.push(i + 1);
        for (j, right_char) in right_chars.iter().enumerate() {
            let cost = usize::from(left_char != *right_char);
            let best = (current[j] + 1)
                .min(previous[j + 1] + 1)
                .min(previous[j] + cost);
            current.push(best);
        }
        previous = current;
    }

    previous[right_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, Location, SearchCriteria, TransactionType};
    use crate::query::compile_filter;
    use chrono::NaiveDate;

    fn tx() -> Transaction {
        Transaction {
            transaction_id: "txn_1".into(),
            account_id: "acc_001".into(),
            account_type: AccountType::Credit,
            transaction_type: TransactionType::Debit,
            category: Some("dining".into()),
            subcategory: Some("coffee".into()),
            tags: vec!["food".into(), "morning".into()],
            amount: -5.5,
            currency: "USD".into(),
            balance_after: None,
            transaction_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            posted_date: None,
            created_at: None,
            updated_at: None,
            description: "Starbucks - Grande Latte".into(),
            memo: Some("team coffee".into()),
            reference: Some("REF-1234".into()),
            merchant: Some("Starbucks".into()),
            location: Some(Location {
                city: Some("Seattle".into()),
                state: Some("WA".into()),
                address: Some("1912 Pike Place".into()),
                ..Default::default()
            }),
            is_pending: false,
            is_recurring: false,
            id: None,
            score: None,
        }
    }

    fn matches(criteria: SearchCriteria) -> bool {
        compile_filter(&criteria).unwrap().matches(&tx())
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_auto_fuzziness_steps() {
        assert_eq!(auto_fuzziness("wa"), 0);
        assert_eq!(auto_fuzziness("shell"), 1);
        assert_eq!(auto_fuzziness("starbucks"), 2);
    }

    #[test]
    fn test_merchant_typo_and_case() {
        assert!(matches(SearchCriteria {
            merchant: Some("starbuks".into()),
            ..Default::default()
        }));
        assert!(matches(SearchCriteria {
            merchant: Some("STAR".into()),
            ..Default::default()
        }));
        // a fragment is too far from any term to be a typo, so only the
        // substring alternative can match it
        assert!(matches(SearchCriteria {
            merchant: Some("bucks".into()),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            merchant: Some("Shell".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_fuzzy_and_substring_are_separate_alternatives() {
        // "grnde" is only a typo of "grande", "rbuck" is only a fragment of
        // "starbucks", and the two alternatives never mix within one query
        assert!(!matches(SearchCriteria {
            description: Some("grnde rbuck".into()),
            ..Default::default()
        }));
        assert!(matches(SearchCriteria {
            description: Some("grande rbuck".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_description_needs_every_token_in_one_field() {
        assert!(matches(SearchCriteria {
            description: Some("grande latte".into()),
            ..Default::default()
        }));
        // "team" is only in memo, "latte" only in description
        assert!(!matches(SearchCriteria {
            description: Some("team latte".into()),
            ..Default::default()
        }));
        assert!(matches(SearchCriteria {
            description: Some("1234".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_empty_text_matches_nothing() {
        assert!(!matches(SearchCriteria {
            memo: Some(String::new()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_location_alias_checks_each_field() {
        for query in ["seattle", "WA", "pike place"] {
            assert!(matches(SearchCriteria {
                location: Some(query.into()),
                ..Default::default()
            }));
        }
        assert!(!matches(SearchCriteria {
            location: Some("Portland".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_exact_terms() {
        assert!(matches(SearchCriteria {
            category: Some("DINING".into()),
            account_type: Some(AccountType::Credit),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            category: Some("din".into()),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            account_id: Some("ACC_001".into()),
            ..Default::default()
        }));
    }

    #[test]
    fn test_tags_any_of() {
        assert!(matches(SearchCriteria {
            tags: Some(vec!["travel".into(), "food".into()]),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            tags: Some(vec!["travel".into()]),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            tags: Some(vec![]),
            ..Default::default()
        }));
    }

    #[test]
    fn test_amount_magnitude_and_dates() {
        assert!(matches(SearchCriteria {
            amount_min: Some(5.5),
            amount_max: Some(5.5),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            amount_min: Some(10.0),
            ..Default::default()
        }));
        assert!(matches(SearchCriteria {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 3),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 3),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            date_from: NaiveDate::from_ymd_opt(2024, 6, 4),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..Default::default()
        }));
    }

    #[test]
    fn test_flags() {
        assert!(matches(SearchCriteria {
            is_pending: Some(false),
            ..Default::default()
        }));
        assert!(!matches(SearchCriteria {
            is_recurring: Some(true),
            ..Default::default()
        }));
    }
}
