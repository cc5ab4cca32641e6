//! Predicate constructors, one per criteria field
//!
//! Each constructor looks at a single field and returns `None` when it is
//! absent. The compiler folds them in `CONSTRUCTORS` order, which fixes the
//! predicate order of every compiled expression.

use crate::models::SearchCriteria;

use super::{
    AmountRange, DateRange, ExactMatch, Field, Flag, LocationMatch, Operator, Predicate,
    TermsMatch, TextMatch,
};

pub(super) type Constructor = fn(&SearchCriteria) -> Option<Predicate>;

pub(super) const CONSTRUCTORS: &[Constructor] = &[
    description,
    memo,
    merchant,
    category,
    subcategory,
    location,
    account_id,
    account_type,
    transaction_type,
    tags,
    amount,
    transaction_date,
    pending,
    recurring,
];

fn description(criteria: &SearchCriteria) -> Option<Predicate> {
    let query = criteria.description.as_ref()?;
    Some(Predicate::Text(TextMatch {
        query: query.clone(),
        fields: vec![
            (Field::Description, Some(2)),
            (Field::Memo, None),
            (Field::Reference, None),
        ],
        operator: Operator::And,
    }))
}

fn memo(criteria: &SearchCriteria) -> Option<Predicate> {
    let query = criteria.memo.as_deref()?;
    Some(Predicate::Text(TextMatch::single(Field::Memo, query)))
}

fn merchant(criteria: &SearchCriteria) -> Option<Predicate> {
    let query = criteria.merchant.as_deref()?;
    Some(Predicate::Text(TextMatch::single(Field::Merchant, query)))
}

fn exact(field: Field, value: &str, case_insensitive: bool) -> Predicate {
    Predicate::Exact(ExactMatch {
        field,
        value: value.to_string(),
        case_insensitive,
    })
}

fn category(criteria: &SearchCriteria) -> Option<Predicate> {
    let value = criteria.category.as_deref()?;
    Some(exact(Field::Category, value, true))
}

fn subcategory(criteria: &SearchCriteria) -> Option<Predicate> {
    let value = criteria.subcategory.as_deref()?;
    Some(exact(Field::Subcategory, value, true))
}

fn location(criteria: &SearchCriteria) -> Option<Predicate> {
    let query = criteria.location.as_ref()?;
    Some(Predicate::Location(LocationMatch {
        query: query.clone(),
    }))
}

fn account_id(criteria: &SearchCriteria) -> Option<Predicate> {
    let value = criteria.account_id.as_deref()?;
    Some(exact(Field::AccountId, value, false))
}

fn account_type(criteria: &SearchCriteria) -> Option<Predicate> {
    let value = criteria.account_type.as_ref()?;
    Some(exact(Field::AccountType, value.as_str(), true))
}

fn transaction_type(criteria: &SearchCriteria) -> Option<Predicate> {
    let value = criteria.transaction_type.as_ref()?;
    Some(exact(Field::TransactionType, value.as_str(), true))
}

fn tags(criteria: &SearchCriteria) -> Option<Predicate> {
    let values = criteria.tags.as_ref()?;
    Some(Predicate::AnyOf(TermsMatch {
        field: Field::Tags,
        values: values.clone(),
    }))
}

fn amount(criteria: &SearchCriteria) -> Option<Predicate> {
    if criteria.amount_min.is_none() && criteria.amount_max.is_none() {
        return None;
    }
    Some(Predicate::AmountMagnitude(AmountRange {
        min: criteria.amount_min.map(f64::abs),
        max: criteria.amount_max.map(f64::abs),
    }))
}

fn transaction_date(criteria: &SearchCriteria) -> Option<Predicate> {
    if criteria.date_from.is_none() && criteria.date_to.is_none() {
        return None;
    }
    Some(Predicate::Date(DateRange {
        from: criteria.date_from,
        to: criteria.date_to,
    }))
}

fn pending(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.is_pending.map(|value| Predicate::Flag {
        flag: Flag::Pending,
        value,
    })
}

fn recurring(criteria: &SearchCriteria) -> Option<Predicate> {
    criteria.is_recurring.map(|value| Predicate::Flag {
        flag: Flag::Recurring,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountType;
    use chrono::NaiveDate;

    #[test]
    fn test_every_constructor_skips_empty_criteria() {
        let criteria = SearchCriteria::default();
        for build in CONSTRUCTORS {
            assert!(build(&criteria).is_none());
        }
    }

    #[test]
    fn test_description_requires_all_tokens() {
        let criteria = SearchCriteria {
            description: Some("coffee".into()),
            ..Default::default()
        };
        match description(&criteria) {
            Some(Predicate::Text(text)) => {
                assert_eq!(text.operator, Operator::And);
                assert_eq!(text.fields.len(), 3);
                assert_eq!(text.fields[0], (Field::Description, Some(2)));
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_merchant_is_single_field_text() {
        let criteria = SearchCriteria {
            merchant: Some("Starbucks".into()),
            ..Default::default()
        };
        assert_eq!(
            merchant(&criteria),
            Some(Predicate::Text(TextMatch::single(Field::Merchant, "Starbucks")))
        );
    }

    #[test]
    fn test_account_id_is_case_sensitive() {
        let criteria = SearchCriteria {
            account_id: Some("ACC_1".into()),
            ..Default::default()
        };
        match account_id(&criteria) {
            Some(Predicate::Exact(exact)) => {
                assert!(!exact.case_insensitive);
                assert_eq!(exact.value, "ACC_1");
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_account_type_uses_canonical_name() {
        let criteria = SearchCriteria {
            account_type: Some(AccountType::Savings),
            ..Default::default()
        };
        match account_type(&criteria) {
            Some(Predicate::Exact(exact)) => {
                assert_eq!(exact.field, Field::AccountType);
                assert_eq!(exact.value, "savings");
                assert!(exact.case_insensitive);
            }
            other => panic!("unexpected predicate: {:?}", other),
        }
    }

    #[test]
    fn test_location_is_named_composite() {
        let criteria = SearchCriteria {
            location: Some("WA".into()),
            ..Default::default()
        };
        let Some(Predicate::Location(location)) = location(&criteria) else {
            panic!("expected location predicate");
        };
        let fields: Vec<Field> = location
            .alternatives()
            .iter()
            .map(|alt| alt.fields[0].0)
            .collect();
        assert_eq!(fields, vec![Field::City, Field::State, Field::Address]);
    }

    #[test]
    fn test_single_sided_ranges() {
        let criteria = SearchCriteria {
            amount_min: Some(5.0),
            date_to: NaiveDate::from_ymd_opt(2024, 6, 30),
            ..Default::default()
        };
        assert_eq!(
            amount(&criteria),
            Some(Predicate::AmountMagnitude(AmountRange {
                min: Some(5.0),
                max: None
            }))
        );
        assert_eq!(
            transaction_date(&criteria),
            Some(Predicate::Date(DateRange {
                from: None,
                to: NaiveDate::from_ymd_opt(2024, 6, 30)
            }))
        );
    }

    #[test]
    fn test_flags_keep_false() {
        let criteria = SearchCriteria {
            is_recurring: Some(false),
            ..Default::default()
        };
        assert_eq!(
            recurring(&criteria),
            Some(Predicate::Flag {
                flag: Flag::Recurring,
                value: false
            })
        );
        assert!(pending(&criteria).is_none());
    }
}
