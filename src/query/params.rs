//! Named parameters and their validation.
//!
//! The placeholders a statement needs are read from its text, so the
//! validator cannot drift from the catalog.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::dates::{DateRange, Interval};
use crate::error::QueryError;

pub const START_DATE: &str = "start_date";
pub const END_DATE: &str = "end_date";
pub const DATE_FORMAT: &str = "date_format";
pub const UNIT: &str = "unit";

lazy_static! {
    /// A `:` followed by a word, e.g. `:start_date`
    static ref NAMED_PLACEHOLDER: Regex = Regex::new(r":(\w+)").unwrap();
}

/// Placeholder name to value. A key that is present with an empty value
/// still counts as supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParameterBag(BTreeMap<String, String>);

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bag for a grouped query over `range`; the unit key is only added
    /// when a filter is given.
    pub fn grouped(range: &DateRange, interval: Interval, unit: Option<&str>) -> Self {
        let mut bag = Self::new()
            .with(START_DATE, range.start_date())
            .with(END_DATE, range.end_date())
            .with(DATE_FORMAT, interval.pattern());
        if let Some(unit) = unit {
            bag.insert(UNIT, unit);
        }
        bag
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Names of every `:placeholder` in `statement`, first appearance order,
/// without duplicates.
pub fn required_placeholders(statement: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in NAMED_PLACEHOLDER.captures_iter(statement) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Check `bag` supplies every name in `required`.
///
/// An empty bag is always rejected. Otherwise every absent name is
/// reported in one error.
pub fn validate(bag: &ParameterBag, required: &[String]) -> Result<(), QueryError> {
    if bag.is_empty() {
        return Err(QueryError::EmptyParameters);
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !bag.contains(name))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(QueryError::MissingParameters { missing })
    }
}

/// Rewrite `:name` placeholders as numbered `?N` parameters, returning the
/// rewritten statement and the values in bind order. Repeated names share
/// one number so each value is bound once.
pub fn bind_named(statement: &str, bag: &ParameterBag) -> Result<(String, Vec<String>), String> {
    let order = required_placeholders(statement);
    let mut values = Vec::with_capacity(order.len());
    for name in &order {
        match bag.get(name) {
            Some(value) => values.push(value.to_string()),
            None => return Err(format!("no value bound for parameter :{}", name)),
        }
    }

    let rewritten = NAMED_PLACEHOLDER.replace_all(statement, |caps: &Captures| {
        let position = order.iter().position(|n| n == &caps[1]).unwrap_or(0);
        format!("?{}", position + 1)
    });

    Ok((rewritten.into_owned(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::RowSetQuery;

    #[test]
    fn test_required_placeholders_dedupes() {
        let needs = required_placeholders(RowSetQuery::TaxOverview.statement());
        assert_eq!(needs, vec!["date_format", "start_date", "end_date"]);

        let needs = required_placeholders(RowSetQuery::DetailedForUnit.statement());
        assert_eq!(needs.len(), 4);
        assert!(needs.contains(&"unit".to_string()));
    }

    #[test]
    fn test_required_placeholders_ignores_strftime_patterns() {
        assert!(required_placeholders("SELECT strftime('%Y-%m', date) FROM costs").is_empty());
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let needs = vec![
            START_DATE.to_string(),
            END_DATE.to_string(),
            DATE_FORMAT.to_string(),
        ];
        let bag = ParameterBag::new().with(START_DATE, "2024-01-01");

        match validate(&bag, &needs) {
            Err(QueryError::MissingParameters { missing }) => {
                assert_eq!(missing, vec!["end_date", "date_format"]);
            }
            other => panic!("expected missing parameters, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_empty_bag() {
        let err = validate(&ParameterBag::new(), &[]).unwrap_err();
        assert!(matches!(err, QueryError::EmptyParameters));
    }

    #[test]
    fn test_validate_accepts_empty_values() {
        let needs = vec![UNIT.to_string()];
        let bag = ParameterBag::new().with(UNIT, "");
        assert!(validate(&bag, &needs).is_ok());
    }

    #[test]
    fn test_grouped_bag_only_adds_unit_when_filtered() {
        let range = DateRange::new(
            crate::dates::parse_date("2024-01-01").unwrap(),
            crate::dates::parse_date("2024-02-01").unwrap(),
        );
        let bag = ParameterBag::grouped(&range, Interval::Month, None);
        assert_eq!(bag.get(START_DATE), Some("2024-01-01"));
        assert_eq!(bag.get(END_DATE), Some("2024-02-01"));
        assert_eq!(bag.get(DATE_FORMAT), Some("%Y-%m"));
        assert!(!bag.contains(UNIT));

        let bag = ParameterBag::grouped(&range, Interval::Day, Some("unitA"));
        assert_eq!(bag.get(UNIT), Some("unitA"));
    }

    #[test]
    fn test_bind_named_numbers_repeats() {
        let bag: ParameterBag = [("a", "1"), ("b", "2")].into_iter().collect();
        let (sql, values) = bind_named("x = :b AND y = :a OR z = :b", &bag).unwrap();
        assert_eq!(sql, "x = ?1 AND y = ?2 OR z = ?1");
        assert_eq!(values, vec!["2", "1"]);
    }

    #[test]
    fn test_bind_named_missing_value() {
        let bag = ParameterBag::new().with("a", "1");
        assert!(bind_named("x = :a AND y = :b", &bag).is_err());
    }
}
