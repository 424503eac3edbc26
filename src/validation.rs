//! Decides whether a query and its result satisfy a mission's criteria.
//!
//! Validation never fails: every problem is reported as a [`Failure`] inside
//! the returned [`Verdict`].

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::criteria::{Check, Criteria, Filter, FilterOperator, OrderDirection, OrderRule};
use crate::engine::{QueryOutcome, Row};

#[derive(Clone, Debug, PartialEq)]
pub enum Failure {
    NotARowResult,
    DatabaseNotMounted(String),
    RowCount { expected: usize, actual: usize },
    NoRows,
    MissingColumn(String),
    Filter { filter: Filter, row: usize },
    OutOfOrder { column: String, row: usize },
    ExactMatch,
    MissingKeyword(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::NotARowResult => write!(f, "the statement did not return any rows to check"),
            Failure::DatabaseNotMounted(db) => write!(f, "database {} is not mounted", db),
            Failure::RowCount { expected, actual } => {
                write!(f, "expected {} row(s), got {}", expected, actual)
            }
            Failure::NoRows => write!(f, "the query returned no rows"),
            Failure::MissingColumn(column) => write!(f, "missing column {}", column),
            Failure::Filter { filter, row } => write!(
                f,
                "row {} does not satisfy {} {} {}",
                row + 1,
                filter.column,
                filter.operator.as_str(),
                filter.value
            ),
            Failure::OutOfOrder { column, row } => {
                write!(f, "rows are not ordered by {} (at row {})", column, row + 1)
            }
            Failure::ExactMatch => write!(f, "the result does not match the expected rows"),
            Failure::MissingKeyword(keyword) => {
                write!(f, "the query should use {}", keyword.to_uppercase())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Verdict {
    pub failures: Vec<Failure>,
}

impl Verdict {
    pub fn solved(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(failure: Failure) -> Self {
        Self {
            failures: vec![failure],
        }
    }
}

pub fn validate(
    criteria: &Criteria,
    query: &str,
    outcome: &QueryOutcome,
    catalog: &Catalog,
) -> Verdict {
    match criteria {
        Criteria::AutoPass => {
            warn!("mission has no validation criteria, accepting the query");
            Verdict::default()
        }
        Criteria::DatabaseMounted { database } => database_mounted(database, catalog),
        Criteria::Results { checks, keywords } => {
            let rows = match outcome.rows() {
                Some(rows) => rows,
                None => return Verdict::fail(Failure::NotARowResult),
            };

            let has_count_check = checks
                .iter()
                .any(|check| matches!(check, Check::RowCount(_) | Check::NonEmpty));
            let mut failures: Vec<Failure> = checks
                .iter()
                .flat_map(|check| run_check(check, rows, has_count_check))
                .collect();
            failures.extend(missing_keywords(keywords, query));

            debug!(failures = failures.len(), "validated query result");
            Verdict { failures }
        }
    }
}

pub fn database_mounted(database: &str, catalog: &Catalog) -> Verdict {
    if catalog.is_mounted(database) {
        Verdict::default()
    } else {
        Verdict::fail(Failure::DatabaseNotMounted(database.to_owned()))
    }
}

fn run_check(check: &Check, rows: &[Row], has_count_check: bool) -> Option<Failure> {
    match check {
        Check::RowCount(expected) => (rows.len() != *expected).then(|| Failure::RowCount {
            expected: *expected,
            actual: rows.len(),
        }),
        Check::NonEmpty => rows.is_empty().then(|| Failure::NoRows),
        Check::Columns(columns) => match rows.first() {
            Some(first) => columns
                .iter()
                .find(|column| cell(first, column).is_none())
                .map(|column| Failure::MissingColumn(column.clone())),
            // An empty result is the row count check's to report.
            None if has_count_check => None,
            None => Some(Failure::NoRows),
        },
        Check::Filter(filter) => rows
            .iter()
            .position(|row| !filter_matches(filter, row))
            .map(|row| Failure::Filter {
                filter: filter.clone(),
                row,
            }),
        Check::Order(rule) => check_order(rule, rows),
        Check::ExactMatch(expected) => (!rows_equal(rows, expected)).then(|| Failure::ExactMatch),
    }
}

fn missing_keywords(keywords: &[String], query: &str) -> Vec<Failure> {
    let query = query.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| !query.contains(&keyword.to_lowercase()))
        .map(|keyword| Failure::MissingKeyword(keyword.clone()))
        .collect()
}

/// Looks a column up by its base name, ignoring any `table.` qualifier and
/// case.
fn cell<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    let column = column.rsplit('.').next().unwrap_or(column);
    row.get(column).or_else(|| {
        row.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Numbers compare numerically, strings lexicographically. A number and a
/// string compare numerically when the string holds a number.
fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Null, _) | (_, Value::Null) => None,
        _ => as_number(lhs)?.partial_cmp(&as_number(rhs)?),
    }
}

fn filter_matches(filter: &Filter, row: &Row) -> bool {
    let value = match cell(row, &filter.column) {
        Some(Value::Null) | None => return false,
        Some(value) => value,
    };
    let ordering = compare(value, &filter.value);
    match filter.operator {
        FilterOperator::NotEqual => ordering != Some(Ordering::Equal),
        FilterOperator::Equal => ordering == Some(Ordering::Equal),
        FilterOperator::GreaterThan => ordering == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        FilterOperator::LessThan => ordering == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => {
            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
        }
    }
}

fn check_order(rule: &OrderRule, rows: &[Row]) -> Option<Failure> {
    let violation = Ordering::from(rule.direction).reverse();
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| match cell(row, &rule.column) {
            Some(Value::Null) | None => None,
            Some(value) => Some((i, value)),
        })
        .tuple_windows()
        .find(|((_, prev), (_, next))| {
            compare(prev, next).map_or(true, |ordering| ordering == violation)
        })
        .map(|(_, (row, _))| Failure::OutOfOrder {
            column: rule.column.clone(),
            row,
        })
}

impl From<OrderDirection> for Ordering {
    /// How consecutive rows relate when they are in order.
    fn from(direction: OrderDirection) -> Self {
        match direction {
            OrderDirection::Asc => Ordering::Less,
            OrderDirection::Desc => Ordering::Greater,
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(a), Value::Object(b)) => rows_match(a, b),
        _ => lhs == rhs,
    }
}

fn rows_match(actual: &Row, expected: &Row) -> bool {
    actual.len() == expected.len()
        && expected
            .iter()
            .all(|(column, value)| actual.get(column).map_or(false, |v| values_equal(v, value)))
}

fn rows_equal(actual: &[Row], expected: &[Row]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(actual, expected)| rows_match(actual, expected))
}
