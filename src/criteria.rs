use serde::Deserialize;
use serde_json::Value;

use crate::engine::Row;

/// Success criteria as written in the mission data. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCriteria {
    #[serde(default)]
    pub database_mounted: bool,
    pub required_database: Option<String>,
    pub expected_rows: Option<usize>,
    #[serde(default)]
    pub must_contain_columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    pub ordered: Option<RawOrdered>,
    pub order_column: Option<String>,
    pub order_direction: Option<OrderDirection>,
    pub exact_match: Option<Vec<Row>>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// `ordered` is either a flag paired with `orderColumn`/`orderDirection`, or
/// the older nested form, whose keys may be spelled either way.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawOrdered {
    Flag(bool),
    Nested {
        #[serde(alias = "orderColumn")]
        column: String,
        #[serde(default, alias = "orderDirection")]
        direction: OrderDirection,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub enum OrderDirection {
    #[default]
    #[serde(rename = "asc", alias = "ASC")]
    Asc,
    #[serde(rename = "desc", alias = "DESC")]
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "!=",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderRule {
    pub column: String,
    pub direction: OrderDirection,
}

/// One validation mode over a result set.
#[derive(Clone, Debug, PartialEq)]
pub enum Check {
    RowCount(usize),
    /// Relaxed stand-in for `RowCount` on missions whose expected size can grow.
    NonEmpty,
    Columns(Vec<String>),
    Filter(Filter),
    Order(OrderRule),
    ExactMatch(Vec<Row>),
}

/// Success criteria, decided once when the mission is loaded.
#[derive(Clone, Debug, PartialEq)]
pub enum Criteria {
    /// The mission data has no criteria; any query passes.
    AutoPass,
    /// Solved as soon as the database is mounted, whatever the query.
    DatabaseMounted { database: String },
    Results {
        checks: Vec<Check>,
        /// Checked against the query text after every other check.
        keywords: Vec<String>,
    },
}

impl Criteria {
    /// `default_database` backs `databaseMounted` criteria that omit
    /// `requiredDatabase`. With `relaxed_row_count` an exact row count turns
    /// into a non-empty requirement.
    pub fn compile(
        raw: Option<&RawCriteria>,
        default_database: &str,
        relaxed_row_count: bool,
    ) -> Result<Self, String> {
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(Criteria::AutoPass),
        };

        if raw.database_mounted {
            let database = raw
                .required_database
                .clone()
                .unwrap_or_else(|| default_database.to_owned());
            return Ok(Criteria::DatabaseMounted { database });
        }

        let mut checks = vec![];

        if let Some(expected) = raw.expected_rows {
            checks.push(if relaxed_row_count {
                Check::NonEmpty
            } else {
                Check::RowCount(expected)
            });
        } else if relaxed_row_count {
            checks.push(Check::NonEmpty);
        }

        if !raw.must_contain_columns.is_empty() {
            checks.push(Check::Columns(raw.must_contain_columns.clone()));
        }

        checks.extend(raw.filters.iter().cloned().map(Check::Filter));

        match &raw.ordered {
            Some(RawOrdered::Flag(true)) => {
                let column = raw
                    .order_column
                    .clone()
                    .ok_or("`ordered` is set but `orderColumn` is missing")?;
                checks.push(Check::Order(OrderRule {
                    column,
                    direction: raw.order_direction.unwrap_or_default(),
                }));
            }
            Some(RawOrdered::Nested { column, direction }) => {
                checks.push(Check::Order(OrderRule {
                    column: column.clone(),
                    direction: *direction,
                }));
            }
            Some(RawOrdered::Flag(false)) | None => {}
        }

        if let Some(rows) = &raw.exact_match {
            checks.push(Check::ExactMatch(rows.clone()));
        }

        Ok(Criteria::Results {
            checks,
            keywords: raw.keywords.clone(),
        })
    }

    pub fn required_database(&self) -> Option<&str> {
        match self {
            Criteria::DatabaseMounted { database } => Some(database),
            _ => None,
        }
    }
}
