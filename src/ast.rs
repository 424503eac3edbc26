use std::collections::{BTreeSet, HashMap};

pub type TableName = String;
pub type ColumnExpr = String;

/// A join edge between two fully resolved `table.column` endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinCondition {
    pub from: String,
    pub to: String,
}

impl JoinCondition {
    pub fn tables(&self) -> (&str, &str) {
        (endpoint_table(&self.from), endpoint_table(&self.to))
    }
}

fn endpoint_table(endpoint: &str) -> &str {
    endpoint
        .split_once('.')
        .map(|(table, _)| table)
        .unwrap_or(endpoint)
}

/// What a query references, as far as the schema diagram is concerned.
///
/// This is advisory only. It is rebuilt for every query and never fed back to
/// the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedQueryInfo {
    pub selected_columns: BTreeSet<ColumnExpr>,
    /// First-appearance order: the FROM table, then joined tables.
    pub tables_involved: Vec<TableName>,
    pub join_conditions: Vec<JoinCondition>,
    /// Keys are lower-cased aliases (and table names) mapping to the
    /// canonical catalog table name.
    pub aliases: HashMap<String, TableName>,
}

impl ParsedQueryInfo {
    pub fn resolve_alias(&self, name: &str) -> Option<&str> {
        self.aliases
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables_involved.is_empty()
    }
}
