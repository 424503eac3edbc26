//! Turns a [`ParsedQueryInfo`] into what the schema diagram should light up.
//!
//! Unqualified column names are resolved here rather than in the parser: a
//! bare `name` highlights the column on every involved table that has it.

use std::collections::BTreeSet;
use std::fmt;

use itertools::Itertools;

use crate::ast::{JoinCondition, ParsedQueryInfo};
use crate::catalog::Catalog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableHighlight {
    /// 1-based position in the order tables were first referenced.
    pub sequence: usize,
    pub table: String,
    pub db_alias: String,
    pub columns: BTreeSet<String>,
}

/// An empty highlight means "clear everything and draw no join lines".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiagramHighlight {
    pub tables: Vec<TableHighlight>,
    pub joins: Vec<JoinCondition>,
}

impl DiagramHighlight {
    pub fn is_cleared(&self) -> bool {
        self.tables.is_empty() && self.joins.is_empty()
    }

    pub fn table(&self, name: &str) -> Option<&TableHighlight> {
        self.tables.iter().find(|t| t.table == name)
    }
}

pub fn plan(info: Option<&ParsedQueryInfo>, catalog: &Catalog) -> DiagramHighlight {
    let info = match info {
        Some(info) if !info.is_empty() => info,
        _ => return DiagramHighlight::default(),
    };

    let mut tables: Vec<TableHighlight> = info
        .tables_involved
        .iter()
        .filter_map(|name| catalog.table(name))
        .enumerate()
        .map(|(i, schema)| TableHighlight {
            sequence: i + 1,
            table: schema.name.clone(),
            db_alias: schema.db_alias.clone(),
            columns: BTreeSet::new(),
        })
        .collect();

    for expr in &info.selected_columns {
        if expr == "*" {
            for highlight in &mut tables {
                if let Some(schema) = catalog.table(&highlight.table) {
                    highlight.columns.extend(schema.columns.iter().cloned());
                }
            }
            continue;
        }

        match expr.split_once('.') {
            Some((qualifier, column)) => {
                let table = match info.resolve_alias(qualifier) {
                    Some(table) => table,
                    None => continue,
                };
                if let Some(highlight) = tables.iter_mut().find(|t| t.table == table) {
                    mark_column(highlight, catalog, column);
                }
            }
            None => {
                for highlight in &mut tables {
                    mark_column(highlight, catalog, expr);
                }
            }
        }
    }

    // Join endpoints are highlighted as well, they are part of the query.
    for join in &info.join_conditions {
        for endpoint in [&join.from, &join.to] {
            if let Some((table, column)) = endpoint.split_once('.') {
                if let Some(highlight) = tables.iter_mut().find(|t| t.table == table) {
                    mark_column(highlight, catalog, column);
                }
            }
        }
    }

    DiagramHighlight {
        tables,
        joins: info.join_conditions.clone(),
    }
}

fn mark_column(highlight: &mut TableHighlight, catalog: &Catalog, column: &str) {
    let schema = match catalog.table(&highlight.table) {
        Some(schema) => schema,
        None => return,
    };
    if column == "*" {
        highlight.columns.extend(schema.columns.iter().cloned());
    } else if let Some(name) = schema.column(column) {
        highlight.columns.insert(name.to_owned());
    }
}

impl fmt::Display for DiagramHighlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cleared() {
            return write!(f, "(no tables highlighted)");
        }
        for table in &self.tables {
            writeln!(
                f,
                "[{}] {} ({}): {}",
                table.sequence,
                table.table,
                table.db_alias,
                if table.columns.is_empty() {
                    "-".to_owned()
                } else {
                    table.columns.iter().join(", ")
                }
            )?;
        }
        for join in &self.joins {
            writeln!(f, "    {} <-> {}", join.from, join.to)?;
        }
        Ok(())
    }
}
