use std::collections::BTreeSet;

use itertools::Itertools;
use pest::Parser as _;
use pest_derive::Parser;
use tracing::debug;

use crate::ast::{JoinCondition, ParsedQueryInfo};
use crate::catalog::Catalog;

#[derive(Parser)]
#[grammar = "sql_subset.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

const IDENTIFIER_QUOTES: &[char] = &['"', '`', '[', ']'];

/// Extracts the tables, columns and joins `query` refers to.
///
/// Returns `None` when the text has no `SELECT ... FROM` shape. Anything else
/// the parser does not understand is dropped, so the result may be partial:
/// when the FROM table is not mounted, `tables_involved` is empty and joins
/// are not looked at.
pub fn parse_query_info(query: &str, catalog: &Catalog) -> Option<ParsedQueryInfo> {
    let text: String = query.chars().filter(|c| !IDENTIFIER_QUOTES.contains(c)).collect();

    let statement = match Parser::parse(Rule::statement, &text) {
        Ok(mut pairs) => pairs.next()?,
        Err(_) => {
            debug!("no SELECT ... FROM structure found");
            return None;
        }
    };

    let mut select_list = "";
    let mut from_clause = "";
    for pair in statement.into_inner() {
        match pair.as_rule() {
            Rule::select_list => select_list = pair.as_str(),
            Rule::from_clause => from_clause = pair.as_str(),
            _ => {}
        }
    }

    let mut info = ParsedQueryInfo {
        selected_columns: parse_select_list(select_list),
        ..ParsedQueryInfo::default()
    };

    let (table, alias) = match parse_base_table(from_clause) {
        Some(base) => base,
        None => {
            debug!(from = from_clause.trim(), "FROM clause has no table name");
            return Some(info);
        }
    };
    let table = match catalog.table(&table) {
        Some(schema) => schema.name.clone(),
        None => {
            debug!(%table, "FROM table is not mounted");
            return Some(info);
        }
    };
    register_table(&mut info, &table, alias.as_deref());

    for join in parse_joins(from_clause) {
        let joined = match catalog.table(&join.table) {
            Some(schema) => schema.name.clone(),
            None => {
                debug!(table = %join.table, "skipping join on a table that is not mounted");
                continue;
            }
        };
        register_table(&mut info, &joined, join.alias.as_deref());

        match (resolve_column(&info, &join.left), resolve_column(&info, &join.right)) {
            (Some(from), Some(to)) => info.join_conditions.push(JoinCondition { from, to }),
            _ => debug!(
                left = %join.left,
                right = %join.right,
                "join predicate does not resolve to qualified columns"
            ),
        }
    }

    info.tables_involved = info.tables_involved.into_iter().unique().collect();
    Some(info)
}

fn register_table(info: &mut ParsedQueryInfo, table: &str, alias: Option<&str>) {
    info.tables_involved.push(table.to_owned());
    info.aliases
        .insert(table.to_ascii_lowercase(), table.to_owned());
    if let Some(alias) = alias {
        info.aliases
            .insert(alias.to_ascii_lowercase(), table.to_owned());
    }
}

fn resolve_column(info: &ParsedQueryInfo, column: &str) -> Option<String> {
    let (qualifier, name) = column.split_once('.')?;
    let table = info.resolve_alias(qualifier)?;
    Some(format!("{}.{}", table, name))
}

fn parse_select_list(list: &str) -> BTreeSet<String> {
    let list = list.trim();
    if list == "*" {
        return BTreeSet::from(["*".to_owned()]);
    }

    let mut columns = BTreeSet::new();
    for item in split_top_level(list) {
        let item = strip_alias(item.trim());
        if item.is_empty() {
            continue;
        }
        if let Some(argument) = function_argument(item) {
            if argument != "*" {
                columns.insert(argument.to_owned());
            }
        }
        columns.insert(item.to_owned());
    }
    columns
}

/// Splits on commas that are not nested inside parentheses.
fn split_top_level(list: &str) -> Vec<&str> {
    let mut items = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items
}

fn strip_alias(item: &str) -> &str {
    Parser::parse(Rule::aliased_item, item)
        .ok()
        .and_then(|mut pairs| pairs.next())
        .and_then(|pair| find_inner(pair, Rule::item_expr))
        .map(|expr| expr.as_str().trim())
        .unwrap_or(item)
}

/// The argument of `item` when the whole item is a single function call.
fn function_argument(item: &str) -> Option<&str> {
    let call = Parser::parse(Rule::function_call, item).ok()?.next()?;
    let argument = find_inner(call, Rule::call_argument)?.as_str().trim();
    balanced(argument).then(|| argument)
}

fn balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

fn find_inner(pair: Pair<'_>, rule: Rule) -> Option<Pair<'_>> {
    pair.into_inner().find(|inner| inner.as_rule() == rule)
}

fn parse_table_ref(pair: Pair<'_>) -> (String, Option<String>) {
    assert_eq!(pair.as_rule(), Rule::table_ref);
    let mut name = String::new();
    let mut alias = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            // Schema-qualified names resolve to their last segment.
            Rule::table_name => {
                name = inner.as_str().rsplit('.').next().unwrap_or_default().to_owned()
            }
            Rule::alias => alias = Some(inner.as_str().to_owned()),
            _ => {}
        }
    }
    (name, alias)
}

fn parse_base_table(from_clause: &str) -> Option<(String, Option<String>)> {
    let base = Parser::parse(Rule::base_table, from_clause).ok()?.next()?;
    find_inner(base, Rule::table_ref).map(parse_table_ref)
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct JoinClause {
    table: String,
    alias: Option<String>,
    left: String,
    right: String,
}

impl From<Pair<'_>> for JoinClause {
    fn from(pair: Pair<'_>) -> Self {
        assert_eq!(pair.as_rule(), Rule::join_clause);
        let mut table = (String::new(), None);
        let mut sides = vec![];
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::table_ref => table = parse_table_ref(inner),
                Rule::column_ref => sides.push(inner.as_str().to_owned()),
                _ => {}
            }
        }
        let mut sides = sides.into_iter();
        Self {
            table: table.0,
            alias: table.1,
            left: sides.next().unwrap_or_default(),
            right: sides.next().unwrap_or_default(),
        }
    }
}

fn parse_joins(from_clause: &str) -> Vec<JoinClause> {
    match Parser::parse(Rule::join_scan, from_clause) {
        Ok(mut pairs) => pairs
            .next()
            .into_iter()
            .flat_map(|scan| scan.into_inner())
            .filter(|pair| pair.as_rule() == Rule::join_clause)
            .map(JoinClause::from)
            .collect(),
        Err(_) => vec![],
    }
}
