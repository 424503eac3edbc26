use rusqlite::{types::ValueRef, Batch, Connection, Transaction};
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::DatabaseSchema;
use crate::error::EngineError;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// A result row: column name to cell value, in select-list order.
pub type Row = serde_json::Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    /// DDL/DML statements report how many rows they touched.
    Affected(usize),
}

impl QueryOutcome {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            QueryOutcome::Affected(_) => None,
        }
    }
}

/// The embedded SQL engine the game runs player queries against.
///
/// The rest of the crate only sees rows and error messages; how statements are
/// executed is the engine's business.
pub trait SqlEngine {
    /// Runs a single statement.
    fn execute(&mut self, sql: &str) -> Result<QueryOutcome>;

    /// Creates the tables of `schema`, first dropping the `replaced` tables
    /// that another database owned. Either everything is applied or nothing is.
    fn mount(&mut self, schema: &DatabaseSchema, replaced: &[String]) -> Result<()>;

    fn unmount(&mut self, tables: &[String]) -> Result<()>;
}

pub struct SqliteEngine {
    conn: Connection,
}

impl SqliteEngine {
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn drop_tables(tx: &Transaction<'_>, tables: &[String]) -> rusqlite::Result<()> {
    for table in tables {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_identifier(table)))?;
    }
    Ok(())
}

fn cell_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob: {} bytes>", b.len())),
    }
}

impl SqlEngine for SqliteEngine {
    fn execute(&mut self, sql: &str) -> Result<QueryOutcome> {
        let sql = sql.trim();
        if sql.trim_end_matches(';').trim().is_empty() {
            return Err(EngineError::EmptyQuery);
        }

        let mut batch = Batch::new(&self.conn, sql);
        let mut stmt = batch.next()?.ok_or(EngineError::EmptyQuery)?;
        // Nothing runs unless the text is a single statement.
        if !matches!(batch.next(), Ok(None)) {
            return Err(EngineError::MultipleStatements);
        }
        if stmt.column_count() == 0 {
            let affected = stmt.execute([])?;
            debug!(affected, "statement executed");
            return Ok(QueryOutcome::Affected(affected));
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut result_rows = stmt.query([])?;
        let mut rows = vec![];
        while let Some(row) = result_rows.next()? {
            let mut out = Row::new();
            for (i, column) in columns.iter().enumerate() {
                out.insert(column.clone(), cell_to_json(row.get_ref(i)?));
            }
            rows.push(out);
        }
        debug!(rows = rows.len(), "query executed");
        Ok(QueryOutcome::Rows(rows))
    }

    fn mount(&mut self, schema: &DatabaseSchema, replaced: &[String]) -> Result<()> {
        let apply = |conn: &mut Connection| -> rusqlite::Result<()> {
            let tx = conn.transaction()?;
            drop_tables(&tx, replaced)?;
            for statement in &schema.setup {
                tx.execute_batch(statement)?;
            }
            tx.commit()
        };
        apply(&mut self.conn).map_err(|source| EngineError::Mount {
            alias: schema.alias.clone(),
            source,
        })?;
        info!(alias = %schema.alias, "database loaded into the engine");
        Ok(())
    }

    fn unmount(&mut self, tables: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        drop_tables(&tx, tables)?;
        tx.commit()?;
        Ok(())
    }
}
