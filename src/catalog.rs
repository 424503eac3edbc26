use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CatalogError;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

pub type DbAlias = String;

/// A toy database as described by the database pack.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSchema {
    pub alias: DbAlias,
    #[serde(default)]
    pub title: String,
    pub tables: Vec<TableDef>,
    /// Statements that create and populate the tables, run on mount.
    #[serde(default)]
    pub setup: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<String>,
}

/// Source of database schemas. Stays `Pending` until a pack has been loaded;
/// lookups on a pending loader behave as if nothing is available.
#[derive(Clone, Debug, Default)]
pub enum SchemaLoader {
    #[default]
    Pending,
    Ready(Vec<DatabaseSchema>),
}

impl SchemaLoader {
    pub fn from_schemas(schemas: Vec<DatabaseSchema>) -> Result<Self> {
        if let Some(alias) = schemas.iter().map(|s| &s.alias).duplicates().next() {
            return Err(CatalogError::DuplicateDatabase(alias.clone()));
        }
        Ok(Self::Ready(schemas))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_schemas(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn get(&self, alias: &str) -> Option<&DatabaseSchema> {
        self.all().find(|schema| schema.alias == alias)
    }

    pub fn all(&self) -> impl Iterator<Item = &DatabaseSchema> {
        let schemas: &[DatabaseSchema] = match self {
            Self::Pending => &[],
            Self::Ready(schemas) => schemas,
        };
        schemas.iter()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<String>,
    pub db_alias: DbAlias,
}

impl TableSchema {
    /// The column's declared spelling, matched case-insensitively.
    pub fn column(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collision {
    pub table: String,
    /// Database that owned the table until the mount replaced it.
    pub previous_db: DbAlias,
}

#[derive(Clone, Debug)]
pub struct MountReport {
    pub alias: DbAlias,
    pub tables: Vec<String>,
    pub collisions: Vec<Collision>,
}

/// The live set of mounted tables.
///
/// Table names are unique across databases; mounting a database whose table
/// names clash with already mounted ones hands those tables to the newcomer.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    /// Keyed by lower-cased table name.
    tables: BTreeMap<String, TableSchema>,
    mounted: Vec<DbAlias>,
}

impl Catalog {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn tables_of<'a>(&'a self, alias: &'a str) -> impl Iterator<Item = &'a TableSchema> {
        self.tables().filter(move |table| table.db_alias == alias)
    }

    pub fn is_mounted(&self, alias: &str) -> bool {
        self.mounted.iter().any(|mounted| mounted == alias)
    }

    pub fn mounted_databases(&self) -> &[DbAlias] {
        &self.mounted
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Tables of `schema` that would replace a table owned by another database.
    pub fn collisions(&self, schema: &DatabaseSchema) -> Vec<Collision> {
        schema
            .tables
            .iter()
            .filter_map(|def| self.table(&def.name))
            .filter(|existing| existing.db_alias != schema.alias)
            .map(|existing| Collision {
                table: existing.name.clone(),
                previous_db: existing.db_alias.clone(),
            })
            .collect()
    }

    pub fn mount(&mut self, schema: &DatabaseSchema) -> Result<MountReport> {
        if self.is_mounted(&schema.alias) {
            return Err(CatalogError::AlreadyMounted(schema.alias.clone()));
        }

        let collisions = self.collisions(schema);
        for collision in &collisions {
            warn!(
                table = %collision.table,
                previous = %collision.previous_db,
                mounted = %schema.alias,
                "table name collision, the newly mounted database wins"
            );
        }

        for def in &schema.tables {
            self.tables.insert(
                def.name.to_ascii_lowercase(),
                TableSchema {
                    name: def.name.clone(),
                    columns: def.columns.clone(),
                    db_alias: schema.alias.clone(),
                },
            );
        }
        self.mounted.push(schema.alias.clone());
        debug!(alias = %schema.alias, tables = schema.tables.len(), "mounted database");

        Ok(MountReport {
            alias: schema.alias.clone(),
            tables: schema.tables.iter().map(|def| def.name.clone()).collect(),
            collisions,
        })
    }

    /// Removes the database and every table it still owns. Returns the names
    /// of the removed tables.
    pub fn unmount(&mut self, alias: &str) -> Result<Vec<String>> {
        let position = self
            .mounted
            .iter()
            .position(|mounted| mounted == alias)
            .ok_or_else(|| CatalogError::NotMounted(alias.to_owned()))?;
        self.mounted.remove(position);

        let mut removed = vec![];
        self.tables.retain(|_, table| {
            if table.db_alias == alias {
                removed.push(table.name.clone());
                false
            } else {
                true
            }
        });
        debug!(alias, tables = removed.len(), "unmounted database");
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.mounted.clear();
    }
}
