pub mod ast;
pub mod catalog;
pub mod criteria;
pub mod diagram;
pub mod engine;
pub mod error;
pub mod game;
pub mod mission;
pub mod parser;
pub mod progression;
pub mod validation;

pub use catalog::{Catalog, SchemaLoader};
pub use engine::{SqlEngine, SqliteEngine};
pub use game::{Game, GameConfig};
pub use mission::MissionCatalog;
pub use parser::parse_query_info;

#[cfg(test)]
mod tests;
