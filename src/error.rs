use thiserror::Error;

use crate::mission::MissionId;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("the database catalog is still loading")]
    NotReady,

    #[error("unknown database {0:?}")]
    UnknownDatabase(String),

    #[error("database {0:?} is already mounted")]
    AlreadyMounted(String),

    #[error("database {0:?} is not mounted")]
    NotMounted(String),

    #[error("duplicate database alias {0:?} in the database pack")]
    DuplicateDatabase(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Sql(#[from] rusqlite::Error),

    #[error("nothing to run: the query is empty")]
    EmptyQuery,

    #[error("only one statement can be run at a time")]
    MultipleStatements,

    #[error("failed to mount {alias:?}: {source}")]
    Mount {
        alias: String,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Error, Debug)]
pub enum MissionError {
    #[error("unknown mission {0}")]
    UnknownMission(MissionId),

    #[error("mission {0} is defined more than once")]
    DuplicateMission(MissionId),

    #[error("mission {id} has difficulty {difficulty}, expected 0-5")]
    InvalidDifficulty { id: MissionId, difficulty: u8 },

    #[error("mission {id} has invalid validation criteria: {reason}")]
    InvalidCriteria { id: MissionId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced to the player by the game controller. None of them change
/// mission progress.
#[derive(Error, Debug)]
pub enum GameError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Mission(#[from] MissionError),

    #[error("no mission is loaded")]
    NoMission,

    #[error("the current step is not solved yet")]
    NotSolved,

    #[error("the next mission is already on its way")]
    AdvancePending,
}
