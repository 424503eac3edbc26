mod diagram;
mod validation;

use std::time::Duration;

use serde_json::Value;

use crate::catalog::{Catalog, SchemaLoader};
use crate::engine::{QueryOutcome, Row, SqliteEngine};
use crate::game::{Game, GameConfig};
use crate::mission::MissionCatalog;

const DATABASES: &str = r#"
[
    {
        "alias": "galaxy1",
        "tables": [
            { "name": "stars", "columns": ["id", "name", "temperature"] },
            { "name": "planets", "columns": ["id", "star_id", "name", "mass"] }
        ],
        "setup": [
            "CREATE TABLE stars (id INTEGER PRIMARY KEY, name TEXT, temperature INTEGER)",
            "INSERT INTO stars VALUES (1, 'Sol', 5778), (2, 'Sirius', 9940), (3, 'Vega', 9602)",
            "CREATE TABLE planets (id INTEGER PRIMARY KEY, star_id INTEGER, name TEXT, mass REAL)",
            "INSERT INTO planets VALUES (1, 1, 'Earth', 1.0), (2, 1, 'Jupiter', 317.8), (3, 3, 'Vega I', 2.5), (4, 1, 'Mars', 0.1)"
        ]
    },
    {
        "alias": "galaxy2",
        "tables": [
            { "name": "stars", "columns": ["id", "name"] },
            { "name": "nebulae", "columns": ["id", "name", "star_id"] }
        ],
        "setup": [
            "CREATE TABLE stars (id INTEGER PRIMARY KEY, name TEXT)",
            "INSERT INTO stars VALUES (1, 'Rigel'), (2, 'Deneb')",
            "CREATE TABLE nebulae (id INTEGER PRIMARY KEY, name TEXT, star_id INTEGER)"
        ]
    },
    {
        "alias": "hq",
        "tables": [
            { "name": "missions", "columns": ["id", "title"] }
        ],
        "setup": [
            "CREATE TABLE missions (id INTEGER PRIMARY KEY, title TEXT)",
            "INSERT INTO missions VALUES (0, 'Mount'), (1, 'Stars'), (2, 'Planets')"
        ]
    },
    {
        "alias": "broken",
        "tables": [
            { "name": "comets", "columns": ["id"] }
        ],
        "setup": [
            "CREATE TABLE comets (id INTEGER)",
            "INSERT INTO nowhere VALUES (1)"
        ]
    }
]
"#;

const MISSIONS: &str = r#"
[
    {
        "id": 0,
        "title": "Mount the charts",
        "difficulty": 0,
        "points": 10,
        "dbAlias": "galaxy1",
        "skipAutoMount": true,
        "validationCriteria": { "databaseMounted": true, "requiredDatabase": "galaxy1" }
    },
    {
        "id": 1,
        "title": "Stars",
        "difficulty": 1,
        "points": 20,
        "dbAlias": "galaxy1",
        "hint": "Look at the stars table.",
        "validationCriteria": { "expectedRows": 3, "mustContainColumns": ["name"] }
    },
    {
        "id": 2,
        "title": "Planets",
        "difficulty": 2,
        "points": 30,
        "dbAlias": "galaxy1",
        "hint": "Mission hint",
        "submissions": [
            {
                "title": "All planets",
                "validationCriteria": { "expectedRows": 4 }
            },
            {
                "title": "Heavy planets",
                "hint": "Use WHERE",
                "validationCriteria": {
                    "expectedRows": 2,
                    "filters": [{ "column": "mass", "operator": ">", "value": 1 }]
                }
            }
        ]
    },
    {
        "id": 3,
        "title": "Free play",
        "difficulty": 1,
        "points": 5,
        "dbAlias": "galaxy1",
        "nextMissionId": 7
    },
    {
        "id": 4,
        "title": "Mission log",
        "difficulty": 1,
        "points": 15,
        "dbAlias": "hq",
        "relaxedRowCount": true,
        "validationCriteria": { "expectedRows": 2, "mustContainColumns": ["title"], "keywords": ["missions"] }
    }
]
"#;

fn loader() -> SchemaLoader {
    SchemaLoader::from_json(DATABASES).unwrap()
}

fn missions() -> MissionCatalog {
    MissionCatalog::from_json(MISSIONS).unwrap()
}

fn catalog(aliases: &[&str]) -> Catalog {
    let loader = loader();
    let mut catalog = Catalog::default();
    for alias in aliases {
        catalog.mount(loader.get(alias).unwrap()).unwrap();
    }
    catalog
}

fn game_with_delay(advance_delay: Duration) -> Game {
    Game::new(
        SqliteEngine::open_in_memory().unwrap(),
        loader(),
        missions(),
        GameConfig { advance_delay },
    )
}

fn game() -> Game {
    game_with_delay(Duration::ZERO)
}

fn rows(value: Value) -> QueryOutcome {
    QueryOutcome::Rows(serde_json::from_value::<Vec<Row>>(value).unwrap())
}
