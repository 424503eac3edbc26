use std::collections::BTreeSet;

use super::catalog;
use crate::diagram::plan;
use crate::parse_query_info;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[test]
fn test_no_info_clears_the_diagram() {
    let catalog = catalog(&["galaxy1"]);
    assert!(plan(None, &catalog).is_cleared());

    let info = parse_query_info("SELECT * FROM comets", &catalog).unwrap();
    assert!(plan(Some(&info), &catalog).is_cleared());
}

#[test]
fn test_star_highlights_every_column() {
    let catalog = catalog(&["galaxy1"]);
    let info = parse_query_info("SELECT * FROM stars", &catalog).unwrap();
    let highlight = plan(Some(&info), &catalog);

    assert_eq!(highlight.tables.len(), 1);
    let stars = highlight.table("stars").unwrap();
    assert_eq!(stars.sequence, 1);
    assert_eq!(stars.db_alias, "galaxy1");
    assert_eq!(stars.columns, set(&["id", "name", "temperature"]));
}

#[test]
fn test_unqualified_columns_resolve_against_every_table() {
    let catalog = catalog(&["galaxy1"]);
    let info = parse_query_info(
        "SELECT name, mass FROM planets p JOIN stars s ON p.star_id = s.id",
        &catalog,
    )
    .unwrap();
    let highlight = plan(Some(&info), &catalog);

    let planets = highlight.table("planets").unwrap();
    assert_eq!(planets.sequence, 1);
    assert_eq!(planets.columns, set(&["name", "mass", "star_id"]));

    let stars = highlight.table("stars").unwrap();
    assert_eq!(stars.sequence, 2);
    assert_eq!(stars.columns, set(&["name", "id"]));

    assert_eq!(highlight.joins, info.join_conditions);
}

#[test]
fn test_qualified_columns_only_touch_their_table() {
    let catalog = catalog(&["galaxy1"]);
    let info = parse_query_info(
        "SELECT s.temperature, COUNT(p.id) FROM stars s LEFT JOIN planets p ON p.star_id = s.id",
        &catalog,
    )
    .unwrap();
    let highlight = plan(Some(&info), &catalog);

    assert_eq!(
        highlight.table("stars").unwrap().columns,
        set(&["temperature", "id"])
    );
    assert_eq!(
        highlight.table("planets").unwrap().columns,
        set(&["id", "star_id"])
    );
}
