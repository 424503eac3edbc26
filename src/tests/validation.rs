use serde_json::{json, Value};

use super::{catalog, rows};
use crate::catalog::Catalog;
use crate::criteria::{Check, Criteria, RawCriteria};
use crate::engine::QueryOutcome;
use crate::validation::{validate, Failure};

fn criteria(raw: Value) -> Criteria {
    let raw: RawCriteria = serde_json::from_value(raw).unwrap();
    Criteria::compile(Some(&raw), "galaxy1", false).unwrap()
}

fn relaxed(raw: Value) -> Criteria {
    let raw: RawCriteria = serde_json::from_value(raw).unwrap();
    Criteria::compile(Some(&raw), "galaxy1", true).unwrap()
}

fn passes(criteria: &Criteria, query: &str, outcome: &QueryOutcome) -> bool {
    validate(criteria, query, outcome, &Catalog::default()).solved()
}

fn points(values: &[Option<i64>]) -> QueryOutcome {
    rows(Value::Array(
        values.iter().map(|v| json!({ "points": v })).collect(),
    ))
}

#[test]
fn test_expected_rows_is_exact() {
    let criteria = criteria(json!({ "expectedRows": 3 }));
    let q = "SELECT * FROM stars";
    assert!(!passes(&criteria, q, &points(&[])));
    assert!(!passes(&criteria, q, &points(&[Some(1), Some(2)])));
    assert!(!passes(&criteria, q, &points(&[Some(1), Some(2), Some(3), Some(4)])));
    assert!(passes(&criteria, q, &points(&[Some(1), Some(2), Some(3)])));

    let verdict = validate(&criteria, q, &points(&[Some(1)]), &Catalog::default());
    assert_eq!(
        verdict.failures,
        vec![Failure::RowCount {
            expected: 3,
            actual: 1
        }]
    );
}

#[test]
fn test_zero_expected_rows_is_checked() {
    let criteria = criteria(json!({ "expectedRows": 0, "mustContainColumns": ["name"] }));
    assert!(passes(&criteria, "", &rows(json!([]))));
    assert!(!passes(&criteria, "", &rows(json!([{ "name": "Sol" }]))));
}

#[test]
fn test_ordered_descending() {
    let criteria = criteria(json!({ "ordered": true, "orderColumn": "points", "orderDirection": "desc" }));
    assert!(passes(&criteria, "", &points(&[Some(90), Some(50), Some(50)])));
    assert!(!passes(&criteria, "", &points(&[Some(10), Some(90)])));
}

#[test]
fn test_ordered_skips_nulls() {
    let criteria = criteria(json!({ "ordered": true, "orderColumn": "points" }));
    assert!(passes(&criteria, "", &points(&[Some(1), None, Some(5), None, Some(5)])));
    assert_eq!(
        validate(&criteria, "", &points(&[Some(3), None, Some(2)]), &Catalog::default()).failures,
        vec![Failure::OutOfOrder {
            column: "points".to_owned(),
            row: 2
        }]
    );
}

#[test]
fn test_legacy_nested_order() {
    let criteria = criteria(json!({ "ordered": { "column": "points", "direction": "desc" } }));
    assert!(passes(&criteria, "", &points(&[Some(3), Some(2)])));
    assert!(!passes(&criteria, "", &points(&[Some(2), Some(3)])));
}

#[test]
fn test_ordered_without_column_is_rejected() {
    let raw: RawCriteria = serde_json::from_value(json!({ "ordered": true })).unwrap();
    assert!(Criteria::compile(Some(&raw), "galaxy1", false).is_err());

    let raw: RawCriteria = serde_json::from_value(json!({ "ordered": false })).unwrap();
    assert_eq!(
        Criteria::compile(Some(&raw), "galaxy1", false).unwrap(),
        Criteria::Results {
            checks: vec![],
            keywords: vec![]
        }
    );
}

#[test]
fn test_filters() {
    let criteria = criteria(json!({
        "filters": [
            { "column": "mass", "operator": ">", "value": 1 },
            { "column": "name", "operator": "!=", "value": "Earth" }
        ]
    }));
    assert!(passes(
        &criteria,
        "",
        &rows(json!([{ "name": "Jupiter", "mass": 317.8 }, { "name": "Vega I", "mass": "2.5" }]))
    ));
    assert!(!passes(
        &criteria,
        "",
        &rows(json!([{ "name": "Jupiter", "mass": 317.8 }, { "name": "Mars", "mass": 0.1 }]))
    ));
    // A null cell fails whatever the operator.
    assert!(!passes(&criteria, "", &rows(json!([{ "name": "Pluto", "mass": null }]))));
    assert!(!passes(&criteria, "", &rows(json!([{ "name": "Pluto" }]))));
}

#[test]
fn test_filter_operators() {
    let row = rows(json!([{ "n": 5, "s": "b" }]));
    for (operator, value, expected) in [
        (">=", json!(5), true),
        ("<=", json!(5), true),
        ("<", json!(5), false),
        ("=", json!(5.0), true),
        ("!=", json!(5), false),
        ("=", json!("5"), true),
    ] {
        let c = criteria(json!({ "filters": [{ "column": "n", "operator": operator, "value": value }] }));
        assert_eq!(passes(&c, "", &row), expected, "n {} {}", operator, value);
    }

    let c = criteria(json!({ "filters": [{ "column": "s", "operator": ">", "value": "a" }] }));
    assert!(passes(&c, "", &row));
    let c = criteria(json!({ "filters": [{ "column": "s", "operator": "=", "value": 1 }] }));
    assert!(!passes(&c, "", &row));
}

#[test]
fn test_must_contain_columns() {
    let criteria = criteria(json!({ "mustContainColumns": ["Stars.NAME", "temperature"] }));
    assert!(passes(&criteria, "", &rows(json!([{ "name": "Sol", "Temperature": 5778 }]))));
    assert_eq!(
        validate(&criteria, "", &rows(json!([{ "name": "Sol" }])), &Catalog::default()).failures,
        vec![Failure::MissingColumn("temperature".to_owned())]
    );
    assert_eq!(
        validate(&criteria, "", &rows(json!([])), &Catalog::default()).failures,
        vec![Failure::NoRows]
    );
}

#[test]
fn test_exact_match() {
    let criteria = criteria(json!({ "exactMatch": [{ "name": "Sol", "t": 5778 }, { "name": "Vega", "t": 9602 }] }));
    assert!(passes(
        &criteria,
        "",
        &rows(json!([{ "t": 5778.0, "name": "Sol" }, { "name": "Vega", "t": 9602 }]))
    ));
    assert!(!passes(
        &criteria,
        "",
        &rows(json!([{ "name": "Vega", "t": 9602 }, { "name": "Sol", "t": 5778 }]))
    ));
    assert!(!passes(
        &criteria,
        "",
        &rows(json!([{ "name": "Sol", "t": 5778, "extra": 1 }, { "name": "Vega", "t": 9602 }]))
    ));
}

#[test]
fn test_keywords_are_checked_last() {
    let criteria = criteria(json!({ "expectedRows": 1, "keywords": ["order by", "LIMIT"] }));
    let one = rows(json!([{ "x": 1 }]));
    assert!(!passes(&criteria, "select x from t Order  By x limit 1", &one));
    assert!(passes(&criteria, "select x from t ORDER BY x limit 1", &one));

    let verdict = validate(&criteria, "select x from t", &rows(json!([])), &Catalog::default());
    assert_eq!(
        verdict.failures,
        vec![
            Failure::RowCount {
                expected: 1,
                actual: 0
            },
            Failure::MissingKeyword("order by".to_owned()),
            Failure::MissingKeyword("LIMIT".to_owned()),
        ]
    );
}

#[test]
fn test_statements_never_satisfy_row_criteria() {
    let criteria = criteria(json!({}));
    assert_eq!(
        validate(&criteria, "DELETE FROM stars", &QueryOutcome::Affected(3), &Catalog::default())
            .failures,
        vec![Failure::NotARowResult]
    );
    assert!(passes(&criteria, "SELECT 1", &rows(json!([{ "1": 1 }]))));
}

#[test]
fn test_missing_criteria_pass() {
    let criteria = Criteria::compile(None, "galaxy1", false).unwrap();
    assert_eq!(criteria, Criteria::AutoPass);
    assert!(passes(&criteria, "DROP TABLE stars", &QueryOutcome::Affected(0)));
}

#[test]
fn test_database_mounted_ignores_the_query() {
    let criteria = criteria(json!({ "databaseMounted": true, "requiredDatabase": "galaxy1", "expectedRows": 9 }));
    assert_eq!(
        criteria,
        Criteria::DatabaseMounted {
            database: "galaxy1".to_owned()
        }
    );

    let mounted = catalog(&["galaxy1"]);
    let elsewhere = catalog(&["galaxy2"]);
    for query in ["", "SELECT 1", "nonsense"] {
        let outcome = rows(json!([]));
        assert!(validate(&criteria, query, &outcome, &mounted).solved());
        assert!(!validate(&criteria, query, &outcome, &elsewhere).solved());
    }

    // Without `requiredDatabase` the mission's own database is meant.
    let raw: RawCriteria = serde_json::from_value(json!({ "databaseMounted": true })).unwrap();
    assert_eq!(
        Criteria::compile(Some(&raw), "hq", false).unwrap().required_database(),
        Some("hq")
    );
}

#[test]
fn test_relaxed_row_count() {
    let criteria = relaxed(json!({ "expectedRows": 2, "mustContainColumns": ["title"], "keywords": ["missions"] }));
    match &criteria {
        Criteria::Results { checks, .. } => assert_eq!(checks[0], Check::NonEmpty),
        other => panic!("unexpected criteria {:?}", other),
    }

    let q = "SELECT title FROM missions";
    let many = rows(json!([{ "title": "a" }, { "title": "b" }, { "title": "c" }]));
    assert!(passes(&criteria, q, &many));
    assert!(!passes(&criteria, q, &rows(json!([]))));
    assert!(!passes(&criteria, "SELECT title FROM log", &many));
    assert!(!passes(&criteria, q, &rows(json!([{ "name": "a" }]))));
}

#[test]
fn test_nested_order_with_flat_key_names() {
    let criteria = criteria(json!({ "ordered": { "orderColumn": "points", "orderDirection": "desc" } }));
    assert!(passes(&criteria, "", &points(&[Some(90), Some(50), Some(50)])));
    assert!(!passes(&criteria, "", &points(&[Some(10), Some(90)])));

    let missions = crate::mission::MissionCatalog::from_json(
        r#"[{
            "id": 1, "title": "Ranking", "difficulty": 1, "points": 5, "dbAlias": "hq",
            "validationCriteria": { "ordered": { "orderColumn": "points", "orderDirection": "desc" } }
        }]"#,
    )
    .unwrap();
    assert_eq!(missions.get(1).unwrap().main.criteria, criteria);
}
