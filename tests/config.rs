//! End-to-end: YAML config -> aggregation -> plan

mod common;

use common::{load_fixture, ScriptedExecutor};

use collate::Statement;

#[test]
fn test_fixture_builds_aggregation() {
    let config = load_fixture("transactions.yaml");
    let st = config.build().unwrap();

    assert_eq!(st.get_table_name(Some("entity_id")), "\"features\".\"txn_entity_id\"");
    assert_eq!(st.get_table_name(None), "\"features\".\"txn_aggregation\"");
    assert_eq!(st.dates(), &["2013-01-01", "2014-01-01"]);
}

#[test]
fn test_fixture_selects() {
    let st = load_fixture("transactions.yaml").build().unwrap();
    let selects = st.get_selects();
    assert_eq!(selects.len(), 1);
    let (_, queries) = &selects[0];
    assert_eq!(queries.len(), 2);

    let sql = queries[0].to_sql();
    assert!(sql.contains("'2013-01-01'::date AS \"as_of_date\""));
    assert!(sql.contains("event_date < '2013-01-01'"));
    assert!(sql.contains("event_date >= '2011-01-01'::date"));
    // distinct survives the trip through config
    assert!(sql.contains("count(distinct merchant_id)"));
    // all three intervals expanded
    assert!(sql.contains("\"txn_entity_id_6 month_amount_sum\""));
    assert!(sql.contains("\"txn_entity_id_1 year_amount_sum\""));
    assert!(sql.contains("\"txn_entity_id_all_amount_sum\""));
    // the "all" interval suppresses the greatest() lower bound
    assert!(!sql.contains("greatest"));
}

#[test]
fn test_fixture_validation_round_trips() {
    let st = load_fixture("transactions.yaml").build().unwrap();
    let mut executor = ScriptedExecutor::new();
    st.validate(&mut executor).unwrap();
    // two dates x two bounded intervals ("all" is skipped)
    assert_eq!(executor.queries.len(), 4);
    assert!(executor
        .queries
        .iter()
        .all(|q| q.contains("< '2011-01-01'::date")));
}

#[test]
fn test_fixture_execute_plan() {
    let st = load_fixture("transactions.yaml").build().unwrap();
    let mut executor = ScriptedExecutor::new();
    st.execute(&mut executor).unwrap();
    assert_eq!(executor.begins, 1);
    assert_eq!(executor.commits, 1);
    // schema, drop, create, 2 inserts, index, final drop, final create
    assert_eq!(executor.executed.len(), 8);
    assert_eq!(executor.executed[0], "CREATE SCHEMA IF NOT EXISTS features");
    assert!(executor.executed[7].starts_with("CREATE TABLE \"features\".\"txn_aggregation\""));
}

#[test]
fn test_fixture_imputation_rules() {
    let st = load_fixture("transactions.yaml").build().unwrap();
    let rules = st.get_imputation_rules();
    // (2 amount + 1 merchant + 3 status) columns x 3 intervals
    assert_eq!(rules.len(), 18);
    let columns: Vec<String> = rules.iter().map(|(c, _)| c.clone()).collect();
    let (impute, nonimpute) = columns.split_at(6);
    let create = st
        .get_impute_create(impute, nonimpute)
        .unwrap();
    assert!(matches!(create, Statement::CreateTableAs { .. }));
    assert!(create
        .to_sql()
        .starts_with("CREATE TABLE \"features\".\"txn_aggregation_imputed\" AS ("));
}
