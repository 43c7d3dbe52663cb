//! End-to-end scenarios S1-S6 from the transform spec, asserting the SQL
//! shapes a full `compile()` call produces for representative Cypher
//! queries spanning property access, variable-length relationships, WITH,
//! UNWIND, and the PageRank family.

use cyprsql::compile;
use similar_asserts::assert_eq as sim_eq;

#[test]
fn s1_property_equality_match_picks_property_rooted_from() {
    let (sql, params) = compile("MATCH (n:Person {name: 'Alice'}) RETURN n.age").unwrap();
    assert!(sql.contains(r#"AS "n.age""#), "sql: {sql}");
    assert!(sql.contains("FROM node_props_text AS _prop__gql_default_alias_0"), "sql: {sql}");
    assert!(sql.contains("JOIN property_keys AS _pk__gql_default_alias_0"), "sql: {sql}");
    assert!(sql.contains("_pk__gql_default_alias_0.key = 'name'"), "sql: {sql}");
    assert!(sql.contains("_prop__gql_default_alias_0.value = 'Alice'"), "sql: {sql}");
    assert!(sql.contains("JOIN nodes AS _gql_default_alias_0"), "sql: {sql}");
    assert!(sql.contains("JOIN node_labels"), "sql: {sql}");
    assert!(sql.contains("label = 'Person'"), "sql: {sql}");
    assert!(params.is_empty());
}

#[test]
fn s2_varlen_relationship_emits_recursive_cte_before_the_body() {
    let (sql, _) = compile("MATCH (a)-[:KNOWS*1..3]->(b) RETURN a, b").unwrap();
    assert!(sql.starts_with("WITH RECURSIVE _varlen_path_0 AS (SELECT e.source_id AS start_id"), "sql: {sql}");
    assert!(sql.contains("FROM edges e WHERE 1 = 1 AND e.type = 'KNOWS'"), "sql: {sql}");
    assert!(sql.contains("UNION ALL"), "sql: {sql}");
    assert!(sql.contains("JOIN edges e ON e.source_id = _varlen_path_0.end_id"), "sql: {sql}");
    assert!(sql.contains("_varlen_path_0.depth < 3"), "sql: {sql}");
    assert!(sql.contains("NOT LIKE"), "sql: {sql}");
    assert!(sql.contains("_varlen_path_0.start_id = _gql_default_alias_0.id"), "sql: {sql}");
}

#[test]
fn s3_with_aggregate_installs_group_by_and_rebinds_as_projected() {
    let (sql, _) = compile("MATCH (n) WITH n, count(*) AS c WHERE c > 5 RETURN n, c").unwrap();
    assert!(sql.starts_with("WITH _with_0 AS (SELECT"), "sql: {sql}");
    assert!(sql.contains("COUNT(*) AS c"), "sql: {sql}");
    assert!(sql.contains("GROUP BY"), "sql: {sql}");
    assert!(sql.contains("FROM _with_0"), "sql: {sql}");
    assert!(sql.contains("_with_0.c > 5"), "sql: {sql}");
    assert!(sql.contains("_with_0.n AS n"), "sql: {sql}");
    assert!(sql.contains("_with_0.c AS c"), "sql: {sql}");
}

#[test]
fn with_non_aggregate_function_does_not_install_a_group_by() {
    let (sql, _) = compile("MATCH (n) WITH n, toUpper(n.name) AS upperName RETURN upperName").unwrap();
    assert!(sql.contains("UPPER("), "sql: {sql}");
    assert!(!sql.contains("GROUP BY"), "sql: {sql}");
}

#[test]
fn s4_unwind_literal_list_becomes_union_all_cte() {
    let (sql, _) = compile("UNWIND [1,2,3] AS x RETURN x").unwrap();
    sim_eq!(
        sql,
        "WITH _unwind_0 AS (SELECT 1 AS value UNION ALL SELECT 2 AS value UNION ALL SELECT 3 AS value) \
SELECT _unwind_0.value AS x FROM _unwind_0"
    );
}

#[test]
fn s5_pagerank_unrolls_into_fixed_iteration_series() {
    let (sql, _) = compile("RETURN pageRank()").unwrap();
    for cte in ["_pagerank_0_nc", "_pagerank_0_od", "_pagerank_0_pr0", "_pagerank_0_pr20"] {
        assert!(sql.contains(cte), "missing {cte} in: {sql}");
    }
    assert!(sql.contains("json_group_array(json_object('node_id', node_id, 'score', score))"), "sql: {sql}");
    assert!(sql.contains("ORDER BY score DESC"), "sql: {sql}");
}

#[test]
fn s6_null_check_wraps_comparison_context_property_access() {
    let (sql, _) = compile("MATCH (n) RETURN n.age IS NOT NULL").unwrap();
    assert!(sql.contains("IS NOT NULL"), "sql: {sql}");
    assert!(sql.contains("COALESCE("), "sql: {sql}");
}

#[test]
fn match_with_where_and_order_by_limit() {
    let (sql, params) = compile(
        "MATCH (n:Person) WHERE n.age > $minAge RETURN n.name ORDER BY n.name DESC LIMIT 10",
    )
    .unwrap();
    assert!(sql.contains("ORDER BY"), "sql: {sql}");
    assert!(sql.contains("DESC"), "sql: {sql}");
    assert!(sql.contains("LIMIT 10"), "sql: {sql}");
    assert_eq!(params, vec!["minAge".to_string()]);
}

#[test]
fn skip_without_limit_fills_in_limit_negative_one() {
    let (sql, _) = compile("MATCH (n) RETURN n.id SKIP 5").unwrap();
    assert!(sql.contains("LIMIT -1"), "sql: {sql}");
    assert!(sql.contains("OFFSET 5"), "sql: {sql}");
}

#[test]
fn create_emits_insert_statements_joined_by_semicolons() {
    let (sql, _) = compile("CREATE (n:Person {name: 'Bob'})-[:KNOWS]->(m:Person {name: 'Carol'})").unwrap();
    assert!(sql.contains("INSERT INTO nodes DEFAULT VALUES"), "sql: {sql}");
    assert!(sql.contains("INSERT INTO node_labels"), "sql: {sql}");
    assert!(sql.contains("INSERT INTO edges"), "sql: {sql}");
    assert!(sql.contains("; "), "sql: {sql}");
}

#[test]
fn delete_detach_cascades_edge_and_node_deletes() {
    let (sql, _) = compile("MATCH (n:Person) DETACH DELETE n").unwrap();
    assert!(sql.contains("DELETE FROM edges WHERE source_id"), "sql: {sql}");
    assert!(sql.contains("DELETE FROM nodes WHERE id"), "sql: {sql}");
}

#[test]
fn parameter_repeated_twice_dedups_to_one_slot() {
    let (_, params) = compile("MATCH (n) WHERE n.age > $x AND n.score > $x RETURN n.id").unwrap();
    assert_eq!(params, vec!["x".to_string()]);
}

#[test]
fn list_comprehension_translates_to_json_group_array_over_json_each() {
    let (sql, _) = compile("RETURN [x IN [1,2,3] WHERE x > 1 | x * 2] AS doubled").unwrap();
    assert!(sql.contains("json_group_array"), "sql: {sql}");
    assert!(sql.contains("json_each("), "sql: {sql}");
}

#[test]
fn reduce_expression_emits_a_recursive_cte() {
    let (sql, _) = compile("RETURN reduce(total = 0, x IN [1,2,3] | total + x) AS total").unwrap();
    assert!(sql.starts_with("WITH RECURSIVE"), "sql: {sql}");
    assert!(sql.contains("json_array_length"), "sql: {sql}");
}

#[test]
fn unsupported_function_surfaces_a_named_error() {
    let err = compile("RETURN notARealFunction(1)").unwrap_err();
    assert!(err.to_string().contains("notARealFunction"), "err: {err}");
}

#[test]
fn unknown_variable_in_return_surfaces_a_named_error() {
    let err = compile("MATCH (n) RETURN m.name").unwrap_err();
    assert!(err.to_string().contains('m'), "err: {err}");
}

#[test]
fn load_csv_is_not_implemented() {
    let err = compile("LOAD CSV FROM 'file.csv' AS row RETURN row").unwrap_err();
    assert!(err.to_string().to_lowercase().contains("load csv"), "err: {err}");
}

#[test]
fn union_all_concatenates_two_branches_textually() {
    let (sql, _) = compile("MATCH (n) RETURN n.id AS id UNION ALL MATCH (m) RETURN m.id AS id").unwrap();
    assert!(sql.contains(" UNION ALL "), "sql: {sql}");
}
