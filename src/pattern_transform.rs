//! Translates node/relationship patterns into FROM/JOIN/WHERE (spec §4.6).

use crate::ast::{Expression, Literal, NodePattern, Path, PathElement, PathKind, RelPattern};
use crate::dynbuf::sql_quote;
use crate::error::{CypherSqlError, Result};
use crate::expr_transform::{self, EntityKind};
use crate::sql_builder::{JoinKind, SqlBuilder};
use crate::transform_ctx::TransformCtx;

pub struct PathFragments {
    pub from: String,
    pub joins: String,
    pub where_: Option<String>,
}

/// Walks every pattern in a MATCH, adding joins to `ctx.sql`, then applies
/// the optional WHERE expression.
pub fn transform_match_patterns(
    ctx: &mut TransformCtx,
    patterns: &[Path],
    where_expr: Option<&Expression>,
    optional: bool,
) -> Result<()> {
    for path in patterns {
        walk_path_into_ctx(ctx, path, optional)?;
    }
    if let Some(w) = where_expr {
        let w_sql = expr_transform::transform_expr(ctx, w)?;
        ctx.sql.where_(&w_sql);
    }
    Ok(())
}

/// Walks one pattern into a throwaway builder and returns its FROM/JOIN/
/// WHERE fragments, for EXISTS and pattern/list comprehension embedding.
/// Outer-scope identifiers the pattern names are reused (their existing
/// alias is returned without emitting a new join); anything new gets a
/// fresh alias registered for the duration of the caller's own expression.
pub fn collect_path_fragments(ctx: &mut TransformCtx, path: &Path) -> Result<PathFragments> {
    let mut sub = SqlBuilder::new();
    walk_path(ctx, path, &mut sub, false, path.kind)?;
    Ok(PathFragments {
        from: sub.get_from().to_string(),
        joins: sub.get_joins().to_string(),
        where_: if sub.get_where().is_empty() { None } else { Some(sub.get_where().to_string()) },
    })
}

fn walk_path_into_ctx(ctx: &mut TransformCtx, path: &Path, optional: bool) -> Result<()> {
    let mut sql = std::mem::take(&mut ctx.sql);
    let result = walk_path(ctx, path, &mut sql, optional, path.kind);
    ctx.sql = sql;
    result
}

fn walk_path(ctx: &mut TransformCtx, path: &Path, sql: &mut SqlBuilder, optional: bool, kind: PathKind) -> Result<()> {
    if path.elements.is_empty() {
        return Ok(());
    }
    let first_node = match &path.elements[0] {
        PathElement::Node(n) => n,
        PathElement::Rel(_) => {
            return Err(CypherSqlError::InvalidArgument("path must start with a node".into()))
        }
    };
    let mut prev_alias = join_node(ctx, sql, first_node, optional)?;
    let mut elem_aliases = vec![prev_alias.clone()];
    let mut idx = 1;
    while idx < path.elements.len() {
        let rel = match &path.elements[idx] {
            PathElement::Rel(r) => r,
            PathElement::Node(_) => {
                return Err(CypherSqlError::InvalidArgument("expected relationship between nodes".into()))
            }
        };
        let node = match path.elements.get(idx + 1) {
            Some(PathElement::Node(n)) => n,
            _ => return Err(CypherSqlError::InvalidArgument("relationship must be followed by a node".into())),
        };
        let right_alias = if let Some(varlen) = rel.varlen {
            join_varlen_relationship(ctx, sql, rel, varlen, &prev_alias, node, optional, kind)?
        } else {
            join_relationship(ctx, sql, rel, &prev_alias, node, optional)?
        };
        elem_aliases.push(right_alias.clone());
        prev_alias = right_alias;
        idx += 2;
    }
    if let Some(name) = &path.variable {
        ctx.scope.register_path(name, &elem_aliases.join(","), path.elements.clone());
    }
    Ok(())
}

fn literal_table_for(expr: &Expression) -> &'static str {
    match expr {
        Expression::Literal { value, .. } => match value {
            Literal::Integer(_) => "node_props_int",
            Literal::Decimal(_) => "node_props_real",
            Literal::Boolean(_) => "node_props_bool",
            Literal::String(_) | Literal::Null => "node_props_text",
        },
        _ => "node_props_text",
    }
}

/// Joins a node pattern. The very first table added to the whole query
/// becomes the FROM root; everything after is a JOIN. When the node both
/// roots the query and carries inline properties, the first property pair
/// picks a property-table-rooted join chain (narrows cardinality before
/// reaching `nodes`); every other property pair — on this node or any
/// later one — becomes a WHERE constraint via the correlated COALESCE
/// subquery, matching spec §4.6's "remaining pairs become WHERE".
fn join_node(ctx: &mut TransformCtx, sql: &mut SqlBuilder, np: &NodePattern, optional: bool) -> Result<String> {
    if let Some(name) = &np.variable {
        if ctx.scope.is_bound(name) {
            return Ok(ctx.scope.get_alias(name).unwrap().to_string());
        }
    }
    let alias = ctx.next_alias();
    let is_root = !sql.has_from();
    let mut remaining_props: &[(String, Expression)] = &[];

    if is_root {
        match np.properties.as_deref().filter(|p| !p.is_empty()) {
            Some(props) => {
                let (key, val) = &props[0];
                let key = sql_quote(key);
                let val_sql = expr_transform::transform_expr(ctx, val)?;
                let prop_table = literal_table_for(val);
                let prop_alias = format!("_prop_{alias}");
                let pk_alias = format!("_pk_{alias}");
                sql.from(prop_table, Some(&prop_alias));
                sql.join(
                    JoinKind::Inner,
                    "property_keys",
                    Some(&pk_alias),
                    Some(&format!(
                        "{pk_alias}.id = {prop_alias}.key_id AND {pk_alias}.key = '{key}' AND {prop_alias}.value = {val_sql}"
                    )),
                );
                sql.join(JoinKind::Inner, "nodes", Some(&alias), Some(&format!("{alias}.id = {prop_alias}.node_id")));
                remaining_props = &props[1..];
            }
            None => sql.from("nodes", Some(&alias)),
        }
    } else {
        let (kind, on) = if optional { (JoinKind::Left, Some("1 = 1")) } else { (JoinKind::Cross, None) };
        sql.join(kind, "nodes", Some(&alias), on);
        if let Some(props) = np.properties.as_deref() {
            remaining_props = props;
        }
    }

    for label in &np.labels {
        let nl_alias = ctx.next_cte_name("nl");
        let label = sql_quote(label);
        sql.join(
            JoinKind::Inner,
            "node_labels",
            Some(&nl_alias),
            Some(&format!("{nl_alias}.node_id = {alias}.id AND {nl_alias}.label = '{label}'")),
        );
    }
    for (key, val) in remaining_props {
        let val_sql = expr_transform::transform_expr(ctx, val)?;
        let access = expr_transform::property_access_sql(EntityKind::Node, &alias, key, true);
        sql.where_(&format!("{access} = {val_sql}"));
    }
    if let Some(name) = &np.variable {
        ctx.scope.register_node(name, &alias, np.labels.first().map(String::as_str));
    }
    Ok(alias)
}

fn type_filter_sql(alias: &str, types: &[String]) -> String {
    if types.is_empty() {
        String::new()
    } else if types.len() == 1 {
        format!(" AND {alias}.type = '{}'", sql_quote(&types[0]))
    } else {
        let alts: Vec<String> = types.iter().map(|t| format!("{alias}.type = '{}'", sql_quote(t))).collect();
        format!(" AND ({})", alts.join(" OR "))
    }
}

fn join_relationship(
    ctx: &mut TransformCtx,
    sql: &mut SqlBuilder,
    rel: &RelPattern,
    left_alias: &str,
    node: &NodePattern,
    optional: bool,
) -> Result<String> {
    let rel_alias = ctx.next_alias();
    let right_alias = ctx.next_alias();
    let (src, tgt) = if rel.left_arrow && !rel.right_arrow {
        (right_alias.clone(), left_alias.to_string())
    } else {
        (left_alias.to_string(), right_alias.clone())
    };
    let mut cond = format!("{rel_alias}.source_id = {src}.id AND {rel_alias}.target_id = {tgt}.id");
    cond.push_str(&type_filter_sql(&rel_alias, &rel.types));

    let join_kind = if optional { JoinKind::Left } else { JoinKind::Inner };
    sql.join(join_kind, "edges", Some(&rel_alias), Some(&cond));
    let node_on = if tgt == right_alias {
        format!("{right_alias}.id = {rel_alias}.target_id")
    } else {
        format!("{right_alias}.id = {rel_alias}.source_id")
    };
    sql.join(join_kind, "nodes", Some(&right_alias), Some(&node_on));

    for label in &node.labels {
        let nl_alias = ctx.next_cte_name("nl");
        let label = sql_quote(label);
        sql.join(
            JoinKind::Inner,
            "node_labels",
            Some(&nl_alias),
            Some(&format!("{nl_alias}.node_id = {right_alias}.id AND {nl_alias}.label = '{label}'")),
        );
    }
    if let Some(props) = &node.properties {
        for (key, val) in props {
            let val_sql = expr_transform::transform_expr(ctx, val)?;
            let access = expr_transform::property_access_sql(EntityKind::Node, &right_alias, key, true);
            sql.where_(&format!("{access} = {val_sql}"));
        }
    }

    if let Some(name) = &rel.variable {
        ctx.scope.register_edge(name, &rel_alias, rel.types.first().map(String::as_str));
    }
    if let Some(name) = &node.variable {
        ctx.scope.register_node(name, &right_alias, node.labels.first().map(String::as_str));
    }
    Ok(right_alias)
}

/// `(a)-[*min..max]->(b)` becomes a recursive CTE with columns
/// `(start_id, end_id, depth, path_ids, visited)`. Cycle detection is a
/// `NOT LIKE '%,id,%'` scan over the comma-delimited `visited` column.
fn join_varlen_relationship(
    ctx: &mut TransformCtx,
    sql: &mut SqlBuilder,
    rel: &RelPattern,
    varlen: crate::ast::VarLenRange,
    left_alias: &str,
    node: &NodePattern,
    optional: bool,
    path_kind: PathKind,
) -> Result<String> {
    let cte_name = ctx.next_cte_name("varlen_path");
    let tf = type_filter_sql("e", &rel.types);
    let base_tf = tf.strip_prefix(" AND ").map(|s| format!(" AND {s}")).unwrap_or_default();
    let body = format!(
        "SELECT e.source_id AS start_id, e.target_id AS end_id, 1 AS depth, \
',' || e.source_id || ',' || e.target_id || ',' AS path_ids, \
',' || e.source_id || ',' || e.target_id || ',' AS visited FROM edges e WHERE 1 = 1{base_tf} \
UNION ALL \
SELECT {cte_name}.start_id, e.target_id, {cte_name}.depth + 1, \
{cte_name}.path_ids || e.target_id || ',', {cte_name}.visited || e.target_id || ',' \
FROM {cte_name} JOIN edges e ON e.source_id = {cte_name}.end_id \
WHERE {cte_name}.depth < {max}{tf} AND {cte_name}.visited NOT LIKE '%,' || e.target_id || ',%'",
        max = varlen.max,
    );
    sql.cte(&cte_name, &body, true);

    let join_kind = if optional { JoinKind::Left } else { JoinKind::Inner };
    sql.join(join_kind, &cte_name, Some(&cte_name), Some(&format!("{cte_name}.start_id = {left_alias}.id")));
    let right_alias = ctx.next_alias();
    sql.join(
        join_kind,
        "nodes",
        Some(&right_alias),
        Some(&format!("{right_alias}.id = {cte_name}.end_id")),
    );
    if varlen.min > 1 {
        sql.where_(&format!("{cte_name}.depth >= {}", varlen.min));
    }
    if matches!(path_kind, PathKind::Shortest | PathKind::AllShortest) {
        sql.where_(&format!(
            "{cte_name}.depth = (SELECT MIN(depth) FROM {cte_name} WHERE start_id = {left_alias}.id AND end_id = {right_alias}.id)"
        ));
    }

    for label in &node.labels {
        let nl_alias = ctx.next_cte_name("nl");
        let label = sql_quote(label);
        sql.join(
            JoinKind::Inner,
            "node_labels",
            Some(&nl_alias),
            Some(&format!("{nl_alias}.node_id = {right_alias}.id AND {nl_alias}.label = '{label}'")),
        );
    }
    if let Some(name) = &rel.variable {
        ctx.scope.register_edge(name, &cte_name, rel.types.first().map(String::as_str));
    }
    if let Some(name) = &node.variable {
        ctx.scope.register_node(name, &right_alias, node.labels.first().map(String::as_str));
    }
    Ok(right_alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodePattern, Path, PathElement};

    fn span0_node(var: &str, labels: Vec<&str>) -> NodePattern {
        NodePattern {
            span: 0,
            variable: Some(var.to_string()),
            labels: labels.into_iter().map(String::from).collect(),
            properties: None,
        }
    }

    #[test]
    fn first_node_becomes_from_root() {
        let mut ctx = TransformCtx::new();
        let path = Path {
            span: 0,
            variable: None,
            elements: vec![PathElement::Node(span0_node("n", vec!["Person"]))],
            kind: PathKind::Normal,
        };
        transform_match_patterns(&mut ctx, &[path], None, false).unwrap();
        assert_eq!(ctx.sql.get_from(), "nodes AS _gql_default_alias_0");
        assert!(ctx.sql.get_joins().contains("node_labels"));
        assert_eq!(ctx.scope.get_alias("n"), Some("_gql_default_alias_0"));
    }

    #[test]
    fn reused_variable_does_not_rejoin() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_node("n", "_gql_default_alias_0", None);
        let path = Path {
            span: 0,
            variable: None,
            elements: vec![PathElement::Node(span0_node("n", vec![]))],
            kind: PathKind::Normal,
        };
        transform_match_patterns(&mut ctx, &[path], None, false).unwrap();
        assert!(!ctx.sql.has_from());
    }

    #[test]
    fn varlen_relationship_emits_recursive_cte() {
        let mut ctx = TransformCtx::new();
        let rel = RelPattern {
            span: 0,
            variable: None,
            types: vec!["KNOWS".into()],
            properties: None,
            left_arrow: false,
            right_arrow: true,
            varlen: Some(crate::ast::VarLenRange { min: 1, max: 3 }),
        };
        let path = Path {
            span: 0,
            variable: None,
            elements: vec![
                PathElement::Node(span0_node("a", vec![])),
                PathElement::Rel(rel),
                PathElement::Node(span0_node("b", vec![])),
            ],
            kind: PathKind::Normal,
        };
        transform_match_patterns(&mut ctx, &[path], None, false).unwrap();
        assert!(ctx.sql.get_cte().starts_with("WITH RECURSIVE _varlen_path_0"));
        assert!(ctx.sql.get_cte().contains("e.type = 'KNOWS'"));
    }
}
