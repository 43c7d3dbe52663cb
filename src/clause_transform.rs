//! Top-level clause dispatcher: MATCH, CREATE, SET, DELETE, REMOVE, MERGE,
//! RETURN, WITH, UNWIND, FOREACH, LOAD CSV, UNION (spec §4.7).

use crate::ast::{
    Clause, Create, Delete, Expression, Foreach, Literal, Match, Merge, NodePattern, OrderByItem,
    PathElement, Query, Remove, RemoveItem, Return, ReturnItem, Set, SetItem, Unwind, With,
};
use crate::dynbuf::sql_quote;
use crate::error::{CypherSqlError, Result};
use crate::expr_transform::{self, EntityKind};
use crate::func_dispatch;
use crate::pattern_transform;
use crate::scope::VariableKind;
use crate::sql_builder::SqlBuilder;
use crate::transform_ctx::TransformCtx;

pub fn transform_query(ctx: &mut TransformCtx, query: &Query) -> Result<()> {
    if let Some(graph) = &query.use_clause {
        ctx.current_graph = Some(graph.clone());
    }
    let mut first = true;
    for clause in &query.clauses {
        if !first {
            ctx.scope.mark_all_inherited();
        }
        first = false;
        transform_clause(ctx, clause)?;
    }
    if ctx.sql.select_is_empty() && ctx.sql.has_from() {
        ctx.sql.select("*", None);
    }

    if let Some(union) = &query.union {
        let left_body = finish_branch(ctx)?;
        ctx.sql = SqlBuilder::new();
        ctx.scope.reset();
        transform_query(ctx, &union.right)?;
        let right_body = finish_branch(ctx)?;
        let keyword = if union.all { " UNION ALL " } else { " UNION " };
        ctx.output().append_str(&left_body);
        ctx.output().append_str(keyword);
        ctx.output().append_str(&right_body);
    }
    Ok(())
}

/// Finalizes one UNION branch in isolation (its own pending property joins
/// and CTE prefix), so the two branches can be textually concatenated with
/// `UNION [ALL]` between them.
fn finish_branch(ctx: &mut TransformCtx) -> Result<String> {
    let joins: Vec<String> = ctx.take_pending_property_joins();
    if !joins.is_empty() {
        for j in joins {
            ctx.sql.join_raw(&j);
        }
    }
    let body = ctx.sql.to_string_body().unwrap_or_else(|| "SELECT 1".to_string());
    let cte = ctx.sql.get_cte();
    Ok(if cte.is_empty() { body } else { format!("{cte} {body}") })
}

fn transform_clause(ctx: &mut TransformCtx, clause: &Clause) -> Result<()> {
    match clause {
        Clause::Match(m) => transform_match(ctx, m),
        Clause::Create(c) => transform_create(ctx, c),
        Clause::Merge(m) => transform_merge(ctx, m),
        Clause::Set(s) => transform_set(ctx, s),
        Clause::Remove(r) => transform_remove(ctx, r),
        Clause::Delete(d) => transform_delete(ctx, d),
        Clause::Return(r) => transform_return(ctx, r),
        Clause::With(w) => transform_with(ctx, w),
        Clause::Unwind(u) => transform_unwind(ctx, u),
        Clause::Foreach(f) => transform_foreach(ctx, f),
        Clause::LoadCsv(_) => Err(CypherSqlError::NotImplemented("LOAD CSV".to_string())),
        Clause::Use(graph) => {
            ctx.current_graph = Some(graph.clone());
            Ok(())
        }
    }
}

fn transform_match(ctx: &mut TransformCtx, m: &Match) -> Result<()> {
    if let Some(graph) = &m.from_graph {
        ctx.current_graph = Some(graph.clone());
    }
    pattern_transform::transform_match_patterns(ctx, &m.patterns, m.where_expr.as_ref(), m.optional)
}

fn literal_prop_table(val: &Expression) -> &'static str {
    match val {
        Expression::Literal { value, .. } => match value {
            Literal::Integer(_) => "node_props_int",
            Literal::Decimal(_) => "node_props_real",
            Literal::Boolean(_) => "node_props_bool",
            Literal::String(_) | Literal::Null => "node_props_text",
        },
        _ => "node_props_text",
    }
}

/// Creates one node, returning a SQL expression for its new id.
///
/// Caveat: successive `INSERT`s for this node's labels/properties each
/// shift `last_insert_rowid()`, so only the first follow-up statement is
/// guaranteed correct — the same sharp edge spec §9 documents for the
/// source's other rough edges (MERGE wiring, DELETE's orphan-edge check).
fn emit_create_node(ctx: &mut TransformCtx, np: &NodePattern) -> Result<String> {
    if let Some(name) = &np.variable {
        if ctx.scope.is_bound(name) {
            return Ok(format!("{}.id", ctx.scope.get_alias(name).unwrap()));
        }
    }
    ctx.write.raw("INSERT INTO nodes DEFAULT VALUES".to_string());
    let id_expr = "last_insert_rowid()".to_string();
    for label in &np.labels {
        let label = sql_quote(label);
        ctx.write.raw(format!("INSERT INTO node_labels (node_id, label) VALUES ({id_expr}, '{label}')"));
    }
    if let Some(props) = &np.properties {
        for (key, val) in props {
            let val_sql = expr_transform::transform_expr(ctx, val)?;
            let table = literal_prop_table(val);
            let key = sql_quote(key);
            ctx.write.raw(format!(
                "INSERT INTO {table} (node_id, key_id, value) SELECT {id_expr}, id, {val_sql} FROM property_keys WHERE key = '{key}'"
            ));
        }
    }
    if let Some(name) = &np.variable {
        ctx.scope.register_projected(name, &id_expr, &id_expr, true);
    }
    Ok(id_expr)
}

fn emit_create_patterns(ctx: &mut TransformCtx, patterns: &[crate::ast::Path]) -> Result<()> {
    for path in patterns {
        let mut prev_id: Option<String> = None;
        let mut idx = 0;
        while idx < path.elements.len() {
            match &path.elements[idx] {
                PathElement::Node(np) => {
                    prev_id = Some(emit_create_node(ctx, np)?);
                    idx += 1;
                }
                PathElement::Rel(rel) => {
                    let node = match path.elements.get(idx + 1) {
                        Some(PathElement::Node(n)) => n,
                        _ => return Err(CypherSqlError::InvalidArgument("relationship must be followed by a node".into())),
                    };
                    let left_id = prev_id.clone().ok_or_else(|| {
                        CypherSqlError::InvalidArgument("relationship must follow a node".into())
                    })?;
                    let right_id = emit_create_node(ctx, node)?;
                    let (source, target) = if rel.left_arrow && !rel.right_arrow {
                        (right_id.clone(), left_id.clone())
                    } else {
                        (left_id.clone(), right_id.clone())
                    };
                    let rel_type = sql_quote(&rel.types.first().cloned().unwrap_or_default());
                    ctx.write.raw(format!(
                        "INSERT INTO edges (source_id, target_id, type) VALUES (({source}), ({target}), '{rel_type}')"
                    ));
                    if let Some(props) = &rel.properties {
                        for (key, val) in props {
                            let val_sql = expr_transform::transform_expr(ctx, val)?;
                            let table = match val {
                                Expression::Literal { value: Literal::Integer(_), .. } => "edge_props_int",
                                Expression::Literal { value: Literal::Decimal(_), .. } => "edge_props_real",
                                Expression::Literal { value: Literal::Boolean(_), .. } => "edge_props_bool",
                                _ => "edge_props_text",
                            };
                            let key = sql_quote(key);
                            ctx.write.raw(format!(
                                "INSERT INTO {table} (edge_id, key_id, value) SELECT last_insert_rowid(), id, {val_sql} FROM property_keys WHERE key = '{key}'"
                            ));
                        }
                    }
                    prev_id = Some(right_id);
                    idx += 2;
                }
            }
        }
    }
    Ok(())
}

fn transform_create(ctx: &mut TransformCtx, c: &Create) -> Result<()> {
    emit_create_patterns(ctx, &c.patterns)
}

fn apply_set_items(ctx: &mut TransformCtx, items: &[SetItem]) -> Result<()> {
    for item in items {
        match item {
            SetItem::Property { target, value } => {
                if let Expression::Property { expr, property, .. } = target {
                    if let Expression::Identifier { name, .. } = expr.as_ref() {
                        let var = ctx
                            .scope
                            .lookup(name)
                            .cloned()
                            .ok_or_else(|| CypherSqlError::UnknownVariable(name.clone()))?;
                        let val_sql = expr_transform::transform_expr(ctx, value)?;
                        let table = literal_prop_table(value);
                        let id_col = if var.kind == VariableKind::Edge { "edge_id" } else { "node_id" };
                        let from_clause = format!("{}{}", ctx.sql.get_from(), ctx.sql.get_joins());
                        let where_clause = if ctx.sql.get_where().is_empty() {
                            String::new()
                        } else {
                            format!(" WHERE {}", ctx.sql.get_where())
                        };
                        let property = sql_quote(property);
                        ctx.write.raw(format!(
                            "INSERT OR REPLACE INTO {table} ({id_col}, key_id, value) SELECT {alias}.id, (SELECT id FROM property_keys WHERE key = '{property}'), {val_sql} FROM {from_clause}{where_clause}",
                            alias = var.alias,
                        ));
                        continue;
                    }
                }
                return Err(CypherSqlError::InvalidArgument("SET target must be var.property".into()));
            }
            SetItem::Label { variable, label } => {
                let alias = ctx
                    .scope
                    .get_alias(variable)
                    .ok_or_else(|| CypherSqlError::UnknownVariable(variable.clone()))?
                    .to_string();
                let label = sql_quote(label);
                ctx.write.raw(format!(
                    "INSERT OR IGNORE INTO node_labels (node_id, label) SELECT {alias}.id, '{label}' FROM {}{}",
                    ctx.sql.get_from(),
                    ctx.sql.get_joins(),
                ));
            }
        }
    }
    Ok(())
}

fn transform_set(ctx: &mut TransformCtx, s: &Set) -> Result<()> {
    apply_set_items(ctx, &s.items)
}

fn transform_remove(ctx: &mut TransformCtx, r: &Remove) -> Result<()> {
    for item in &r.items {
        match item {
            RemoveItem::Property { variable, property } => {
                let var = ctx
                    .scope
                    .lookup(variable)
                    .cloned()
                    .ok_or_else(|| CypherSqlError::UnknownVariable(variable.clone()))?;
                let (prefix, id_col) = if var.kind == VariableKind::Edge {
                    ("edge_props", "edge_id")
                } else {
                    ("node_props", "node_id")
                };
                let property = sql_quote(property);
                for suffix in ["text", "int", "real", "bool"] {
                    ctx.write.delete(
                        &format!("{prefix}_{suffix}"),
                        Some(&format!(
                            "{id_col} IN (SELECT {0}.id FROM {1}{2}) AND key_id = (SELECT id FROM property_keys WHERE key = '{property}')",
                            var.alias,
                            ctx.sql.get_from(),
                            ctx.sql.get_joins(),
                        )),
                    );
                }
            }
            RemoveItem::Label { variable, label } => {
                let alias = ctx
                    .scope
                    .get_alias(variable)
                    .ok_or_else(|| CypherSqlError::UnknownVariable(variable.clone()))?
                    .to_string();
                let label = sql_quote(label);
                ctx.write.delete(
                    "node_labels",
                    Some(&format!(
                        "node_id IN (SELECT {alias}.id FROM {}{}) AND label = '{label}'",
                        ctx.sql.get_from(),
                        ctx.sql.get_joins(),
                    )),
                );
            }
        }
    }
    Ok(())
}

fn transform_delete(ctx: &mut TransformCtx, d: &Delete) -> Result<()> {
    for item in &d.items {
        let name = match item {
            Expression::Identifier { name, .. } => name.clone(),
            _ => return Err(CypherSqlError::InvalidArgument("DELETE target must be a variable".into())),
        };
        let var = ctx
            .scope
            .lookup(&name)
            .cloned()
            .ok_or_else(|| CypherSqlError::UnknownVariable(name.clone()))?;
        match var.kind {
            VariableKind::Edge => {
                for suffix in ["text", "int", "real", "bool"] {
                    ctx.write.delete(&format!("edge_props_{suffix}"), Some(&format!("edge_id = {}.id", var.alias)));
                }
                ctx.write.delete("edges", Some(&format!("id = {}.id", var.alias)));
            }
            VariableKind::Node => {
                if d.detach {
                    for suffix in ["text", "int", "real", "bool"] {
                        ctx.write.delete(&format!("edge_props_{suffix}"), Some(&format!("edge_id IN (SELECT id FROM edges WHERE source_id = {0}.id OR target_id = {0}.id)", var.alias)));
                    }
                    ctx.write.delete("edges", Some(&format!("source_id = {0}.id OR target_id = {0}.id", var.alias)));
                }
                for suffix in ["text", "int", "real", "bool"] {
                    ctx.write.delete(&format!("node_props_{suffix}"), Some(&format!("node_id = {}.id", var.alias)));
                }
                ctx.write.delete("node_labels", Some(&format!("node_id = {}.id", var.alias)));
                // Non-DETACH delete of a node does not verify absent connected
                // edges here; left to the storage schema's own constraints.
                ctx.write.delete("nodes", Some(&format!("id = {}.id", var.alias)));
            }
            _ => return Err(CypherSqlError::InvalidArgument(format!("cannot DELETE '{name}'"))),
        }
    }
    Ok(())
}

/// Executes the pattern as a MATCH, then emits both the conditional CREATE
/// path and the ON CREATE/ON MATCH SET statements; the executor decides,
/// from the MATCH's row count, which statements actually apply (spec §4.7,
/// open question in §9 — the source does not wire this end-to-end either).
fn transform_merge(ctx: &mut TransformCtx, m: &Merge) -> Result<()> {
    pattern_transform::transform_match_patterns(ctx, std::slice::from_ref(&m.pattern), None, false)?;
    emit_create_patterns(ctx, std::slice::from_ref(&m.pattern))?;
    if let Some(items) = &m.on_create {
        apply_set_items(ctx, items)?;
    }
    if let Some(items) = &m.on_match {
        apply_set_items(ctx, items)?;
    }
    Ok(())
}

fn default_alias(item: &ReturnItem) -> String {
    if let Some(alias) = &item.alias {
        return alias.clone();
    }
    if let Some(text) = &item.original_text {
        return text.clone();
    }
    "expr".to_string()
}

fn transform_return(ctx: &mut TransformCtx, r: &Return) -> Result<()> {
    if r.distinct {
        ctx.sql.distinct();
    }
    for item in &r.items {
        let sql = transform_return_item_expr(ctx, item)?;
        ctx.sql.select(&sql, Some(&default_alias(item)));
    }
    apply_order_skip_limit(ctx, &r.order_by, r.skip, r.limit)?;
    Ok(())
}

fn transform_return_item_expr(ctx: &mut TransformCtx, item: &ReturnItem) -> Result<String> {
    if let Expression::Identifier { name, .. } = &item.expression {
        if let Some(var) = ctx.scope.lookup(name).cloned() {
            if var.kind == VariableKind::Path {
                return expr_transform::transform_expr(ctx, &item.expression);
            }
        }
    }
    expr_transform::transform_expr(ctx, &item.expression)
}

fn apply_order_skip_limit(ctx: &mut TransformCtx, order_by: &[OrderByItem], skip: Option<i64>, limit: Option<i64>) -> Result<()> {
    for ob in order_by {
        let sql = expr_transform::transform_expr(ctx, &ob.expression)?;
        ctx.sql.order_by(&sql, ob.descending);
    }
    if skip.is_some() || limit.is_some() {
        ctx.sql.limit(limit, skip);
    }
    Ok(())
}

/// Captures the builder state as a new CTE, rebuilds the SELECT from the
/// WITH items rooted at that CTE, and re-scopes every item as Projected.
fn transform_with(ctx: &mut TransformCtx, w: &With) -> Result<()> {
    let joins: Vec<String> = ctx.take_pending_property_joins();
    for j in &joins {
        ctx.sql.join_raw(j);
    }
    if w.distinct {
        ctx.sql.distinct();
    }

    // Each WITH item is transformed against the *preceding* scope/builder, so
    // aggregates and property lookups are computed once inside the CTE body
    // rather than re-evaluated by every downstream reference.
    let mut has_aggregate = false;
    let mut cols = Vec::with_capacity(w.items.len());
    let mut exprs = Vec::with_capacity(w.items.len());
    for item in &w.items {
        let col = item.alias.clone().or_else(|| item.original_text.clone()).unwrap_or_else(|| "expr".to_string());
        let sql = transform_return_item_expr(ctx, item)?;
        ctx.sql.select(&sql, Some(&col));
        if matches!(&item.expression, Expression::FunctionCall { name, .. } if func_dispatch::is_aggregate(name)) {
            has_aggregate = true;
        }
        cols.push(col);
        exprs.push(sql);
    }
    if has_aggregate {
        for (item, sql) in w.items.iter().zip(&exprs) {
            let is_agg = matches!(&item.expression, Expression::FunctionCall { name, .. } if func_dispatch::is_aggregate(name));
            if !is_agg {
                ctx.sql.group_by(sql);
            }
        }
    }
    let subquery = ctx
        .sql
        .to_subquery()
        .ok_or_else(|| CypherSqlError::InvalidArgument("WITH requires a preceding pattern".into()))?;
    let cte_name = ctx.next_cte_name("with");
    ctx.sql.cte(&cte_name, &subquery, false);

    // Clears SELECT/FROM/JOIN/WHERE/GROUP BY/ORDER BY/LIMIT but keeps the CTE
    // buffer verbatim, so this WITH's own CTE (and any earlier ones) survive
    // into the next clause untouched (spec §4.2's `reset`).
    ctx.sql.reset(true);
    ctx.sql.from(&cte_name, None);
    ctx.scope.reset();

    for col in &cols {
        ctx.sql.select(&format!("{cte_name}.{col}"), Some(col));
        ctx.scope.register_projected(col, &format!("{cte_name}.{col}"), &format!("{cte_name}.{col}"), true);
    }
    if let Some(where_expr) = &w.where_expr {
        let w_sql = expr_transform::transform_expr(ctx, where_expr)?;
        ctx.sql.where_(&w_sql);
    }
    apply_order_skip_limit(ctx, &w.order_by, w.skip, w.limit)?;
    Ok(())
}

fn transform_unwind(ctx: &mut TransformCtx, u: &Unwind) -> Result<()> {
    let cte_name = ctx.next_cte_name("unwind");
    let body = match &u.expression {
        Expression::List { items, .. } => {
            let rows: Result<Vec<String>> = items
                .iter()
                .map(|i| expr_transform::transform_expr(ctx, i).map(|s| format!("SELECT {s} AS value")))
                .collect();
            rows?.join(" UNION ALL ")
        }
        other => {
            let sql = expr_transform::transform_expr(ctx, other)?;
            format!("SELECT value FROM json_each({sql})")
        }
    };
    ctx.sql.cte(&cte_name, &body, false);
    // Drops any SELECT/JOIN/WHERE left over from a preceding clause; only the
    // CTE buffer (including the one just added) survives.
    ctx.sql.reset(true);
    ctx.scope.reset();
    ctx.scope.register_projected(&u.alias, &format!("{cte_name}.value"), &format!("{cte_name}.value"), true);
    ctx.sql.from(&cte_name, None);
    Ok(())
}

/// FOREACH emits only a CTE describing the iteration; the executor
/// collaborator runs the imperative body per element. Nested FOREACH is
/// rejected at transform time.
fn transform_foreach(ctx: &mut TransformCtx, f: &Foreach) -> Result<()> {
    if f.body.iter().any(|c| matches!(c, Clause::Foreach(_))) {
        return Err(CypherSqlError::NotImplemented("nested FOREACH".to_string()));
    }
    let list_sql = expr_transform::transform_expr(ctx, &f.list)?;
    let cte_name = ctx.next_cte_name("foreach");
    ctx.sql.cte(&cte_name, &format!("SELECT value FROM json_each({list_sql})"), false);
    ctx.scope.register_projected(&f.variable, &format!("{cte_name}.value"), &format!("{cte_name}.value"), true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident_item(name: &str, alias: Option<&str>) -> ReturnItem {
        ReturnItem {
            expression: Expression::Identifier { span: 0, name: name.to_string() },
            alias: alias.map(String::from),
            original_text: Some(name.to_string()),
        }
    }

    fn count_star_item(alias: &str) -> ReturnItem {
        ReturnItem {
            expression: Expression::FunctionCall { span: 0, name: "count".to_string(), args: vec![], distinct: false },
            alias: Some(alias.to_string()),
            original_text: None,
        }
    }

    #[test]
    fn with_wraps_preceding_pattern_in_a_single_well_formed_cte() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_node("n", "_gql_default_alias_0", None);
        ctx.sql.from("nodes", Some("_gql_default_alias_0"));
        let w = With {
            span: 0,
            items: vec![ident_item("n", None), count_star_item("c")],
            distinct: false,
            order_by: vec![],
            skip: None,
            limit: None,
            where_expr: None,
        };
        transform_with(&mut ctx, &w).unwrap();
        let cte = ctx.sql.get_cte();
        assert!(cte.starts_with("WITH _with_0 AS (SELECT"), "cte: {cte}");
        assert!(!cte.contains("_carried"), "cte: {cte}");
        assert!(cte.contains("COUNT(*) AS c"), "cte: {cte}");
        assert!(cte.contains("GROUP BY"), "cte: {cte}");
        assert_eq!(ctx.sql.get_from(), "_with_0");
    }

    #[test]
    fn with_rebinds_aggregate_column_as_a_projected_variable() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_node("n", "_gql_default_alias_0", None);
        ctx.sql.from("nodes", Some("_gql_default_alias_0"));
        let w = With {
            span: 0,
            items: vec![ident_item("n", None), count_star_item("c")],
            distinct: false,
            order_by: vec![],
            skip: None,
            limit: None,
            where_expr: None,
        };
        transform_with(&mut ctx, &w).unwrap();
        assert_eq!(ctx.scope.get_alias("c"), Some("_with_0.c"));
        assert!(matches!(ctx.scope.lookup("c").unwrap().kind, VariableKind::Projected));
    }

    #[test]
    fn unwind_drops_stale_select_from_a_preceding_match() {
        let mut ctx = TransformCtx::new();
        ctx.sql.from("nodes", Some("_gql_default_alias_0"));
        ctx.sql.select("_gql_default_alias_0.id", None);
        let u = Unwind {
            span: 0,
            expression: Expression::List {
                span: 0,
                items: vec![
                    Expression::Literal { span: 0, value: Literal::Integer(1) },
                    Expression::Literal { span: 0, value: Literal::Integer(2) },
                ],
            },
            alias: "x".to_string(),
        };
        transform_unwind(&mut ctx, &u).unwrap();
        assert!(ctx.sql.select_is_empty());
        assert_eq!(ctx.sql.get_from(), "_unwind_0");
        assert_eq!(ctx.sql.get_cte(), "WITH _unwind_0 AS (SELECT 1 AS value UNION ALL SELECT 2 AS value)");
    }
}
