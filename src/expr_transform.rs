//! Recursive translator from expression AST to SQL fragments (spec §4.5).
//!
//! `transform_expr` walks depth-first and returns the rendered fragment as
//! an owned `String`; callers decide which `SqlBuilder` buffer it lands in
//! (select list, WHERE condition, a JOIN's ON clause, ...).

use crate::ast::{
    BinaryOperator, Expression, ExistsForm, Literal, ListPredicateKind, MapProjectionItem, Path,
};
use crate::dynbuf::{ident_safe, sql_quote};
use crate::error::{CypherSqlError, Result};
use crate::func_dispatch;
use crate::pattern_transform;
use crate::scope::VariableKind;
use crate::transform_ctx::TransformCtx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Edge,
}

impl EntityKind {
    fn id_column(self) -> &'static str {
        match self {
            EntityKind::Node => "node_id",
            EntityKind::Edge => "edge_id",
        }
    }

    fn table_prefix(self) -> &'static str {
        match self {
            EntityKind::Node => "node_props",
            EntityKind::Edge => "edge_props",
        }
    }
}

/// `(SELECT COALESCE(...) FROM property_keys pk LEFT JOIN <4 typed tables> ...
/// WHERE pk.key = '<prop>')`. In comparison context the four typed values
/// are left distinct (SQLite doesn't need same-typed COALESCE arguments);
/// outside comparison, non-text values are coerced to TEXT and booleans map
/// to the literal strings `'true'`/`'false'`.
pub fn property_access_sql(kind: EntityKind, alias: &str, prop: &str, in_comparison: bool) -> String {
    let id_col = kind.id_column();
    let prefix = kind.table_prefix();
    let suffix = ident_safe(prop);
    let npt = format!("_{prefix}_text_{alias}_{suffix}");
    let npi = format!("_{prefix}_int_{alias}_{suffix}");
    let npr = format!("_{prefix}_real_{alias}_{suffix}");
    let npb = format!("_{prefix}_bool_{alias}_{suffix}");
    let coalesce = if in_comparison {
        format!("COALESCE({npt}.value, {npi}.value, {npr}.value, {npb}.value)")
    } else {
        format!(
            "COALESCE({npt}.value, CAST({npi}.value AS TEXT), CAST({npr}.value AS TEXT), CASE {npb}.value WHEN 1 THEN 'true' WHEN 0 THEN 'false' END)"
        )
    };
    let prop = sql_quote(prop);
    format!(
        "(SELECT {coalesce} FROM property_keys pk \
LEFT JOIN {prefix}_text {npt} ON {npt}.{id_col} = {alias}.id AND {npt}.key_id = pk.id \
LEFT JOIN {prefix}_int {npi} ON {npi}.{id_col} = {alias}.id AND {npi}.key_id = pk.id \
LEFT JOIN {prefix}_real {npr} ON {npr}.{id_col} = {alias}.id AND {npr}.key_id = pk.id \
LEFT JOIN {prefix}_bool {npb} ON {npb}.{id_col} = {alias}.id AND {npb}.key_id = pk.id \
WHERE pk.key = '{prop}')"
    )
}

fn property_exists_sql(kind: EntityKind, alias: &str, prop: &str) -> String {
    let prop = &sql_quote(prop);
    let id_col = kind.id_column();
    let prefix = kind.table_prefix();
    ["text", "int", "real", "bool"]
        .iter()
        .map(|t| {
            format!(
                "EXISTS (SELECT 1 FROM {prefix}_{t} v JOIN property_keys pk ON pk.id = v.key_id WHERE v.{id_col} = {alias}.id AND pk.key = '{prop}')"
            )
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn node_json_object_sql(ctx: &mut TransformCtx, alias: &str) -> Result<String> {
    Ok(format!(
        "json_object('id', {alias}.id, 'labels', (SELECT json_group_array(label) FROM node_labels WHERE node_id = {alias}.id), 'properties', {})",
        all_properties_json(ctx, EntityKind::Node, alias)
    ))
}

fn edge_json_object_sql(ctx: &mut TransformCtx, alias: &str) -> Result<String> {
    Ok(format!(
        "json_object('id', {alias}.id, 'type', {alias}.type, 'startNodeId', {alias}.source_id, 'endNodeId', {alias}.target_id, 'properties', {})",
        all_properties_json(ctx, EntityKind::Edge, alias)
    ))
}

fn all_properties_json(_ctx: &mut TransformCtx, kind: EntityKind, alias: &str) -> String {
    let id_col = kind.id_column();
    let prefix = kind.table_prefix();
    format!(
        "(SELECT json_group_object(pk.key, COALESCE(npt.value, CAST(npi.value AS TEXT), CAST(npr.value AS TEXT), CASE npb.value WHEN 1 THEN 'true' WHEN 0 THEN 'false' END)) \
FROM property_keys pk \
LEFT JOIN {prefix}_text npt ON npt.{id_col} = {alias}.id AND npt.key_id = pk.id \
LEFT JOIN {prefix}_int npi ON npi.{id_col} = {alias}.id AND npi.key_id = pk.id \
LEFT JOIN {prefix}_real npr ON npr.{id_col} = {alias}.id AND npr.key_id = pk.id \
LEFT JOIN {prefix}_bool npb ON npb.{id_col} = {alias}.id AND npb.key_id = pk.id \
WHERE COALESCE(npt.value, npi.value, npr.value, npb.value) IS NOT NULL)"
    )
}

fn literal_sql(lit: &Literal) -> String {
    match lit {
        Literal::Integer(i) => i.to_string(),
        Literal::Decimal(f) => f.to_string(),
        Literal::String(s) => format!("'{}'", s.replace('\'', "''")),
        Literal::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
        Literal::Null => "NULL".to_string(),
    }
}

pub fn transform_expr(ctx: &mut TransformCtx, expr: &Expression) -> Result<String> {
    match expr {
        Expression::Literal { value, .. } => Ok(literal_sql(value)),

        Expression::Identifier { name, .. } => transform_identifier(ctx, name),

        Expression::Parameter { name, .. } => match name {
            Some(n) => Ok(ctx.add_param(n)),
            None => Ok("?".to_string()),
        },

        Expression::Property { expr, property, .. } => transform_property(ctx, expr, property),

        Expression::LabelExpr { expr, label, .. } => {
            let base = transform_expr(ctx, expr)?;
            let label = sql_quote(label);
            Ok(format!(
                "EXISTS (SELECT 1 FROM node_labels WHERE node_id = {base}.id AND label = '{label}')"
            ))
        }

        Expression::NotExpr { expr, .. } => {
            let inner = transform_expr(ctx, expr)?;
            Ok(format!("NOT ({inner})"))
        }

        Expression::NullCheck { expr, is_not, .. } => {
            let inner = transform_expr(ctx, expr)?;
            Ok(format!("{inner} IS {}NULL", if *is_not { "NOT " } else { "" }))
        }

        Expression::BinaryOp { op, left, right, .. } => transform_binary_op(ctx, *op, left, right),

        Expression::FunctionCall { name, args, distinct, .. } => {
            func_dispatch::dispatch(ctx, name, args, *distinct)
        }

        Expression::Exists { form, .. } => transform_exists(ctx, form),

        Expression::ListPredicate { kind, variable, list, predicate, .. } => {
            transform_list_predicate(ctx, *kind, variable, list, predicate)
        }

        Expression::Reduce { accumulator, initial, variable, list, expr, .. } => {
            transform_reduce(ctx, accumulator, initial, variable, list, expr)
        }

        Expression::ListComprehension { variable, list, where_expr, transform, .. } => {
            transform_list_comprehension(ctx, variable, list, where_expr.as_deref(), transform.as_deref())
        }

        Expression::PatternComprehension { pattern, where_expr, collect, .. } => {
            transform_pattern_comprehension(ctx, pattern, where_expr.as_deref(), collect)
        }

        Expression::Case { whens, else_expr, .. } => {
            let mut sql = String::from("CASE");
            for w in whens {
                let cond = transform_expr(ctx, &w.condition)?;
                let res = transform_expr(ctx, &w.result)?;
                sql.push_str(&format!(" WHEN {cond} THEN {res}"));
            }
            if let Some(e) = else_expr {
                let e_sql = transform_expr(ctx, e)?;
                sql.push_str(&format!(" ELSE {e_sql}"));
            }
            sql.push_str(" END");
            Ok(sql)
        }

        Expression::Map { entries, .. } => {
            let mut parts = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let v_sql = transform_expr(ctx, v)?;
                parts.push(format!("'{}', {v_sql}", sql_quote(k)));
            }
            Ok(format!("json_object({})", parts.join(", ")))
        }

        Expression::MapProjection { variable, items, .. } => transform_map_projection(ctx, variable, items),

        Expression::List { items, .. } => {
            let mut parts = Vec::with_capacity(items.len());
            for i in items {
                parts.push(transform_expr(ctx, i)?);
            }
            Ok(format!("json_array({})", parts.join(", ")))
        }

        Expression::Subscript { base, index, .. } => {
            let base_sql = transform_expr(ctx, base)?;
            let idx_sql = transform_expr(ctx, index)?;
            Ok(format!("json_extract({base_sql}, '$[' || {idx_sql} || ']')"))
        }
    }
}

fn transform_identifier(ctx: &mut TransformCtx, name: &str) -> Result<String> {
    let var = ctx
        .scope
        .lookup(name)
        .cloned()
        .ok_or_else(|| CypherSqlError::UnknownVariable(name.to_string()))?;
    match var.kind {
        VariableKind::Projected => Ok(var.source_expr.unwrap_or(var.alias)),
        VariableKind::Edge => edge_json_object_sql(ctx, &var.alias),
        VariableKind::Node => node_json_object_sql(ctx, &var.alias),
        VariableKind::Path => {
            // `path_ids` column when the traversal came from a varlen CTE,
            // otherwise a literal JSON array of this path's element ids.
            // `path_ids` itself is a comma-delimited string with a leading
            // and trailing comma (spec.md's varlen CTE shape); bracket the
            // trimmed middle into a JSON array rather than returning it raw.
            if var.alias.starts_with("_varlen_path_") {
                Ok(format!("('[' || trim({}.path_ids, ',') || ']')", var.alias))
            } else {
                let ids: Vec<String> = var.alias.split(',').map(|a| format!("{a}.id")).collect();
                Ok(format!("json_array({})", ids.join(", ")))
            }
        }
    }
}

fn transform_property(ctx: &mut TransformCtx, base: &Expression, property: &str) -> Result<String> {
    if let Expression::Identifier { name, .. } = base {
        if let Some(var) = ctx.scope.lookup(name).cloned() {
            return match var.kind {
                VariableKind::Node => Ok(property_access_sql(EntityKind::Node, &var.alias, property, ctx.in_comparison)),
                VariableKind::Edge => Ok(property_access_sql(EntityKind::Edge, &var.alias, property, ctx.in_comparison)),
                VariableKind::Projected => {
                    // the alias already IS the node/edge/scalar id — no .id suffix
                    let base_ref = var.source_expr.unwrap_or(var.alias);
                    Ok(format!("json_extract({base_ref}, '$.{}')", sql_quote(property)))
                }
                VariableKind::Path => Err(CypherSqlError::InvalidArgument(format!(
                    "path variable '{name}' has no property '{property}'"
                ))),
            };
        }
        return Err(CypherSqlError::UnknownVariable(name.clone()));
    }
    let base_sql = transform_expr(ctx, base)?;
    Ok(format!("json_extract({base_sql}, '$.{}')", sql_quote(property)))
}

fn transform_binary_op(ctx: &mut TransformCtx, op: BinaryOperator, left: &Expression, right: &Expression) -> Result<String> {
    use BinaryOperator::*;
    let is_comparison = matches!(op, Eq | Neq | Lt | Gt | Lte | Gte);
    let prior = ctx.in_comparison;
    if is_comparison {
        ctx.in_comparison = true;
    }
    let l = transform_expr(ctx, left);
    let r = transform_expr(ctx, right);
    ctx.in_comparison = prior;
    let (l, r) = (l?, r?);

    Ok(match op {
        And => format!("({l} AND {r})"),
        Or => format!("({l} OR {r})"),
        Xor => format!("({l} <> {r})"),
        Eq => format!("({l} = {r})"),
        Neq => format!("({l} <> {r})"),
        Lt => format!("({l} < {r})"),
        Gt => format!("({l} > {r})"),
        Lte => format!("({l} <= {r})"),
        Gte => format!("({l} >= {r})"),
        Add => {
            if left.is_string_literal() || right.is_string_literal() {
                format!("({l} || {r})")
            } else {
                format!("({l} + {r})")
            }
        }
        Sub => format!("({l} - {r})"),
        Mul => format!("({l} * {r})"),
        Div => format!("({l} / {r})"),
        Mod => format!("({l} % {r})"),
        Pow => format!("POWER({l}, {r})"),
        In => match right {
            Expression::List { items, .. } => {
                let mut vals = Vec::with_capacity(items.len());
                for i in items {
                    vals.push(transform_expr(ctx, i)?);
                }
                format!("({l} IN ({}))", vals.join(", "))
            }
            _ => format!("({l} IN (SELECT value FROM json_each({r})))"),
        },
        StartsWith => format!("({l} LIKE {r} || '%')"),
        EndsWith => format!("({l} LIKE '%' || {r})"),
        Contains => format!("(INSTR({l}, {r}) > 0)"),
        RegexMatch => format!("regexp({r}, {l})"),
    })
}

fn transform_exists(ctx: &mut TransformCtx, form: &ExistsForm) -> Result<String> {
    match form {
        ExistsForm::Pattern(path) => {
            let frags = pattern_transform::collect_path_fragments(ctx, path)?;
            let mut sql = format!("EXISTS (SELECT 1 FROM {}{}", frags.from, frags.joins);
            if let Some(w) = frags.where_ {
                sql.push_str(&format!(" WHERE {w}"));
            }
            sql.push(')');
            Ok(sql)
        }
        ExistsForm::Property(expr) => {
            if let Expression::Property { expr: base, property, .. } = expr.as_ref() {
                if let Expression::Identifier { name, .. } = base.as_ref() {
                    let var = ctx
                        .scope
                        .lookup(name)
                        .cloned()
                        .ok_or_else(|| CypherSqlError::UnknownVariable(name.clone()))?;
                    let kind = match var.kind {
                        VariableKind::Edge => EntityKind::Edge,
                        _ => EntityKind::Node,
                    };
                    return Ok(format!("({})", property_exists_sql(kind, &var.alias, property)));
                }
            }
            Err(CypherSqlError::InvalidArgument("exists() property form requires a direct variable.property".into()))
        }
    }
}

fn transform_list_predicate(
    ctx: &mut TransformCtx,
    kind: ListPredicateKind,
    variable: &str,
    list: &Expression,
    predicate: &Expression,
) -> Result<String> {
    let list_sql = transform_expr(ctx, list)?;
    let je = ctx.next_cte_name("je");
    let snapshot = ctx.scope.snapshot(variable);
    ctx.scope.register_projected(variable, &format!("{je}.value"), &format!("{je}.value"), true);
    let pred_sql = transform_expr(ctx, predicate);
    ctx.scope.restore(variable, snapshot);
    let pred_sql = pred_sql?;

    let count_expr = format!("(SELECT COUNT(*) FROM json_each({list_sql}) {je} WHERE {pred_sql})");
    Ok(match kind {
        ListPredicateKind::All => format!("({count_expr} = json_array_length({list_sql}))"),
        ListPredicateKind::Any => format!("({count_expr} > 0)"),
        ListPredicateKind::None => format!("({count_expr} = 0)"),
        ListPredicateKind::Single => format!("({count_expr} = 1)"),
    })
}

/// `reduce(acc = init, x IN list | expr)` becomes a recursive CTE of
/// `(acc, idx)` pairs, one row per list element, terminated when
/// `idx = json_array_length(list)`.
fn transform_reduce(
    ctx: &mut TransformCtx,
    accumulator: &str,
    initial: &Expression,
    variable: &str,
    list: &Expression,
    expr: &Expression,
) -> Result<String> {
    let initial_sql = transform_expr(ctx, initial)?;
    let list_sql = transform_expr(ctx, list)?;
    let cte_name = ctx.next_cte_name("reduce");
    let je = ctx.next_cte_name("je");

    let acc_snapshot = ctx.scope.snapshot(accumulator);
    let var_snapshot = ctx.scope.snapshot(variable);
    ctx.scope.register_projected(accumulator, &format!("{cte_name}.acc"), &format!("{cte_name}.acc"), true);
    ctx.scope.register_projected(variable, &format!("{je}.value"), &format!("{je}.value"), true);
    let fold_sql = transform_expr(ctx, expr);
    ctx.scope.restore(accumulator, acc_snapshot);
    ctx.scope.restore(variable, var_snapshot);
    let fold_sql = fold_sql?;

    let body = format!(
        "SELECT {initial_sql} AS acc, 0 AS idx UNION ALL SELECT {fold_sql}, {cte_name}.idx + 1 FROM {cte_name} JOIN json_each({list_sql}) {je} ON {je}.key = {cte_name}.idx WHERE {cte_name}.idx < json_array_length({list_sql})"
    );
    ctx.sql.cte(&cte_name, &body, true);
    Ok(format!(
        "(SELECT acc FROM {cte_name} WHERE idx = json_array_length({list_sql}))"
    ))
}

fn transform_list_comprehension(
    ctx: &mut TransformCtx,
    variable: &str,
    list: &Expression,
    where_expr: Option<&Expression>,
    transform: Option<&Expression>,
) -> Result<String> {
    let list_sql = transform_expr(ctx, list)?;
    let je = ctx.next_cte_name("je");
    let snapshot = ctx.scope.snapshot(variable);
    ctx.scope.register_projected(variable, &format!("{je}.value"), &format!("{je}.value"), true);

    let projected = match transform {
        Some(t) => transform_expr(ctx, t),
        None => Ok(format!("{je}.value")),
    };
    let where_sql = where_expr.map(|w| transform_expr(ctx, w)).transpose();
    ctx.scope.restore(variable, snapshot);
    let projected = projected?;
    let where_sql = where_sql?;

    let mut sql = format!("(SELECT json_group_array({projected}) FROM json_each({list_sql}) {je}");
    if let Some(w) = where_sql {
        sql.push_str(&format!(" WHERE {w}"));
    }
    sql.push(')');
    Ok(sql)
}

fn transform_pattern_comprehension(
    ctx: &mut TransformCtx,
    pattern: &Path,
    where_expr: Option<&Expression>,
    collect: &Expression,
) -> Result<String> {
    let frags = pattern_transform::collect_path_fragments(ctx, pattern)?;
    let collect_sql = transform_expr(ctx, collect)?;
    let mut sql = format!("(SELECT json_group_array({collect_sql}) FROM {}{}", frags.from, frags.joins);
    let mut where_parts = Vec::new();
    if let Some(w) = frags.where_ {
        where_parts.push(w);
    }
    if let Some(w) = where_expr {
        where_parts.push(transform_expr(ctx, w)?);
    }
    if !where_parts.is_empty() {
        sql.push_str(&format!(" WHERE {}", where_parts.join(" AND ")));
    }
    sql.push(')');
    Ok(sql)
}

fn transform_map_projection(ctx: &mut TransformCtx, variable: &str, items: &[MapProjectionItem]) -> Result<String> {
    let var = ctx
        .scope
        .lookup(variable)
        .cloned()
        .ok_or_else(|| CypherSqlError::UnknownVariable(variable.to_string()))?;
    let kind = match var.kind {
        VariableKind::Edge => EntityKind::Edge,
        _ => EntityKind::Node,
    };
    let has_wildcard = items.iter().any(|i| matches!(i, MapProjectionItem::AllProperties));
    let wildcard_sql = if has_wildcard {
        Some(all_properties_json(ctx, kind, &var.alias))
    } else {
        None
    };

    let mut explicit = Vec::new();
    for item in items {
        match item {
            MapProjectionItem::AllProperties => {}
            MapProjectionItem::Property(name) => {
                let access = property_access_sql(kind, &var.alias, name, false);
                explicit.push(format!("'{}', {access}", sql_quote(name)));
            }
            MapProjectionItem::Alias { alias, expression } => {
                let e_sql = transform_expr(ctx, expression)?;
                explicit.push(format!("'{}', {e_sql}", sql_quote(alias)));
            }
        }
    }

    Ok(match (wildcard_sql, explicit.is_empty()) {
        (Some(w), true) => w,
        (Some(w), false) => format!("json_patch({w}, json_object({}))", explicit.join(", ")),
        (None, _) => format!("json_object({})", explicit.join(", ")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;

    fn lit_int(v: i64) -> Expression {
        Expression::Literal { span: 0, value: Literal::Integer(v) }
    }

    #[test]
    fn string_literal_addition_becomes_concatenation() {
        let mut ctx = TransformCtx::new();
        let left = Expression::Literal { span: 0, value: Literal::String("a".into()) };
        let right = Expression::Literal { span: 0, value: Literal::String("b".into()) };
        let sql = transform_binary_op(&mut ctx, BinaryOperator::Add, &left, &right).unwrap();
        assert_eq!(sql, "('a' || 'b')");
    }

    #[test]
    fn numeric_addition_stays_arithmetic() {
        let mut ctx = TransformCtx::new();
        let sql = transform_binary_op(&mut ctx, BinaryOperator::Add, &lit_int(1), &lit_int(2)).unwrap();
        assert_eq!(sql, "(1 + 2)");
    }

    #[test]
    fn unknown_identifier_fails() {
        let mut ctx = TransformCtx::new();
        let err = transform_identifier(&mut ctx, "missing").unwrap_err();
        assert_eq!(err, CypherSqlError::UnknownVariable("missing".to_string()));
    }

    #[test]
    fn projected_identifier_emits_its_source_expr() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_projected("c", "_with_0.c", "count(*)", true);
        let sql = transform_identifier(&mut ctx, "c").unwrap();
        assert_eq!(sql, "_with_0.c");
    }

    #[test]
    fn in_list_literal_renders_inline_values() {
        let mut ctx = TransformCtx::new();
        let left = Expression::Literal { span: 0, value: Literal::Integer(1) };
        let right = Expression::List { span: 0, items: vec![lit_int(1), lit_int(2)] };
        let sql = transform_binary_op(&mut ctx, BinaryOperator::In, &left, &right).unwrap();
        assert_eq!(sql, "(1 IN (1, 2))");
    }

    #[test]
    fn list_predicate_restores_shadowed_scope_entry() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_node("x", "_gql_default_alias_0", None);
        let list = Expression::List { span: 0, items: vec![lit_int(1)] };
        let predicate = Expression::Identifier { span: 0, name: "x".into() };
        let _ = transform_list_predicate(&mut ctx, ListPredicateKind::Any, "x", &list, &predicate).unwrap();
        assert_eq!(ctx.scope.get_alias("x"), Some("_gql_default_alias_0"));
    }
}
