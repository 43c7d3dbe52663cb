//! Table-driven dispatcher from Cypher function names to handlers (spec §4.8).
//!
//! Lookup is case-insensitive against a static, read-only table built once
//! with `lazy_static!` — the one piece of shared state across queries the
//! concurrency model allows (spec §5).

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::algo_functions;
use crate::ast::Expression;
use crate::dynbuf::{ident_safe, sql_quote};
use crate::error::{CypherSqlError, Result};
use crate::expr_transform::{self, EntityKind};
use crate::scope::VariableKind;
use crate::transform_ctx::TransformCtx;

type Handler = fn(&mut TransformCtx, &[Expression], bool) -> Result<String>;

lazy_static! {
    static ref TABLE: HashMap<&'static str, Handler> = {
        let mut m: HashMap<&'static str, Handler> = HashMap::new();
        // Entity
        m.insert("id", entity_id);
        m.insert("labels", entity_labels);
        m.insert("properties", entity_properties);
        m.insert("keys", entity_keys);
        m.insert("type", entity_type);
        m.insert("graph", entity_graph);
        // Aggregates
        m.insert("count", agg_count);
        m.insert("min", |c, a, _| agg_simple(c, a, "MIN"));
        m.insert("max", |c, a, _| agg_simple(c, a, "MAX"));
        m.insert("avg", |c, a, _| agg_simple(c, a, "AVG"));
        m.insert("sum", |c, a, _| agg_simple(c, a, "SUM"));
        m.insert("collect", agg_collect);
        // String 1-arg direct
        m.insert("toupper", |c, a, _| string1(c, a, "UPPER"));
        m.insert("tolower", |c, a, _| string1(c, a, "LOWER"));
        m.insert("trim", |c, a, _| string1(c, a, "TRIM"));
        m.insert("ltrim", |c, a, _| string1(c, a, "LTRIM"));
        m.insert("rtrim", |c, a, _| string1(c, a, "RTRIM"));
        m.insert("size", |c, a, _| string1(c, a, "LENGTH"));
        m.insert("length", path_or_string_length);
        m.insert("reverse", string_reverse);
        // String n-arg
        m.insert("substring", string_substring);
        m.insert("replace", string_replace);
        m.insert("split", string_split);
        m.insert("left", string_left);
        m.insert("right", string_right);
        m.insert("startswith", |c, a, _| string_pattern_op(c, a, "LIKE_PREFIX"));
        m.insert("endswith", |c, a, _| string_pattern_op(c, a, "LIKE_SUFFIX"));
        m.insert("contains", |c, a, _| string_pattern_op(c, a, "INSTR"));
        // Math 1-arg
        m.insert("abs", |c, a, _| math1(c, a, "ABS"));
        m.insert("sqrt", |c, a, _| math1(c, a, "SQRT"));
        m.insert("log", |c, a, _| math1(c, a, "LN"));
        m.insert("log10", |c, a, _| math1(c, a, "LOG10"));
        m.insert("exp", |c, a, _| math1(c, a, "EXP"));
        m.insert("sin", |c, a, _| math1(c, a, "SIN"));
        m.insert("cos", |c, a, _| math1(c, a, "COS"));
        m.insert("tan", |c, a, _| math1(c, a, "TAN"));
        m.insert("asin", |c, a, _| math1(c, a, "ASIN"));
        m.insert("acos", |c, a, _| math1(c, a, "ACOS"));
        m.insert("atan", |c, a, _| math1(c, a, "ATAN"));
        m.insert("ceil", math_ceil);
        m.insert("floor", math_floor);
        m.insert("sign", math_sign);
        m.insert("round", math_round);
        // No-arg
        m.insert("rand", |_, _, _| Ok("(ABS(RANDOM()) % 1000000000 / 1000000000.0)".to_string()));
        m.insert("random", |_, _, _| Ok("(ABS(RANDOM()) % 1000000000 / 1000000000.0)".to_string()));
        m.insert("pi", |_, _, _| Ok("3.141592653589793".to_string()));
        m.insert("e", |_, _, _| Ok("2.718281828459045".to_string()));
        // Conversion
        m.insert("coalesce", conv_coalesce);
        m.insert("tostring", |c, a, _| conv_cast(c, a, "TEXT"));
        m.insert("tointeger", |c, a, _| conv_cast(c, a, "INTEGER"));
        m.insert("tofloat", |c, a, _| conv_cast(c, a, "REAL"));
        m.insert("toboolean", conv_to_boolean);
        // Path
        m.insert("nodes", path_nodes);
        m.insert("relationships", path_relationships);
        m.insert("rels", path_relationships);
        m.insert("startnode", path_start_node);
        m.insert("endnode", path_end_node);
        // List
        m.insert("head", list_head);
        m.insert("tail", list_tail);
        m.insert("last", list_last);
        m.insert("range", list_range);
        // Temporal
        m.insert("timestamp", |_, _, _| Ok("CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)".to_string()));
        m.insert("date", |_, _, _| Ok("date('now')".to_string()));
        m.insert("time", |_, _, _| Ok("time('now')".to_string()));
        m.insert("datetime", |_, _, _| Ok("datetime('now')".to_string()));
        m.insert("localdatetime", |_, _, _| Ok("datetime('now', 'localtime')".to_string()));
        m.insert("randomuuid", |_, _, _| Ok(
            "(lower(hex(randomblob(4))) || '-' || lower(hex(randomblob(2))) || '-4' || \
substr(lower(hex(randomblob(2))), 2) || '-' || substr('89ab', abs(random()) % 4 + 1, 1) || \
substr(lower(hex(randomblob(2))), 2) || '-' || lower(hex(randomblob(6))))".to_string()
        ));
        // Graph algorithms
        m.insert("pagerank", algo_functions::page_rank);
        m.insert("toppagerank", algo_functions::top_page_rank);
        m.insert("personalizedpagerank", algo_functions::personalized_page_rank);
        m.insert("labelpropagation", algo_functions::label_propagation);
        m.insert("communities", algo_functions::label_propagation);
        m.insert("communityof", algo_functions::community_of);
        m.insert("communitymembers", algo_functions::community_members);
        m.insert("communitycount", algo_functions::community_count);
        m
    };
}

pub fn dispatch(ctx: &mut TransformCtx, name: &str, args: &[Expression], distinct: bool) -> Result<String> {
    let key = name.to_ascii_lowercase();
    match TABLE.get(key.as_str()) {
        Some(handler) => handler(ctx, args, distinct),
        None => Err(CypherSqlError::UnsupportedFunction(name.to_string())),
    }
}

const AGGREGATE_NAMES: &[&str] = &["count", "min", "max", "avg", "sum", "collect"];

/// Whether `name` is one of the true aggregates (case-insensitive) — the
/// only functions that install a GROUP BY when they appear in WITH/RETURN,
/// as opposed to a scalar function like `toUpper` or `id`.
pub fn is_aggregate(name: &str) -> bool {
    AGGREGATE_NAMES.contains(&name.to_ascii_lowercase().as_str())
}

fn args_sql(ctx: &mut TransformCtx, args: &[Expression]) -> Result<Vec<String>> {
    args.iter().map(|a| expr_transform::transform_expr(ctx, a)).collect()
}

fn require_arg<'a>(args: &'a [Expression], name: &str) -> Result<&'a Expression> {
    args.first().ok_or_else(|| CypherSqlError::InvalidArgument(format!("{name}() requires an argument")))
}

fn variable_entity(ctx: &TransformCtx, expr: &Expression) -> Result<(EntityKind, String)> {
    if let Expression::Identifier { name, .. } = expr {
        if let Some(var) = ctx.scope.lookup(name) {
            let kind = match var.kind {
                VariableKind::Edge => EntityKind::Edge,
                _ => EntityKind::Node,
            };
            return Ok((kind, var.alias.clone()));
        }
        return Err(CypherSqlError::UnknownVariable(name.clone()));
    }
    Err(CypherSqlError::InvalidArgument("expected a node or relationship variable".into()))
}

fn entity_id(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let (_, alias) = variable_entity(ctx, require_arg(args, "id")?)?;
    Ok(format!("{alias}.id"))
}

fn entity_labels(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let (_, alias) = variable_entity(ctx, require_arg(args, "labels")?)?;
    Ok(format!("(SELECT json_group_array(label) FROM node_labels WHERE node_id = {alias}.id)"))
}

fn entity_properties(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let (kind, alias) = variable_entity(ctx, require_arg(args, "properties")?)?;
    let prefix = if kind == EntityKind::Edge { "edge_props" } else { "node_props" };
    let idc = if kind == EntityKind::Edge { "edge_id" } else { "node_id" };
    Ok(format!(
        "(SELECT json_group_object(pk.key, COALESCE(npt.value, CAST(npi.value AS TEXT), CAST(npr.value AS TEXT), \
CASE npb.value WHEN 1 THEN 'true' WHEN 0 THEN 'false' END)) FROM property_keys pk \
LEFT JOIN {prefix}_text npt ON npt.{idc} = {alias}.id AND npt.key_id = pk.id \
LEFT JOIN {prefix}_int npi ON npi.{idc} = {alias}.id AND npi.key_id = pk.id \
LEFT JOIN {prefix}_real npr ON npr.{idc} = {alias}.id AND npr.key_id = pk.id \
LEFT JOIN {prefix}_bool npb ON npb.{idc} = {alias}.id AND npb.key_id = pk.id \
WHERE COALESCE(npt.value, npi.value, npr.value, npb.value) IS NOT NULL)"
    ))
}

fn entity_keys(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let (kind, alias) = variable_entity(ctx, require_arg(args, "keys")?)?;
    let (prefix, idc) = if kind == EntityKind::Edge { ("edge_props", "edge_id") } else { ("node_props", "node_id") };
    Ok(format!(
        "(SELECT json_group_array(pk.key) FROM property_keys pk WHERE EXISTS \
(SELECT 1 FROM {prefix}_text v WHERE v.{idc} = {alias}.id AND v.key_id = pk.id) OR EXISTS \
(SELECT 1 FROM {prefix}_int v WHERE v.{idc} = {alias}.id AND v.key_id = pk.id) OR EXISTS \
(SELECT 1 FROM {prefix}_real v WHERE v.{idc} = {alias}.id AND v.key_id = pk.id) OR EXISTS \
(SELECT 1 FROM {prefix}_bool v WHERE v.{idc} = {alias}.id AND v.key_id = pk.id))"
    ))
}

fn entity_type(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let (_, alias) = variable_entity(ctx, require_arg(args, "type")?)?;
    Ok(format!("{alias}.type"))
}

fn entity_graph(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    if let Expression::Identifier { name, .. } = require_arg(args, "graph")? {
        if let Some(var) = ctx.scope.lookup(name) {
            return Ok(match &var.graph {
                Some(g) => format!("'{}'", sql_quote(g)),
                None => "NULL".to_string(),
            });
        }
    }
    Ok("NULL".to_string())
}

/// `count(*)` (no args) vs `count(expr)`/`count(DISTINCT expr)`.
fn agg_count(ctx: &mut TransformCtx, args: &[Expression], distinct: bool) -> Result<String> {
    if args.is_empty() {
        return Ok("COUNT(*)".to_string());
    }
    aggregate_with_property_optimization(ctx, args, distinct, "COUNT")
}

fn agg_simple(ctx: &mut TransformCtx, args: &[Expression], sql_fn: &str) -> Result<String> {
    aggregate_with_property_optimization(ctx, args, false, sql_fn)
}

fn agg_collect(ctx: &mut TransformCtx, args: &[Expression], distinct: bool) -> Result<String> {
    let arg_sql = expr_transform::transform_expr(ctx, require_arg(args, "collect")?)?;
    Ok(format!("json_group_array({}{arg_sql})", if distinct { "DISTINCT " } else { "" }))
}

/// Aggregating a bare property access (`count(n.age)`, `sum(n.age)`, ...)
/// gets an optimized path: instead of a correlated COALESCE subquery per
/// row, add three LEFT JOINs (int/real/text property tables) routed
/// through a per-call alias prefix, and aggregate
/// `COALESCE(int.value, real.value, CAST(text.value AS REAL))` directly.
/// The joins are buffered as pending and grafted in by the Finalizer.
fn aggregate_with_property_optimization(ctx: &mut TransformCtx, args: &[Expression], distinct: bool, sql_fn: &str) -> Result<String> {
    if let Some(Expression::Property { expr, property, .. }) = args.first() {
        if let Expression::Identifier { name, .. } = expr.as_ref() {
            if let Some(var) = ctx.scope.lookup(name).cloned() {
                let kind = match var.kind {
                    VariableKind::Edge => EntityKind::Edge,
                    VariableKind::Node => EntityKind::Node,
                    _ => {
                        let arg_sql = args_sql(ctx, args)?.join(", ");
                        return Ok(format!("{sql_fn}({}{arg_sql})", if distinct { "DISTINCT " } else { "" }));
                    }
                };
                let (prefix, idc) = if kind == EntityKind::Edge { ("edge_props", "edge_id") } else { ("node_props", "node_id") };
                let tag = format!("_agg_{}_{}", var.alias, ident_safe(property));
                let int_alias = format!("{tag}_int");
                let real_alias = format!("{tag}_real");
                let text_alias = format!("{tag}_text");
                let pk_alias = format!("{tag}_pk");
                let property_lit = sql_quote(property);
                let joins = format!(
                    " INNER JOIN property_keys AS {pk_alias} ON {pk_alias}.key = '{property_lit}' \
LEFT JOIN {prefix}_int AS {int_alias} ON {int_alias}.{idc} = {alias}.id AND {int_alias}.key_id = {pk_alias}.id \
LEFT JOIN {prefix}_real AS {real_alias} ON {real_alias}.{idc} = {alias}.id AND {real_alias}.key_id = {pk_alias}.id \
LEFT JOIN {prefix}_text AS {text_alias} ON {text_alias}.{idc} = {alias}.id AND {text_alias}.key_id = {pk_alias}.id",
                    alias = var.alias,
                );
                ctx.add_pending_property_join(joins);
                let value = format!("COALESCE({int_alias}.value, {real_alias}.value, CAST({text_alias}.value AS REAL))");
                return Ok(format!("{sql_fn}({}{value})", if distinct { "DISTINCT " } else { "" }));
            }
        }
    }
    let arg_sql = args_sql(ctx, args)?.join(", ");
    Ok(format!("{sql_fn}({}{arg_sql})", if distinct { "DISTINCT " } else { "" }))
}

fn string1(ctx: &mut TransformCtx, args: &[Expression], sql_fn: &str) -> Result<String> {
    let a = expr_transform::transform_expr(ctx, require_arg(args, sql_fn)?)?;
    Ok(format!("{sql_fn}({a})"))
}

fn path_or_string_length(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    if let Some(Expression::Identifier { name, .. }) = args.first() {
        if let Some(var) = ctx.scope.lookup(name) {
            if var.kind == VariableKind::Path {
                let a = expr_transform::transform_expr(ctx, &args[0])?;
                return Ok(format!("(json_array_length({a}) - 1)"));
            }
        }
    }
    string1(ctx, args, "LENGTH")
}

/// No `REVERSE()` builtin: peel characters off the front of the input one
/// at a time, prepending each to an accumulator, via a recursive CTE.
fn string_reverse(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let s = expr_transform::transform_expr(ctx, require_arg(args, "reverse")?)?;
    let cte = ctx.next_cte_name("reverse");
    let body = format!(
        "SELECT '' AS acc, {s} AS remaining UNION ALL \
SELECT substr(remaining, 1, 1) || acc, substr(remaining, 2) FROM {cte} WHERE remaining <> ''"
    );
    ctx.sql.cte(&cte, &body, true);
    Ok(format!("(SELECT acc FROM {cte} WHERE remaining = '' ORDER BY LENGTH(acc) DESC LIMIT 1)"))
}

fn string_substring(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() < 2 {
        return Err(CypherSqlError::InvalidArgument("substring() requires at least 2 arguments".into()));
    }
    let s = &parts[0];
    let start = &parts[1];
    Ok(match parts.get(2) {
        Some(len) => format!("SUBSTR({s}, ({start}) + 1, {len})"),
        None => format!("SUBSTR({s}, ({start}) + 1)"),
    })
}

fn string_replace(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() != 3 {
        return Err(CypherSqlError::InvalidArgument("replace() requires 3 arguments".into()));
    }
    Ok(format!("REPLACE({}, {}, {})", parts[0], parts[1], parts[2]))
}

/// `split(s, delim)` builds a JSON array by recursively chopping off the
/// text before each delimiter occurrence.
fn string_split(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() != 2 {
        return Err(CypherSqlError::InvalidArgument("split() requires 2 arguments".into()));
    }
    let (s, delim) = (&parts[0], &parts[1]);
    let cte = ctx.next_cte_name("split");
    let body = format!(
        "SELECT CASE WHEN INSTR({s}, {delim}) = 0 THEN {s} ELSE SUBSTR({s}, 1, INSTR({s}, {delim}) - 1) END AS piece, \
CASE WHEN INSTR({s}, {delim}) = 0 THEN '' ELSE SUBSTR({s}, INSTR({s}, {delim}) + LENGTH({delim})) END AS remaining \
UNION ALL \
SELECT CASE WHEN INSTR(remaining, {delim}) = 0 THEN remaining ELSE SUBSTR(remaining, 1, INSTR(remaining, {delim}) - 1) END, \
CASE WHEN INSTR(remaining, {delim}) = 0 THEN '' ELSE SUBSTR(remaining, INSTR(remaining, {delim}) + LENGTH({delim})) END \
FROM {cte} WHERE remaining <> '' OR INSTR({s}, {delim}) <> 0"
    );
    ctx.sql.cte(&cte, &body, true);
    Ok(format!("(SELECT json_group_array(piece) FROM {cte})"))
}

fn string_left(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() != 2 {
        return Err(CypherSqlError::InvalidArgument("left() requires 2 arguments".into()));
    }
    Ok(format!("SUBSTR({}, 1, {})", parts[0], parts[1]))
}

fn string_right(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() != 2 {
        return Err(CypherSqlError::InvalidArgument("right() requires 2 arguments".into()));
    }
    Ok(format!("SUBSTR({}, -({}))", parts[0], parts[1]))
}

fn string_pattern_op(ctx: &mut TransformCtx, args: &[Expression], op: &str) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() != 2 {
        return Err(CypherSqlError::InvalidArgument("expected 2 arguments".into()));
    }
    let (l, r) = (&parts[0], &parts[1]);
    Ok(match op {
        "LIKE_PREFIX" => format!("({l} LIKE {r} || '%')"),
        "LIKE_SUFFIX" => format!("({l} LIKE '%' || {r})"),
        _ => format!("(INSTR({l}, {r}) > 0)"),
    })
}

fn math1(ctx: &mut TransformCtx, args: &[Expression], sql_fn: &str) -> Result<String> {
    string1(ctx, args, sql_fn)
}

fn math_ceil(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let x = expr_transform::transform_expr(ctx, require_arg(args, "ceil")?)?;
    Ok(format!("(CASE WHEN {x} = CAST({x} AS INTEGER) THEN CAST({x} AS INTEGER) WHEN {x} > 0 THEN CAST({x} AS INTEGER) + 1 ELSE CAST({x} AS INTEGER) END)"))
}

fn math_floor(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let x = expr_transform::transform_expr(ctx, require_arg(args, "floor")?)?;
    Ok(format!("(CASE WHEN {x} = CAST({x} AS INTEGER) THEN CAST({x} AS INTEGER) WHEN {x} < 0 THEN CAST({x} AS INTEGER) - 1 ELSE CAST({x} AS INTEGER) END)"))
}

fn math_sign(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let x = expr_transform::transform_expr(ctx, require_arg(args, "sign")?)?;
    Ok(format!("(CASE WHEN {x} > 0 THEN 1 WHEN {x} < 0 THEN -1 ELSE 0 END)"))
}

fn math_round(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    match parts.len() {
        1 => Ok(format!("ROUND({})", parts[0])),
        2 => Ok(format!("ROUND({}, {})", parts[0], parts[1])),
        _ => Err(CypherSqlError::InvalidArgument("round() takes 1 or 2 arguments".into())),
    }
}

fn conv_coalesce(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    Ok(format!("COALESCE({})", parts.join(", ")))
}

fn conv_cast(ctx: &mut TransformCtx, args: &[Expression], sql_type: &str) -> Result<String> {
    let a = expr_transform::transform_expr(ctx, require_arg(args, "toString/toInteger/toFloat")?)?;
    Ok(format!("CAST({a} AS {sql_type})"))
}

fn conv_to_boolean(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let a = expr_transform::transform_expr(ctx, require_arg(args, "toBoolean")?)?;
    Ok(format!(
        "(CASE WHEN LOWER(CAST({a} AS TEXT)) IN ('true', '1') THEN 1 WHEN LOWER(CAST({a} AS TEXT)) IN ('false', '0') THEN 0 ELSE NULL END)"
    ))
}

fn path_nodes(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    expr_transform::transform_expr(ctx, require_arg(args, "nodes")?)
}

fn path_relationships(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    expr_transform::transform_expr(ctx, require_arg(args, "relationships")?)
}

fn path_start_node(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let p = expr_transform::transform_expr(ctx, require_arg(args, "startNode")?)?;
    Ok(format!("json_extract({p}, '$[0]')"))
}

fn path_end_node(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let p = expr_transform::transform_expr(ctx, require_arg(args, "endNode")?)?;
    Ok(format!("json_extract({p}, '$[' || (json_array_length({p}) - 1) || ']')"))
}

fn list_head(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let l = expr_transform::transform_expr(ctx, require_arg(args, "head")?)?;
    Ok(format!("json_extract({l}, '$[0]')"))
}

fn list_tail(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let l = expr_transform::transform_expr(ctx, require_arg(args, "tail")?)?;
    Ok(format!("(SELECT json_group_array(value) FROM json_each({l}) WHERE key > 0)"))
}

fn list_last(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let l = expr_transform::transform_expr(ctx, require_arg(args, "last")?)?;
    Ok(format!("json_extract({l}, '$[' || (json_array_length({l}) - 1) || ']')"))
}

/// `range(start, end[, step])` as a recursive CTE generating the series.
fn list_range(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let parts = args_sql(ctx, args)?;
    if parts.len() < 2 {
        return Err(CypherSqlError::InvalidArgument("range() requires at least 2 arguments".into()));
    }
    let start = &parts[0];
    let end = &parts[1];
    let step = parts.get(2).cloned().unwrap_or_else(|| "1".to_string());
    let cte = ctx.next_cte_name("range");
    let body = format!(
        "SELECT {start} AS n UNION ALL SELECT n + {step} FROM {cte} WHERE n + {step} <= {end}"
    );
    ctx.sql.cte(&cte, &body, true);
    Ok(format!("(SELECT json_group_array(n) FROM {cte})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use rstest::rstest;

    /// Every 1-arg function that maps straight onto a SQLite builtin of the
    /// same shape (spec §4.8's "String 1-arg direct"/"Math 1-arg" tables).
    #[rstest]
    #[case("toUpper", "UPPER")]
    #[case("toLower", "LOWER")]
    #[case("trim", "TRIM")]
    #[case("ltrim", "LTRIM")]
    #[case("rtrim", "RTRIM")]
    #[case("size", "LENGTH")]
    #[case("abs", "ABS")]
    #[case("sqrt", "SQRT")]
    #[case("sin", "SIN")]
    #[case("cos", "COS")]
    #[case("tan", "TAN")]
    fn one_arg_functions_wrap_their_sqlite_builtin(#[case] cypher_name: &str, #[case] sql_fn: &str) {
        let mut ctx = TransformCtx::new();
        let arg = Expression::Literal { span: 0, value: Literal::String("x".into()) };
        let sql = dispatch(&mut ctx, cypher_name, std::slice::from_ref(&arg), false).unwrap();
        assert_eq!(sql, format!("{sql_fn}('x')"));
    }

    #[test]
    fn unsupported_function_reports_its_name() {
        let mut ctx = TransformCtx::new();
        let err = dispatch(&mut ctx, "definitelyNotAFunction", &[], false).unwrap_err();
        assert_eq!(err, CypherSqlError::UnsupportedFunction("definitelyNotAFunction".to_string()));
    }

    #[test]
    fn dispatch_is_case_insensitive() {
        let mut ctx = TransformCtx::new();
        let sql = dispatch(&mut ctx, "ToUpper", &[Expression::Literal { span: 0, value: Literal::String("a".into()) }], false).unwrap();
        assert_eq!(sql, "UPPER('a')");
    }

    #[test]
    fn count_star_ignores_args() {
        let mut ctx = TransformCtx::new();
        assert_eq!(dispatch(&mut ctx, "count", &[], false).unwrap(), "COUNT(*)");
    }

    #[test]
    fn count_over_property_buffers_pending_joins() {
        let mut ctx = TransformCtx::new();
        ctx.scope.register_node("n", "_gql_default_alias_0", None);
        let arg = Expression::Property {
            span: 0,
            expr: Box::new(Expression::Identifier { span: 0, name: "n".into() }),
            property: "age".into(),
        };
        let sql = dispatch(&mut ctx, "count", std::slice::from_ref(&arg), false).unwrap();
        assert!(sql.starts_with("COUNT(COALESCE("));
        assert_eq!(ctx.take_pending_property_joins().len(), 1);
    }
}
