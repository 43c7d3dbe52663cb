//! PageRank family and label-propagation family (spec §4.8), grounded on
//! the C original's `transform_func_graph.c`.
//!
//! Both families are **unrolled** into N sequential CTEs rather than a
//! single recursive CTE, because SQL recursive CTEs can only express "each
//! row reads the previous row(s)", not the batch dependency "each iteration
//! reads *all* rows the previous iteration produced."

use crate::ast::{Expression, Literal};
use crate::error::{CypherSqlError, Result};
use crate::expr_transform;
use crate::transform_ctx::TransformCtx;

const DAMPING: f64 = 0.85;
const PAGERANK_ITERATIONS: u32 = 20;
const LABEL_PROPAGATION_ITERATIONS: u32 = 10;

fn pagerank_series(ctx: &mut TransformCtx, teleport_for: &str) -> String {
    let run = ctx.next_cte_name("pagerank");
    let nc = format!("{run}_nc");
    let od = format!("{run}_od");
    ctx.sql.cte(&nc, "SELECT COUNT(*) AS cnt FROM nodes", false);
    ctx.sql.cte(&od, "SELECT source_id AS node_id, COUNT(*) AS degree FROM edges GROUP BY source_id", false);

    let pr0 = format!("{run}_pr0");
    ctx.sql.cte(&pr0, &format!("SELECT id AS node_id, {teleport_for} AS score FROM nodes, {nc}"), false);

    let mut prev = pr0;
    for i in 1..=PAGERANK_ITERATIONS {
        let pri = format!("{run}_pr{i}");
        let body = format!(
            "SELECT nodes.id AS node_id, (1.0 - {d}) * ({teleport_for}) + {d} * COALESCE(SUM({prev}.score / {od}.degree), 0) AS score \
FROM nodes, {nc} LEFT JOIN edges ON edges.target_id = nodes.id \
LEFT JOIN {prev} ON {prev}.node_id = edges.source_id \
LEFT JOIN {od} ON {od}.node_id = edges.source_id \
GROUP BY nodes.id",
            d = DAMPING,
        );
        ctx.sql.cte(&pri, &body, false);
        prev = pri;
    }
    prev
}

pub fn page_rank(ctx: &mut TransformCtx, _args: &[Expression], _distinct: bool) -> Result<String> {
    let final_cte = pagerank_series(ctx, "1.0 / nc.cnt");
    Ok(format!(
        "(SELECT json_group_array(json_object('node_id', node_id, 'score', score)) FROM \
(SELECT node_id, score FROM {final_cte} ORDER BY score DESC))"
    ))
}

pub fn top_page_rank(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let limit_sql = match args.first() {
        Some(e) => expr_transform::transform_expr(ctx, e)?,
        None => "10".to_string(),
    };
    let final_cte = pagerank_series(ctx, "1.0 / nc.cnt");
    Ok(format!(
        "(SELECT json_group_array(json_object('node_id', node_id, 'score', score)) FROM \
(SELECT node_id, score FROM {final_cte} ORDER BY score DESC LIMIT {limit_sql}))"
    ))
}

/// Replaces the uniform teleport term `(1-d)/N` with one concentrated on
/// the seed set: `(1-d)/|seeds|` for seed nodes, `0` otherwise.
pub fn personalized_page_rank(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    if args.is_empty() {
        return Err(CypherSqlError::InvalidArgument("personalizedPageRank() requires at least one seed node".into()));
    }
    let seed_ids: Vec<String> = args
        .iter()
        .map(|e| expr_transform::transform_expr(ctx, e))
        .collect::<Result<_>>()?;
    let seed_list = seed_ids.join(", ");
    let seed_count = seed_ids.len();
    let teleport = format!("(CASE WHEN nodes.id IN ({seed_list}) THEN 1.0 / {seed_count} ELSE 0 END)");
    let final_cte = pagerank_series(ctx, &teleport);
    Ok(format!(
        "(SELECT json_group_array(json_object('node_id', node_id, 'score', score)) FROM \
(SELECT node_id, score FROM {final_cte} ORDER BY score DESC))"
    ))
}

/// Each iteration reassigns every node the majority label among its
/// in-neighbors, ties broken by lowest label id via
/// `ROW_NUMBER() OVER (PARTITION BY node ORDER BY COUNT(*) DESC, label ASC)`.
fn label_propagation_series(ctx: &mut TransformCtx) -> String {
    let run = ctx.next_cte_name("community");
    let lbl0 = format!("{run}_lbl0");
    ctx.sql.cte(&lbl0, "SELECT id AS node_id, id AS label FROM nodes", false);

    let mut prev = lbl0;
    for i in 1..=LABEL_PROPAGATION_ITERATIONS {
        let lbli = format!("{run}_lbl{i}");
        let body = format!(
            "SELECT node_id, label FROM (SELECT edges.target_id AS node_id, prev.label AS label, \
ROW_NUMBER() OVER (PARTITION BY edges.target_id ORDER BY COUNT(*) DESC, prev.label ASC) AS rn \
FROM edges JOIN {prev} prev ON prev.node_id = edges.source_id \
GROUP BY edges.target_id, prev.label) ranked WHERE rn = 1"
        );
        ctx.sql.cte(&lbli, &body, false);
        prev = lbli;
    }
    prev
}

pub fn label_propagation(ctx: &mut TransformCtx, _args: &[Expression], _distinct: bool) -> Result<String> {
    let final_cte = label_propagation_series(ctx);
    Ok(format!(
        "(SELECT json_group_array(json_object('node_id', node_id, 'label', label)) FROM {final_cte})"
    ))
}

pub fn community_of(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let id_sql = match args.first() {
        Some(e) => expr_transform::transform_expr(ctx, e)?,
        None => return Err(CypherSqlError::InvalidArgument("communityOf() requires a node id".into())),
    };
    let final_cte = label_propagation_series(ctx);
    Ok(format!("(SELECT label FROM {final_cte} WHERE node_id = {id_sql})"))
}

pub fn community_members(ctx: &mut TransformCtx, args: &[Expression], _distinct: bool) -> Result<String> {
    let id_sql = match args.first() {
        Some(e) => expr_transform::transform_expr(ctx, e)?,
        None => return Err(CypherSqlError::InvalidArgument("communityMembers() requires a node id".into())),
    };
    let final_cte = label_propagation_series(ctx);
    Ok(format!(
        "(SELECT json_group_array(node_id) FROM {final_cte} WHERE label = (SELECT label FROM {final_cte} WHERE node_id = {id_sql}))"
    ))
}

pub fn community_count(ctx: &mut TransformCtx, _args: &[Expression], _distinct: bool) -> Result<String> {
    let final_cte = label_propagation_series(ctx);
    Ok(format!("(SELECT COUNT(DISTINCT label) FROM {final_cte})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rank_unrolls_to_fixed_iteration_count() {
        let mut ctx = TransformCtx::new();
        let sql = page_rank(&mut ctx, &[], false).unwrap();
        assert!(sql.contains("json_group_array"));
        assert!(ctx.sql.get_cte().contains("_pagerank_0_pr20"));
        assert!(ctx.sql.get_cte().contains("_pagerank_0_nc"));
    }

    #[test]
    fn top_page_rank_adds_limit_inside_ordering_subquery() {
        let mut ctx = TransformCtx::new();
        let lit = Expression::Literal { span: 0, value: Literal::Integer(5) };
        let sql = top_page_rank(&mut ctx, &[lit], false).unwrap();
        assert!(sql.contains("ORDER BY score DESC LIMIT 5"));
    }

    #[test]
    fn label_propagation_breaks_ties_by_lowest_label() {
        let mut ctx = TransformCtx::new();
        let _ = label_propagation(&mut ctx, &[], false).unwrap();
        assert!(ctx.sql.get_cte().contains("ORDER BY COUNT(*) DESC, prev.label ASC"));
    }
}
