//! Finalizer (spec §4.10): flushes the pending property joins discovered
//! during RETURN/WITH into the FROM chain, prepends the accumulated CTE
//! prefix, and hands back the one SQL string plus its parameter list the
//! rest of the crate's callers deal in.

use crate::transform_ctx::TransformCtx;

/// Runs the three finalization steps and returns `(sql, params)`.
///
/// A query's shape determines which of `ctx.sql` (read path) and
/// `ctx.write` (write path) is populated. MERGE populates both — its
/// existence check and its conditional write are not wired together end to
/// end (DESIGN.md), so both halves are emitted as separate statements,
/// existence check first.
pub fn finalize(ctx: &mut TransformCtx) -> (String, Vec<String>) {
    let union_body = ctx.output().as_str().to_string();
    let body = if !union_body.is_empty() {
        union_body
    } else {
        let joins = ctx.take_pending_property_joins();
        for j in &joins {
            ctx.sql.join_raw(&j);
        }
        let read_sql = if ctx.sql.has_from() || !ctx.sql.select_is_empty() {
            let stmt = ctx.sql.to_string_body().unwrap_or_else(|| "SELECT 1".to_string());
            let cte = ctx.sql.get_cte();
            Some(if cte.is_empty() { stmt } else { format!("{cte} {stmt}") })
        } else {
            None
        };
        let write_sql = ctx.write.finish();

        match (read_sql, write_sql.is_empty()) {
            (Some(r), true) => r,
            (Some(r), false) => format!("{r}; {write_sql}"),
            (None, false) => write_sql,
            (None, true) => "SELECT 1".to_string(),
        }
    };
    (body, ctx.params().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_query_needs_no_semicolon_joiner() {
        let mut ctx = TransformCtx::new();
        ctx.sql.from("nodes", Some("n"));
        ctx.sql.select("n.id", None);
        let (sql, _) = finalize(&mut ctx);
        assert_eq!(sql, "SELECT n.id FROM nodes AS n");
    }

    #[test]
    fn write_only_query_emits_statements_joined_by_semicolon() {
        let mut ctx = TransformCtx::new();
        ctx.write.raw("INSERT INTO nodes DEFAULT VALUES".to_string());
        let (sql, _) = finalize(&mut ctx);
        assert_eq!(sql, "INSERT INTO nodes DEFAULT VALUES");
    }

    #[test]
    fn empty_query_falls_back_to_select_one() {
        let mut ctx = TransformCtx::new();
        let (sql, _) = finalize(&mut ctx);
        assert_eq!(sql, "SELECT 1");
    }
}
