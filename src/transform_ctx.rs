//! Owns every piece of state that survives across clause transforms
//! (spec §3 "TransformCtx", §5).
//!
//! One `TransformCtx` serves one query; it is never shared across queries.
//! When it is dropped, every byte allocated during translation goes with it.

use std::collections::HashSet;

use crate::dynbuf::DynBuf;
use crate::scope::Scope;
use crate::sql_builder::SqlBuilder;
use crate::write_builder::WriteBuilder;

#[derive(Debug, Clone, Default)]
pub struct TransformCtx {
    pub sql: SqlBuilder,
    pub write: WriteBuilder,
    pub scope: Scope,
    params: Vec<String>,
    params_seen: HashSet<String>,
    cte_counter: u32,
    alias_counter: u32,
    output: DynBuf,
    pub in_comparison: bool,
    pub in_union: bool,
    pub current_graph: Option<String>,
    pending_property_joins: Vec<String>,
}

impl TransformCtx {
    pub fn new() -> Self {
        TransformCtx::default()
    }

    /// Monotone per-query alias counter; aliases must stay unique for the
    /// life of the query since the same identifier may appear in multiple
    /// MATCH clauses and in CTE grafts.
    pub fn next_alias(&mut self) -> String {
        let n = self.alias_counter;
        self.alias_counter += 1;
        let alias = format!("_gql_default_alias_{n}");
        log::trace!("TransformCtx: assigning alias {}", alias);
        alias
    }

    /// A prefixed counter for CTE names (`_with_0`, `_unwind_1`,
    /// `_varlen_path_2`, `_pagerank_0_pr3`, ...).
    pub fn next_cte_name(&mut self, prefix: &str) -> String {
        let n = self.cte_counter;
        self.cte_counter += 1;
        let name = format!("_{prefix}_{n}");
        log::trace!("TransformCtx: assigning CTE name {}", name);
        name
    }

    /// Records a `$name` reference in first-appearance order, returning the
    /// `:name` SQL placeholder to emit. Duplicates share one slot.
    pub fn add_param(&mut self, name: &str) -> String {
        if self.params_seen.insert(name.to_string()) {
            self.params.push(name.to_string());
        }
        format!(":{name}")
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn output(&mut self) -> &mut DynBuf {
        &mut self.output
    }

    /// Buffers a join fragment discovered while translating an aggregate
    /// over a property access (spec §4.8/§4.10). RETURN/WITH processing
    /// already has the FROM chain built by the time it learns it needs
    /// these joins, so the Finalizer grafts them in afterward rather than
    /// this call site threading them back through every clause transform.
    pub fn add_pending_property_join(&mut self, join_sql: String) {
        self.pending_property_joins.push(join_sql);
    }

    pub fn take_pending_property_joins(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending_property_joins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_counter_is_monotone_and_unique() {
        let mut ctx = TransformCtx::new();
        assert_eq!(ctx.next_alias(), "_gql_default_alias_0");
        assert_eq!(ctx.next_alias(), "_gql_default_alias_1");
    }

    #[test]
    fn param_dedup_preserves_first_occurrence_order() {
        let mut ctx = TransformCtx::new();
        assert_eq!(ctx.add_param("x"), ":x");
        assert_eq!(ctx.add_param("y"), ":y");
        assert_eq!(ctx.add_param("x"), ":x");
        assert_eq!(ctx.params(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn cte_names_carry_a_distinguishing_prefix() {
        let mut ctx = TransformCtx::new();
        assert_eq!(ctx.next_cte_name("with"), "_with_0");
        assert_eq!(ctx.next_cte_name("unwind"), "_unwind_1");
    }
}
