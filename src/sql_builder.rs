//! Clause-addressable SQL assembler (spec §4.2).
//!
//! Every clause handler calls these methods in whatever order the Cypher
//! clause happens to visit tables/conditions in; `to_string`/`to_subquery`
//! defer the canonical SQL keyword order until emission, so MATCH can add
//! joins, RETURN can add selects, and WHERE can add conditions without any
//! of them knowing where their contribution lands in the final string.

use crate::dynbuf::DynBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Cross,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => " JOIN ",
            JoinKind::Left => " LEFT JOIN ",
            JoinKind::Cross => " CROSS JOIN ",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SqlBuilder {
    cte: DynBuf,
    select: DynBuf,
    from: DynBuf,
    joins: DynBuf,
    where_buf: DynBuf,
    group_by: DynBuf,
    order_by: DynBuf,
    limit: i64,
    offset: i64,
    distinct: bool,
    select_count: usize,
    cte_count: usize,
    where_count: usize,
    group_count: usize,
    order_count: usize,
    any_recursive_cte: bool,
}

impl SqlBuilder {
    pub fn new() -> Self {
        SqlBuilder {
            limit: -1,
            offset: -1,
            ..Default::default()
        }
    }

    pub fn select(&mut self, expr: &str, alias: Option<&str>) {
        if self.select_count > 0 {
            self.select.append_str(", ");
        }
        self.select.append_str(expr);
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            crate::append_fmt!(self.select, " AS {alias}");
        }
        self.select_count += 1;
    }

    pub fn distinct(&mut self) {
        self.distinct = true;
    }

    /// Overwrites the FROM buffer — a query has one FROM root.
    pub fn from(&mut self, table: &str, alias: Option<&str>) {
        self.from.clear();
        self.from.append_str(table);
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            crate::append_fmt!(self.from, " AS {alias}");
        }
    }

    pub fn join(&mut self, kind: JoinKind, table: &str, alias: Option<&str>, on: Option<&str>) {
        self.joins.append_str(kind.keyword());
        self.joins.append_str(table);
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            crate::append_fmt!(self.joins, " AS {alias}");
        }
        if kind != JoinKind::Cross {
            if let Some(on) = on {
                crate::append_fmt!(self.joins, " ON {on}");
            }
        }
    }

    /// Appends a pre-built joins fragment verbatim (aggregate-with-property
    /// optimization, spec §4.8/§4.10).
    pub fn join_raw(&mut self, sql: &str) {
        self.joins.append_str(sql);
    }

    pub fn where_(&mut self, cond: &str) {
        if self.where_count > 0 {
            self.where_buf.append_str(" AND ");
        }
        self.where_buf.append_str(cond);
        self.where_count += 1;
    }

    pub fn group_by(&mut self, expr: &str) {
        if self.group_count > 0 {
            self.group_by.append_str(", ");
        }
        self.group_by.append_str(expr);
        self.group_count += 1;
    }

    pub fn order_by(&mut self, expr: &str, desc: bool) {
        if self.order_count > 0 {
            self.order_by.append_str(", ");
        }
        self.order_by.append_str(expr);
        self.order_by.append_str(if desc { " DESC" } else { " ASC" });
        self.order_count += 1;
    }

    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) {
        if let Some(l) = limit {
            self.limit = l;
        }
        if let Some(o) = offset {
            self.offset = o;
        }
    }

    /// First call writes `WITH` (or `WITH RECURSIVE` if any CTE declared
    /// recursive); subsequent calls write `, `.
    pub fn cte(&mut self, name: &str, body: &str, recursive: bool) {
        log::debug!("SqlBuilder: emitting CTE {} (recursive={})", name, recursive);
        if recursive {
            self.any_recursive_cte = true;
        }
        if self.cte_count == 0 {
            self.cte.append_str(if self.any_recursive_cte {
                "WITH RECURSIVE "
            } else {
                "WITH "
            });
        } else {
            self.cte.append_str(", ");
            if recursive && !self.cte.as_str().starts_with("WITH RECURSIVE") {
                // A later CTE turned out recursive after earlier ones were
                // written as plain WITH: upgrade the prefix in place.
                let body_rest = self.cte.as_str().strip_prefix("WITH ").unwrap_or(self.cte.as_str()).to_string();
                self.cte.clear();
                self.cte.append_str("WITH RECURSIVE ");
                self.cte.append_str(&body_rest);
            }
        }
        crate::append_fmt!(self.cte, "{name} AS ({body})");
        self.cte_count += 1;
    }

    pub fn has_from(&self) -> bool {
        !self.from.is_empty()
    }

    pub fn get_from(&self) -> &str {
        self.from.as_str()
    }

    pub fn get_joins(&self) -> &str {
        self.joins.as_str()
    }

    pub fn get_where(&self) -> &str {
        self.where_buf.as_str()
    }

    pub fn get_group_by(&self) -> &str {
        self.group_by.as_str()
    }

    pub fn get_cte(&self) -> &str {
        self.cte.as_str()
    }

    pub fn select_is_empty(&self) -> bool {
        self.select.is_empty()
    }

    /// Emits `SELECT [DISTINCT] ... [FROM ...] [WHERE ...] [GROUP BY ...]
    /// [ORDER BY ...] [LIMIT n] [OFFSET k]`. Never includes CTEs — the
    /// Finalizer prepends those (spec §4.2, §4.10).
    pub fn to_string_body(&self) -> Option<String> {
        if self.select.is_empty() && self.from.is_empty() {
            return None;
        }
        let mut out = DynBuf::new();
        out.append_str("SELECT ");
        if self.distinct {
            out.append_str("DISTINCT ");
        }
        if self.select.is_empty() {
            out.append_char('*');
        } else {
            out.append_str(self.select.as_str());
        }
        if !self.from.is_empty() {
            out.append_str(" FROM ");
            out.append_str(self.from.as_str());
            out.append_str(self.joins.as_str());
        }
        if !self.where_buf.is_empty() {
            out.append_str(" WHERE ");
            out.append_str(self.where_buf.as_str());
        }
        if !self.group_by.is_empty() {
            out.append_str(" GROUP BY ");
            out.append_str(self.group_by.as_str());
        }
        if !self.order_by.is_empty() {
            out.append_str(" ORDER BY ");
            out.append_str(self.order_by.as_str());
        }
        self.append_limit_offset(&mut out);
        Some(out.finish())
    }

    fn append_limit_offset(&self, out: &mut DynBuf) {
        if self.limit >= 0 {
            crate::append_fmt!(out, " LIMIT {}", self.limit);
        } else if self.offset >= 0 {
            // SQLite requires LIMIT before OFFSET.
            out.append_str(" LIMIT -1");
        }
        if self.offset >= 0 {
            crate::append_fmt!(out, " OFFSET {}", self.offset);
        }
    }

    /// Identical to `to_string_body` but requires a FROM clause.
    pub fn to_subquery(&self) -> Option<String> {
        if !self.has_from() {
            return None;
        }
        self.to_string_body()
    }

    /// Clears body buffers; the CTE buffer survives unless `keep_cte` is
    /// false, letting WITH/UNWIND reset per-clause state while preserving
    /// accumulated CTEs (spec §4.2 rationale).
    pub fn reset(&mut self, keep_cte: bool) {
        if !keep_cte {
            self.cte.clear();
            self.cte_count = 0;
            self.any_recursive_cte = false;
        }
        self.select.clear();
        self.from.clear();
        self.joins.clear();
        self.where_buf.clear();
        self.group_by.clear();
        self.order_by.clear();
        self.limit = -1;
        self.offset = -1;
        self.distinct = false;
        self.select_count = 0;
        self.where_count = 0;
        self.group_count = 0;
        self.order_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emission_order_matches_canonical_sql() {
        let mut b = SqlBuilder::new();
        b.where_("a.id = 1");
        b.select("a.id", None);
        b.from("nodes", Some("a"));
        b.order_by("a.id", false);
        b.limit(Some(10), None);
        let sql = b.to_string_body().unwrap();
        assert_eq!(
            sql,
            "SELECT a.id FROM nodes AS a WHERE a.id = 1 ORDER BY a.id ASC LIMIT 10"
        );
    }

    #[test]
    fn offset_without_limit_fills_in_limit_minus_one() {
        let mut b = SqlBuilder::new();
        b.select("1", None);
        b.limit(None, Some(5));
        assert_eq!(b.to_string_body().unwrap(), "SELECT 1 LIMIT -1 OFFSET 5");
    }

    #[test]
    fn cte_buffer_excluded_from_emitters() {
        let mut b = SqlBuilder::new();
        b.cte("_with_0", "SELECT 1", false);
        b.select("1", None);
        assert!(!b.to_string_body().unwrap().contains("WITH"));
        assert_eq!(b.get_cte(), "WITH _with_0 AS (SELECT 1)");
    }

    #[test]
    fn reset_keep_cte_preserves_accumulated_ctes() {
        let mut b = SqlBuilder::new();
        b.cte("_with_0", "SELECT 1", false);
        b.select("x", None);
        b.reset(true);
        assert_eq!(b.get_cte(), "WITH _with_0 AS (SELECT 1)");
        assert!(b.select_is_empty());
    }

    #[test]
    fn idempotent_reset_reproduces_byte_identical_emission() {
        let build = |b: &mut SqlBuilder| {
            b.select("a.id", Some("\"id\""));
            b.from("nodes", Some("a"));
            b.where_("a.id > 0");
        };
        let mut b = SqlBuilder::new();
        build(&mut b);
        let first = b.to_string_body().unwrap();
        b.reset(false);
        build(&mut b);
        let second = b.to_string_body().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn to_subquery_requires_from() {
        let mut b = SqlBuilder::new();
        b.select("1", None);
        assert!(b.to_subquery().is_none());
        b.from("nodes", Some("n"));
        assert!(b.to_subquery().is_some());
    }

    /// Regardless of the order clause handlers call into the builder, the
    /// emitted text always matches canonical SQL clause order.
    #[test]
    fn emission_always_matches_canonical_clause_order_regex() {
        let canonical = regex::Regex::new(
            r"^SELECT( DISTINCT)? .+?( FROM .+?)?( WHERE .+?)?( GROUP BY .+?)?( ORDER BY .+?)?( LIMIT -?\d+)?( OFFSET \d+)?$",
        )
        .unwrap();

        let mut b = SqlBuilder::new();
        b.distinct();
        b.order_by("a.id", false);
        b.where_("a.id = 1");
        b.group_by("a.id");
        b.select("a.id", None);
        b.from("nodes", Some("a"));
        b.limit(Some(10), Some(5));
        let sql = b.to_string_body().unwrap();
        assert!(canonical.is_match(&sql), "sql did not match canonical order: {sql}");

        let mut empty = SqlBuilder::new();
        empty.select("1", None);
        let minimal = empty.to_string_body().unwrap();
        assert!(canonical.is_match(&minimal), "sql: {minimal}");
    }
}
