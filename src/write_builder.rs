//! Append-only assembler for INSERT/DELETE write statements (spec §4.3).
//!
//! Sibling of [`crate::sql_builder::SqlBuilder`]: where that one defers
//! ordering until emission, this one has no ordering problem to defer —
//! CREATE/SET/REMOVE/DELETE each just append one more statement to the
//! sequence and the whole thing is joined with `; ` at the end.

use crate::dynbuf::DynBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertConflict {
    None,
    Replace,
    Ignore,
}

impl InsertConflict {
    fn keyword(self) -> &'static str {
        match self {
            InsertConflict::None => "INSERT",
            InsertConflict::Replace => "INSERT OR REPLACE",
            InsertConflict::Ignore => "INSERT OR IGNORE",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteBuilder {
    statements: Vec<String>,
}

impl WriteBuilder {
    pub fn new() -> Self {
        WriteBuilder::default()
    }

    pub fn insert_values(&mut self, conflict: InsertConflict, table: &str, cols: &[&str], vals: &[&str]) {
        let mut buf = DynBuf::new();
        buf.append_str(conflict.keyword());
        crate::append_fmt!(buf, " INTO {table} ({}) VALUES ({})", cols.join(", "), vals.join(", "));
        self.statements.push(buf.finish());
    }

    pub fn insert_select(&mut self, conflict: InsertConflict, table: &str, cols: &[&str], select: &str) {
        let mut buf = DynBuf::new();
        buf.append_str(conflict.keyword());
        crate::append_fmt!(buf, " INTO {table} ({}) {select}", cols.join(", "));
        self.statements.push(buf.finish());
    }

    pub fn delete(&mut self, table: &str, where_cond: Option<&str>) {
        let mut buf = DynBuf::new();
        crate::append_fmt!(buf, "DELETE FROM {table}");
        if let Some(cond) = where_cond {
            crate::append_fmt!(buf, " WHERE {cond}");
        }
        self.statements.push(buf.finish());
    }

    pub fn delete_in_subquery(&mut self, table: &str, key_col: &str, subquery: &str) {
        let mut buf = DynBuf::new();
        crate::append_fmt!(buf, "DELETE FROM {table} WHERE {key_col} IN ({subquery})");
        self.statements.push(buf.finish());
    }

    /// Passthrough for statements built elsewhere (e.g. the pattern-derived
    /// SELECT a SET/REMOVE rewrites as INSERT...SELECT against).
    pub fn raw(&mut self, statement: String) {
        self.statements.push(statement);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn finish(&self) -> String {
        self.statements.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_multiple_statements_with_semicolons() {
        let mut b = WriteBuilder::new();
        b.insert_values(InsertConflict::None, "nodes", &["id"], &["1"]);
        b.delete("edges", Some("source_id = 1"));
        assert_eq!(
            b.finish(),
            "INSERT INTO nodes (id) VALUES (1); DELETE FROM edges WHERE source_id = 1"
        );
    }

    #[test]
    fn conflict_keyword_prefixes_insert() {
        let mut b = WriteBuilder::new();
        b.insert_values(InsertConflict::Replace, "node_props_text", &["node_id", "key_id", "value"], &["1", "2", "'x'"]);
        assert_eq!(
            b.finish(),
            "INSERT OR REPLACE INTO node_props_text (node_id, key_id, value) VALUES (1, 2, 'x')"
        );
    }

    #[test]
    fn delete_in_subquery_builds_in_clause() {
        let mut b = WriteBuilder::new();
        b.delete_in_subquery("node_labels", "node_id", "SELECT id FROM nodes WHERE id = 1");
        assert_eq!(
            b.finish(),
            "DELETE FROM node_labels WHERE node_id IN (SELECT id FROM nodes WHERE id = 1)"
        );
    }
}
