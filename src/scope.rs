//! Per-query variable-and-path registry (spec §4.4).
//!
//! Resolution is always by name within the current scope; a new `Scope` is
//! created per top-level query and reset at UNION boundaries and at
//! WITH/UNWIND boundaries, since those clauses redefine what is in scope.

use std::collections::HashMap;

use crate::ast::PathElement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Node,
    Edge,
    Projected,
    Path,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub alias: String,
    pub kind: VariableKind,
    pub inherited: bool,
    pub label_hint: Option<String>,
    pub source_expr: Option<String>,
    pub alias_is_id: bool,
    pub graph: Option<String>,
    pub path_elements: Option<Vec<PathElement>>,
}

/// Variable-and-path registry threaded through one query's transform.
///
/// Name collisions within the same scope replace the existing entry —
/// callers that need save/restore semantics (list predicates, reduce) must
/// snapshot the prior entry themselves and restore it on exit.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    variables: HashMap<String, Variable>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn register_node(&mut self, name: &str, alias: &str, label: Option<&str>) {
        self.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                alias: alias.to_string(),
                kind: VariableKind::Node,
                inherited: false,
                label_hint: label.map(str::to_string),
                source_expr: None,
                alias_is_id: false,
                graph: None,
                path_elements: None,
            },
        );
    }

    pub fn register_edge(&mut self, name: &str, alias: &str, rel_type: Option<&str>) {
        self.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                alias: alias.to_string(),
                kind: VariableKind::Edge,
                inherited: false,
                label_hint: rel_type.map(str::to_string),
                source_expr: None,
                alias_is_id: false,
                graph: None,
                path_elements: None,
            },
        );
    }

    /// Registers a WITH/UNWIND-projected variable. `alias` is the CTE
    /// column reference callers should emit (e.g. `_with_0.n`); `source_expr`
    /// is the SQL expression that produced it, for callers needing the raw
    /// form rather than the projected column.
    pub fn register_projected(&mut self, name: &str, alias: &str, source_expr: &str, alias_is_id: bool) {
        self.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                alias: alias.to_string(),
                kind: VariableKind::Projected,
                inherited: false,
                label_hint: None,
                source_expr: Some(source_expr.to_string()),
                alias_is_id,
                graph: None,
                path_elements: None,
            },
        );
    }

    pub fn register_path(&mut self, name: &str, alias: &str, elements: Vec<PathElement>) {
        self.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                alias: alias.to_string(),
                kind: VariableKind::Path,
                inherited: false,
                label_hint: None,
                source_expr: None,
                alias_is_id: false,
                graph: None,
                path_elements: Some(elements),
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn get_alias(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(|v| v.alias.as_str())
    }

    pub fn is_projected(&self, name: &str) -> bool {
        matches!(self.variables.get(name), Some(v) if v.kind == VariableKind::Projected)
    }

    pub fn is_edge(&self, name: &str) -> bool {
        matches!(self.variables.get(name), Some(v) if v.kind == VariableKind::Edge)
    }

    pub fn is_path(&self, name: &str) -> bool {
        matches!(self.variables.get(name), Some(v) if v.kind == VariableKind::Path)
    }

    pub fn alias_is_id(&self, name: &str) -> bool {
        matches!(self.variables.get(name), Some(v) if v.alias_is_id)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Called between sibling clauses so subsequent clause transforms know
    /// which variables pre-exist.
    pub fn mark_all_inherited(&mut self) {
        log::trace!("Scope: marking {} variable(s) inherited", self.variables.len());
        for v in self.variables.values_mut() {
            v.inherited = true;
        }
    }

    /// Called at UNION-branch and WITH/UNWIND boundaries, which redefine
    /// what is in scope.
    pub fn reset(&mut self) {
        log::debug!("Scope: resetting, dropping {} variable(s)", self.variables.len());
        self.variables.clear();
    }

    pub fn set_graph(&mut self, name: &str, graph: &str) {
        if let Some(v) = self.variables.get_mut(name) {
            v.graph = Some(graph.to_string());
        }
    }

    /// Snapshots the current entry for `name`, if any, so a caller (list
    /// predicate / reduce translation) can restore it after shadowing the
    /// name with a loop variable.
    pub fn snapshot(&self, name: &str) -> Option<Variable> {
        self.variables.get(name).cloned()
    }

    pub fn restore(&mut self, name: &str, snapshot: Option<Variable>) {
        match snapshot {
            Some(v) => {
                self.variables.insert(name.to_string(), v);
            }
            None => {
                self.variables.remove(name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup_node() {
        let mut s = Scope::new();
        s.register_node("n", "_gql_default_alias_0", Some("Person"));
        assert!(s.is_bound("n"));
        assert_eq!(s.get_alias("n"), Some("_gql_default_alias_0"));
        assert!(!s.is_edge("n"));
    }

    #[test]
    fn mark_all_inherited_flips_every_entry() {
        let mut s = Scope::new();
        s.register_node("n", "_gql_default_alias_0", None);
        s.register_edge("r", "_gql_default_alias_1", None);
        s.mark_all_inherited();
        assert!(s.lookup("n").unwrap().inherited);
        assert!(s.lookup("r").unwrap().inherited);
    }

    #[test]
    fn reset_clears_all_entries() {
        let mut s = Scope::new();
        s.register_node("n", "_gql_default_alias_0", None);
        s.reset();
        assert!(!s.is_bound("n"));
    }

    #[test]
    fn save_restore_roundtrips_shadowed_entry() {
        let mut s = Scope::new();
        s.register_node("x", "_gql_default_alias_0", None);
        let snap = s.snapshot("x");
        s.register_projected("x", "json_each.value", "json_each.value", true);
        assert!(s.is_projected("x"));
        s.restore("x", snap);
        assert!(!s.is_projected("x"));
        assert_eq!(s.get_alias("x"), Some("_gql_default_alias_0"));
    }

    #[test]
    fn restore_with_no_prior_snapshot_removes_entry() {
        let mut s = Scope::new();
        s.register_projected("x", "json_each.value", "json_each.value", true);
        s.restore("x", None);
        assert!(!s.is_bound("x"));
    }
}
