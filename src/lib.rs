//! `cyprsql`: a Cypher-to-SQL query compiler translating openCypher into SQL
//! executable on a SQLite-style relational property-graph schema (spec §1).
//!
//! Parses a query with [`parser::parse`], walks the resulting AST with
//! [`clause_transform::transform_query`] against a fresh [`TransformCtx`],
//! and finalizes the accumulated builder state with [`finalizer::finalize`].
//! No execution against a database happens anywhere in this crate.

pub mod algo_functions;
pub mod ast;
pub mod clause_transform;
pub mod dynbuf;
pub mod error;
pub mod expr_transform;
pub mod finalizer;
pub mod func_dispatch;
pub mod parser;
pub mod pattern_transform;
pub mod scope;
pub mod sql_builder;
pub mod transform_ctx;
pub mod write_builder;

use ast::CypherStatement;
use error::{CypherSqlError, Result};
use transform_ctx::TransformCtx;

/// Compiles one Cypher statement into a SQL string plus its ordered
/// parameter list. The only public end-to-end entry point for library
/// callers (spec §6); `main.rs`'s CLI is a thin wrapper around this.
pub fn compile(query: &str) -> Result<(String, Vec<String>)> {
    let stmt = parser::parse(query)?;
    let mut ctx = TransformCtx::new();
    match &stmt {
        CypherStatement::Query(q) => clause_transform::transform_query(&mut ctx, q)?,
        CypherStatement::ProcedureCall(call) => transform_standalone_call(&mut ctx, call)?,
    }
    Ok(finalizer::finalize(&mut ctx))
}

/// A standalone `CALL proc(args) [YIELD ...]` dispatches through the same
/// function table a RETURN-clause call would, wrapped in a trivial SELECT
/// (SPEC_FULL §3/§10). Procedures with no registered handler surface as
/// `NotImplemented`, since real procedure catalogs are out of scope here.
fn transform_standalone_call(ctx: &mut TransformCtx, call: &ast::StandaloneProcedureCall) -> Result<()> {
    let sql = func_dispatch::dispatch(ctx, &call.procedure_name, &call.arguments, false)
        .map_err(|_| CypherSqlError::NotImplemented(format!("procedure '{}'", call.procedure_name)))?;
    ctx.sql.select(&sql, None);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_simple_match_return_to_select() {
        let (sql, params) = compile("MATCH (n:Person) WHERE n.age > 30 RETURN n.name").unwrap();
        assert!(sql.starts_with("SELECT"));
        assert!(sql.contains("WHERE"));
        assert!(params.is_empty());
    }

    #[test]
    fn compiles_create_to_insert_statements() {
        let (sql, _) = compile("CREATE (n:Person {name: 'Alice'})").unwrap();
        assert!(sql.contains("INSERT INTO nodes"));
    }

    #[test]
    fn reports_parse_errors_through_cypher_sql_error() {
        let err = compile("MATCH (n RETURN n").unwrap_err();
        matches!(err, CypherSqlError::Parse { .. });
    }
}
