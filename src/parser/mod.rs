//! openCypher parser: hand-written recursive descent over `nom` 8,
//! producing `crate::ast` nodes directly. Grounded on the teacher's
//! `open_cypher_parser` module, adapted from a borrowed/lifetime-parameterized
//! AST to the owned one `crate::ast` defines.

mod clauses;
mod common;
mod errors;
mod expr;
mod pattern;

use nom::Parser;

use crate::ast::CypherStatement;
use crate::error::CypherSqlError;

/// Parses a full openCypher statement (a query, possibly with UNION
/// branches, or a standalone `CALL`) into the transform layer's AST.
///
/// Any unconsumed trailing input (besides whitespace and an optional
/// trailing `;`) is treated as a syntax error, matching the "errors surface
/// as a single message string" contract (spec §7).
pub fn parse(query: &str) -> Result<CypherStatement, CypherSqlError> {
    let trimmed = query.trim_end().trim_end_matches(';');

    let query_result = clauses::parse_query.parse(trimmed);
    let call_result = clauses::parse_standalone_call.parse(trimmed);

    match (query_result, call_result) {
        (Ok((rest, q)), _) if rest.trim().is_empty() => Ok(CypherStatement::Query(q)),
        (_, Ok((rest, c))) if rest.trim().is_empty() => Ok(CypherStatement::ProcedureCall(c)),
        (Ok((rest, _)), _) => Err(syntax_error(rest)),
        (Err(e), _) => Err(to_cypher_error(e)),
    }
}

fn syntax_error(rest: &str) -> CypherSqlError {
    let excerpt: String = rest.chars().take(40).collect();
    CypherSqlError::Parse { span: 0, message: format!("unexpected trailing input near '{excerpt}'") }
}

fn to_cypher_error(err: nom::Err<errors::ParseErr<'_>>) -> CypherSqlError {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => CypherSqlError::Parse { span: 0, message: e.to_string() },
        nom::Err::Incomplete(_) => CypherSqlError::Parse { span: 0, message: "incomplete input".to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Clause, PathElement};

    #[test]
    fn parses_simple_match_return() {
        let stmt = parse("MATCH (n:Person) RETURN n.name").unwrap();
        match stmt {
            CypherStatement::Query(q) => {
                assert_eq!(q.clauses.len(), 2);
                match &q.clauses[0] {
                    Clause::Match(m) => {
                        assert_eq!(m.patterns.len(), 1);
                        match &m.patterns[0].elements[0] {
                            PathElement::Node(n) => assert_eq!(n.labels, vec!["Person".to_string()]),
                            _ => panic!("expected node"),
                        }
                    }
                    _ => panic!("expected MATCH"),
                }
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn parses_union_all() {
        let stmt = parse("MATCH (n) RETURN n.id UNION ALL MATCH (m) RETURN m.id").unwrap();
        match stmt {
            CypherStatement::Query(q) => {
                let union = q.union.expect("expected union branch");
                assert!(union.all);
            }
            _ => panic!("expected query"),
        }
    }

    #[test]
    fn parses_standalone_call_with_yield() {
        let stmt = parse("CALL db.labels() YIELD label").unwrap();
        match stmt {
            CypherStatement::ProcedureCall(c) => {
                assert_eq!(c.procedure_name, "db.labels");
                assert_eq!(c.yield_items, Some(vec!["label".to_string()]));
            }
            _ => panic!("expected standalone call"),
        }
    }

    #[test]
    fn rejects_trailing_garbage() {
        let err = parse("MATCH (n) RETURN n.id GARBAGE(((").unwrap_err();
        matches!(err, CypherSqlError::Parse { .. });
    }
}
