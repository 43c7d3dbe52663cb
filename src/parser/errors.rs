//! Minimal nom-compatible error type for the Cypher parser.
//!
//! Mirrors the teacher's `open_cypher_parser::errors::OpenCypherParsingError`
//! shape (an input slice plus a message per failure) but keeps only the
//! innermost failure, since the caller only ever surfaces one message
//! (spec §7: "errors surface as a single message string").

use nom::error::{ContextError, ErrorKind, ParseError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ParseErr<'a> {
    pub input: &'a str,
    pub message: String,
}

impl<'a> ParseError<&'a str> for ParseErr<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        ParseErr { input, message: format!("{kind:?}") }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for ParseErr<'a> {
    fn add_context(input: &'a str, ctx: &'static str, other: Self) -> Self {
        // Prefer the more specific (deeper) message already carried by
        // `other`; only adopt the context if nothing more specific exists.
        if other.message == "uninitialized" {
            ParseErr { input, message: ctx.to_string() }
        } else {
            other
        }
    }
}

impl fmt::Display for ParseErr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let excerpt: String = self.input.chars().take(40).collect();
        write!(f, "{} near '{excerpt}'", self.message)
    }
}
