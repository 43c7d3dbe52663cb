//! Growing byte buffer with formatted-append (spec §4.1).
//!
//! A thin wrapper over `String`. The C original's rationale — "a single
//! helper prevents ad-hoc buffer code" across every downstream component —
//! still holds even though Rust's `String` already amortizes growth: every
//! clause/expression transform composes SQL text through this one seam.

use std::fmt::Write as _;

/// Escapes a value for embedding inside a single-quoted SQL string literal.
///
/// Every call site that splices a Cypher-supplied name (a label, a
/// relationship type, a property key) into generated SQL text must go
/// through this — labels and keys are ordinary identifiers syntactically,
/// but backtick-quoted identifiers (`` `na'me` ``) can carry a literal
/// quote, and without escaping that quote would close the SQL string early.
pub fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Maps a Cypher-supplied name onto characters safe for splicing into a
/// generated, unquoted SQL identifier (a synthetic alias). Cypher names can
/// come from backtick-quoted identifiers and carry spaces, quotes, or other
/// punctuation a bare SQL identifier can't; anything outside `[A-Za-z0-9_]`
/// becomes `_`.
pub fn ident_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DynBuf(String);

impl DynBuf {
    pub fn new() -> Self {
        DynBuf(String::new())
    }

    pub fn append_str(&mut self, s: &str) {
        self.0.push_str(s);
    }

    pub fn append_char(&mut self, c: char) {
        self.0.push(c);
    }

    pub fn append_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        let _ = self.0.write_fmt(args);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Take ownership of the accumulated text, resetting the buffer to empty.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `DynBuf::append_fmt(format_args!(...))`, matching the C original's
/// `dbuf_appendf` printf-style call sites.
#[macro_export]
macro_rules! append_fmt {
    ($buf:expr, $($arg:tt)*) => {
        $buf.append_fmt(format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_finish() {
        let mut b = DynBuf::new();
        b.append_str("SELECT ");
        b.append_fmt(format_args!("{} AS {}", "n.id", "\"n.id\""));
        assert_eq!(b.as_str(), "SELECT n.id AS \"n.id\"");
        let s = b.finish();
        assert_eq!(s, "SELECT n.id AS \"n.id\"");
        assert!(b.is_empty());
    }

    #[test]
    fn clear_keeps_buffer_usable() {
        let mut b = DynBuf::new();
        b.append_str("abc");
        b.clear();
        assert!(b.is_empty());
        b.append_str("def");
        assert_eq!(b.as_str(), "def");
    }
}
