use thiserror::Error;

/// Crate-wide error taxonomy (spec §7).
///
/// Every deeper transform function returns one of these on first failure;
/// partial SQL accumulated in the builder is discarded by the caller.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CypherSqlError {
    #[error("parse error at byte {span}: {message}")]
    Parse { span: usize, message: String },

    #[error("unsupported clause: {0}")]
    UnsupportedClause(String),

    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),

    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Kept for interface completeness with the C original's error surface
    /// (spec §6/§7); unreachable in practice since Rust aborts on OOM.
    #[error("out of memory")]
    OutOfMemory,
}

pub type Result<T> = std::result::Result<T, CypherSqlError>;
