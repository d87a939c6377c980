//! Read-only statement guard.
//!
//! Parses caller-supplied SQL and decides whether it is a single read-only
//! SELECT before it gets anywhere near the warehouse connection. The guard is
//! pure: no I/O, no rewriting of rejected input.

mod blacklist;
mod parser;

pub use blacklist::BLOCKED_KEYWORDS;
pub use parser::{validate_query, SqlGuard};

use std::fmt;

use thiserror::Error;

/// Reasons the guard refuses a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Empty query")]
    Empty,

    #[error("No valid SQL statement found")]
    NoStatement,

    #[error("Multiple statements detected ({0}); only single SELECT queries are allowed")]
    MultipleStatements(usize),

    #[error("Statement type '{kind}' not allowed; only SELECT is permitted")]
    DisallowedStatement { kind: StatementKind },

    #[error("Query must start with SELECT or WITH (CTE), found: {found}")]
    InvalidPrefix { found: String },

    #[error("Semicolons within query body are not allowed (multi-statement risk)")]
    EmbeddedSeparator,

    #[error("Blocked keyword '{keyword}' detected; only read-only SELECT queries are allowed")]
    BlockedKeyword { keyword: String },

    #[error("Could not tokenize SQL: {0}")]
    Tokenize(String),
}

/// The kind of SQL statement detected by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    /// `SELECT ... INTO`, which creates a table.
    SelectInto,
    Insert,
    Update,
    Delete,
    Drop,
    Truncate,
    Alter,
    Create,
    Grant,
    Revoke,
    Explain,
    Pragma,
    Attach,
    Transaction,
    Analyze,
    /// Any other statement, named by its leading keyword.
    Other(String),
}

impl StatementKind {
    /// Returns true for the only kind the sandbox executes.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Select)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::SelectInto => write!(f, "SELECT INTO"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Truncate => write!(f, "TRUNCATE"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Grant => write!(f, "GRANT"),
            Self::Revoke => write!(f, "REVOKE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Pragma => write!(f, "PRAGMA"),
            Self::Attach => write!(f, "ATTACH"),
            Self::Transaction => write!(f, "TRANSACTION"),
            Self::Analyze => write!(f, "ANALYZE"),
            Self::Other(keyword) => write!(f, "{keyword}"),
        }
    }
}
