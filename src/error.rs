//! Error types for the sandbox.
//!
//! Defines the main error enum used throughout the crate. Guard, template and
//! tool failures keep their own enums so callers can match on them, and are
//! wrapped here when they cross module boundaries.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::safety::GuardError;
use crate::templates::TemplateError;
use crate::tools::ToolError;

/// Main error type for sandbox operations.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The SQL text violates the read-only policy.
    #[error("Query rejected: {0}")]
    Guard(#[from] GuardError),

    /// Execution exceeded the configured time budget.
    #[error("Query exceeded timeout of {}s", format_budget(.0))]
    Timeout(Duration),

    /// The database engine rejected or failed the statement.
    #[error("Database error: {0}")]
    Engine(String),

    /// The warehouse file does not exist.
    #[error("Database not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The executor was closed by its owner.
    #[error("Executor is closed")]
    Closed,

    /// Configuration errors (invalid config file, bad limits, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template rendering failed before any SQL was produced.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Tool call could not be decoded or dispatched.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    /// Creates an engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Guard(_) => "Guard Error",
            Self::Timeout(_) => "Timeout Error",
            Self::Engine(_) => "Engine Error",
            Self::NotFound(_) => "Not Found Error",
            Self::Closed => "Closed Error",
            Self::Config(_) => "Configuration Error",
            Self::Template(_) => "Template Error",
            Self::Tool(_) => "Tool Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns true if the caller may retry with a different query.
    ///
    /// A missing warehouse or a closed executor needs a new executor.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NotFound(_) | Self::Closed | Self::Config(_))
    }
}

impl From<rusqlite::Error> for SandboxError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Engine(e.to_string())
    }
}

fn format_budget(budget: &Duration) -> String {
    if budget.subsec_nanos() == 0 {
        budget.as_secs().to_string()
    } else {
        format!("{:.3}", budget.as_secs_f64())
    }
}

/// Result type alias using SandboxError.
pub type Result<T> = std::result::Result<T, SandboxError>;
