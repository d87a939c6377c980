//! Query execution for the sandbox.
//!
//! Composes the guard and the read-only connection, enforces the time budget
//! and row cap, and keeps the audit trail.

mod audit;
mod executor;

pub use audit::{AuditEntry, AuditLog};
pub use executor::{ExecutorSettings, SqlExecutor};
