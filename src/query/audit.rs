//! Append-only audit trail of execution attempts.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::db::QueryResult;

/// Record of one `execute` call, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// SQL exactly as submitted.
    pub sql: String,
    pub execution_time_ms: f64,
    pub row_count: usize,
    pub truncated: bool,
    pub error: Option<String>,
    /// When the attempt started.
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Starts an entry for `sql`, stamped with the current time.
    pub(crate) fn begin(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            execution_time_ms: 0.0,
            row_count: 0,
            truncated: false,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Copies the outcome of `result` into the entry.
    pub(crate) fn complete(mut self, result: &QueryResult) -> Self {
        self.execution_time_ms = result.execution_time_ms;
        self.row_count = result.row_count;
        self.truncated = result.truncated;
        self.error = result.error.clone();
        self
    }

    /// Returns true if the attempt failed.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Ordered, append-only log. Entries are never edited or removed.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn append(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }

    /// Returns a snapshot of all entries in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
