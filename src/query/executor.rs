//! Guarded query execution.
//!
//! [`SqlExecutor`] is the only way callers reach the warehouse. Every call is
//! validated by the guard, run on the single read-only connection under a
//! time budget, capped at `max_rows`, and recorded in the audit log.

use std::ffi::c_int;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use super::audit::{AuditEntry, AuditLog};
use crate::db::{QueryResult, ReadOnlyConnection, Row, Value};
use crate::error::{Result, SandboxError};
use crate::safety::SqlGuard;

/// VM instructions between two deadline checks.
const PROGRESS_STEPS: c_int = 1000;

const TABLE_LIST_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

/// Limits applied by an executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Maximum rows returned per query.
    pub max_rows: usize,
    /// Wall-clock budget per query. Zero disables the deadline.
    pub query_timeout: Duration,
    /// How long to wait on a locked database file.
    pub busy_timeout: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_rows: 500,
            query_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(30),
        }
    }
}

/// Connection lifecycle. A closed session never reopens.
#[derive(Debug)]
enum Session {
    Idle,
    Open(ReadOnlyConnection),
    Closed,
}

impl Session {
    fn connection(&mut self, path: &Path, busy_timeout: Duration) -> Result<&ReadOnlyConnection> {
        if matches!(self, Session::Idle) {
            let conn = ReadOnlyConnection::open(path, busy_timeout)?;
            info!("Opened warehouse connection: {}", path.display());
            *self = Session::Open(conn);
        }
        match &*self {
            Session::Open(conn) => Ok(conn),
            Session::Closed => Err(SandboxError::Closed),
            Session::Idle => Err(SandboxError::internal("connection was not opened")),
        }
    }
}

/// Rows read from one statement.
struct Fetched {
    columns: Vec<String>,
    rows: Vec<Row>,
    truncated: bool,
}

/// Read-only query executor over one warehouse file.
///
/// Safe to share between threads; statements run one at a time.
#[derive(Debug)]
pub struct SqlExecutor {
    db_path: PathBuf,
    settings: ExecutorSettings,
    guard: SqlGuard,
    session: Mutex<Session>,
    audit: AuditLog,
}

impl SqlExecutor {
    /// Creates an executor for `db_path`.
    ///
    /// The file must exist; the connection itself is opened on first use.
    pub fn new(db_path: impl Into<PathBuf>, settings: ExecutorSettings) -> Result<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(SandboxError::NotFound(db_path));
        }
        if settings.max_rows == 0 {
            return Err(SandboxError::config("max_rows must be at least 1"));
        }

        Ok(Self {
            db_path,
            settings,
            guard: SqlGuard::new(),
            session: Mutex::new(Session::Idle),
            audit: AuditLog::new(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Validates and runs `sql`.
    ///
    /// Never fails: rejections, timeouts and engine errors are reported in
    /// [`QueryResult::error`]. Every call appends one audit entry.
    pub fn execute(&self, sql: &str) -> QueryResult {
        let start = Instant::now();
        let entry = AuditEntry::begin(sql);

        let normalized = match self.guard.validate(sql) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("Query rejected by guard: {e}");
                let result =
                    QueryResult::failure(sql, SandboxError::from(e).to_string(), start.elapsed());
                self.audit.append(entry.complete(&result));
                return result;
            }
        };
        debug!("Executing: {normalized}");

        let mut session = self.session.lock();
        let result = match self.run(&mut session, &normalized, self.settings.max_rows) {
            Ok(fetched) => {
                if fetched.truncated {
                    warn!("Result truncated to {} rows", self.settings.max_rows);
                }
                QueryResult::success(
                    normalized,
                    fetched.columns,
                    fetched.rows,
                    fetched.truncated,
                    start.elapsed(),
                )
            }
            Err(e) => {
                warn!("Query failed: {e}");
                QueryResult::failure(normalized, e.to_string(), start.elapsed())
            }
        };
        self.audit.append(entry.complete(&result));
        drop(session);

        result
    }

    /// Returns the exact number of rows `sql` produces.
    ///
    /// The query is validated again, wrapped in `COUNT(*)` and run with a
    /// one-row limit. Counts are not audited.
    pub fn count_rows(&self, sql: &str) -> Result<u64> {
        let normalized = self.guard.validate(sql)?;
        // Own lines, so a trailing line comment cannot swallow the parenthesis.
        let wrapped =
            format!("SELECT COUNT(*) AS total_rows FROM (\n{normalized}\n) AS __count_subquery");

        let fetched = {
            let mut session = self.session.lock();
            self.run(&mut session, &wrapped, 1)?
        };

        fetched
            .rows
            .first()
            .and_then(|row| row.values().first())
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| SandboxError::internal("COUNT(*) returned no value"))
    }

    /// Lists user tables, through [`execute`](Self::execute).
    pub fn table_names(&self) -> Result<Vec<String>> {
        let result = self.execute(TABLE_LIST_SQL);
        if let Some(error) = result.error {
            return Err(SandboxError::engine(error));
        }
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str))
            .map(String::from)
            .collect())
    }

    /// Returns the `CREATE TABLE` text for `table`, or `None` if no such
    /// table exists. The name is checked against the live table list before
    /// it is placed in any SQL.
    pub fn table_schema(&self, table: &str) -> Result<Option<String>> {
        if !self.table_names()?.iter().any(|name| name == table) {
            return Ok(None);
        }

        let sql = format!(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            table.replace('\'', "''")
        );
        let result = self.execute(&sql);
        if let Some(error) = result.error {
            return Err(SandboxError::engine(error));
        }
        Ok(result
            .rows
            .first()
            .and_then(|row| row.get("sql"))
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Returns a snapshot of the audit log, oldest first.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.entries()
    }

    pub fn audit_len(&self) -> usize {
        self.audit.len()
    }

    /// Closes the connection. Later calls fail with [`SandboxError::Closed`].
    pub fn close(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.session.lock(), Session::Closed);
        match previous {
            Session::Open(conn) => {
                info!("Closing warehouse connection: {}", self.db_path.display());
                conn.close()
            }
            Session::Idle | Session::Closed => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.session.lock(), Session::Closed)
    }

    /// Runs already-validated SQL. The caller holds the session lock.
    fn run(&self, session: &mut Session, sql: &str, max_rows: usize) -> Result<Fetched> {
        let conn = session.connection(&self.db_path, self.settings.busy_timeout)?;
        let handle = conn.handle();

        let deadline = ProgressDeadline::install(handle, self.settings.query_timeout);
        match fetch_rows(handle, sql, max_rows) {
            Ok(fetched) => Ok(fetched),
            Err(_) if deadline.expired() => {
                warn!("Query aborted after {:?}", self.settings.query_timeout);
                Err(SandboxError::Timeout(self.settings.query_timeout))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Installs a progress handler that aborts the running statement once the
/// budget is spent. The handler is removed when this value drops.
struct ProgressDeadline<'c> {
    conn: &'c Connection,
    expired: Arc<AtomicBool>,
    installed: bool,
}

impl<'c> ProgressDeadline<'c> {
    fn install(conn: &'c Connection, budget: Duration) -> Self {
        let expired = Arc::new(AtomicBool::new(false));
        let deadline = match Instant::now().checked_add(budget) {
            Some(deadline) if !budget.is_zero() => deadline,
            _ => {
                return Self {
                    conn,
                    expired,
                    installed: false,
                }
            }
        };

        let flag = Arc::clone(&expired);
        conn.progress_handler(
            PROGRESS_STEPS,
            Some(move || {
                if Instant::now() >= deadline {
                    flag.store(true, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }),
        );

        Self {
            conn,
            expired,
            installed: true,
        }
    }

    fn expired(&self) -> bool {
        self.expired.load(Ordering::Relaxed)
    }
}

impl Drop for ProgressDeadline<'_> {
    fn drop(&mut self) {
        if self.installed {
            self.conn.progress_handler(0, None::<fn() -> bool>);
        }
    }
}

/// Reads at most `max_rows + 1` rows; the extra row only marks truncation.
fn fetch_rows(conn: &Connection, sql: &str, max_rows: usize) -> rusqlite::Result<Fetched> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let shared: Arc<[String]> = columns.clone().into();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut truncated = false;
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        if rows.len() == max_rows {
            truncated = true;
            break;
        }
        let values = (0..width)
            .map(|idx| row.get_ref(idx).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(Row::new(Arc::clone(&shared), values));
    }

    Ok(Fetched {
        columns,
        rows,
        truncated,
    })
}
