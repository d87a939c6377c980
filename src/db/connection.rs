//! Read-only SQLite connection.
//!
//! Three independent layers keep the warehouse untouched, all active from
//! open time:
//!
//! 1. The file is opened through a `mode=ro` URI with read-only open flags.
//! 2. `PRAGMA query_only` is switched on for the session.
//! 3. An authorizer callback denies every engine action that is not a read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::{Connection, OpenFlags};
use tracing::debug;
use url::Url;

use crate::error::{Result, SandboxError};

/// Lower bound for the busy timeout applied to the connection.
const MIN_BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// A connection to the warehouse that can only read.
#[derive(Debug)]
pub struct ReadOnlyConnection {
    conn: Connection,
    path: PathBuf,
}

impl ReadOnlyConnection {
    /// Opens `path` read-only.
    ///
    /// Fails with [`SandboxError::NotFound`] if the file does not exist; the
    /// engine is never asked to create it.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if !path.is_file() {
            return Err(SandboxError::NotFound(path.to_path_buf()));
        }

        let uri = readonly_uri(path)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let conn = Connection::open_with_flags(uri.as_str(), flags)
            .map_err(|e| SandboxError::engine(format!("Failed to open {}: {e}", path.display())))?;

        conn.busy_timeout(busy_timeout.max(MIN_BUSY_TIMEOUT))?;

        // Must run before the authorizer is installed, which denies pragmas.
        conn.execute_batch("PRAGMA query_only = ON;")?;
        conn.authorizer(Some(read_only_authorizer));

        debug!("Opened read-only connection to {}", uri);

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Returns the warehouse file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying handle, for the executor only.
    pub(crate) fn handle(&self) -> &Connection {
        &self.conn
    }

    /// Closes the connection, reporting any error from the engine.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| SandboxError::from(e))
    }
}

/// Builds the `file:` URI with `mode=ro` for `path`.
fn readonly_uri(path: &Path) -> Result<Url> {
    let absolute = path.canonicalize().map_err(|e| {
        SandboxError::engine(format!("Cannot resolve {}: {e}", path.display()))
    })?;
    let mut uri = Url::from_file_path(&absolute).map_err(|()| {
        SandboxError::engine(format!("Cannot build URI for {}", absolute.display()))
    })?;
    uri.set_query(Some("mode=ro"));
    Ok(uri)
}

/// Allows row reads, SELECT and function calls; denies everything else.
fn read_only_authorizer(ctx: AuthContext<'_>) -> Authorization {
    match ctx.action {
        AuthAction::Read { .. } | AuthAction::Select | AuthAction::Function { .. } => {
            Authorization::Allow
        }
        _ => Authorization::Deny,
    }
}
