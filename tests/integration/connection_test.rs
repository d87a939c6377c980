//! Read-only connection tests against real files.

use std::time::Duration;

use rusqlite::Connection;
use warehouse_sandbox::db::{ReadOnlyConnection, Value};
use warehouse_sandbox::error::SandboxError;
use warehouse_sandbox::query::ExecutorSettings;

use super::common::TestWarehouse;

#[test]
fn test_open_and_close_leave_file_unchanged() {
    let warehouse = TestWarehouse::new();
    let before = warehouse.file_bytes();

    let conn = ReadOnlyConnection::open(warehouse.path(), Duration::from_secs(1)).unwrap();
    assert_eq!(conn.path(), warehouse.path());
    conn.close().unwrap();

    assert_eq!(warehouse.file_bytes(), before);
}

#[test]
fn test_open_missing_file_does_not_create_it() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nowhere.db");

    let err = ReadOnlyConnection::open(&path, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, SandboxError::NotFound(_)));
    assert!(!path.exists());
}

#[test]
fn test_path_needing_uri_escapes() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("q1 report #2");
    std::fs::create_dir(&nested).unwrap();
    let path = nested.join("warehouse 50%.db");
    let writer = Connection::open(&path).unwrap();
    writer
        .execute_batch("CREATE TABLE seed_manifest (key TEXT, value TEXT); INSERT INTO seed_manifest VALUES ('seed', '7');")
        .unwrap();
    drop(writer);

    let executor = warehouse_sandbox::query::SqlExecutor::new(&path, ExecutorSettings::default()).unwrap();
    let result = executor.execute("SELECT value FROM seed_manifest");
    assert!(result.is_ok(), "{:?}", result.error);
    assert_eq!(result.rows[0].get("value"), Some(&Value::String("7".to_string())));
}

#[test]
fn test_writer_can_proceed_while_reader_is_open() {
    let warehouse = TestWarehouse::new();
    let executor = warehouse.executor(10);
    assert!(executor.execute("SELECT 1").is_ok());

    let writer = Connection::open(warehouse.path()).unwrap();
    writer
        .execute("INSERT INTO seed_manifest VALUES ('late', 'row')", [])
        .unwrap();
    drop(writer);

    let result = executor.execute("SELECT value FROM seed_manifest WHERE key = 'late'");
    assert_eq!(result.row_count, 1);
}
