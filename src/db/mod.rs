//! Warehouse access layer.
//!
//! Holds the read-only SQLite connection and the value and result types
//! shared by the executor and the tool layer.

mod connection;
mod types;

pub use connection::ReadOnlyConnection;
pub use types::{QueryResult, Row, Value};

pub(crate) use types::duration_ms;
