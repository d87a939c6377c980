//! Query result types.
//!
//! Defines the structures used to represent query results from the warehouse.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rusqlite::types::ValueRef;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Outcome of one execution attempt.
///
/// Exactly one of `error` or `rows` carries the outcome: a failed attempt has
/// no columns and no rows, a successful one has no error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    /// The normalized statement that ran, or the raw input if it never ran.
    pub sql: String,

    /// Result column names, in select-list order.
    pub columns: Vec<String>,

    /// Rows of data, at most `max_rows`.
    pub rows: Vec<Row>,

    /// Number of rows in `rows`.
    pub row_count: usize,

    /// Whether more than `max_rows` rows were available.
    pub truncated: bool,

    /// Wall-clock time for guard and execution.
    pub execution_time_ms: f64,

    /// Failure reason; `None` on success.
    pub error: Option<String>,
}

impl QueryResult {
    /// Creates a successful result.
    pub fn success(
        sql: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Row>,
        truncated: bool,
        elapsed: Duration,
    ) -> Self {
        let row_count = rows.len();
        Self {
            sql: sql.into(),
            columns,
            rows,
            row_count,
            truncated,
            execution_time_ms: duration_ms(elapsed),
            error: None,
        }
    }

    /// Creates a failed result with no columns or rows.
    pub fn failure(sql: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            sql: sql.into(),
            execution_time_ms: duration_ms(elapsed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Returns true if the attempt succeeded.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns a truncation warning message if the result was truncated.
    pub fn truncation_warning(&self, total_rows: Option<u64>) -> Option<String> {
        if !self.truncated {
            return None;
        }
        Some(match total_rows {
            Some(total) => format!(
                "Result truncated: showing {} of {total} rows",
                self.row_count
            ),
            None => format!("Result truncated: showing first {} rows", self.row_count),
        })
    }
}

/// Converts a duration to fractional milliseconds.
pub(crate) fn duration_ms(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

/// A row of data, keyed by column name.
///
/// Column names are shared between all rows of one result. Serializes as a
/// JSON object in column order. When a name repeats, the last column with
/// that name wins, both for [`Row::get`] and in the serialized object.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Returns the value for `column`, if the result has such a column.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|name| name == column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Returns the values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let shadowed = |idx: usize| self.columns[idx + 1..].contains(&self.columns[idx]);
        let mut map = serializer.serialize_map(None)?;
        for (idx, (column, value)) in self.iter().enumerate() {
            if !shadowed(idx) {
                map.serialize_entry(column, value)?;
            }
        }
        map.end()
    }
}

/// Represents a single SQLite value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Signed integer.
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value as text, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        }
    }
}

// Conversion implementations for common types
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
