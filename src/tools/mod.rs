//! Tool surface for agent callers.
//!
//! An agent names a tool and hands over loosely shaped arguments.
//! [`ToolCall::parse`] turns that into one of a fixed set of calls, and
//! [`SandboxContext::dispatch`] runs it against the context's executor.
//! There is no process-wide executor; every caller passes its own context.

mod decode;
mod definitions;

pub use definitions::{tool_definitions, ToolDefinition};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::{QueryResult, Row};
use crate::query::SqlExecutor;
use crate::templates::render_template;

pub const RUN_SQL_QUERY: &str = "run_sql_query";
pub const RUN_SQL_TEMPLATE: &str = "run_sql_template";
pub const GET_TABLE_SCHEMA: &str = "get_table_schema";
pub const LIST_TABLES: &str = "list_tables";
pub const COUNT_ROWS: &str = "count_rows";

/// All tool names, in definition order.
pub const TOOL_NAMES: &[&str] = &[
    RUN_SQL_QUERY,
    RUN_SQL_TEMPLATE,
    GET_TABLE_SCHEMA,
    LIST_TABLES,
    COUNT_ROWS,
];

/// Default number of rows included in a query response.
pub const DEFAULT_PREVIEW_ROWS: usize = 20;

/// Rows sampled by `get_table_schema`.
const SCHEMA_SAMPLE_ROWS: usize = 5;

/// Errors from turning a named call into a [`ToolCall`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available: {available}")]
    UnknownTool { name: String, available: String },

    #[error("Invalid arguments for '{tool}': {reason}")]
    Decode { tool: String, reason: String },
}

impl ToolError {
    pub(crate) fn decode(tool: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// A decoded tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    RunSqlQuery {
        sql: String,
    },
    RunSqlTemplate {
        template_name: String,
        params: BTreeMap<String, String>,
    },
    GetTableSchema {
        table_name: String,
    },
    ListTables,
    CountRows {
        sql: String,
    },
}

impl ToolCall {
    /// Decodes a call to tool `name` with raw argument text.
    ///
    /// For `run_sql_template`, keys next to `template_name` other than
    /// `params` are taken as template parameters too.
    pub fn parse(name: &str, raw_args: &str) -> Result<Self, ToolError> {
        let raw = decode::parse_raw(raw_args);

        match name {
            RUN_SQL_QUERY => {
                let mut args = decode::object(name, &raw, Some("sql"))?;
                let sql = decode::take_string(name, &mut args, "sql")?;
                Ok(Self::RunSqlQuery { sql })
            }
            RUN_SQL_TEMPLATE => {
                let mut args = decode::object(name, &raw, Some("template_name"))?;
                let template_name = decode::take_string(name, &mut args, "template_name")?;
                let mut params =
                    decode::string_map(name, args.remove("params").unwrap_or(Json::Null))?;
                params.extend(decode::string_map(name, Json::Object(args))?);
                Ok(Self::RunSqlTemplate {
                    template_name,
                    params,
                })
            }
            GET_TABLE_SCHEMA => {
                let mut args = decode::object(name, &raw, Some("table_name"))?;
                let table_name = decode::take_string(name, &mut args, "table_name")?;
                Ok(Self::GetTableSchema { table_name })
            }
            LIST_TABLES => {
                if !matches!(&raw, Json::Null) {
                    debug!(tool_name = name, "Ignoring arguments for tool without parameters");
                }
                Ok(Self::ListTables)
            }
            COUNT_ROWS => {
                let mut args = decode::object(name, &raw, Some("sql"))?;
                let sql = decode::take_string(name, &mut args, "sql")?;
                Ok(Self::CountRows { sql })
            }
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
                available: TOOL_NAMES.join(", "),
            }),
        }
    }

    /// Returns the tool name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunSqlQuery { .. } => RUN_SQL_QUERY,
            Self::RunSqlTemplate { .. } => RUN_SQL_TEMPLATE,
            Self::GetTableSchema { .. } => GET_TABLE_SCHEMA,
            Self::ListTables => LIST_TABLES,
            Self::CountRows { .. } => COUNT_ROWS,
        }
    }
}

/// Response for `run_sql_query` and `run_sql_template`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub columns: Vec<String>,
    /// At most the context's preview size.
    pub rows: Vec<Row>,
    /// Rows returned by the executor, before the preview cut.
    pub row_count: usize,
    /// True when the preview or the executor dropped rows.
    pub truncated: bool,
    pub total_available: u64,
    /// False when the exact count could not be recovered.
    pub total_available_exact: bool,
    pub error: Option<String>,
}

/// Response for `get_table_schema`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaResponse {
    pub table_name: String,
    pub create_sql: String,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub sample_rows: Vec<Row>,
}

/// Response for `list_tables`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
}

/// Response for `count_rows`. Exactly one field is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountResponse {
    pub total_rows: Option<u64>,
    pub error: Option<String>,
}

/// Output of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Query(QueryResponse),
    Schema(SchemaResponse),
    Tables(TablesResponse),
    Count(CountResponse),
    Error { error: String },
}

impl ToolOutput {
    fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Returns the error message, if the call failed.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Query(response) => response.error.as_deref(),
            Self::Count(response) => response.error.as_deref(),
            Self::Error { error } => Some(error),
            Self::Schema(_) | Self::Tables(_) => None,
        }
    }

    /// Serializes the output for the caller.
    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Failed to serialize tool output: {e}") })
        })
    }
}

/// Everything a tool call needs, owned by the caller.
#[derive(Debug, Clone)]
pub struct SandboxContext {
    executor: Arc<SqlExecutor>,
    preview_rows: usize,
}

impl SandboxContext {
    /// Creates a context. A zero preview size falls back to the default.
    pub fn new(executor: Arc<SqlExecutor>, preview_rows: usize) -> Self {
        let preview_rows = if preview_rows == 0 {
            DEFAULT_PREVIEW_ROWS
        } else {
            preview_rows
        };
        Self {
            executor,
            preview_rows,
        }
    }

    pub fn executor(&self) -> &Arc<SqlExecutor> {
        &self.executor
    }

    pub fn preview_rows(&self) -> usize {
        self.preview_rows
    }

    /// Decodes and runs a named call. Decode failures become error outputs.
    pub fn call(&self, name: &str, raw_args: &str) -> ToolOutput {
        match ToolCall::parse(name, raw_args) {
            Ok(call) => self.dispatch(&call),
            Err(e) => {
                warn!(tool_name = name, "Tool call rejected: {e}");
                ToolOutput::error(e.to_string())
            }
        }
    }

    /// Runs a decoded call.
    pub fn dispatch(&self, call: &ToolCall) -> ToolOutput {
        let start = Instant::now();
        debug!(tool_name = call.name(), "Executing tool");

        let output = match call {
            ToolCall::RunSqlQuery { sql } => self.run_sql_query(sql),
            ToolCall::RunSqlTemplate {
                template_name,
                params,
            } => self.run_sql_template(template_name, params),
            ToolCall::GetTableSchema { table_name } => self.get_table_schema(table_name),
            ToolCall::ListTables => self.list_tables(),
            ToolCall::CountRows { sql } => self.count_rows(sql),
        };

        debug!(
            tool_name = call.name(),
            duration_ms = start.elapsed().as_millis(),
            failed = output.error_message().is_some(),
            "Tool execution complete"
        );
        output
    }

    fn run_sql_query(&self, sql: &str) -> ToolOutput {
        let result = self.executor.execute(sql);
        ToolOutput::Query(self.query_response(result))
    }

    fn run_sql_template(&self, template_name: &str, params: &BTreeMap<String, String>) -> ToolOutput {
        match render_template(template_name, params) {
            Ok(sql) => self.run_sql_query(&sql),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    fn get_table_schema(&self, table_name: &str) -> ToolOutput {
        let create_sql = match self.executor.table_schema(table_name) {
            Ok(Some(create_sql)) => create_sql,
            Ok(None) => {
                let available = self.executor.table_names().unwrap_or_default().join(", ");
                return ToolOutput::error(format!(
                    "Table not found: {table_name}. Available: {available}"
                ));
            }
            Err(e) => return ToolOutput::error(e.to_string()),
        };

        let quoted = format!("\"{}\"", table_name.replace('"', "\"\""));
        let sample = self
            .executor
            .execute(&format!("SELECT * FROM {quoted} LIMIT {SCHEMA_SAMPLE_ROWS}"));
        if let Some(error) = sample.error {
            return ToolOutput::error(error);
        }
        let row_count = match self.executor.count_rows(&format!("SELECT * FROM {quoted}")) {
            Ok(count) => count,
            Err(e) => return ToolOutput::error(e.to_string()),
        };

        ToolOutput::Schema(SchemaResponse {
            table_name: table_name.to_string(),
            create_sql,
            row_count,
            columns: sample.columns,
            sample_rows: sample.rows,
        })
    }

    fn list_tables(&self) -> ToolOutput {
        match self.executor.table_names() {
            Ok(tables) => ToolOutput::Tables(TablesResponse { tables }),
            Err(e) => ToolOutput::error(e.to_string()),
        }
    }

    fn count_rows(&self, sql: &str) -> ToolOutput {
        ToolOutput::Count(match self.executor.count_rows(sql) {
            Ok(total) => CountResponse {
                total_rows: Some(total),
                error: None,
            },
            Err(e) => CountResponse {
                total_rows: None,
                error: Some(e.to_string()),
            },
        })
    }

    /// Cuts a result down to the preview and recovers the exact total when
    /// the executor truncated.
    fn query_response(&self, result: QueryResult) -> QueryResponse {
        if let Some(error) = result.error {
            return QueryResponse {
                columns: Vec::new(),
                rows: Vec::new(),
                row_count: 0,
                truncated: false,
                total_available: 0,
                total_available_exact: true,
                error: Some(error),
            };
        }

        let (total_available, total_available_exact) = if result.truncated {
            match self.executor.count_rows(&result.sql) {
                Ok(total) => (total, true),
                Err(e) => {
                    warn!("Could not recover exact row count: {e}");
                    (result.row_count as u64, false)
                }
            }
        } else {
            (result.row_count as u64, true)
        };

        let row_count = result.row_count;
        let mut rows = result.rows;
        rows.truncate(self.preview_rows);

        QueryResponse {
            columns: result.columns,
            truncated: result.truncated || row_count > rows.len(),
            rows,
            row_count,
            total_available,
            total_available_exact,
            error: None,
        }
    }
}
