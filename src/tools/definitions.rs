//! Tool definitions for model function calling.

use serde::{Deserialize, Serialize};

use super::{COUNT_ROWS, GET_TABLE_SCHEMA, LIST_TABLES, RUN_SQL_QUERY, RUN_SQL_TEMPLATE};
use crate::templates::{QueryTemplate, KNOWN_TABLES};

/// Tool definition for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Returns the definitions of every tool, in [`super::TOOL_NAMES`] order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let template_names: Vec<&str> = QueryTemplate::ALL.iter().map(QueryTemplate::name).collect();
    let template_help: String = QueryTemplate::ALL
        .iter()
        .map(|t| {
            let params: Vec<String> = t
                .params()
                .iter()
                .map(|p| {
                    if p.required {
                        p.name.to_string()
                    } else {
                        format!("{}?", p.name)
                    }
                })
                .collect();
            format!("- {}({}): {}", t.name(), params.join(", "), t.description())
        })
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ToolDefinition {
            name: RUN_SQL_QUERY.to_string(),
            description: "Execute a read-only SQL SELECT query against the warehouse. Only \
                          SELECT and WITH (CTE) statements are allowed; INSERT, UPDATE, DELETE, \
                          DROP, CREATE, ATTACH and PRAGMA are rejected. Returns columns, a \
                          preview of the rows, row_count, truncated, total_available and error."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "A single SQL SELECT query"
                    }
                },
                "required": ["sql"]
            }),
        },
        ToolDefinition {
            name: RUN_SQL_TEMPLATE.to_string(),
            description: format!(
                "Execute a pre-built query template for a common analysis pattern.\n\
                 Available templates:\n{template_help}"
            ),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "template_name": {
                        "type": "string",
                        "enum": template_names,
                        "description": "Name of the template to run"
                    },
                    "params": {
                        "type": "object",
                        "additionalProperties": { "type": "string" },
                        "description": "Template parameters, e.g. {\"period\": \"2024-03\"}"
                    }
                },
                "required": ["template_name"]
            }),
        },
        ToolDefinition {
            name: GET_TABLE_SCHEMA.to_string(),
            description: "Get the CREATE TABLE statement, row count and a few sample rows for \
                          a warehouse table."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "table_name": {
                        "type": "string",
                        "description": format!("Table to inspect, e.g. one of: {}", KNOWN_TABLES.join(", "))
                    }
                },
                "required": ["table_name"]
            }),
        },
        ToolDefinition {
            name: LIST_TABLES.to_string(),
            description: "List the tables in the warehouse.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: COUNT_ROWS.to_string(),
            description: "Return the exact number of rows a SELECT query produces without \
                          transferring them."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "sql": {
                        "type": "string",
                        "description": "A single SQL SELECT query"
                    }
                },
                "required": ["sql"]
            }),
        },
    ]
}
