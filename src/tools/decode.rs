//! Lenient decoding of tool arguments.
//!
//! Model output is loosely shaped: arguments may arrive as a JSON object, as
//! a string holding a JSON object, or as a bare string for a tool with a
//! single argument. Everything is normalized to an object here or rejected
//! with [`ToolError::Decode`]. Argument values themselves, SQL in particular,
//! are passed through untouched.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use super::ToolError;

/// Parses the raw argument text. Text that is not JSON becomes a JSON string.
pub(crate) fn parse_raw(raw: &str) -> Json {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Json::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Json::String(raw.to_string()))
}

/// Normalizes `raw` into an argument object.
///
/// A string that does not hold an object is bound to `single_field` when
/// the tool has exactly one argument. `null` yields an empty object.
pub(crate) fn object(
    tool: &str,
    raw: &Json,
    single_field: Option<&str>,
) -> Result<Map<String, Json>, ToolError> {
    match raw {
        Json::Object(map) => Ok(map.clone()),
        Json::Null => Ok(Map::new()),
        Json::String(text) => match serde_json::from_str::<Json>(text.trim()) {
            Ok(Json::Object(map)) => Ok(map),
            _ => match single_field {
                Some(field) => Ok(Map::from_iter([(
                    field.to_string(),
                    Json::String(text.clone()),
                )])),
                None => Err(ToolError::decode(tool, "expected a JSON object")),
            },
        },
        other => Err(ToolError::decode(
            tool,
            format!("expected a JSON object, got {}", json_kind(other)),
        )),
    }
}

/// Removes a required string field from `args`.
pub(crate) fn take_string(
    tool: &str,
    args: &mut Map<String, Json>,
    field: &str,
) -> Result<String, ToolError> {
    match args.remove(field) {
        Some(Json::String(value)) => Ok(value),
        Some(Json::Null) | None => Err(ToolError::decode(
            tool,
            format!("missing required argument '{field}'"),
        )),
        Some(other) => Err(ToolError::decode(
            tool,
            format!("argument '{field}' must be a string, got {}", json_kind(&other)),
        )),
    }
}

/// Converts a parameter object into string values.
///
/// Numbers and booleans are stringified, `null` entries are dropped. A string
/// holding a JSON object is accepted in place of the object.
pub(crate) fn string_map(tool: &str, value: Json) -> Result<BTreeMap<String, String>, ToolError> {
    let map = match value {
        Json::Null => return Ok(BTreeMap::new()),
        Json::Object(map) => map,
        Json::String(text) => match serde_json::from_str::<Json>(text.trim()) {
            Ok(Json::Object(map)) => map,
            _ => return Err(ToolError::decode(tool, "params must be a JSON object")),
        },
        other => {
            return Err(ToolError::decode(
                tool,
                format!("params must be a JSON object, got {}", json_kind(&other)),
            ))
        }
    };

    let mut params = BTreeMap::new();
    for (key, value) in map {
        let text = match value {
            Json::Null => continue,
            Json::String(s) => s,
            Json::Number(n) => n.to_string(),
            Json::Bool(b) => b.to_string(),
            other => {
                return Err(ToolError::decode(
                    tool,
                    format!("parameter '{key}' must be a scalar, got {}", json_kind(&other)),
                ))
            }
        };
        params.insert(key, text);
    }
    Ok(params)
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}
