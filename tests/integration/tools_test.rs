//! Tool dispatch tests over a seeded warehouse.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use warehouse_sandbox::db::Value;
use warehouse_sandbox::templates::{QueryTemplate, KNOWN_TABLES};
use warehouse_sandbox::tools::{
    SandboxContext, ToolOutput, COUNT_ROWS, GET_TABLE_SCHEMA, LIST_TABLES, RUN_SQL_QUERY,
    RUN_SQL_TEMPLATE,
};

use super::common::{TestWarehouse, NUMBER_ROWS, PNL_ROWS};

fn context(warehouse: &TestWarehouse, max_rows: usize, preview_rows: usize) -> SandboxContext {
    SandboxContext::new(Arc::new(warehouse.executor(max_rows)), preview_rows)
}

fn query_args(sql: &str) -> String {
    json!({ "sql": sql }).to_string()
}

#[test]
fn test_query_preview_reports_full_total() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 50, 20);

    let output = ctx.call(RUN_SQL_QUERY, &query_args("SELECT n FROM numbers ORDER BY n"));

    let ToolOutput::Query(response) = output else {
        panic!("Expected query output, got {output:?}");
    };
    assert_eq!(response.rows.len(), 20);
    assert_eq!(response.row_count, 50);
    assert!(response.truncated);
    assert_eq!(response.total_available, NUMBER_ROWS as u64);
    assert!(response.total_available_exact);
    assert_eq!(response.error, None);
}

#[test]
fn test_query_preview_without_executor_truncation() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 50, 5);

    let output = ctx.call(RUN_SQL_QUERY, &query_args("SELECT * FROM mart_pnl_report"));

    let ToolOutput::Query(response) = output else {
        panic!("Expected query output, got {output:?}");
    };
    assert_eq!(response.rows.len(), 5);
    assert_eq!(response.row_count, PNL_ROWS);
    assert!(response.truncated);
    assert_eq!(response.total_available, PNL_ROWS as u64);
}

#[test]
fn test_small_result_is_not_truncated() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 50, 20);

    let output = ctx.call(RUN_SQL_QUERY, "SELECT key, value FROM seed_manifest");

    let json = output.to_json();
    assert_eq!(json["rows"], json!([{ "key": "seed", "value": "42" }]));
    assert_eq!(json["truncated"], json!(false));
    assert_eq!(json["total_available"], json!(1));
    assert_eq!(json["error"], json!(null));
}

#[test]
fn test_rejected_query_is_error_output() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 50, 20);

    let output = ctx.call(RUN_SQL_QUERY, &query_args("DROP TABLE mart_pnl_report"));

    let message = output.error_message().unwrap();
    assert!(message.contains("DROP"), "{message}");
    let json = output.to_json();
    assert_eq!(json["rows"], json!([]));
    assert_eq!(ctx.executor().audit_len(), 1);
}

#[test]
fn test_every_template_runs_on_seeded_data() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    let calls = [
        json!({ "template_name": "variance_summary", "params": { "period": "2024-01" } }),
        json!({ "template_name": "account_detail", "params": { "account_code": "4000" } }),
        json!({ "template_name": "fx_rate_history", "currency": "EUR" }),
        json!({ "template_name": "cost_center_drill", "params": { "cost_center": "CC-200" } }),
        json!({ "template_name": "budget_vs_actual", "params": { "department": "Sales" } }),
        json!({ "template_name": "period_over_period", "params": { "table": "int_actuals_usd" } }),
        json!({ "template_name": "classification_check" }),
    ];
    assert_eq!(calls.len(), QueryTemplate::ALL.len());

    let mut row_counts = Vec::new();
    for args in &calls {
        let output = ctx.call(RUN_SQL_TEMPLATE, &args.to_string());
        let ToolOutput::Query(response) = output else {
            panic!("Expected query output for {args}, got {output:?}");
        };
        assert_eq!(response.error, None, "{args}");
        row_counts.push(response.row_count);
    }

    assert_eq!(row_counts, vec![4, 2, 2, 2, 2, 4, 1]);
}

#[test]
fn test_fx_rate_history_computes_change() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    let output = ctx.call(RUN_SQL_TEMPLATE, r#"{"template_name": "fx_rate_history", "currency": "EUR"}"#);
    let ToolOutput::Query(response) = output else {
        panic!("Expected query output, got {output:?}");
    };

    assert_eq!(response.rows[0].get("prev_rate"), Some(&Value::Null));
    assert_eq!(response.rows[1].get("prev_rate"), Some(&Value::Float(1.10)));
    assert_eq!(response.rows[1].get("pct_change"), Some(&Value::Float(-1.82)));
}

#[test]
fn test_template_errors() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    let unknown = ctx.call(RUN_SQL_TEMPLATE, r#"{"template_name": "does_not_exist"}"#);
    let message = unknown.error_message().unwrap();
    assert!(message.contains("variance_summary"), "{message}");

    let missing = ctx.call(RUN_SQL_TEMPLATE, r#"{"template_name": "account_detail"}"#);
    assert!(missing.error_message().unwrap().contains("account_code"));

    let injected = ctx.call(
        RUN_SQL_TEMPLATE,
        r#"{"template_name": "account_detail", "params": {"account_code": "4000' OR '1'='1"}}"#,
    );
    assert!(injected.error_message().is_some());

    let table = ctx.call(
        RUN_SQL_TEMPLATE,
        r#"{"template_name": "period_over_period", "params": {"table": "sqlite_master"}}"#,
    );
    assert!(table.error_message().is_some());

    // Template errors are raised before any SQL runs.
    assert_eq!(ctx.executor().audit_len(), 0);
}

#[test]
fn test_table_schema_tool() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    let output = ctx.call(GET_TABLE_SCHEMA, r#"{"table_name": "numbers"}"#);
    let ToolOutput::Schema(schema) = output else {
        panic!("Expected schema output, got {output:?}");
    };

    assert_eq!(schema.table_name, "numbers");
    assert!(schema.create_sql.starts_with("CREATE TABLE numbers"));
    assert_eq!(schema.row_count, NUMBER_ROWS as u64);
    assert_eq!(schema.columns, vec!["n".to_string()]);
    assert_eq!(schema.sample_rows.len(), 5);
}

#[test]
fn test_table_schema_unknown_table_lists_available() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    for name in ["missing_table", "numbers\"; DROP TABLE numbers; --", "numbers' OR '1'='1"] {
        let output = ctx.call(GET_TABLE_SCHEMA, &json!({ "table_name": name }).to_string());
        let message = output.error_message().unwrap();
        assert!(message.starts_with(&format!("Table not found: {name}")), "{message}");
        assert!(message.contains("mart_pnl_report"), "{message}");
    }

    let count = ctx.call(COUNT_ROWS, &query_args("SELECT * FROM numbers"));
    assert_eq!(count.to_json(), json!({ "total_rows": NUMBER_ROWS, "error": null }));
}

#[test]
fn test_list_tables_tool() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 100, 20);

    let output = ctx.call(LIST_TABLES, "");
    let ToolOutput::Tables(response) = output else {
        panic!("Expected tables output, got {output:?}");
    };

    for table in KNOWN_TABLES {
        assert!(response.tables.iter().any(|t| t == table), "missing {table}");
    }
    assert!(response.tables.iter().any(|t| t == "numbers"));
    let mut sorted = response.tables.clone();
    sorted.sort();
    assert_eq!(response.tables, sorted);
}

#[test]
fn test_count_rows_tool() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 10, 20);

    let output = ctx.call(COUNT_ROWS, "SELECT * FROM mart_pnl_report WHERE actual_usd > 500");
    assert_eq!(output.to_json(), json!({ "total_rows": 5, "error": null }));

    let rejected = ctx.call(COUNT_ROWS, &query_args("DELETE FROM mart_pnl_report"));
    let json = rejected.to_json();
    assert_eq!(json["total_rows"], json!(null));
    assert!(json["error"].as_str().unwrap().contains("DELETE"));
    assert_eq!(ctx.executor().audit_len(), 0);
}

#[test]
fn test_unknown_tool_and_bad_arguments() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 10, 20);

    let unknown = ctx.call("drop_everything", "{}");
    let message = unknown.error_message().unwrap();
    assert!(message.contains("drop_everything"), "{message}");
    assert!(message.contains(RUN_SQL_QUERY), "{message}");

    let missing = ctx.call(RUN_SQL_QUERY, "{}");
    assert!(missing.error_message().unwrap().contains("sql"));

    let wrong_type = ctx.call(RUN_SQL_QUERY, r#"{"sql": 42}"#);
    assert!(wrong_type.error_message().is_some());
    assert_eq!(ctx.executor().audit_len(), 0);
}

#[test]
fn test_lenient_argument_forms() {
    let warehouse = TestWarehouse::new();
    let ctx = context(&warehouse, 10, 20);

    let quoted_object = serde_json::to_string(&query_args("SELECT 1 AS one")).unwrap();
    for raw in [query_args("SELECT 1 AS one"), quoted_object, "SELECT 1 AS one".to_string()] {
        let output = ctx.call(RUN_SQL_QUERY, &raw);
        assert_eq!(output.error_message(), None, "{raw}");
        assert_eq!(output.to_json()["rows"], json!([{ "one": 1 }]), "{raw}");
    }

    let schema = ctx.call(GET_TABLE_SCHEMA, "seed_manifest");
    assert_eq!(schema.error_message(), None);
}
