//! wsandbox - run read-only SQL against a SQLite financial warehouse.

mod cli;

use std::sync::Arc;

use cli::{Cli, Command};
use serde::Serialize;
use tracing::{error, info};
use warehouse_sandbox::config::SandboxConfig;
use warehouse_sandbox::db::QueryResult;
use warehouse_sandbox::error::{Result, SandboxError};
use warehouse_sandbox::logging;
use warehouse_sandbox::query::SqlExecutor;
use warehouse_sandbox::templates::render_template;
use warehouse_sandbox::tools::{tool_definitions, SandboxContext};

fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Could not load .env file: {e}");
        }
    }

    let cli = Cli::parse_args();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    };

    match &config.logging.file {
        Some(path) => logging::init_file_logging(path),
        None if cli.log_file => logging::init_file_logging(&logging::default_log_path()),
        None => logging::init_stderr_logging(),
    }

    match run(&cli, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Builds the configuration with precedence:
/// 1. CLI flags (highest)
/// 2. `SANDBOX_*` environment variables
/// 3. Config file
/// 4. Built-in defaults
fn load_config(cli: &Cli) -> Result<SandboxConfig> {
    let mut config = SandboxConfig::load_from_file(&cli.config_path())?;
    config.apply_env()?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Runs the command. Returns `Ok(false)` when the query itself failed.
fn run(cli: &Cli, config: &SandboxConfig) -> Result<bool> {
    info!("Warehouse: {}", config.database.path.display());
    let executor = Arc::new(SqlExecutor::new(
        &config.database.path,
        config.executor_settings(),
    )?);

    let outcome = run_command(cli, config, &executor);

    if cli.audit {
        print_json(&executor.audit_entries())?;
    }
    executor.close()?;

    outcome
}

fn run_command(cli: &Cli, config: &SandboxConfig, executor: &Arc<SqlExecutor>) -> Result<bool> {
    match &cli.command {
        Command::Query { sql } => print_result(&executor.execute(sql), cli.json),
        Command::Count { sql } => {
            let total = executor.count_rows(sql)?;
            if cli.json {
                print_json(&serde_json::json!({ "total_rows": total }))?;
            } else {
                println!("{total}");
            }
            Ok(true)
        }
        Command::Template { name, params } => {
            let sql = render_template(name, &Command::template_params(params))?;
            print_result(&executor.execute(&sql), cli.json)
        }
        Command::Tables => {
            let tables = executor.table_names()?;
            if cli.json {
                print_json(&tables)?;
            } else {
                for table in tables {
                    println!("{table}");
                }
            }
            Ok(true)
        }
        Command::Schema { table } => match executor.table_schema(table)? {
            Some(create_sql) => {
                println!("{create_sql}");
                Ok(true)
            }
            None => {
                eprintln!("Table not found: {table}");
                Ok(false)
            }
        },
        Command::Tools => {
            print_json(&tool_definitions())?;
            Ok(true)
        }
        Command::Tool { name, args } => {
            let context = SandboxContext::new(Arc::clone(executor), config.tools.preview_rows);
            let output = context.call(name, args);
            print_json(&output)?;
            Ok(output.error_message().is_none())
        }
    }
}

fn print_result(result: &QueryResult, json: bool) -> Result<bool> {
    if json {
        print_json(result)?;
        return Ok(result.is_ok());
    }

    if let Some(error) = &result.error {
        eprintln!("{error}");
        return Ok(false);
    }

    println!("{}", result.columns.join(" | "));
    for row in &result.rows {
        let cells: Vec<String> = row.values().iter().map(|v| v.to_display_string()).collect();
        println!("{}", cells.join(" | "));
    }

    let rows_label = if result.row_count == 1 { "row" } else { "rows" };
    println!(
        "({} {rows_label}, {:.1} ms)",
        result.row_count, result.execution_time_ms
    );
    if let Some(warning) = result.truncation_warning(None) {
        eprintln!("{warning}");
    }
    Ok(true)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SandboxError::internal(format!("Failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}
