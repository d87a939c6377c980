//! Command-line argument parsing for wsandbox.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use warehouse_sandbox::config::SandboxConfig;

/// Read-only SQL sandbox over a SQLite financial warehouse.
#[derive(Parser, Debug)]
#[command(name = "wsandbox")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH", env = "SANDBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Warehouse database file (overrides config and SANDBOX_DB_PATH)
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Maximum rows returned per query
    #[arg(long, value_name = "N")]
    pub max_rows: Option<usize>,

    /// Query timeout in seconds; 0 disables it
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the audit log as JSON before exiting
    #[arg(long)]
    pub audit: bool,

    /// Write logs to the default log file instead of stderr
    #[arg(long)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a read-only SQL query
    Query {
        /// SQL text
        sql: String,
    },

    /// Print the exact number of rows a query produces
    Count {
        /// SQL text
        sql: String,
    },

    /// Render and run a query template
    Template {
        /// Template name
        name: String,

        /// Template parameter (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },

    /// List warehouse tables
    Tables,

    /// Show the CREATE TABLE statement for a table
    Schema {
        /// Table name
        table: String,
    },

    /// Print the tool definitions as JSON
    Tools,

    /// Dispatch a tool call with raw arguments
    Tool {
        /// Tool name
        name: String,

        /// Raw arguments (JSON object, JSON string or bare string)
        #[arg(default_value = "")]
        args: String,
    },
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter: '{s}'. Expected KEY=VALUE"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid parameter: '{s}'. Key is empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(SandboxConfig::default_path)
    }

    /// Applies flag overrides on top of file and environment settings.
    pub fn apply_overrides(&self, config: &mut SandboxConfig) {
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
        if let Some(max_rows) = self.max_rows {
            config.limits.max_rows = max_rows;
        }
        if let Some(timeout) = self.timeout {
            config.limits.query_timeout_secs = timeout;
        }
    }
}

impl Command {
    /// Collects template parameters; later values win.
    pub fn template_params(params: &[(String, String)]) -> BTreeMap<String, String> {
        params.iter().cloned().collect()
    }
}
