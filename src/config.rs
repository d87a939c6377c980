//! Configuration management for the sandbox.
//!
//! Settings come from a TOML file, then `SANDBOX_*` environment variables,
//! then command-line flags, each layer overriding the previous one. The
//! executor itself only ever sees [`ExecutorSettings`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SandboxError};
use crate::query::ExecutorSettings;
use crate::tools::DEFAULT_PREVIEW_ROWS;

pub const ENV_DB_PATH: &str = "SANDBOX_DB_PATH";
pub const ENV_MAX_ROWS: &str = "SANDBOX_MAX_ROWS";
pub const ENV_QUERY_TIMEOUT: &str = "SANDBOX_QUERY_TIMEOUT";
pub const ENV_BUSY_TIMEOUT: &str = "SANDBOX_BUSY_TIMEOUT";
pub const ENV_PREVIEW_ROWS: &str = "SANDBOX_PREVIEW_ROWS";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SandboxConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Warehouse location and lock handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite warehouse file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Seconds to wait on a locked database file.
    #[serde(default = "default_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("runs/warehouse.db")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Per-query limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum rows returned per query.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Seconds a query may run; `0` disables the limit.
    #[serde(default = "default_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_max_rows() -> usize {
    500
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            query_timeout_secs: default_timeout_secs(),
        }
    }
}

/// Tool response shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Rows included in a query tool response.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
        }
    }
}

/// Logging destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl SandboxConfig {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("warehouse-sandbox")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| SandboxError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            SandboxError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies `SANDBOX_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by the `SANDBOX_*` names.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_MAX_ROWS) {
            self.limits.max_rows = parse_number(ENV_MAX_ROWS, &value)?;
        }
        if let Some(value) = lookup(ENV_QUERY_TIMEOUT) {
            self.limits.query_timeout_secs = parse_number(ENV_QUERY_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_BUSY_TIMEOUT) {
            self.database.busy_timeout_secs = parse_number(ENV_BUSY_TIMEOUT, &value)?;
        }
        if let Some(value) = lookup(ENV_PREVIEW_ROWS) {
            self.tools.preview_rows = parse_number(ENV_PREVIEW_ROWS, &value)?;
        }
        Ok(())
    }

    /// Checks limits that would make the sandbox unusable.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_rows == 0 {
            return Err(SandboxError::config("limits.max_rows must be at least 1"));
        }
        if self.tools.preview_rows == 0 {
            return Err(SandboxError::config("tools.preview_rows must be at least 1"));
        }
        Ok(())
    }

    /// Derives the executor limits.
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            max_rows: self.limits.max_rows,
            query_timeout: Duration::from_secs(self.limits.query_timeout_secs),
            busy_timeout: Duration::from_secs(self.database.busy_timeout_secs),
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SandboxError::config(format!("{key} must be a non-negative integer, got '{value}'")))
}
