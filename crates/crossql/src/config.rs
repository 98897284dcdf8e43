//! Builder configuration loaded from TOML or the environment.
//!
//! ```toml
//! dialect = "mssql"
//! primary_key = "id"
//! per_page = 25
//! log_sql = true
//! log_level = "debug"
//! max_sql_log_length = 200
//! ```
//!
//! A config is applied per query with [`Query::with_config`](crate::Query::with_config);
//! there is no global state.

use std::path::Path;

use serde::Deserialize;

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::tracing_hook::SqlLogLevel;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QbConfig {
    pub dialect: Option<Dialect>,
    pub primary_key: String,
    pub per_page: u64,
    pub log_sql: bool,
    pub log_level: SqlLogLevel,
    pub max_sql_log_length: Option<usize>,
}

impl Default for QbConfig {
    fn default() -> Self {
        Self {
            dialect: None,
            primary_key: "id".to_string(),
            per_page: 10,
            log_sql: true,
            log_level: SqlLogLevel::Debug,
            max_sql_log_length: Some(200),
        }
    }
}

impl QbConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> QbResult<Self> {
        let config: QbConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> QbResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            QbError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Read `CROSSQL_DIALECT`, `CROSSQL_PRIMARY_KEY`, `CROSSQL_PER_PAGE` and
    /// `CROSSQL_LOG_SQL` over the defaults.
    pub fn from_env() -> QbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](QbConfig::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QbResult<Self> {
        let mut config = Self::default();

        if let Some(dialect) = lookup("CROSSQL_DIALECT") {
            config.dialect = Some(dialect.parse()?);
        }
        if let Some(pk) = lookup("CROSSQL_PRIMARY_KEY") {
            config.primary_key = pk;
        }
        if let Some(per_page) = lookup("CROSSQL_PER_PAGE") {
            config.per_page = per_page.trim().parse().map_err(|_| {
                QbError::Config(format!("CROSSQL_PER_PAGE must be a positive integer, got {per_page:?}"))
            })?;
        }
        if let Some(flag) = lookup("CROSSQL_LOG_SQL") {
            config.log_sql = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(QbError::Config(format!(
                        "CROSSQL_LOG_SQL must be a boolean, got {flag:?}"
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> QbResult<()> {
        if self.per_page == 0 {
            return Err(QbError::Config("per_page must be >= 1".to_string()));
        }
        if self.primary_key.trim().is_empty() {
            return Err(QbError::Config("primary_key cannot be empty".to_string()));
        }
        Ok(())
    }
}
