//! SQL logging for rendered statements.
//!
//! Every successful render passes through [`log_built`]. With the `tracing`
//! feature enabled (default) it emits one event on target `crossql.sql`
//! carrying the dialect, statement kind, parameter count and the (truncated)
//! SQL text. Parameter values are never logged.

use serde::{Deserialize, Serialize};

use crate::config::QbConfig;
use crate::qb::BuiltQuery;

/// Level of the SQL log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Per-query SQL logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlLogConfig {
    pub enabled: bool,
    pub level: SqlLogLevel,
    /// Truncate long SQL strings (in bytes, on a char boundary). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for SqlLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: SqlLogLevel::Debug,
            max_sql_length: Some(200),
        }
    }
}

impl SqlLogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No events at all.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Override the event level.
    pub fn level(mut self, level: SqlLogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}

impl From<&QbConfig> for SqlLogConfig {
    fn from(config: &QbConfig) -> Self {
        Self {
            enabled: config.log_sql,
            level: config.log_level,
            max_sql_length: config.max_sql_log_length,
        }
    }
}

/// The kind of statement being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Upsert => "upsert",
        }
    }
}

/// Cut `sql` to at most `max` bytes without splitting a character.
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end])
        }
        _ => sql.to_string(),
    }
}

/// A `tracing` emitter for rendered SQL.
#[cfg(feature = "tracing")]
#[derive(Debug, Clone)]
pub struct TracingSqlHook {
    /// Tracing event level to emit at.
    pub level: tracing::Level,
    /// Truncate long SQL strings. `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

#[cfg(feature = "tracing")]
impl TracingSqlHook {
    pub fn from_config(config: &SqlLogConfig) -> Self {
        let level = match config.level {
            SqlLogLevel::Error => tracing::Level::ERROR,
            SqlLogLevel::Warn => tracing::Level::WARN,
            SqlLogLevel::Info => tracing::Level::INFO,
            SqlLogLevel::Debug => tracing::Level::DEBUG,
            SqlLogLevel::Trace => tracing::Level::TRACE,
        };
        Self {
            level,
            max_sql_length: config.max_sql_length,
        }
    }

    pub fn emit(&self, kind: StatementKind, built: &BuiltQuery) {
        use tracing::Level;

        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = truncate_sql(&built.sql, self.max_sql_length);
        emit_at_level!(
            self.level,
            target: "crossql.sql",
            dialect = built.dialect.name(),
            kind = kind.as_str(),
            param_count = built.params.len(),
            sql = %sql,
        );
    }
}

/// Log a rendered statement according to `config`.
pub(crate) fn log_built(config: &SqlLogConfig, kind: StatementKind, built: &BuiltQuery) {
    if !config.enabled {
        return;
    }
    #[cfg(feature = "tracing")]
    TracingSqlHook::from_config(config).emit(kind, built);
    #[cfg(not(feature = "tracing"))]
    let _ = (kind, built);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_sql("SELECT 1", Some(100)), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", None), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", Some(6)), "SELECT...");
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_sql("aéb", Some(2)), "a...");
    }

    #[test]
    fn config_builders() {
        let cfg = SqlLogConfig::new().level(SqlLogLevel::Info).no_truncate();
        assert!(cfg.enabled);
        assert_eq!(cfg.level, SqlLogLevel::Info);
        assert_eq!(cfg.max_sql_length, None);
        assert!(!SqlLogConfig::disabled().enabled);
    }
}
