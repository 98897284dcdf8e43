//! Error types for crossql

use crate::dialect::Dialect;
use thiserror::Error;

/// Result type alias for crossql operations
pub type QbResult<T> = Result<T, QbError>;

/// Errors raised while building or rendering a query.
///
/// Every variant is a local, deterministic validation failure: it is raised
/// before any SQL text is produced and is never retried.
#[derive(Debug, Clone, Error)]
pub enum QbError {
    /// Dialect or table missing (or mismatched) at render time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operator/value shape mismatch
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    /// UPDATE/DELETE without a WHERE clause
    #[error("Unsafe mutation: {0}")]
    UnsafeMutation(String),

    /// Pagination that the dialect cannot express
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// Rows with differing column sets
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Capability without a translation for the active dialect
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedFeature {
        feature: &'static str,
        dialect: Dialect,
    },

    /// Other invalid input (empty rows, bad identifiers, limits)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Error reported by an execution collaborator
    #[error("Execution error: {0}")]
    Execution(String),
}

impl QbError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create an invalid predicate error
    pub fn invalid_predicate(message: impl Into<String>) -> Self {
        Self::InvalidPredicate(message.into())
    }

    /// Create an unsafe mutation error
    pub fn unsafe_mutation(message: impl Into<String>) -> Self {
        Self::UnsafeMutation(message.into())
    }

    /// Create a pagination error
    pub fn pagination(message: impl Into<String>) -> Self {
        Self::Pagination(message.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }

    /// Create an unsupported feature error
    pub fn unsupported(feature: &'static str, dialect: Dialect) -> Self {
        Self::UnsupportedFeature { feature, dialect }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Check if this is an invalid predicate error
    pub fn is_invalid_predicate(&self) -> bool {
        matches!(self, Self::InvalidPredicate(_))
    }

    /// Check if this is an unsafe mutation error
    pub fn is_unsafe_mutation(&self) -> bool {
        matches!(self, Self::UnsafeMutation(_))
    }

    /// Check if this is a pagination error
    pub fn is_pagination(&self) -> bool {
        matches!(self, Self::Pagination(_))
    }

    /// Check if this is a schema mismatch error
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }

    /// Check if this is an unsupported feature error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedFeature { .. })
    }
}

impl From<toml::de::Error> for QbError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
