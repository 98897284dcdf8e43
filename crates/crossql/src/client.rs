//! Execution collaborator traits.
//!
//! The builder never talks to a database. Anything that can run SQL text with
//! ordered [`Value`] parameters (a driver connection, a pool handle, a test
//! double) implements [`Executor`]; [`BuiltQuery::fetch_all`] and
//! [`BuiltQuery::execute`] forward to it.
//!
//! [`BuiltQuery::fetch_all`]: crate::BuiltQuery::fetch_all
//! [`BuiltQuery::execute`]: crate::BuiltQuery::execute

use std::future::Future;

use crate::error::QbResult;
use crate::value::Value;

/// Runs rendered SQL.
///
/// Implementations receive SQL already written in their dialect's placeholder
/// style and must surface driver failures as [`QbError::Execution`].
///
/// [`QbError::Execution`]: crate::QbError::Execution
pub trait Executor: Send + Sync {
    /// The driver's row type.
    type Row: Send;

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = QbResult<Vec<Self::Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = QbResult<u64>> + Send;

    /// Execute a query and return the first row, if any.
    ///
    /// The default implementation calls [`Executor::query`] and discards the
    /// remaining rows.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = QbResult<Option<Self::Row>>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            Ok(rows.into_iter().next())
        }
    }
}

/// An [`Executor`] that can group statements into a transaction.
pub trait Transactional: Executor {
    fn begin(&self) -> impl Future<Output = QbResult<()>> + Send;

    fn commit(&self) -> impl Future<Output = QbResult<()>> + Send;

    fn rollback(&self) -> impl Future<Output = QbResult<()>> + Send;
}
