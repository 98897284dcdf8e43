//! Running several statements atomically.

use crate::client::Transactional;
use crate::error::{QbError, QbResult};
use crate::qb::BuiltQuery;

/// Execute `statements` in order inside `begin`/`commit`.
///
/// The first failure rolls the transaction back and is returned; a failed
/// rollback is logged and the original error still wins. Returns the total
/// affected row count.
///
/// # Example
/// ```ignore
/// let statements = crossql::table("users").dialect(Dialect::Sqlite).insert_many_chunked(rows)?;
/// crossql::transaction::execute_all(&conn, &statements).await?;
/// ```
pub async fn execute_all<C: Transactional>(conn: &C, statements: &[BuiltQuery]) -> QbResult<u64> {
    conn.begin().await?;

    let mut affected = 0;
    for (index, statement) in statements.iter().enumerate() {
        match conn.execute(&statement.sql, &statement.params).await {
            Ok(n) => affected += n,
            Err(err) => return Err(abort(conn, index, err).await),
        }
    }

    conn.commit().await?;
    Ok(affected)
}

/// Execute `statements`, then run `query` and return its first row, all
/// inside one transaction.
///
/// Used for statements followed by a per-connection lookup such as the
/// last inserted id, which is only meaningful on the same transaction.
pub async fn execute_then_fetch<C: Transactional>(
    conn: &C,
    statements: &[BuiltQuery],
    query: &BuiltQuery,
) -> QbResult<Option<C::Row>> {
    conn.begin().await?;

    for (index, statement) in statements.iter().enumerate() {
        if let Err(err) = conn.execute(&statement.sql, &statement.params).await {
            return Err(abort(conn, index, err).await);
        }
    }
    let row = match conn.query_opt(&query.sql, &query.params).await {
        Ok(row) => row,
        Err(err) => return Err(abort(conn, statements.len(), err).await),
    };

    conn.commit().await?;
    Ok(row)
}

/// Roll back after the statement at `index` failed; returns its error.
async fn abort<C: Transactional>(conn: &C, index: usize, err: QbError) -> QbError {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        target: "crossql.sql",
        index,
        error = %err,
        "statement failed; rolling back transaction"
    );
    #[cfg(not(feature = "tracing"))]
    let _ = index;

    if let Err(_rollback_err) = conn.rollback().await {
        #[cfg(feature = "tracing")]
        tracing::warn!(target: "crossql.sql", error = %_rollback_err, "rollback failed");
    }
    err
}
