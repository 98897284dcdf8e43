//! Ordered groups of independently rendered statements.

use crate::client::Transactional;
use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::qb::query::BuiltQuery;
use crate::transaction;

/// A sequence of statements for one dialect.
///
/// Each statement keeps its own parameters. [`into_built`](Batch::into_built)
/// concatenates them with `"; "` for drivers that accept multi-statement
/// text; [`execute_all`](Batch::execute_all) runs them one by one inside a
/// transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    dialect: Dialect,
    statements: Vec<BuiltQuery>,
}

impl Batch {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: Vec::new(),
        }
    }

    /// Append a statement.
    ///
    /// Fails if the statement targets another dialect or its placeholder
    /// count differs from its parameter count.
    pub fn push(mut self, statement: BuiltQuery) -> QbResult<Self> {
        if statement.dialect != self.dialect {
            return Err(QbError::configuration(format!(
                "cannot add a {} statement to a {} batch",
                statement.dialect, self.dialect
            )));
        }
        let placeholders = statement.placeholder_count();
        if placeholders != statement.params.len() {
            return Err(QbError::validation(format!(
                "statement has {placeholders} placeholders but {} parameters",
                statement.params.len()
            )));
        }
        self.statements.push(statement);
        Ok(self)
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn statements(&self) -> &[BuiltQuery] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Join all statements into one text with parameters flattened in order.
    pub fn into_built(self) -> BuiltQuery {
        let sql = self
            .statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let params = self.statements.into_iter().flat_map(|s| s.params).collect();
        BuiltQuery::new(sql, params, self.dialect)
    }

    /// Run every statement inside one transaction.
    pub async fn execute_all<C: Transactional>(&self, conn: &C) -> QbResult<u64> {
        transaction::execute_all(conn, &self.statements).await
    }

    /// Execute every statement but the last, then run the last one as a
    /// query and return its first row, inside one transaction.
    ///
    /// This is how an [`insert_get_id`](crate::Query::insert_get_id) batch
    /// yields the generated key.
    pub async fn execute_fetch_last<C: Transactional>(&self, conn: &C) -> QbResult<Option<C::Row>> {
        let (last, rest) = self
            .statements
            .split_last()
            .ok_or_else(|| QbError::validation("cannot run an empty batch"))?;
        transaction::execute_then_fetch(conn, rest, last).await
    }
}

impl IntoIterator for Batch {
    type Item = BuiltQuery;
    type IntoIter = std::vec::IntoIter<BuiltQuery>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn joins_statements_and_flattens_params() {
        let batch = Batch::new(Dialect::Sqlite)
            .push(BuiltQuery::new("DELETE FROM \"a\" WHERE \"id\" = ?", vec![Value::Int(1)], Dialect::Sqlite))
            .unwrap()
            .push(BuiltQuery::new("SELECT changes()", vec![], Dialect::Sqlite))
            .unwrap();
        assert_eq!(batch.len(), 2);

        let built = batch.into_built();
        assert_eq!(built.sql, "DELETE FROM \"a\" WHERE \"id\" = ?; SELECT changes()");
        assert_eq!(built.params, vec![Value::Int(1)]);
    }

    #[test]
    fn rejects_foreign_dialect() {
        let err = Batch::new(Dialect::MySql)
            .push(BuiltQuery::new("SELECT 1", vec![], Dialect::MsSql))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn rejects_placeholder_mismatch() {
        let err = Batch::new(Dialect::MySql)
            .push(BuiltQuery::new("SELECT %s, %s", vec![Value::Int(1)], Dialect::MySql))
            .unwrap_err();
        assert!(matches!(err, QbError::Validation(_)));
    }
}
