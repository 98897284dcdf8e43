//! INSERT generators.

use crate::client::Transactional;
use crate::dialect::{Dialect, ReturningClause, write_value_rows};
use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use crate::qb::batch::Batch;
use crate::qb::param::ParamList;
use crate::qb::query::{BuiltQuery, Query};
use crate::tracing_hook::StatementKind;
use crate::value::{Cell, Row, Value};

/// Rows validated for a multi-row insert: identical column sets, cells
/// reordered to the first row's column order.
pub(crate) struct PreparedRows {
    pub(crate) columns: Vec<Ident>,
    pub(crate) rows: Vec<Row>,
}

impl PreparedRows {
    pub(crate) fn new(rows: Vec<Row>) -> QbResult<Self> {
        let first = rows
            .first()
            .ok_or_else(|| QbError::validation("no rows provided for insert"))?;
        if first.is_empty() {
            return Err(QbError::validation("cannot insert an empty row"));
        }

        let names: Vec<String> = first.columns().map(str::to_string).collect();
        let columns = names
            .iter()
            .map(|c| Ident::parse(c))
            .collect::<QbResult<Vec<_>>>()?;
        let order: Vec<&str> = names.iter().map(String::as_str).collect();

        let mut ordered = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let reordered = row
                .same_columns(first)
                .then(|| row.reordered(&order))
                .flatten()
                .ok_or_else(|| {
                    QbError::schema_mismatch(format!(
                        "row {i} has columns [{}], expected [{}]",
                        row.columns().collect::<Vec<_>>().join(", "),
                        order.join(", ")
                    ))
                })?;
            ordered.push(reordered);
        }

        Ok(Self {
            columns,
            rows: ordered,
        })
    }

    pub(crate) fn column_names(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|r| r.columns().collect())
            .unwrap_or_default()
    }

    fn bound_count(&self) -> usize {
        self.rows.iter().map(Row::bound_count).sum()
    }

    /// Enforce the dialect's row and parameter limits for one statement.
    pub(crate) fn check_limits(&self, dialect: Dialect) -> QbResult<()> {
        if let Some(max_rows) = dialect.max_rows_per_insert() {
            if self.rows.len() > max_rows {
                return Err(QbError::validation(format!(
                    "{} rows exceed the {dialect} limit of {max_rows} rows per insert; use insert_many_chunked",
                    self.rows.len()
                )));
            }
        }
        let bound = self.bound_count();
        if bound > dialect.max_bind_params() {
            return Err(QbError::validation(format!(
                "{bound} parameters exceed the {dialect} limit of {}; use insert_many_chunked",
                dialect.max_bind_params()
            )));
        }
        Ok(())
    }

    /// Split the rows into consecutive runs that each fit the dialect's row
    /// and parameter limits. Rows are packed greedily by their own bound
    /// count, since raw cells bind nothing.
    fn chunks(&self, dialect: Dialect) -> QbResult<Vec<&[Row]>> {
        let max_params = dialect.max_bind_params();
        let max_rows = dialect.max_rows_per_insert().unwrap_or(usize::MAX);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut bound = 0;
        for (i, row) in self.rows.iter().enumerate() {
            let row_bound = row.bound_count();
            if row_bound > max_params {
                return Err(QbError::validation(format!(
                    "row {i} binds {row_bound} parameters, over the {dialect} limit of {max_params}"
                )));
            }
            if i > start && (bound + row_bound > max_params || i - start >= max_rows) {
                chunks.push(&self.rows[start..i]);
                start = i;
                bound = 0;
            }
            bound += row_bound;
        }
        if start < self.rows.len() {
            chunks.push(&self.rows[start..]);
        }
        Ok(chunks)
    }
}

pub(crate) fn quote_columns(columns: &[Ident], dialect: Dialect) -> String {
    columns
        .iter()
        .map(|c| c.quoted(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Query {
    /// `INSERT INTO t (cols) VALUES (...)` for one row.
    ///
    /// Column order follows the row; raw cells are inlined and bind nothing.
    pub fn insert(&self, row: Row) -> QbResult<BuiltQuery> {
        self.insert_many(vec![row])
    }

    /// Insert one row and return the inserted row
    /// (`OUTPUT INSERTED.*` on SQL Server, `RETURNING *` on SQLite).
    pub fn insert_returning(&self, row: Row) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let clause = dialect.returning_clause()?;
        let table = self.mutation_table()?;
        let prepared = PreparedRows::new(vec![row])?;

        let mut binder = ParamList::new(dialect);
        let mut sql = format!(
            "INSERT INTO {} ({})",
            table.quoted(dialect),
            quote_columns(&prepared.columns, dialect)
        );
        if let ReturningClause::BeforeValues(output) = clause {
            sql.push(' ');
            sql.push_str(output);
        }
        sql.push_str(" VALUES ");
        write_value_rows(&prepared.rows, &mut binder, &mut sql);
        if let ReturningClause::Trailing(returning) = clause {
            sql.push(' ');
            sql.push_str(returning);
        }
        Ok(self.finish(StatementKind::Insert, sql, binder))
    }

    /// The insert followed by the dialect's last-insert-id query.
    ///
    /// Run it with [`Batch::execute_fetch_last`] (or
    /// [`insert_get_id_with`](Query::insert_get_id_with)) to receive the key.
    pub fn insert_get_id(&self, row: Row) -> QbResult<Batch> {
        let dialect = self.require_dialect()?;
        let insert = self.insert(row)?;
        let identity = BuiltQuery::new(dialect.last_insert_id_sql(), Vec::new(), dialect);
        Batch::new(dialect).push(insert)?.push(identity)
    }

    /// Insert one row and return the row holding its generated key.
    pub async fn insert_get_id_with<C: Transactional>(&self, conn: &C, row: Row) -> QbResult<Option<C::Row>> {
        self.insert_get_id(row)?.execute_fetch_last(conn).await
    }

    /// One multi-row INSERT.
    ///
    /// Every row must have the first row's column set; values are reordered
    /// to that order. Fails with a validation error when the dialect's row or
    /// parameter limits would be exceeded.
    pub fn insert_many(&self, rows: Vec<Row>) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        let prepared = PreparedRows::new(rows)?;
        prepared.check_limits(dialect)?;
        Ok(self.render_insert_rows(dialect, &table, "INSERT INTO", &prepared.columns, &prepared.rows))
    }

    /// Like [`insert_many`](Query::insert_many), split into as many
    /// statements as the dialect's limits require.
    pub fn insert_many_chunked(&self, rows: Vec<Row>) -> QbResult<Vec<BuiltQuery>> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        let prepared = PreparedRows::new(rows)?;

        Ok(prepared
            .chunks(dialect)?
            .into_iter()
            .map(|chunk| self.render_insert_rows(dialect, &table, "INSERT INTO", &prepared.columns, chunk))
            .collect())
    }

    /// Insert rows, skipping those that conflict with existing data.
    ///
    /// SQL Server has no ignore prefix, so each row becomes an
    /// `IF NOT EXISTS (...) INSERT ...;` statement binding the row twice.
    pub fn insert_or_ignore(&self, rows: Vec<Row>) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        let prepared = PreparedRows::new(rows)?;

        if let Some(prefix) = dialect.insert_ignore_prefix() {
            prepared.check_limits(dialect)?;
            return Ok(self.render_insert_rows(dialect, &table, prefix, &prepared.columns, &prepared.rows));
        }

        let table_sql = table.quoted(dialect);
        let column_list = quote_columns(&prepared.columns, dialect);
        let mut binder = ParamList::new(dialect);
        let mut statements = Vec::with_capacity(prepared.rows.len());

        for row in &prepared.rows {
            let mut stmt = format!("IF NOT EXISTS (SELECT 1 FROM {table_sql} WHERE ");
            for (i, (column, cell)) in prepared.columns.iter().zip(row.iter().map(|(_, c)| c)).enumerate() {
                if i > 0 {
                    stmt.push_str(" AND ");
                }
                column.write_quoted(dialect, &mut stmt);
                match cell {
                    Cell::Value(Value::Null) => stmt.push_str(" IS NULL"),
                    cell => {
                        stmt.push_str(" = ");
                        binder.write_cell(cell, &mut stmt);
                    }
                }
            }
            stmt.push_str(&format!(")\n    INSERT INTO {table_sql} ({column_list}) VALUES "));
            write_value_rows(std::slice::from_ref(row), &mut binder, &mut stmt);
            stmt.push(';');
            statements.push(stmt);
        }

        if binder.len() > dialect.max_bind_params() {
            return Err(QbError::validation(format!(
                "{} parameters exceed the {dialect} limit of {}",
                binder.len(),
                dialect.max_bind_params()
            )));
        }

        Ok(self.finish(StatementKind::Insert, statements.join("\n"), binder))
    }

    /// `INSERT INTO t (cols) SELECT ...`
    pub fn insert_using(&self, columns: &[&str], query: &Query) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        if columns.is_empty() {
            return Err(QbError::validation("insert_using requires at least one column"));
        }
        let columns = columns
            .iter()
            .map(|c| Ident::parse(c))
            .collect::<QbResult<Vec<_>>>()?;

        let mut binder = ParamList::new(dialect);
        let mut sql = format!(
            "INSERT INTO {} ({}) ",
            table.quoted(dialect),
            quote_columns(&columns, dialect)
        );
        query.write_sql(&mut binder, &mut sql)?;
        Ok(self.finish(StatementKind::Insert, sql, binder))
    }

    fn render_insert_rows(
        &self,
        dialect: Dialect,
        table: &Ident,
        verb: &str,
        columns: &[Ident],
        rows: &[Row],
    ) -> BuiltQuery {
        let mut binder = ParamList::new(dialect);
        let mut sql = format!(
            "{verb} {} ({}) VALUES ",
            table.quoted(dialect),
            quote_columns(columns, dialect)
        );
        write_value_rows(rows, &mut binder, &mut sql);
        self.finish(StatementKind::Insert, sql, binder)
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Raw;
    use crate::{Dialect, Query, Value, row};
    use crate::qb::traits::Filter;

    fn users(dialect: Dialect) -> Query {
        Query::new().table("users").dialect(dialect)
    }

    #[test]
    fn insert_single_row() {
        let built = users(Dialect::MySql)
            .insert(row! { "name" => "alice", "age" => 30 })
            .unwrap();
        assert_eq!(built.sql, "INSERT INTO `users` (`name`, `age`) VALUES (%s, %s)");
        assert_eq!(built.params, vec![Value::from("alice"), Value::Int(30)]);
    }

    #[test]
    fn raw_cells_are_inlined() {
        let built = users(Dialect::MsSql)
            .insert(row! { "name" => "bob", "created_at" => Raw::new("GETDATE()") })
            .unwrap();
        assert_eq!(built.sql, "INSERT INTO [users] ([name], [created_at]) VALUES (?, GETDATE())");
        assert_eq!(built.params.len(), 1);
    }

    #[test]
    fn empty_row_is_rejected() {
        assert!(users(Dialect::Sqlite).insert(row! {}).is_err());
        assert!(users(Dialect::Sqlite).insert_many(vec![]).is_err());
    }

    #[test]
    fn insert_returning_per_dialect() {
        let row = row! { "name" => "alice" };
        assert_eq!(
            users(Dialect::MsSql).insert_returning(row.clone()).unwrap().sql,
            "INSERT INTO [users] ([name]) OUTPUT INSERTED.* VALUES (?)"
        );
        assert_eq!(
            users(Dialect::Sqlite).insert_returning(row.clone()).unwrap().sql,
            "INSERT INTO \"users\" (\"name\") VALUES (?) RETURNING *"
        );
        assert!(users(Dialect::MySql).insert_returning(row).unwrap_err().is_unsupported());
    }

    #[test]
    fn insert_get_id_keeps_identity_query_separate() {
        let batch = users(Dialect::MySql)
            .insert_get_id(row! { "name" => "alice" })
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.statements()[1].sql, "SELECT LAST_INSERT_ID()");
        assert!(batch.statements()[1].params.is_empty());
        assert_eq!(batch.statements()[0].params, vec![Value::from("alice")]);
    }

    #[test]
    fn insert_many_reorders_to_first_row() {
        let built = users(Dialect::MySql)
            .insert_many(vec![
                row! { "name" => "a", "age" => 1 },
                row! { "age" => 2, "name" => "b" },
            ])
            .unwrap();
        assert_eq!(built.sql, "INSERT INTO `users` (`name`, `age`) VALUES (%s, %s), (%s, %s)");
        assert_eq!(
            built.params,
            vec![Value::from("a"), Value::Int(1), Value::from("b"), Value::Int(2)]
        );
    }

    #[test]
    fn insert_many_rejects_mismatched_rows() {
        let err = users(Dialect::MySql)
            .insert_many(vec![row! { "name" => "a" }, row! { "email" => "b" }])
            .unwrap_err();
        assert!(err.is_schema_mismatch());
    }

    #[test]
    fn mssql_row_limit_and_chunking() {
        let rows: Vec<_> = (0..1500).map(|i| row! { "n" => i }).collect();
        let q = Query::new().table("t").dialect(Dialect::MsSql);
        assert!(q.insert_many(rows.clone()).is_err());

        // 2100 params / 1 per row, capped at 1000 rows
        let chunks = q.insert_many_chunked(rows).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].params.len(), 1000);
        assert_eq!(chunks[1].params.len(), 500);
    }

    #[test]
    fn chunks_respect_params_when_first_row_is_raw() {
        let mut rows = vec![row! { "a" => 0, "b" => Raw::new("CURRENT_TIMESTAMP") }];
        rows.extend((1..40_000).map(|i| row! { "a" => i, "b" => i }));
        let chunks = Query::new()
            .table("t")
            .dialect(Dialect::Sqlite)
            .insert_many_chunked(rows)
            .unwrap();

        let limit = Dialect::Sqlite.max_bind_params();
        assert!(chunks.iter().all(|c| c.params.len() <= limit));
        assert!(chunks.iter().all(|c| c.placeholder_count() == c.params.len()));
        assert_eq!(chunks.iter().map(|c| c.params.len()).sum::<usize>(), 79_999);
    }

    #[test]
    fn insert_or_ignore_prefixes() {
        let rows = vec![row! { "id" => 1 }, row! { "id" => 2 }];
        assert_eq!(
            users(Dialect::MySql).insert_or_ignore(rows.clone()).unwrap().sql,
            "INSERT IGNORE INTO `users` (`id`) VALUES (%s), (%s)"
        );
        assert_eq!(
            users(Dialect::Sqlite).insert_or_ignore(rows).unwrap().sql,
            "INSERT OR IGNORE INTO \"users\" (\"id\") VALUES (?), (?)"
        );
    }

    #[test]
    fn insert_or_ignore_mssql_guards_each_row() {
        let built = users(Dialect::MsSql)
            .insert_or_ignore(vec![row! { "id" => 1, "name" => "a" }, row! { "id" => 2, "name" => "b" }])
            .unwrap();
        assert_eq!(
            built.sql,
            "IF NOT EXISTS (SELECT 1 FROM [users] WHERE [id] = ? AND [name] = ?)\n    INSERT INTO [users] ([id], [name]) VALUES (?, ?);\n\
             IF NOT EXISTS (SELECT 1 FROM [users] WHERE [id] = ? AND [name] = ?)\n    INSERT INTO [users] ([id], [name]) VALUES (?, ?);"
        );
        assert_eq!(built.params.len(), 8);
        assert_eq!(built.placeholder_count(), 8);
    }

    #[test]
    fn insert_using_subquery() {
        let source = Query::new().table("staging").select(&["name", "email"]).eq("valid", true);
        let built = users(Dialect::Sqlite)
            .insert_using(&["name", "email"], &source)
            .unwrap();
        assert_eq!(
            built.sql,
            "INSERT INTO \"users\" (\"name\", \"email\") SELECT \"name\", \"email\" FROM \"staging\" WHERE \"valid\" = ?"
        );
        assert_eq!(built.params, vec![Value::Bool(true)]);
    }
}
