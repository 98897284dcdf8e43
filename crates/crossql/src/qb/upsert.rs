//! Insert-or-update generators.

use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use crate::qb::insert::PreparedRows;
use crate::qb::param::ParamList;
use crate::qb::query::{BuiltQuery, Query};
use crate::tracing_hook::StatementKind;
use crate::value::Row;

fn resolve_columns(names: &[&str], available: &[&str], role: &str) -> QbResult<Vec<Ident>> {
    names
        .iter()
        .map(|name| {
            if !available.contains(name) {
                return Err(QbError::schema_mismatch(format!(
                    "{role} column {name} is not present in the rows"
                )));
            }
            Ident::parse(name)
        })
        .collect()
}

impl Query {
    /// Insert rows, updating `update_columns` when a row collides on `unique_by`.
    ///
    /// MySQL renders `ON DUPLICATE KEY UPDATE`, SQL Server a `MERGE`, SQLite
    /// `ON CONFLICT ... DO UPDATE`. With no update columns, colliding rows are
    /// skipped. Exactly `rows × columns` values are bound.
    pub fn upsert(&self, rows: Vec<Row>, unique_by: &[&str], update_columns: &[&str]) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        if unique_by.is_empty() {
            return Err(QbError::validation("upsert requires at least one unique_by column"));
        }

        let prepared = PreparedRows::new(rows)?;
        prepared.check_limits(dialect)?;
        let available = prepared.column_names();
        let unique_by = resolve_columns(unique_by, &available, "unique_by")?;
        let update_columns = resolve_columns(update_columns, &available, "update")?;

        let mut binder = ParamList::new(dialect);
        let sql = dialect.render_upsert(
            &table,
            &prepared.columns,
            &prepared.rows,
            &unique_by,
            &update_columns,
            &mut binder,
        )?;
        Ok(self.finish(StatementKind::Upsert, sql, binder))
    }

    /// Single-row upsert keyed on the columns of `match_on`.
    ///
    /// Values in `values` win over `match_on` for shared columns.
    pub fn update_or_insert(&self, match_on: Row, values: Row) -> QbResult<BuiltQuery> {
        let unique_by: Vec<String> = match_on.columns().map(str::to_string).collect();
        let update_columns: Vec<String> = values.columns().map(str::to_string).collect();

        let mut combined = match_on;
        for (column, cell) in values.iter() {
            combined.insert(column, cell.clone());
        }

        let unique_by: Vec<&str> = unique_by.iter().map(String::as_str).collect();
        let update_columns: Vec<&str> = update_columns.iter().map(String::as_str).collect();
        self.upsert(vec![combined], &unique_by, &update_columns)
    }
}
