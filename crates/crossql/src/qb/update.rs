//! UPDATE generators.

use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use crate::qb::param::ParamList;
use crate::qb::query::{BuiltQuery, Query};
use crate::tracing_hook::StatementKind;
use crate::value::{Row, Value};

impl Query {
    /// Reject UPDATE/DELETE without conditions unless explicitly allowed.
    pub(crate) fn guard_unrestricted(&self, verb: &str) -> QbResult<()> {
        if !self.has_conditions() && !self.allow_unrestricted {
            return Err(QbError::unsafe_mutation(format!(
                "{verb} without a WHERE clause; add conditions or call allow_unrestricted(true)"
            )));
        }
        Ok(())
    }

    /// `UPDATE t SET c = ?, ... WHERE ...`
    ///
    /// SET parameters precede WHERE parameters. Record-bound queries (see
    /// [`for_record`](Query::for_record)) never update the primary key.
    pub fn update(&self, values: Row) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        self.guard_unrestricted("UPDATE")?;

        let mut values = values;
        if self.record_bound {
            values.remove(&self.primary_key);
        }
        if values.is_empty() {
            return Err(QbError::validation("no update values provided"));
        }

        let mut binder = ParamList::new(dialect);
        let mut sql = format!("UPDATE {} SET ", table.quoted(dialect));
        for (i, (column, cell)) in values.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            Ident::parse(column)?.write_quoted(dialect, &mut sql);
            sql.push_str(" = ");
            binder.write_cell(cell, &mut sql);
        }
        self.write_where(&mut binder, &mut sql)?;
        Ok(self.finish(StatementKind::Update, sql, binder))
    }

    /// `UPDATE t SET c = c + ? WHERE ...`
    pub fn increment(&self, column: &str, amount: impl Into<Value>) -> QbResult<BuiltQuery> {
        self.step(&[(column, amount.into())], "+")
    }

    /// `UPDATE t SET c = c - ? WHERE ...`
    pub fn decrement(&self, column: &str, amount: impl Into<Value>) -> QbResult<BuiltQuery> {
        self.step(&[(column, amount.into())], "-")
    }

    /// Increment several columns in one statement.
    pub fn increment_each(&self, pairs: &[(&str, i64)]) -> QbResult<BuiltQuery> {
        let pairs: Vec<(&str, Value)> = pairs.iter().map(|(c, n)| (*c, Value::Int(*n))).collect();
        self.step(&pairs, "+")
    }

    /// Decrement several columns in one statement.
    pub fn decrement_each(&self, pairs: &[(&str, i64)]) -> QbResult<BuiltQuery> {
        let pairs: Vec<(&str, Value)> = pairs.iter().map(|(c, n)| (*c, Value::Int(*n))).collect();
        self.step(&pairs, "-")
    }

    fn step(&self, pairs: &[(&str, Value)], sign: &str) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        self.guard_unrestricted("UPDATE")?;
        if pairs.is_empty() {
            return Err(QbError::validation("no columns to increment or decrement"));
        }

        let mut binder = ParamList::new(dialect);
        let mut sql = format!("UPDATE {} SET ", table.quoted(dialect));
        for (i, (column, amount)) in pairs.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let quoted = Ident::parse(column)?.quoted(dialect);
            sql.push_str(&format!("{quoted} = {quoted} {sign} "));
            sql.push_str(binder.bind(amount.clone()));
        }
        self.write_where(&mut binder, &mut sql)?;
        Ok(self.finish(StatementKind::Update, sql, binder))
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Raw;
    use crate::{Dialect, Filter, Query, Value, row};

    fn users(dialect: Dialect) -> Query {
        Query::new().table("users").dialect(dialect)
    }

    #[test]
    fn update_set_params_precede_where_params() {
        let built = users(Dialect::MySql)
            .eq("id", 7)
            .update(row! { "name" => "bob", "touched_at" => Raw::new("NOW()") })
            .unwrap();
        assert_eq!(
            built.sql,
            "UPDATE `users` SET `name` = %s, `touched_at` = NOW() WHERE `id` = %s"
        );
        assert_eq!(built.params, vec![Value::from("bob"), Value::Int(7)]);
    }

    #[test]
    fn update_without_where_is_unsafe() {
        let err = users(Dialect::Sqlite).update(row! { "active" => false }).unwrap_err();
        assert!(err.is_unsafe_mutation());

        let built = users(Dialect::Sqlite)
            .allow_unrestricted(true)
            .update(row! { "active" => false })
            .unwrap();
        assert_eq!(built.sql, "UPDATE \"users\" SET \"active\" = ?");
    }

    #[test]
    fn record_bound_update_skips_primary_key() {
        let built = users(Dialect::MsSql)
            .for_record(5)
            .update(row! { "id" => 5, "name" => "eve" })
            .unwrap();
        assert_eq!(built.sql, "UPDATE [users] SET [name] = ? WHERE [id] = ?");
        assert_eq!(built.params, vec![Value::from("eve"), Value::Int(5)]);
    }

    #[test]
    fn increment_and_decrement() {
        let built = users(Dialect::MySql).eq("id", 1).increment("votes", 1).unwrap();
        assert_eq!(built.sql, "UPDATE `users` SET `votes` = `votes` + %s WHERE `id` = %s");

        let built = users(Dialect::Sqlite)
            .eq("id", 1)
            .decrement_each(&[("credits", 5), ("stock", 1)])
            .unwrap();
        assert_eq!(
            built.sql,
            "UPDATE \"users\" SET \"credits\" = \"credits\" - ?, \"stock\" = \"stock\" - ? WHERE \"id\" = ?"
        );
        assert_eq!(built.params, vec![Value::Int(5), Value::Int(1), Value::Int(1)]);
    }

    #[test]
    fn increment_requires_where() {
        assert!(users(Dialect::MySql).increment("votes", 1).unwrap_err().is_unsafe_mutation());
    }
}
