//! Dialect translation rules.
//!
//! A [`Dialect`] is a stateless description of one database family's syntax:
//! identifier quoting, placeholder tokens, pagination, random ordering,
//! full-text search and conflict resolution (upsert). Every method is a pure
//! function of the dialect and its inputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QbError, QbResult};
use crate::ident::Ident;
use crate::qb::param::ParamList;
use crate::value::Row;

/// A target database family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB (`%s` placeholders, backtick quoting).
    #[serde(alias = "mariadb")]
    MySql,
    /// Microsoft SQL Server (`?` placeholders, bracket quoting).
    #[serde(alias = "sqlserver")]
    MsSql,
    /// SQLite 3 (`?` placeholders, double-quote quoting).
    #[serde(alias = "sqlite3")]
    Sqlite,
}

/// Full-text search modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullTextMode {
    NaturalLanguage,
    Boolean,
    QueryExpansion,
}

/// Date/time components that can be extracted from a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Year,
    Month,
    Day,
    Time,
}

/// Where a dialect places its "return inserted rows" clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningClause {
    /// Between the column list and `VALUES` (`OUTPUT INSERTED.*`).
    BeforeValues(&'static str),
    /// After the complete statement (`RETURNING *`).
    Trailing(&'static str),
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::MsSql, Dialect::Sqlite];

    /// Canonical lowercase driver name.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub(crate) fn quote_pair(self) -> (char, char) {
        match self {
            Dialect::MySql => ('`', '`'),
            Dialect::MsSql => ('[', ']'),
            Dialect::Sqlite => ('"', '"'),
        }
    }

    /// Quote a (possibly dotted) identifier for this dialect.
    ///
    /// `*` parts are left bare and embedded closing quotes are doubled.
    pub fn quote_identifier(self, name: &str) -> QbResult<String> {
        Ok(Ident::parse(name)?.quoted(self))
    }

    /// Placeholder token for the parameter at `index`.
    ///
    /// All supported dialects use a single repeated token, so `index` is ignored.
    pub fn placeholder(self, _index: usize) -> &'static str {
        match self {
            Dialect::MySql => "%s",
            Dialect::MsSql | Dialect::Sqlite => "?",
        }
    }

    /// Whether LIMIT/OFFSET requires an ORDER BY clause.
    pub fn requires_order_for_pagination(self) -> bool {
        matches!(self, Dialect::MsSql)
    }

    /// Render the pagination clause (with a leading space), or an empty string.
    pub fn render_pagination(
        self,
        limit: Option<u64>,
        offset: Option<u64>,
        has_order_by: bool,
    ) -> QbResult<String> {
        if limit.is_none() && offset.is_none() {
            return Ok(String::new());
        }
        if self.requires_order_for_pagination() && !has_order_by {
            return Err(QbError::pagination(format!(
                "the {self} dialect requires an ORDER BY clause for LIMIT/OFFSET"
            )));
        }

        let sql = match self {
            Dialect::MsSql => {
                let mut sql = format!(" OFFSET {} ROWS", offset.unwrap_or(0));
                if let Some(limit) = limit {
                    sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
                sql
            }
            Dialect::MySql | Dialect::Sqlite => match (limit, offset) {
                (Some(limit), None) => format!(" LIMIT {limit}"),
                (Some(limit), Some(offset)) => format!(" LIMIT {limit} OFFSET {offset}"),
                (None, Some(offset)) => format!(" LIMIT {} OFFSET {offset}", self.no_limit()),
                (None, None) => String::new(),
            },
        };
        Ok(sql)
    }

    /// Sentinel used for "no limit" when only an offset is requested.
    fn no_limit(self) -> &'static str {
        match self {
            Dialect::MySql => "18446744073709551615",
            Dialect::MsSql | Dialect::Sqlite => "-1",
        }
    }

    /// ORDER BY fragment for random ordering.
    pub fn random_order(self) -> &'static str {
        match self {
            Dialect::MySql => "RAND()",
            Dialect::MsSql => "NEWID()",
            Dialect::Sqlite => "RANDOM()",
        }
    }

    /// Render a full-text predicate over already-rendered column expressions.
    ///
    /// The search term is bound through `binder`.
    pub fn render_full_text(
        self,
        columns: &[String],
        term: &crate::value::Value,
        mode: Option<FullTextMode>,
        binder: &mut ParamList,
    ) -> QbResult<String> {
        if columns.is_empty() {
            return Err(QbError::invalid_predicate(
                "full-text search requires at least one column",
            ));
        }
        match self {
            Dialect::MySql => {
                let modifier = match mode {
                    None => "",
                    Some(FullTextMode::NaturalLanguage) => " IN NATURAL LANGUAGE MODE",
                    Some(FullTextMode::Boolean) => " IN BOOLEAN MODE",
                    Some(FullTextMode::QueryExpansion) => " WITH QUERY EXPANSION",
                };
                let placeholder = binder.bind(term.clone());
                Ok(format!(
                    "MATCH({}) AGAINST ({placeholder}{modifier})",
                    columns.join(", ")
                ))
            }
            Dialect::MsSql => {
                let function = match mode {
                    None | Some(FullTextMode::Boolean) => "CONTAINS",
                    Some(FullTextMode::NaturalLanguage) => "FREETEXT",
                    Some(FullTextMode::QueryExpansion) => {
                        return Err(QbError::unsupported("full-text query expansion", self));
                    }
                };
                let target = if columns.len() == 1 {
                    columns[0].clone()
                } else {
                    format!("({})", columns.join(", "))
                };
                let placeholder = binder.bind(term.clone());
                Ok(format!("{function}({target}, {placeholder})"))
            }
            Dialect::Sqlite => Err(QbError::unsupported("full-text search", self)),
        }
    }

    /// Render an insert-or-update statement.
    ///
    /// `rows` must already be ordered by `columns`. Exactly `rows × columns`
    /// values are bound, row-major.
    pub fn render_upsert(
        self,
        table: &Ident,
        columns: &[Ident],
        rows: &[Row],
        unique_by: &[Ident],
        update_columns: &[Ident],
        binder: &mut ParamList,
    ) -> QbResult<String> {
        let table_sql = table.quoted(self);
        let column_list = quote_list(columns, self);

        match self {
            Dialect::MySql => {
                let mut sql = if update_columns.is_empty() {
                    format!("INSERT IGNORE INTO {table_sql} ({column_list}) VALUES ")
                } else {
                    format!("INSERT INTO {table_sql} ({column_list}) VALUES ")
                };
                write_value_rows(rows, binder, &mut sql);
                if !update_columns.is_empty() {
                    let updates: Vec<String> = update_columns
                        .iter()
                        .map(|c| {
                            let q = c.quoted(self);
                            format!("{q} = VALUES({q})")
                        })
                        .collect();
                    sql.push_str(" ON DUPLICATE KEY UPDATE ");
                    sql.push_str(&updates.join(", "));
                }
                Ok(sql)
            }
            Dialect::MsSql => {
                let mut sql = format!("MERGE INTO {table_sql} AS target USING (VALUES ");
                write_value_rows(rows, binder, &mut sql);
                sql.push_str(&format!(") AS src ({column_list}) ON "));
                let on: Vec<String> = unique_by
                    .iter()
                    .map(|c| {
                        let q = c.quoted(self);
                        format!("target.{q} = src.{q}")
                    })
                    .collect();
                sql.push_str(&on.join(" AND "));
                if !update_columns.is_empty() {
                    let set: Vec<String> = update_columns
                        .iter()
                        .map(|c| {
                            let q = c.quoted(self);
                            format!("target.{q} = src.{q}")
                        })
                        .collect();
                    sql.push_str(" WHEN MATCHED THEN UPDATE SET ");
                    sql.push_str(&set.join(", "));
                }
                let src_values: Vec<String> = columns
                    .iter()
                    .map(|c| format!("src.{}", c.quoted(self)))
                    .collect();
                sql.push_str(&format!(
                    " WHEN NOT MATCHED THEN INSERT ({column_list}) VALUES ({});",
                    src_values.join(", ")
                ));
                Ok(sql)
            }
            Dialect::Sqlite => {
                let mut sql = format!("INSERT INTO {table_sql} ({column_list}) VALUES ");
                write_value_rows(rows, binder, &mut sql);
                sql.push_str(&format!(" ON CONFLICT ({})", quote_list(unique_by, self)));
                if update_columns.is_empty() {
                    sql.push_str(" DO NOTHING");
                } else {
                    let set: Vec<String> = update_columns
                        .iter()
                        .map(|c| {
                            let q = c.quoted(self);
                            format!("{q} = excluded.{q}")
                        })
                        .collect();
                    sql.push_str(" DO UPDATE SET ");
                    sql.push_str(&set.join(", "));
                }
                Ok(sql)
            }
        }
    }

    /// Whether `expr BETWEEN a AND b` may be emitted for date ranges.
    ///
    /// When `false` the range is decomposed into a parenthesized
    /// `(expr >= a AND expr <= b)` pair. SQLite stores dates as text of mixed
    /// precision, so it always decomposes.
    pub fn or_safe_between(self) -> bool {
        !matches!(self, Dialect::Sqlite)
    }

    /// Operator keyword for regular-expression matching.
    pub fn regexp_operator(self) -> QbResult<&'static str> {
        match self {
            Dialect::MySql | Dialect::Sqlite => Ok("REGEXP"),
            Dialect::MsSql => Err(QbError::unsupported("REGEXP", self)),
        }
    }

    /// Wrap an already-rendered column expression to extract a date part.
    pub fn date_part(self, part: DatePart, expr: &str) -> String {
        match (self, part) {
            (Dialect::Sqlite, DatePart::Date) => format!("date({expr})"),
            (Dialect::Sqlite, DatePart::Time) => format!("time({expr})"),
            (Dialect::Sqlite, DatePart::Year) => format!("CAST(strftime('%Y', {expr}) AS INTEGER)"),
            (Dialect::Sqlite, DatePart::Month) => format!("CAST(strftime('%m', {expr}) AS INTEGER)"),
            (Dialect::Sqlite, DatePart::Day) => format!("CAST(strftime('%d', {expr}) AS INTEGER)"),
            (_, DatePart::Date) => format!("CAST({expr} AS DATE)"),
            (_, DatePart::Time) => format!("CAST({expr} AS TIME)"),
            (_, DatePart::Year) => format!("YEAR({expr})"),
            (_, DatePart::Month) => format!("MONTH({expr})"),
            (_, DatePart::Day) => format!("DAY({expr})"),
        }
    }

    /// Left-hand side and operator of a case-sensitive LIKE (the pattern
    /// placeholder follows).
    pub fn case_sensitive_like(self, expr: &str, negated: bool) -> QbResult<String> {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        match self {
            Dialect::MySql => Ok(format!("{expr} COLLATE utf8mb4_bin {op}")),
            Dialect::MsSql => Ok(format!("{expr} COLLATE Latin1_General_CS_AS {op}")),
            Dialect::Sqlite => Err(QbError::unsupported("case-sensitive LIKE", self)),
        }
    }

    /// Statement prefix for inserts that skip conflicting rows.
    ///
    /// SQL Server has no such prefix; it guards each row with `IF NOT EXISTS`.
    pub fn insert_ignore_prefix(self) -> Option<&'static str> {
        match self {
            Dialect::MySql => Some("INSERT IGNORE INTO"),
            Dialect::Sqlite => Some("INSERT OR IGNORE INTO"),
            Dialect::MsSql => None,
        }
    }

    /// Statement returning the identity generated by the last insert.
    pub fn last_insert_id_sql(self) -> &'static str {
        match self {
            Dialect::MySql => "SELECT LAST_INSERT_ID()",
            Dialect::MsSql => "SELECT SCOPE_IDENTITY()",
            Dialect::Sqlite => "SELECT last_insert_rowid()",
        }
    }

    /// Clause returning the inserted rows.
    pub fn returning_clause(self) -> QbResult<ReturningClause> {
        match self {
            Dialect::MsSql => Ok(ReturningClause::BeforeValues("OUTPUT INSERTED.*")),
            Dialect::Sqlite => Ok(ReturningClause::Trailing("RETURNING *")),
            Dialect::MySql => Err(QbError::unsupported("INSERT ... RETURNING", self)),
        }
    }

    /// Keyword following `WITH` for recursive CTEs (with trailing space).
    pub fn recursive_cte_keyword(self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::Sqlite => "RECURSIVE ",
            Dialect::MsSql => "",
        }
    }

    /// Keyword and trailing condition for a correlated (lateral) join.
    ///
    /// MySQL 8 spells it `LEFT JOIN LATERAL ... ON TRUE`; SQL Server uses
    /// `OUTER APPLY`, which takes no ON clause.
    pub fn lateral_join(self) -> QbResult<(&'static str, &'static str)> {
        match self {
            Dialect::MySql => Ok(("LEFT JOIN LATERAL", " ON TRUE")),
            Dialect::MsSql => Ok(("OUTER APPLY", "")),
            Dialect::Sqlite => Err(QbError::unsupported("lateral join", self)),
        }
    }

    /// Maximum number of bound parameters in one statement.
    pub fn max_bind_params(self) -> usize {
        match self {
            Dialect::MySql => 65_535,
            Dialect::MsSql => 2_100,
            Dialect::Sqlite => 32_766,
        }
    }

    /// Maximum number of rows in one multi-row `VALUES` list, if limited.
    pub fn max_rows_per_insert(self) -> Option<usize> {
        match self {
            Dialect::MsSql => Some(1_000),
            Dialect::MySql | Dialect::Sqlite => None,
        }
    }
}

fn quote_list(idents: &[Ident], dialect: Dialect) -> String {
    idents
        .iter()
        .map(|i| i.quoted(dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Append `(v, v), (v, v)` for each row, binding values and inlining raw cells.
pub(crate) fn write_value_rows(rows: &[Row], binder: &mut ParamList, out: &mut String) {
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for (j, (_, cell)) in row.iter().enumerate() {
            if j > 0 {
                out.push_str(", ");
            }
            binder.write_cell(cell, out);
        }
        out.push(')');
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = QbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" => Ok(Dialect::MsSql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(QbError::configuration(format!("unknown driver: {other}"))),
        }
    }
}
