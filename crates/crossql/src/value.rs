//! Bound values, raw SQL fragments and insert rows.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;
use uuid::Uuid;

/// A scalar value bound as a query parameter.
///
/// Values are resolved when a clause is added, so rendering never inspects
/// caller types.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Uuid(Uuid),
    Json(serde_json::Value),
    #[cfg(feature = "rust_decimal")]
    Decimal(rust_decimal::Decimal),
}

impl Value {
    /// Check if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truncate date-times to their date; other values are returned unchanged.
    pub(crate) fn into_date(self) -> Value {
        match self {
            Value::DateTime(dt) => Value::Date(dt.date()),
            other => other,
        }
    }

    /// Render this value as an inline SQL literal.
    ///
    /// Only meant for logs and debugging output; never execute the result.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => quote_literal(s),
            Value::Date(d) => quote_literal(&d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => quote_literal(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Time(t) => quote_literal(&t.format("%H:%M:%S%.f").to_string()),
            Value::Uuid(u) => quote_literal(&u.to_string()),
            Value::Json(j) => quote_literal(&j.to_string()),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => d.to_string(),
        }
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql_literal())
    }
}

/// Implements `From<$t>` for `Value`, plus `Option<$t>` (mapping `None` to NULL).
macro_rules! impl_value_from {
    ($($t:ty => |$v:ident| $e:expr),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from($v: $t) -> Self {
                    $e
                }
            }

            impl From<Option<$t>> for Value {
                fn from(v: Option<$t>) -> Self {
                    v.map(Value::from).unwrap_or(Value::Null)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => |v| Value::Bool(v),
    i8 => |v| Value::Int(i64::from(v)),
    i16 => |v| Value::Int(i64::from(v)),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u8 => |v| Value::Int(i64::from(v)),
    u16 => |v| Value::Int(i64::from(v)),
    u32 => |v| Value::Int(i64::from(v)),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    &String => |v| Value::Text(v.clone()),
    NaiveDate => |v| Value::Date(v),
    NaiveDateTime => |v| Value::DateTime(v),
    NaiveTime => |v| Value::Time(v),
    Uuid => |v| Value::Uuid(v),
    serde_json::Value => |v| Value::Json(v),
}

#[cfg(feature = "rust_decimal")]
impl_value_from! {
    rust_decimal::Decimal => |v| Value::Decimal(v),
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::DateTime(v.naive_utc())
    }
}

/// A raw SQL fragment inlined verbatim (never bound).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(pub String);

impl Raw {
    pub fn new(sql: impl Into<String>) -> Self {
        Raw(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cell of an insert/update row: a bound value or a raw fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Raw(Raw),
}

impl From<Raw> for Cell {
    fn from(raw: Raw) -> Self {
        Cell::Raw(raw)
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Cell::Value(value)
    }
}

/// Implements `From<$t>` for a wrapper enum by way of `Value`.
macro_rules! impl_from_via_value {
    ($target:ident :: $variant:ident; $($t:ty),* $(,)?) => {
        $(
            impl From<$t> for $target {
                fn from(v: $t) -> Self {
                    $target::$variant(Value::from(v))
                }
            }

            impl From<Option<$t>> for $target {
                fn from(v: Option<$t>) -> Self {
                    $target::$variant(Value::from(v))
                }
            }
        )*
    };
}

pub(crate) use impl_from_via_value;

impl_from_via_value!(Cell::Value;
    bool, i8, i16, i32, i64, u8, u16, u32, f32, f64,
    String, &str, &String, NaiveDate, NaiveDateTime, NaiveTime, Uuid, serde_json::Value,
);

#[cfg(feature = "rust_decimal")]
impl_from_via_value!(Cell::Value; rust_decimal::Decimal);

/// An ordered set of `(column, cell)` pairs.
///
/// Column order is insertion order; setting an existing column replaces its
/// cell in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    /// Set a column (consuming builder).
    pub fn set(mut self, column: impl Into<String>, cell: impl Into<Cell>) -> Self {
        self.insert(column, cell);
        self
    }

    /// Set a column in place.
    pub fn insert(&mut self, column: impl Into<String>, cell: impl Into<Cell>) {
        let column = column.into();
        let cell = cell.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = cell,
            None => self.cells.push((column, cell)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Remove a column, returning its cell.
    pub fn remove(&mut self, column: &str) -> Option<Cell> {
        let pos = self.cells.iter().position(|(c, _)| c == column)?;
        Some(self.cells.remove(pos).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Check whether both rows have the same column set (order ignored).
    pub fn same_columns(&self, other: &Row) -> bool {
        self.len() == other.len() && self.columns().all(|c| other.contains(c))
    }

    /// Reorder cells to follow `columns`. Returns `None` if a column is missing.
    pub(crate) fn reordered(&self, columns: &[&str]) -> Option<Row> {
        let mut cells = Vec::with_capacity(columns.len());
        for column in columns {
            cells.push((column.to_string(), self.get(column)?.clone()));
        }
        Some(Row { cells })
    }

    /// Number of cells that bind a parameter (raw cells are inlined).
    pub(crate) fn bound_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|(_, c)| matches!(c, Cell::Value(_)))
            .count()
    }
}

impl<K: Into<String>, C: Into<Cell>> FromIterator<(K, C)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, C)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, c) in iter {
            row.insert(k, c);
        }
        row
    }
}

/// Build a [`Row`] from `column => value` pairs.
///
/// ```ignore
/// let row = crossql::row! { "name" => "alice", "created_at" => Raw::new("NOW()") };
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {
        $crate::Row::new()$(.set($col, $val))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_maps_to_null() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3i32)), Value::Int(3));
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(Value::from("O'Brien").to_sql_literal(), "'O''Brien'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(true).to_string(), "1");
    }

    #[test]
    fn date_time_truncates() {
        let dt = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        assert_eq!(
            Value::from(dt).into_date(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
    }

    #[test]
    fn row_keeps_insertion_order_and_replaces() {
        let row = Row::new().set("b", 1).set("a", 2).set("b", 3);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&Cell::Value(Value::Int(3))));
    }

    #[test]
    fn row_macro_and_raw_cells() {
        let row = crate::row! { "name" => "alice", "created_at" => Raw::new("NOW()") };
        assert_eq!(row.len(), 2);
        assert_eq!(row.bound_count(), 1);
    }

    #[test]
    fn reorder_and_same_columns() {
        let a = Row::new().set("x", 1).set("y", 2);
        let b = Row::new().set("y", 3).set("x", 4);
        assert!(a.same_columns(&b));
        let r = b.reordered(&["x", "y"]).unwrap();
        assert_eq!(r.columns().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(a.reordered(&["z"]).is_none());
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::from(1), Value::from("a"), Value::Null])
            .unwrap();
        assert_eq!(json, "[1,\"a\",null]");
    }
}
