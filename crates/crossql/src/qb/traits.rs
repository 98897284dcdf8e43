//! The fluent condition surface shared by [`Query`](crate::Query) and
//! [`Conditions`](crate::qb::Conditions).

use chrono::{Local, NaiveDate, NaiveTime};

use crate::dialect::{DatePart, FullTextMode};
use crate::error::{QbError, QbResult};
use crate::qb::expr::{Conditions, Connector, Operand, Operator, PredicateKind, PredicateTree};
use crate::qb::query::Query;
use crate::value::Value;

/// Builder methods for a predicate tree.
///
/// Implementors only expose their tree; every condition method is provided.
/// Typed helpers (`eq`, `in_list`, ...) cannot produce an invalid shape and
/// are infallible; a blank column is recorded on the tree and reported when
/// it renders. Methods taking an operator string or a raw template validate
/// when called and return `QbResult<Self>`.
pub trait Filter: Sized {
    /// The tree new conditions are appended to.
    fn conditions_mut(&mut self) -> &mut PredicateTree;

    /// Append a predicate with an explicit connector.
    fn push_predicate(mut self, connector: Connector, kind: PredicateKind) -> Self {
        self.conditions_mut().push(connector, kind);
        self
    }

    /// Append a validated predicate, or record its error for render time.
    #[doc(hidden)]
    fn push_checked(mut self, connector: Connector, kind: QbResult<PredicateKind>) -> Self {
        match kind {
            Ok(kind) => self.conditions_mut().push(connector, kind),
            Err(err) => self.conditions_mut().fail(err),
        }
        self
    }

    // ==================== Generic operator ====================

    /// Add WHERE: `column <op> value`, validating the operator/value shape.
    fn where_op(self, column: &str, op: &str, value: impl Into<Operand>) -> QbResult<Self> {
        let kind = PredicateKind::leaf(column, Operator::parse(op)?, Some(value.into()))?;
        Ok(self.push_predicate(Connector::And, kind))
    }

    /// Add OR: `column <op> value`.
    fn or_where_op(self, column: &str, op: &str, value: impl Into<Operand>) -> QbResult<Self> {
        let kind = PredicateKind::leaf(column, Operator::parse(op)?, Some(value.into()))?;
        Ok(self.push_predicate(Connector::Or, kind))
    }

    // ==================== Typed comparisons ====================

    #[doc(hidden)]
    fn compare(self, connector: Connector, column: &str, op: Operator, value: Value) -> Self {
        let kind = PredicateKind::leaf(column, op, Some(Operand::Scalar(value)));
        self.push_checked(connector, kind)
    }

    /// Add WHERE: column = value
    fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Eq, value.into())
    }

    /// Add WHERE: column <> value
    fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Ne, value.into())
    }

    /// Add WHERE: column > value
    fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Gt, value.into())
    }

    /// Add WHERE: column >= value
    fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Ge, value.into())
    }

    /// Add WHERE: column < value
    fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Lt, value.into())
    }

    /// Add WHERE: column <= value
    fn lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Le, value.into())
    }

    /// Add WHERE: column LIKE pattern
    fn like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Like, pattern.into())
    }

    /// Add WHERE: column NOT LIKE pattern
    fn not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::NotLike, pattern.into())
    }

    /// Add WHERE: column REGEXP pattern
    fn regexp(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(Connector::And, column, Operator::Regexp, pattern.into())
    }

    /// Add OR: column = value
    fn or_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::Eq, value.into())
    }

    /// Add OR: column <> value
    fn or_ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::Ne, value.into())
    }

    /// Add OR: column > value
    fn or_gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::Gt, value.into())
    }

    /// Add OR: column < value
    fn or_lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::Lt, value.into())
    }

    /// Add OR: column LIKE pattern
    fn or_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::Like, pattern.into())
    }

    /// Add OR: column NOT LIKE pattern
    fn or_not_like(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.compare(Connector::Or, column, Operator::NotLike, pattern.into())
    }

    // ==================== NULL / IN / BETWEEN ====================

    /// Add WHERE: column IS NULL
    fn is_null(self, column: &str) -> Self {
        self.compare(Connector::And, column, Operator::Eq, Value::Null)
    }

    /// Add WHERE: column IS NOT NULL
    fn is_not_null(self, column: &str) -> Self {
        self.compare(Connector::And, column, Operator::Ne, Value::Null)
    }

    /// Add OR: column IS NULL
    fn or_is_null(self, column: &str) -> Self {
        self.compare(Connector::Or, column, Operator::Eq, Value::Null)
    }

    /// Add OR: column IS NOT NULL
    fn or_is_not_null(self, column: &str) -> Self {
        self.compare(Connector::Or, column, Operator::Ne, Value::Null)
    }

    #[doc(hidden)]
    fn list(self, connector: Connector, column: &str, op: Operator, values: Vec<Value>) -> Self {
        let kind = PredicateKind::leaf(column, op, Some(Operand::List(values)));
        self.push_checked(connector, kind)
    }

    /// Add WHERE: column IN (values...). An empty list matches nothing.
    fn in_list<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.list(Connector::And, column, Operator::In, values)
    }

    /// Add WHERE: column NOT IN (values...). An empty list matches everything.
    fn not_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.list(Connector::And, column, Operator::NotIn, values)
    }

    /// Add OR: column IN (values...)
    fn or_in_list<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.list(Connector::Or, column, Operator::In, values)
    }

    /// Add OR: column NOT IN (values...)
    fn or_not_in<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.list(Connector::Or, column, Operator::NotIn, values)
    }

    /// Add WHERE: column IN (subquery)
    fn in_subquery(self, column: &str, query: Query) -> Self {
        let kind = PredicateKind::leaf(column, Operator::In, Some(Operand::Subquery(Box::new(query))));
        self.push_checked(Connector::And, kind)
    }

    /// Add WHERE: column NOT IN (subquery)
    fn not_in_subquery(self, column: &str, query: Query) -> Self {
        let kind = PredicateKind::leaf(column, Operator::NotIn, Some(Operand::Subquery(Box::new(query))));
        self.push_checked(Connector::And, kind)
    }

    #[doc(hidden)]
    fn range(self, connector: Connector, column: &str, op: Operator, from: Value, to: Value) -> Self {
        let kind = PredicateKind::leaf(column, op, Some(Operand::Range(from, to)));
        self.push_checked(connector, kind)
    }

    /// Add WHERE: column BETWEEN from AND to
    fn between(self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.range(Connector::And, column, Operator::Between, from.into(), to.into())
    }

    /// Add WHERE: column NOT BETWEEN from AND to
    fn not_between(self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.range(Connector::And, column, Operator::NotBetween, from.into(), to.into())
    }

    /// Add OR: column BETWEEN from AND to
    fn or_between(self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.range(Connector::Or, column, Operator::Between, from.into(), to.into())
    }

    // ==================== Columns, raw, EXISTS ====================

    /// Add WHERE: column1 <op> column2
    fn where_column(self, left: &str, op: &str, right: &str) -> QbResult<Self> {
        let kind = PredicateKind::column(left, Operator::parse(op)?, right)?;
        Ok(self.push_predicate(Connector::And, kind))
    }

    /// Add OR: column1 <op> column2
    fn or_where_column(self, left: &str, op: &str, right: &str) -> QbResult<Self> {
        let kind = PredicateKind::column(left, Operator::parse(op)?, right)?;
        Ok(self.push_predicate(Connector::Or, kind))
    }

    /// Add a raw WHERE condition with `?` markers bound to `params`.
    ///
    /// Markers inside `'...'` literals are not bound. The marker count must
    /// equal `params.len()`.
    fn where_raw(self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        let kind = PredicateKind::raw(sql, params)?;
        Ok(self.push_predicate(Connector::And, kind))
    }

    /// Add a raw OR condition with `?` markers bound to `params`.
    fn or_where_raw(self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        let kind = PredicateKind::raw(sql, params)?;
        Ok(self.push_predicate(Connector::Or, kind))
    }

    /// Add WHERE EXISTS (subquery)
    fn where_exists(self, query: Query) -> Self {
        let kind = PredicateKind::Exists {
            query: Box::new(query),
            negated: false,
        };
        self.push_predicate(Connector::And, kind)
    }

    /// Add WHERE NOT EXISTS (subquery)
    fn where_not_exists(self, query: Query) -> Self {
        let kind = PredicateKind::Exists {
            query: Box::new(query),
            negated: true,
        };
        self.push_predicate(Connector::And, kind)
    }

    /// Add OR EXISTS (subquery)
    fn or_where_exists(self, query: Query) -> Self {
        let kind = PredicateKind::Exists {
            query: Box::new(query),
            negated: false,
        };
        self.push_predicate(Connector::Or, kind)
    }

    // ==================== Dates ====================

    /// Add WHERE: column within `[from, to]`, compared as dates.
    ///
    /// Date-time bounds are truncated to their date. Dialects without an
    /// OR-safe BETWEEN render `(column >= from AND column <= to)`.
    fn where_between_dates(self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.date_range(Connector::And, column, from.into(), to.into())
    }

    /// Add OR: column within `[from, to]`, compared as dates.
    fn or_where_between_dates(
        self,
        column: &str,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        self.date_range(Connector::Or, column, from.into(), to.into())
    }

    #[doc(hidden)]
    fn date_range(self, connector: Connector, column: &str, from: Value, to: Value) -> Self {
        let kind = if column.trim().is_empty() {
            Err(QbError::invalid_predicate("expression cannot be empty"))
        } else {
            Ok(PredicateKind::DateRange {
                expr: column.to_string(),
                from: from.into_date(),
                to: to.into_date(),
            })
        };
        self.push_checked(connector, kind)
    }

    #[doc(hidden)]
    fn date_part(self, connector: Connector, part: DatePart, column: &str, op: Operator, value: Value) -> Self {
        let kind = PredicateKind::date_part(part, column, op, value);
        self.push_checked(connector, kind)
    }

    /// Add WHERE: date(column) <op> date. Only comparison operators apply.
    fn where_date(self, column: &str, op: &str, date: NaiveDate) -> QbResult<Self> {
        let kind = PredicateKind::date_part(DatePart::Date, column, Operator::parse(op)?, date.into())?;
        Ok(self.push_predicate(Connector::And, kind))
    }

    /// Add OR: date(column) <op> date
    fn or_where_date(self, column: &str, op: &str, date: NaiveDate) -> QbResult<Self> {
        let kind = PredicateKind::date_part(DatePart::Date, column, Operator::parse(op)?, date.into())?;
        Ok(self.push_predicate(Connector::Or, kind))
    }

    /// Add WHERE: year(column) = year
    fn where_year(self, column: &str, year: i32) -> Self {
        self.date_part(Connector::And, DatePart::Year, column, Operator::Eq, year.into())
    }

    /// Add WHERE: month(column) = month
    fn where_month(self, column: &str, month: u32) -> Self {
        self.date_part(Connector::And, DatePart::Month, column, Operator::Eq, month.into())
    }

    /// Add WHERE: day(column) = day
    fn where_day(self, column: &str, day: u32) -> Self {
        self.date_part(Connector::And, DatePart::Day, column, Operator::Eq, day.into())
    }

    /// Add WHERE: time(column) = time
    fn where_time(self, column: &str, time: NaiveTime) -> Self {
        self.date_part(Connector::And, DatePart::Time, column, Operator::Eq, time.into())
    }

    /// Add OR: year(column) = year
    fn or_where_year(self, column: &str, year: i32) -> Self {
        self.date_part(Connector::Or, DatePart::Year, column, Operator::Eq, year.into())
    }

    /// Add OR: month(column) = month
    fn or_where_month(self, column: &str, month: u32) -> Self {
        self.date_part(Connector::Or, DatePart::Month, column, Operator::Eq, month.into())
    }

    /// Add OR: day(column) = day
    fn or_where_day(self, column: &str, day: u32) -> Self {
        self.date_part(Connector::Or, DatePart::Day, column, Operator::Eq, day.into())
    }

    /// Add OR: time(column) = time
    fn or_where_time(self, column: &str, time: NaiveTime) -> Self {
        self.date_part(Connector::Or, DatePart::Time, column, Operator::Eq, time.into())
    }

    /// Add WHERE: date(column) = today (local time)
    fn where_today(self, column: &str) -> Self {
        let today = Local::now().date_naive();
        self.date_part(Connector::And, DatePart::Date, column, Operator::Eq, today.into())
    }

    /// Add WHERE: date(column) < today
    fn where_past(self, column: &str) -> Self {
        let today = Local::now().date_naive();
        self.date_part(Connector::And, DatePart::Date, column, Operator::Lt, today.into())
    }

    /// Add WHERE: date(column) > today
    fn where_future(self, column: &str) -> Self {
        let today = Local::now().date_naive();
        self.date_part(Connector::And, DatePart::Date, column, Operator::Gt, today.into())
    }

    /// Alias for [`where_past`](Filter::where_past).
    fn where_before_today(self, column: &str) -> Self {
        self.where_past(column)
    }

    /// Alias for [`where_future`](Filter::where_future).
    fn where_after_today(self, column: &str) -> Self {
        self.where_future(column)
    }

    // ==================== Search ====================

    /// Add a full-text search over `columns` (at least one).
    fn where_full_text(
        self,
        columns: &[&str],
        term: impl Into<Value>,
        mode: Option<FullTextMode>,
    ) -> QbResult<Self> {
        let kind = PredicateKind::full_text(columns, term.into(), mode)?;
        Ok(self.push_predicate(Connector::And, kind))
    }

    /// Add an OR full-text search over `columns`.
    fn or_where_full_text(
        self,
        columns: &[&str],
        term: impl Into<Value>,
        mode: Option<FullTextMode>,
    ) -> QbResult<Self> {
        let kind = PredicateKind::full_text(columns, term.into(), mode)?;
        Ok(self.push_predicate(Connector::Or, kind))
    }

    #[doc(hidden)]
    fn case_sensitive_like(self, column: &str, pattern: Value, negated: bool) -> Self {
        let kind = if column.trim().is_empty() {
            Err(QbError::invalid_predicate("expression cannot be empty"))
        } else {
            Ok(PredicateKind::CaseSensitiveLike {
                expr: column.to_string(),
                pattern,
                negated,
            })
        };
        self.push_checked(Connector::And, kind)
    }

    /// Add a case-sensitive LIKE. The pattern is always bound.
    fn where_like_case_sensitive(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.case_sensitive_like(column, pattern.into(), false)
    }

    /// Add a case-sensitive NOT LIKE.
    fn where_not_like_case_sensitive(self, column: &str, pattern: impl Into<Value>) -> Self {
        self.case_sensitive_like(column, pattern.into(), true)
    }

    // ==================== Column groups ====================

    #[doc(hidden)]
    fn column_group(
        self,
        outer: Connector,
        inner: Connector,
        columns: &[&str],
        op: &str,
        value: Value,
    ) -> QbResult<Self> {
        let op = Operator::parse(op)?;
        let mut group = PredicateTree::new();
        for column in columns {
            let kind = PredicateKind::leaf(*column, op.clone(), Some(Operand::Scalar(value.clone())))?;
            group.push(inner, kind);
        }
        let mut this = self;
        this.conditions_mut().push_group(outer, group);
        Ok(this)
    }

    /// Add WHERE (c1 <op> v OR c2 <op> v ...)
    fn where_any_columns(self, columns: &[&str], op: &str, value: impl Into<Value>) -> QbResult<Self> {
        self.column_group(Connector::And, Connector::Or, columns, op, value.into())
    }

    /// Add OR (c1 <op> v OR c2 <op> v ...)
    fn or_where_any_columns(self, columns: &[&str], op: &str, value: impl Into<Value>) -> QbResult<Self> {
        self.column_group(Connector::Or, Connector::Or, columns, op, value.into())
    }

    /// Add WHERE (c1 <op> v AND c2 <op> v ...)
    fn where_all_columns(self, columns: &[&str], op: &str, value: impl Into<Value>) -> QbResult<Self> {
        self.column_group(Connector::And, Connector::And, columns, op, value.into())
    }

    /// Add OR (c1 <op> v AND c2 <op> v ...)
    fn or_where_all_columns(self, columns: &[&str], op: &str, value: impl Into<Value>) -> QbResult<Self> {
        self.column_group(Connector::Or, Connector::And, columns, op, value.into())
    }

    #[doc(hidden)]
    fn none_group(mut self, outer: Connector, columns: &[&str]) -> Self {
        let mut group = PredicateTree::new();
        for column in columns {
            match PredicateKind::leaf(*column, Operator::IsNull, None) {
                Ok(kind) => group.push(Connector::And, kind),
                Err(err) => group.fail(err),
            }
        }
        self.conditions_mut().push_group(outer, group);
        self
    }

    /// Add WHERE (c1 IS NULL AND c2 IS NULL ...)
    fn where_none(self, columns: &[&str]) -> Self {
        self.none_group(Connector::And, columns)
    }

    /// Add OR (c1 IS NULL AND c2 IS NULL ...)
    fn or_where_none(self, columns: &[&str]) -> Self {
        self.none_group(Connector::Or, columns)
    }

    // ==================== Nesting ====================

    /// Add a parenthesized AND group built by `f`. Empty groups are dropped.
    fn nest(mut self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        let group = f(Conditions::new()).into_tree();
        self.conditions_mut().push_group(Connector::And, group);
        self
    }

    /// Add a parenthesized OR group built by `f`.
    fn or_nest(mut self, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        let group = f(Conditions::new()).into_tree();
        self.conditions_mut().push_group(Connector::Or, group);
        self
    }

    /// Like [`nest`](Filter::nest) for closures using fallible conditions.
    fn try_nest(mut self, f: impl FnOnce(Conditions) -> QbResult<Conditions>) -> QbResult<Self> {
        let group = f(Conditions::new())?.into_tree();
        self.conditions_mut().push_group(Connector::And, group);
        Ok(self)
    }

    /// Like [`or_nest`](Filter::or_nest) for closures using fallible conditions.
    fn try_or_nest(mut self, f: impl FnOnce(Conditions) -> QbResult<Conditions>) -> QbResult<Self> {
        let group = f(Conditions::new())?.into_tree();
        self.conditions_mut().push_group(Connector::Or, group);
        Ok(self)
    }

    // ==================== Misc ====================

    /// Apply `f` only when `condition` holds.
    fn when(self, condition: bool, f: impl FnOnce(Self) -> Self) -> Self {
        if condition { f(self) } else { self }
    }

    /// Apply `f` when `condition` does not hold, `otherwise` when it does.
    fn unless(
        self,
        condition: bool,
        f: impl FnOnce(Self) -> Self,
        otherwise: impl FnOnce(Self) -> Self,
    ) -> Self {
        if condition { otherwise(self) } else { f(self) }
    }

    /// Add WHERE: column = value if value is Some.
    fn eq_opt<V: Into<Value>>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Remove top-level conditions on `column` (optionally only with `op`).
    fn remove_where(mut self, column: &str, op: Option<&str>) -> QbResult<Self> {
        let op = op.map(Operator::parse).transpose()?;
        self.conditions_mut().remove_column(column, op.as_ref());
        Ok(self)
    }
}
