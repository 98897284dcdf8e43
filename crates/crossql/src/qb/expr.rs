//! Predicate tree for WHERE/HAVING/JOIN ON conditions.
//!
//! A [`PredicateTree`] is an ordered list of [`Predicate`] nodes. Each node
//! records the [`Connector`] attaching it to its preceding sibling; the first
//! node of every tree or group has none. Groups always render parenthesized,
//! so a tree renders exactly as it was built:
//!
//! `a = ? AND b = ? OR (c = ? AND d = ?)`
//!
//! Rendering is a single recursive pass that feeds the [`ParamList`] in
//! traversal order; nested subqueries bind their parameters at the position
//! they occupy in the text.

use std::fmt;

use crate::dialect::{DatePart, FullTextMode};
use crate::error::{QbError, QbResult};
use crate::ident::quote_expr;
use crate::qb::param::{ParamList, check_template};
use crate::qb::query::Query;
use crate::qb::traits::Filter;
use crate::value::{Raw, Value, impl_from_via_value};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// How a predicate attaches to its preceding sibling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
}

impl Connector {
    pub fn as_sql(self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
        }
    }
}

/// Comparison operators accepted by leaf predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
    NotBetween,
    Regexp,
    /// Any other operator, emitted verbatim (`SOUNDS LIKE`, `&`, ...).
    Custom(String),
}

impl Operator {
    /// Parse an operator string (case- and whitespace-insensitive).
    pub fn parse(op: &str) -> QbResult<Self> {
        let normalized = op
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        let parsed = match normalized.as_str() {
            "=" | "==" => Operator::Eq,
            "<>" | "!=" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "IS NULL" | "IS" => Operator::IsNull,
            "IS NOT NULL" | "IS NOT" => Operator::IsNotNull,
            "BETWEEN" => Operator::Between,
            "NOT BETWEEN" => Operator::NotBetween,
            "REGEXP" => Operator::Regexp,
            "" => return Err(QbError::invalid_predicate("operator cannot be empty")),
            _ => {
                if normalized.contains(';') || normalized.contains('?') {
                    return Err(QbError::invalid_predicate(format!(
                        "invalid operator: {op}"
                    )));
                }
                Operator::Custom(normalized)
            }
        };
        Ok(parsed)
    }

    /// SQL keyword for this operator.
    pub fn keyword(&self) -> &str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Regexp => "REGEXP",
            Operator::Custom(op) => op.as_str(),
        }
    }

    fn sql(&self, binder: &ParamList) -> QbResult<&str> {
        match self {
            Operator::Regexp => binder.dialect().regexp_operator(),
            other => Ok(other.keyword()),
        }
    }

    fn is_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    fn is_range(&self) -> bool {
        matches!(self, Operator::Between | Operator::NotBetween)
    }

    fn is_null_check(&self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The right-hand side of a leaf predicate.
#[derive(Debug, Clone)]
pub enum Operand {
    Scalar(Value),
    List(Vec<Value>),
    Range(Value, Value),
    Subquery(Box<Query>),
    Raw(String),
}

impl Operand {
    /// Build a list operand from any iterable of values.
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Operand::List(values.into_iter().map(Into::into).collect())
    }

    /// Build a range operand.
    pub fn range(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Operand::Range(from.into(), to.into())
    }

    fn describe(&self) -> &'static str {
        match self {
            Operand::Scalar(_) => "a scalar",
            Operand::List(_) => "a list",
            Operand::Range(..) => "a range",
            Operand::Subquery(_) => "a subquery",
            Operand::Raw(_) => "a raw fragment",
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Scalar(v)
    }
}

impl From<Vec<Value>> for Operand {
    fn from(v: Vec<Value>) -> Self {
        Operand::List(v)
    }
}

impl From<Query> for Operand {
    fn from(q: Query) -> Self {
        Operand::Subquery(Box::new(q))
    }
}

impl From<Raw> for Operand {
    fn from(raw: Raw) -> Self {
        Operand::Raw(raw.0)
    }
}

impl_from_via_value!(Operand::Scalar;
    bool, i8, i16, i32, i64, u8, u16, u32, f32, f64,
    String, &str, &String, NaiveDate, NaiveDateTime, NaiveTime, Uuid, serde_json::Value,
);

#[cfg(feature = "rust_decimal")]
impl_from_via_value!(Operand::Scalar; rust_decimal::Decimal);

/// `From<Vec<$t>>` (list) and `From<($t, $t)>` (range) for `Operand`.
macro_rules! impl_operand_collections {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<Vec<$t>> for Operand {
                fn from(v: Vec<$t>) -> Self {
                    Operand::list(v)
                }
            }

            impl From<($t, $t)> for Operand {
                fn from((a, b): ($t, $t)) -> Self {
                    Operand::range(a, b)
                }
            }
        )*
    };
}

impl_operand_collections!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64,
    String, &str, NaiveDate, NaiveDateTime, NaiveTime, Uuid,
);

/// A node of the predicate tree.
#[derive(Debug, Clone)]
pub struct Predicate {
    /// `None` for the first node of a tree or group.
    pub connector: Option<Connector>,
    pub kind: PredicateKind,
}

/// The shape of a predicate node.
#[derive(Debug, Clone)]
pub enum PredicateKind {
    /// `<expr> <op> <value>`
    Leaf {
        expr: String,
        op: Operator,
        value: Option<Operand>,
    },
    /// Column-to-column comparison: `<left> <op> <right>`.
    Column {
        left: String,
        op: Operator,
        right: String,
    },
    /// Parenthesized group.
    Group(PredicateTree),
    /// Template with `?` markers.
    Raw { sql: String, params: Vec<Value> },
    Exists { query: Box<Query>, negated: bool },
    DateRange { expr: String, from: Value, to: Value },
    DatePart {
        part: DatePart,
        expr: String,
        op: Operator,
        value: Value,
    },
    FullText {
        columns: Vec<String>,
        term: Value,
        mode: Option<FullTextMode>,
    },
    CaseSensitiveLike {
        expr: String,
        pattern: Value,
        negated: bool,
    },
}

fn non_blank(expr: String) -> QbResult<String> {
    if expr.trim().is_empty() {
        return Err(QbError::invalid_predicate("expression cannot be empty"));
    }
    Ok(expr)
}

impl PredicateKind {
    /// Build a validated leaf.
    ///
    /// `=`/`<>` against NULL become `IS NULL`/`IS NOT NULL`.
    pub fn leaf(expr: impl Into<String>, op: Operator, value: Option<Operand>) -> QbResult<Self> {
        let expr = non_blank(expr.into())?;

        let (op, value) = match (op, value) {
            (Operator::Eq, Some(Operand::Scalar(Value::Null))) => (Operator::IsNull, None),
            (Operator::Ne, Some(Operand::Scalar(Value::Null))) => (Operator::IsNotNull, None),
            (op, Some(Operand::Scalar(Value::Null))) if op.is_null_check() => (op, None),
            pair => pair,
        };

        let mismatch = |op: &Operator, value: &Operand| {
            QbError::invalid_predicate(format!(
                "operator {op} cannot take {} (column {expr})",
                value.describe()
            ))
        };

        match (&op, &value) {
            (op, Some(v)) if op.is_null_check() => return Err(mismatch(op, v)),
            (op, None) if !op.is_null_check() => {
                return Err(QbError::invalid_predicate(format!(
                    "operator {op} requires a value (column {expr})"
                )));
            }
            (op, Some(v @ (Operand::Scalar(_) | Operand::Range(..)))) if op.is_list() => {
                return Err(mismatch(op, v));
            }
            (op, Some(v)) if op.is_range() && !matches!(v, Operand::Range(..)) => {
                return Err(mismatch(op, v));
            }
            (op, Some(v @ (Operand::List(_) | Operand::Range(..))))
                if !op.is_list() && !op.is_range() =>
            {
                return Err(mismatch(op, v));
            }
            _ => {}
        }

        Ok(PredicateKind::Leaf { expr, op, value })
    }

    /// Build a validated column-to-column comparison.
    ///
    /// List, range and null-check operators have no column form.
    pub fn column(left: impl Into<String>, op: Operator, right: impl Into<String>) -> QbResult<Self> {
        let left = non_blank(left.into())?;
        let right = non_blank(right.into())?;
        if op.is_list() || op.is_range() || op.is_null_check() {
            return Err(QbError::invalid_predicate(format!(
                "operator {op} cannot compare two columns ({left}, {right})"
            )));
        }
        Ok(PredicateKind::Column { left, op, right })
    }

    /// Build a validated raw template; `?` markers must match `params`.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> QbResult<Self> {
        let sql = non_blank(sql.into())?;
        check_template(&sql, &params)?;
        Ok(PredicateKind::Raw { sql, params })
    }

    /// Build a validated date-part comparison. The value is always bound.
    pub fn date_part(part: DatePart, expr: impl Into<String>, op: Operator, value: Value) -> QbResult<Self> {
        let expr = non_blank(expr.into())?;
        if op.is_list() || op.is_range() || op.is_null_check() {
            return Err(QbError::invalid_predicate(format!(
                "operator {op} cannot compare a date part of {expr}"
            )));
        }
        Ok(PredicateKind::DatePart {
            part,
            expr,
            op,
            value,
        })
    }

    /// Build a validated full-text predicate over at least one column.
    pub fn full_text(columns: &[&str], term: Value, mode: Option<FullTextMode>) -> QbResult<Self> {
        if columns.is_empty() {
            return Err(QbError::invalid_predicate(
                "full-text search requires at least one column",
            ));
        }
        let columns = columns
            .iter()
            .map(|c| non_blank(c.to_string()))
            .collect::<QbResult<Vec<_>>>()?;
        Ok(PredicateKind::FullText {
            columns,
            term,
            mode,
        })
    }

    fn render(&self, binder: &mut ParamList, out: &mut String) -> QbResult<()> {
        let dialect = binder.dialect();
        match self {
            PredicateKind::Leaf { expr, op, value } => {
                let lhs = quote_expr(expr, dialect);
                match value {
                    None => {
                        out.push_str(&format!("{lhs} {}", op.sql(binder)?));
                    }
                    Some(Operand::List(values)) if values.is_empty() => {
                        out.push_str(if *op == Operator::In { "1 = 0" } else { "1 = 1" });
                    }
                    Some(Operand::List(values)) => {
                        out.push_str(&format!("{lhs} {} (", op.sql(binder)?));
                        for (i, v) in values.iter().enumerate() {
                            if i > 0 {
                                out.push_str(", ");
                            }
                            out.push_str(binder.bind(v.clone()));
                        }
                        out.push(')');
                    }
                    Some(Operand::Range(from, to)) => {
                        out.push_str(&format!("{lhs} {} ", op.sql(binder)?));
                        out.push_str(binder.bind(from.clone()));
                        out.push_str(" AND ");
                        out.push_str(binder.bind(to.clone()));
                    }
                    Some(Operand::Scalar(v)) => {
                        out.push_str(&format!("{lhs} {} ", op.sql(binder)?));
                        out.push_str(binder.bind(v.clone()));
                    }
                    Some(Operand::Subquery(query)) => {
                        out.push_str(&format!("{lhs} {} (", op.sql(binder)?));
                        query.write_sql(binder, out)?;
                        out.push(')');
                    }
                    Some(Operand::Raw(raw)) => {
                        if op.is_list() {
                            out.push_str(&format!("{lhs} {} ({raw})", op.sql(binder)?));
                        } else {
                            out.push_str(&format!("{lhs} {} {raw}", op.sql(binder)?));
                        }
                    }
                }
            }
            PredicateKind::Column { left, op, right } => {
                out.push_str(&format!(
                    "{} {} {}",
                    quote_expr(left, dialect),
                    op.sql(binder)?,
                    quote_expr(right, dialect)
                ));
            }
            PredicateKind::Group(tree) => {
                out.push('(');
                tree.render(binder, out)?;
                out.push(')');
            }
            PredicateKind::Raw { sql, params } => binder.write_template(sql, params, out)?,
            PredicateKind::Exists { query, negated } => {
                out.push_str(if *negated { "NOT EXISTS (" } else { "EXISTS (" });
                query.write_sql(binder, out)?;
                out.push(')');
            }
            PredicateKind::DateRange { expr, from, to } => {
                let lhs = quote_expr(expr, dialect);
                if dialect.or_safe_between() {
                    out.push_str(&format!("{lhs} BETWEEN "));
                    out.push_str(binder.bind(from.clone()));
                    out.push_str(" AND ");
                    out.push_str(binder.bind(to.clone()));
                } else {
                    out.push_str(&format!("({lhs} >= "));
                    out.push_str(binder.bind(from.clone()));
                    out.push_str(&format!(" AND {lhs} <= "));
                    out.push_str(binder.bind(to.clone()));
                    out.push(')');
                }
            }
            PredicateKind::DatePart {
                part,
                expr,
                op,
                value,
            } => {
                let lhs = dialect.date_part(*part, &quote_expr(expr, dialect));
                out.push_str(&format!("{lhs} {} ", op.sql(binder)?));
                out.push_str(binder.bind(value.clone()));
            }
            PredicateKind::FullText {
                columns,
                term,
                mode,
            } => {
                let columns: Vec<String> =
                    columns.iter().map(|c| quote_expr(c, dialect)).collect();
                let sql = dialect.render_full_text(&columns, term, *mode, binder)?;
                out.push_str(&sql);
            }
            PredicateKind::CaseSensitiveLike {
                expr,
                pattern,
                negated,
            } => {
                let lhs = dialect.case_sensitive_like(&quote_expr(expr, dialect), *negated)?;
                out.push_str(&lhs);
                out.push(' ');
                out.push_str(binder.bind(pattern.clone()));
            }
        }
        Ok(())
    }
}

/// An ordered list of predicates joined by their connectors.
///
/// Infallible builder methods that receive invalid input record the error
/// here instead of a node; it is reported by [`check`](PredicateTree::check)
/// and [`render`](PredicateTree::render).
#[derive(Debug, Clone, Default)]
pub struct PredicateTree {
    nodes: Vec<Predicate>,
    error: Option<QbError>,
}

impl PredicateTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            error: None,
        }
    }

    /// Record a deferred error. The first one wins.
    pub fn fail(&mut self, err: QbError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// The first deferred error, if any.
    pub fn check(&self) -> QbResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Predicate] {
        &self.nodes
    }

    /// Append a node. The connector is dropped for the first node.
    pub fn push(&mut self, connector: Connector, kind: PredicateKind) {
        let connector = (!self.nodes.is_empty()).then_some(connector);
        self.nodes.push(Predicate { connector, kind });
    }

    /// Append a parenthesized group. Empty groups are ignored; a deferred
    /// error in the group moves to this tree.
    pub fn push_group(&mut self, connector: Connector, mut group: PredicateTree) {
        if let Some(err) = group.error.take() {
            self.fail(err);
        }
        if !group.is_empty() {
            self.push(connector, PredicateKind::Group(group));
        }
    }

    /// Keep only nodes matching `keep`, then restore the first-node invariant.
    pub fn retain(&mut self, keep: impl FnMut(&Predicate) -> bool) {
        self.nodes.retain(keep);
        if let Some(first) = self.nodes.first_mut() {
            first.connector = None;
        }
    }

    /// Remove top-level leaves on `column` (optionally only with `op`).
    pub fn remove_column(&mut self, column: &str, op: Option<&Operator>) {
        let column = column.trim();
        self.retain(|p| match &p.kind {
            PredicateKind::Leaf { expr, op: leaf_op, .. } => {
                !(expr.trim() == column && op.is_none_or(|o| o == leaf_op))
            }
            _ => true,
        });
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.error = None;
    }

    /// Render the tree (without any WHERE/HAVING keyword).
    pub fn render(&self, binder: &mut ParamList, out: &mut String) -> QbResult<()> {
        self.check()?;
        for node in &self.nodes {
            if let Some(connector) = node.connector {
                out.push(' ');
                out.push_str(connector.as_sql());
                out.push(' ');
            }
            node.kind.render(binder, out)?;
        }
        Ok(())
    }
}

/// A standalone condition builder, handed to `nest`/`or_nest` closures and
/// used for JOIN ON clauses.
///
/// # Example
/// ```ignore
/// let q = crossql::table("t")
///     .eq("a", 1)
///     .or_nest(|c| c.eq("c", 3).eq("d", 4));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    tree: PredicateTree,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn into_tree(self) -> PredicateTree {
        self.tree
    }
}

impl Filter for Conditions {
    fn conditions_mut(&mut self) -> &mut PredicateTree {
        &mut self.tree
    }
}
