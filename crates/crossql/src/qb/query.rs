//! The query builder core: projection, joins, conditions, grouping, ordering,
//! pagination, CTEs and unions, rendered in one pass.

use std::fmt;

use crate::client::Executor;
use crate::config::QbConfig;
use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use crate::ident::{Ident, quote_expr};
use crate::qb::expr::{Conditions, Connector, Operand, Operator, PredicateKind, PredicateTree};
use crate::qb::param::{ParamList, check_template, count_placeholders, split_placeholders};
use crate::qb::traits::Filter;
use crate::tracing_hook::{SqlLogConfig, StatementKind, log_built};
use crate::value::Value;

/// Rendered SQL text, its ordered parameters and the dialect it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub dialect: Dialect,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>, dialect: Dialect) -> Self {
        Self {
            sql: sql.into(),
            params,
            dialect,
        }
    }

    /// Number of placeholder tokens in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql, self.dialect)
    }

    /// SQL with parameters inlined as literals.
    ///
    /// For logs and debugging only; never execute the result.
    pub fn to_debug_sql(&self) -> String {
        let segments = split_placeholders(&self.sql, self.dialect);
        let mut out = String::with_capacity(self.sql.len());
        let mut params = self.params.iter();
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                match params.next() {
                    Some(v) => out.push_str(&v.to_sql_literal()),
                    None => out.push_str(self.dialect.placeholder(i)),
                }
            }
            out.push_str(segment);
        }
        out
    }

    /// Run as a query and return all rows.
    pub async fn fetch_all<E: Executor>(&self, conn: &E) -> QbResult<Vec<E::Row>> {
        conn.query(&self.sql, &self.params).await
    }

    /// Run as a statement and return the affected row count.
    pub async fn execute<E: Executor>(&self, conn: &E) -> QbResult<u64> {
        conn.execute(&self.sql, &self.params).await
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// JOIN kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    FullOuter,
    Cross,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

#[derive(Debug, Clone)]
pub enum JoinTarget {
    Table { name: String, alias: Option<String> },
    Subquery { query: Box<Query>, alias: String },
    /// Correlated subquery; the join keyword depends on the dialect.
    Lateral { query: Box<Query>, alias: String },
}

/// A JOIN clause. CROSS joins have an empty ON tree.
#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub target: JoinTarget,
    pub on: PredicateTree,
    /// Identity of simple column joins, used to skip duplicates.
    key: Option<String>,
}

#[derive(Debug, Clone)]
enum TableRef {
    Named { name: String, alias: Option<String> },
    Derived { query: Box<Query>, alias: String },
}

#[derive(Debug, Clone)]
enum SelectItem {
    Column(String),
    Aliased { expr: String, alias: String },
    Raw { sql: String, params: Vec<Value> },
    Subquery { query: Box<Query>, alias: String },
    Case {
        whens: Vec<(String, Value)>,
        otherwise: Value,
        alias: String,
    },
    /// `COUNT([DISTINCT] column) AS alias`; the alias is emitted unquoted.
    Count {
        column: String,
        distinct: bool,
        alias: String,
    },
}

#[derive(Debug, Clone)]
enum GroupItem {
    Column(String),
    Raw(String),
}

#[derive(Debug, Clone)]
enum OrderItem {
    Column { expr: String, direction: Direction },
    Raw(String),
    Random,
}

#[derive(Debug, Clone)]
struct Cte {
    name: String,
    query: Box<Query>,
    recursive: bool,
}

#[derive(Debug, Clone)]
struct UnionPart {
    query: Box<Query>,
    all: bool,
}

/// Split `"users u"` / `"users AS u"` into name and alias.
fn parse_table_spec(spec: &str) -> (String, Option<String>) {
    let parts: Vec<&str> = spec.split_whitespace().collect();
    match parts.as_slice() {
        [name, kw, alias] if kw.eq_ignore_ascii_case("as") => {
            (name.to_string(), Some(alias.to_string()))
        }
        [name, alias] => (name.to_string(), Some(alias.to_string())),
        _ => (spec.trim().to_string(), None),
    }
}

/// Count aliases are emitted bare, so they must be simple words.
fn is_plain_alias(alias: &str) -> bool {
    alias.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_table(name: &str, alias: Option<&str>, dialect: Dialect, out: &mut String) -> QbResult<()> {
    out.push_str(&dialect.quote_identifier(name)?);
    if let Some(alias) = alias {
        out.push_str(" AS ");
        out.push_str(&dialect.quote_identifier(alias)?);
    }
    Ok(())
}

/// A fluent, dialect-aware query.
///
/// Builder methods consume and return `self`. `clone()` deep-copies every
/// list and predicate tree, so a shared base query can be cloned into
/// independent count and page variants.
///
/// # Example
/// ```ignore
/// use crossql::{Dialect, Filter};
///
/// let built = crossql::table("users")
///     .dialect(Dialect::MySql)
///     .eq("status", "active")
///     .or_nest(|c| c.eq("role", "admin").gt("age", 18))
///     .order_by("id")
///     .limit(10)
///     .render()?;
/// assert_eq!(
///     built.sql,
///     "SELECT * FROM `users` WHERE `status` = %s OR (`role` = %s AND `age` > %s) ORDER BY `id` ASC LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    table: Option<TableRef>,
    columns: Vec<SelectItem>,
    distinct: bool,
    joins: Vec<Join>,
    wheres: PredicateTree,
    groups: Vec<GroupItem>,
    havings: PredicateTree,
    orders: Vec<OrderItem>,
    limit: Option<u64>,
    offset: Option<u64>,
    ctes: Vec<Cte>,
    unions: Vec<UnionPart>,
    dialect: Option<Dialect>,
    pub(crate) allow_unrestricted: bool,
    pub(crate) primary_key: String,
    pub(crate) record_bound: bool,
    per_page: u64,
    pub(crate) log: SqlLogConfig,
    build_error: Option<QbError>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for Query {
    fn conditions_mut(&mut self) -> &mut PredicateTree {
        &mut self.wheres
    }
}

impl Query {
    /// Create an empty query (no table, no dialect).
    pub fn new() -> Self {
        Self {
            table: None,
            columns: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            wheres: PredicateTree::new(),
            groups: Vec::new(),
            havings: PredicateTree::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            ctes: Vec::new(),
            unions: Vec::new(),
            dialect: None,
            allow_unrestricted: false,
            primary_key: "id".to_string(),
            record_bound: false,
            per_page: 10,
            log: SqlLogConfig::default(),
            build_error: None,
        }
    }

    // ==================== Target & dialect ====================

    /// Set the target table. Accepts `"users"`, `"users u"` or `"users AS u"`.
    ///
    /// A blank spec leaves the table unset.
    pub fn table(mut self, spec: &str) -> Self {
        if spec.trim().is_empty() {
            self.table = None;
            return self;
        }
        let (name, alias) = parse_table_spec(spec);
        self.table = Some(TableRef::Named { name, alias });
        self
    }

    /// Set the target table with an explicit alias.
    pub fn table_as(mut self, name: &str, alias: &str) -> Self {
        if name.trim().is_empty() {
            self.table = None;
            return self;
        }
        self.table = Some(TableRef::Named {
            name: name.trim().to_string(),
            alias: Some(alias.to_string()),
        });
        self
    }

    /// Select from a derived table: `FROM (<query>) AS alias`.
    pub fn from_subquery(mut self, query: Query, alias: &str) -> Self {
        self.table = Some(TableRef::Derived {
            query: Box::new(query),
            alias: alias.to_string(),
        });
        self
    }

    /// Set the target dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Set the dialect from a driver name (`"mysql"`, `"mssql"`, `"sqlite"`).
    ///
    /// Unknown names are reported by `render()`.
    pub fn set_driver(mut self, driver: &str) -> Self {
        match driver.parse::<Dialect>() {
            Ok(dialect) => self.dialect = Some(dialect),
            Err(err) => self.build_error = Some(err),
        }
        self
    }

    /// Apply dialect, primary key, page size and SQL logging from a config.
    pub fn with_config(mut self, config: &QbConfig) -> Self {
        if let Some(dialect) = config.dialect {
            self.dialect = Some(dialect);
        }
        self.primary_key = config.primary_key.clone();
        self.per_page = config.per_page.max(1);
        self.log = SqlLogConfig::from(config);
        self
    }

    /// Override SQL logging for this query.
    pub fn log_sql(mut self, log: SqlLogConfig) -> Self {
        self.log = log;
        self
    }

    /// Set the primary key column used by [`for_record`](Query::for_record).
    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    /// Bind this query to one record: adds `WHERE <pk> = id` and drops the
    /// primary key from UPDATE SET lists.
    pub fn for_record(mut self, id: impl Into<Value>) -> Self {
        let pk = self.primary_key.clone();
        self.record_bound = true;
        self.eq(&pk, id)
    }

    /// Allow UPDATE/DELETE without a WHERE clause.
    pub fn allow_unrestricted(mut self, allow: bool) -> Self {
        self.allow_unrestricted = allow;
        self
    }

    pub fn get_dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Check if the WHERE tree has any condition.
    pub fn has_conditions(&self) -> bool {
        !self.wheres.is_empty()
    }

    // ==================== Projection ====================

    /// Replace the projection with `columns`.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns
            .iter()
            .map(|c| SelectItem::Column(c.to_string()))
            .collect();
        self
    }

    /// Reset the projection to `*`.
    pub fn select_all(mut self) -> Self {
        self.columns.clear();
        self
    }

    /// Append one column.
    pub fn add_select(mut self, column: &str) -> Self {
        self.columns.push(SelectItem::Column(column.to_string()));
        self
    }

    /// Append `expr AS alias`.
    pub fn select_as(mut self, expr: &str, alias: &str) -> Self {
        self.columns.push(SelectItem::Aliased {
            expr: expr.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    /// Replace the projection with a raw fragment (`?` markers bind `params`).
    pub fn select_raw(mut self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        check_template(sql, &params)?;
        self.columns = vec![SelectItem::Raw {
            sql: sql.to_string(),
            params,
        }];
        Ok(self)
    }

    /// Append a raw fragment (`?` markers bind `params`).
    pub fn add_select_raw(mut self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        check_template(sql, &params)?;
        self.columns.push(SelectItem::Raw {
            sql: sql.to_string(),
            params,
        });
        Ok(self)
    }

    /// Append `(<query>) AS alias`.
    pub fn add_select_subquery(mut self, query: Query, alias: &str) -> Self {
        self.columns.push(SelectItem::Subquery {
            query: Box::new(query),
            alias: alias.to_string(),
        });
        self
    }

    /// Append `CASE WHEN <cond> THEN ? ... ELSE ? END AS alias`.
    ///
    /// Conditions are raw SQL; results are bound.
    pub fn case_when<V: Into<Value>>(
        mut self,
        whens: Vec<(&str, V)>,
        otherwise: impl Into<Value>,
        alias: &str,
    ) -> Self {
        self.columns.push(SelectItem::Case {
            whens: whens
                .into_iter()
                .map(|(cond, v)| (cond.to_string(), v.into()))
                .collect(),
            otherwise: otherwise.into(),
            alias: alias.to_string(),
        });
        self
    }

    /// Emit `SELECT DISTINCT`.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== Joins ====================

    fn push_join(mut self, join: Join) -> Self {
        let duplicate = join.key.is_some()
            && self.joins.iter().any(|j| j.key.is_some() && j.key == join.key);
        if !duplicate {
            self.joins.push(join);
        }
        self
    }

    /// Add `<kind> JOIN table ON left <op> right`. Identical joins are added once.
    pub fn join_kind(self, kind: JoinKind, table: &str, left: &str, op: &str, right: &str) -> QbResult<Self> {
        let op = Operator::parse(op)?;
        let (name, alias) = parse_table_spec(table);
        let key = format!(
            "{}|{name}|{}|{left}|{op}|{right}",
            kind.as_sql(),
            alias.as_deref().unwrap_or("")
        );
        let mut on = PredicateTree::new();
        on.push(Connector::And, PredicateKind::column(left, op, right)?);
        Ok(self.push_join(Join {
            kind,
            target: JoinTarget::Table { name, alias },
            on,
            key: Some(key),
        }))
    }

    /// Add INNER JOIN.
    pub fn join(self, table: &str, left: &str, op: &str, right: &str) -> QbResult<Self> {
        self.join_kind(JoinKind::Inner, table, left, op, right)
    }

    /// Add LEFT JOIN.
    pub fn left_join(self, table: &str, left: &str, op: &str, right: &str) -> QbResult<Self> {
        self.join_kind(JoinKind::Left, table, left, op, right)
    }

    /// Add RIGHT JOIN.
    pub fn right_join(self, table: &str, left: &str, op: &str, right: &str) -> QbResult<Self> {
        self.join_kind(JoinKind::Right, table, left, op, right)
    }

    /// Add FULL OUTER JOIN.
    pub fn full_join(self, table: &str, left: &str, op: &str, right: &str) -> QbResult<Self> {
        self.join_kind(JoinKind::FullOuter, table, left, op, right)
    }

    /// Add CROSS JOIN.
    pub fn cross_join(self, table: &str) -> Self {
        let (name, alias) = parse_table_spec(table);
        let key = format!("CROSS|{name}|{}", alias.as_deref().unwrap_or(""));
        self.push_join(Join {
            kind: JoinKind::Cross,
            target: JoinTarget::Table { name, alias },
            on: PredicateTree::new(),
            key: Some(key),
        })
    }

    /// Add a join whose ON clause is built by `f`.
    pub fn join_on(self, kind: JoinKind, table: &str, f: impl FnOnce(Conditions) -> Conditions) -> Self {
        let (name, alias) = parse_table_spec(table);
        self.push_join(Join {
            kind,
            target: JoinTarget::Table { name, alias },
            on: f(Conditions::new()).into_tree(),
            key: None,
        })
    }

    /// Add a join whose ON clause is a raw template (`?` markers bind `params`).
    pub fn join_raw(self, kind: JoinKind, table: &str, on: &str, params: Vec<Value>) -> QbResult<Self> {
        let (name, alias) = parse_table_spec(table);
        let mut tree = PredicateTree::new();
        tree.push(Connector::And, PredicateKind::raw(on, params)?);
        Ok(self.push_join(Join {
            kind,
            target: JoinTarget::Table { name, alias },
            on: tree,
            key: None,
        }))
    }

    /// Join a correlated subquery: MySQL `LEFT JOIN LATERAL (...) AS alias
    /// ON TRUE`, SQL Server `OUTER APPLY (...) AS alias`.
    ///
    /// The correlation belongs inside `query` (e.g. `where_column` on the
    /// outer alias). SQLite reports `UnsupportedFeature` at render.
    pub fn lateral_join(self, query: Query, alias: &str) -> Self {
        self.push_join(Join {
            kind: JoinKind::Left,
            target: JoinTarget::Lateral {
                query: Box::new(query),
                alias: alias.to_string(),
            },
            on: PredicateTree::new(),
            key: None,
        })
    }

    /// Join a derived table: `<kind> JOIN (<query>) AS alias ON ...`.
    pub fn join_sub(
        self,
        kind: JoinKind,
        query: Query,
        alias: &str,
        f: impl FnOnce(Conditions) -> Conditions,
    ) -> Self {
        self.push_join(Join {
            kind,
            target: JoinTarget::Subquery {
                query: Box::new(query),
                alias: alias.to_string(),
            },
            on: f(Conditions::new()).into_tree(),
            key: None,
        })
    }

    // ==================== Grouping ====================

    /// Append GROUP BY columns.
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.groups
            .extend(columns.iter().map(|c| GroupItem::Column(c.to_string())));
        self
    }

    /// Append a raw GROUP BY expression.
    pub fn group_by_raw(mut self, sql: &str) -> Self {
        self.groups.push(GroupItem::Raw(sql.to_string()));
        self
    }

    /// Add HAVING: `expr <op> value`.
    pub fn having(mut self, expr: &str, op: &str, value: impl Into<Operand>) -> QbResult<Self> {
        let kind = PredicateKind::leaf(expr, Operator::parse(op)?, Some(value.into()))?;
        self.havings.push(Connector::And, kind);
        Ok(self)
    }

    /// Add OR HAVING: `expr <op> value`.
    pub fn or_having(mut self, expr: &str, op: &str, value: impl Into<Operand>) -> QbResult<Self> {
        let kind = PredicateKind::leaf(expr, Operator::parse(op)?, Some(value.into()))?;
        self.havings.push(Connector::Or, kind);
        Ok(self)
    }

    /// Add a raw HAVING condition with `?` markers.
    pub fn having_raw(mut self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        self.havings.push(Connector::And, PredicateKind::raw(sql, params)?);
        Ok(self)
    }

    /// Add a raw OR HAVING condition with `?` markers.
    pub fn or_having_raw(mut self, sql: &str, params: Vec<Value>) -> QbResult<Self> {
        self.havings.push(Connector::Or, PredicateKind::raw(sql, params)?);
        Ok(self)
    }

    // ==================== Ordering ====================

    /// Order by `column` in `direction`. Re-ordering an existing column
    /// updates its direction in place.
    pub fn order_by_dir(mut self, column: &str, direction: Direction) -> Self {
        let existing = self.orders.iter_mut().find_map(|o| match o {
            OrderItem::Column { expr, direction: dir } if expr == column => Some(dir),
            _ => None,
        });
        match existing {
            Some(d) => *d = direction,
            None => self.orders.push(OrderItem::Column {
                expr: column.to_string(),
                direction,
            }),
        }
        self
    }

    /// Add ORDER BY column ASC.
    pub fn order_by(self, column: &str) -> Self {
        self.order_by_dir(column, Direction::Asc)
    }

    /// Add ORDER BY column DESC.
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by_dir(column, Direction::Desc)
    }

    /// Add a raw ORDER BY expression.
    pub fn order_by_raw(mut self, sql: &str) -> Self {
        self.orders.push(OrderItem::Raw(sql.to_string()));
        self
    }

    /// Newest first.
    pub fn latest(self, column: &str) -> Self {
        self.order_by_desc(column)
    }

    /// Oldest first.
    pub fn oldest(self, column: &str) -> Self {
        self.order_by(column)
    }

    /// Order randomly (resolved per dialect at render time).
    pub fn in_random_order(mut self) -> Self {
        self.orders.push(OrderItem::Random);
        self
    }

    /// Remove every ORDER BY entry.
    pub fn remove_ordering(mut self) -> Self {
        self.orders.clear();
        self
    }

    // ==================== Pagination ====================

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Remove LIMIT and OFFSET.
    pub fn remove_limit(mut self) -> Self {
        self.limit = None;
        self.offset = None;
        self
    }

    /// Pagination helper. `page` is 1-based; both values must be >= 1.
    pub fn paginate(mut self, page: u64, per_page: u64) -> QbResult<Self> {
        if page < 1 || per_page < 1 {
            return Err(QbError::validation("page and per_page must be >= 1"));
        }
        let offset = (page - 1).checked_mul(per_page).ok_or_else(|| {
            QbError::validation(format!("page {page} with {per_page} per page overflows the offset"))
        })?;
        self.limit = Some(per_page);
        self.offset = Some(offset);
        Ok(self)
    }

    /// Paginate with the configured page size (default 10).
    pub fn page(self, page: u64) -> QbResult<Self> {
        let per_page = self.per_page;
        self.paginate(page, per_page)
    }

    // ==================== CTEs & unions ====================

    /// Prefix `WITH name AS (<query>)`.
    pub fn with_cte(mut self, name: &str, query: Query) -> Self {
        self.ctes.push(Cte {
            name: name.to_string(),
            query: Box::new(query),
            recursive: false,
        });
        self
    }

    /// Prefix a recursive CTE (`WITH RECURSIVE` where the dialect needs it).
    pub fn with_recursive_cte(mut self, name: &str, query: Query) -> Self {
        self.ctes.push(Cte {
            name: name.to_string(),
            query: Box::new(query),
            recursive: true,
        });
        self
    }

    /// Append `UNION <query>`.
    pub fn union(mut self, query: Query) -> Self {
        self.unions.push(UnionPart {
            query: Box::new(query),
            all: false,
        });
        self
    }

    /// Append `UNION ALL <query>`.
    pub fn union_all(mut self, query: Query) -> Self {
        self.unions.push(UnionPart {
            query: Box::new(query),
            all: true,
        });
        self
    }

    // ==================== Derived queries ====================

    /// A `COUNT(*) AS aggregate` variant of this query.
    ///
    /// ORDER BY and pagination are dropped. Grouped, DISTINCT and UNION
    /// queries are wrapped in a derived table (`count_subquery`) with their
    /// CTEs hoisted to the outer query.
    pub fn count_query(&self) -> Query {
        self.as_count("*", "aggregate")
    }

    /// Like [`count_query`](Query::count_query) with a counted column and
    /// result alias. A DISTINCT query counting a column renders
    /// `COUNT(DISTINCT column)` without wrapping; wrapped queries count the
    /// rows of the derived table. The alias must be a plain word.
    pub fn as_count(&self, column: &str, alias: &str) -> Query {
        let mut inner = self.clone().remove_ordering().remove_limit();
        let column = match column.trim() {
            "" => "*",
            c => c,
        };
        if !is_plain_alias(alias) {
            inner.build_error = Some(QbError::validation(format!("invalid count alias: {alias}")));
            return inner;
        }

        let distinct_column = inner.distinct && column != "*";
        if inner.groups.is_empty() && inner.unions.is_empty() && (!inner.distinct || distinct_column) {
            inner.columns = vec![SelectItem::Count {
                column: column.to_string(),
                distinct: distinct_column,
                alias: alias.to_string(),
            }];
            inner.distinct = false;
            return inner;
        }

        if !inner.groups.is_empty() && !inner.distinct && inner.unions.is_empty() {
            inner.columns = vec![SelectItem::Raw {
                sql: "1".to_string(),
                params: Vec::new(),
            }];
        }
        let ctes = std::mem::take(&mut inner.ctes);

        let mut outer = Query::new();
        outer.dialect = self.dialect;
        outer.log = self.log.clone();
        outer.primary_key = self.primary_key.clone();
        outer.per_page = self.per_page;
        outer.ctes = ctes;
        outer.columns = vec![SelectItem::Count {
            column: "*".to_string(),
            distinct: false,
            alias: alias.to_string(),
        }];
        outer.from_subquery(inner, "count_subquery")
    }

    // ==================== Rendering ====================

    /// Render to SQL and parameters.
    pub fn render(&self) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let mut binder = ParamList::new(dialect);
        let mut sql = String::new();
        self.write_sql(&mut binder, &mut sql)?;
        Ok(self.finish(StatementKind::Select, sql, binder))
    }

    /// Alias for [`render`](Query::render).
    pub fn get(&self) -> QbResult<BuiltQuery> {
        self.render()
    }

    /// Rendered SQL text only.
    pub fn to_sql(&self) -> QbResult<String> {
        Ok(self.render()?.sql)
    }

    /// Rendered SQL with parameters inlined. Never execute the result.
    pub fn to_debug_sql(&self) -> QbResult<String> {
        Ok(self.render()?.to_debug_sql())
    }

    pub(crate) fn require_dialect(&self) -> QbResult<Dialect> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        self.wheres.check()?;
        self.havings.check()?;
        self.dialect.ok_or_else(|| {
            QbError::configuration("no dialect set; call dialect() or set_driver() before rendering")
        })
    }

    /// Check a query nested into one rendering for `dialect`.
    fn check_nested(&self, dialect: Dialect) -> QbResult<()> {
        if let Some(err) = &self.build_error {
            return Err(err.clone());
        }
        match self.dialect {
            Some(own) if own != dialect => Err(QbError::configuration(format!(
                "query bound to the {own} dialect cannot be nested in a {dialect} query"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn finish(&self, kind: StatementKind, sql: String, binder: ParamList) -> BuiltQuery {
        let dialect = binder.dialect();
        let built = BuiltQuery::new(sql, binder.into_vec(), dialect);
        log_built(&self.log, kind, &built);
        built
    }

    /// The plain table name targeted by mutations.
    pub(crate) fn mutation_table(&self) -> QbResult<Ident> {
        match &self.table {
            Some(TableRef::Named { name, .. }) => Ident::parse(name),
            Some(TableRef::Derived { .. }) => Err(QbError::configuration(
                "cannot mutate a derived table",
            )),
            None => Err(QbError::configuration(
                "no table set; call table() before rendering",
            )),
        }
    }

    /// Append ` WHERE ...` if there are conditions.
    pub(crate) fn write_where(&self, binder: &mut ParamList, out: &mut String) -> QbResult<()> {
        if !self.wheres.is_empty() {
            out.push_str(" WHERE ");
            self.wheres.render(binder, out)?;
        }
        Ok(())
    }

    /// Render this query as a SELECT into an existing buffer and binder.
    pub(crate) fn write_sql(&self, binder: &mut ParamList, out: &mut String) -> QbResult<()> {
        let dialect = binder.dialect();
        self.check_nested(dialect)?;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| QbError::configuration("no table set; call table() before rendering"))?;

        if !self.ctes.is_empty() {
            out.push_str("WITH ");
            if self.ctes.iter().any(|c| c.recursive) {
                out.push_str(dialect.recursive_cte_keyword());
            }
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&dialect.quote_identifier(&cte.name)?);
                out.push_str(" AS (");
                cte.query.write_sql(binder, out)?;
                out.push(')');
            }
            out.push(' ');
        }

        out.push_str(if self.distinct { "SELECT DISTINCT " } else { "SELECT " });
        self.write_projection(binder, out)?;

        out.push_str(" FROM ");
        match table {
            TableRef::Named { name, alias } => write_table(name, alias.as_deref(), dialect, out)?,
            TableRef::Derived { query, alias } => {
                out.push('(');
                query.write_sql(binder, out)?;
                out.push_str(") AS ");
                out.push_str(&dialect.quote_identifier(alias)?);
            }
        }

        for join in &self.joins {
            out.push(' ');
            match &join.target {
                JoinTarget::Table { name, alias } => {
                    out.push_str(join.kind.as_sql());
                    out.push(' ');
                    write_table(name, alias.as_deref(), dialect, out)?;
                }
                JoinTarget::Subquery { query, alias } => {
                    out.push_str(join.kind.as_sql());
                    out.push_str(" (");
                    query.write_sql(binder, out)?;
                    out.push_str(") AS ");
                    out.push_str(&dialect.quote_identifier(alias)?);
                }
                JoinTarget::Lateral { query, alias } => {
                    let (keyword, on) = dialect.lateral_join()?;
                    out.push_str(keyword);
                    out.push_str(" (");
                    query.write_sql(binder, out)?;
                    out.push_str(") AS ");
                    out.push_str(&dialect.quote_identifier(alias)?);
                    out.push_str(on);
                    continue;
                }
            }
            if join.kind != JoinKind::Cross && !join.on.is_empty() {
                out.push_str(" ON ");
                join.on.render(binder, out)?;
            } else {
                join.on.check()?;
            }
        }

        self.write_where(binder, out)?;

        if !self.groups.is_empty() {
            out.push_str(" GROUP BY ");
            let groups: Vec<String> = self
                .groups
                .iter()
                .map(|g| match g {
                    GroupItem::Column(c) => quote_expr(c, dialect),
                    GroupItem::Raw(sql) => sql.clone(),
                })
                .collect();
            out.push_str(&groups.join(", "));
        }

        if !self.havings.is_empty() {
            out.push_str(" HAVING ");
            self.havings.render(binder, out)?;
        }

        if !self.orders.is_empty() {
            out.push_str(" ORDER BY ");
            let orders: Vec<String> = self
                .orders
                .iter()
                .map(|o| match o {
                    OrderItem::Column { expr, direction } => {
                        format!("{} {}", quote_expr(expr, dialect), direction.as_sql())
                    }
                    OrderItem::Raw(sql) => sql.clone(),
                    OrderItem::Random => dialect.random_order().to_string(),
                })
                .collect();
            out.push_str(&orders.join(", "));
        }

        out.push_str(&dialect.render_pagination(self.limit, self.offset, !self.orders.is_empty())?);

        for part in &self.unions {
            out.push_str(if part.all { " UNION ALL " } else { " UNION " });
            part.query.write_sql(binder, out)?;
        }

        Ok(())
    }

    fn write_projection(&self, binder: &mut ParamList, out: &mut String) -> QbResult<()> {
        let dialect = binder.dialect();
        if self.columns.is_empty() {
            out.push('*');
            return Ok(());
        }
        for (i, item) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match item {
                SelectItem::Column(c) => out.push_str(&quote_expr(c, dialect)),
                SelectItem::Aliased { expr, alias } => {
                    out.push_str(&quote_expr(expr, dialect));
                    out.push_str(" AS ");
                    out.push_str(&dialect.quote_identifier(alias)?);
                }
                SelectItem::Raw { sql, params } => binder.write_template(sql, params, out)?,
                SelectItem::Subquery { query, alias } => {
                    out.push('(');
                    query.write_sql(binder, out)?;
                    out.push_str(") AS ");
                    out.push_str(&dialect.quote_identifier(alias)?);
                }
                SelectItem::Case {
                    whens,
                    otherwise,
                    alias,
                } => {
                    out.push_str("CASE");
                    for (cond, value) in whens {
                        out.push_str(" WHEN ");
                        out.push_str(cond);
                        out.push_str(" THEN ");
                        out.push_str(binder.bind(value.clone()));
                    }
                    out.push_str(" ELSE ");
                    out.push_str(binder.bind(otherwise.clone()));
                    out.push_str(" END AS ");
                    out.push_str(&dialect.quote_identifier(alias)?);
                }
                SelectItem::Count {
                    column,
                    distinct,
                    alias,
                } => {
                    let target = if column == "*" {
                        "*".to_string()
                    } else {
                        quote_expr(column, dialect)
                    };
                    let distinct = if *distinct { "DISTINCT " } else { "" };
                    out.push_str(&format!("COUNT({distinct}{target}) AS {alias}"));
                }
            }
        }
        Ok(())
    }
}
