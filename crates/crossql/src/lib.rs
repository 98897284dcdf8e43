//! # crossql
//!
//! A fluent SQL query builder rendering parameterized SQL for MySQL,
//! SQL Server and SQLite from one API.
//!
//! ## Features
//!
//! - **Dialect-aware rendering**: quoting, placeholders, pagination, random ordering,
//!   full-text search and upserts follow the target [`Dialect`]
//! - **Parameters, never interpolation**: values are bound in textual order; only
//!   explicit [`Raw`] fragments are inlined
//! - **Predicate trees**: `AND`/`OR` chains and parenthesized groups render exactly as built
//! - **Safe defaults**: UPDATE/DELETE without WHERE are rejected unless explicitly allowed
//! - **No I/O**: the builder renders; an [`Executor`] you provide runs the SQL
//!
//! ## Example
//!
//! ```ignore
//! use crossql::{Dialect, Filter, row};
//!
//! let q = crossql::table("orders o")
//!     .dialect(Dialect::MsSql)
//!     .join("users u", "u.id", "=", "o.user_id")?
//!     .eq("o.status", "paid")
//!     .nest(|c| c.gt("o.total", 100).or_is_null("o.discount"))
//!     .latest("o.created_at");
//!
//! let page = q.clone().paginate(1, 25)?.render()?;
//! let count = q.count_query().render()?;
//!
//! let update = crossql::table("orders")
//!     .dialect(Dialect::MsSql)
//!     .for_record(42)
//!     .update(row! { "status" => "shipped" })?;
//! ```

pub mod client;
pub mod config;
pub mod dialect;
pub mod error;
pub mod ident;
pub mod page;
pub mod qb;
pub mod tracing_hook;
pub mod transaction;
pub mod value;

pub use client::{Executor, Transactional};
pub use config::QbConfig;
pub use dialect::{DatePart, Dialect, FullTextMode, ReturningClause};
pub use error::{QbError, QbResult};
pub use ident::{Ident, IdentPart};
pub use page::{Page, Paginated};
pub use qb::{
    Batch, BuiltQuery, Conditions, Connector, Direction, Filter, JoinKind, Operand, Operator,
    PredicateTree, Query, table,
};
pub use tracing_hook::{SqlLogConfig, SqlLogLevel, StatementKind};
pub use value::{Cell, Raw, Row, Value};

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingSqlHook;

/// Glob import for the common builder surface.
pub mod prelude {
    pub use crate::{
        BuiltQuery, Dialect, Filter, QbError, QbResult, Query, Raw, Row, Value, row, table,
    };
}
