//! Query builder (QB) core.
//!
//! One [`Query`] type covers SELECT rendering and the mutation generators
//! (INSERT, UPDATE, DELETE, upsert). Conditions live in a [`PredicateTree`]
//! and are added through the [`Filter`] trait, which both [`Query`] and the
//! nested-group builder [`Conditions`] implement.
//!
//! # Usage
//!
//! ```ignore
//! use crossql::{Dialect, Filter, qb, row};
//!
//! // SELECT
//! let built = qb::table("users")
//!     .dialect(Dialect::Sqlite)
//!     .eq("status", "active")
//!     .latest("created_at")
//!     .limit(20)
//!     .render()?;
//!
//! // INSERT
//! let built = qb::table("users")
//!     .dialect(Dialect::MySql)
//!     .insert(row! { "username" => "alice", "email" => "alice@example.com" })?;
//!
//! // UPDATE
//! let built = qb::table("users")
//!     .dialect(Dialect::MsSql)
//!     .eq("id", user_id)
//!     .update(row! { "status" => "inactive" })?;
//!
//! // DELETE
//! let built = qb::table("users").dialect(Dialect::MsSql).eq("id", user_id).delete()?;
//! ```

mod batch;
mod delete;
mod expr;
mod insert;
pub(crate) mod param;
mod query;
mod traits;
mod update;
mod upsert;

pub use batch::Batch;
pub use expr::{Conditions, Connector, Operand, Operator, Predicate, PredicateKind, PredicateTree};
pub use param::{ParamList, count_placeholders, split_placeholders};
pub use query::{BuiltQuery, Direction, Join, JoinKind, JoinTarget, Query};
pub use traits::Filter;

/// Create a query targeting `table` (`"users"`, `"users u"`, `"users AS u"`).
///
/// # Example
/// ```ignore
/// let q = crossql::qb::table("users").dialect(crossql::Dialect::MySql);
/// ```
pub fn table(table: &str) -> Query {
    Query::new().table(table)
}

#[cfg(test)]
mod tests;
