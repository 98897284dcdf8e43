//! DELETE generator.

use crate::error::QbResult;
use crate::qb::param::ParamList;
use crate::qb::query::{BuiltQuery, Query};
use crate::tracing_hook::StatementKind;

impl Query {
    /// `DELETE FROM t WHERE ...`
    ///
    /// Without conditions this fails with [`QbError::UnsafeMutation`] unless
    /// [`allow_unrestricted(true)`](Query::allow_unrestricted) was called.
    ///
    /// [`QbError::UnsafeMutation`]: crate::QbError::UnsafeMutation
    pub fn delete(&self) -> QbResult<BuiltQuery> {
        let dialect = self.require_dialect()?;
        let table = self.mutation_table()?;
        self.guard_unrestricted("DELETE")?;

        let mut binder = ParamList::new(dialect);
        let mut sql = format!("DELETE FROM {}", table.quoted(dialect));
        self.write_where(&mut binder, &mut sql)?;
        Ok(self.finish(StatementKind::Delete, sql, binder))
    }
}
