//! Count-plus-page requests.

use crate::client::Executor;
use crate::error::QbResult;
use crate::qb::{BuiltQuery, Query};

/// A count query and a page query derived from the same base query.
#[derive(Debug, Clone)]
pub struct Paginated {
    pub count: Query,
    pub page: Query,
    pub current_page: u64,
    pub per_page: u64,
}

impl Query {
    /// Derive the count and page queries for `page` (1-based).
    pub fn paginated(&self, page: u64, per_page: u64) -> QbResult<Paginated> {
        let page_query = self.clone().paginate(page, per_page)?;
        Ok(Paginated {
            count: self.count_query(),
            page: page_query,
            current_page: page,
            per_page,
        })
    }
}

impl Paginated {
    /// Render both queries: `(count, page)`.
    pub fn render(&self) -> QbResult<(BuiltQuery, BuiltQuery)> {
        Ok((self.count.render()?, self.page.render()?))
    }

    /// Run the count query, then the page query.
    ///
    /// `extract_count` reads the `aggregate` column from the count row; an
    /// empty count result is treated as zero.
    pub async fn fetch<E, F>(&self, conn: &E, extract_count: F) -> QbResult<Page<E::Row>>
    where
        E: Executor,
        F: FnOnce(&E::Row) -> QbResult<u64>,
    {
        let (count, page) = self.render()?;
        let total = match conn.query_opt(&count.sql, &count.params).await? {
            Some(row) => extract_count(&row)?,
            None => 0,
        };
        let items = page.fetch_all(conn).await?;
        Ok(Page {
            items,
            total,
            per_page: self.per_page,
            current_page: self.current_page,
        })
    }
}

/// One page of results with its total count.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
}

impl<T> Page<T> {
    /// The last page number (at least 1).
    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }

    /// Convert the items, keeping the page metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dialect, Filter};

    #[test]
    fn paginated_derives_both_queries() {
        let base = Query::new()
            .table("users")
            .dialect(Dialect::MsSql)
            .eq("active", true)
            .order_by("id");
        let (count, page) = base.paginated(2, 20).unwrap().render().unwrap();
        assert_eq!(count.sql, "SELECT COUNT(*) AS aggregate FROM [users] WHERE [active] = ?");
        assert_eq!(
            page.sql,
            "SELECT * FROM [users] WHERE [active] = ? ORDER BY [id] ASC OFFSET 20 ROWS FETCH NEXT 20 ROWS ONLY"
        );
    }

    #[test]
    fn paginated_rejects_page_zero() {
        let base = Query::new().table("users").dialect(Dialect::MySql);
        assert!(base.paginated(0, 10).is_err());
    }

    #[test]
    fn page_math() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 41,
            per_page: 10,
            current_page: 4,
        };
        assert_eq!(page.last_page(), 5);
        assert!(page.has_more_pages());

        let empty: Page<i32> = Page {
            items: vec![],
            total: 0,
            per_page: 10,
            current_page: 1,
        };
        assert_eq!(empty.last_page(), 1);
        assert!(!empty.has_more_pages());
    }
}
