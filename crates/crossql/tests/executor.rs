//! Execution through an in-memory `Executor`.

use std::collections::VecDeque;
use std::future::{Future, ready};
use std::sync::Mutex;

use crossql::{
    Batch, BuiltQuery, Dialect, Executor, Filter, QbError, QbResult, Transactional, Value, row, table,
};

/// Records every statement and answers queries from a queue of canned results.
#[derive(Default)]
struct MemoryExecutor {
    log: Mutex<Vec<(String, Vec<Value>)>>,
    results: Mutex<VecDeque<Vec<Vec<Value>>>>,
}

impl MemoryExecutor {
    fn with_results(results: Vec<Vec<Vec<Value>>>) -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            results: Mutex::new(results.into()),
        }
    }

    fn record(&self, sql: &str, params: &[Value]) {
        self.log.lock().unwrap().push((sql.to_string(), params.to_vec()));
    }

    fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
    }
}

impl Executor for MemoryExecutor {
    type Row = Vec<Value>;

    fn query(&self, sql: &str, params: &[Value]) -> impl Future<Output = QbResult<Vec<Self::Row>>> + Send {
        self.record(sql, params);
        let rows = self.results.lock().unwrap().pop_front().unwrap_or_default();
        ready(Ok(rows))
    }

    fn execute(&self, sql: &str, params: &[Value]) -> impl Future<Output = QbResult<u64>> + Send {
        self.record(sql, params);
        let result = if sql.contains("broken") {
            Err(QbError::execution("no such table: broken"))
        } else {
            Ok(1)
        };
        ready(result)
    }
}

impl Transactional for MemoryExecutor {
    fn begin(&self) -> impl Future<Output = QbResult<()>> + Send {
        self.record("BEGIN", &[]);
        ready(Ok(()))
    }

    fn commit(&self) -> impl Future<Output = QbResult<()>> + Send {
        self.record("COMMIT", &[]);
        ready(Ok(()))
    }

    fn rollback(&self) -> impl Future<Output = QbResult<()>> + Send {
        self.record("ROLLBACK", &[]);
        ready(Ok(()))
    }
}

#[tokio::test]
async fn fetch_all_forwards_sql_and_params() {
    let conn = MemoryExecutor::with_results(vec![vec![vec![Value::Int(1), Value::from("alice")]]]);
    let rows = table("users")
        .dialect(Dialect::Sqlite)
        .select(&["id", "name"])
        .eq("name", "alice")
        .render()
        .unwrap()
        .fetch_all(&conn)
        .await
        .unwrap();

    assert_eq!(rows, vec![vec![Value::Int(1), Value::from("alice")]]);
    let log = conn.log.lock().unwrap();
    assert_eq!(log[0].0, "SELECT \"id\", \"name\" FROM \"users\" WHERE \"name\" = ?");
    assert_eq!(log[0].1, vec![Value::from("alice")]);
}

#[tokio::test]
async fn paginated_fetch_counts_then_pages() {
    let conn = MemoryExecutor::with_results(vec![
        vec![vec![Value::Int(23)]],
        vec![vec![Value::Int(11)], vec![Value::Int(12)]],
    ]);
    let page = table("users")
        .dialect(Dialect::MySql)
        .order_by("id")
        .paginated(2, 10)
        .unwrap()
        .fetch(&conn, |row| match row.first() {
            Some(Value::Int(n)) => Ok(*n as u64),
            _ => Err(QbError::execution("missing aggregate")),
        })
        .await
        .unwrap();

    assert_eq!(page.total, 23);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.last_page(), 3);
    assert!(page.has_more_pages());
    assert_eq!(
        conn.statements(),
        vec![
            "SELECT COUNT(*) AS aggregate FROM `users`".to_string(),
            "SELECT * FROM `users` ORDER BY `id` ASC LIMIT 10 OFFSET 10".to_string(),
        ]
    );
}

#[tokio::test]
async fn insert_get_id_returns_generated_key() {
    let conn = MemoryExecutor::with_results(vec![vec![vec![Value::Int(42)]]]);
    let key = table("users")
        .dialect(Dialect::MsSql)
        .insert_get_id_with(&conn, row! { "name" => "alice" })
        .await
        .unwrap();

    assert_eq!(key, Some(vec![Value::Int(42)]));
    assert_eq!(
        conn.statements(),
        vec![
            "BEGIN".to_string(),
            "INSERT INTO [users] ([name]) VALUES (?)".to_string(),
            "SELECT SCOPE_IDENTITY()".to_string(),
            "COMMIT".to_string(),
        ]
    );
}

#[tokio::test]
async fn batch_counts_affected_rows_inside_a_transaction() {
    let conn = MemoryExecutor::default();
    let q = table("users").dialect(Dialect::Sqlite);
    let batch = Batch::new(Dialect::Sqlite)
        .push(q.insert(row! { "name" => "alice" }).unwrap())
        .unwrap()
        .push(q.clone().eq("name", "bob").delete().unwrap())
        .unwrap();

    let affected = batch.execute_all(&conn).await.unwrap();
    assert_eq!(affected, 2);
    let log = conn.statements();
    assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(log.last().map(String::as_str), Some("COMMIT"));
    assert_eq!(log.len(), 4);
}

#[tokio::test]
async fn failed_insert_skips_identity_lookup() {
    let conn = MemoryExecutor::default();
    let batch = Batch::new(Dialect::Sqlite)
        .push(table("broken").dialect(Dialect::Sqlite).insert(row! { "a" => 1 }).unwrap())
        .unwrap()
        .push(BuiltQuery::new("SELECT last_insert_rowid()", vec![], Dialect::Sqlite))
        .unwrap();

    let err = batch.execute_fetch_last(&conn).await.unwrap_err();
    assert!(matches!(err, QbError::Execution(_)));
    assert_eq!(
        conn.statements().last().map(String::as_str),
        Some("ROLLBACK")
    );
    assert_eq!(conn.statements().len(), 3);
}

#[tokio::test]
async fn failed_statement_rolls_back() {
    let conn = MemoryExecutor::default();
    let statements = vec![
        table("users")
            .dialect(Dialect::Sqlite)
            .eq("id", 1)
            .delete()
            .unwrap(),
        table("broken")
            .dialect(Dialect::Sqlite)
            .eq("id", 1)
            .delete()
            .unwrap(),
        table("users")
            .dialect(Dialect::Sqlite)
            .eq("id", 2)
            .delete()
            .unwrap(),
    ];

    let err = crossql::transaction::execute_all(&conn, &statements)
        .await
        .unwrap_err();
    assert!(matches!(err, QbError::Execution(_)));

    let log = conn.statements();
    assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(log.len(), 4);
}

#[tokio::test]
async fn query_opt_returns_first_row() {
    let conn = MemoryExecutor::with_results(vec![vec![vec![Value::Int(1)], vec![Value::Int(2)]]]);
    let row = conn.query_opt("SELECT 1", &[]).await.unwrap();
    assert_eq!(row, Some(vec![Value::Int(1)]));
    assert_eq!(conn.query_opt("SELECT 1", &[]).await.unwrap(), None);
}
