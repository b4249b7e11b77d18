//! Database executor trait and query helpers.
//!
//! This module defines the [`DbExecutor`] trait: the minimal async interface
//! the schema registries and the instance engine need from a backend. It is
//! implemented by `SqliteBackend` in the `schemata-db-backends` crate.
//!
//! Schema mutations are submitted as a batch of [`Statement`]s through
//! [`DbExecutor::atomic`], which runs metadata writes and DDL inside one
//! transaction: either every statement applies or none does.

use crate::query::compiler::{Query, Row, SqlCompiler, WhereNode};
use crate::value::Value;
use schemata_core::{SchemataError, SchemataResult};

/// One parameterized statement in an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// The SQL text with `?` placeholders.
    pub sql: String,
    /// Parameters bound in order.
    pub params: Vec<Value>,
    /// When set, the batch is rolled back with `NotFound` unless the statement
    /// affects exactly this many rows.
    pub expected_rows: Option<u64>,
}

impl Statement {
    /// Creates a statement with parameters.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
            expected_rows: None,
        }
    }

    /// Creates a parameterless statement (typically DDL).
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }

    /// Requires the statement to affect exactly `rows` rows.
    #[must_use]
    pub const fn expect_rows(mut self, rows: u64) -> Self {
        self.expected_rows = Some(rows);
        self
    }
}

impl From<(String, Vec<Value>)> for Statement {
    fn from((sql, params): (String, Vec<Value>)) -> Self {
        Self::new(sql, params)
    }
}

/// Minimal async database executor trait.
///
/// Everything above the storage layer accepts `&dyn DbExecutor` (usually as
/// an `Arc<dyn DbExecutor>`), so no crate besides `schemata-db-backends`
/// depends on a concrete driver.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> SchemataResult<u64>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> SchemataResult<Vec<Row>>;

    /// Runs a SQL query and returns the first row.
    /// Returns `NotFound` if the query produced no rows.
    async fn query_one(&self, sql: &str, params: &[Value]) -> SchemataResult<Row> {
        self.query(sql, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SchemataError::NotFound("Query returned no rows".to_string()))
    }

    /// Executes an INSERT and returns the generated row id.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> SchemataResult<i64>;

    /// Runs every statement inside one transaction, returning the affected
    /// row count of each. Any failure rolls the whole batch back.
    async fn atomic(&self, statements: Vec<Statement>) -> SchemataResult<Vec<u64>>;

    /// Returns the column names of a table in declaration order, or an empty
    /// list when the table does not exist.
    async fn table_columns(&self, table: &str) -> SchemataResult<Vec<String>>;
}

/// Runs a compiled SELECT and returns every row.
///
/// # Errors
///
/// Propagates backend errors.
pub async fn fetch_all(db: &dyn DbExecutor, query: &Query) -> SchemataResult<Vec<Row>> {
    let (sql, params) = SqlCompiler::new().compile_select(query);
    db.query(&sql, &params).await
}

/// Counts the rows matched by the query's WHERE clause.
///
/// # Errors
///
/// Propagates backend errors.
pub async fn fetch_count(db: &dyn DbExecutor, query: &Query) -> SchemataResult<u64> {
    let (sql, params) = SqlCompiler::new().compile_count(query);
    let row = db.query_one(&sql, &params).await?;
    row.get::<u64>("count")
}

/// Returns `true` when `table` contains a row whose `id` is `id`.
///
/// # Errors
///
/// Propagates backend errors.
pub async fn row_exists(db: &dyn DbExecutor, table: &str, id: i64) -> SchemataResult<bool> {
    let query = Query::new(table)
        .columns(["id"])
        .filter(WhereNode::exact("id", id))
        .slice(1, 0);
    Ok(!fetch_all(db, &query).await?.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Test that DbExecutor is object-safe
    fn _assert_object_safe(_: &dyn DbExecutor) {}

    /// Records the SQL it is given and replays canned rows.
    struct Recording {
        seen: Mutex<Vec<(String, Vec<Value>)>>,
        rows: Vec<Row>,
    }

    impl Recording {
        fn new(rows: Vec<Row>) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                rows,
            }
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for Recording {
        async fn execute_sql(&self, sql: &str, params: &[Value]) -> SchemataResult<u64> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(0)
        }

        async fn query(&self, sql: &str, params: &[Value]) -> SchemataResult<Vec<Row>> {
            self.seen.lock().unwrap().push((sql.to_string(), params.to_vec()));
            Ok(self.rows.clone())
        }

        async fn insert_returning_id(&self, _sql: &str, _params: &[Value]) -> SchemataResult<i64> {
            Ok(1)
        }

        async fn atomic(&self, statements: Vec<Statement>) -> SchemataResult<Vec<u64>> {
            Ok(vec![0; statements.len()])
        }

        async fn table_columns(&self, _table: &str) -> SchemataResult<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_statement_builders() {
        let stmt = Statement::raw("DROP TABLE \"t\"").expect_rows(0);
        assert!(stmt.params.is_empty());
        assert_eq!(stmt.expected_rows, Some(0));

        let stmt: Statement = ("DELETE FROM \"t\"".to_string(), vec![Value::Int(1)]).into();
        assert_eq!(stmt.expected_rows, None);
        assert_eq!(stmt.params, vec![Value::Int(1)]);
    }

    #[tokio::test]
    async fn test_query_one_empty_is_not_found() {
        let db = Recording::new(vec![]);
        let err = db.query_one("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, SchemataError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_count_reads_count_column() {
        let db = Recording::new(vec![Row::new(vec!["count".into()], vec![Value::Int(12)])]);
        let count = fetch_count(&db, &Query::new("customer")).await.unwrap();
        assert_eq!(count, 12);
        let seen = db.seen.lock().unwrap();
        assert_eq!(seen[0].0, "SELECT COUNT(*) AS \"count\" FROM \"customer\"");
    }

    #[tokio::test]
    async fn test_row_exists() {
        let db = Recording::new(vec![Row::new(vec!["id".into()], vec![Value::Int(3)])]);
        assert!(row_exists(&db, "customer", 3).await.unwrap());
        let seen = db.seen.lock().unwrap();
        assert_eq!(
            seen[0].0,
            "SELECT \"id\" FROM \"customer\" WHERE \"id\" = ? LIMIT 1 OFFSET 0"
        );
        assert_eq!(seen[0].1, vec![Value::Int(3)]);
    }

    #[tokio::test]
    async fn test_row_exists_false_when_empty() {
        let db = Recording::new(vec![]);
        assert!(!row_exists(&db, "customer", 3).await.unwrap());
    }
}
