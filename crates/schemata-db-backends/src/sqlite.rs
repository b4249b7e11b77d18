//! SQLite database backend using `rusqlite`.
//!
//! This module provides the [`SqliteBackend`] which implements the
//! [`DbExecutor`] trait using `rusqlite` wrapped in
//! `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode and foreign keys enabled on open
//! - A Unicode-aware lowercase function for case-insensitive search
//! - In-memory database support via `:memory:` path (great for testing)
//! - Atomic statement batches: metadata writes and DDL commit together
//! - A per-call time budget; timed-out or abandoned calls are interrupted and
//!   rolled back (see [`crate::cancel`])

use crate::cancel::{CallToken, CancelOutcome};
use schemata_core::settings::Settings;
use schemata_core::{SchemataError, SchemataResult};
use schemata_db::executor::{DbExecutor, Statement};
use schemata_db::query::CASEFOLD_FN;
use schemata_db::value::Value;
use schemata_db::Row;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Time budget used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A SQLite database backend.
///
/// Uses `rusqlite` for database access with a `Mutex`-based concurrency
/// model: one call holds the connection at a time. All operations are run
/// via `tokio::task::spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
    /// Interrupts whatever statement is running on `conn`.
    interrupt: Arc<rusqlite::InterruptHandle>,
    /// Budget for each call, measured from submission.
    timeout: Duration,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Registers the scalar functions compiled queries rely on.
///
/// SQLite's own `LOWER` folds ASCII only, so [`CASEFOLD_FN`] lowercases the
/// whole text with Rust's Unicode case mapping. Numbers fold to their text
/// and blobs to `NULL`.
fn register_functions(conn: &rusqlite::Connection) -> SchemataResult<()> {
    use rusqlite::functions::FunctionFlags;
    use rusqlite::types::ValueRef;

    conn.create_scalar_function(
        CASEFOLD_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).to_lowercase()),
                ValueRef::Integer(i) => Some(i.to_string()),
                ValueRef::Real(f) => Some(f.to_string()),
                ValueRef::Null | ValueRef::Blob(_) => None,
            })
        },
    )
    .map_err(|e| SchemataError::DatabaseError(format!("Failed to register {CASEFOLD_FN}: {e}")))
}

impl SqliteBackend {
    /// Opens a new SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> SchemataResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| SchemataError::DatabaseError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SchemataError::DatabaseError(format!("Failed to set pragmas: {e}")))?;
        register_functions(&conn)?;

        let interrupt = Arc::new(conn.get_interrupt_handle());
        tracing::debug!(path = %path.display(), "opened sqlite database");

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> SchemataResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database named by `settings.database` with the configured
    /// statement timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_settings(settings: &Settings) -> SchemataResult<Self> {
        Ok(Self::open(&settings.database.path)?.with_timeout(settings.schemata.statement_timeout()))
    }

    /// Replaces the per-call time budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Returns the per-call time budget.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `op` on the blocking pool under the time budget.
    ///
    /// `op` receives the connection and the call's token; write operations
    /// commit through [`CallToken::finish`]. If the budget expires or the
    /// returned future is dropped, the call is cancelled. A call that had
    /// already finished still delivers its result.
    async fn run<T, F>(&self, operation: &'static str, op: F) -> SchemataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection, &CallToken) -> SchemataResult<T> + Send + 'static,
    {
        let token = CallToken::new(Arc::clone(&self.interrupt));
        let mut guard = token.cancel_on_drop();
        let conn = Arc::clone(&self.conn);
        let worker = token.clone();

        let mut handle = tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            worker.start()?;
            let out = op(&mut conn, &worker)?;
            worker.finish(|| Ok(out))
        });

        let joined = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => match token.cancel() {
                CancelOutcome::Cancelled => {
                    guard.disarm();
                    tracing::warn!(
                        operation,
                        timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                        "backend call timed out; rolled back"
                    );
                    return Err(SchemataError::Timeout(format!(
                        "{operation} exceeded {:?}",
                        self.timeout
                    )));
                }
                CancelOutcome::AlreadyDone => handle.await,
            },
        };
        guard.disarm();
        joined.map_err(|e| SchemataError::InternalError(format!("Task join error: {e}")))?
    }

    /// Binds `Value`s to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> SchemataResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string().as_str()),
                Value::DateTime(dt) => stmt.raw_bind_parameter(idx, dt.to_rfc3339().as_str()),
                Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string().as_str()),
            }
            .map_err(|e| SchemataError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to our generic `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| {
                let val_ref = sqlite_row
                    .get_ref(i)
                    .unwrap_or(rusqlite::types::ValueRef::Null);
                match val_ref {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) | rusqlite::types::ValueRef::Blob(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                }
            })
            .collect();
        Row::new(column_names.to_vec(), values)
    }

    fn execute_on(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> SchemataResult<u64> {
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
        Self::bind_params(&mut stmt, params)?;
        let count = stmt.raw_execute().map_err(map_sqlite_error)?;
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    fn query_on(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> SchemataResult<Vec<Row>> {
        let mut stmt = conn.prepare(sql).map_err(map_sqlite_error)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        Self::bind_params(&mut stmt, params)?;

        let mut raw_rows = stmt.raw_query();
        let mut rows = Vec::new();
        while let Some(row) = raw_rows.next().map_err(map_sqlite_error)? {
            rows.push(Self::convert_row(row, &column_names));
        }
        Ok(rows)
    }
}

/// Maps a `rusqlite` error onto the schemata error taxonomy.
///
/// Unique / primary-key collisions become `Duplicate`, other constraint
/// failures (foreign keys, NOT NULL) become `Constraint`, and an interrupted
/// statement becomes `Cancelled`.
pub fn map_sqlite_error(err: rusqlite::Error) -> SchemataError {
    use rusqlite::ffi;
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let detail = message.clone().unwrap_or_else(|| failure.to_string());
            match failure.code {
                rusqlite::ErrorCode::OperationInterrupted => SchemataError::Cancelled,
                rusqlite::ErrorCode::ConstraintViolation => match failure.extended_code {
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                        SchemataError::Duplicate(detail)
                    }
                    _ => SchemataError::Constraint(detail),
                },
                _ => SchemataError::DatabaseError(detail),
            }
        }
        _ => SchemataError::DatabaseError(err.to_string()),
    }
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> SchemataResult<u64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run("execute", move |conn, token| {
            let tx = conn.transaction().map_err(map_sqlite_error)?;
            let count = Self::execute_on(&tx, &sql, &params)?;
            token.finish(|| tx.commit().map_err(map_sqlite_error))?;
            Ok(count)
        })
        .await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> SchemataResult<Vec<Row>> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run("query", move |conn, _| Self::query_on(conn, &sql, &params))
            .await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> SchemataResult<i64> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.run("insert", move |conn, token| {
            let tx = conn.transaction().map_err(map_sqlite_error)?;
            Self::execute_on(&tx, &sql, &params)?;
            let id = tx.last_insert_rowid();
            token.finish(|| tx.commit().map_err(map_sqlite_error))?;
            Ok(id)
        })
        .await
    }

    async fn atomic(&self, statements: Vec<Statement>) -> SchemataResult<Vec<u64>> {
        self.run("atomic", move |conn, token| {
            let tx = conn.transaction().map_err(map_sqlite_error)?;
            let mut counts = Vec::with_capacity(statements.len());
            for stmt in &statements {
                token.checkpoint()?;
                tracing::debug!(sql = %stmt.sql, "executing");
                let count = Self::execute_on(&tx, &stmt.sql, &stmt.params).inspect_err(|e| {
                    tracing::warn!(sql = %stmt.sql, error = %e, "statement failed; rolling back batch");
                })?;
                if let Some(expected) = stmt.expected_rows {
                    if count != expected {
                        tracing::warn!(sql = %stmt.sql, count, expected, "unexpected row count; rolling back batch");
                        return Err(SchemataError::NotFound(format!(
                            "Expected {expected} affected row(s), got {count}"
                        )));
                    }
                }
                counts.push(count);
            }
            token.finish(|| tx.commit().map_err(map_sqlite_error))?;
            Ok(counts)
        })
        .await
    }

    async fn table_columns(&self, table: &str) -> SchemataResult<Vec<String>> {
        let table = table.to_string();
        self.run("table_columns", move |conn, _| {
            let rows = Self::query_on(
                conn,
                "SELECT name FROM pragma_table_info(?) ORDER BY cid",
                &[Value::String(table)],
            )?;
            rows.iter().map(|r| r.get::<String>("name")).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend_with_users() -> SqliteBackend {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql(
                "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT UNIQUE, age INTEGER)",
                &[],
            )
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.path().to_str(), Some(":memory:"));
        assert_eq!(backend.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_from_settings_uses_timeout() {
        let mut settings = Settings::in_memory();
        settings.schemata.statement_timeout_ms = 250;
        let backend = SqliteBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_query() {
        let backend = backend_with_users().await;
        let id = backend
            .insert_returning_id(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::from(30)],
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let rows = backend
            .query("SELECT name, age FROM users WHERE id = ?", &[Value::Int(id)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get::<i64>("age").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_unicode_lower_function() {
        let backend = SqliteBackend::memory().unwrap();
        let row = backend
            .query_one(
                "SELECT unicode_lower(?) AS text, unicode_lower(?) AS num, unicode_lower(NULL) AS \"nothing\"",
                &[Value::from("ÉCOLE Straße"), Value::Int(42)],
            )
            .await
            .unwrap();
        assert_eq!(row.get::<String>("text").unwrap(), "école straße");
        assert_eq!(row.get::<String>("num").unwrap(), "42");
        assert_eq!(row.get_value("nothing"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_bind_bool_json_and_dates() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE t (b INTEGER, j TEXT, d TEXT)", &[])
            .await
            .unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        backend
            .execute_sql(
                "INSERT INTO t (b, j, d) VALUES (?, ?, ?)",
                &[
                    Value::Bool(true),
                    Value::Json(serde_json::json!(["a", "b"])),
                    Value::Date(date),
                ],
            )
            .await
            .unwrap();
        let row = backend.query_one("SELECT b, j, d FROM t", &[]).await.unwrap();
        assert_eq!(row.get_value("b"), Some(&Value::Int(1)));
        assert_eq!(row.get::<String>("j").unwrap(), "[\"a\",\"b\"]");
        assert_eq!(row.get::<String>("d").unwrap(), "2024-02-29");
    }

    #[tokio::test]
    async fn test_unique_violation_is_duplicate() {
        let backend = backend_with_users().await;
        let insert = "INSERT INTO users (name) VALUES (?)";
        backend.execute_sql(insert, &[Value::from("a")]).await.unwrap();
        let err = backend.execute_sql(insert, &[Value::from("a")]).await.unwrap_err();
        assert!(matches!(err, SchemataError::Duplicate(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_foreign_key_violation_is_constraint() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .atomic(vec![
                Statement::raw("CREATE TABLE parent (id INTEGER PRIMARY KEY)"),
                Statement::raw(
                    "CREATE TABLE child (id INTEGER PRIMARY KEY, \
                     parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE RESTRICT)",
                ),
                Statement::raw("INSERT INTO parent (id) VALUES (1)"),
                Statement::raw("INSERT INTO child (parent_id) VALUES (1)"),
            ])
            .await
            .unwrap();
        let err = backend
            .execute_sql("DELETE FROM parent WHERE id = 1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SchemataError::Constraint(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_atomic_commits_all() {
        let backend = SqliteBackend::memory().unwrap();
        let counts = backend
            .atomic(vec![
                Statement::raw("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"),
                Statement::new("INSERT INTO t (v) VALUES (?)", vec![Value::from("x")]).expect_rows(1),
                Statement::new("INSERT INTO t (v) VALUES (?)", vec![Value::from("y")]),
            ])
            .await
            .unwrap();
        assert_eq!(counts, vec![0, 1, 1]);
        let rows = backend.query("SELECT v FROM t ORDER BY id", &[]).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_atomic_rolls_back_ddl_on_failure() {
        let backend = SqliteBackend::memory().unwrap();
        let err = backend
            .atomic(vec![
                Statement::raw("CREATE TABLE t (id INTEGER PRIMARY KEY)"),
                Statement::raw("INSERT INTO missing (id) VALUES (1)"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, SchemataError::DatabaseError(_)), "{err:?}");
        assert!(backend.table_columns("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_atomic_expected_rows_mismatch_rolls_back() {
        let backend = backend_with_users().await;
        let err = backend
            .atomic(vec![
                Statement::new("INSERT INTO users (name) VALUES (?)", vec![Value::from("z")]),
                Statement::new("UPDATE users SET age = 1 WHERE id = ?", vec![Value::Int(99)])
                    .expect_rows(1),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, SchemataError::NotFound(_)));
        let rows = backend.query("SELECT * FROM users", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_table_columns_in_declaration_order() {
        let backend = backend_with_users().await;
        assert_eq!(
            backend.table_columns("users").await.unwrap(),
            vec!["id", "name", "age"]
        );
        assert!(backend.table_columns("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_column_supported() {
        let backend = backend_with_users().await;
        backend
            .atomic(vec![Statement::raw("ALTER TABLE \"users\" DROP COLUMN \"age\"")])
            .await
            .unwrap();
        assert_eq!(backend.table_columns("users").await.unwrap(), vec!["id", "name"]);
    }
}
