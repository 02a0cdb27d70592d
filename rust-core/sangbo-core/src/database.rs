//! # Database Module
//!
//! Async database connectivity with SQLx for PostgreSQL and SQLite.
//!
//! Queries take positional parameters as [`DbValue`]s (`?` for SQLite,
//! `$1`.. for PostgreSQL) and return rows as column-name maps.

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Postgres, Row, Sqlite, Transaction, TypeInfo, ValueRef};
use std::collections::HashMap;
use tracing::{debug, info};

/// A row keyed by column name
pub type DbRow = HashMap<String, DbValue>;

const DEFAULT_POOL_SIZE: u32 = 10;

fn query_error(e: &sqlx::Error) -> Error {
    Error::Database {
        message: format!("Query error: {e}"),
    }
}

macro_rules! bind_params {
    ($db:ty, $sql:expr, $params:expr) => {{
        let mut query = sqlx::query::<$db>($sql);
        for param in $params {
            query = match param {
                DbValue::Null => query.bind(None::<String>),
                DbValue::Int(v) => query.bind(*v),
                DbValue::Float(v) => query.bind(*v),
                DbValue::String(v) => query.bind(v.as_str()),
                DbValue::Bool(v) => query.bind(*v),
                DbValue::Bytes(v) => query.bind(v.as_slice()),
            };
        }
        query
    }};
}

/// Database connection pool supporting multiple backends
#[derive(Clone)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl std::fmt::Debug for DatabasePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Sqlite(_) => "DatabasePool::Sqlite",
            Self::Postgres(_) => "DatabasePool::Postgres",
        })
    }
}

impl DatabasePool {
    /// Connect using the driver named by the URL scheme
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for an unknown scheme and `Error::Database`
    /// if the connection fails.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config.url.as_str();
        if url.starts_with("sqlite:") {
            Self::connect_sqlite(url, config.max_connections).await
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url, config.max_connections).await
        } else {
            Err(Error::Config {
                message: format!("unsupported database url scheme: {url}"),
            })
        }
    }

    /// Connect to a SQLite database (e.g., "sqlite:app.db" or "sqlite::memory:")
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection fails.
    pub async fn connect_sqlite(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("SQLite connection failed: {e}"),
            })?;

        info!("SQLite pool connected");
        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection fails.
    pub async fn connect_postgres(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        info!("PostgreSQL pool connected");
        Ok(Self::Postgres(pool))
    }

    /// Execute a statement and return the number of affected rows
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the statement fails.
    pub async fn execute(&self, query: &str, params: &[DbValue]) -> Result<u64> {
        debug!(sql = %query, params = params.len(), "execute");
        let affected = match self {
            Self::Sqlite(pool) => bind_params!(Sqlite, query, params)
                .execute(pool)
                .await
                .map_err(|e| query_error(&e))?
                .rows_affected(),
            Self::Postgres(pool) => bind_params!(Postgres, query, params)
                .execute(pool)
                .await
                .map_err(|e| query_error(&e))?
                .rows_affected(),
        };
        Ok(affected)
    }

    /// Run an INSERT and return the new row id where the backend reports one
    ///
    /// SQLite reports `last_insert_rowid`; PostgreSQL reports the first
    /// column of a `RETURNING` clause.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the statement fails.
    pub async fn insert(&self, query: &str, params: &[DbValue]) -> Result<Option<i64>> {
        debug!(sql = %query, params = params.len(), "insert");
        match self {
            Self::Sqlite(pool) => {
                let result = bind_params!(Sqlite, query, params)
                    .execute(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(Some(result.last_insert_rowid()))
            }
            Self::Postgres(pool) => {
                let row: Option<PgRow> = bind_params!(Postgres, query, params)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(row.and_then(|r| r.try_get::<i64, _>(0).ok()))
            }
        }
    }

    /// Fetch all rows
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_all(&self, query: &str, params: &[DbValue]) -> Result<Vec<DbRow>> {
        match self {
            Self::Sqlite(pool) => {
                let rows: Vec<SqliteRow> = bind_params!(Sqlite, query, params)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(rows.iter().map(sqlite_row_to_map).collect())
            }
            Self::Postgres(pool) => {
                let rows: Vec<PgRow> = bind_params!(Postgres, query, params)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(rows.iter().map(pg_row_to_map).collect())
            }
        }
    }

    /// Fetch a single row (optional)
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_optional(&self, query: &str, params: &[DbValue]) -> Result<Option<DbRow>> {
        match self {
            Self::Sqlite(pool) => {
                let row: Option<SqliteRow> = bind_params!(Sqlite, query, params)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(row.as_ref().map(sqlite_row_to_map))
            }
            Self::Postgres(pool) => {
                let row: Option<PgRow> = bind_params!(Postgres, query, params)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(row.as_ref().map(pg_row_to_map))
            }
        }
    }

    /// Fetch exactly one row
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails or returns no row.
    pub async fn fetch_one(&self, query: &str, params: &[DbValue]) -> Result<DbRow> {
        self.fetch_optional(query, params)
            .await?
            .ok_or_else(|| Error::Database {
                message: "Query returned no rows".to_string(),
            })
    }

    /// First column of the first row
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_column(&self, query: &str, params: &[DbValue]) -> Result<Option<DbValue>> {
        match self {
            Self::Sqlite(pool) => {
                let row: Option<SqliteRow> = bind_params!(Sqlite, query, params)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(row.as_ref().and_then(|r| r.columns().first().map(|c| sqlite_value(r, c))))
            }
            Self::Postgres(pool) => {
                let row: Option<PgRow> = bind_params!(Postgres, query, params)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(row.as_ref().and_then(|r| r.columns().first().map(|c| pg_value(r, c))))
            }
        }
    }

    /// Start a transaction
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if no connection can be acquired.
    pub async fn begin(&self) -> Result<DbTransaction> {
        let tx = match self {
            Self::Sqlite(pool) => {
                DbTransaction::Sqlite(pool.begin().await.map_err(|e| query_error(&e))?)
            }
            Self::Postgres(pool) => {
                DbTransaction::Postgres(pool.begin().await.map_err(|e| query_error(&e))?)
            }
        };
        debug!("transaction started");
        Ok(tx)
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}

/// An open transaction; dropped without `commit` it rolls back
pub enum DbTransaction {
    /// SQLite transaction
    Sqlite(Transaction<'static, Sqlite>),
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
}

impl DbTransaction {
    /// Execute a statement inside the transaction
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the statement fails.
    pub async fn execute(&mut self, query: &str, params: &[DbValue]) -> Result<u64> {
        let affected = match self {
            Self::Sqlite(tx) => bind_params!(Sqlite, query, params)
                .execute(&mut **tx)
                .await
                .map_err(|e| query_error(&e))?
                .rows_affected(),
            Self::Postgres(tx) => bind_params!(Postgres, query, params)
                .execute(&mut **tx)
                .await
                .map_err(|e| query_error(&e))?
                .rows_affected(),
        };
        Ok(affected)
    }

    /// Fetch rows inside the transaction
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the query fails.
    pub async fn fetch_all(&mut self, query: &str, params: &[DbValue]) -> Result<Vec<DbRow>> {
        match self {
            Self::Sqlite(tx) => {
                let rows: Vec<SqliteRow> = bind_params!(Sqlite, query, params)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(rows.iter().map(sqlite_row_to_map).collect())
            }
            Self::Postgres(tx) => {
                let rows: Vec<PgRow> = bind_params!(Postgres, query, params)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| query_error(&e))?;
                Ok(rows.iter().map(pg_row_to_map).collect())
            }
        }
    }

    /// Commit
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the commit fails.
    pub async fn commit(self) -> Result<()> {
        match self {
            Self::Sqlite(tx) => tx.commit().await,
            Self::Postgres(tx) => tx.commit().await,
        }
        .map_err(|e| query_error(&e))
    }

    /// Roll back
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the rollback fails.
    pub async fn rollback(self) -> Result<()> {
        match self {
            Self::Sqlite(tx) => tx.rollback().await,
            Self::Postgres(tx) => tx.rollback().await,
        }
        .map_err(|e| query_error(&e))
    }
}

/// Database value: bound parameter or fetched column
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DbValue {
    /// Null value
    Null,
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Binary data
    Bytes(Vec<u8>),
}

impl DbValue {
    /// Integer view, if this is an integer
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String view, if this is text
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for DbValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

fn sqlite_value(row: &SqliteRow, column: &sqlx::sqlite::SqliteColumn) -> DbValue {
    let i = column.ordinal();
    // SQLite decodes NULL as the zero value of the requested type
    if row.try_get_raw(i).map_or(true, |v| v.is_null()) {
        return DbValue::Null;
    }
    match column.type_info().name() {
        "INTEGER" => row.try_get::<i64, _>(i).map_or(DbValue::Null, DbValue::Int),
        "REAL" => row.try_get::<f64, _>(i).map_or(DbValue::Null, DbValue::Float),
        "TEXT" => row.try_get::<String, _>(i).map_or(DbValue::Null, DbValue::String),
        "BLOB" => row.try_get::<Vec<u8>, _>(i).map_or(DbValue::Null, DbValue::Bytes),
        "BOOLEAN" => row.try_get::<bool, _>(i).map_or(DbValue::Null, DbValue::Bool),
        // expression columns carry no declared type
        _ => row
            .try_get::<i64, _>(i)
            .map(DbValue::Int)
            .or_else(|_| row.try_get::<f64, _>(i).map(DbValue::Float))
            .or_else(|_| row.try_get::<String, _>(i).map(DbValue::String))
            .unwrap_or(DbValue::Null),
    }
}

fn pg_value(row: &PgRow, column: &sqlx::postgres::PgColumn) -> DbValue {
    let i = column.ordinal();
    if row.try_get_raw(i).map_or(true, |v| v.is_null()) {
        return DbValue::Null;
    }
    match column.type_info().name() {
        "INT2" => row.try_get::<i16, _>(i).map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))),
        "INT4" => row.try_get::<i32, _>(i).map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))),
        "INT8" => row.try_get::<i64, _>(i).map_or(DbValue::Null, DbValue::Int),
        "FLOAT4" => row
            .try_get::<f32, _>(i)
            .map_or(DbValue::Null, |v| DbValue::Float(f64::from(v))),
        "FLOAT8" => row.try_get::<f64, _>(i).map_or(DbValue::Null, DbValue::Float),
        "BOOL" => row.try_get::<bool, _>(i).map_or(DbValue::Null, DbValue::Bool),
        "BYTEA" => row.try_get::<Vec<u8>, _>(i).map_or(DbValue::Null, DbValue::Bytes),
        _ => row.try_get::<String, _>(i).map_or(DbValue::Null, DbValue::String),
    }
}

fn sqlite_row_to_map(row: &SqliteRow) -> DbRow {
    row.columns()
        .iter()
        .map(|c| (c.name().to_string(), sqlite_value(row, c)))
        .collect()
}

fn pg_row_to_map(row: &PgRow) -> DbRow {
    row.columns()
        .iter()
        .map(|c| (c.name().to_string(), pg_value(row, c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> DatabasePool {
        DatabasePool::connect_sqlite("sqlite::memory:", Some(1))
            .await
            .unwrap()
    }

    async fn users_pool() -> DatabasePool {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL)", &[])
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_connect_by_scheme() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        };
        assert!(matches!(DatabasePool::connect(&config).await, Ok(DatabasePool::Sqlite(_))));

        let config = DatabaseConfig {
            url: "mysql://localhost/db".to_string(),
            max_connections: None,
        };
        assert!(matches!(DatabasePool::connect(&config).await, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_insert_returns_rowid() {
        let pool = users_pool().await;
        let first = pool
            .insert("INSERT INTO users (name, score) VALUES (?, ?)", &["Alice".into(), 1.5.into()])
            .await
            .unwrap();
        let second = pool
            .insert("INSERT INTO users (name, score) VALUES (?, ?)", &["Bob".into(), DbValue::Null])
            .await
            .unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[tokio::test]
    async fn test_fetch_with_params() {
        let pool = users_pool().await;
        for name in ["Alice", "Bob", "Carol"] {
            pool.execute("INSERT INTO users (name) VALUES (?)", &[name.into()])
                .await
                .unwrap();
        }

        let rows = pool
            .fetch_all("SELECT * FROM users WHERE id > ? ORDER BY id", &[1_i64.into()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"].as_str(), Some("Bob"));
        assert_eq!(rows[0]["score"], DbValue::Null);

        let row = pool
            .fetch_one("SELECT name FROM users WHERE id = ?", &[3_i64.into()])
            .await
            .unwrap();
        assert_eq!(row["name"], DbValue::String("Carol".to_string()));

        let missing = pool
            .fetch_optional("SELECT name FROM users WHERE id = ?", &[99_i64.into()])
            .await
            .unwrap();
        assert!(missing.is_none());
        assert!(pool.fetch_one("SELECT name FROM users WHERE id = 99", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_column() {
        let pool = users_pool().await;
        pool.execute("INSERT INTO users (name) VALUES ('a'), ('b')", &[])
            .await
            .unwrap();

        let count = pool.fetch_column("SELECT COUNT(*) FROM users", &[]).await.unwrap();
        assert_eq!(count.and_then(|v| v.as_int()), Some(2));
    }

    #[tokio::test]
    async fn test_execute_rows_affected() {
        let pool = users_pool().await;
        pool.execute("INSERT INTO users (name) VALUES ('a'), ('b'), ('c')", &[])
            .await
            .unwrap();
        let affected = pool
            .execute("UPDATE users SET score = ? WHERE id <= ?", &[2.0.into(), 2_i64.into()])
            .await
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let pool = users_pool().await;

        let mut tx = pool.begin().await.unwrap();
        tx.execute("INSERT INTO users (name) VALUES (?)", &["kept".into()])
            .await
            .unwrap();
        assert_eq!(tx.fetch_all("SELECT * FROM users", &[]).await.unwrap().len(), 1);
        tx.commit().await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        tx.execute("INSERT INTO users (name) VALUES (?)", &["dropped".into()])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let rows = pool.fetch_all("SELECT name FROM users", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"].as_str(), Some("kept"));
    }

    #[tokio::test]
    async fn test_query_error_is_database_error() {
        let pool = memory_pool().await;
        let err = pool.execute("SELECT * FROM nope", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Database { .. }));
        assert_eq!(err.code(), 503);
    }

    #[tokio::test]
    async fn test_null_columns_stay_null() {
        let pool = memory_pool().await;
        pool.execute("CREATE TABLE t (n INTEGER, r REAL, s TEXT, b BLOB)", &[])
            .await
            .unwrap();
        pool.execute("INSERT INTO t (n, r, s, b) VALUES (NULL, NULL, NULL, NULL)", &[])
            .await
            .unwrap();
        pool.execute("INSERT INTO t (n, r, s, b) VALUES (0, 0.0, '', NULL)", &[])
            .await
            .unwrap();

        let rows = pool.fetch_all("SELECT n, r, s, b FROM t ORDER BY rowid", &[]).await.unwrap();
        for column in ["n", "r", "s", "b"] {
            assert_eq!(rows[0][column], DbValue::Null, "column {column}");
        }
        assert_eq!(rows[1]["n"], DbValue::Int(0));
        assert_eq!(rows[1]["r"], DbValue::Float(0.0));
        assert_eq!(rows[1]["s"], DbValue::String(String::new()));

        let expr = pool.fetch_one("SELECT NULL AS x, 1 + 1 AS y", &[]).await.unwrap();
        assert_eq!(expr["x"], DbValue::Null);
        assert_eq!(expr["y"], DbValue::Int(2));
    }

    #[test]
    fn test_db_value_from() {
        assert_eq!(DbValue::from(Some(3_i64)), DbValue::Int(3));
        assert_eq!(DbValue::from(None::<&str>), DbValue::Null);
        assert_eq!(DbValue::from("x").as_str(), Some("x"));
    }
}
