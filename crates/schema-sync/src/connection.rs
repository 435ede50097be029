//! Database connection abstraction.
//!
//! The engine only needs to run catalog queries, execute DDL and scope a
//! transaction. [`Connection`] captures exactly that so that any driver (or a
//! test double) can be plugged in. Catalog values are normalized to text at
//! the driver boundary.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, MySql, Row as _, Sqlite, Transaction};

use crate::dialect::Dialect;
use crate::error::{Result, SyncError};

/// One result row, values rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<(String, Option<String>)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.values.push((column.into(), value));
    }

    /// Appends a non-NULL value.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(column, Some(value.into()));
        self
    }

    /// Appends a NULL value.
    #[must_use]
    pub fn with_null(mut self, column: impl Into<String>) -> Self {
        self.push(column, None);
        self
    }

    /// Gets a value by column name, case-insensitively. NULL and missing
    /// columns both yield `None`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_deref())
    }

    /// Gets a value, or `""` when NULL or missing.
    #[must_use]
    pub fn get_or_empty(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }

    /// Interprets a value as a boolean flag (`1`, `true`, `yes`).
    #[must_use]
    pub fn flag(&self, column: &str) -> bool {
        matches!(
            self.get(column).map(str::to_ascii_lowercase).as_deref(),
            Some("1" | "true" | "yes")
        )
    }
}

/// A connection able to introspect and alter one database.
#[async_trait]
pub trait Connection: Send {
    /// Returns the dialect spoken by this connection.
    fn dialect(&self) -> Dialect;

    /// Quotes an identifier for this connection's dialect.
    fn quote(&self, name: &str) -> String {
        self.dialect().adapter().quote_identifier(name)
    }

    /// Runs a query with positional text parameters and returns all rows.
    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<Row>>;

    /// Executes a statement and returns the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Opens a transaction; subsequent statements run inside it.
    async fn begin(&mut self) -> Result<()>;

    /// Commits the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Rolls back the open transaction.
    async fn rollback(&mut self) -> Result<()>;
}

fn already_open() -> SyncError {
    SyncError::Database(sqlx::Error::Protocol(
        "a transaction is already open".to_string(),
    ))
}

/// Connection to a SQLite-like database.
pub struct SqliteConnection {
    pool: SqlitePool,
    tx: Option<Transaction<'static, Sqlite>>,
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("pool", &self.pool)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl SqliteConnection {
    /// Wraps an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, tx: None }
    }

    /// Connects to `url`, creating the database file if missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn decode_sqlite_row(row: &SqliteRow) -> Result<Row> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = if let Ok(text) = row.try_get::<Option<String>, _>(i) {
            text
        } else if let Ok(int) = row.try_get::<Option<i64>, _>(i) {
            int.map(|n| n.to_string())
        } else if let Ok(real) = row.try_get::<Option<f64>, _>(i) {
            real.map(|n| n.to_string())
        } else {
            row.try_get::<Option<Vec<u8>>, _>(i)?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

#[async_trait]
impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind.to_string());
        }
        let rows = match self.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        rows.iter().map(decode_sqlite_row).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let query = sqlx::query(sql);
        let result = match self.tx.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(already_open());
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// Connection to a MySQL-like server.
///
/// DDL commits implicitly on these servers; atomicity of an alter plan comes
/// from rendering it as a single ALTER TABLE statement.
pub struct MySqlConnection {
    pool: MySqlPool,
    tx: Option<Transaction<'static, MySql>>,
}

impl fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("pool", &self.pool)
            .field("in_transaction", &self.tx.is_some())
            .finish()
    }
}

impl MySqlConnection {
    /// Wraps an existing pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool, tx: None }
    }

    /// Connects to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn decode_mysql_row(row: &MySqlRow) -> Result<Row> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let i = column.ordinal();
        let value = if let Ok(text) = row.try_get::<Option<String>, _>(i) {
            text
        } else if let Ok(int) = row.try_get::<Option<i64>, _>(i) {
            int.map(|n| n.to_string())
        } else if let Ok(uint) = row.try_get::<Option<u64>, _>(i) {
            uint.map(|n| n.to_string())
        } else if let Ok(real) = row.try_get::<Option<f64>, _>(i) {
            real.map(|n| n.to_string())
        } else {
            row.try_get::<Option<Vec<u8>>, _>(i)?
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        };
        decoded.push(column.name(), value);
    }
    Ok(decoded)
}

#[async_trait]
impl Connection for MySqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_rows(&mut self, sql: &str, binds: &[&str]) -> Result<Vec<Row>> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(bind.to_string());
        }
        let rows = match self.tx.as_mut() {
            Some(tx) => query.fetch_all(&mut **tx).await?,
            None => query.fetch_all(&self.pool).await?,
        };
        rows.iter().map(decode_mysql_row).collect()
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let query = sqlx::query(sql);
        let result = match self.tx.as_mut() {
            Some(tx) => query.execute(&mut **tx).await?,
            None => query.execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    async fn begin(&mut self) -> Result<()> {
        if self.tx.is_some() {
            return Err(already_open());
        }
        self.tx = Some(self.pool.begin().await?);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_connection() -> SqliteConnection {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteConnection::new(pool)
    }

    #[test]
    fn test_row_lookup() {
        let row = Row::new()
            .with("Field", "id")
            .with("Null", "YES")
            .with("notnull", "1")
            .with_null("Default");

        assert_eq!(row.get("field"), Some("id"));
        assert_eq!(row.get("default"), None);
        assert_eq!(row.get_or_empty("missing"), "");
        assert!(row.flag("notnull"));
        assert!(!row.flag("Field"));
    }

    #[tokio::test]
    async fn test_sqlite_fetch_decodes_text() {
        let mut conn = memory_connection().await;
        let rows = conn
            .fetch_rows("SELECT ? AS name, 42 AS answer, NULL AS nothing, 1.5 AS half", &["x"])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some("x"));
        assert_eq!(rows[0].get("answer"), Some("42"));
        assert_eq!(rows[0].get("nothing"), None);
        assert_eq!(rows[0].get("half"), Some("1.5"));
    }

    #[tokio::test]
    async fn test_sqlite_rollback_discards_ddl() {
        let mut conn = memory_connection().await;

        conn.begin().await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
        assert!(conn.begin().await.is_err());
        conn.rollback().await.unwrap();

        let rows = conn
            .fetch_rows("SELECT name FROM sqlite_master WHERE name = ?", &["t"])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_quote_follows_dialect() {
        struct Fake;
        #[async_trait]
        impl Connection for Fake {
            fn dialect(&self) -> Dialect {
                Dialect::MySql
            }
            async fn fetch_rows(&mut self, _: &str, _: &[&str]) -> Result<Vec<Row>> {
                Ok(Vec::new())
            }
            async fn execute(&mut self, _: &str) -> Result<u64> {
                Ok(0)
            }
            async fn begin(&mut self) -> Result<()> {
                Ok(())
            }
            async fn commit(&mut self) -> Result<()> {
                Ok(())
            }
            async fn rollback(&mut self) -> Result<()> {
                Ok(())
            }
        }

        assert_eq!(Fake.quote("order"), "`order`");
    }
}
