//! Database abstraction layer
//!
//! This module provides the SQLite connection pool, versioned migrations, and
//! transaction entry points shared by every crate that touches persistent state.

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Error as SqlxError, Sqlite, SqlitePool, Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Database error types
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error
    #[error("Database error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored value could not be mapped back into its domain type
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl DatabaseError {
    /// Whether this error is a unique-constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            DatabaseError::Sqlx(SqlxError::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

/// Result type for database operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Maximum number of connections in pool
    pub max_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
    /// Enable WAL mode
    pub wal_mode: bool,
    /// Synchronous mode
    pub synchronous: SynchronousMode,
}

/// SQLite synchronous mode
#[derive(Debug, Clone, Copy)]
pub enum SynchronousMode {
    /// Off - no synchronization
    Off,
    /// Normal - synchronize at critical moments
    Normal,
    /// Full - synchronize after each write
    Full,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "threadline.db".to_string(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            wal_mode: true,
            synchronous: SynchronousMode::Normal,
        }
    }
}

impl DatabaseConfig {
    /// Create a new database configuration
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set busy timeout
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable WAL mode
    pub fn wal_mode(mut self, enabled: bool) -> Self {
        self.wal_mode = enabled;
        self
    }

    /// Set synchronous mode
    pub fn synchronous(mut self, mode: SynchronousMode) -> Self {
        self.synchronous = mode;
        self
    }
}

/// SQLite database handle
///
/// Cheap to share behind an `Arc`; every service in the workspace borrows the
/// pool from here and opens its own transactions.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Create a new SQLite database with configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))
            .map_err(|e| DatabaseError::Config(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        if config.wal_mode {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        options = match config.synchronous {
            SynchronousMode::Off => options.synchronous(SqliteSynchronous::Off),
            SynchronousMode::Normal => options.synchronous(SqliteSynchronous::Normal),
            SynchronousMode::Full => options.synchronous(SqliteSynchronous::Full),
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %config.path, "opened sqlite pool");

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing)
    ///
    /// The pool is pinned to a single connection that never expires, since each
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DatabaseError::Config(e.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction
    ///
    /// Dropping the returned transaction without committing rolls it back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Execute a raw SQL statement without parameters
    pub async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Run migrations
    pub async fn migrate(&self, migrations: &[MigrationDefinition]) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                checksum TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let current_version = self.current_version().await?;

        for migration in migrations {
            if migration.version <= current_version {
                let recorded: Option<String> =
                    sqlx::query_scalar("SELECT checksum FROM _migrations WHERE version = ?")
                        .bind(migration.version)
                        .fetch_optional(&self.pool)
                        .await?;

                if let Some(checksum) = recorded {
                    if checksum != migration.checksum {
                        return Err(DatabaseError::Migration(format!(
                            "checksum mismatch for applied migration {} ({})",
                            migration.version, migration.description
                        )));
                    }
                }
                continue;
            }

            tracing::info!(
                "Applying migration {} - {}",
                migration.version,
                migration.description
            );

            let mut tx = self.pool.begin().await?;

            sqlx::query(&migration.sql).execute(&mut *tx).await?;

            sqlx::query("INSERT INTO _migrations (version, description, checksum) VALUES (?, ?, ?)")
                .bind(migration.version)
                .bind(&migration.description)
                .bind(&migration.checksum)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;

            tracing::info!("Migration {} applied successfully", migration.version);
        }

        Ok(())
    }

    /// Get current migration version
    pub async fn current_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await?;

        Ok(version.unwrap_or(0))
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Check if the database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

/// Migration definition
#[derive(Debug, Clone)]
pub struct MigrationDefinition {
    /// Migration version number
    pub version: i64,
    /// Migration description
    pub description: String,
    /// SQL to execute (a single statement)
    pub sql: String,
    /// Checksum for verification
    pub checksum: String,
}

impl MigrationDefinition {
    /// Create a new migration definition
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let checksum = format!("{:x}", md5::compute(&sql));

        Self {
            version,
            description: description.into(),
            sql,
            checksum,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_database_creation() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_transaction_rollback_on_drop() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        {
            let mut tx = db.begin().await.unwrap();
            sqlx::query("INSERT INTO test (name) VALUES ('alice')")
                .execute(&mut *tx)
                .await
                .unwrap();
        }

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM test")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        sqlx::query("INSERT INTO test (name) VALUES ('alice')")
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let row = sqlx::query("SELECT name FROM test")
            .fetch_one(db.pool())
            .await
            .unwrap();
        let name: String = row.get("name");
        assert_eq!(name, "alice");
    }

    #[tokio::test]
    async fn test_migrations() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        let migrations = vec![
            MigrationDefinition::new(
                1,
                "Initial schema",
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
            ),
            MigrationDefinition::new(2, "Add email column", "ALTER TABLE users ADD COLUMN email TEXT"),
        ];

        db.migrate(&migrations).await.unwrap();
        assert_eq!(db.current_version().await.unwrap(), 2);

        // Run again - should be idempotent
        db.migrate(&migrations).await.unwrap();
        assert_eq!(db.current_version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_migration_checksum_mismatch() {
        let db = SqliteDatabase::in_memory().await.unwrap();

        db.migrate(&[MigrationDefinition::new(
            1,
            "Initial schema",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)",
        )])
        .await
        .unwrap();

        let edited = [MigrationDefinition::new(
            1,
            "Initial schema",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, handle TEXT)",
        )];
        let result = db.migrate(&edited).await;
        assert!(matches!(result, Err(DatabaseError::Migration(_))));
    }

    #[tokio::test]
    async fn test_unique_violation_detection() {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.execute("CREATE TABLE test (name TEXT UNIQUE)").await.unwrap();
        db.execute("INSERT INTO test (name) VALUES ('a')").await.unwrap();

        let err = db.execute("INSERT INTO test (name) VALUES ('a')").await.unwrap_err();
        assert!(err.is_unique_violation());
        assert!(!DatabaseError::Config("x".into()).is_unique_violation());
    }

    #[tokio::test]
    async fn test_file_database_with_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let config = DatabaseConfig::new(path.to_string_lossy()).max_connections(2);

        let db = SqliteDatabase::new(config).await.unwrap();
        assert!(db.health_check().await.is_ok());
        db.close().await;
    }

    #[test]
    fn test_config_builder() {
        let config = DatabaseConfig::new("test.db")
            .max_connections(5)
            .connect_timeout(Duration::from_secs(10))
            .busy_timeout(Duration::from_secs(1))
            .wal_mode(false)
            .synchronous(SynchronousMode::Full);

        assert_eq!(config.path, "test.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert!(!config.wal_mode);
        assert!(matches!(config.synchronous, SynchronousMode::Full));
    }
}
