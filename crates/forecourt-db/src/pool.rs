//! # Connection Pool
//!
//! Opens the outlet database and hands out repositories.
//!
//! ## Connection Settings
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  File database (back office)                                            │
//! │  ├── journal_mode = WAL      readers don't block the settling writer   │
//! │  ├── synchronous  = NORMAL                                              │
//! │  ├── foreign_keys = ON       nozzles/readings must point at real rows   │
//! │  ├── busy_timeout            two clerks settling at once wait, not fail │
//! │  └── created on first open                                              │
//! │                                                                         │
//! │  In-memory database (tests)                                             │
//! │  └── exactly one connection, never recycled: the data lives in it       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations::{self, MigrationStatus};
use crate::repository::master::MasterRepository;
use crate::repository::shift::ShiftLedgerRepository;
use crate::repository::stock::StockRecordRepository;
use crate::repository::transaction::TransactionRepository;

// =============================================================================
// Configuration
// =============================================================================

/// Where the outlet database lives and how it is opened.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/forecourt/forecourt.db")
///     .max_connections(4)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// `None` for a private in-memory database.
    pub path: Option<PathBuf>,

    /// Default: 5. Always 1 in memory.
    pub max_connections: u32,

    /// How long to wait for a free connection. Default: 30 seconds
    pub acquire_timeout: Duration,

    /// How long a writer waits on SQLite's lock. Default: 5 seconds
    pub busy_timeout: Duration,

    /// Apply embedded migrations on open. Default: true
    pub migrate: bool,
}

impl DbConfig {
    /// A database file at `path`, created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: Some(path.into()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A fresh in-memory database, private to one pool.
    pub fn in_memory() -> Self {
        DbConfig {
            path: None,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            migrate: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn migrate(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = match &self.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
            None => SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?,
        };

        Ok(options.foreign_keys(true).busy_timeout(self.busy_timeout))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);
        match self.path {
            Some(_) => options.max_connections(self.max_connections.max(1)),
            None => options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Handle to the outlet database.
///
/// Clones share one pool. `Database` also implements the `forecourt-core`
/// ports, so a single handle can back a `ReconciliationService`.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the database and, unless disabled, brings the schema current.
    pub async fn open(config: DbConfig) -> DbResult<Self> {
        match &config.path {
            Some(path) => info!(path = %path.display(), "Opening outlet database"),
            None => info!("Opening in-memory database"),
        }

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!(max_connections = config.max_connections, "Pool ready");

        let db = Database { pool };
        if config.migrate {
            migrations::run_migrations(&db.pool).await?;
        }

        Ok(db)
    }

    /// Applied vs. embedded migrations.
    pub async fn schema_status(&self) -> DbResult<MigrationStatus> {
        migrations::migration_status(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Products, tanks and nozzles.
    pub fn master(&self) -> MasterRepository {
        MasterRepository::new(self.pool.clone())
    }

    /// Purchase lines and meter readings.
    pub fn transactions(&self) -> TransactionRepository {
        TransactionRepository::new(self.pool.clone())
    }

    pub fn shift_ledgers(&self) -> ShiftLedgerRepository {
        ShiftLedgerRepository::new(self.pool.clone())
    }

    pub fn stock_records(&self) -> StockRecordRepository {
        StockRecordRepository::new(self.pool.clone())
    }

    /// Waits for in-flight queries, then closes every connection.
    pub async fn close(&self) {
        debug!("Closing outlet database");
        self.pool.close().await;
    }

    /// `true` if a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        let status = db.schema_status().await.unwrap();
        assert!(status.is_current());
        assert_eq!(status.total, 1);
    }

    #[tokio::test]
    async fn test_unmigrated_database_reports_zero() {
        let db = Database::open(DbConfig::in_memory().migrate(false)).await.unwrap();

        let status = db.schema_status().await.unwrap();
        assert_eq!(status.applied, 0);
        assert!(!status.is_current());
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_isolated() {
        let first = Database::open(DbConfig::in_memory()).await.unwrap();
        let second = Database::open(DbConfig::in_memory()).await.unwrap();

        sqlx::query("INSERT INTO fuel_products (id, name, unit_price_cents) VALUES ('MS', 'Petrol', 10000)")
            .execute(first.pool())
            .await
            .unwrap();

        assert_eq!(first.master().get_product("MS").await.unwrap().map(|p| p.name), Some("Petrol".to_string()));
        assert!(second.master().get_product("MS").await.unwrap().is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/tmp/forecourt.db")
            .max_connections(10)
            .busy_timeout(Duration::from_secs(2));

        assert_eq!(config.path, Some(PathBuf::from("/tmp/forecourt.db")));
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.busy_timeout, Duration::from_secs(2));
        assert!(config.migrate);
        assert_eq!(DbConfig::in_memory().path, None);
    }
}
