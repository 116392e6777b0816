//! # Database Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sqlx::Error                                                            │
//! │   ├── RowNotFound ─────────────────────► NotFound                       │
//! │   ├── Database(kind = unique) ─────────► Duplicate          ┐           │
//! │   ├── Database(kind = foreign key) ────► MissingReference   │ rejected  │
//! │   ├── Database(kind = check/not null) ─► Rejected           ┘ writes    │
//! │   ├── Database(SQLITE_BUSY/LOCKED) ────► Busy                           │
//! │   ├── PoolTimedOut ────────────────────► Busy                           │
//! │   └── anything else ───────────────────► Query / Connection             │
//! │                                                                         │
//! │  Raised here, not by sqlx: ChainConflict, InvalidData                   │
//! │                                                                         │
//! │  DbError ──► StoreError (what the reconciliation service sees)          │
//! │   NotFound ─────────────────► NotFound                                  │
//! │   ChainConflict, Duplicate ─► Conflict                                  │
//! │   the rest ─────────────────► Unavailable                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use forecourt_core::StoreError;
use rust_decimal::Decimal;
use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLite primary result codes for a writer that could not get the lock.
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// e.g. a second meter reading for the same nozzle, date and shift.
    #[error("already recorded ({constraint})")]
    Duplicate { constraint: String },

    /// e.g. a nozzle pointing at a tank that does not exist.
    #[error("refers to a missing record: {0}")]
    MissingReference(String),

    /// A CHECK or NOT NULL constraint refused the row.
    #[error("rejected by the schema ({constraint})")]
    Rejected { constraint: String },

    /// The stored prior closing stock no longer matches the one a record
    /// was computed from.
    ///
    /// ```text
    /// Operator A: load 03-01 closing (5000) ──► compute 03-02 ──┐
    /// Operator B: re-settle 03-01, closing now 4950              │
    ///                                                            ▼
    ///                            save 03-02 (expected 5000) ──► ChainConflict
    /// ```
    #[error("stock chain changed for tank {tank_id} on {date}: expected prior closing {expected:?}, found {found:?}")]
    ChainConflict {
        tank_id: String,
        date: NaiveDate,
        expected: Option<Decimal>,
        found: Option<Decimal>,
    },

    /// A stored value could not be turned back into a domain value, or a
    /// domain value failed validation before being written.
    #[error("Invalid {column}: {reason}")]
    InvalidData { column: String, reason: String },

    /// Another writer holds the database, or no connection freed up in time.
    #[error("database busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid(column: impl Into<String>, reason: impl ToString) -> Self {
        DbError::InvalidData {
            column: column.into(),
            reason: reason.to_string(),
        }
    }

    /// `true` when retrying the same write later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::ChainConflict { .. })
    }
}

/// "UNIQUE constraint failed: meter_readings.nozzle_id, ..." → the part after the colon.
fn constraint_detail(message: &str) -> String {
    message
        .split_once(": ")
        .map(|(_, detail)| detail)
        .unwrap_or(message)
        .to_string()
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "unknown"),

            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                let primary_code = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| (code & 0xff).to_string());

                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::Duplicate {
                        constraint: constraint_detail(message),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::MissingReference(message.to_string()),
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => DbError::Rejected {
                        constraint: constraint_detail(message),
                    },
                    _ if matches!(primary_code.as_deref(), Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) => {
                        DbError::Busy(message.to_string())
                    }
                    _ => DbError::QueryFailed(message.to_string()),
                }
            }

            sqlx::Error::PoolTimedOut => DbError::Busy("no connection available".to_string()),

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),

            other => DbError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            DbError::ChainConflict { .. } | DbError::Duplicate { .. } => StoreError::Conflict(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
