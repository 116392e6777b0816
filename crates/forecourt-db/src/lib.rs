//! # forecourt-db: SQLite Adapter for Forecourt
//!
//! This crate stores Forecourt's master data, transactions and daily stock
//! records in SQLite, and implements `forecourt-core`'s ports on top.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Forecourt Data Flow                              │
//! │                                                                         │
//! │  ReconciliationService (forecourt-core)                                │
//! │       │  MasterData / TransactionLog / StockRecordStore                │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  forecourt-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ MasterRepo     │    │ 001_initial  │  │   │
//! │  │   │ SqlitePool    │◄───│ TransactionRepo│    │   _schema    │  │   │
//! │  │   │ port impls    │    │ ShiftLedgerRepo│    │              │  │   │
//! │  │   │ (ports.rs)    │    │ StockRecordRepo│    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │              <config dir>/forecourt/forecourt.db               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories (master data, transactions, shifts, stock)
//! - [`ports`] - `forecourt-core` port implementations for [`Database`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use forecourt_core::ReconciliationService;
//! use forecourt_db::{Database, DbConfig};
//!
//! let db = Arc::new(Database::open(DbConfig::new("forecourt.db")).await?);
//! let service = ReconciliationService::new(db.clone(), db.clone(), db);
//! let report = service.reconcile_day(date, &dips, true).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod ports;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::master::MasterRepository;
pub use repository::shift::ShiftLedgerRepository;
pub use repository::stock::StockRecordRepository;
pub use repository::transaction::TransactionRepository;
