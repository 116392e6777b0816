//! # Ports
//!
//! The interfaces the reconciliation service calls through. Storage
//! adapters (SQLite in `forecourt-db`, in-memory fakes in tests) implement
//! them; nothing in this crate does.
//!
//! ## Boundary
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ReconciliationService                                                │
//! │        │            │                    │                              │
//! │        ▼            ▼                    ▼                              │
//! │   MasterData   TransactionLog      StockRecordStore                     │
//! │   tanks        purchase lines      record_for(tank, date)               │
//! │   products     meter readings      save_record(record, expected)        │
//! │   nozzles      shift ledgers                                            │
//! │        │            │                    │                              │
//! │   ─────┴────────────┴────────────────────┴──────── adapter ────────     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::shift::ShiftLedger;
use crate::types::{DailyStockRecord, FuelProduct, MeterReading, Nozzle, PurchaseLine, Tank};

// =============================================================================
// Store Error
// =============================================================================

/// What an adapter reports back across a port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The write lost a race or would break the stock chain.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage could not be reached or returned something unreadable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience alias for port results.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Ports
// =============================================================================

/// Tanks, products and nozzle-to-tank mapping.
#[async_trait]
pub trait MasterData: Send + Sync {
    async fn tank(&self, tank_id: &str) -> StoreResult<Tank>;

    /// Active tanks, ordered by id.
    async fn active_tanks(&self) -> StoreResult<Vec<Tank>>;

    async fn product(&self, product_id: &str) -> StoreResult<FuelProduct>;

    async fn nozzles_for_tank(&self, tank_id: &str) -> StoreResult<Vec<Nozzle>>;
}

/// Purchases, meter readings and shift ledgers.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Purchase lines invoiced on `date`, any tank.
    async fn purchase_lines_on(&self, date: NaiveDate) -> StoreResult<Vec<PurchaseLine>>;

    /// Meter readings dated `date`, any nozzle.
    async fn meter_readings_on(&self, date: NaiveDate) -> StoreResult<Vec<MeterReading>>;

    /// The ledger for one shift. An empty ledger if nothing was entered.
    async fn shift_ledger(&self, shift_id: &str, employee_id: &str, date: NaiveDate) -> StoreResult<ShiftLedger>;
}

/// Daily stock records.
#[async_trait]
pub trait StockRecordStore: Send + Sync {
    async fn record_for(&self, tank_id: &str, date: NaiveDate) -> StoreResult<Option<DailyStockRecord>>;

    /// Saves (inserts or replaces) the record for its tank and date.
    ///
    /// `expected_opening` is the prior closing stock the record was computed
    /// from, or `None` if it was computed without a prior. The store must
    /// reject the save with [`StoreError::Conflict`] when the stored prior no
    /// longer matches, atomically with the write.
    async fn save_record(&self, record: &DailyStockRecord, expected_opening: Option<Decimal>) -> StoreResult<()>;
}
