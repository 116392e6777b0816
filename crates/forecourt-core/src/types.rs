//! # Domain Types
//!
//! Master data and transaction records the engine reads, and the daily
//! stock record it produces.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  MASTER DATA (owned elsewhere, read-only here)                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   FuelProduct   │◄──│      Tank       │◄──│     Nozzle      │       │
//! │  │  unit_price     │   │  calibration    │   │  tank_id        │       │
//! │  └─────────────────┘   │  static opening │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  TRANSACTIONS (one per entry)                                           │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │  PurchaseLine   │   │  MeterReading   │                              │
//! │  │  decant_tank_id │   │  nozzle_id      │                              │
//! │  │  quantity       │   │  open / close   │                              │
//! │  │  density        │   │  test quantity  │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  PRODUCED                                                               │
//! │  ┌─────────────────────────────────────────┐                            │
//! │  │  DailyStockRecord (tank × date)         │── closing_stock ──► next   │
//! │  └─────────────────────────────────────────┘     day's opening          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationTable;
use crate::density::DensityObservation;
use crate::money::Money;

// =============================================================================
// Master Data
// =============================================================================

/// A fuel grade sold at the outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuelProduct {
    pub id: String,
    pub name: String,
    /// Selling price per litre.
    pub unit_price: Money,
}

/// An underground storage tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tank {
    pub id: String,
    pub name: String,
    pub product_id: String,
    /// Strapping chart. Always valid (see [`CalibrationTable`]).
    pub calibration: CalibrationTable,
    /// Static opening stock: used as the opening for a date with no prior
    /// record, typically the tank's first reconciled day.
    pub last_known_closing_stock: Decimal,
    /// Inactive tanks are skipped by batch reconciliation.
    pub is_active: bool,
}

/// A dispensing nozzle and the tank it draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nozzle {
    pub id: String,
    pub tank_id: String,
    pub label: String,
}

// =============================================================================
// Transactions
// =============================================================================

/// One product line of a supplier invoice, decanted into one tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseLine {
    pub id: String,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub product_id: String,
    pub decant_tank_id: String,
    pub quantity_liters: Decimal,
    /// Density check taken while decanting, if any.
    pub density: Option<DensityObservation>,
}

/// Totalizer readings for one nozzle over one shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    pub id: String,
    pub nozzle_id: String,
    pub date: NaiveDate,
    pub shift_id: String,
    pub opening_reading: Decimal,
    pub closing_reading: Decimal,
    /// Fuel pumped for calibration tests and returned to the tank.
    pub test_quantity: Decimal,
}

impl MeterReading {
    /// Litres actually sold through this nozzle.
    ///
    /// ```text
    /// net_sale = closing_reading − opening_reading − test_quantity
    /// ```
    #[inline]
    pub fn net_sale(&self) -> Decimal {
        self.closing_reading - self.opening_reading - self.test_quantity
    }
}

// =============================================================================
// Daily Stock Record
// =============================================================================

/// Whether a daily record has its dip reading yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockRecordStatus {
    /// Book figures computed, dip not entered: no variance yet.
    Pending,
    /// Dip entered and variance computed.
    Settled,
}

impl StockRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockRecordStatus::Pending => "pending",
            StockRecordStatus::Settled => "settled",
        }
    }
}

impl std::str::FromStr for StockRecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StockRecordStatus::Pending),
            "settled" => Ok(StockRecordStatus::Settled),
            other => Err(format!("unknown stock record status '{}'", other)),
        }
    }
}

/// One tank's book and physical stock for one business date.
///
/// ## Identities
/// - `total_stock = opening_stock + receipt`
/// - `closing_stock = total_stock - meter_sale`
/// - `variance_liters = dip_volume - closing_stock` (positive = surplus)
///
/// ## Chaining
/// `record(D + 1).opening_stock == record(D).closing_stock`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStockRecord {
    pub id: String,
    pub tank_id: String,
    pub product_id: String,
    pub date: NaiveDate,
    pub opening_stock: Decimal,
    pub receipt: Decimal,
    pub meter_sale: Decimal,
    pub total_stock: Decimal,
    pub closing_stock: Decimal,
    pub dip_cm: Option<Decimal>,
    pub dip_volume: Option<Decimal>,
    pub variance_liters: Option<Decimal>,
    pub variance_amount: Option<Money>,
    /// Price the variance was valued at (frozen for audit).
    pub unit_price: Money,
    pub status: StockRecordStatus,
}

impl DailyStockRecord {
    /// `true` once a dip has been entered and the variance computed.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.status == StockRecordStatus::Settled
    }
}

/// ID of the record for `tank_id` on `date`.
///
/// Deterministic so that re-reconciling a tank-day replaces the same record.
pub fn stock_record_id(tank_id: &str, date: NaiveDate) -> String {
    format!("{}@{}", tank_id, date.format("%Y-%m-%d"))
}

// =============================================================================
// Unit Tests
// =============================================================================
