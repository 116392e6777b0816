//! # forecourt-core: Stock Reconciliation & Cash Settlement
//!
//! This crate is the **heart** of Forecourt. It turns dip readings, meter
//! readings, purchases and shift ledgers into stock variances and cash
//! shortages, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Forecourt Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    forecourt CLI                                │   │
//! │  │    reconcile ──► shift ──► volume ──► density                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ forecourt-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐ ┌───────────┐ ┌───────────┐ ┌────────────┐   │   │
//! │  │   │calibration │ │  density  │ │   stock   │ │   shift    │   │   │
//! │  │   │ dip → L    │ │ ρ → ρ15   │ │ variance  │ │ shortage   │   │   │
//! │  │   └────────────┘ └───────────┘ └───────────┘ └────────────┘   │   │
//! │  │          service ──► ports (traits only)                       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ implements ports                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 forecourt-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`calibration`] - Dip-to-volume interpolation over a strapping chart
//! - [`density`] - Density correction to 15 °C
//! - [`stock`] - Daily per-tank stock reconciliation
//! - [`shift`] - Shift cash settlement
//! - [`types`] - Domain types (Tank, MeterReading, DailyStockRecord, etc.)
//! - [`money`] - Money type with integer arithmetic, quantity rounding
//! - [`validation`] - Boundary checks
//! - [`ports`] - Storage traits the service calls through
//! - [`service`] - Orchestration over the ports
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: every reconciler is deterministic
//! 2. **No I/O**: storage sits behind [`ports`]; prior-day state is passed in
//! 3. **Integer Money, Decimal Litres**: cents as i64, quantities as `Decimal`
//! 4. **Explicit Errors**: typed, local to one tank/date or shift
//!
//! ## Example Usage
//!
//! ```rust
//! use forecourt_core::calibration::{CalibrationPoint, CalibrationTable};
//! use rust_decimal_macros::dec;
//!
//! let table = CalibrationTable::new(vec![
//!     CalibrationPoint::new(dec!(0), dec!(0)),
//!     CalibrationPoint::new(dec!(50), dec!(5000)),
//!     CalibrationPoint::new(dec!(100), dec!(9500)),
//! ])
//! .unwrap();
//!
//! assert_eq!(table.volume_for_dip(dec!(75)).unwrap(), dec!(7250));
//! assert!(table.volume_for_dip(dec!(150)).is_err());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calibration;
pub mod density;
pub mod error;
pub mod money;
pub mod ports;
pub mod service;
pub mod shift;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use forecourt_core::Money` instead of
// `use forecourt_core::money::Money`

pub use calibration::{CalibrationPoint, CalibrationTable};
pub use error::{CoreError, CoreResult, FieldMessage, ValidationError};
pub use money::Money;
pub use ports::{MasterData, StockRecordStore, StoreError, StoreResult, TransactionLog};
pub use service::{ReconciliationService, ServiceError, ServiceResult};
pub use shift::{ShiftLedger, ShiftSummary};
pub use types::*;
