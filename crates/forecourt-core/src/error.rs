//! # Error Types
//!
//! Domain-specific error types for forecourt-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  forecourt-core errors (this file)                                     │
//! │  ├── CoreError        - Reconciliation failures (one tank / one shift) │
//! │  └── ValidationError  - Field-level input validation failures          │
//! │                                                                         │
//! │  forecourt-core ports (ports.rs)                                       │
//! │  └── StoreError       - What an adapter reports back to the engine     │
//! │                                                                         │
//! │  forecourt-db errors (separate crate)                                  │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → CLI / operator     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error maps to a field-level message via [`CoreError::field_message`]
//! and concerns one tank/date or one shift/date.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Reconciliation errors.
///
/// Each error concerns exactly one tank/date or one shift/date. Batch
/// operations collect them per item rather than stopping.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Dip measurement falls outside the tank's calibration table.
    ///
    /// ## When This Occurs
    /// - Operator mistyped the dip (e.g. 1800 instead of 180)
    /// - Dip rod reading below the first strapping mark (tank nearly empty)
    /// - Dip above the last mark (tank overfilled or table truncated)
    ///
    /// ## Recovery
    /// ```text
    /// Enter dip: 195 cm
    ///      │
    ///      ▼
    /// DipOutOfRange { dip_cm: 195, min_dip: 5, max_dip: 180 }
    ///      │
    ///      ▼
    /// UI shows: "dip reading 195 cm is outside tank's calibrated range of 5–180 cm"
    ///      │
    ///      ▼
    /// Operator re-measures, or confirms tank-empty / tank-full
    /// ```
    #[error("dip reading {dip_cm} cm is outside tank's calibrated range of {min_dip}–{max_dip} cm")]
    DipOutOfRange {
        dip_cm: Decimal,
        min_dip: Decimal,
        max_dip: Decimal,
    },

    /// Calibration table cannot be used.
    ///
    /// Fatal at tank setup time: a tank with an invalid table must not be
    /// activated.
    #[error("invalid calibration table: {reason}")]
    InvalidCalibrationTable { reason: String },

    /// The prior-day snapshot handed to the reconciler belongs to another tank.
    #[error("prior record belongs to tank {found_tank}, expected tank {expected_tank}")]
    PriorRecordMismatch {
        expected_tank: String,
        found_tank: String,
    },

    /// A stock record was handed a dip for a tank it does not belong to.
    #[error("stock record {record_id} belongs to tank {record_tank}, not tank {tank}")]
    RecordTankMismatch {
        record_id: String,
        record_tank: String,
        tank: String,
    },

    /// Variance priced at the unit price does not fit in a cash amount.
    #[error("variance of {variance_liters} L at {unit_price} per litre is too large to price")]
    VarianceAmountOutOfRange {
        variance_liters: Decimal,
        unit_price: Money,
    },

    /// Tank is not active (e.g. blocked at setup by an invalid table).
    #[error("tank {0} is not active")]
    TankInactive(String),

    /// A ledger line amount is not a number, or is too large to be one.
    ///
    /// Never returned from `summarize`: the line counts as zero and the
    /// error is logged and listed in the summary instead.
    #[error("{category} line {index} has an unreadable amount '{raw}'")]
    MalformedLedgerEntry {
        category: String,
        index: usize,
        raw: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns the field-level message shown next to the offending input.
    pub fn field_message(&self) -> FieldMessage {
        let field = match self {
            CoreError::DipOutOfRange { .. } => "dip_cm".to_string(),
            CoreError::InvalidCalibrationTable { .. } => "calibration".to_string(),
            CoreError::PriorRecordMismatch { .. } => "opening_stock".to_string(),
            CoreError::RecordTankMismatch { .. } => "tank_id".to_string(),
            CoreError::VarianceAmountOutOfRange { .. } => "dip_cm".to_string(),
            CoreError::TankInactive(_) => "tank_id".to_string(),
            CoreError::MalformedLedgerEntry {
                category, index, ..
            } => format!("{}[{}].amount", category, index),
            CoreError::Validation(err) => return err.field_message(),
        };

        FieldMessage {
            field,
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur at the boundary, before any reconciliation runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Quantity or amount must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Closing meter reading is below the opening reading.
    #[error("{field}: closing reading {closing} is below opening reading {opening}")]
    ReadingBackwards {
        field: String,
        opening: String,
        closing: String,
    },

    /// Text could not be parsed as a number.
    #[error("{field} '{value}' is not a valid number")]
    InvalidNumber { field: String, value: String },
}

impl ValidationError {
    /// Name of the field this error refers to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::MustNotBeNegative { field }
            | ValidationError::MustBePositive { field }
            | ValidationError::ReadingBackwards { field, .. }
            | ValidationError::InvalidNumber { field, .. } => field,
        }
    }

    /// Returns the field-level message for this error.
    pub fn field_message(&self) -> FieldMessage {
        FieldMessage {
            field: self.field().to_string(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Field Message
// =============================================================================

/// What the operator sees next to an input that failed.
///
/// ```json
/// { "field": "dip_cm", "message": "dip reading 195 cm is outside ..." }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMessage {
    pub field: String,
    pub message: String,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dip_out_of_range_message() {
        let err = CoreError::DipOutOfRange {
            dip_cm: Decimal::from(195),
            min_dip: Decimal::from(5),
            max_dip: Decimal::from(180),
        };
        assert_eq!(
            err.to_string(),
            "dip reading 195 cm is outside tank's calibrated range of 5–180 cm"
        );
        assert_eq!(err.field_message().field, "dip_cm");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "tank_id".to_string(),
        };
        assert_eq!(err.to_string(), "tank_id is required");

        let err = ValidationError::MustNotBeNegative {
            field: "quantity_liters".to_string(),
        };
        assert_eq!(err.to_string(), "quantity_liters must not be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "tank_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.field_message().field, "tank_id");
    }

    #[test]
    fn test_malformed_entry_field_path() {
        let err = CoreError::MalformedLedgerEntry {
            category: "expenses".to_string(),
            index: 2,
            raw: "12o".to_string(),
        };
        assert_eq!(err.field_message().field, "expenses[2].amount");
    }
}
