//! # Validation Module
//!
//! Boundary checks run on records before they reach a reconciler.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Entry form                                                   │
//! │  └── Numeric input, required fields                                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (boundary)                                       │
//! │  ├── No negative receipts or quantities                                │
//! │  ├── Meter readings never run backwards                                │
//! │  └── Net sale after test quantity is not negative                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Reconcilers (stock.rs, shift.rs)                             │
//! │  └── Assume validated input; only enforce their own invariants         │
//! │      (calibration range, prior-record ownership)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use forecourt_core::validation::validate_non_negative;
//! use rust_decimal_macros::dec;
//!
//! assert!(validate_non_negative("quantity_liters", dec!(9000)).is_ok());
//! assert!(validate_non_negative("quantity_liters", dec!(-1)).is_err());
//! ```

use rust_decimal::Decimal;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{MeterReading, PurchaseLine, Tank};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest identifier accepted from an adapter.
pub const MAX_ID_LENGTH: usize = 64;

// =============================================================================
// Primitive Validators
// =============================================================================

/// Validates an identifier (tank, nozzle, shift, employee...).
///
/// ## Rules
/// - Must not be blank
/// - At most [`MAX_ID_LENGTH`] characters
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LENGTH,
        });
    }

    Ok(())
}

/// Validates that a quantity is zero or more.
pub fn validate_non_negative(field: &str, value: Decimal) -> ValidationResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be positive: a zero price would value every variance at zero
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "unit_price".to_string(),
        });
    }

    Ok(())
}

/// Validates a dip reading before interpolation.
///
/// Range against the calibration table is checked by the interpolator;
/// this only rejects readings that cannot be a depth at all.
pub fn validate_dip(dip_cm: Decimal) -> ValidationResult<()> {
    validate_non_negative("dip_cm", dip_cm)
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates tank master data at setup time.
pub fn validate_tank(tank: &Tank) -> ValidationResult<()> {
    validate_id("tank_id", &tank.id)?;
    validate_id("product_id", &tank.product_id)?;
    validate_non_negative("last_known_closing_stock", tank.last_known_closing_stock)?;
    Ok(())
}

/// Validates a purchase line before its quantity counts as a receipt.
///
/// ## Rules
/// - Decant tank is set
/// - Quantity is not negative
/// - Density readings, when present, are not negative
pub fn validate_purchase_line(line: &PurchaseLine) -> ValidationResult<()> {
    validate_id("decant_tank_id", &line.decant_tank_id)?;
    validate_non_negative("quantity_liters", line.quantity_liters)?;

    if let Some(density) = &line.density {
        if let Some(observed) = density.observed_density {
            validate_non_negative("observed_density", observed)?;
        }
        if let Some(reference) = density.reference_density_at_15c {
            validate_non_negative("reference_density_at_15c", reference)?;
        }
    }

    Ok(())
}

/// Validates a nozzle's meter reading.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Shift close: Nozzle N-1                                               │
/// │                                                                         │
/// │  opening 120450.30   closing 121210.80   test 5                        │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_meter_reading ← THIS FUNCTION                                │
/// │       │                                                                 │
/// │       ├── closing < opening? → "closing reading ... is below ..."      │
/// │       ├── test < 0?          → "test_quantity must not be negative"    │
/// │       ├── net sale < 0?      → "meter_sale must not be negative"       │
/// │       │                                                                 │
/// │       └── OK → counts toward the tank's metered sale                   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_meter_reading(reading: &MeterReading) -> ValidationResult<()> {
    validate_id("nozzle_id", &reading.nozzle_id)?;
    validate_non_negative("opening_reading", reading.opening_reading)?;
    validate_non_negative("test_quantity", reading.test_quantity)?;

    if reading.closing_reading < reading.opening_reading {
        return Err(ValidationError::ReadingBackwards {
            field: "closing_reading".to_string(),
            opening: reading.opening_reading.to_string(),
            closing: reading.closing_reading.to_string(),
        });
    }

    validate_non_negative("meter_sale", reading.net_sale())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn reading(opening: Decimal, closing: Decimal, test: Decimal) -> MeterReading {
        MeterReading {
            id: "r1".to_string(),
            nozzle_id: "N-1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            shift_id: "morning".to_string(),
            opening_reading: opening,
            closing_reading: closing,
            test_quantity: test,
        }
    }

    fn purchase(quantity: Decimal) -> PurchaseLine {
        PurchaseLine {
            id: "p1".to_string(),
            invoice_number: "INV-1".to_string(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            product_id: "MS".to_string(),
            decant_tank_id: "T1".to_string(),
            quantity_liters: quantity,
            density: None,
        }
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("tank_id", "T1").is_ok());
        assert!(validate_id("tank_id", "").is_err());
        assert!(validate_id("tank_id", "   ").is_err());
        assert!(validate_id("tank_id", &"T".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_non_negative() {
        assert!(validate_non_negative("receipt", dec!(0)).is_ok());
        assert!(validate_non_negative("receipt", dec!(-0)).is_ok());
        assert!(validate_non_negative("receipt", dec!(12000)).is_ok());
        assert_eq!(
            validate_non_negative("receipt", dec!(-0.01)),
            Err(ValidationError::MustNotBeNegative {
                field: "receipt".to_string()
            })
        );
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Money::from_cents(10_250)).is_ok());
        assert!(validate_unit_price(Money::zero()).is_err());
        assert!(validate_unit_price(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_purchase_line() {
        assert!(validate_purchase_line(&purchase(dec!(12000))).is_ok());
        assert!(validate_purchase_line(&purchase(dec!(-500))).is_err());

        let mut untargeted = purchase(dec!(12000));
        untargeted.decant_tank_id = String::new();
        assert!(validate_purchase_line(&untargeted).is_err());
    }

    #[test]
    fn test_validate_meter_reading() {
        assert!(validate_meter_reading(&reading(dec!(100), dec!(250), dec!(5))).is_ok());
        assert!(validate_meter_reading(&reading(dec!(100), dec!(100), dec!(0))).is_ok());

        assert!(matches!(
            validate_meter_reading(&reading(dec!(250), dec!(100), dec!(0))),
            Err(ValidationError::ReadingBackwards { .. })
        ));
        assert!(validate_meter_reading(&reading(dec!(100), dec!(250), dec!(-1))).is_err());
        // Test quantity larger than the pumped volume.
        assert!(validate_meter_reading(&reading(dec!(100), dec!(103), dec!(5))).is_err());
    }

    #[test]
    fn test_validate_dip() {
        assert!(validate_dip(dec!(0)).is_ok());
        assert!(validate_dip(dec!(123.4)).is_ok());
        assert!(validate_dip(dec!(-2)).is_err());
    }
}
