//! # Repositories
//!
//! One repository per table group. Each wraps a cloned `SqlitePool` and
//! converts between row structs and `forecourt-core` types.
//!
//! ## Column Conventions
//! ```text
//! Decimal   ◄──► TEXT      exact, parsed with Decimal::from_str
//! Money     ◄──► INTEGER   cents
//! NaiveDate ◄──► TEXT      'YYYY-MM-DD' (sqlx chrono support)
//! Calibration ◄► TEXT      JSON, validated on the way back in
//! ```

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{DbError, DbResult};

pub mod master;
pub mod shift;
pub mod stock;
pub mod transaction;

/// Parses a decimal column.
pub(crate) fn parse_decimal(column: &str, text: &str) -> DbResult<Decimal> {
    Decimal::from_str(text.trim()).map_err(|e| DbError::invalid(column, e))
}

/// Parses a nullable decimal column.
pub(crate) fn parse_optional_decimal(column: &str, text: Option<&str>) -> DbResult<Option<Decimal>> {
    text.map(|t| parse_decimal(column, t)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_decimal_columns() {
        assert_eq!(parse_decimal("receipt", "12000.50").unwrap(), dec!(12000.50));
        assert_eq!(parse_decimal("receipt", " -3 ").unwrap(), dec!(-3));
        assert!(matches!(
            parse_decimal("receipt", "twelve"),
            Err(DbError::InvalidData { .. })
        ));
        assert_eq!(parse_optional_decimal("dip_cm", None).unwrap(), None);
    }
}
