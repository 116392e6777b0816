//! # Money & Quantities
//!
//! Provides the `Money` type for cash figures and the rounding helpers used
//! for decimal quantities (litres, centimetres, densities).
//!
//! ## Two Kinds of Number
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CASH                                │  QUANTITIES                      │
//! │  ────                                │  ──────────                      │
//! │  Money(i64 cents)                    │  rust_decimal::Decimal           │
//! │  • shift ledgers, unit prices        │  • litres, dip cm, g/cm3         │
//! │  • variance amounts                  │  • interpolated volumes          │
//! │  • exact integer addition            │  • exact base-10 arithmetic      │
//! │                                      │                                  │
//! │  Crossing over (litres × price) happens in exactly one place:          │
//! │  Money::for_quantity, rounding half-to-even to the cent.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use forecourt_core::money::Money;
//! use rust_decimal_macros::dec;
//!
//! let price = Money::from_cents(10_250); // 102.50 per litre
//! let amount = price.for_quantity(dec!(-12.40)).unwrap();
//! assert_eq!(amount.cents(), -127_100);
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};

use crate::error::ValidationError;

/// Decimal places kept for stored quantities and shown to operators.
pub const DISPLAY_DECIMALS: u32 = 2;

/// Largest magnitude one amount may have, in cents (10^13 major units).
///
/// Sums of a few thousand such amounts still fit in an `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

// =============================================================================
// Money Type
// =============================================================================

/// A cash amount in cents (paise). Signed: shortages and variances are
/// routinely negative. Serializes as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Converts a decimal amount in major units, rounding half-to-even
    /// to the cent.
    ///
    /// ## Example
    /// ```rust
    /// use forecourt_core::money::Money;
    /// use rust_decimal_macros::dec;
    ///
    /// assert_eq!(Money::from_decimal(dec!(10.125)).unwrap().cents(), 1012);
    /// assert_eq!(Money::from_decimal(dec!(10.135)).unwrap().cents(), 1014);
    /// assert_eq!(Money::from_decimal(dec!(100000000000000000000)), None);
    /// ```
    ///
    /// Returns `None` when the amount exceeds [`MAX_AMOUNT_CENTS`].
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        let cents = amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
            .to_i64()?;

        (cents.unsigned_abs() <= MAX_AMOUNT_CENTS.unsigned_abs()).then_some(Money(cents))
    }

    /// Parses an amount as typed by an operator ("1,250.50", " 300 ").
    ///
    /// ## Returns
    /// * `Ok(None)` - blank input (field not filled in yet)
    /// * `Ok(Some(money))` - parsed amount
    /// * `Err(InvalidNumber)` - not a number, or beyond [`MAX_AMOUNT_CENTS`]
    pub fn parse(field: &str, text: &str) -> Result<Option<Money>, ValidationError> {
        let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return Ok(None);
        }

        cleaned
            .parse::<Decimal>()
            .ok()
            .and_then(Money::from_decimal)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidNumber {
                field: field.to_string(),
                value: text.to_string(),
            })
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the value in major units as a decimal (exact).
    #[inline]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Prices a quantity at this unit price.
    ///
    /// ## User Workflow
    /// ```text
    /// Variance: -12.40 L        Unit price: 102.50 / L
    ///      │                          │
    ///      └──────────┬───────────────┘
    ///                 ▼
    /// for_quantity(-12.40) ← THIS FUNCTION
    ///                 │
    ///                 ▼
    /// Variance amount: -1271.00
    /// ```
    ///
    /// `None` if the product exceeds [`MAX_AMOUNT_CENTS`].
    pub fn for_quantity(&self, quantity: Decimal) -> Option<Money> {
        self.to_decimal().checked_mul(quantity).and_then(Money::from_decimal)
    }
}

// =============================================================================
// Quantity Rounding
// =============================================================================

/// Rounds a quantity to the stored/display precision (2 dp, half away from
/// zero, the way a dip chart or invoice is read).
///
/// Only apply this to values that leave the engine. Chained calculations
/// keep the unrounded value.
#[inline]
pub fn round_quantity(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Trait Implementations
// =============================================================================

// Arithmetic saturates at the i64 bounds instead of wrapping or panicking.

/// Display shows the amount with two decimals and no currency symbol;
/// the outlet's currency is a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
