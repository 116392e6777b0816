//! # Calibration Interpolator
//!
//! Converts a dip depth into a volume using the tank's strapping chart.
//!
//! ## How a Dip Becomes Litres
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Strapping chart (one per tank)        Dip reading: 75 cm              │
//! │                                                                         │
//! │   dip_cm   volume_liters                 find bracketing points        │
//! │   ──────   ─────────────                       │                        │
//! │      0            0                            ▼                        │
//! │     50         5000   ◄── (d0, v0)     v0 + (dip - d0) × (v1 - v0)     │
//! │    100         9500   ◄── (d1, v1)            ─────────────────         │
//! │                                                    (d1 - d0)            │
//! │                                                                         │
//! │                                        5000 + 25 × 4500 / 50 = 7250 L   │
//! │                                                                         │
//! │  Below 0 cm or above 100 cm → DipOutOfRange (never clamped)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
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
//! assert_eq!(table.volume_for_dip(dec!(25)).unwrap(), dec!(2500));
//! assert_eq!(table.volume_for_dip(dec!(75)).unwrap(), dec!(7250));
//! assert!(table.volume_for_dip(dec!(150)).is_err());
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Minimum number of points a usable table needs (one interval).
pub const MIN_CALIBRATION_POINTS: usize = 2;

// =============================================================================
// Calibration Point
// =============================================================================

/// One row of a strapping chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Dip depth in centimetres.
    pub dip_cm: Decimal,
    /// Volume held at that depth, in litres.
    pub volume_liters: Decimal,
}

impl CalibrationPoint {
    #[inline]
    pub const fn new(dip_cm: Decimal, volume_liters: Decimal) -> Self {
        CalibrationPoint {
            dip_cm,
            volume_liters,
        }
    }
}

// =============================================================================
// Calibration Table
// =============================================================================

/// A validated strapping chart for one tank.
///
/// ## Invariants
/// - At least [`MIN_CALIBRATION_POINTS`] points
/// - `dip_cm` strictly increasing, never negative
/// - `volume_liters` non-decreasing, never negative
///
/// The only ways to obtain a table are [`CalibrationTable::new`] and
/// deserialization, and both run the same checks. Code holding a
/// `CalibrationTable` never has to re-validate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CalibrationPoint>", into = "Vec<CalibrationPoint>")]
pub struct CalibrationTable {
    points: Vec<CalibrationPoint>,
}

impl CalibrationTable {
    /// Validates `points` and builds a table.
    ///
    /// ## Errors
    /// `InvalidCalibrationTable` with the first rule that failed. A tank
    /// whose table fails here must not be activated.
    pub fn new(points: Vec<CalibrationPoint>) -> CoreResult<Self> {
        validate_points(&points)?;
        Ok(CalibrationTable { points })
    }

    /// Returns the points in ascending dip order.
    #[inline]
    pub fn points(&self) -> &[CalibrationPoint] {
        &self.points
    }

    /// Lowest calibrated dip.
    #[inline]
    pub fn min_dip(&self) -> Decimal {
        self.points[0].dip_cm
    }

    /// Highest calibrated dip.
    #[inline]
    pub fn max_dip(&self) -> Decimal {
        self.points[self.points.len() - 1].dip_cm
    }

    /// Volume at the highest calibrated dip.
    #[inline]
    pub fn capacity(&self) -> Decimal {
        self.points[self.points.len() - 1].volume_liters
    }

    /// Converts a dip reading to litres. See [`volume_for_dip`].
    pub fn volume_for_dip(&self, dip_cm: Decimal) -> CoreResult<Decimal> {
        volume_for_dip(self, dip_cm)
    }
}

impl TryFrom<Vec<CalibrationPoint>> for CalibrationTable {
    type Error = CoreError;

    fn try_from(points: Vec<CalibrationPoint>) -> Result<Self, Self::Error> {
        CalibrationTable::new(points)
    }
}

impl From<CalibrationTable> for Vec<CalibrationPoint> {
    fn from(table: CalibrationTable) -> Self {
        table.points
    }
}

fn validate_points(points: &[CalibrationPoint]) -> CoreResult<()> {
    let invalid = |reason: String| CoreError::InvalidCalibrationTable { reason };

    if points.len() < MIN_CALIBRATION_POINTS {
        return Err(invalid(format!(
            "needs at least {} points, got {}",
            MIN_CALIBRATION_POINTS,
            points.len()
        )));
    }

    if let Some(point) = points
        .iter()
        .find(|p| p.dip_cm.is_sign_negative() || p.volume_liters.is_sign_negative())
    {
        return Err(invalid(format!(
            "negative entry at {} cm / {} L",
            point.dip_cm, point.volume_liters
        )));
    }

    for (index, pair) in points.windows(2).enumerate() {
        let (lower, upper) = (&pair[0], &pair[1]);

        if upper.dip_cm <= lower.dip_cm {
            return Err(invalid(format!(
                "dip must strictly increase: row {} ({} cm) follows {} cm",
                index + 1,
                upper.dip_cm,
                lower.dip_cm
            )));
        }

        if upper.volume_liters < lower.volume_liters {
            return Err(invalid(format!(
                "volume must not decrease: row {} ({} L) follows {} L",
                index + 1,
                upper.volume_liters,
                lower.volume_liters
            )));
        }
    }

    Ok(())
}

// =============================================================================
// Interpolation
// =============================================================================

/// Converts a dip measurement to a volume.
///
/// ## Rules
/// - Exact match on a calibration point returns that point's volume
/// - Between two points: linear interpolation
/// - Outside `[min_dip, max_dip]`: `DipOutOfRange`. The caller decides
///   whether that means tank-empty, tank-full or a re-measure.
///
/// The result is unrounded; round with [`crate::money::round_quantity`]
/// only when storing or displaying it.
pub fn volume_for_dip(table: &CalibrationTable, dip_cm: Decimal) -> CoreResult<Decimal> {
    let points = table.points();

    if dip_cm < table.min_dip() || dip_cm > table.max_dip() {
        return Err(CoreError::DipOutOfRange {
            dip_cm,
            min_dip: table.min_dip(),
            max_dip: table.max_dip(),
        });
    }

    // First point whose dip is >= the reading. In range, so it exists.
    let upper = points.partition_point(|p| p.dip_cm < dip_cm);
    let hi = points[upper];

    if hi.dip_cm == dip_cm {
        return Ok(hi.volume_liters);
    }

    // dip_cm > min_dip here, so upper >= 1.
    let lo = points[upper - 1];
    let fraction = (dip_cm - lo.dip_cm) / (hi.dip_cm - lo.dip_cm);

    Ok(lo.volume_liters + fraction * (hi.volume_liters - lo.volume_liters))
}

// =============================================================================
// Unit Tests
// =============================================================================
