//! # Density Corrector
//!
//! Brings an observed density/temperature pair to the 15 °C reference and
//! compares it with the density printed on the supplier's invoice.
//!
//! ## The Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  density_at_15c = observed_density × (1 − α × (observed_temp − 15))    │
//! │                                                                         │
//! │  α = 0.0008 per °C  (THERMAL_EXPANSION_COEFFICIENT)                    │
//! │                                                                         │
//! │  variation      = density_at_15c − invoice_density_at_15c              │
//! │                                                                         │
//! │  Example: 0.755 at 30 °C → 0.755 × (1 − 0.0008 × 15) = 0.74594         │
//! │           displayed as 0.75; invoice 0.75 → variation ≈ 0.00           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is the single formula used for every purchase line. There is no
//! second coefficient or sign convention anywhere in the workspace.
//!
//! ## Incomplete Readings
//! A density or temperature of zero (or blank) means "not measured yet".
//! The corrector returns `None` for those rather than computing a
//! correction from zero.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::money::round_quantity;

/// Volumetric expansion coefficient per °C.
pub const THERMAL_EXPANSION_COEFFICIENT: Decimal = dec!(0.0008);

/// Reference temperature for density comparisons.
pub const REFERENCE_TEMPERATURE_C: Decimal = dec!(15);

/// Default acceptable |variation| between corrected and invoice density.
pub const DEFAULT_DENSITY_TOLERANCE: Decimal = dec!(0.003);

// =============================================================================
// Pure Functions
// =============================================================================

/// Corrects an observed density to 15 °C.
///
/// Returns `None` when either input is zero, which the entry form uses to
/// mean "not yet measured".
pub fn correct_density(observed_density: Decimal, observed_temperature_c: Decimal) -> Option<Decimal> {
    if observed_density.is_zero() || observed_temperature_c.is_zero() {
        return None;
    }

    let offset = observed_temperature_c - REFERENCE_TEMPERATURE_C;
    Some(observed_density * (Decimal::ONE - THERMAL_EXPANSION_COEFFICIENT * offset))
}

/// Difference between the corrected density and a reference density.
///
/// `None` when no reference (invoice) density was supplied.
pub fn compute_variation(density_at_15c: Decimal, reference_density: Option<Decimal>) -> Option<Decimal> {
    reference_density.map(|reference| density_at_15c - reference)
}

// =============================================================================
// Observation
// =============================================================================

/// Density reading taken while decanting one purchase line.
///
/// Transient while the line is being entered; embedded into the
/// [`crate::types::PurchaseLine`] once finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityObservation {
    /// Hydrometer reading (g/cm3). `None` or zero = not measured.
    pub observed_density: Option<Decimal>,
    /// Sample temperature. `None` or zero = not measured.
    pub observed_temperature_c: Option<Decimal>,
    /// Density at 15 °C from the supplier's invoice.
    pub reference_density_at_15c: Option<Decimal>,
}

/// Result of evaluating an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DensityCheck {
    /// Inputs still missing (the `MissingDensityInputs` state). Not an
    /// error: the operator has simply not finished the entry.
    Incomplete { missing: Vec<&'static str> },

    /// Both readings present.
    Measured(DensityReading),
}

/// A corrected density and, when an invoice density exists, how far off it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DensityReading {
    /// Unrounded; use this for any further calculation.
    pub density_at_15c: Decimal,
    /// Unrounded `density_at_15c - reference`.
    pub variation: Option<Decimal>,
    /// `|variation| <= tolerance`; `None` without a reference density.
    pub within_tolerance: Option<bool>,
}

impl DensityReading {
    /// Corrected density rounded for display.
    pub fn display_density(&self) -> Decimal {
        round_quantity(self.density_at_15c)
    }

    /// Variation rounded for display.
    pub fn display_variation(&self) -> Option<Decimal> {
        self.variation.map(round_quantity)
    }
}

impl DensityObservation {
    pub fn new(observed_density: Decimal, observed_temperature_c: Decimal) -> Self {
        DensityObservation {
            observed_density: Some(observed_density),
            observed_temperature_c: Some(observed_temperature_c),
            reference_density_at_15c: None,
        }
    }

    /// Attaches the invoice density.
    pub fn with_reference(mut self, reference_density_at_15c: Decimal) -> Self {
        self.reference_density_at_15c = Some(reference_density_at_15c);
        self
    }

    /// Runs the correction if the observation is complete.
    ///
    /// ## Workflow
    /// ```text
    /// density: 0.755   temp: (blank)
    ///      │
    ///      ▼
    /// Incomplete { missing: ["observed_temperature_c"] }   ← keep typing
    ///
    /// density: 0.755   temp: 30   invoice: 0.75
    ///      │
    ///      ▼
    /// Measured { density_at_15c: 0.74594, variation: -0.00406, within: false }
    /// ```
    pub fn evaluate(&self, tolerance: Decimal) -> DensityCheck {
        let density = self.observed_density.filter(|d| !d.is_zero());
        let temperature = self.observed_temperature_c.filter(|t| !t.is_zero());

        let (density, temperature) = match (density, temperature) {
            (Some(d), Some(t)) => (d, t),
            (d, t) => {
                let mut missing = Vec::new();
                if d.is_none() {
                    missing.push("observed_density");
                }
                if t.is_none() {
                    missing.push("observed_temperature_c");
                }
                return DensityCheck::Incomplete { missing };
            }
        };

        // Both inputs are non-zero, so the corrector always runs here.
        let Some(density_at_15c) = correct_density(density, temperature) else {
            return DensityCheck::Incomplete { missing: Vec::new() };
        };

        let variation = compute_variation(density_at_15c, self.reference_density_at_15c);
        let within_tolerance = variation.map(|v| v.abs() <= tolerance);

        DensityCheck::Measured(DensityReading {
            density_at_15c,
            variation,
            within_tolerance,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
