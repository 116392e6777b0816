//! # Daily Stock Reconciler
//!
//! Produces one tank's [`DailyStockRecord`] for one business date from the
//! prior day's closing, the day's receipts and metered sales, and an
//! optional dip reading.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Daily Stock Reconciliation                           │
//! │                                                                         │
//! │  prior record (D-1) ──► opening_stock ─┐   (else tank static opening)  │
//! │                                        │                                │
//! │  purchase lines ──► receipt ───────────┼──► total_stock                 │
//! │  (decant tank, invoice date = D)       │        │                       │
//! │                                        │        ▼                       │
//! │  meter readings ──► meter_sale ────────┴──► closing_stock ──► D+1       │
//! │  (tank's nozzles, date = D)                     │                       │
//! │                                                 ▼                       │
//! │  dip_cm ──► volume_for_dip ──► dip_volume ──► variance_liters          │
//! │                                                 │  × unit_price         │
//! │                                                 ▼                       │
//! │                                          variance_amount                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reconciler never fetches anything. The caller loads the prior record
//! and is responsible for serializing the read-prior / write-today sequence
//! per tank and date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::calibration::volume_for_dip;
use crate::error::{CoreError, CoreResult};
use crate::money::{round_quantity, Money};
use crate::types::{
    stock_record_id, DailyStockRecord, MeterReading, Nozzle, PurchaseLine, StockRecordStatus, Tank,
};

// =============================================================================
// Inputs
// =============================================================================

/// Everything `reconcile` needs for one tank on one date.
///
/// Purchase lines, readings and nozzles may cover other tanks and dates;
/// the reconciler filters them.
#[derive(Debug, Clone, Copy)]
pub struct StockDayInputs<'a> {
    pub tank: &'a Tank,
    pub date: NaiveDate,
    /// Snapshot of the tank's record for `date - 1`, if one exists.
    pub prior: Option<&'a DailyStockRecord>,
    pub purchases: &'a [PurchaseLine],
    pub meter_readings: &'a [MeterReading],
    pub nozzles: &'a [Nozzle],
    pub unit_price: Money,
    pub dip_cm: Option<Decimal>,
}

// =============================================================================
// Components
// =============================================================================

/// Resolves the opening stock for `date`.
///
/// ## Rules
/// - Prior record of another tank: `PriorRecordMismatch`
/// - Prior record dated `date - 1`: its closing stock
/// - Prior record of any other date, or none: the tank's static opening
pub fn resolve_opening_stock(
    tank: &Tank,
    date: NaiveDate,
    prior: Option<&DailyStockRecord>,
) -> CoreResult<Decimal> {
    let Some(prior) = prior else {
        return Ok(tank.last_known_closing_stock);
    };

    if prior.tank_id != tank.id {
        return Err(CoreError::PriorRecordMismatch {
            expected_tank: tank.id.clone(),
            found_tank: prior.tank_id.clone(),
        });
    }

    if date.pred_opt() != Some(prior.date) {
        warn!(
            tank_id = %tank.id,
            %date,
            prior_date = %prior.date,
            "Prior record is not for the previous day; using static opening stock"
        );
        return Ok(tank.last_known_closing_stock);
    }

    Ok(carry_forward(prior))
}

/// Litres decanted into `tank_id` on invoices dated `date`.
pub fn receipts_for(tank_id: &str, date: NaiveDate, purchases: &[PurchaseLine]) -> Decimal {
    purchases
        .iter()
        .filter(|line| line.decant_tank_id == tank_id && line.invoice_date == date)
        .map(|line| line.quantity_liters)
        .sum()
}

/// Net litres sold on `date` through the nozzles attached to `tank_id`.
pub fn metered_sale_for(
    tank_id: &str,
    date: NaiveDate,
    nozzles: &[Nozzle],
    readings: &[MeterReading],
) -> Decimal {
    let tank_nozzles: HashSet<&str> = nozzles
        .iter()
        .filter(|nozzle| nozzle.tank_id == tank_id)
        .map(|nozzle| nozzle.id.as_str())
        .collect();

    readings
        .iter()
        .filter(|reading| reading.date == date && tank_nozzles.contains(reading.nozzle_id.as_str()))
        .map(MeterReading::net_sale)
        .sum()
}

/// Opening stock for the day after `record`.
#[inline]
pub fn carry_forward(record: &DailyStockRecord) -> Decimal {
    record.closing_stock
}

// =============================================================================
// Reconcile
// =============================================================================

/// Reconciles one tank for one date.
///
/// ## Returns
/// A `Pending` record when no dip was given, `Settled` otherwise.
///
/// ## Errors
/// - `PriorRecordMismatch` if the prior snapshot belongs to another tank
/// - `DipOutOfRange` if the dip is outside the calibration table
/// - `VarianceAmountOutOfRange` if the variance cannot be priced
pub fn reconcile(inputs: &StockDayInputs<'_>) -> CoreResult<DailyStockRecord> {
    let tank = inputs.tank;

    let opening_stock = resolve_opening_stock(tank, inputs.date, inputs.prior)?;
    let receipt = receipts_for(&tank.id, inputs.date, inputs.purchases);
    let meter_sale = metered_sale_for(&tank.id, inputs.date, inputs.nozzles, inputs.meter_readings);

    let total_stock = opening_stock + receipt;
    let closing_stock = total_stock - meter_sale;

    let record = DailyStockRecord {
        id: stock_record_id(&tank.id, inputs.date),
        tank_id: tank.id.clone(),
        product_id: tank.product_id.clone(),
        date: inputs.date,
        opening_stock,
        receipt,
        meter_sale,
        total_stock,
        closing_stock,
        dip_cm: None,
        dip_volume: None,
        variance_liters: None,
        variance_amount: None,
        unit_price: inputs.unit_price,
        status: StockRecordStatus::Pending,
    };

    debug!(
        tank_id = %tank.id,
        date = %inputs.date,
        %opening_stock,
        %receipt,
        %meter_sale,
        %closing_stock,
        "Book stock computed"
    );

    match inputs.dip_cm {
        Some(dip_cm) => apply_dip(record, tank, dip_cm),
        None => Ok(record),
    }
}

/// Enters a dip on a record and computes its variance.
///
/// Works on a fresh `Pending` record or re-settles one with a corrected dip;
/// the book figures are left untouched. A record of another tank is a
/// `RecordTankMismatch`.
pub fn apply_dip(mut record: DailyStockRecord, tank: &Tank, dip_cm: Decimal) -> CoreResult<DailyStockRecord> {
    if record.tank_id != tank.id {
        return Err(CoreError::RecordTankMismatch {
            record_id: record.id,
            record_tank: record.tank_id,
            tank: tank.id.clone(),
        });
    }

    let dip_volume = round_quantity(volume_for_dip(&tank.calibration, dip_cm)?);
    let variance_liters = dip_volume - record.closing_stock;
    let variance_amount = record
        .unit_price
        .for_quantity(variance_liters)
        .ok_or(CoreError::VarianceAmountOutOfRange {
            variance_liters,
            unit_price: record.unit_price,
        })?;

    debug!(
        tank_id = %tank.id,
        date = %record.date,
        %dip_cm,
        %dip_volume,
        %variance_liters,
        %variance_amount,
        "Dip variance computed"
    );

    record.dip_cm = Some(dip_cm);
    record.dip_volume = Some(dip_volume);
    record.variance_liters = Some(variance_liters);
    record.variance_amount = Some(variance_amount);
    record.status = StockRecordStatus::Settled;
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationPoint, CalibrationTable};
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn tank() -> Tank {
        Tank {
            id: "T1".to_string(),
            name: "Petrol 1".to_string(),
            product_id: "MS".to_string(),
            calibration: CalibrationTable::new(vec![
                CalibrationPoint::new(dec!(0), dec!(0)),
                CalibrationPoint::new(dec!(50), dec!(5000)),
                CalibrationPoint::new(dec!(100), dec!(9500)),
            ])
            .unwrap(),
            last_known_closing_stock: dec!(4000),
            is_active: true,
        }
    }

    fn nozzles() -> Vec<Nozzle> {
        vec![
            Nozzle {
                id: "N1".to_string(),
                tank_id: "T1".to_string(),
                label: "MS-1".to_string(),
            },
            Nozzle {
                id: "N2".to_string(),
                tank_id: "T1".to_string(),
                label: "MS-2".to_string(),
            },
            Nozzle {
                id: "N9".to_string(),
                tank_id: "T2".to_string(),
                label: "HSD-1".to_string(),
            },
        ]
    }

    fn reading(nozzle: &str, date: NaiveDate, opening: Decimal, closing: Decimal, test: Decimal) -> MeterReading {
        MeterReading {
            id: format!("{}-{}", nozzle, date),
            nozzle_id: nozzle.to_string(),
            date,
            shift_id: "day".to_string(),
            opening_reading: opening,
            closing_reading: closing,
            test_quantity: test,
        }
    }

    fn purchase(tank: &str, date: NaiveDate, quantity: Decimal) -> PurchaseLine {
        PurchaseLine {
            id: format!("P-{}-{}", tank, date),
            invoice_number: "INV-7".to_string(),
            invoice_date: date,
            product_id: "MS".to_string(),
            decant_tank_id: tank.to_string(),
            quantity_liters: quantity,
            density: None,
        }
    }

    fn inputs<'a>(
        tank: &'a Tank,
        date: NaiveDate,
        prior: Option<&'a DailyStockRecord>,
        purchases: &'a [PurchaseLine],
        readings: &'a [MeterReading],
        nozzles: &'a [Nozzle],
        dip_cm: Option<Decimal>,
    ) -> StockDayInputs<'a> {
        StockDayInputs {
            tank,
            date,
            prior,
            purchases,
            meter_readings: readings,
            nozzles,
            unit_price: Money::from_cents(10_000),
            dip_cm,
        }
    }

    #[test]
    fn test_book_stock_identities() {
        let tank = tank();
        let nozzles = nozzles();
        let purchases = vec![
            purchase("T1", day(1), dec!(3000)),
            purchase("T1", day(2), dec!(9999)),
            purchase("T2", day(1), dec!(8888)),
        ];
        let readings = vec![
            reading("N1", day(1), dec!(1000), dec!(1800.25), dec!(5)),
            reading("N2", day(1), dec!(500), dec!(1000), dec!(0)),
            reading("N9", day(1), dec!(0), dec!(700), dec!(0)),
            reading("N1", day(2), dec!(1800.25), dec!(1900), dec!(0)),
        ];

        let record = reconcile(&inputs(&tank, day(1), None, &purchases, &readings, &nozzles, None)).unwrap();

        assert_eq!(record.opening_stock, dec!(4000));
        assert_eq!(record.receipt, dec!(3000));
        assert_eq!(record.meter_sale, dec!(1295.25));
        assert_eq!(record.total_stock, record.opening_stock + record.receipt);
        assert_eq!(record.closing_stock, record.opening_stock + record.receipt - record.meter_sale);
        assert_eq!(record.closing_stock, dec!(5704.75));
        assert_eq!(record.status, StockRecordStatus::Pending);
        assert_eq!(record.variance_liters, None);
        assert_eq!(record.variance_amount, None);
    }

    #[test]
    fn test_dip_settles_with_variance() {
        let tank = tank();
        let nozzles = nozzles();
        let readings = vec![reading("N1", day(1), dec!(0), dec!(1500), dec!(0))];

        // Book: 4000 - 1500 = 2500. Dip 24 cm -> 2400 L, a 100 L shortage.
        let record = reconcile(&inputs(&tank, day(1), None, &[], &readings, &nozzles, Some(dec!(24)))).unwrap();

        assert_eq!(record.closing_stock, dec!(2500));
        assert_eq!(record.dip_volume, Some(dec!(2400)));
        assert_eq!(record.variance_liters, Some(dec!(-100)));
        assert_eq!(record.variance_amount, Some(Money::from_cents(-1_000_000)));
        assert!(record.is_settled());
    }

    #[test]
    fn test_dip_volume_rounded_before_variance() {
        let tank = tank();
        // 33.33333 cm interpolates to 3333.333 L.
        let record = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], Some(dec!(33.33333)))).unwrap();

        assert_eq!(record.dip_volume, Some(dec!(3333.33)));
        assert_eq!(record.variance_liters, Some(dec!(-666.67)));
        assert_eq!(record.variance_amount, Some(Money::from_cents(-6_666_700)));
    }

    #[test]
    fn test_dip_out_of_range_propagates() {
        let tank = tank();
        let err = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], Some(dec!(150)))).unwrap_err();
        assert!(matches!(err, CoreError::DipOutOfRange { .. }));
        assert_eq!(err.field_message().field, "dip_cm");
    }

    #[test]
    fn test_chaining_across_days() {
        let tank = tank();
        let nozzles = nozzles();
        let purchases = vec![purchase("T1", day(2), dec!(2000))];
        let readings = vec![
            reading("N1", day(1), dec!(0), dec!(1200.40), dec!(0)),
            reading("N1", day(2), dec!(1200.40), dec!(2000), dec!(2)),
        ];

        let first = reconcile(&inputs(&tank, day(1), None, &purchases, &readings, &nozzles, None)).unwrap();
        let second =
            reconcile(&inputs(&tank, day(2), Some(&first), &purchases, &readings, &nozzles, None)).unwrap();

        assert_eq!(second.opening_stock, first.closing_stock);
        assert_eq!(second.opening_stock, carry_forward(&first));
        assert_eq!(second.closing_stock, dec!(2799.60) + dec!(2000) - dec!(797.60));
    }

    #[test]
    fn test_stale_prior_falls_back_to_static_opening() {
        let tank = tank();
        let first = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], None)).unwrap();
        let mut stale = first.clone();
        stale.closing_stock = dec!(1234);

        // Day 3 with a day-1 snapshot: the gap means no chain.
        let third = reconcile(&inputs(&tank, day(3), Some(&stale), &[], &[], &[], None)).unwrap();
        assert_eq!(third.opening_stock, tank.last_known_closing_stock);
    }

    #[test]
    fn test_prior_for_other_tank_is_rejected() {
        let tank = tank();
        let mut foreign = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], None)).unwrap();
        foreign.tank_id = "T2".to_string();

        let err = reconcile(&inputs(&tank, day(2), Some(&foreign), &[], &[], &[], None)).unwrap_err();
        assert_eq!(
            err,
            CoreError::PriorRecordMismatch {
                expected_tank: "T1".to_string(),
                found_tank: "T2".to_string(),
            }
        );
    }

    #[test]
    fn test_apply_dip_to_record_of_other_tank() {
        let tank = tank();
        let mut foreign = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], None)).unwrap();
        foreign.tank_id = "T2".to_string();

        let err = apply_dip(foreign.clone(), &tank, dec!(40)).unwrap_err();
        assert_eq!(
            err,
            CoreError::RecordTankMismatch {
                record_id: foreign.id,
                record_tank: "T2".to_string(),
                tank: "T1".to_string(),
            }
        );
        assert_eq!(err.field_message().field, "tank_id");
        assert!(!err.to_string().contains("prior"));
    }

    #[test]
    fn test_unpriceable_variance_is_an_error() {
        let tank = tank();
        let mut pending = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], None)).unwrap();
        pending.unit_price = Money::from_cents(i64::MAX);

        // 45 cm reads 4500 L against a book closing of 4000 L.
        let err = apply_dip(pending, &tank, dec!(45)).unwrap_err();
        assert!(matches!(err, CoreError::VarianceAmountOutOfRange { .. }));
    }

    #[test]
    fn test_apply_dip_to_pending_record() {
        let tank = tank();
        let pending = reconcile(&inputs(&tank, day(1), None, &[], &[], &[], None)).unwrap();

        let settled = apply_dip(pending.clone(), &tank, dec!(40)).unwrap();
        assert_eq!(settled.closing_stock, pending.closing_stock);
        assert_eq!(settled.dip_volume, Some(dec!(4000)));
        assert_eq!(settled.variance_liters, Some(dec!(0)));
        assert!(settled.variance_amount.unwrap().is_zero());
        assert!(settled.is_settled());
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let tank = tank();
        let nozzles = nozzles();
        let readings = vec![reading("N2", day(1), dec!(10), dec!(20), dec!(0))];
        let day_inputs = inputs(&tank, day(1), None, &[], &readings, &nozzles, Some(dec!(30)));

        assert_eq!(reconcile(&day_inputs).unwrap(), reconcile(&day_inputs).unwrap());
    }
}
