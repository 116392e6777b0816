//! # Reconciliation Service
//!
//! Drives the pure reconcilers through the ports: loads what a tank-day or
//! shift needs, validates it at the boundary, reconciles, and saves.
//!
//! ## Settling a Day
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reconcile_day(2026-03-02, dips)                                        │
//! │                                                                         │
//! │  TransactionLog ──► purchases, readings for the date (loaded once)     │
//! │                                                                         │
//! │  for each active tank ─────────────────────────────────────────────┐    │
//! │  │  MasterData ──► tank, product price, nozzles                    │    │
//! │  │  StockRecordStore ──► record for 2026-03-01 (prior snapshot)    │    │
//! │  │  validation ──► stock::reconcile ──► save (compare-and-save)    │    │
//! │  │                                                                  │    │
//! │  │  Err? ──► recorded in that tank's outcome, next tank continues  │    │
//! │  └──────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::density::{DensityCheck, DEFAULT_DENSITY_TOLERANCE};
use crate::error::{CoreError, FieldMessage, ValidationError};
use crate::money::Money;
use crate::ports::{MasterData, StockRecordStore, StoreError, TransactionLog};
use crate::shift::{summarize, summarize_sequence, ShiftSummary};
use crate::stock::{reconcile, StockDayInputs};
use crate::types::{DailyStockRecord, MeterReading, Nozzle, PurchaseLine, Tank};
use crate::validation::{validate_dip, validate_meter_reading, validate_purchase_line, validate_unit_price};

// =============================================================================
// Errors
// =============================================================================

/// Failure of one service operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Core(err.into())
    }
}

impl ServiceError {
    /// Field-level message for the operator.
    pub fn field_message(&self) -> FieldMessage {
        match self {
            ServiceError::Core(err) => err.field_message(),
            ServiceError::Store(err) => {
                let field = match err {
                    StoreError::NotFound { entity, .. } => format!("{}_id", entity),
                    StoreError::Conflict(_) => "opening_stock".to_string(),
                    StoreError::Unavailable(_) => "store".to_string(),
                };
                FieldMessage {
                    field,
                    message: err.to_string(),
                }
            }
        }
    }
}

/// Convenience alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;

// =============================================================================
// Batch Report
// =============================================================================

/// Result for one tank in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankOutcome {
    pub tank_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DailyStockRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldMessage>,
}

impl TankOutcome {
    fn from_result(tank_id: &str, result: ServiceResult<DailyStockRecord>) -> Self {
        match result {
            Ok(record) => TankOutcome {
                tank_id: tank_id.to_string(),
                record: Some(record),
                error: None,
            },
            Err(err) => TankOutcome {
                tank_id: tank_id.to_string(),
                record: None,
                error: Some(err.field_message()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of reconciling every active tank for a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub saved: bool,
    pub settled: usize,
    pub pending: usize,
    pub failed: usize,
    pub outcomes: Vec<TankOutcome>,
}

/// A date's purchases and readings, loaded once per batch.
struct DayLog {
    purchases: Vec<PurchaseLine>,
    readings: Vec<MeterReading>,
}

// =============================================================================
// Service
// =============================================================================

/// Reconciliation over a set of ports.
#[derive(Clone)]
pub struct ReconciliationService {
    master: Arc<dyn MasterData>,
    transactions: Arc<dyn TransactionLog>,
    records: Arc<dyn StockRecordStore>,
    density_tolerance: Decimal,
}

impl ReconciliationService {
    pub fn new(
        master: Arc<dyn MasterData>,
        transactions: Arc<dyn TransactionLog>,
        records: Arc<dyn StockRecordStore>,
    ) -> Self {
        ReconciliationService {
            master,
            transactions,
            records,
            density_tolerance: DEFAULT_DENSITY_TOLERANCE,
        }
    }

    /// Sets the acceptable |variation| for purchase density checks.
    pub fn with_density_tolerance(mut self, tolerance: Decimal) -> Self {
        self.density_tolerance = tolerance;
        self
    }

    pub fn density_tolerance(&self) -> Decimal {
        self.density_tolerance
    }

    // -------------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------------

    /// Computes a tank's record for `date` without saving it.
    pub async fn preview_tank_day(
        &self,
        tank_id: &str,
        date: NaiveDate,
        dip_cm: Option<Decimal>,
    ) -> ServiceResult<DailyStockRecord> {
        let log = self.load_day(date).await?;
        let (record, _) = self.compute_tank_day(tank_id, date, dip_cm, &log).await?;
        Ok(record)
    }

    /// Computes and saves a tank's record for `date`.
    ///
    /// Without a dip the record is saved as `Pending`; call again with the
    /// dip to settle it.
    pub async fn settle_tank_day(
        &self,
        tank_id: &str,
        date: NaiveDate,
        dip_cm: Option<Decimal>,
    ) -> ServiceResult<DailyStockRecord> {
        let log = self.load_day(date).await?;
        self.settle_with_log(tank_id, date, dip_cm, &log).await
    }

    /// Reconciles every active tank for `date`.
    ///
    /// `dips` maps tank id to dip reading; tanks without one come out
    /// `Pending`. One tank's failure is reported in its outcome and does not
    /// stop the others. Only failing to load the date's transactions or the
    /// tank list fails the whole call.
    pub async fn reconcile_day(
        &self,
        date: NaiveDate,
        dips: &HashMap<String, Decimal>,
        save: bool,
    ) -> ServiceResult<DayReport> {
        let log = self.load_day(date).await?;
        let tanks = self.master.active_tanks().await?;

        for tank_id in dips.keys() {
            if !tanks.iter().any(|tank| &tank.id == tank_id) {
                warn!(%tank_id, %date, "Dip given for a tank that is not active; ignored");
            }
        }

        let mut outcomes = Vec::with_capacity(tanks.len());
        for tank in &tanks {
            let dip_cm = dips.get(&tank.id).copied();
            let result = if save {
                self.settle_with_log(&tank.id, date, dip_cm, &log).await
            } else {
                self.compute_tank_day(&tank.id, date, dip_cm, &log)
                    .await
                    .map(|(record, _)| record)
            };

            if let Err(err) = &result {
                warn!(tank_id = %tank.id, %date, error = %err, "Tank reconciliation failed");
            }
            outcomes.push(TankOutcome::from_result(&tank.id, result));
        }

        let settled = outcomes
            .iter()
            .filter(|o| o.record.as_ref().is_some_and(DailyStockRecord::is_settled))
            .count();
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        let pending = outcomes.len() - settled - failed;

        info!(%date, save, settled, pending, failed, "Day reconciled");

        Ok(DayReport {
            date,
            saved: save,
            settled,
            pending,
            failed,
            outcomes,
        })
    }

    /// Volume in a tank for a dip, from its calibration table.
    pub async fn tank_volume(&self, tank_id: &str, dip_cm: Decimal) -> ServiceResult<Decimal> {
        validate_dip(dip_cm)?;
        let tank = self.master.tank(tank_id).await?;
        Ok(tank.calibration.volume_for_dip(dip_cm)?)
    }

    // -------------------------------------------------------------------------
    // Shift & Density
    // -------------------------------------------------------------------------

    /// Summarizes one shift, chained onto `previous_cumulative_shortage`.
    pub async fn shift_summary(
        &self,
        shift_id: &str,
        employee_id: &str,
        date: NaiveDate,
        previous_cumulative_shortage: Money,
    ) -> ServiceResult<ShiftSummary> {
        let ledger = self.transactions.shift_ledger(shift_id, employee_id, date).await?;
        Ok(summarize(&ledger, previous_cumulative_shortage))
    }

    /// Summarizes an employee's shifts in the given order.
    pub async fn shift_sequence(
        &self,
        shift_ids: &[String],
        employee_id: &str,
        date: NaiveDate,
        opening_cumulative_shortage: Money,
    ) -> ServiceResult<Vec<ShiftSummary>> {
        let mut ledgers = Vec::with_capacity(shift_ids.len());
        for shift_id in shift_ids {
            ledgers.push(self.transactions.shift_ledger(shift_id, employee_id, date).await?);
        }
        Ok(summarize_sequence(&ledgers, opening_cumulative_shortage))
    }

    /// Density check for a purchase line. `None` if none was taken.
    pub fn check_purchase_density(&self, line: &PurchaseLine) -> Option<DensityCheck> {
        line.density
            .as_ref()
            .map(|observation| observation.evaluate(self.density_tolerance))
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn load_day(&self, date: NaiveDate) -> ServiceResult<DayLog> {
        Ok(DayLog {
            purchases: self.transactions.purchase_lines_on(date).await?,
            readings: self.transactions.meter_readings_on(date).await?,
        })
    }

    /// Returns the record and the prior closing it was computed from.
    async fn compute_tank_day(
        &self,
        tank_id: &str,
        date: NaiveDate,
        dip_cm: Option<Decimal>,
        log: &DayLog,
    ) -> ServiceResult<(DailyStockRecord, Option<Decimal>)> {
        let tank = self.master.tank(tank_id).await?;
        if !tank.is_active {
            return Err(CoreError::TankInactive(tank.id).into());
        }

        let product = self.master.product(&tank.product_id).await?;
        validate_unit_price(product.unit_price)?;
        let nozzles = self.master.nozzles_for_tank(&tank.id).await?;

        validate_inputs(&tank, &nozzles, log)?;
        if let Some(dip) = dip_cm {
            validate_dip(dip)?;
        }

        let prior = match date.pred_opt() {
            Some(previous) => self.records.record_for(&tank.id, previous).await?,
            None => None,
        };

        let record = reconcile(&StockDayInputs {
            tank: &tank,
            date,
            prior: prior.as_ref(),
            purchases: &log.purchases,
            meter_readings: &log.readings,
            nozzles: &nozzles,
            unit_price: product.unit_price,
            dip_cm,
        })?;

        Ok((record, prior.map(|p| p.closing_stock)))
    }

    async fn settle_with_log(
        &self,
        tank_id: &str,
        date: NaiveDate,
        dip_cm: Option<Decimal>,
        log: &DayLog,
    ) -> ServiceResult<DailyStockRecord> {
        let (record, expected_opening) = self.compute_tank_day(tank_id, date, dip_cm, log).await?;
        self.records.save_record(&record, expected_opening).await?;

        info!(
            tank_id = %record.tank_id,
            %date,
            status = record.status.as_str(),
            closing_stock = %record.closing_stock,
            "Stock record saved"
        );
        Ok(record)
    }
}

/// Boundary checks on the lines that feed this tank's figures.
fn validate_inputs(tank: &Tank, nozzles: &[Nozzle], log: &DayLog) -> Result<(), ValidationError> {
    for line in log.purchases.iter().filter(|line| line.decant_tank_id == tank.id) {
        validate_purchase_line(line)?;
    }

    for reading in log
        .readings
        .iter()
        .filter(|reading| nozzles.iter().any(|nozzle| nozzle.id == reading.nozzle_id))
    {
        validate_meter_reading(reading)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{CalibrationPoint, CalibrationTable};
    use crate::density::DensityObservation;
    use crate::ports::StoreResult;
    use crate::shift::{LedgerLine, ShiftLedger};
    use crate::types::{FuelProduct, StockRecordStatus};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// In-memory implementation of every port.
    #[derive(Default)]
    struct MemoryStore {
        tanks: Vec<Tank>,
        products: Vec<FuelProduct>,
        nozzles: Vec<Nozzle>,
        purchases: Vec<PurchaseLine>,
        readings: Vec<MeterReading>,
        ledgers: Vec<ShiftLedger>,
        records: Mutex<HashMap<(String, NaiveDate), DailyStockRecord>>,
    }

    #[async_trait]
    impl MasterData for MemoryStore {
        async fn tank(&self, tank_id: &str) -> StoreResult<Tank> {
            self.tanks
                .iter()
                .find(|t| t.id == tank_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    entity: "tank".to_string(),
                    id: tank_id.to_string(),
                })
        }

        async fn active_tanks(&self) -> StoreResult<Vec<Tank>> {
            Ok(self.tanks.iter().filter(|t| t.is_active).cloned().collect())
        }

        async fn product(&self, product_id: &str) -> StoreResult<FuelProduct> {
            self.products
                .iter()
                .find(|p| p.id == product_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    entity: "product".to_string(),
                    id: product_id.to_string(),
                })
        }

        async fn nozzles_for_tank(&self, tank_id: &str) -> StoreResult<Vec<Nozzle>> {
            Ok(self.nozzles.iter().filter(|n| n.tank_id == tank_id).cloned().collect())
        }
    }

    #[async_trait]
    impl TransactionLog for MemoryStore {
        async fn purchase_lines_on(&self, date: NaiveDate) -> StoreResult<Vec<PurchaseLine>> {
            Ok(self.purchases.iter().filter(|p| p.invoice_date == date).cloned().collect())
        }

        async fn meter_readings_on(&self, date: NaiveDate) -> StoreResult<Vec<MeterReading>> {
            Ok(self.readings.iter().filter(|r| r.date == date).cloned().collect())
        }

        async fn shift_ledger(&self, shift_id: &str, employee_id: &str, date: NaiveDate) -> StoreResult<ShiftLedger> {
            Ok(self
                .ledgers
                .iter()
                .find(|l| l.shift_id == shift_id && l.employee_id == employee_id && l.date == date)
                .cloned()
                .unwrap_or_else(|| ShiftLedger::new(shift_id, employee_id, date)))
        }
    }

    #[async_trait]
    impl StockRecordStore for MemoryStore {
        async fn record_for(&self, tank_id: &str, date: NaiveDate) -> StoreResult<Option<DailyStockRecord>> {
            let records = self.records.lock().unwrap();
            Ok(records.get(&(tank_id.to_string(), date)).cloned())
        }

        async fn save_record(&self, record: &DailyStockRecord, expected_opening: Option<Decimal>) -> StoreResult<()> {
            let mut records = self.records.lock().unwrap();
            let prior = record
                .date
                .pred_opt()
                .and_then(|previous| records.get(&(record.tank_id.clone(), previous)))
                .map(|p| p.closing_stock);
            if prior != expected_opening {
                return Err(StoreError::Conflict("prior closing stock changed".to_string()));
            }
            records.insert((record.tank_id.clone(), record.date), record.clone());
            Ok(())
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn tank(id: &str, product: &str, active: bool) -> Tank {
        Tank {
            id: id.to_string(),
            name: format!("Tank {}", id),
            product_id: product.to_string(),
            calibration: CalibrationTable::new(vec![
                CalibrationPoint::new(dec!(0), dec!(0)),
                CalibrationPoint::new(dec!(50), dec!(5000)),
                CalibrationPoint::new(dec!(100), dec!(9500)),
            ])
            .unwrap(),
            last_known_closing_stock: dec!(4000),
            is_active: active,
        }
    }

    fn reading(nozzle: &str, date: NaiveDate, opening: Decimal, closing: Decimal) -> MeterReading {
        MeterReading {
            id: format!("{}-{}", nozzle, date),
            nozzle_id: nozzle.to_string(),
            date,
            shift_id: "day".to_string(),
            opening_reading: opening,
            closing_reading: closing,
            test_quantity: Decimal::ZERO,
        }
    }

    fn outlet() -> MemoryStore {
        MemoryStore {
            tanks: vec![tank("T1", "MS", true), tank("T2", "HSD", true), tank("T3", "MS", false)],
            products: vec![
                FuelProduct {
                    id: "MS".to_string(),
                    name: "Petrol".to_string(),
                    unit_price: Money::from_cents(10_000),
                },
                FuelProduct {
                    id: "HSD".to_string(),
                    name: "Diesel".to_string(),
                    unit_price: Money::from_cents(9_000),
                },
            ],
            nozzles: vec![
                Nozzle {
                    id: "N1".to_string(),
                    tank_id: "T1".to_string(),
                    label: "MS-1".to_string(),
                },
                Nozzle {
                    id: "N2".to_string(),
                    tank_id: "T2".to_string(),
                    label: "HSD-1".to_string(),
                },
            ],
            purchases: vec![PurchaseLine {
                id: "P1".to_string(),
                invoice_number: "INV-1".to_string(),
                invoice_date: day(2),
                product_id: "MS".to_string(),
                decant_tank_id: "T1".to_string(),
                quantity_liters: dec!(3000),
                density: Some(DensityObservation::new(dec!(0.755), dec!(30)).with_reference(dec!(0.75))),
            }],
            readings: vec![
                reading("N1", day(1), dec!(0), dec!(1000)),
                reading("N1", day(2), dec!(1000), dec!(2500)),
                reading("N2", day(1), dec!(0), dec!(500)),
            ],
            ..MemoryStore::default()
        }
    }

    fn service(store: MemoryStore) -> (ReconciliationService, Arc<MemoryStore>) {
        let store = Arc::new(store);
        let service = ReconciliationService::new(store.clone(), store.clone(), store.clone());
        (service, store)
    }

    #[tokio::test]
    async fn test_settle_chains_days() {
        let (service, _) = service(outlet());

        let first = service.settle_tank_day("T1", day(1), Some(dec!(29))).await.unwrap();
        assert_eq!(first.opening_stock, dec!(4000));
        assert_eq!(first.closing_stock, dec!(3000));
        assert_eq!(first.variance_liters, Some(dec!(-100)));
        assert_eq!(first.status, StockRecordStatus::Settled);

        let second = service.settle_tank_day("T1", day(2), None).await.unwrap();
        assert_eq!(second.opening_stock, first.closing_stock);
        assert_eq!(second.receipt, dec!(3000));
        assert_eq!(second.closing_stock, dec!(4500));
        assert_eq!(second.status, StockRecordStatus::Pending);
    }

    #[tokio::test]
    async fn test_preview_does_not_save() {
        let (service, store) = service(outlet());

        service.preview_tank_day("T1", day(1), None).await.unwrap();
        assert!(store.record_for("T1", day(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_chain_is_rejected() {
        let (service, store) = service(outlet());
        service.settle_tank_day("T1", day(1), None).await.unwrap();
        let second = service.settle_tank_day("T1", day(2), None).await.unwrap();

        // Day 1 gets re-settled with a different figure after day 2 was computed.
        let mut changed = store.record_for("T1", day(1)).await.unwrap().unwrap();
        changed.closing_stock = dec!(2900);
        store.records.lock().unwrap().insert(("T1".to_string(), day(1)), changed);

        let err = store
            .save_record(&second, Some(second.opening_stock))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // Recomputing picks up the new opening.
        let recomputed = service.settle_tank_day("T1", day(2), None).await.unwrap();
        assert_eq!(recomputed.opening_stock, dec!(2900));
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let (service, _) = service(outlet());
        let dips = HashMap::from([
            ("T1".to_string(), dec!(150)), // out of range
            ("T2".to_string(), dec!(35)),
        ]);

        let report = service.reconcile_day(day(1), &dips, true).await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.settled, 1);
        assert_eq!(report.pending, 0);

        let t1 = &report.outcomes[0];
        assert_eq!(t1.tank_id, "T1");
        let message = t1.error.as_ref().unwrap();
        assert_eq!(message.field, "dip_cm");
        assert!(message.message.contains("0–100 cm"));

        let t2 = report.outcomes[1].record.as_ref().unwrap();
        assert_eq!(t2.closing_stock, dec!(3500));
        assert_eq!(t2.dip_volume, Some(dec!(3500)));
        assert_eq!(t2.variance_amount, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_invalid_meter_reading_fails_only_that_tank() {
        let mut store = outlet();
        store.readings.push(reading("N2", day(1), dec!(900), dec!(800)));
        let (service, _) = service(store);

        let report = service.reconcile_day(day(1), &HashMap::new(), false).await.unwrap();

        assert!(!report.saved);
        assert_eq!(report.pending, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcomes[1].error.as_ref().unwrap().field, "closing_reading");
    }

    #[tokio::test]
    async fn test_inactive_and_unknown_tanks() {
        let (service, _) = service(outlet());

        let inactive = service.preview_tank_day("T3", day(1), None).await.unwrap_err();
        assert_eq!(inactive, ServiceError::Core(CoreError::TankInactive("T3".to_string())));

        let missing = service.preview_tank_day("T9", day(1), None).await.unwrap_err();
        assert_eq!(missing.field_message().field, "tank_id");
    }

    #[tokio::test]
    async fn test_shift_summary_through_log() {
        let mut store = outlet();
        let mut ledger = ShiftLedger::new("morning", "E1", day(1));
        ledger.liquid_sales.push(LedgerLine::new("1000"));
        ledger.cash_handovers.push(LedgerLine::new("950"));
        store.ledgers.push(ledger);
        let (service, _) = service(store);

        let summary = service
            .shift_summary("morning", "E1", day(1), Money::from_major(20))
            .await
            .unwrap();
        assert_eq!(summary.shift_short, Money::from_major(50));
        assert_eq!(summary.overall_shortage, Money::from_major(70));

        let sequence = service
            .shift_sequence(&["morning".to_string(), "evening".to_string()], "E1", day(1), Money::zero())
            .await
            .unwrap();
        assert_eq!(sequence[1].overall_shortage, Money::from_major(50));
    }

    #[tokio::test]
    async fn test_purchase_density_check() {
        let store = outlet();
        let line = store.purchases[0].clone();
        let (service, _) = service(store);

        let Some(DensityCheck::Measured(reading)) = service.check_purchase_density(&line) else {
            panic!("expected a measured density");
        };
        assert_eq!(reading.within_tolerance, Some(false));

        let lenient = service.with_density_tolerance(dec!(0.005));
        let Some(DensityCheck::Measured(reading)) = lenient.check_purchase_density(&line) else {
            panic!("expected a measured density");
        };
        assert_eq!(reading.within_tolerance, Some(true));
    }

    #[tokio::test]
    async fn test_tank_volume() {
        let (service, _) = service(outlet());
        assert_eq!(service.tank_volume("T1", dec!(75)).await.unwrap(), dec!(7250));
        assert!(service.tank_volume("T1", dec!(-1)).await.is_err());
    }
}
