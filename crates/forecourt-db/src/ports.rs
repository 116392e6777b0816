//! # Port Implementations
//!
//! Implements `forecourt-core`'s ports on [`Database`] by delegating to the
//! repositories and mapping `DbError` into `StoreError`.

use async_trait::async_trait;
use chrono::NaiveDate;
use forecourt_core::{
    DailyStockRecord, FuelProduct, MasterData, MeterReading, Nozzle, PurchaseLine, ShiftLedger, StockRecordStore,
    StoreResult, Tank, TransactionLog,
};
use rust_decimal::Decimal;

use crate::error::DbError;
use crate::pool::Database;

#[async_trait]
impl MasterData for Database {
    async fn tank(&self, tank_id: &str) -> StoreResult<Tank> {
        self.master()
            .get_tank(tank_id)
            .await?
            .ok_or_else(|| DbError::not_found("tank", tank_id).into())
    }

    async fn active_tanks(&self) -> StoreResult<Vec<Tank>> {
        Ok(self.master().list_active_tanks().await?)
    }

    async fn product(&self, product_id: &str) -> StoreResult<FuelProduct> {
        self.master()
            .get_product(product_id)
            .await?
            .ok_or_else(|| DbError::not_found("product", product_id).into())
    }

    async fn nozzles_for_tank(&self, tank_id: &str) -> StoreResult<Vec<Nozzle>> {
        Ok(self.master().list_nozzles(tank_id).await?)
    }
}

#[async_trait]
impl TransactionLog for Database {
    async fn purchase_lines_on(&self, date: NaiveDate) -> StoreResult<Vec<PurchaseLine>> {
        Ok(self.transactions().purchase_lines_on(date).await?)
    }

    async fn meter_readings_on(&self, date: NaiveDate) -> StoreResult<Vec<MeterReading>> {
        Ok(self.transactions().meter_readings_on(date).await?)
    }

    async fn shift_ledger(&self, shift_id: &str, employee_id: &str, date: NaiveDate) -> StoreResult<ShiftLedger> {
        Ok(self.shift_ledgers().get(shift_id, employee_id, date).await?)
    }
}

#[async_trait]
impl StockRecordStore for Database {
    async fn record_for(&self, tank_id: &str, date: NaiveDate) -> StoreResult<Option<DailyStockRecord>> {
        Ok(self.stock_records().get(tank_id, date).await?)
    }

    async fn save_record(&self, record: &DailyStockRecord, expected_opening: Option<Decimal>) -> StoreResult<()> {
        Ok(self.stock_records().save(record, expected_opening).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use forecourt_core::density::DensityObservation;
    use forecourt_core::shift::{ExpenseDirection, LedgerLine, LubeMode, ModalLine};
    use forecourt_core::{CalibrationPoint, CalibrationTable, Money, ReconciliationService, StockRecordStatus, StoreError};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    async fn outlet() -> Database {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();
        let master = db.master();

        master
            .upsert_product(&FuelProduct {
                id: "MS".to_string(),
                name: "Petrol".to_string(),
                unit_price: Money::from_cents(10_000),
            })
            .await
            .unwrap();
        master
            .upsert_tank(&Tank {
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
            })
            .await
            .unwrap();
        master
            .upsert_nozzle(&Nozzle {
                id: "N1".to_string(),
                tank_id: "T1".to_string(),
                label: "MS-1".to_string(),
            })
            .await
            .unwrap();

        let transactions = db.transactions();
        transactions
            .insert_purchase_line(&PurchaseLine {
                id: "P1".to_string(),
                invoice_number: "INV-1".to_string(),
                invoice_date: day(2),
                product_id: "MS".to_string(),
                decant_tank_id: "T1".to_string(),
                quantity_liters: dec!(3000.50),
                density: Some(DensityObservation::new(dec!(0.755), dec!(30)).with_reference(dec!(0.75))),
            })
            .await
            .unwrap();
        for (d, opening, closing) in [(1, dec!(0), dec!(1000.25)), (2, dec!(1000.25), dec!(2500.25))] {
            transactions
                .insert_meter_reading(&MeterReading {
                    id: format!("R{}", d),
                    nozzle_id: "N1".to_string(),
                    date: day(d),
                    shift_id: "day".to_string(),
                    opening_reading: opening,
                    closing_reading: closing,
                    test_quantity: dec!(0),
                })
                .await
                .unwrap();
        }

        db
    }

    fn service(db: &Database) -> ReconciliationService {
        let db = Arc::new(db.clone());
        ReconciliationService::new(db.clone(), db.clone(), db)
    }

    #[tokio::test]
    async fn test_master_data_round_trip() {
        let db = outlet().await;

        let tank = db.tank("T1").await.unwrap();
        assert_eq!(tank.calibration.max_dip(), dec!(100));
        assert_eq!(tank.last_known_closing_stock, dec!(4000));
        assert_eq!(db.active_tanks().await.unwrap().len(), 1);
        assert_eq!(db.nozzles_for_tank("T1").await.unwrap().len(), 1);

        let missing = db.tank("T9").await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_purchase_density_round_trip() {
        let db = outlet().await;

        let lines = db.purchase_lines_on(day(2)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity_liters, dec!(3000.50));
        let density = lines[0].density.as_ref().unwrap();
        assert_eq!(density.observed_density, Some(dec!(0.755)));
        assert_eq!(density.reference_density_at_15c, Some(dec!(0.75)));

        assert!(db.purchase_lines_on(day(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settle_days_through_sqlite() {
        let db = outlet().await;
        let service = service(&db);

        let first = service.settle_tank_day("T1", day(1), Some(dec!(29.9))).await.unwrap();
        assert_eq!(first.closing_stock, dec!(2999.75));
        assert_eq!(first.dip_volume, Some(dec!(2990)));
        assert_eq!(first.variance_liters, Some(dec!(-9.75)));
        assert_eq!(first.variance_amount, Some(Money::from_cents(-97_500)));

        let report = service.reconcile_day(day(2), &HashMap::new(), true).await.unwrap();
        assert_eq!(report.pending, 1);
        let second = report.outcomes[0].record.clone().unwrap();
        assert_eq!(second.opening_stock, first.closing_stock);
        assert_eq!(second.closing_stock, dec!(2999.75) + dec!(3000.50) - dec!(1500));

        let stored = db.record_for("T1", day(2)).await.unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.status, StockRecordStatus::Pending);

        let history = db.stock_records().list_for_tank("T1", day(1), day(2)).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], first);
    }

    #[tokio::test]
    async fn test_save_rejects_broken_chain() {
        let db = outlet().await;
        let service = service(&db);

        service.settle_tank_day("T1", day(1), None).await.unwrap();
        let second = service.preview_tank_day("T1", day(2), None).await.unwrap();

        // Saved as if no prior existed, but day 1 is stored.
        let err = db.save_record(&second, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(db.record_for("T1", day(2)).await.unwrap().is_none());

        db.save_record(&second, Some(second.opening_stock)).await.unwrap();
        assert!(db.record_for("T1", day(2)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_resettle_replaces_record() {
        let db = outlet().await;
        let service = service(&db);

        service.settle_tank_day("T1", day(1), None).await.unwrap();
        let settled = service.settle_tank_day("T1", day(1), Some(dec!(30))).await.unwrap();

        let stored = db.record_for("T1", day(1)).await.unwrap().unwrap();
        assert_eq!(stored, settled);
        assert!(stored.is_settled());
        assert_eq!(db.stock_records().list_for_tank("T1", day(1), day(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shift_ledger_round_trip() {
        let db = outlet().await;
        let mut ledger = ShiftLedger::new("morning", "E1", day(1));
        ledger.liquid_sales.push(LedgerLine::new("10000"));
        ledger.lube_sales.push(ModalLine::new(LubeMode::Cash, "500"));
        ledger.lube_sales.push(ModalLine::new(LubeMode::Credit, "12O"));
        ledger.expenses.push(ModalLine::new(ExpenseDirection::CashOut, "300"));
        ledger.cash_handovers.push(LedgerLine::default());

        db.shift_ledgers().save(&ledger).await.unwrap();
        let loaded = db.shift_ledger("morning", "E1", day(1)).await.unwrap();
        assert_eq!(loaded, ledger);

        let summary = service(&db)
            .shift_summary("morning", "E1", day(1), Money::zero())
            .await
            .unwrap();
        assert_eq!(summary.cash_inflow, Money::from_major(10_500));
        assert_eq!(summary.malformed.len(), 1);

        let empty = db.shift_ledger("evening", "E1", day(1)).await.unwrap();
        assert_eq!(empty, ShiftLedger::new("evening", "E1", day(1)));
    }
}
