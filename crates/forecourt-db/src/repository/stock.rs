//! # Daily Stock Record Repository
//!
//! Loads and saves [`DailyStockRecord`]s, one per tank per date.
//!
//! ## Compare-and-Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save(record for D, expected_opening)                                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    SELECT closing_stock FROM record (tank, D-1)   ─► found             │
//! │    found != expected_opening ?  ──► ROLLBACK, ChainConflict            │
//! │    INSERT ... ON CONFLICT(tank_id, date) DO UPDATE                      │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  The prior read and the write happen in one transaction, so two        │
//! │  saves can never chain from different versions of day D-1.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use forecourt_core::{DailyStockRecord, Money, StockRecordStatus};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

use super::{parse_decimal, parse_optional_decimal};
use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct StockRecordRow {
    id: String,
    tank_id: String,
    product_id: String,
    date: NaiveDate,
    opening_stock: String,
    receipt: String,
    meter_sale: String,
    total_stock: String,
    closing_stock: String,
    dip_cm: Option<String>,
    dip_volume: Option<String>,
    variance_liters: Option<String>,
    variance_amount_cents: Option<i64>,
    unit_price_cents: i64,
    status: String,
}

impl TryFrom<StockRecordRow> for DailyStockRecord {
    type Error = DbError;

    fn try_from(row: StockRecordRow) -> DbResult<Self> {
        Ok(DailyStockRecord {
            opening_stock: parse_decimal("daily_stock_records.opening_stock", &row.opening_stock)?,
            receipt: parse_decimal("daily_stock_records.receipt", &row.receipt)?,
            meter_sale: parse_decimal("daily_stock_records.meter_sale", &row.meter_sale)?,
            total_stock: parse_decimal("daily_stock_records.total_stock", &row.total_stock)?,
            closing_stock: parse_decimal("daily_stock_records.closing_stock", &row.closing_stock)?,
            dip_cm: parse_optional_decimal("daily_stock_records.dip_cm", row.dip_cm.as_deref())?,
            dip_volume: parse_optional_decimal("daily_stock_records.dip_volume", row.dip_volume.as_deref())?,
            variance_liters: parse_optional_decimal(
                "daily_stock_records.variance_liters",
                row.variance_liters.as_deref(),
            )?,
            variance_amount: row.variance_amount_cents.map(Money::from_cents),
            unit_price: Money::from_cents(row.unit_price_cents),
            status: row
                .status
                .parse::<StockRecordStatus>()
                .map_err(|e| DbError::invalid("daily_stock_records.status", e))?,
            id: row.id,
            tank_id: row.tank_id,
            product_id: row.product_id,
            date: row.date,
        })
    }
}

const RECORD_COLUMNS: &str = "id, tank_id, product_id, date, opening_stock, receipt, meter_sale, \
    total_stock, closing_stock, dip_cm, dip_volume, variance_liters, variance_amount_cents, \
    unit_price_cents, status";

/// Repository for daily stock records.
#[derive(Debug, Clone)]
pub struct StockRecordRepository {
    pool: SqlitePool,
}

impl StockRecordRepository {
    /// Creates a new StockRecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRecordRepository { pool }
    }

    /// Gets the record for a tank on a date.
    pub async fn get(&self, tank_id: &str, date: NaiveDate) -> DbResult<Option<DailyStockRecord>> {
        let row = sqlx::query_as::<_, StockRecordRow>(&format!(
            "SELECT {} FROM daily_stock_records WHERE tank_id = ?1 AND date = ?2",
            RECORD_COLUMNS
        ))
        .bind(tank_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DailyStockRecord::try_from).transpose()
    }

    /// Lists a tank's records between two dates (inclusive), oldest first.
    pub async fn list_for_tank(&self, tank_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyStockRecord>> {
        let rows = sqlx::query_as::<_, StockRecordRow>(&format!(
            "SELECT {} FROM daily_stock_records WHERE tank_id = ?1 AND date BETWEEN ?2 AND ?3 ORDER BY date",
            RECORD_COLUMNS
        ))
        .bind(tank_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DailyStockRecord::try_from).collect()
    }

    /// Saves a record if the prior day's closing is still `expected_opening`.
    ///
    /// ## Errors
    /// `ChainConflict` when the stored prior closing (or its absence) differs
    /// from `expected_opening`. Nothing is written in that case.
    pub async fn save(&self, record: &DailyStockRecord, expected_opening: Option<Decimal>) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let found = match record.date.pred_opt() {
            Some(previous) => {
                let closing: Option<String> = sqlx::query_scalar(
                    "SELECT closing_stock FROM daily_stock_records WHERE tank_id = ?1 AND date = ?2",
                )
                .bind(&record.tank_id)
                .bind(previous)
                .fetch_optional(&mut *tx)
                .await?;
                closing
                    .map(|c| parse_decimal("daily_stock_records.closing_stock", &c))
                    .transpose()?
            }
            None => None,
        };

        if found != expected_opening {
            warn!(
                tank_id = %record.tank_id,
                date = %record.date,
                ?expected_opening,
                ?found,
                "Stock chain changed since the record was computed"
            );
            return Err(DbError::ChainConflict {
                tank_id: record.tank_id.clone(),
                date: record.date,
                expected: expected_opening,
                found,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO daily_stock_records (
                id, tank_id, product_id, date, opening_stock, receipt, meter_sale,
                total_stock, closing_stock, dip_cm, dip_volume, variance_liters,
                variance_amount_cents, unit_price_cents, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(tank_id, date) DO UPDATE SET
                opening_stock = excluded.opening_stock,
                receipt = excluded.receipt,
                meter_sale = excluded.meter_sale,
                total_stock = excluded.total_stock,
                closing_stock = excluded.closing_stock,
                dip_cm = excluded.dip_cm,
                dip_volume = excluded.dip_volume,
                variance_liters = excluded.variance_liters,
                variance_amount_cents = excluded.variance_amount_cents,
                unit_price_cents = excluded.unit_price_cents,
                status = excluded.status,
                updated_at = datetime('now')
            "#,
        )
        .bind(&record.id)
        .bind(&record.tank_id)
        .bind(&record.product_id)
        .bind(record.date)
        .bind(record.opening_stock.to_string())
        .bind(record.receipt.to_string())
        .bind(record.meter_sale.to_string())
        .bind(record.total_stock.to_string())
        .bind(record.closing_stock.to_string())
        .bind(record.dip_cm.map(|d| d.to_string()))
        .bind(record.dip_volume.map(|v| v.to_string()))
        .bind(record.variance_liters.map(|v| v.to_string()))
        .bind(record.variance_amount.map(|m| m.cents()))
        .bind(record.unit_price.cents())
        .bind(record.status.as_str())
        .execute(&mut *tx)
        .await?;

        // A later day chained from the old closing is now stale.
        let next_opening: Option<String> = match record.date.succ_opt() {
            Some(next) => {
                sqlx::query_scalar("SELECT opening_stock FROM daily_stock_records WHERE tank_id = ?1 AND date = ?2")
                    .bind(&record.tank_id)
                    .bind(next)
                    .fetch_optional(&mut *tx)
                    .await?
            }
            None => None,
        };

        tx.commit().await?;

        if let Some(next_opening) = next_opening {
            if parse_decimal("daily_stock_records.opening_stock", &next_opening)? != record.closing_stock {
                warn!(
                    tank_id = %record.tank_id,
                    date = %record.date,
                    "Next day's record no longer chains from this closing stock; re-settle it"
                );
            }
        }

        info!(
            tank_id = %record.tank_id,
            date = %record.date,
            status = record.status.as_str(),
            "Stock record stored"
        );
        Ok(())
    }
}
