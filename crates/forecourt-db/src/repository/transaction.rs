//! # Transaction Repository
//!
//! Purchase lines (with their decant density check) and nozzle meter
//! readings, queried by business date.

use chrono::NaiveDate;
use forecourt_core::density::DensityObservation;
use forecourt_core::validation::{validate_meter_reading, validate_purchase_line};
use forecourt_core::{MeterReading, PurchaseLine};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use super::{parse_decimal, parse_optional_decimal};
use crate::error::{DbError, DbResult};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct PurchaseLineRow {
    id: String,
    invoice_number: String,
    invoice_date: NaiveDate,
    product_id: String,
    decant_tank_id: String,
    quantity_liters: String,
    observed_density: Option<String>,
    observed_temperature_c: Option<String>,
    reference_density_at_15c: Option<String>,
}

impl TryFrom<PurchaseLineRow> for PurchaseLine {
    type Error = DbError;

    fn try_from(row: PurchaseLineRow) -> DbResult<Self> {
        let density = DensityObservation {
            observed_density: parse_optional_decimal("purchase_lines.observed_density", row.observed_density.as_deref())?,
            observed_temperature_c: parse_optional_decimal(
                "purchase_lines.observed_temperature_c",
                row.observed_temperature_c.as_deref(),
            )?,
            reference_density_at_15c: parse_optional_decimal(
                "purchase_lines.reference_density_at_15c",
                row.reference_density_at_15c.as_deref(),
            )?,
        };
        // All three blank means no check was taken.
        let density = (density != DensityObservation::default()).then_some(density);

        Ok(PurchaseLine {
            quantity_liters: parse_decimal("purchase_lines.quantity_liters", &row.quantity_liters)?,
            id: row.id,
            invoice_number: row.invoice_number,
            invoice_date: row.invoice_date,
            product_id: row.product_id,
            decant_tank_id: row.decant_tank_id,
            density,
        })
    }
}

#[derive(Debug, FromRow)]
struct MeterReadingRow {
    id: String,
    nozzle_id: String,
    date: NaiveDate,
    shift_id: String,
    opening_reading: String,
    closing_reading: String,
    test_quantity: String,
}

impl TryFrom<MeterReadingRow> for MeterReading {
    type Error = DbError;

    fn try_from(row: MeterReadingRow) -> DbResult<Self> {
        Ok(MeterReading {
            opening_reading: parse_decimal("meter_readings.opening_reading", &row.opening_reading)?,
            closing_reading: parse_decimal("meter_readings.closing_reading", &row.closing_reading)?,
            test_quantity: parse_decimal("meter_readings.test_quantity", &row.test_quantity)?,
            id: row.id,
            nozzle_id: row.nozzle_id,
            date: row.date,
            shift_id: row.shift_id,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for purchases and meter readings.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Purchase lines invoiced on `date`.
    pub async fn purchase_lines_on(&self, date: NaiveDate) -> DbResult<Vec<PurchaseLine>> {
        let rows = sqlx::query_as::<_, PurchaseLineRow>(
            r#"
            SELECT id, invoice_number, invoice_date, product_id, decant_tank_id,
                   quantity_liters, observed_density, observed_temperature_c,
                   reference_density_at_15c
            FROM purchase_lines
            WHERE invoice_date = ?1
            ORDER BY invoice_number, id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        debug!(%date, count = rows.len(), "Loaded purchase lines");
        rows.into_iter().map(PurchaseLine::try_from).collect()
    }

    /// Meter readings dated `date`.
    pub async fn meter_readings_on(&self, date: NaiveDate) -> DbResult<Vec<MeterReading>> {
        let rows = sqlx::query_as::<_, MeterReadingRow>(
            r#"
            SELECT id, nozzle_id, date, shift_id, opening_reading, closing_reading, test_quantity
            FROM meter_readings
            WHERE date = ?1
            ORDER BY nozzle_id, shift_id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        debug!(%date, count = rows.len(), "Loaded meter readings");
        rows.into_iter().map(MeterReading::try_from).collect()
    }

    /// Records a purchase line.
    pub async fn insert_purchase_line(&self, line: &PurchaseLine) -> DbResult<()> {
        validate_purchase_line(line).map_err(|e| DbError::invalid("purchase_lines", e))?;
        let density = line.density.clone().unwrap_or_default();

        sqlx::query(
            r#"
            INSERT INTO purchase_lines (
                id, invoice_number, invoice_date, product_id, decant_tank_id,
                quantity_liters, observed_density, observed_temperature_c,
                reference_density_at_15c
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.invoice_number)
        .bind(line.invoice_date)
        .bind(&line.product_id)
        .bind(&line.decant_tank_id)
        .bind(line.quantity_liters.to_string())
        .bind(density.observed_density.map(|d| d.to_string()))
        .bind(density.observed_temperature_c.map(|t| t.to_string()))
        .bind(density.reference_density_at_15c.map(|r| r.to_string()))
        .execute(&self.pool)
        .await?;

        debug!(line_id = %line.id, tank_id = %line.decant_tank_id, "Purchase line saved");
        Ok(())
    }

    /// Records a meter reading.
    pub async fn insert_meter_reading(&self, reading: &MeterReading) -> DbResult<()> {
        validate_meter_reading(reading).map_err(|e| DbError::invalid("meter_readings", e))?;

        sqlx::query(
            r#"
            INSERT INTO meter_readings (
                id, nozzle_id, date, shift_id, opening_reading, closing_reading, test_quantity
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&reading.id)
        .bind(&reading.nozzle_id)
        .bind(reading.date)
        .bind(&reading.shift_id)
        .bind(reading.opening_reading.to_string())
        .bind(reading.closing_reading.to_string())
        .bind(reading.test_quantity.to_string())
        .execute(&self.pool)
        .await?;

        debug!(reading_id = %reading.id, nozzle_id = %reading.nozzle_id, "Meter reading saved");
        Ok(())
    }
}
