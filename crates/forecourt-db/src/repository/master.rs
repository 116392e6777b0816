//! # Master Data Repository
//!
//! Fuel products, tanks (with calibration tables) and nozzles.
//!
//! Master data is maintained outside Forecourt; the write methods here exist
//! for setup and seeding.

use forecourt_core::validation::{validate_tank, validate_unit_price};
use forecourt_core::{CalibrationTable, FuelProduct, Money, Nozzle, Tank};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use super::parse_decimal;
use crate::error::{DbError, DbResult};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    unit_price_cents: i64,
}

impl From<ProductRow> for FuelProduct {
    fn from(row: ProductRow) -> Self {
        FuelProduct {
            id: row.id,
            name: row.name,
            unit_price: Money::from_cents(row.unit_price_cents),
        }
    }
}

#[derive(Debug, FromRow)]
struct TankRow {
    id: String,
    name: String,
    product_id: String,
    calibration_json: String,
    opening_stock: String,
    is_active: bool,
}

impl TryFrom<TankRow> for Tank {
    type Error = DbError;

    fn try_from(row: TankRow) -> DbResult<Self> {
        // Deserializing runs CalibrationTable's validation.
        let calibration: CalibrationTable =
            serde_json::from_str(&row.calibration_json).map_err(|e| DbError::invalid("tanks.calibration_json", e))?;

        Ok(Tank {
            last_known_closing_stock: parse_decimal("tanks.opening_stock", &row.opening_stock)?,
            id: row.id,
            name: row.name,
            product_id: row.product_id,
            calibration,
            is_active: row.is_active,
        })
    }
}

#[derive(Debug, FromRow)]
struct NozzleRow {
    id: String,
    tank_id: String,
    label: String,
}

impl From<NozzleRow> for Nozzle {
    fn from(row: NozzleRow) -> Self {
        Nozzle {
            id: row.id,
            tank_id: row.tank_id,
            label: row.label,
        }
    }
}

const TANK_COLUMNS: &str = "id, name, product_id, calibration_json, opening_stock, is_active";

// =============================================================================
// Repository
// =============================================================================

/// Repository for master data.
#[derive(Debug, Clone)]
pub struct MasterRepository {
    pool: SqlitePool,
}

impl MasterRepository {
    /// Creates a new MasterRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MasterRepository { pool }
    }

    /// Gets a tank by ID.
    pub async fn get_tank(&self, id: &str) -> DbResult<Option<Tank>> {
        let row = sqlx::query_as::<_, TankRow>(&format!("SELECT {} FROM tanks WHERE id = ?1", TANK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Tank::try_from).transpose()
    }

    /// Lists active tanks ordered by ID.
    pub async fn list_active_tanks(&self) -> DbResult<Vec<Tank>> {
        let rows = sqlx::query_as::<_, TankRow>(&format!(
            "SELECT {} FROM tanks WHERE is_active = 1 ORDER BY id",
            TANK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Loaded active tanks");
        rows.into_iter().map(Tank::try_from).collect()
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: &str) -> DbResult<Option<FuelProduct>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT id, name, unit_price_cents FROM fuel_products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(FuelProduct::from))
    }

    /// Lists the nozzles drawing from a tank.
    pub async fn list_nozzles(&self, tank_id: &str) -> DbResult<Vec<Nozzle>> {
        let rows = sqlx::query_as::<_, NozzleRow>("SELECT id, tank_id, label FROM nozzles WHERE tank_id = ?1 ORDER BY id")
            .bind(tank_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Nozzle::from).collect())
    }

    /// Inserts or updates a product.
    pub async fn upsert_product(&self, product: &FuelProduct) -> DbResult<()> {
        validate_unit_price(product.unit_price).map_err(|e| DbError::invalid("fuel_products.unit_price_cents", e))?;

        sqlx::query(
            r#"
            INSERT INTO fuel_products (id, name, unit_price_cents)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                unit_price_cents = excluded.unit_price_cents,
                updated_at = datetime('now')
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .execute(&self.pool)
        .await?;

        info!(product_id = %product.id, price = %product.unit_price, "Product saved");
        Ok(())
    }

    /// Inserts or updates a tank.
    ///
    /// The calibration table is valid by construction; the rest of the tank
    /// is checked here so an invalid tank never becomes active.
    pub async fn upsert_tank(&self, tank: &Tank) -> DbResult<()> {
        validate_tank(tank).map_err(|e| DbError::invalid("tanks", e))?;
        let calibration_json =
            serde_json::to_string(&tank.calibration).map_err(|e| DbError::invalid("tanks.calibration_json", e))?;

        sqlx::query(
            r#"
            INSERT INTO tanks (id, name, product_id, calibration_json, opening_stock, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                product_id = excluded.product_id,
                calibration_json = excluded.calibration_json,
                opening_stock = excluded.opening_stock,
                is_active = excluded.is_active,
                updated_at = datetime('now')
            "#,
        )
        .bind(&tank.id)
        .bind(&tank.name)
        .bind(&tank.product_id)
        .bind(calibration_json)
        .bind(tank.last_known_closing_stock.to_string())
        .bind(tank.is_active)
        .execute(&self.pool)
        .await?;

        info!(
            tank_id = %tank.id,
            points = tank.calibration.points().len(),
            capacity = %tank.calibration.capacity(),
            "Tank saved"
        );
        Ok(())
    }

    /// Inserts or updates a nozzle.
    pub async fn upsert_nozzle(&self, nozzle: &Nozzle) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO nozzles (id, tank_id, label)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET tank_id = excluded.tank_id, label = excluded.label
            "#,
        )
        .bind(&nozzle.id)
        .bind(&nozzle.tank_id)
        .bind(&nozzle.label)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts tanks (for the seed tool).
    pub async fn count_tanks(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tanks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
