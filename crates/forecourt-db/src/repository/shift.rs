//! # Shift Ledger Repository
//!
//! Stores each ledger line as one row, amount kept as the raw text the
//! operator typed so a half-finished shift round-trips unchanged.
//!
//! ## Row Layout
//! ```text
//! shift_id │ employee_id │ date       │ category   │ mode     │ position │ amount_text
//! ─────────┼─────────────┼────────────┼────────────┼──────────┼──────────┼────────────
//! morning  │ E1          │ 2026-03-01 │ lube_sales │ Cash     │ 0        │ 500
//! morning  │ E1          │ 2026-03-01 │ lube_sales │ Credit   │ 1        │ 12O
//! morning  │ E1          │ 2026-03-01 │ expenses   │ Cash-Out │ 0        │ 300
//! ```

use chrono::NaiveDate;
use forecourt_core::shift::{LedgerLine, ModalLine};
use forecourt_core::ShiftLedger;
use serde::de::DeserializeOwned;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

#[derive(Debug, FromRow)]
struct LedgerLineRow {
    category: String,
    mode: Option<String>,
    description: Option<String>,
    amount_text: Option<String>,
}

impl LedgerLineRow {
    fn line(&self) -> LedgerLine {
        LedgerLine {
            description: self.description.clone(),
            amount: self.amount_text.clone(),
        }
    }

    fn modal<M: DeserializeOwned>(&self) -> DbResult<ModalLine<M>> {
        let mode = self
            .mode
            .as_deref()
            .ok_or_else(|| DbError::invalid("shift_ledger_lines.mode", format!("{} line has no mode", self.category)))?;
        let mode = serde_json::from_value(serde_json::Value::String(mode.to_string()))
            .map_err(|e| DbError::invalid("shift_ledger_lines.mode", e))?;

        Ok(ModalLine {
            mode,
            line: self.line(),
        })
    }
}

/// Repository for shift ledgers.
#[derive(Debug, Clone)]
pub struct ShiftLedgerRepository {
    pool: SqlitePool,
}

impl ShiftLedgerRepository {
    /// Creates a new ShiftLedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftLedgerRepository { pool }
    }

    /// Loads a shift's ledger. Empty if nothing has been entered.
    pub async fn get(&self, shift_id: &str, employee_id: &str, date: NaiveDate) -> DbResult<ShiftLedger> {
        let rows = sqlx::query_as::<_, LedgerLineRow>(
            r#"
            SELECT category, mode, description, amount_text
            FROM shift_ledger_lines
            WHERE shift_id = ?1 AND employee_id = ?2 AND date = ?3
            ORDER BY category, position
            "#,
        )
        .bind(shift_id)
        .bind(employee_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut ledger = ShiftLedger::new(shift_id, employee_id, date);
        for row in &rows {
            match row.category.as_str() {
                "liquid_sales" => ledger.liquid_sales.push(row.line()),
                "lube_sales" => ledger.lube_sales.push(row.modal()?),
                "credit_sales" => ledger.credit_sales.push(row.line()),
                "recoveries" => ledger.recoveries.push(row.modal()?),
                "swipes" => ledger.swipes.push(row.line()),
                "expenses" => ledger.expenses.push(row.modal()?),
                "cash_handovers" => ledger.cash_handovers.push(row.line()),
                other => return Err(DbError::invalid("shift_ledger_lines.category", other)),
            }
        }

        debug!(%shift_id, %employee_id, %date, lines = rows.len(), "Loaded shift ledger");
        Ok(ledger)
    }

    /// Replaces a shift's ledger with `ledger`.
    pub async fn save(&self, ledger: &ShiftLedger) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM shift_ledger_lines WHERE shift_id = ?1 AND employee_id = ?2 AND date = ?3")
            .bind(&ledger.shift_id)
            .bind(&ledger.employee_id)
            .bind(ledger.date)
            .execute(&mut *tx)
            .await?;

        let plain = [
            ("liquid_sales", &ledger.liquid_sales),
            ("credit_sales", &ledger.credit_sales),
            ("swipes", &ledger.swipes),
            ("cash_handovers", &ledger.cash_handovers),
        ];
        for (category, lines) in plain {
            for (position, line) in lines.iter().enumerate() {
                insert_line(&mut tx, ledger, category, None, position, line).await?;
            }
        }

        for (position, line) in ledger.lube_sales.iter().enumerate() {
            insert_line(&mut tx, ledger, "lube_sales", Some(line.mode.as_str()), position, &line.line).await?;
        }
        for (position, line) in ledger.recoveries.iter().enumerate() {
            insert_line(&mut tx, ledger, "recoveries", Some(line.mode.as_str()), position, &line.line).await?;
        }
        for (position, line) in ledger.expenses.iter().enumerate() {
            insert_line(&mut tx, ledger, "expenses", Some(line.mode.as_str()), position, &line.line).await?;
        }

        tx.commit().await?;

        info!(
            shift_id = %ledger.shift_id,
            employee_id = %ledger.employee_id,
            date = %ledger.date,
            "Shift ledger saved"
        );
        Ok(())
    }
}

async fn insert_line(
    tx: &mut Transaction<'_, Sqlite>,
    ledger: &ShiftLedger,
    category: &str,
    mode: Option<&str>,
    position: usize,
    line: &LedgerLine,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shift_ledger_lines (
            shift_id, employee_id, date, category, mode, position, description, amount_text
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&ledger.shift_id)
    .bind(&ledger.employee_id)
    .bind(ledger.date)
    .bind(category)
    .bind(mode)
    .bind(position as i64)
    .bind(&line.description)
    .bind(&line.amount)
    .execute(&mut **tx)
    .await?;

    Ok(())
}
