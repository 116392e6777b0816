//! # Demo Outlet Seeder
//!
//! Populates a database with a small outlet for development.
//!
//! ## Usage
//! ```bash
//! # Seed 7 days starting 2026-03-01 (default)
//! cargo run -p forecourt-db --bin seed
//!
//! # Custom range
//! cargo run -p forecourt-db --bin seed -- --days 30 --start 2026-01-01
//!
//! # Specify database path
//! cargo run -p forecourt-db --bin seed -- --db ./data/forecourt.db
//! ```
//!
//! ## Generated Outlet
//! - Two products: Petrol (MS) and Diesel (HSD)
//! - One tank per product with a horizontal-cylinder strapping chart
//! - Two nozzles per tank
//! - Meter readings for a morning and an evening shift every day
//! - A tanker delivery into each tank every third day, with a density check
//! - A shift ledger per shift, with a small shortage now and then
//!
//! Volumes come from the day/nozzle/shift index, so reseeding a fresh file
//! gives the same outlet.

use chrono::NaiveDate;
use forecourt_core::density::DensityObservation;
use forecourt_core::shift::{ExpenseDirection, LedgerLine, LubeMode, ModalLine, RecoveryMode};
use forecourt_core::{
    CalibrationPoint, CalibrationTable, FuelProduct, MeterReading, Money, Nozzle, PurchaseLine, ShiftLedger, Tank,
};
use forecourt_db::{Database, DbConfig};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use uuid::Uuid;

const SHIFTS: &[&str] = &["morning", "evening"];

/// (product id, name, price in cents, tank id, nozzle ids, attendant)
const OUTLET: &[(&str, &str, i64, &str, &[&str], &str)] = &[
    ("MS", "Petrol", 10_250, "T1", &["MS-1", "MS-2"], "E1"),
    ("HSD", "Diesel", 9_430, "T2", &["HSD-1", "HSD-2"], "E2"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut days: u32 = 7;
    let mut start = NaiveDate::from_ymd_opt(2026, 3, 1).ok_or("invalid default start date")?;
    let mut db_path = String::from("./forecourt_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--days" | "-n" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(7);
                    i += 1;
                }
            }
            "--start" | "-s" => {
                if i + 1 < args.len() {
                    start = NaiveDate::parse_from_str(&args[i + 1], "%Y-%m-%d")?;
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Forecourt Demo Outlet Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -n, --days <N>         Days of transactions (default: 7)");
                println!("  -s, --start <DATE>     First business date (default: 2026-03-01)");
                println!("  -d, --db <PATH>        Database file path (default: ./forecourt_dev.db)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            other => {
                eprintln!("Ignoring unknown argument '{}'", other);
            }
        }
        i += 1;
    }

    println!("⛽ Forecourt Demo Outlet Seeder");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Days:     {} from {}", days, start);
    println!();

    let db = Database::open(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.master().count_tanks().await?;
    if existing > 0 {
        println!("⚠ Database already has {} tanks", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    seed_master_data(&db).await?;
    println!("✓ Products, tanks and nozzles");

    // Running totalizer per nozzle.
    let mut totalizers: HashMap<&str, Decimal> = HashMap::new();
    let mut readings = 0;
    let mut deliveries = 0;

    for day_index in 0..days {
        let date = start + chrono::Days::new(u64::from(day_index));

        for (product_index, (product_id, _, price_cents, tank_id, nozzles, employee)) in OUTLET.iter().enumerate() {
            if day_index % 3 == 1 {
                db.transactions().insert_purchase_line(&delivery(date, product_id, tank_id, product_index)).await?;
                deliveries += 1;
            }

            for (shift_index, shift_id) in SHIFTS.iter().enumerate() {
                let mut shift_litres = Decimal::ZERO;

                for (nozzle_index, nozzle_id) in nozzles.iter().enumerate() {
                    let sold = litres_sold(day_index, nozzle_index + product_index * 2, shift_index);
                    let opening = *totalizers.entry(nozzle_id).or_insert(Decimal::new(100_000, 0));
                    let test_quantity = if shift_index == 0 && nozzle_index == 0 {
                        Decimal::new(5, 0)
                    } else {
                        Decimal::ZERO
                    };
                    let closing = opening + sold + test_quantity;

                    db.transactions()
                        .insert_meter_reading(&MeterReading {
                            id: Uuid::new_v4().to_string(),
                            nozzle_id: nozzle_id.to_string(),
                            date,
                            shift_id: shift_id.to_string(),
                            opening_reading: opening,
                            closing_reading: closing,
                            test_quantity,
                        })
                        .await?;
                    totalizers.insert(nozzle_id, closing);
                    shift_litres += sold;
                    readings += 1;
                }

                let sales = Money::from_cents(*price_cents).for_quantity(shift_litres).unwrap_or_default();
                let ledger = shift_ledger(shift_id, employee, date, sales, day_index);
                db.shift_ledgers().save(&ledger).await?;
            }
        }
    }

    println!("✓ {} meter readings", readings);
    println!("✓ {} deliveries", deliveries);
    println!("✓ {} shift ledgers", days as usize * SHIFTS.len() * OUTLET.len());
    println!();
    println!("✓ Seed complete! Try:");
    println!("  forecourt reconcile --date {} --dip T1=95.5", start);

    Ok(())
}

async fn seed_master_data(db: &Database) -> Result<(), Box<dyn std::error::Error>> {
    let master = db.master();

    for (product_id, name, price_cents, tank_id, nozzles, _) in OUTLET {
        master
            .upsert_product(&FuelProduct {
                id: product_id.to_string(),
                name: name.to_string(),
                unit_price: Money::from_cents(*price_cents),
            })
            .await?;

        master
            .upsert_tank(&Tank {
                id: tank_id.to_string(),
                name: format!("{} Tank", name),
                product_id: product_id.to_string(),
                calibration: horizontal_cylinder()?,
                last_known_closing_stock: Decimal::new(8_000, 0),
                is_active: true,
            })
            .await?;

        for nozzle_id in nozzles.iter() {
            master
                .upsert_nozzle(&Nozzle {
                    id: nozzle_id.to_string(),
                    tank_id: tank_id.to_string(),
                    label: nozzle_id.to_string(),
                })
                .await?;
        }
    }

    Ok(())
}

/// Strapping chart of a 15 kL horizontal cylinder, 5 cm to 180 cm.
fn horizontal_cylinder() -> Result<CalibrationTable, Box<dyn std::error::Error>> {
    let points = [
        (5, 4200),
        (20, 61050),
        (40, 220000),
        (60, 410275),
        (80, 650000),
        (100, 895000),
        (120, 1120000),
        (140, 1348020),
        (160, 1455000),
        (180, 1500000),
    ]
    .into_iter()
    .map(|(dip, centilitres)| CalibrationPoint::new(Decimal::new(dip, 0), Decimal::new(centilitres, 1)))
    .collect();

    Ok(CalibrationTable::new(points)?)
}

/// Litres one nozzle sells in one shift: 400.00 to 699.50.
fn litres_sold(day_index: u32, nozzle_index: usize, shift_index: usize) -> Decimal {
    let spread = (day_index as i64 * 37 + nozzle_index as i64 * 53 + shift_index as i64 * 19) % 300;
    Decimal::new(400 + spread, 0) + Decimal::new(if spread % 2 == 0 { 0 } else { 50 }, 2)
}

fn delivery(date: NaiveDate, product_id: &str, tank_id: &str, product_index: usize) -> PurchaseLine {
    // Diesel is denser than petrol.
    let (observed, reference) = if product_index == 0 {
        (Decimal::new(755, 3), Decimal::new(7465, 4))
    } else {
        (Decimal::new(838, 3), Decimal::new(8290, 4))
    };

    PurchaseLine {
        id: Uuid::new_v4().to_string(),
        invoice_number: format!("INV-{}-{}", date.format("%Y%m%d"), tank_id),
        invoice_date: date,
        product_id: product_id.to_string(),
        decant_tank_id: tank_id.to_string(),
        quantity_liters: Decimal::new(6_000, 0),
        density: Some(DensityObservation::new(observed, Decimal::new(30, 0)).with_reference(reference)),
    }
}

/// A ledger that settles to within a few hundred of the metered sales.
fn shift_ledger(shift_id: &str, employee_id: &str, date: NaiveDate, sales: Money, day_index: u32) -> ShiftLedger {
    let credit = Money::from_major(1_500);
    let swipes = Money::from_major(2_200);
    let expense = Money::from_major(150);
    let shortage = Money::from_major(i64::from(day_index % 4) * 50);
    let handover = sales + Money::from_major(600) - credit - swipes - expense - shortage;

    let mut ledger = ShiftLedger::new(shift_id, employee_id, date);
    ledger.liquid_sales.push(LedgerLine::new(sales.to_string()).with_description("metered sales"));
    ledger.lube_sales.push(ModalLine::new(LubeMode::Cash, "600"));
    ledger.lube_sales.push(ModalLine::new(LubeMode::Credit, "0"));
    ledger.credit_sales.push(LedgerLine::new(credit.to_string()).with_description("fleet account"));
    ledger.recoveries.push(ModalLine::new(RecoveryMode::Swipe, "200"));
    ledger.swipes.push(LedgerLine::new((swipes + Money::from_major(200)).to_string()));
    ledger.expenses.push(ModalLine::new(ExpenseDirection::CashOut, expense.to_string()));
    ledger.cash_handovers.push(LedgerLine::new(handover.to_string()));
    ledger
}
