//! # Commands
//!
//! Hand-rolled argument parsing and one handler per command. Every handler
//! returns a JSON value; `main` prints it.
//!
//! ## Flow
//! ```text
//! argv ──► parse_args ──► Invocation { config_path, command }
//!                                             │
//!              ┌──────────────┬───────────────┼──────────────┬────────────┐
//!              ▼              ▼               ▼              ▼            ▼
//!          reconcile        shift          volume         density       help
//!              │              │               │              │
//!              └──────┬───────┴───────────────┘              │
//!                     ▼                                      ▼
//!       Database ──► ReconciliationService          DensityObservation
//!                                                     (no database)
//! ```

use chrono::NaiveDate;
use forecourt_core::density::{DensityCheck, DensityObservation};
use forecourt_core::{Money, ReconciliationService};
use forecourt_db::{Database, DbConfig};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::ForecourtConfig;
use crate::error::{CliError, CliResult};

pub const USAGE: &str = "\
Forecourt - fuel outlet stock and cash reconciliation

Usage: forecourt [--config <PATH>] <COMMAND> [OPTIONS]

Commands:
  reconcile --date <DATE> [--dip <TANK>=<CM>]... [--preview]
      Reconcile every active tank for a date. Tanks with a dip are settled,
      the rest stay pending. --preview computes without saving.

  shift --shift <ID>... --employee <ID> --date <DATE> [--carry <AMOUNT>]
      Summarize one or more shifts in order, chaining the cumulative
      shortage from --carry (default 0).

  volume --tank <ID> --dip <CM>
      Volume in a tank for a dip reading.

  density --observed <G/CM3> --temp <C> [--reference <G/CM3>]
      Correct a hydrometer reading to 15 C and compare it to the invoice.

  help
      Show this message.

Dates are YYYY-MM-DD. Output is JSON.";

// =============================================================================
// Parsed Arguments
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Reconcile {
        date: NaiveDate,
        dips: HashMap<String, Decimal>,
        preview: bool,
    },
    Shift {
        shift_ids: Vec<String>,
        employee_id: String,
        date: NaiveDate,
        carry: Money,
    },
    Volume {
        tank_id: String,
        dip_cm: Decimal,
    },
    Density {
        observed: Decimal,
        temperature: Decimal,
        reference: Option<Decimal>,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub config_path: Option<PathBuf>,
    pub command: Command,
}

/// Parses `argv` without the program name.
pub fn parse_args(args: &[String]) -> CliResult<Invocation> {
    let mut config_path = None;
    let mut rest = Vec::with_capacity(args.len());

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let path = args.get(i + 1).ok_or(CliError::MissingArgument("--config"))?;
                config_path = Some(PathBuf::from(path));
                i += 1;
            }
            _ => rest.push(args[i].as_str()),
        }
        i += 1;
    }

    let command = match rest.split_first() {
        None => Command::Help,
        Some((&name, flags)) => match name {
            "reconcile" => parse_reconcile(flags)?,
            "shift" => parse_shift(flags)?,
            "volume" => parse_volume(flags)?,
            "density" => parse_density(flags)?,
            "help" | "--help" | "-h" => Command::Help,
            other => return Err(CliError::UnknownCommand(other.to_string())),
        },
    };

    Ok(Invocation { config_path, command })
}

/// Collects `--flag value` pairs; repeated flags keep every value.
/// Switches listed in `switches` take no value.
struct Flags<'a> {
    values: Vec<(&'a str, &'a str)>,
    switches: Vec<&'a str>,
}

impl<'a> Flags<'a> {
    fn parse(args: &[&'a str], known: &[&'static str], switches: &[&'static str]) -> CliResult<Self> {
        let mut flags = Flags {
            values: Vec::new(),
            switches: Vec::new(),
        };

        let mut i = 0;
        while i < args.len() {
            let flag = args[i];
            if switches.iter().any(|s| *s == flag) {
                flags.switches.push(flag);
            } else if let Some(&name) = known.iter().find(|k| **k == flag) {
                let value = *args.get(i + 1).ok_or(CliError::MissingArgument(name))?;
                flags.values.push((name, value));
                i += 1;
            } else {
                return Err(CliError::invalid("arguments", flag, "unexpected argument"));
            }
            i += 1;
        }

        Ok(flags)
    }

    fn all(&self, flag: &str) -> impl Iterator<Item = &'a str> + '_ {
        let flag = flag.to_string();
        self.values.iter().filter(move |(f, _)| *f == flag).map(|(_, v)| *v)
    }

    fn last(&self, flag: &str) -> Option<&'a str> {
        self.all(flag).last()
    }

    fn required(&self, flag: &'static str) -> CliResult<&'a str> {
        self.last(flag).ok_or(CliError::MissingArgument(flag))
    }

    fn switch(&self, flag: &str) -> bool {
        self.switches.iter().any(|s| *s == flag)
    }
}

fn parse_date(flag: &'static str, value: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| CliError::invalid(flag, value, e))
}

fn parse_decimal(flag: &'static str, value: &str) -> CliResult<Decimal> {
    Decimal::from_str(value.trim()).map_err(|e| CliError::invalid(flag, value, e))
}

fn parse_reconcile(args: &[&str]) -> CliResult<Command> {
    let flags = Flags::parse(args, &["--date", "--dip"], &["--preview"])?;
    let date = parse_date("--date", flags.required("--date")?)?;

    let mut dips = HashMap::new();
    for entry in flags.all("--dip") {
        let (tank_id, dip) = entry
            .split_once('=')
            .filter(|(tank_id, _)| !tank_id.trim().is_empty())
            .ok_or_else(|| CliError::invalid("--dip", entry, "expected TANK=CM"))?;
        dips.insert(tank_id.trim().to_string(), parse_decimal("--dip", dip)?);
    }

    Ok(Command::Reconcile {
        date,
        dips,
        preview: flags.switch("--preview"),
    })
}

fn parse_shift(args: &[&str]) -> CliResult<Command> {
    let flags = Flags::parse(args, &["--shift", "--employee", "--date", "--carry"], &[])?;
    let shift_ids: Vec<String> = flags.all("--shift").map(str::to_string).collect();
    if shift_ids.is_empty() {
        return Err(CliError::MissingArgument("--shift"));
    }

    let carry = match flags.last("--carry") {
        Some(text) => Money::parse("--carry", text)
            .map_err(|e| CliError::invalid("--carry", text, e))?
            .unwrap_or_default(),
        None => Money::zero(),
    };

    Ok(Command::Shift {
        shift_ids,
        employee_id: flags.required("--employee")?.to_string(),
        date: parse_date("--date", flags.required("--date")?)?,
        carry,
    })
}

fn parse_volume(args: &[&str]) -> CliResult<Command> {
    let flags = Flags::parse(args, &["--tank", "--dip"], &[])?;
    Ok(Command::Volume {
        tank_id: flags.required("--tank")?.to_string(),
        dip_cm: parse_decimal("--dip", flags.required("--dip")?)?,
    })
}

fn parse_density(args: &[&str]) -> CliResult<Command> {
    let flags = Flags::parse(args, &["--observed", "--temp", "--reference"], &[])?;
    Ok(Command::Density {
        observed: parse_decimal("--observed", flags.required("--observed")?)?,
        temperature: parse_decimal("--temp", flags.required("--temp")?)?,
        reference: flags
            .last("--reference")
            .map(|value| parse_decimal("--reference", value))
            .transpose()?,
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Runs a command. Help and density never open the database.
pub async fn run(command: Command, config: &ForecourtConfig) -> CliResult<Value> {
    match command {
        Command::Help => Ok(Value::String(USAGE.to_string())),
        Command::Density {
            observed,
            temperature,
            reference,
        } => Ok(density(observed, temperature, reference, config.reconciliation.density_tolerance)),
        command => {
            let db = open_database(config).await?;
            let service = service(&db, config);
            let output = run_with_service(command, &service).await;
            db.close().await;
            output
        }
    }
}

async fn open_database(config: &ForecourtConfig) -> CliResult<Database> {
    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_config = DbConfig::new(&config.database.path).max_connections(config.database.max_connections);
    Ok(Database::open(db_config).await?)
}

pub fn service(db: &Database, config: &ForecourtConfig) -> ReconciliationService {
    let db = Arc::new(db.clone());
    ReconciliationService::new(db.clone(), db.clone(), db)
        .with_density_tolerance(config.reconciliation.density_tolerance)
}

/// Handlers that need storage.
pub async fn run_with_service(command: Command, service: &ReconciliationService) -> CliResult<Value> {
    match command {
        Command::Reconcile { date, dips, preview } => {
            info!(%date, dips = dips.len(), preview, "Reconciling day");
            let report = service.reconcile_day(date, &dips, !preview).await?;
            Ok(serde_json::to_value(report)?)
        }
        Command::Shift {
            shift_ids,
            employee_id,
            date,
            carry,
        } => {
            debug!(shifts = shift_ids.len(), %employee_id, %date, "Summarizing shifts");
            let summaries = service.shift_sequence(&shift_ids, &employee_id, date, carry).await?;
            Ok(serde_json::to_value(summaries)?)
        }
        Command::Volume { tank_id, dip_cm } => {
            let volume = service.tank_volume(&tank_id, dip_cm).await?;
            Ok(json!({
                "tank_id": tank_id,
                "dip_cm": dip_cm,
                "volume_liters": volume,
            }))
        }
        Command::Density {
            observed,
            temperature,
            reference,
        } => Ok(density(observed, temperature, reference, service.density_tolerance())),
        Command::Help => Ok(Value::String(USAGE.to_string())),
    }
}

fn density(observed: Decimal, temperature: Decimal, reference: Option<Decimal>, tolerance: Decimal) -> Value {
    let mut observation = DensityObservation::new(observed, temperature);
    if let Some(reference) = reference {
        observation = observation.with_reference(reference);
    }

    match observation.evaluate(tolerance) {
        DensityCheck::Measured(reading) => json!({
            "state": "measured",
            "density_at_15c": reading.density_at_15c,
            "display_density": reading.display_density(),
            "variation": reading.variation,
            "display_variation": reading.display_variation(),
            "within_tolerance": reading.within_tolerance,
            "tolerance": tolerance,
        }),
        incomplete => json!(incomplete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forecourt_core::{CalibrationPoint, CalibrationTable, FuelProduct, Nozzle, Tank};

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_parse_reconcile() {
        let invocation =
            parse_args(&args("--config ./f.toml reconcile --date 2026-03-02 --dip T1=95.5 --dip T2=40 --preview"))
                .unwrap();

        assert_eq!(invocation.config_path, Some(PathBuf::from("./f.toml")));
        let Command::Reconcile { date: d, dips, preview } = invocation.command else {
            panic!("expected reconcile");
        };
        assert_eq!(d, date(2));
        assert_eq!(dips.get("T1"), Some(&Decimal::new(955, 1)));
        assert_eq!(dips.get("T2"), Some(&Decimal::new(40, 0)));
        assert!(preview);
    }

    #[test]
    fn test_parse_shift_sequence() {
        let invocation =
            parse_args(&args("shift --shift morning --shift evening --employee E1 --date 2026-03-01 --carry 1,250"))
                .unwrap();

        assert_eq!(
            invocation.command,
            Command::Shift {
                shift_ids: vec!["morning".to_string(), "evening".to_string()],
                employee_id: "E1".to_string(),
                date: date(1),
                carry: Money::from_major(1_250),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_args(&args("reconcile --dip T1=3")),
            Err(CliError::MissingArgument("--date"))
        ));
        assert!(matches!(
            parse_args(&args("reconcile --date 2026-03-01 --dip T1")),
            Err(CliError::InvalidArgument { flag: "--dip", .. })
        ));
        assert!(matches!(
            parse_args(&args("volume --tank T1 --dip deep")),
            Err(CliError::InvalidArgument { flag: "--dip", .. })
        ));
        assert!(matches!(parse_args(&args("settle")), Err(CliError::UnknownCommand(_))));
        assert!(matches!(
            parse_args(&args("volume --tank")),
            Err(CliError::MissingArgument("--tank"))
        ));
    }

    #[test]
    fn test_no_command_is_help() {
        assert_eq!(parse_args(&[]).unwrap().command, Command::Help);
        assert_eq!(parse_args(&args("-h")).unwrap().command, Command::Help);
    }

    #[test]
    fn test_density_output() {
        let value = density(Decimal::new(755, 3), Decimal::new(30, 0), Some(Decimal::new(75, 2)), Decimal::new(3, 3));
        assert_eq!(value["state"], "measured");
        assert_eq!(value["within_tolerance"], json!(false));

        let incomplete = density(Decimal::new(755, 3), Decimal::ZERO, None, Decimal::new(3, 3));
        assert_eq!(incomplete["state"], "incomplete");
    }

    #[tokio::test]
    async fn test_volume_and_reconcile_against_sqlite() {
        let db = Database::open(DbConfig::in_memory()).await.unwrap();
        db.master()
            .upsert_product(&FuelProduct {
                id: "MS".to_string(),
                name: "Petrol".to_string(),
                unit_price: Money::from_major(100),
            })
            .await
            .unwrap();
        db.master()
            .upsert_tank(&Tank {
                id: "T1".to_string(),
                name: "Petrol 1".to_string(),
                product_id: "MS".to_string(),
                calibration: CalibrationTable::new(vec![
                    CalibrationPoint::new(Decimal::ZERO, Decimal::ZERO),
                    CalibrationPoint::new(Decimal::new(100, 0), Decimal::new(10_000, 0)),
                ])
                .unwrap(),
                last_known_closing_stock: Decimal::new(5_000, 0),
                is_active: true,
            })
            .await
            .unwrap();
        db.master()
            .upsert_nozzle(&Nozzle {
                id: "N1".to_string(),
                tank_id: "T1".to_string(),
                label: "MS-1".to_string(),
            })
            .await
            .unwrap();

        let service = service(&db, &ForecourtConfig::default());

        let volume = run_with_service(
            Command::Volume {
                tank_id: "T1".to_string(),
                dip_cm: Decimal::new(25, 0),
            },
            &service,
        )
        .await
        .unwrap();
        let litres: Decimal = serde_json::from_value(volume["volume_liters"].clone()).unwrap();
        assert_eq!(litres, Decimal::new(2_500, 0));

        let mut dips = HashMap::new();
        dips.insert("T1".to_string(), Decimal::new(49, 0));
        let report = run_with_service(
            Command::Reconcile {
                date: date(1),
                dips,
                preview: true,
            },
            &service,
        )
        .await
        .unwrap();
        assert_eq!(report["settled"], 1);
        assert_eq!(report["saved"], json!(false));
        assert!(db.stock_records().get("T1", date(1)).await.unwrap().is_none());
    }
}
