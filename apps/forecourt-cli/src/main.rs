//! # Forecourt CLI
//!
//! Back-office driver for the reconciliation engine.
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Parse arguments            (commands::parse_args)                  │
//! │  2. Load configuration         (defaults < forecourt.toml < env)       │
//! │  3. Initialize tracing         (RUST_LOG, else [logging] filter)       │
//! │  4. Run the command            (opens SQLite, runs migrations)         │
//! │  5. Print JSON to stdout; errors to stderr with an exit code           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod commands;
mod config;
mod error;

use serde_json::Value;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::config::ForecourtConfig;
use crate::error::CliResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {}", err);
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}

async fn run() -> CliResult<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = commands::parse_args(&args)?;
    let config = ForecourtConfig::load(invocation.config_path)?;

    init_tracing(&config.logging.filter);

    let output = commands::run(invocation.command, &config).await?;
    match output {
        Value::String(text) => println!("{}", text),
        value => println!("{}", serde_json::to_string_pretty(&value)?),
    }

    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=forecourt_core=trace` - Trace the engine only
/// - Default: the `[logging] filter` from config
///
/// Logs go to stderr so stdout stays pure JSON.
fn init_tracing(configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
