//! # CLI Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CLI Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Usage       │  │  Configuration  │  │      Execution          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  UnknownCommand │  │  InvalidConfig  │  │  Database               │ │
//! │  │  MissingArgument│  │  ConfigLoad     │  │  Reconciliation         │ │
//! │  │  InvalidArgument│  │                 │  │  Output                 │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │        exit 2                exit 3                  exit 1            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use forecourt_core::ServiceError;
use forecourt_db::DbError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    // =========================================================================
    // Usage Errors
    // =========================================================================
    #[error("Unknown command '{0}'. Run 'forecourt help' for usage.")]
    UnknownCommand(String),

    #[error("Missing required argument {0}")]
    MissingArgument(&'static str),

    #[error("Invalid value '{value}' for {flag}: {reason}")]
    InvalidArgument {
        flag: &'static str,
        value: String,
        reason: String,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    // =========================================================================
    // Execution Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Reconciliation failed: {0}")]
    Reconciliation(#[from] ServiceError),

    #[error("Failed to write output: {0}")]
    Output(String),
}

impl CliError {
    pub(crate) fn invalid(flag: &'static str, value: &str, reason: impl ToString) -> Self {
        CliError::InvalidArgument {
            flag,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::UnknownCommand(_) | CliError::MissingArgument(_) | CliError::InvalidArgument { .. } => 2,
            CliError::InvalidConfig(_) | CliError::ConfigLoad(_) => 3,
            _ => 1,
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::ConfigLoad(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Output(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::UnknownCommand("x".into()).exit_code(), 2);
        assert_eq!(CliError::MissingArgument("--date").exit_code(), 2);
        assert_eq!(CliError::InvalidConfig("bad".into()).exit_code(), 3);
        assert_eq!(CliError::Output("closed".into()).exit_code(), 1);
    }

    #[test]
    fn test_invalid_argument_message() {
        let err = CliError::invalid("--dip", "T1", "expected TANK=CM");
        assert_eq!(err.to_string(), "Invalid value 'T1' for --dip: expected TANK=CM");
    }
}
