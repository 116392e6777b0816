//! # CLI Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FORECOURT_DB_PATH=/srv/forecourt/forecourt.db                      │
//! │     FORECOURT_LOG=debug                                                │
//! │     FORECOURT_DENSITY_TOLERANCE=0.002                                  │
//! │     FORECOURT_MAX_CONNECTIONS=4                                        │
//! │                                                                         │
//! │  2. TOML Config File (--config, or the platform config dir)            │
//! │     ~/.config/forecourt/forecourt.toml (Linux)                         │
//! │     ~/Library/Application Support/com.forecourt.forecourt/ (macOS)     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/srv/forecourt/forecourt.db"
//! max_connections = 5
//!
//! [reconciliation]
//! density_tolerance = "0.003"
//!
//! [logging]
//! filter = "info,forecourt=debug,sqlx=warn"
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};

pub const DEFAULT_LOG_FILTER: &str = "info,forecourt=debug,sqlx=warn";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first use.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "forecourt", "forecourt")
        .map(|dirs| dirs.data_dir().join("forecourt.db"))
        .unwrap_or_else(|| PathBuf::from("forecourt.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSettings {
    /// Largest |variation| (g/cm3) a purchase density check accepts.
    #[serde(default = "default_density_tolerance")]
    pub density_tolerance: Decimal,
}

fn default_density_tolerance() -> Decimal {
    forecourt_core::density::DEFAULT_DENSITY_TOLERANCE
}

impl Default for ReconciliationSettings {
    fn default() -> Self {
        ReconciliationSettings {
            density_tolerance: default_density_tolerance(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives. `RUST_LOG` still wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// ForecourtConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecourtConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reconciliation: ReconciliationSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ForecourtConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`forecourt.toml`)
    /// 3. Environment variables
    ///
    /// An explicit `config_path` that doesn't exist is an error; a missing
    /// file in the default location is not.
    pub fn load(config_path: Option<PathBuf>) -> CliResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else if explicit {
                return Err(CliError::ConfigLoad(format!("{} does not exist", path.display())));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> CliResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(CliError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(CliError::InvalidConfig("database.max_connections must be greater than 0".into()));
        }

        if self.reconciliation.density_tolerance <= Decimal::ZERO {
            return Err(CliError::InvalidConfig(format!(
                "reconciliation.density_tolerance must be positive, got {}",
                self.reconciliation.density_tolerance
            )));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(CliError::InvalidConfig("logging.filter must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `FORECOURT_*` overrides read through `lookup`.
    ///
    /// Unparseable numbers are logged and ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FORECOURT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(filter) = lookup("FORECOURT_LOG") {
            self.logging.filter = filter;
        }

        if let Some(tolerance) = lookup("FORECOURT_DENSITY_TOLERANCE") {
            match Decimal::from_str(tolerance.trim()) {
                Ok(parsed) => self.reconciliation.density_tolerance = parsed,
                Err(_) => warn!(value = %tolerance, "Ignoring unparseable FORECOURT_DENSITY_TOLERANCE"),
            }
        }

        if let Some(max) = lookup("FORECOURT_MAX_CONNECTIONS") {
            match max.trim().parse::<u32>() {
                Ok(parsed) => self.database.max_connections = parsed,
                Err(_) => warn!(value = %max, "Ignoring unparseable FORECOURT_MAX_CONNECTIONS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "forecourt", "forecourt")
            .map(|dirs| dirs.config_dir().join("forecourt.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ForecourtConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.reconciliation.density_tolerance, Decimal::new(3, 3));
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ForecourtConfig::from_toml(
            r#"
            [database]
            path = "/srv/forecourt.db"

            [reconciliation]
            density_tolerance = "0.002"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/srv/forecourt.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.reconciliation.density_tolerance, Decimal::new(2, 3));
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_malformed_file_is_load_error() {
        let err = ForecourtConfig::from_toml("[database\npath = 1").unwrap_err();
        assert!(matches!(err, CliError::ConfigLoad(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = ForecourtConfig::from_toml("[database]\nmax_connections = 2\n").unwrap();
        config.apply_env_overrides(env(&[
            ("FORECOURT_DB_PATH", "/tmp/override.db"),
            ("FORECOURT_LOG", "warn"),
            ("FORECOURT_DENSITY_TOLERANCE", "0.005"),
            ("FORECOURT_MAX_CONNECTIONS", "8"),
        ]));

        assert_eq!(config.database.path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.reconciliation.density_tolerance, Decimal::new(5, 3));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_unparseable_env_is_ignored() {
        let mut config = ForecourtConfig::default();
        config.apply_env_overrides(env(&[
            ("FORECOURT_DENSITY_TOLERANCE", "tight"),
            ("FORECOURT_MAX_CONNECTIONS", "-1"),
        ]));

        assert_eq!(config, ForecourtConfig::default());
    }

    #[test]
    fn test_validation() {
        let mut config = ForecourtConfig::default();
        config.database.max_connections = 0;
        assert!(matches!(config.validate(), Err(CliError::InvalidConfig(_))));

        let mut config = ForecourtConfig::default();
        config.reconciliation.density_tolerance = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = ForecourtConfig::default();
        config.logging.filter = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = ForecourtConfig::load(Some(PathBuf::from("/nonexistent/forecourt.toml"))).unwrap_err();
        assert!(matches!(err, CliError::ConfigLoad(_)));
    }
}
