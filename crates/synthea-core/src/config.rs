//! Configuration loading and typed config structures for the patient
//! generator.
//!
//! The canonical configuration lives in `synthea-config.yaml` in the working
//! directory. This module defines strongly-typed structs that mirror the
//! YAML structure. Every field has a default, so an empty file (or no file)
//! yields a runnable configuration.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Environment variable overriding `modules.dir`.
pub const ENV_MODULES_DIR: &str = "SYNTHEA_MODULES_DIR";

/// Environment variable overriding `generation.seed`.
pub const ENV_SEED: &str = "SYNTHEA_SEED";

/// Environment variable overriding `generation.population`.
pub const ENV_POPULATION: &str = "SYNTHEA_POPULATION";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// An environment override could not be parsed.
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidOverride {
        /// Variable name.
        var: &'static str,
        /// The rejected value.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `synthea-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Population size, seed and simulated time window.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Where module files live.
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Demographic table source.
    #[serde(default)]
    pub demographics: DemographicsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `SYNTHEA_MODULES_DIR` overrides `modules.dir`
    /// - `SYNTHEA_SEED` overrides `generation.seed`
    /// - `SYNTHEA_POPULATION` overrides `generation.population`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] if an override is not a number.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides
    /// are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values from the process environment when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a numeric override does
    /// not parse.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Override values from `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a numeric override does
    /// not parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_MODULES_DIR) {
            self.modules.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_SEED) {
            self.generation.seed = parse_override(ENV_SEED, value)?;
        }
        if let Some(value) = lookup(ENV_POPULATION) {
            self.generation.population = parse_override(ENV_POPULATION, value)?;
        }
        Ok(())
    }
}

fn parse_override<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidOverride {
        var,
        reason: e.to_string(),
        value,
    })
}

/// Population and time window settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationConfig {
    /// Base random seed. Patient `i` is simulated with `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of patients to generate.
    #[serde(default = "default_population")]
    pub population: u32,

    /// Patients are younger than this many years at the end date.
    #[serde(default = "default_years_of_history")]
    pub years_of_history: u32,

    /// Simulated days per time step.
    #[serde(default = "default_time_step_days")]
    pub time_step_days: u32,

    /// End of the simulated window. Defaults to the current time.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            population: default_population(),
            years_of_history: default_years_of_history(),
            time_step_days: default_time_step_days(),
            end_date: None,
        }
    }
}

/// Module source configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModulesConfig {
    /// Directory holding the `.json` module files.
    #[serde(default = "default_modules_dir")]
    pub dir: PathBuf,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            dir: default_modules_dir(),
        }
    }
}

/// Demographic table source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DemographicsConfig {
    /// YAML file replacing the built-in Massachusetts tables.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when
    /// set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

const fn default_population() -> u32 {
    100
}

const fn default_years_of_history() -> u32 {
    100
}

const fn default_time_step_days() -> u32 {
    7
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_log_level() -> String {
    "info".to_owned()
}
