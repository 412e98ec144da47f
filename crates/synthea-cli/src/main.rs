//! Synthea patient generator binary.
//!
//! This is the main entry point that wires together configuration,
//! demographic tables, the module library and the population driver.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `synthea-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Load demographic tables (built-in or override file)
//! 4. Load every module in the modules directory
//! 5. Generate the population
//! 6. Log the result

mod error;

use std::path::Path;

use synthea_core::config::{LogFormat, SimulationConfig};
use synthea_core::runner;
use synthea_world::Demographics;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "synthea-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the population run fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config);
    info!("synthea starting");
    if !from_file {
        info!(path = CONFIG_PATH, "Config file not found, using defaults");
    }
    info!(
        seed = config.generation.seed,
        population = config.generation.population,
        years_of_history = config.generation.years_of_history,
        time_step_days = config.generation.time_step_days,
        modules_dir = %config.modules.dir.display(),
        "Configuration loaded"
    );

    // 3. Load demographic tables.
    let demographics = load_demographics(&config)?;
    info!(races = demographics.race.len(), "Demographics loaded");

    // 4. Load modules.
    let modules = synthea_gmf::load_modules(&config.modules.dir).map_err(CliError::from)?;

    // 5. Generate the population.
    let summary = runner::run_population(&config, &demographics, &modules).map_err(CliError::from)?;

    // 6. Log results.
    info!(
        generated = summary.generated,
        alive = summary.alive,
        dead = summary.dead,
        module_failures = summary.module_failures,
        "synthea finished"
    );

    Ok(())
}

/// Load the simulation configuration from `synthea-config.yaml`.
///
/// Falls back to defaults (with environment overrides) when the file does
/// not exist. The flag reports whether the file was read.
fn load_config() -> Result<(SimulationConfig, bool), CliError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        let config = SimulationConfig::from_file(config_path)?;
        Ok((config, true))
    } else {
        let mut config = SimulationConfig::default();
        config.apply_env_overrides()?;
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match config.logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load the override demographics file if one is configured, otherwise
/// the built-in tables.
fn load_demographics(config: &SimulationConfig) -> Result<Demographics, CliError> {
    let demographics = config.demographics.file.as_ref().map_or_else(Demographics::massachusetts, |path| {
        info!(path = %path.display(), "Loading demographics override");
        Demographics::from_file(path)
    })?;
    Ok(demographics)
}
