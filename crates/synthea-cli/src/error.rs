//! Error types for the `synthea` binary.
//!
//! [`CliError`] is the top-level error type that wraps all possible
//! failure modes during startup and the population run.

/// Top-level error for the `synthea` binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: synthea_core::config::ConfigError,
    },

    /// Demographic tables could not be loaded.
    #[error("demographics error: {source}")]
    Demographics {
        /// The underlying demographics error.
        #[from]
        source: synthea_world::DemographicsError,
    },

    /// Module files could not be loaded.
    #[error("module load error: {source}")]
    Load {
        /// The underlying load error.
        #[from]
        source: synthea_gmf::LoadError,
    },

    /// The population run failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: synthea_core::runner::RunnerError,
    },
}
