//! Error types for the `synthea-world` crate.

use std::path::PathBuf;

use synthea_gmf::ChoiceError;

/// Errors raised while loading demographic tables or sampling patients.
#[derive(Debug, thiserror::Error)]
pub enum DemographicsError {
    /// The demographics file could not be read.
    #[error("failed to read demographics file {}: {source}", .path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The YAML could not be decoded into demographic tables.
    #[error("failed to parse demographics YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// A race has no per-race table.
    #[error("no {table} table for race '{race}'")]
    MissingTable {
        /// Which table is incomplete (`"ethnicity"` or `"blood_type"`).
        table: &'static str,
        /// The race without an entry.
        race: String,
    },

    /// A table's weights cannot be sampled.
    #[error("invalid {table} weights: {source}")]
    InvalidWeights {
        /// Which table holds the bad weights.
        table: String,
        /// The underlying sampler error.
        source: ChoiceError,
    },

    /// Weighted sampling failed at draw time.
    #[error("sampling failed: {source}")]
    Choice {
        /// The underlying sampler error.
        #[from]
        source: ChoiceError,
    },

    /// No birth date exists for the requested age before the end date.
    #[error("cannot place a birth date {age} years before {end}")]
    BirthDateOutOfRange {
        /// Requested age in whole years.
        age: u32,
        /// End of the simulated window.
        end: chrono::DateTime<chrono::Utc>,
    },
}
