//! Plain data structs shared across the workspace.

use serde::{Deserialize, Serialize};

/// A coded clinical concept, e.g. a SNOMED-CT diagnosis or an RxNorm drug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Code {
    /// Code system name (`"SNOMED-CT"`, `"RxNorm"`, `"LOINC"`, ...).
    pub system: String,
    /// The code within its system.
    pub code: String,
    /// Human-readable display text.
    #[serde(default)]
    pub display: String,
}

impl Code {
    /// Create a code triple.
    pub fn new(system: impl Into<String>, code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            code: code.into(),
            display: display.into(),
        }
    }

    /// Two codes denote the same concept when system and code agree;
    /// display text is ignored.
    pub fn same_concept(&self, other: &Self) -> bool {
        self.system == other.system && self.code == other.code
    }
}
