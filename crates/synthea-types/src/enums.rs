//! Enumeration types shared across the workspace.

use serde::{Deserialize, Serialize};

/// Administrative gender of a simulated patient.
///
/// Serialized with the single-letter codes used by module files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male (`"M"`).
    #[serde(rename = "M")]
    Male,
    /// Female (`"F"`).
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    /// The single-letter code for this gender.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    /// Parse a single-letter gender code. Returns `None` for anything other
    /// than `"M"` or `"F"`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" => Some(Self::Male),
            "F" => Some(Self::Female),
            _ => None,
        }
    }
}

impl core::fmt::Display for Gender {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        assert_eq!(Gender::from_code("M"), Some(Gender::Male));
        assert_eq!(Gender::from_code(Gender::Female.code()), Some(Gender::Female));
        assert_eq!(Gender::from_code("Male"), None);
    }
}
