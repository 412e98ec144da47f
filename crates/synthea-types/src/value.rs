//! Tagged attribute values.
//!
//! Module files store free-form values (the `value` of a `SetAttribute`
//! state, the literal of an `Attribute` condition) as plain JSON scalars.
//! [`AttributeValue`] captures which kind of scalar was written, and the
//! typed accessors return a [`ValueError`] on a kind mismatch instead of
//! silently coercing.

use serde::{Deserialize, Serialize};

/// A scalar stored under a named patient attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A JSON string.
    Text(String),
    /// A JSON number. Integers are stored as whole `f64` values.
    Number(f64),
    /// A JSON boolean.
    Boolean(bool),
}

/// Errors raised when reading an [`AttributeValue`] as a specific kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The stored value is of a different kind than requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind actually stored.
        found: &'static str,
    },

    /// A number was requested as an integer but is fractional or out of range.
    #[error("number {0} is not a representable integer")]
    NotAnInteger(f64),
}

impl AttributeValue {
    /// Short name of the stored kind, used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
        }
    }

    /// Borrow the value as text.
    pub fn as_text(&self) -> Result<&str, ValueError> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    /// Read the value as a number.
    pub const fn as_number(&self) -> Result<f64, ValueError> {
        match self {
            Self::Number(number) => Ok(*number),
            other => Err(other.mismatch("number")),
        }
    }

    /// Read the value as a whole number.
    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    pub fn as_integer(&self) -> Result<i64, ValueError> {
        let number = self.as_number()?;
        // i64::MAX is not exactly representable, so the upper bound is exclusive.
        let in_range = number >= -9_223_372_036_854_775_808.0 && number < 9_223_372_036_854_775_808.0;
        if number.is_finite() && number.trunc() == number && in_range {
            Ok(number as i64)
        } else {
            Err(ValueError::NotAnInteger(number))
        }
    }

    /// Read the value as a boolean.
    pub const fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Self::Boolean(flag) => Ok(*flag),
            other => Err(other.mismatch("boolean")),
        }
    }

    const fn mismatch(&self, expected: &'static str) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl core::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Boolean(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<f64> for AttributeValue {
    fn from(number: f64) -> Self {
        Self::Number(number)
    }
}

impl From<i64> for AttributeValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(number: i64) -> Self {
        Self::Number(number as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(flag: bool) -> Self {
        Self::Boolean(flag)
    }
}
