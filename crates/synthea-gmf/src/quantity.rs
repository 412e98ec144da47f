//! Exact and ranged quantities, and the time units they are measured in.
//!
//! Delay and Death states resolve a quantity into a simulated-time span;
//! Observation and Symptom states sample a plain value from one. Units are
//! validated when a quantity is resolved, not when the module is parsed.

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Seconds in one minute.
const MINUTE: i64 = 60;
/// Seconds in one hour.
const HOUR: i64 = 60 * MINUTE;
/// Seconds in one day.
const DAY: i64 = 24 * HOUR;
/// Seconds in one week.
const WEEK: i64 = 7 * DAY;
/// Seconds in one (fixed, 365-day) year.
const YEAR: i64 = 365 * DAY;

/// Errors raised while resolving a quantity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    /// The unit is not a recognized unit of time.
    #[error("'{0}' is not a valid unit of time")]
    InvalidUnit(String),

    /// A range whose upper bound is below its lower bound.
    #[error("range high {high} cannot be less than low {low}")]
    InvalidRange {
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
    },

    /// The resolved span does not fit in a time delta.
    #[error("{quantity} {unit} is out of range for a time span")]
    Overflow {
        /// Quantity being converted.
        quantity: i64,
        /// Unit being converted.
        unit: String,
    },
}

/// Units a duration may be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeUnit {
    /// `"seconds"`
    Seconds,
    /// `"minutes"`
    Minutes,
    /// `"hours"`
    Hours,
    /// `"days"`
    Days,
    /// `"weeks"`
    Weeks,
    /// `"years"`, fixed at 365 days.
    Years,
}

impl TimeUnit {
    /// Parse a unit name as written in module files.
    pub fn parse(unit: &str) -> Result<Self, QuantityError> {
        match unit {
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            "hours" => Ok(Self::Hours),
            "days" => Ok(Self::Days),
            "weeks" => Ok(Self::Weeks),
            "years" => Ok(Self::Years),
            other => Err(QuantityError::InvalidUnit(other.to_owned())),
        }
    }

    /// Length of one unit in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => MINUTE,
            Self::Hours => HOUR,
            Self::Days => DAY,
            Self::Weeks => WEEK,
            Self::Years => YEAR,
        }
    }

    /// Convert `quantity` of this unit into a time span.
    pub fn span(self, quantity: i64) -> Option<TimeDelta> {
        quantity
            .checked_mul(self.seconds())
            .and_then(TimeDelta::try_seconds)
    }
}

/// Units an age may be expressed in.
///
/// Years and months are calendar based (a birthday or monthly anniversary
/// must have passed); the rest count whole elapsed units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgeUnit {
    /// Completed calendar years.
    Years,
    /// Completed calendar months.
    Months,
    /// Whole weeks.
    Weeks,
    /// Whole days.
    Days,
    /// Whole hours.
    Hours,
    /// Whole minutes.
    Minutes,
    /// Whole seconds.
    Seconds,
}

impl AgeUnit {
    /// Parse a unit name as written in module files. Returns `None` for
    /// unknown units.
    pub fn parse(unit: &str) -> Option<Self> {
        match unit {
            "years" => Some(Self::Years),
            "months" => Some(Self::Months),
            "weeks" => Some(Self::Weeks),
            "days" => Some(Self::Days),
            "hours" => Some(Self::Hours),
            "minutes" => Some(Self::Minutes),
            "seconds" => Some(Self::Seconds),
            _ => None,
        }
    }
}

/// Whole `unit`s elapsed from `from` to `to`, or `None` if `to` is before
/// `from`.
pub fn elapsed_in_unit(from: DateTime<Utc>, to: DateTime<Utc>, unit: AgeUnit) -> Option<i64> {
    if to < from {
        return None;
    }
    let fixed = match unit {
        AgeUnit::Years => return whole_months(from, to).and_then(|m| m.checked_div(12)),
        AgeUnit::Months => return whole_months(from, to),
        AgeUnit::Weeks => TimeUnit::Weeks,
        AgeUnit::Days => TimeUnit::Days,
        AgeUnit::Hours => TimeUnit::Hours,
        AgeUnit::Minutes => TimeUnit::Minutes,
        AgeUnit::Seconds => TimeUnit::Seconds,
    };
    to.signed_duration_since(from)
        .num_seconds()
        .checked_div(fixed.seconds())
}

/// Completed calendar months between two instants (`from <= to`).
fn whole_months(from: DateTime<Utc>, to: DateTime<Utc>) -> Option<i64> {
    let years = i64::from(to.year()).checked_sub(i64::from(from.year()))?;
    let months = i64::from(to.month()).checked_sub(i64::from(from.month()))?;
    let total = years.checked_mul(12)?.checked_add(months)?;
    if (to.day(), to.time()) < (from.day(), from.time()) {
        total.checked_sub(1)
    } else {
        Some(total)
    }
}

/// A fixed quantity with a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exact {
    /// The amount.
    pub quantity: i64,
    /// Unit name as written in the module file.
    #[serde(default)]
    pub unit: String,
}

impl Exact {
    /// Resolve to a time span. The unit must be a unit of time.
    pub fn resolve(&self) -> Result<TimeDelta, QuantityError> {
        to_span(self.quantity, &self.unit)
    }
}

/// An inclusive integer range with a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    /// Lower bound, inclusive.
    pub low: i64,
    /// Upper bound, inclusive.
    pub high: i64,
    /// Unit name as written in the module file.
    #[serde(default)]
    pub unit: String,
}

impl Range {
    /// Draw an integer uniformly from `[low, high]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<i64, QuantityError> {
        if self.high < self.low {
            return Err(QuantityError::InvalidRange {
                low: self.low,
                high: self.high,
            });
        }
        Ok(rng.random_range(self.low..=self.high))
    }

    /// Draw a fresh quantity and resolve it to a time span. Every call
    /// draws again.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TimeDelta, QuantityError> {
        let pick = self.sample(rng)?;
        to_span(pick, &self.unit)
    }
}

/// Either an [`Exact`] or a [`Range`] quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quantity {
    /// Fixed amount.
    Exact(Exact),
    /// Uniformly sampled amount.
    Range(Range),
}

impl Quantity {
    /// Resolve to a time span, sampling if this is a range.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TimeDelta, QuantityError> {
        match self {
            Self::Exact(exact) => exact.resolve(),
            Self::Range(range) => range.resolve(rng),
        }
    }

    /// The plain amount, sampling if this is a range. The unit is not
    /// interpreted.
    pub fn sample_value<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<i64, QuantityError> {
        match self {
            Self::Exact(exact) => Ok(exact.quantity),
            Self::Range(range) => range.sample(rng),
        }
    }

    /// Unit name as written in the module file.
    pub fn unit(&self) -> &str {
        match self {
            Self::Exact(exact) => &exact.unit,
            Self::Range(range) => &range.unit,
        }
    }
}

fn to_span(quantity: i64, unit: &str) -> Result<TimeDelta, QuantityError> {
    TimeUnit::parse(unit)?
        .span(quantity)
        .ok_or_else(|| QuantityError::Overflow {
            quantity,
            unit: unit.to_owned(),
        })
}
