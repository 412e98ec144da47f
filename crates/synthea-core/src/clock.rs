//! Simulated time for one patient's lifetime.
//!
//! The clock starts at the patient's birth and moves forward in fixed
//! steps until it passes the end of the simulated window. Every step is
//! taken with checked arithmetic.

use chrono::{DateTime, TimeDelta, Utc};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The next step would leave the representable calendar.
    #[error("clock overflow: cannot advance beyond {now}")]
    Overflow {
        /// Time the clock was at.
        now: DateTime<Utc>,
    },

    /// Invalid clock parameters (e.g. a zero step).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

/// A stepping clock over `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimClock {
    now: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
    steps: u64,
}

impl SimClock {
    /// Create a clock at `start` that steps by `step` until past `end`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `step` is not positive or
    /// `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, step: TimeDelta) -> Result<Self, ClockError> {
        if step <= TimeDelta::zero() {
            return Err(ClockError::InvalidConfig {
                reason: "step must be positive".to_owned(),
            });
        }
        if end < start {
            return Err(ClockError::InvalidConfig {
                reason: format!("end {end} is before start {start}"),
            });
        }
        Ok(Self {
            now: start,
            end,
            step,
            steps: 0,
        })
    }

    /// Create a clock stepping by whole days.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `days` is 0 or `end` is
    /// before `start`.
    pub fn with_step_days(start: DateTime<Utc>, end: DateTime<Utc>, days: u32) -> Result<Self, ClockError> {
        let step = TimeDelta::try_days(i64::from(days)).ok_or_else(|| ClockError::InvalidConfig {
            reason: format!("step of {days} days is out of range"),
        })?;
        Self::new(start, end, step)
    }

    /// Advance one step. Returns the new time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Overflow`] if the new time is not
    /// representable.
    pub fn advance(&mut self) -> Result<DateTime<Utc>, ClockError> {
        self.now = self
            .now
            .checked_add_signed(self.step)
            .ok_or(ClockError::Overflow { now: self.now })?;
        self.steps = self.steps.saturating_add(1);
        Ok(self.now)
    }

    /// Current simulated time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// End of the window.
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Step size.
    pub const fn step(&self) -> TimeDelta {
        self.step
    }

    /// Number of steps taken so far.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Whether the clock has moved past the end of the window.
    pub fn is_finished(&self) -> bool {
        self.now > self.end
    }
}
