//! Weighted random selection.
//!
//! [`weighted_choice`] is shared by distributed and complex transitions
//! (items are target state names) and by demographic sampling (items are
//! labels such as a race or blood type).
//!
//! Weights are cleaned before sampling so they form a probability
//! distribution: a list whose running total passes `1.0` is truncated at
//! the element that crosses it (that element keeps only the remaining
//! mass), and a list that sums to less than `1.0` gives the shortfall to
//! its last element.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// One weighted option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice<T> {
    /// Probability mass of this option. Must be strictly positive.
    pub weight: f64,
    /// The value returned when this option is drawn.
    pub item: T,
}

impl<T> Choice<T> {
    /// Pair an item with its weight.
    pub const fn new(weight: f64, item: T) -> Self {
        Self { weight, item }
    }
}

/// Errors raised by the sampler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChoiceError {
    /// The choice list was empty.
    #[error("no choices provided")]
    NoChoices,

    /// A weight was zero, negative or NaN.
    #[error("choice {index} has invalid weight {weight} (must be > 0)")]
    InvalidWeight {
        /// Position of the offending choice.
        index: usize,
        /// The offending weight.
        weight: f64,
    },
}

/// Normalize a weight list so it sums to 1.0.
///
/// The returned list may be shorter than the input when the running total
/// passes 1.0 early. The input is not modified.
#[allow(clippy::arithmetic_side_effects)]
pub fn clean_weights(weights: &[f64]) -> Result<Vec<f64>, ChoiceError> {
    if weights.is_empty() {
        return Err(ChoiceError::NoChoices);
    }
    if let Some((index, &weight)) = weights.iter().enumerate().find(|(_, w)| w.is_nan() || **w <= 0.0) {
        return Err(ChoiceError::InvalidWeight { index, weight });
    }

    let mut cleaned = Vec::with_capacity(weights.len());
    let mut total = 0.0_f64;
    for &weight in weights {
        let remaining = 1.0 - total;
        if weight > remaining {
            if remaining > 0.0 {
                cleaned.push(remaining);
            }
            return Ok(cleaned);
        }
        cleaned.push(weight);
        total += weight;
    }

    if let Some(last) = cleaned.last_mut() {
        *last += 1.0 - total;
    }
    Ok(cleaned)
}

/// Draw one choice with probability proportional to its cleaned weight.
#[allow(clippy::arithmetic_side_effects)]
pub fn weighted_choice<'a, T, R: Rng + ?Sized>(
    choices: &'a [Choice<T>],
    rng: &mut R,
) -> Result<&'a Choice<T>, ChoiceError> {
    let weights: Vec<f64> = choices.iter().map(|c| c.weight).collect();
    let cleaned = clean_weights(&weights)?;

    let draw: f64 = rng.random();
    let mut cumulative = 0.0_f64;
    for (choice, weight) in choices.iter().zip(&cleaned) {
        cumulative += weight;
        if cumulative > draw {
            return Ok(choice);
        }
    }

    // Rounding can leave the cumulative total a hair under the draw.
    choices
        .get(cleaned.len().saturating_sub(1))
        .ok_or(ChoiceError::NoChoices)
}
