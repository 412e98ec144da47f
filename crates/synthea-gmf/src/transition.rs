//! Outgoing edges of a state.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::choice::{Choice, weighted_choice};
use crate::condition::Condition;
use crate::entity::Entity;
use crate::error::EvalError;

/// Target used when a conditional or complex transition matches nothing.
pub const TERMINAL: &str = "Terminal";

/// A weighted target state name.
pub type Distribution = Choice<String>;

/// One arm of a conditional transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    /// Guard; `None` only on the final catch-all arm.
    pub condition: Option<Condition>,
    /// Target state name.
    pub transition: String,
}

/// One arm of a complex transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexArm {
    /// Guard; `None` only on the final catch-all arm.
    pub condition: Option<Condition>,
    /// Weighted targets sampled when the guard holds.
    pub distributions: Vec<Distribution>,
}

/// How a state picks its successor.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Always the same target.
    Direct(String),
    /// First arm whose condition holds.
    Conditional(Vec<Conditional>),
    /// Weighted random target.
    Distributed(Vec<Distribution>),
    /// First arm whose condition holds, then a weighted draw from its
    /// distributions.
    Complex(Vec<ComplexArm>),
}

impl Transition {
    /// Name of the next state for `entity` at `time`.
    ///
    /// Conditional and complex transitions fall back to [`TERMINAL`] when
    /// no arm matches.
    pub fn follow<R: Rng + ?Sized>(
        &self,
        entity: &dyn Entity,
        time: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<&str, EvalError> {
        match self {
            Self::Direct(target) => Ok(target),
            Self::Conditional(arms) => {
                for arm in arms {
                    if holds(arm.condition.as_ref(), entity, time)? {
                        return Ok(&arm.transition);
                    }
                }
                Ok(TERMINAL)
            }
            Self::Distributed(distributions) => Ok(&weighted_choice(distributions, rng)?.item),
            Self::Complex(arms) => {
                for arm in arms {
                    if holds(arm.condition.as_ref(), entity, time)? {
                        return Ok(&weighted_choice(&arm.distributions, rng)?.item);
                    }
                }
                Ok(TERMINAL)
            }
        }
    }

    /// Every state name this transition can lead to, in declaration order.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Self::Direct(target) => vec![target.as_str()],
            Self::Conditional(arms) => arms.iter().map(|a| a.transition.as_str()).collect(),
            Self::Distributed(distributions) => distributions.iter().map(|d| d.item.as_str()).collect(),
            Self::Complex(arms) => arms
                .iter()
                .flat_map(|a| a.distributions.iter().map(|d| d.item.as_str()))
                .collect(),
        }
    }
}

fn holds(condition: Option<&Condition>, entity: &dyn Entity, time: DateTime<Utc>) -> Result<bool, EvalError> {
    match condition {
        Some(condition) => Ok(condition.test(entity, time)?),
        None => Ok(true),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use synthea_types::Gender;

    use super::*;
    use crate::entity::StubEntity;

    fn setup() -> (StubEntity, DateTime<Utc>, SmallRng) {
        let birth = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        (StubEntity::new(birth, Gender::Male), now, SmallRng::seed_from_u64(42))
    }

    fn arm(condition: Option<Condition>, target: &str) -> Conditional {
        Conditional {
            condition,
            transition: target.to_owned(),
        }
    }

    fn weights(pairs: &[(f64, &str)]) -> Vec<Distribution> {
        pairs.iter().map(|(w, t)| Choice::new(*w, (*t).to_owned())).collect()
    }

    #[test]
    fn direct_always_returns_target() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Direct("Next".to_owned());
        assert_eq!(transition.follow(&p, now, &mut rng).unwrap(), "Next");
    }

    #[test]
    fn conditional_picks_the_true_arm() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Conditional(vec![
            arm(Some(Condition::False), "A"),
            arm(Some(Condition::True), "B"),
            arm(Some(Condition::False), "C"),
        ]);
        assert_eq!(transition.follow(&p, now, &mut rng).unwrap(), "B");
    }

    #[test]
    fn conditional_uses_catch_all() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Conditional(vec![
            arm(Some(Condition::False), "A"),
            arm(None, "Fallback"),
        ]);
        assert_eq!(transition.follow(&p, now, &mut rng).unwrap(), "Fallback");
    }

    #[test]
    fn conditional_without_match_goes_terminal() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Conditional(vec![
            arm(Some(Condition::False), "A"),
            arm(Some(Condition::False), "B"),
        ]);
        assert_eq!(transition.follow(&p, now, &mut rng).unwrap(), TERMINAL);
    }

    #[test]
    fn conditional_propagates_condition_errors() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Conditional(vec![arm(
            Some(Condition::Gender {
                gender: "?".to_owned(),
            }),
            "A",
        )]);
        assert!(matches!(
            transition.follow(&p, now, &mut rng),
            Err(EvalError::Condition(_))
        ));
    }

    #[test]
    fn distributed_frequencies_follow_weights() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Distributed(weights(&[(0.3, "A"), (0.6, "B"), (0.1, "C")]));
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let draws: u32 = 100_000;
        for _ in 0..draws {
            let target = transition.follow(&p, now, &mut rng).unwrap();
            *counts.entry(target.to_owned()).or_default() += 1;
        }
        for (name, expected) in [("A", 0.3), ("B", 0.6), ("C", 0.1)] {
            let freq = f64::from(counts.get(name).copied().unwrap_or(0)) / f64::from(draws);
            assert!((freq - expected).abs() < 0.01, "{name}: {freq}");
        }
    }

    #[test]
    fn complex_samples_the_matching_arm() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Complex(vec![
            ComplexArm {
                condition: Some(Condition::False),
                distributions: weights(&[(1.0, "Never")]),
            },
            ComplexArm {
                condition: Some(Condition::True),
                distributions: weights(&[(0.5, "X"), (0.5, "Y")]),
            },
        ]);
        for _ in 0..100 {
            let target = transition.follow(&p, now, &mut rng).unwrap();
            assert!(target == "X" || target == "Y");
        }
    }

    #[test]
    fn complex_frequencies_follow_weights() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Complex(vec![
            ComplexArm {
                condition: Some(Condition::False),
                distributions: weights(&[(1.0, "Never")]),
            },
            ComplexArm {
                condition: Some(Condition::True),
                distributions: weights(&[(0.3, "A"), (0.6, "B"), (0.1, "C")]),
            },
        ]);
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        let draws: u32 = 100_000;
        for _ in 0..draws {
            let target = transition.follow(&p, now, &mut rng).unwrap();
            *counts.entry(target.to_owned()).or_default() += 1;
        }
        assert!(!counts.contains_key("Never"));
        for (name, expected) in [("A", 0.3), ("B", 0.6), ("C", 0.1)] {
            let freq = f64::from(counts.get(name).copied().unwrap_or(0)) / f64::from(draws);
            assert!((freq - expected).abs() < 0.01, "{name}: {freq}");
        }
    }

    #[test]
    fn complex_without_match_goes_terminal() {
        let (p, now, mut rng) = setup();
        let transition = Transition::Complex(vec![ComplexArm {
            condition: Some(Condition::False),
            distributions: weights(&[(1.0, "Never")]),
        }]);
        assert_eq!(transition.follow(&p, now, &mut rng).unwrap(), TERMINAL);
    }

    #[test]
    fn targets_lists_every_branch() {
        let transition = Transition::Complex(vec![
            ComplexArm {
                condition: Some(Condition::True),
                distributions: weights(&[(0.5, "X"), (0.5, "Y")]),
            },
            ComplexArm {
                condition: None,
                distributions: weights(&[(1.0, "Z")]),
            },
        ]);
        assert_eq!(transition.targets(), vec!["X", "Y", "Z"]);
    }
}
