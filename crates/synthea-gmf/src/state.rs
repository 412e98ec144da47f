//! State nodes and their processing rules.
//!
//! A [`State`] is immutable once parsed. Anything that must persist
//! between visits (the wait window of a Delay) is owned by the caller and
//! passed in, so one parsed module can serve any number of entities.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use synthea_types::{AttributeValue, Code};

use crate::condition::Condition;
use crate::entity::{ClinicalEvent, Entity, RecordKind, RecordSelector};
use crate::error::EvalError;
use crate::quantity::{Quantity, QuantityError};
use crate::transition::Transition;

/// Wait window of a Delay state, stored in the entity's context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayTimer {
    /// When the delay started.
    pub start: DateTime<Utc>,
    /// When the delay elapses.
    pub end: DateTime<Utc>,
}

/// Fields shared by states that open a clinical record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStart {
    /// Codes describing the record.
    pub codes: Vec<Code>,
    /// Encounter state the record belongs to.
    pub target_encounter: Option<String>,
    /// Attribute that receives this state's name so later states can
    /// refer back to the record.
    pub assign_to_attribute: Option<String>,
    /// Name of the state or attribute giving the reason.
    pub reason: Option<String>,
}

/// Direction of a Counter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    /// Add one.
    Increment,
    /// Subtract one.
    Decrement,
}

impl CounterAction {
    /// Parse `"increment"` or `"decrement"`.
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "increment" => Some(Self::Increment),
            "decrement" => Some(Self::Decrement),
            _ => None,
        }
    }
}

/// Variant-specific payload of a state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    /// Entry point of every module.
    Initial,
    /// Absorbing end state.
    Terminal,
    /// Pass-through node.
    Simple,
    /// Blocks until `allow` holds.
    Guard {
        /// Condition that releases the guard.
        allow: Condition,
    },
    /// Blocks until the sampled duration has elapsed.
    Delay {
        /// Wait length.
        duration: Quantity,
    },
    /// Starts an encounter.
    Encounter {
        /// Scheduled wellness visit.
        wellness: bool,
        /// Encounter class.
        encounter_class: Option<String>,
        /// Name of the state or attribute giving the reason.
        reason: Option<String>,
        /// Encounter type codes.
        codes: Vec<Code>,
    },
    /// Diagnoses a condition.
    ConditionOnset(RecordStart),
    /// Resolves a condition.
    ConditionEnd(RecordSelector),
    /// Prescribes a medication.
    MedicationOrder(RecordStart),
    /// Stops a medication.
    MedicationEnd(RecordSelector),
    /// Starts a care plan.
    CarePlanStart {
        /// Record fields.
        start: RecordStart,
        /// Care plan activities.
        activities: Vec<Code>,
    },
    /// Stops a care plan.
    CarePlanEnd(RecordSelector),
    /// Performs a procedure.
    Procedure {
        /// Procedure codes.
        codes: Vec<Code>,
        /// Encounter state the procedure belongs to.
        target_encounter: Option<String>,
        /// Name of the state or attribute giving the reason.
        reason: Option<String>,
    },
    /// Records an observation.
    Observation {
        /// Observation codes.
        codes: Vec<Code>,
        /// Value, sampled per visit.
        value: Quantity,
        /// Unit of the value.
        unit: String,
        /// Encounter state the observation belongs to.
        target_encounter: Option<String>,
    },
    /// Sets a symptom's severity.
    Symptom {
        /// Symptom name.
        symptom: String,
        /// What caused it.
        cause: String,
        /// Severity, sampled per visit.
        severity: Quantity,
    },
    /// Sets or clears an attribute.
    SetAttribute {
        /// Attribute name.
        attribute: String,
        /// New value; `None` clears the attribute.
        value: Option<AttributeValue>,
    },
    /// Steps a numeric attribute by one.
    Counter {
        /// Attribute name.
        attribute: String,
        /// Direction.
        action: CounterAction,
    },
    /// Kills the entity, optionally at a later time.
    Death {
        /// Time until death; `None` means now.
        delay: Option<Quantity>,
    },
}

impl StateKind {
    /// The `type` discriminator used in module files.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Terminal => "Terminal",
            Self::Simple => "Simple",
            Self::Guard { .. } => "Guard",
            Self::Delay { .. } => "Delay",
            Self::Encounter { .. } => "Encounter",
            Self::ConditionOnset(_) => "ConditionOnset",
            Self::ConditionEnd(_) => "ConditionEnd",
            Self::MedicationOrder(_) => "MedicationOrder",
            Self::MedicationEnd(_) => "MedicationEnd",
            Self::CarePlanStart { .. } => "CarePlanStart",
            Self::CarePlanEnd(_) => "CarePlanEnd",
            Self::Procedure { .. } => "Procedure",
            Self::Observation { .. } => "Observation",
            Self::Symptom { .. } => "Symptom",
            Self::SetAttribute { .. } => "SetAttribute",
            Self::Counter { .. } => "Counter",
            Self::Death { .. } => "Death",
        }
    }
}

/// A named node of a module.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    name: String,
    kind: StateKind,
    transition: Option<Transition>,
}

impl State {
    /// Assemble a state. Terminal states should carry no transition.
    pub fn new(name: impl Into<String>, kind: StateKind, transition: Option<Transition>) -> Self {
        Self {
            name: name.into(),
            kind,
            transition,
        }
    }

    /// Name, unique within the module.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variant payload.
    pub const fn kind(&self) -> &StateKind {
        &self.kind
    }

    /// Outgoing transition; `None` for Terminal.
    pub const fn transition(&self) -> Option<&Transition> {
        self.transition.as_ref()
    }

    /// Whether this is the absorbing Terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self.kind, StateKind::Terminal)
    }

    /// Do this state's work at `time`.
    ///
    /// Returns `true` when the module should advance immediately and
    /// `false` when it should pause here until called again. `timer` is
    /// the context's delay slot; it is only touched by Delay states.
    pub fn process<R: Rng + ?Sized>(
        &self,
        timer: &mut Option<DelayTimer>,
        entity: &mut dyn Entity,
        time: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<bool, EvalError> {
        let name = self.name.as_str();
        match &self.kind {
            StateKind::Initial | StateKind::Simple => Ok(true),
            StateKind::Terminal => Ok(false),
            StateKind::Guard { allow } => Ok(allow.test(&*entity, time)?),
            StateKind::Delay { duration } => {
                let window = match *timer {
                    Some(window) => window,
                    None => {
                        let end = shift(time, duration.resolve(rng)?)?;
                        let window = DelayTimer { start: time, end };
                        *timer = Some(window);
                        window
                    }
                };
                Ok(time >= window.end)
            }
            StateKind::Encounter {
                wellness,
                encounter_class,
                reason,
                codes,
            } => {
                let event = ClinicalEvent::Encounter {
                    state: name,
                    class: encounter_class.as_deref(),
                    wellness: *wellness,
                    codes,
                    reason: reason.as_deref(),
                };
                entity.record(event, time);
                Ok(true)
            }
            StateKind::ConditionOnset(start) => {
                start_record(entity, RecordKind::Condition, name, start, &[], time);
                Ok(true)
            }
            StateKind::MedicationOrder(start) => {
                start_record(entity, RecordKind::Medication, name, start, &[], time);
                Ok(true)
            }
            StateKind::CarePlanStart { start, activities } => {
                start_record(entity, RecordKind::CarePlan, name, start, activities, time);
                Ok(true)
            }
            StateKind::ConditionEnd(selector) => {
                end_record(entity, RecordKind::Condition, selector, time);
                Ok(true)
            }
            StateKind::MedicationEnd(selector) => {
                end_record(entity, RecordKind::Medication, selector, time);
                Ok(true)
            }
            StateKind::CarePlanEnd(selector) => {
                end_record(entity, RecordKind::CarePlan, selector, time);
                Ok(true)
            }
            StateKind::Procedure {
                codes,
                target_encounter,
                reason,
            } => {
                let event = ClinicalEvent::Procedure {
                    state: name,
                    codes,
                    target_encounter: target_encounter.as_deref(),
                    reason: reason.as_deref(),
                };
                entity.record(event, time);
                Ok(true)
            }
            StateKind::Observation {
                codes,
                value,
                unit,
                target_encounter,
            } => {
                #[allow(clippy::cast_precision_loss)]
                let value = value.sample_value(rng)? as f64;
                let event = ClinicalEvent::Observation {
                    state: name,
                    codes,
                    value,
                    unit,
                    target_encounter: target_encounter.as_deref(),
                };
                entity.record(event, time);
                Ok(true)
            }
            StateKind::Symptom {
                symptom,
                cause,
                severity,
            } => {
                let severity = severity.sample_value(rng)?;
                entity.record(
                    ClinicalEvent::Symptom {
                        symptom,
                        cause,
                        severity,
                    },
                    time,
                );
                Ok(true)
            }
            StateKind::SetAttribute { attribute, value } => {
                match value {
                    Some(value) => entity.set_attribute(attribute, value.clone()),
                    None => {
                        entity.remove_attribute(attribute);
                    }
                }
                Ok(true)
            }
            StateKind::Counter { attribute, action } => {
                let current = match entity.attribute(attribute) {
                    Some(value) => value.as_integer()?,
                    None => 0,
                };
                let next = match action {
                    CounterAction::Increment => current.saturating_add(1),
                    CounterAction::Decrement => current.saturating_sub(1),
                };
                entity.set_attribute(attribute, AttributeValue::from(next));
                Ok(true)
            }
            StateKind::Death { delay } => {
                let at = match delay {
                    Some(delay) => shift(time, delay.resolve(rng)?)?,
                    None => time,
                };
                entity.record(ClinicalEvent::Death { at }, time);
                Ok(true)
            }
        }
    }

    /// Name of the successor state, or `None` for Terminal.
    pub fn next<R: Rng + ?Sized>(
        &self,
        entity: &dyn Entity,
        time: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<Option<&str>, EvalError> {
        self.transition
            .as_ref()
            .map(|transition| transition.follow(entity, time, rng))
            .transpose()
    }
}

fn start_record(
    entity: &mut dyn Entity,
    kind: RecordKind,
    state: &str,
    start: &RecordStart,
    activities: &[Code],
    time: DateTime<Utc>,
) {
    let event = ClinicalEvent::Start {
        kind,
        state,
        codes: &start.codes,
        activities,
        target_encounter: start.target_encounter.as_deref(),
        reason: start.reason.as_deref(),
    };
    entity.record(event, time);
    if let Some(attribute) = &start.assign_to_attribute {
        entity.set_attribute(attribute, AttributeValue::from(state));
    }
}

fn end_record(entity: &mut dyn Entity, kind: RecordKind, selector: &RecordSelector, time: DateTime<Utc>) {
    entity.record(ClinicalEvent::End { kind, selector }, time);
}

fn shift(time: DateTime<Utc>, span: TimeDelta) -> Result<DateTime<Utc>, EvalError> {
    time.checked_add_signed(span).ok_or_else(|| {
        EvalError::Quantity(QuantityError::Overflow {
            quantity: span.num_seconds(),
            unit: "seconds".to_owned(),
        })
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use synthea_types::Gender;

    use super::*;
    use crate::entity::StubEntity;
    use crate::quantity::{Exact, Range};

    fn setup() -> (StubEntity, DateTime<Utc>, SmallRng) {
        let birth = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        (StubEntity::new(birth, Gender::Female), now, SmallRng::seed_from_u64(3))
    }

    fn state(kind: StateKind) -> State {
        State::new("Under Test", kind, Some(Transition::Direct("Terminal".to_owned())))
    }

    fn days(quantity: i64) -> Quantity {
        Quantity::Exact(Exact {
            quantity,
            unit: "days".to_owned(),
        })
    }

    #[test]
    fn terminal_blocks_and_has_no_successor() {
        let (mut p, now, mut rng) = setup();
        let terminal = State::new("Terminal", StateKind::Terminal, None);
        let mut timer = None;
        assert!(!terminal.process(&mut timer, &mut p, now, &mut rng).unwrap());
        assert!(terminal.next(&p, now, &mut rng).unwrap().is_none());
        assert!(terminal.is_terminal());
    }

    #[test]
    fn guard_follows_its_condition() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let open = state(StateKind::Guard { allow: Condition::True });
        let shut = state(StateKind::Guard { allow: Condition::False });
        assert!(open.process(&mut timer, &mut p, now, &mut rng).unwrap());
        assert!(!shut.process(&mut timer, &mut p, now, &mut rng).unwrap());
    }

    #[test]
    fn delay_blocks_until_elapsed() {
        let (mut p, now, mut rng) = setup();
        let delay = state(StateKind::Delay { duration: days(3) });
        let mut timer = None;
        assert!(!delay.process(&mut timer, &mut p, now, &mut rng).unwrap());
        let window = timer.unwrap();
        assert_eq!(window.start, now);
        assert_eq!(window.end, now + TimeDelta::days(3));

        let later = now + TimeDelta::days(2);
        assert!(!delay.process(&mut timer, &mut p, later, &mut rng).unwrap());
        let done = now + TimeDelta::days(3);
        assert!(delay.process(&mut timer, &mut p, done, &mut rng).unwrap());
        assert_eq!(timer, Some(window));
    }

    #[test]
    fn delay_with_bad_unit_fails() {
        let (mut p, now, mut rng) = setup();
        let delay = state(StateKind::Delay {
            duration: Quantity::Exact(Exact {
                quantity: 1,
                unit: "eons".to_owned(),
            }),
        });
        let mut timer = None;
        assert!(matches!(
            delay.process(&mut timer, &mut p, now, &mut rng),
            Err(EvalError::Quantity(QuantityError::InvalidUnit(_)))
        ));
        assert!(timer.is_none());
    }

    #[test]
    fn set_attribute_sets_and_clears() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let set = state(StateKind::SetAttribute {
            attribute: "food".to_owned(),
            value: Some(AttributeValue::from("Fried")),
        });
        set.process(&mut timer, &mut p, now, &mut rng).unwrap();
        assert_eq!(p.attribute("food"), Some(&AttributeValue::from("Fried")));

        let clear = state(StateKind::SetAttribute {
            attribute: "food".to_owned(),
            value: None,
        });
        clear.process(&mut timer, &mut p, now, &mut rng).unwrap();
        assert!(p.attribute("food").is_none());
    }

    #[test]
    fn counter_steps_from_zero_and_rejects_text() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let up = state(StateKind::Counter {
            attribute: "visits".to_owned(),
            action: CounterAction::Increment,
        });
        let down = state(StateKind::Counter {
            attribute: "visits".to_owned(),
            action: CounterAction::Decrement,
        });
        up.process(&mut timer, &mut p, now, &mut rng).unwrap();
        up.process(&mut timer, &mut p, now, &mut rng).unwrap();
        down.process(&mut timer, &mut p, now, &mut rng).unwrap();
        assert_eq!(p.attribute("visits").unwrap().as_integer().unwrap(), 1);

        p.set_attribute("visits", AttributeValue::from("many"));
        assert!(matches!(
            up.process(&mut timer, &mut p, now, &mut rng),
            Err(EvalError::Value(_))
        ));
    }

    #[test]
    fn onset_assigns_attribute_and_end_closes_record() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let onset = State::new(
            "Diagnose Flu",
            StateKind::ConditionOnset(RecordStart {
                codes: vec![Code::new("SNOMED-CT", "6142004", "Influenza")],
                assign_to_attribute: Some("flu".to_owned()),
                ..RecordStart::default()
            }),
            Some(Transition::Direct("End Flu".to_owned())),
        );
        onset.process(&mut timer, &mut p, now, &mut rng).unwrap();
        let by_attribute = RecordSelector::Attribute("flu".to_owned());
        assert!(p.is_active(RecordKind::Condition, &by_attribute));

        let end = state(StateKind::ConditionEnd(by_attribute.clone()));
        end.process(&mut timer, &mut p, now, &mut rng).unwrap();
        assert!(!p.is_active(RecordKind::Condition, &by_attribute));
    }

    #[test]
    fn observation_and_symptom_sample_values() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let observe = state(StateKind::Observation {
            codes: vec![Code::new("LOINC", "1234", "Volume")],
            value: Quantity::Exact(Exact {
                quantity: 5,
                unit: "mL".to_owned(),
            }),
            unit: "mL".to_owned(),
            target_encounter: None,
        });
        observe.process(&mut timer, &mut p, now, &mut rng).unwrap();
        assert_eq!(p.observations.get("1234").copied(), Some(5.0));

        let feel = state(StateKind::Symptom {
            symptom: "Cough".to_owned(),
            cause: "Flu".to_owned(),
            severity: Quantity::Range(Range {
                low: 10,
                high: 20,
                unit: String::new(),
            }),
        });
        feel.process(&mut timer, &mut p, now, &mut rng).unwrap();
        let severity = p.symptom_severity("Cough").unwrap();
        assert!((10.0..=20.0).contains(&severity));
    }

    #[test]
    fn death_may_be_deferred() {
        let (mut p, now, mut rng) = setup();
        let mut timer = None;
        let die = state(StateKind::Death { delay: Some(days(10)) });
        assert!(die.process(&mut timer, &mut p, now, &mut rng).unwrap());
        assert_eq!(p.death, Some(now + TimeDelta::days(10)));
    }

    #[test]
    fn next_delegates_to_transition() {
        let (p, now, mut rng) = setup();
        let simple = state(StateKind::Simple);
        assert_eq!(simple.next(&p, now, &mut rng).unwrap(), Some("Terminal"));
        assert_eq!(simple.kind().type_name(), "Simple");
    }
}
