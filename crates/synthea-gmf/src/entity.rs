//! The entity boundary.
//!
//! Conditions read facts about the simulated patient and states report
//! clinical activity back to it through the [`Entity`] trait. The framework
//! never stores clinical content itself: writing encounters, diagnoses or
//! prescriptions into a record is the implementor's job, triggered by a
//! [`ClinicalEvent`].
//!
//! [`StubEntity`] is a minimal in-memory implementation for driving modules
//! without a full patient record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use synthea_types::{AttributeValue, Code, Gender};

use crate::quantity::{AgeUnit, elapsed_in_unit};

/// Family of clinical record a start/end state or an `Active ...`
/// condition refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    /// A diagnosis.
    Condition,
    /// A prescription.
    Medication,
    /// A care plan.
    CarePlan,
}

/// How a state or condition names an existing clinical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// The record whose originating state name is stored in this attribute.
    Attribute(String),
    /// The record started by the state with this name.
    State(String),
    /// The record carrying any of these codes.
    Codes(Vec<Code>),
}

/// Clinical activity emitted by a state while it is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClinicalEvent<'a> {
    /// An encounter begins.
    Encounter {
        /// Originating state name.
        state: &'a str,
        /// Encounter class (`"ambulatory"`, `"emergency"`, ...).
        class: Option<&'a str>,
        /// Whether this is a scheduled wellness visit.
        wellness: bool,
        /// Encounter type codes.
        codes: &'a [Code],
        /// Name of the state or attribute giving the reason.
        reason: Option<&'a str>,
    },
    /// A diagnosis, prescription or care plan starts.
    Start {
        /// Record family.
        kind: RecordKind,
        /// Originating state name.
        state: &'a str,
        /// Codes describing the record.
        codes: &'a [Code],
        /// Care plan activities; empty for other kinds.
        activities: &'a [Code],
        /// Encounter state this record belongs to.
        target_encounter: Option<&'a str>,
        /// Name of the state or attribute giving the reason.
        reason: Option<&'a str>,
    },
    /// A previously started record ends.
    End {
        /// Record family.
        kind: RecordKind,
        /// Which record to end.
        selector: &'a RecordSelector,
    },
    /// A procedure is performed.
    Procedure {
        /// Originating state name.
        state: &'a str,
        /// Procedure codes.
        codes: &'a [Code],
        /// Encounter state this procedure belongs to.
        target_encounter: Option<&'a str>,
        /// Name of the state or attribute giving the reason.
        reason: Option<&'a str>,
    },
    /// An observation is taken.
    Observation {
        /// Originating state name.
        state: &'a str,
        /// Observation codes.
        codes: &'a [Code],
        /// Observed value.
        value: f64,
        /// Unit of the value.
        unit: &'a str,
        /// Encounter state this observation belongs to.
        target_encounter: Option<&'a str>,
    },
    /// A symptom is felt.
    Symptom {
        /// Symptom name.
        symptom: &'a str,
        /// What caused it.
        cause: &'a str,
        /// Severity on the module's scale.
        severity: i64,
    },
    /// The patient dies at `at`, which may be later than the current time.
    Death {
        /// Time of death.
        at: DateTime<Utc>,
    },
}

/// A simulated patient as seen by modules.
pub trait Entity {
    /// Birth instant.
    fn birth_date(&self) -> DateTime<Utc>;

    /// Whole `unit`s of age at `time`, or `None` before birth.
    fn age_at(&self, time: DateTime<Utc>, unit: AgeUnit) -> Option<i64> {
        elapsed_in_unit(self.birth_date(), time, unit)
    }

    /// Administrative gender.
    fn gender(&self) -> Gender;

    /// Race label.
    fn race(&self) -> &str;

    /// Socioeconomic category (`"High"`, `"Middle"`, `"Low"`).
    fn socioeconomic_category(&self) -> &str;

    /// Read a named attribute.
    fn attribute(&self, name: &str) -> Option<&AttributeValue>;

    /// Write a named attribute.
    fn set_attribute(&mut self, name: &str, value: AttributeValue);

    /// Clear a named attribute, returning its previous value.
    fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue>;

    /// Whether a record of `kind` matching `selector` is currently active.
    fn is_active(&self, kind: RecordKind, selector: &RecordSelector) -> bool;

    /// Most recent value of the observation matching `selector`.
    fn observation_value(&self, selector: &RecordSelector) -> Option<f64>;

    /// Current severity of a named symptom.
    fn symptom_severity(&self, symptom: &str) -> Option<f64>;

    /// Whether any module has moved this entity through a state of this name.
    fn has_visited(&self, state: &str) -> bool;

    /// Called by the engine each time the entity leaves a state.
    fn record_state_visit(&mut self, module: &str, state: &str, time: DateTime<Utc>);

    /// Called by states that produce clinical activity.
    fn record(&mut self, event: ClinicalEvent<'_>, time: DateTime<Utc>);
}

/// Minimal in-memory [`Entity`].
///
/// Tracks attributes, visited states and active records keyed by
/// originating state name; clinical events other than starts, ends and
/// deaths are only counted.
#[derive(Debug, Clone)]
pub struct StubEntity {
    /// Birth instant.
    pub birth_date: DateTime<Utc>,
    /// Administrative gender.
    pub gender: Gender,
    /// Race label.
    pub race: String,
    /// Socioeconomic category.
    pub socioeconomic_category: String,
    /// Named attributes.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Every state name left so far.
    pub visited: BTreeSet<String>,
    /// Active records as (kind, originating state, codes).
    pub active: Vec<(RecordKind, String, Vec<Code>)>,
    /// Latest observation values by code.
    pub observations: BTreeMap<String, f64>,
    /// Latest observation values by originating state.
    pub observations_by_state: BTreeMap<String, f64>,
    /// Current symptom severities.
    pub symptoms: BTreeMap<String, f64>,
    /// Time of death, once a Death state has run.
    pub death: Option<DateTime<Utc>>,
    /// Number of events passed to [`Entity::record`].
    pub events: usize,
}

impl StubEntity {
    /// A living entity with no history.
    pub fn new(birth_date: DateTime<Utc>, gender: Gender) -> Self {
        Self {
            birth_date,
            gender,
            race: "White".to_owned(),
            socioeconomic_category: "Middle".to_owned(),
            attributes: BTreeMap::new(),
            visited: BTreeSet::new(),
            active: Vec::new(),
            observations: BTreeMap::new(),
            observations_by_state: BTreeMap::new(),
            symptoms: BTreeMap::new(),
            death: None,
            events: 0,
        }
    }

    fn matches(&self, selector: &RecordSelector, state: &str, codes: &[Code]) -> bool {
        match selector {
            RecordSelector::Attribute(name) => self
                .attributes
                .get(name)
                .and_then(|v| v.as_text().ok())
                .is_some_and(|origin| origin == state),
            RecordSelector::State(origin) => origin == state,
            RecordSelector::Codes(wanted) => wanted
                .iter()
                .any(|w| codes.iter().any(|c| c.same_concept(w))),
        }
    }
}

impl Entity for StubEntity {
    fn birth_date(&self) -> DateTime<Utc> {
        self.birth_date
    }

    fn gender(&self) -> Gender {
        self.gender
    }

    fn race(&self) -> &str {
        &self.race
    }

    fn socioeconomic_category(&self) -> &str {
        &self.socioeconomic_category
    }

    fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_owned(), value);
    }

    fn remove_attribute(&mut self, name: &str) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    fn is_active(&self, kind: RecordKind, selector: &RecordSelector) -> bool {
        self.active
            .iter()
            .any(|(k, state, codes)| *k == kind && self.matches(selector, state, codes))
    }

    fn observation_value(&self, selector: &RecordSelector) -> Option<f64> {
        match selector {
            RecordSelector::Codes(codes) => codes
                .iter()
                .find_map(|c| self.observations.get(&c.code).copied()),
            RecordSelector::State(origin) => self.observations_by_state.get(origin).copied(),
            RecordSelector::Attribute(name) => self
                .attributes
                .get(name)
                .and_then(|v| v.as_text().ok())
                .and_then(|origin| self.observations_by_state.get(origin).copied()),
        }
    }

    fn symptom_severity(&self, symptom: &str) -> Option<f64> {
        self.symptoms.get(symptom).copied()
    }

    fn has_visited(&self, state: &str) -> bool {
        self.visited.contains(state)
    }

    fn record_state_visit(&mut self, _module: &str, state: &str, _time: DateTime<Utc>) {
        self.visited.insert(state.to_owned());
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&mut self, event: ClinicalEvent<'_>, _time: DateTime<Utc>) {
        self.events = self.events.saturating_add(1);
        match event {
            ClinicalEvent::Start {
                kind, state, codes, ..
            } => self.active.push((kind, state.to_owned(), codes.to_vec())),
            ClinicalEvent::End { kind, selector } => {
                let ended: Vec<usize> = self
                    .active
                    .iter()
                    .enumerate()
                    .filter(|(_, (k, state, codes))| *k == kind && self.matches(selector, state, codes))
                    .map(|(i, _)| i)
                    .collect();
                for index in ended.into_iter().rev() {
                    self.active.remove(index);
                }
            }
            ClinicalEvent::Observation {
                state, codes, value, ..
            } => {
                self.observations_by_state.insert(state.to_owned(), value);
                for code in codes {
                    self.observations.insert(code.code.clone(), value);
                }
            }
            ClinicalEvent::Symptom {
                symptom, severity, ..
            } => {
                self.symptoms.insert(symptom.to_owned(), severity as f64);
            }
            ClinicalEvent::Death { at } => self.death = Some(at),
            ClinicalEvent::Encounter { .. } | ClinicalEvent::Procedure { .. } => {}
        }
    }
}
