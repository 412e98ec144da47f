//! The simulated patient.
//!
//! [`Person`] joins a sampled [`PatientProfile`], free-form attributes set
//! by modules, the trail of states it has passed through and its
//! [`HealthRecord`]. It implements [`Entity`] so modules can read and
//! write all of these.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::Rng;
use synthea_gmf::{ClinicalEvent, Entity, RecordKind, RecordSelector};
use synthea_types::{AttributeValue, Code, Gender, PatientId};
use tracing::debug;

use crate::demographics::Demographics;
use crate::error::DemographicsError;
use crate::patient::PatientProfile;
use crate::record::{Encounter, Entry, HealthRecord, Observation, Procedure};

/// One state a person has left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVisit {
    /// Module the state belongs to.
    pub module: String,
    /// State name.
    pub state: String,
    /// When the person left it.
    pub time: DateTime<Utc>,
}

/// A simulated patient.
#[derive(Debug, Clone)]
pub struct Person {
    id: PatientId,
    profile: PatientProfile,
    attributes: BTreeMap<String, AttributeValue>,
    visited: BTreeSet<String>,
    visits: Vec<StateVisit>,
    record: HealthRecord,
}

impl Person {
    /// A person with the given profile and an empty history.
    pub fn new(profile: PatientProfile) -> Self {
        Self::with_id(PatientId::new(), profile)
    }

    fn with_id(id: PatientId, profile: PatientProfile) -> Self {
        Self {
            id,
            profile,
            attributes: BTreeMap::new(),
            visited: BTreeSet::new(),
            visits: Vec::new(),
            record: HealthRecord::new(),
        }
    }

    /// Sample a new person who is younger than `max_age` years at `end`.
    /// The identifier is drawn from `rng` too, so a seeded generator
    /// reproduces the whole person.
    ///
    /// # Errors
    ///
    /// Returns a [`DemographicsError`] if sampling fails.
    pub fn generate<R: Rng + ?Sized>(
        demographics: &Demographics,
        end: DateTime<Utc>,
        max_age: u32,
        rng: &mut R,
    ) -> Result<Self, DemographicsError> {
        let profile = PatientProfile::sample(demographics, end, max_age, rng)?;
        let id = PatientId::from_random_bytes(rng.random());
        Ok(Self::with_id(id, profile))
    }

    /// Stable identifier.
    pub const fn id(&self) -> PatientId {
        self.id
    }

    /// Demographic profile.
    pub const fn profile(&self) -> &PatientProfile {
        &self.profile
    }

    /// Clinical history.
    pub const fn health_record(&self) -> &HealthRecord {
        &self.record
    }

    /// All attributes set so far.
    pub const fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    /// Every state left so far, oldest first.
    pub fn visits(&self) -> &[StateVisit] {
        &self.visits
    }

    /// Recorded time of death.
    pub const fn death_date(&self) -> Option<DateTime<Utc>> {
        self.record.death
    }

    /// Whether the person is alive at `time`. A death recorded for a later
    /// instant has not happened yet.
    pub fn is_alive(&self, time: DateTime<Utc>) -> bool {
        self.record.death.is_none_or(|death| death > time)
    }
}

/// Whether a record started by `state` with `codes` is the one `selector`
/// names.
fn selector_matches(
    attributes: &BTreeMap<String, AttributeValue>,
    selector: &RecordSelector,
    state: &str,
    codes: &[Code],
) -> bool {
    match selector {
        RecordSelector::Attribute(name) => attributes
            .get(name)
            .and_then(|v| v.as_text().ok())
            .is_some_and(|origin| origin == state),
        RecordSelector::State(origin) => origin == state,
        RecordSelector::Codes(wanted) => wanted
            .iter()
            .any(|w| codes.iter().any(|c| c.same_concept(w))),
    }
}

impl Entity for Person {
    fn birth_date(&self) -> DateTime<Utc> {
        self.profile.birth_date
    }

    fn gender(&self) -> Gender {
        self.profile.gender
    }

    fn race(&self) -> &str {
        &self.profile.race
    }

    fn socioeconomic_category(&self) -> &str {
        &self.profile.socioeconomic_category
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
        self.record
            .active(kind)
            .any(|entry| selector_matches(&self.attributes, selector, &entry.state, &entry.codes))
    }

    fn observation_value(&self, selector: &RecordSelector) -> Option<f64> {
        self.record
            .latest_observation(|o| selector_matches(&self.attributes, selector, &o.state, &o.codes))
            .map(|o| o.value)
    }

    #[allow(clippy::cast_precision_loss)]
    fn symptom_severity(&self, symptom: &str) -> Option<f64> {
        self.record.symptom_severity(symptom).map(|s| s as f64)
    }

    fn has_visited(&self, state: &str) -> bool {
        self.visited.contains(state)
    }

    fn record_state_visit(&mut self, module: &str, state: &str, time: DateTime<Utc>) {
        self.visited.insert(state.to_owned());
        self.visits.push(StateVisit {
            module: module.to_owned(),
            state: state.to_owned(),
            time,
        });
    }

    fn record(&mut self, event: ClinicalEvent<'_>, time: DateTime<Utc>) {
        match event {
            ClinicalEvent::Encounter {
                state,
                class,
                wellness,
                codes,
                reason,
            } => self.record.encounters.push(Encounter {
                state: state.to_owned(),
                class: class.map(str::to_owned),
                wellness,
                codes: codes.to_vec(),
                time,
                reason: reason.map(str::to_owned),
            }),
            ClinicalEvent::Start {
                kind,
                state,
                codes,
                activities,
                target_encounter,
                reason,
            } => self.record.start(
                kind,
                Entry {
                    state: state.to_owned(),
                    codes: codes.to_vec(),
                    activities: activities.to_vec(),
                    start: time,
                    stop: None,
                    encounter: target_encounter.map(str::to_owned),
                    reason: reason.map(str::to_owned),
                },
            ),
            ClinicalEvent::End { kind, selector } => {
                let attributes = &self.attributes;
                let ended = self
                    .record
                    .end_matching(kind, time, |entry| {
                        selector_matches(attributes, selector, &entry.state, &entry.codes)
                    });
                if ended == 0 {
                    debug!(patient = %self.id, kind = ?kind, selector = ?selector, "No active record to end");
                }
            }
            ClinicalEvent::Procedure {
                state,
                codes,
                target_encounter,
                reason,
            } => self.record.procedures.push(Procedure {
                state: state.to_owned(),
                codes: codes.to_vec(),
                time,
                encounter: target_encounter.map(str::to_owned),
                reason: reason.map(str::to_owned),
            }),
            ClinicalEvent::Observation {
                state,
                codes,
                value,
                unit,
                target_encounter,
            } => self.record.observations.push(Observation {
                state: state.to_owned(),
                codes: codes.to_vec(),
                value,
                unit: unit.to_owned(),
                time,
                encounter: target_encounter.map(str::to_owned),
            }),
            ClinicalEvent::Symptom {
                symptom,
                cause,
                severity,
            } => self.record.set_symptom(symptom, cause, severity),
            ClinicalEvent::Death { at } => {
                debug!(patient = %self.id, at = %at, "Death recorded");
                self.record.set_death(at);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use synthea_gmf::{AgeUnit, Condition, parse_module_str};

    use super::*;
    use crate::demographics::BirthplaceChange;

    fn person() -> Person {
        Person::new(PatientProfile {
            gender: Gender::Female,
            birth_date: Utc.with_ymd_and_hms(1980, 3, 1, 0, 0, 0).unwrap(),
            race: "Asian".to_owned(),
            ethnicity: "Chinese".to_owned(),
            blood_type: "a_positive".to_owned(),
            birthplace_change: BirthplaceChange::Same,
            socioeconomic_category: "High".to_owned(),
            height_cm: 51.0,
            weight_kg: 3.5,
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap()
    }

    fn diabetes() -> Vec<Code> {
        vec![Code::new("SNOMED-CT", "44054006", "Diabetes")]
    }

    #[test]
    fn conditions_read_profile_facts() {
        let p = person();
        assert_eq!(p.age_at(now(), AgeUnit::Years), Some(40));
        let asian_woman = Condition::And(vec![
            Condition::Gender {
                gender: "F".to_owned(),
            },
            Condition::Race {
                race: "Asian".to_owned(),
            },
            Condition::SocioeconomicStatus {
                category: "High".to_owned(),
            },
        ]);
        assert!(asian_woman.test(&p, now()).unwrap());
    }

    #[test]
    fn start_and_end_by_attribute() {
        let mut p = person();
        let codes = diabetes();
        p.set_attribute("diabetes", AttributeValue::from("Diagnose"));
        p.record(
            ClinicalEvent::Start {
                kind: RecordKind::Condition,
                state: "Diagnose",
                codes: &codes,
                activities: &[],
                target_encounter: Some("Visit"),
                reason: None,
            },
            now(),
        );
        let by_attribute = RecordSelector::Attribute("diabetes".to_owned());
        assert!(p.is_active(RecordKind::Condition, &by_attribute));
        assert!(p.is_active(RecordKind::Condition, &RecordSelector::Codes(codes.clone())));
        assert!(!p.is_active(RecordKind::Medication, &by_attribute));

        let later = now() + TimeDelta::days(30);
        p.record(
            ClinicalEvent::End {
                kind: RecordKind::Condition,
                selector: &by_attribute,
            },
            later,
        );
        assert!(!p.is_active(RecordKind::Condition, &by_attribute));
        let entry = p.health_record().conditions.first().unwrap();
        assert_eq!(entry.stop, Some(later));
        assert_eq!(entry.encounter.as_deref(), Some("Visit"));
    }

    #[test]
    fn observations_and_symptoms_are_readable() {
        let mut p = person();
        let codes = vec![Code::new("LOINC", "4548-4", "HbA1c")];
        p.record(
            ClinicalEvent::Observation {
                state: "Lab",
                codes: &codes,
                value: 7.2,
                unit: "%",
                target_encounter: None,
            },
            now(),
        );
        p.record(
            ClinicalEvent::Symptom {
                symptom: "Thirst",
                cause: "Diabetes",
                severity: 60,
            },
            now(),
        );
        assert_eq!(p.observation_value(&RecordSelector::Codes(codes)), Some(7.2));
        assert_eq!(p.symptom_severity("Thirst"), Some(60.0));
    }

    #[test]
    fn observation_condition_by_code_attribute_and_state() {
        let mut p = person();
        let height = vec![Code::new("LOINC", "8302-2", "Body Height")];
        p.set_attribute("height_obs", AttributeValue::from("Measure"));
        for (state, value) in [("Measure", 165.0), ("Other Height", 150.0)] {
            p.record(
                ClinicalEvent::Observation {
                    state,
                    codes: &height,
                    value,
                    unit: "cm",
                    target_encounter: None,
                },
                now(),
            );
        }
        let at_165 = |selector: RecordSelector| Condition::Observation {
            selector,
            operator: "==".to_owned(),
            value: 165.0,
        };

        assert!(!at_165(RecordSelector::Codes(height.clone())).test(&p, now()).unwrap());
        assert!(at_165(RecordSelector::Attribute("height_obs".to_owned())).test(&p, now()).unwrap());
        assert!(at_165(RecordSelector::State("Measure".to_owned())).test(&p, now()).unwrap());
        assert!(!at_165(RecordSelector::Attribute("unset".to_owned())).test(&p, now()).unwrap());
        assert_eq!(p.observation_value(&RecordSelector::Codes(height)), Some(150.0));
    }

    #[test]
    fn future_death_is_not_yet_death() {
        let mut p = person();
        let at = now() + TimeDelta::days(365);
        p.record(ClinicalEvent::Death { at }, now());
        assert!(p.is_alive(now()));
        assert!(!p.is_alive(at));
        assert_eq!(p.death_date(), Some(at));
    }

    #[test]
    fn runs_a_module_end_to_end() {
        let module = parse_module_str(
            r#"{
                "name": "Diagnosis",
                "states": {
                    "Initial": { "type": "Initial", "direct_transition": "Visit" },
                    "Visit": {
                        "type": "Encounter",
                        "encounter_class": "ambulatory",
                        "codes": [{ "system": "SNOMED-CT", "code": "185345009", "display": "Encounter" }],
                        "direct_transition": "Diagnose"
                    },
                    "Diagnose": {
                        "type": "ConditionOnset",
                        "target_encounter": "Visit",
                        "assign_to_attribute": "diabetes",
                        "codes": [{ "system": "SNOMED-CT", "code": "44054006", "display": "Diabetes" }],
                        "direct_transition": "Terminal"
                    },
                    "Terminal": { "type": "Terminal" }
                }
            }"#,
        )
        .unwrap();
        let mut p = person();
        let mut ctx = module.init().unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        module.process(&mut ctx, &mut p, now(), &mut rng).unwrap();

        assert!(module.is_terminated(&ctx));
        assert_eq!(p.health_record().encounters.len(), 1);
        assert!(p.is_active(RecordKind::Condition, &RecordSelector::Attribute("diabetes".to_owned())));
        assert!(p.has_visited("Visit"));
        let trail: Vec<&str> = p.visits().iter().map(|v| v.state.as_str()).collect();
        assert_eq!(trail, vec!["Initial", "Visit", "Diagnose"]);
    }

    #[test]
    fn generated_people_have_unique_ids() {
        let demographics = Demographics::massachusetts().unwrap();
        let mut rng = SmallRng::seed_from_u64(8);
        let a = Person::generate(&demographics, now(), 100, &mut rng).unwrap();
        let b = Person::generate(&demographics, now(), 100, &mut rng).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.is_alive(now()));
    }

    #[test]
    fn seeded_generation_reproduces_the_id() {
        let demographics = Demographics::massachusetts().unwrap();
        let a = Person::generate(&demographics, now(), 100, &mut SmallRng::seed_from_u64(8)).unwrap();
        let b = Person::generate(&demographics, now(), 100, &mut SmallRng::seed_from_u64(8)).unwrap();
        assert_eq!(a.id(), b.id());
        assert_eq!(a.profile(), b.profile());
    }
}
