//! In-memory health record of one patient.
//!
//! The record is append-only apart from stop times: ending a diagnosis,
//! prescription or care plan stamps its `stop` field and leaves the entry
//! in place, so the full history is available for export.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use synthea_gmf::RecordKind;
use synthea_types::Code;

/// A diagnosis, prescription or care plan with a lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Name of the state that started this entry.
    pub state: String,
    /// Codes describing the entry.
    pub codes: Vec<Code>,
    /// Care plan activities; empty for other kinds.
    pub activities: Vec<Code>,
    /// When the entry started.
    pub start: DateTime<Utc>,
    /// When the entry ended, if it has.
    pub stop: Option<DateTime<Utc>>,
    /// Encounter state this entry was recorded under.
    pub encounter: Option<String>,
    /// Name of the state or attribute giving the reason.
    pub reason: Option<String>,
}

impl Entry {
    /// Whether the entry has not been ended.
    pub const fn is_active(&self) -> bool {
        self.stop.is_none()
    }
}

/// One encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    /// Name of the Encounter state.
    pub state: String,
    /// Encounter class.
    pub class: Option<String>,
    /// Whether this was a scheduled wellness visit.
    pub wellness: bool,
    /// Encounter type codes.
    pub codes: Vec<Code>,
    /// When it took place.
    pub time: DateTime<Utc>,
    /// Name of the state or attribute giving the reason.
    pub reason: Option<String>,
}

/// One performed procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    /// Name of the Procedure state.
    pub state: String,
    /// Procedure codes.
    pub codes: Vec<Code>,
    /// When it was performed.
    pub time: DateTime<Utc>,
    /// Encounter state it was recorded under.
    pub encounter: Option<String>,
    /// Name of the state or attribute giving the reason.
    pub reason: Option<String>,
}

/// One observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Name of the Observation state.
    pub state: String,
    /// Observation codes.
    pub codes: Vec<Code>,
    /// Observed value.
    pub value: f64,
    /// Unit of the value.
    pub unit: String,
    /// When it was taken.
    pub time: DateTime<Utc>,
    /// Encounter state it was recorded under.
    pub encounter: Option<String>,
}

/// Every clinical fact recorded for one patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Encounters in the order they happened.
    pub encounters: Vec<Encounter>,
    /// Diagnoses, active and ended.
    pub conditions: Vec<Entry>,
    /// Prescriptions, active and ended.
    pub medications: Vec<Entry>,
    /// Care plans, active and ended.
    pub careplans: Vec<Entry>,
    /// Procedures in the order they were performed.
    pub procedures: Vec<Procedure>,
    /// Observations in the order they were taken.
    pub observations: Vec<Observation>,
    /// Symptom severity by symptom, then by cause.
    pub symptoms: BTreeMap<String, BTreeMap<String, i64>>,
    /// Time of death, once known.
    pub death: Option<DateTime<Utc>>,
}

impl HealthRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries of one kind.
    pub fn entries(&self, kind: RecordKind) -> &[Entry] {
        match kind {
            RecordKind::Condition => &self.conditions,
            RecordKind::Medication => &self.medications,
            RecordKind::CarePlan => &self.careplans,
        }
    }

    fn entries_mut(&mut self, kind: RecordKind) -> &mut Vec<Entry> {
        match kind {
            RecordKind::Condition => &mut self.conditions,
            RecordKind::Medication => &mut self.medications,
            RecordKind::CarePlan => &mut self.careplans,
        }
    }

    /// Add a started entry.
    pub fn start(&mut self, kind: RecordKind, entry: Entry) {
        self.entries_mut(kind).push(entry);
    }

    /// Stamp `time` as the stop of every active entry of `kind` that
    /// `matches`. Returns how many entries were ended.
    pub fn end_matching(&mut self, kind: RecordKind, time: DateTime<Utc>, matches: impl Fn(&Entry) -> bool) -> usize {
        let mut ended = 0_usize;
        for entry in self.entries_mut(kind).iter_mut().filter(|e| e.is_active()) {
            if matches(entry) {
                entry.stop = Some(time);
                ended = ended.saturating_add(1);
            }
        }
        ended
    }

    /// Active entries of one kind.
    pub fn active(&self, kind: RecordKind) -> impl Iterator<Item = &Entry> {
        self.entries(kind).iter().filter(|e| e.is_active())
    }

    /// Most recent observation that `matches`.
    pub fn latest_observation(&self, matches: impl Fn(&Observation) -> bool) -> Option<&Observation> {
        self.observations.iter().rev().find(|o| matches(o))
    }

    /// Record a symptom's severity from one cause, replacing any earlier
    /// severity from the same cause.
    pub fn set_symptom(&mut self, symptom: &str, cause: &str, severity: i64) {
        self.symptoms
            .entry(symptom.to_owned())
            .or_default()
            .insert(cause.to_owned(), severity);
    }

    /// Strongest severity of a symptom across all causes.
    pub fn symptom_severity(&self, symptom: &str) -> Option<i64> {
        self.symptoms.get(symptom).and_then(|causes| causes.values().copied().max())
    }

    /// Record a death at `at`. An earlier recorded death wins.
    pub fn set_death(&mut self, at: DateTime<Utc>) {
        self.death = Some(self.death.map_or(at, |known| known.min(at)));
    }
}
