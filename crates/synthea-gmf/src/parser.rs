//! Module JSON parsing.
//!
//! serde decodes the document into loosely-typed raw records that mirror
//! the file format field for field; every field is optional. Each state is
//! decoded on its own so a field of the wrong shape is reported against
//! its state. The
//! conversion into [`State`], [`Transition`] and [`Condition`] then checks
//! that each variant has the fields it consumes. The first bad state
//! aborts the whole module with an error naming that state.

use std::collections::BTreeMap;

use serde::Deserialize;
use synthea_types::{AttributeValue, Code};

use crate::condition::Condition;
use crate::entity::RecordSelector;
use crate::error::{ParseError, StateError};
use crate::module::Module;
use crate::quantity::{Exact, Quantity, Range};
use crate::state::{CounterAction, RecordStart, State, StateKind};
use crate::transition::{ComplexArm, Conditional, Distribution, Transition};

#[derive(Debug, Deserialize)]
struct RawModule {
    name: String,
    #[serde(default)]
    states: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawState {
    #[serde(rename = "type")]
    state_type: Option<String>,
    target_encounter: Option<String>,
    encounter_class: Option<String>,
    reason: Option<String>,
    condition_onset: Option<String>,
    medication_order: Option<String>,
    careplan: Option<String>,
    attribute: Option<String>,
    value: Option<AttributeValue>,
    action: Option<String>,
    assign_to_attribute: Option<String>,
    referenced_by_attribute: Option<String>,
    exact: Option<Exact>,
    range: Option<Range>,
    unit: Option<String>,
    codes: Option<Vec<Code>>,
    activities: Option<Vec<Code>>,
    allow: Option<RawCondition>,
    wellness: bool,
    symptom: Option<String>,
    cause: Option<String>,
    direct_transition: Option<String>,
    distributed_transition: Option<Vec<RawDistribution>>,
    conditional_transition: Option<Vec<RawConditional>>,
    complex_transition: Option<Vec<RawComplex>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCondition {
    condition_type: Option<String>,
    conditions: Vec<RawCondition>,
    condition: Option<Box<RawCondition>>,
    operator: Option<String>,
    quantity: Option<f64>,
    value: Option<AttributeValue>,
    unit: Option<String>,
    gender: Option<String>,
    year: Option<i32>,
    category: Option<String>,
    race: Option<String>,
    symptom: Option<String>,
    codes: Option<Vec<Code>>,
    referenced_by_attribute: Option<String>,
    name: Option<String>,
    attribute: Option<String>,
    minimum: Option<usize>,
    maximum: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDistribution {
    distribution: f64,
    transition: String,
}

#[derive(Debug, Deserialize)]
struct RawConditional {
    #[serde(default)]
    condition: Option<RawCondition>,
    transition: String,
}

#[derive(Debug, Deserialize)]
struct RawComplex {
    #[serde(default)]
    condition: Option<RawCondition>,
    #[serde(default)]
    distributions: Vec<RawDistribution>,
}

/// Parse a module document from raw bytes.
pub fn parse_module(bytes: &[u8]) -> Result<Module, ParseError> {
    let raw: RawModule = serde_json::from_slice(bytes)?;
    build_module(raw)
}

/// Parse a module document from a string.
pub fn parse_module_str(json: &str) -> Result<Module, ParseError> {
    let raw: RawModule = serde_json::from_str(json)?;
    build_module(raw)
}

fn build_module(raw: RawModule) -> Result<Module, ParseError> {
    let mut states = Vec::with_capacity(raw.states.len());
    for (name, record) in raw.states {
        let decoded = serde_json::from_value::<RawState>(record).map_err(|e| StateError::Malformed {
            reason: e.to_string(),
        });
        match decoded.and_then(|record| parse_state(&name, record)) {
            Ok(state) => states.push(state),
            Err(source) => return Err(ParseError::InvalidState { state: name, source }),
        }
    }
    Ok(Module::new(raw.name, states))
}

fn parse_state(name: &str, mut raw: RawState) -> Result<State, StateError> {
    let state_type = raw.state_type.take().ok_or(StateError::MissingStateType)?;
    if !is_known_state_type(&state_type) {
        return Err(StateError::UnknownStateType(state_type));
    }
    if state_type == "Terminal" {
        return Ok(State::new(name, StateKind::Terminal, None));
    }
    let transition = parse_transition(&raw)?;
    let kind = parse_kind(&state_type, raw)?;
    Ok(State::new(name, kind, Some(transition)))
}

/// Every `type` value a state record may carry.
const STATE_TYPES: [&str; 18] = [
    "Initial",
    "Terminal",
    "Simple",
    "Guard",
    "Delay",
    "Encounter",
    "ConditionOnset",
    "ConditionEnd",
    "MedicationOrder",
    "MedicationEnd",
    "CarePlanStart",
    "CarePlanEnd",
    "Procedure",
    "Observation",
    "Symptom",
    "SetAttribute",
    "Counter",
    "Death",
];

fn is_known_state_type(state_type: &str) -> bool {
    STATE_TYPES.contains(&state_type)
}

fn parse_kind(state_type: &str, mut raw: RawState) -> Result<StateKind, StateError> {
    let kind = match state_type {
        "Initial" => StateKind::Initial,
        "Simple" => StateKind::Simple,
        "Guard" => StateKind::Guard {
            allow: parse_condition(raw.allow.as_ref().ok_or(StateError::MissingField("allow"))?)?,
        },
        "Delay" => StateKind::Delay {
            duration: quantity(raw.exact, raw.range)?,
        },
        "Encounter" => StateKind::Encounter {
            wellness: raw.wellness,
            encounter_class: raw.encounter_class,
            reason: raw.reason,
            codes: raw.codes.unwrap_or_default(),
        },
        "ConditionOnset" => StateKind::ConditionOnset(record_start(raw)?),
        "MedicationOrder" => StateKind::MedicationOrder(record_start(raw)?),
        "CarePlanStart" => {
            let activities = raw.activities.take().unwrap_or_default();
            StateKind::CarePlanStart {
                start: record_start(raw)?,
                activities,
            }
        }
        "ConditionEnd" => StateKind::ConditionEnd(end_selector(
            raw.referenced_by_attribute,
            raw.condition_onset,
            raw.codes,
        )?),
        "MedicationEnd" => StateKind::MedicationEnd(end_selector(
            raw.referenced_by_attribute,
            raw.medication_order,
            raw.codes,
        )?),
        "CarePlanEnd" => StateKind::CarePlanEnd(end_selector(
            raw.referenced_by_attribute,
            raw.careplan,
            raw.codes,
        )?),
        "Procedure" => StateKind::Procedure {
            codes: raw.codes.ok_or(StateError::MissingField("codes"))?,
            target_encounter: raw.target_encounter,
            reason: raw.reason,
        },
        "Observation" => StateKind::Observation {
            codes: raw.codes.ok_or(StateError::MissingField("codes"))?,
            value: quantity(raw.exact, raw.range)?,
            unit: raw.unit.ok_or(StateError::MissingField("unit"))?,
            target_encounter: raw.target_encounter,
        },
        "Symptom" => StateKind::Symptom {
            symptom: raw.symptom.ok_or(StateError::MissingField("symptom"))?,
            cause: raw.cause.unwrap_or_default(),
            severity: quantity(raw.exact, raw.range)?,
        },
        "SetAttribute" => StateKind::SetAttribute {
            attribute: raw.attribute.ok_or(StateError::MissingField("attribute"))?,
            value: raw.value,
        },
        "Counter" => {
            let action = raw.action.ok_or(StateError::MissingField("action"))?;
            StateKind::Counter {
                attribute: raw.attribute.ok_or(StateError::MissingField("attribute"))?,
                action: CounterAction::parse(&action).ok_or_else(|| StateError::InvalidField {
                    field: "action",
                    reason: format!("expected 'increment' or 'decrement', found '{action}'"),
                })?,
            }
        }
        "Death" => StateKind::Death {
            delay: match (raw.exact, raw.range) {
                (None, None) => None,
                (exact, range) => Some(quantity(exact, range)?),
            },
        },
        other => return Err(StateError::UnknownStateType(other.to_owned())),
    };
    Ok(kind)
}

/// Exact wins when both are given.
fn quantity(exact: Option<Exact>, range: Option<Range>) -> Result<Quantity, StateError> {
    match (exact, range) {
        (Some(exact), _) => Ok(Quantity::Exact(exact)),
        (None, Some(range)) => Ok(Quantity::Range(range)),
        (None, None) => Err(StateError::MissingField("exact")),
    }
}

fn record_start(raw: RawState) -> Result<RecordStart, StateError> {
    Ok(RecordStart {
        codes: raw.codes.ok_or(StateError::MissingField("codes"))?,
        target_encounter: raw.target_encounter,
        assign_to_attribute: raw.assign_to_attribute,
        reason: raw.reason,
    })
}

fn end_selector(
    attribute: Option<String>,
    state: Option<String>,
    codes: Option<Vec<Code>>,
) -> Result<RecordSelector, StateError> {
    match (attribute, state, codes) {
        (Some(attribute), _, _) => Ok(RecordSelector::Attribute(attribute)),
        (None, Some(state), _) => Ok(RecordSelector::State(state)),
        (None, None, Some(codes)) => Ok(RecordSelector::Codes(codes)),
        (None, None, None) => Err(StateError::MissingField("referenced_by_attribute")),
    }
}

fn active_selector(attribute: Option<String>, codes: Option<Vec<Code>>) -> Result<RecordSelector, StateError> {
    match (attribute, codes) {
        (Some(attribute), _) => Ok(RecordSelector::Attribute(attribute)),
        (None, Some(codes)) => Ok(RecordSelector::Codes(codes)),
        (None, None) => Err(StateError::MissingField("codes")),
    }
}

/// Transition encodings are checked in a fixed order: direct,
/// distributed, conditional, complex. Empty lists count as absent.
fn parse_transition(raw: &RawState) -> Result<Transition, StateError> {
    if let Some(target) = raw.direct_transition.as_ref().filter(|t| !t.is_empty()) {
        return Ok(Transition::Direct(target.clone()));
    }
    if let Some(list) = raw.distributed_transition.as_ref().filter(|l| !l.is_empty()) {
        return Ok(Transition::Distributed(distributions(list)));
    }
    if let Some(list) = raw.conditional_transition.as_ref().filter(|l| !l.is_empty()) {
        let last = list.len().saturating_sub(1);
        let mut arms = Vec::with_capacity(list.len());
        for (index, entry) in list.iter().enumerate() {
            arms.push(Conditional {
                condition: arm_condition(entry.condition.as_ref(), index == last)?,
                transition: entry.transition.clone(),
            });
        }
        return Ok(Transition::Conditional(arms));
    }
    if let Some(list) = raw.complex_transition.as_ref().filter(|l| !l.is_empty()) {
        let last = list.len().saturating_sub(1);
        let mut arms = Vec::with_capacity(list.len());
        for (index, entry) in list.iter().enumerate() {
            arms.push(ComplexArm {
                condition: arm_condition(entry.condition.as_ref(), index == last)?,
                distributions: distributions(&entry.distributions),
            });
        }
        return Ok(Transition::Complex(arms));
    }
    Err(StateError::NoTransitionFound)
}

/// Only the final arm may leave its condition out.
fn arm_condition(raw: Option<&RawCondition>, is_last: bool) -> Result<Option<Condition>, StateError> {
    let untyped = raw.is_none_or(|c| c.condition_type.is_none());
    if untyped && is_last {
        return Ok(None);
    }
    match raw {
        Some(condition) => parse_condition(condition).map(Some),
        None => Err(StateError::MissingConditionType),
    }
}

fn distributions(raw: &[RawDistribution]) -> Vec<Distribution> {
    raw.iter()
        .map(|d| Distribution::new(d.distribution, d.transition.clone()))
        .collect()
}

fn parse_condition(raw: &RawCondition) -> Result<Condition, StateError> {
    let condition_type = raw
        .condition_type
        .as_deref()
        .ok_or(StateError::MissingConditionType)?;
    let condition = match condition_type {
        "Gender" => Condition::Gender {
            gender: required(raw.gender.as_deref(), "gender")?,
        },
        "Age" => Condition::Age {
            operator: required(raw.operator.as_deref(), "operator")?,
            quantity: raw.quantity.ok_or(StateError::MissingField("quantity"))?,
            unit: required(raw.unit.as_deref(), "unit")?,
        },
        "Date" => Condition::Date {
            operator: required(raw.operator.as_deref(), "operator")?,
            year: raw.year.ok_or(StateError::MissingField("year"))?,
        },
        "Socioeconomic Status" => Condition::SocioeconomicStatus {
            category: required(raw.category.as_deref(), "category")?,
        },
        "Race" => Condition::Race {
            race: required(raw.race.as_deref(), "race")?,
        },
        "Symptom" => Condition::Symptom {
            symptom: required(raw.symptom.as_deref(), "symptom")?,
            operator: required(raw.operator.as_deref(), "operator")?,
            value: numeric_value(raw.value.as_ref())?,
        },
        "Observation" => Condition::Observation {
            selector: active_selector(raw.referenced_by_attribute.clone(), raw.codes.clone())?,
            operator: required(raw.operator.as_deref(), "operator")?,
            value: numeric_value(raw.value.as_ref())?,
        },
        "Attribute" => Condition::Attribute {
            attribute: required(raw.attribute.as_deref(), "attribute")?,
            operator: required(raw.operator.as_deref(), "operator")?,
            value: raw.value.clone(),
        },
        "Active Condition" => Condition::ActiveCondition {
            selector: active_selector(raw.referenced_by_attribute.clone(), raw.codes.clone())?,
        },
        "Active Medication" => Condition::ActiveMedication {
            selector: active_selector(raw.referenced_by_attribute.clone(), raw.codes.clone())?,
        },
        "Active CarePlan" => Condition::ActiveCarePlan {
            selector: active_selector(raw.referenced_by_attribute.clone(), raw.codes.clone())?,
        },
        "PriorState" => Condition::PriorState {
            name: required(raw.name.as_deref(), "name")?,
        },
        "And" => Condition::And(parse_group(&raw.conditions)?),
        "Or" => Condition::Or(parse_group(&raw.conditions)?),
        "At Least" => Condition::AtLeast {
            minimum: raw.minimum.ok_or(StateError::MissingField("minimum"))?,
            conditions: parse_group(&raw.conditions)?,
        },
        "At Most" => Condition::AtMost {
            maximum: raw.maximum.ok_or(StateError::MissingField("maximum"))?,
            conditions: parse_group(&raw.conditions)?,
        },
        "Not" => {
            let inner = raw.condition.as_deref().ok_or(StateError::MissingField("condition"))?;
            Condition::Not(Box::new(parse_condition(inner)?))
        }
        "True" => Condition::True,
        "False" => Condition::False,
        other => return Err(StateError::UnknownConditionType(other.to_owned())),
    };
    Ok(condition)
}

fn parse_group(raw: &[RawCondition]) -> Result<Vec<Condition>, StateError> {
    raw.iter().map(parse_condition).collect()
}

fn required(field: Option<&str>, name: &'static str) -> Result<String, StateError> {
    field.map(str::to_owned).ok_or(StateError::MissingField(name))
}

fn numeric_value(value: Option<&AttributeValue>) -> Result<f64, StateError> {
    let value = value.ok_or(StateError::MissingField("value"))?;
    value.as_number().map_err(|err| StateError::InvalidField {
        field: "value",
        reason: err.to_string(),
    })
}
