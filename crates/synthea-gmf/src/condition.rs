//! Boolean predicates over an entity at a point in simulated time.
//!
//! A [`Condition`] is a closed tree: leaves compare one fact about the
//! entity with a literal, combinators fold the results of their children.
//! Evaluation never mutates the entity. Operators, genders and age units
//! are kept as written and validated when the condition is tested, so a
//! typo surfaces the first time the branch is reached.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Utc};
use synthea_types::{AttributeValue, Gender, ValueError};

use crate::entity::{Entity, RecordKind, RecordSelector};
use crate::quantity::AgeUnit;

/// Errors raised while testing a condition.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConditionError {
    /// The comparison operator is not recognized.
    #[error("invalid operator '{0}'")]
    InvalidOperator(String),

    /// The age unit is not recognized.
    #[error("'{0}' is not a valid unit of age")]
    InvalidUnit(String),

    /// The gender literal is not `M` or `F`.
    #[error("invalid gender '{0}'")]
    InvalidGender(String),

    /// An age was asked for before the entity was born.
    #[error("entity is not yet born at {0}")]
    NotBorn(DateTime<Utc>),

    /// An attribute held a different kind of value than the literal.
    #[error("attribute '{attribute}': {source}")]
    Attribute {
        /// Attribute name.
        attribute: String,
        /// The underlying mismatch.
        source: ValueError,
    },
}

/// Relational operators accepted by numeric and attribute leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Comparison {
    fn parse(operator: &str) -> Result<Self, ConditionError> {
        match operator {
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            "<" => Ok(Self::Lt),
            ">" => Ok(Self::Gt),
            "<=" => Ok(Self::Le),
            ">=" => Ok(Self::Ge),
            other => Err(ConditionError::InvalidOperator(other.to_owned())),
        }
    }

    /// Whether `lhs <op> rhs` holds. Unordered operands (NaN) satisfy
    /// only `!=`.
    fn holds<T: PartialOrd + ?Sized>(self, lhs: &T, rhs: &T) -> bool {
        let ordering = lhs.partial_cmp(rhs);
        match self {
            Self::Eq => ordering == Some(Ordering::Equal),
            Self::Ne => ordering != Some(Ordering::Equal),
            Self::Lt => ordering == Some(Ordering::Less),
            Self::Gt => ordering == Some(Ordering::Greater),
            Self::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Self::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Attribute-only nil checks.
const IS_NIL: &str = "is nil";
const IS_NOT_NIL: &str = "is not nil";

/// A predicate node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Entity gender equals `gender` (`"M"` or `"F"`).
    Gender {
        /// Gender code.
        gender: String,
    },
    /// Entity age at the test time compared with `quantity` `unit`s.
    Age {
        /// Comparison operator.
        operator: String,
        /// Age threshold.
        quantity: f64,
        /// Age unit name.
        unit: String,
    },
    /// Calendar year of the test time compared with `year`.
    Date {
        /// Comparison operator.
        operator: String,
        /// Year threshold.
        year: i32,
    },
    /// Entity socioeconomic category equals `category`.
    SocioeconomicStatus {
        /// Category label.
        category: String,
    },
    /// Entity race equals `race`.
    Race {
        /// Race label.
        race: String,
    },
    /// Current severity of `symptom` compared with `value`. False when the
    /// symptom is absent.
    Symptom {
        /// Symptom name.
        symptom: String,
        /// Comparison operator.
        operator: String,
        /// Severity threshold.
        value: f64,
    },
    /// Latest value of an observation compared with `value`. False when
    /// no such observation exists.
    Observation {
        /// Which observation.
        selector: RecordSelector,
        /// Comparison operator.
        operator: String,
        /// Value threshold.
        value: f64,
    },
    /// Named attribute compared with a literal, or checked for presence
    /// with `is nil` / `is not nil`.
    Attribute {
        /// Attribute name.
        attribute: String,
        /// Comparison operator.
        operator: String,
        /// Literal; absent for the nil checks.
        value: Option<AttributeValue>,
    },
    /// A diagnosis matching `selector` is active.
    ActiveCondition {
        /// Which diagnosis.
        selector: RecordSelector,
    },
    /// A prescription matching `selector` is active.
    ActiveMedication {
        /// Which prescription.
        selector: RecordSelector,
    },
    /// A care plan matching `selector` is active.
    ActiveCarePlan {
        /// Which care plan.
        selector: RecordSelector,
    },
    /// The entity has already passed through a state named `name`.
    PriorState {
        /// State name.
        name: String,
    },
    /// All children hold.
    And(Vec<Condition>),
    /// Any child holds.
    Or(Vec<Condition>),
    /// At least `minimum` children hold.
    AtLeast {
        /// Required number of true children.
        minimum: usize,
        /// Children.
        conditions: Vec<Condition>,
    },
    /// At most `maximum` children hold.
    AtMost {
        /// Allowed number of true children.
        maximum: usize,
        /// Children.
        conditions: Vec<Condition>,
    },
    /// The child does not hold.
    Not(Box<Condition>),
    /// Always true.
    True,
    /// Always false.
    False,
}

impl Condition {
    /// Evaluate against `entity` at `time`.
    pub fn test(&self, entity: &dyn Entity, time: DateTime<Utc>) -> Result<bool, ConditionError> {
        match self {
            Self::Gender { gender } => {
                let wanted = Gender::from_code(gender)
                    .ok_or_else(|| ConditionError::InvalidGender(gender.clone()))?;
                Ok(entity.gender() == wanted)
            }
            Self::Age {
                operator,
                quantity,
                unit,
            } => {
                let op = Comparison::parse(operator)?;
                let unit = AgeUnit::parse(unit).ok_or_else(|| ConditionError::InvalidUnit(unit.clone()))?;
                let age = entity.age_at(time, unit).ok_or(ConditionError::NotBorn(time))?;
                #[allow(clippy::cast_precision_loss)]
                let age = age as f64;
                Ok(op.holds(&age, quantity))
            }
            Self::Date { operator, year } => {
                let op = Comparison::parse(operator)?;
                Ok(op.holds(&time.year(), year))
            }
            Self::SocioeconomicStatus { category } => Ok(entity.socioeconomic_category() == category),
            Self::Race { race } => Ok(entity.race() == race),
            Self::Symptom {
                symptom,
                operator,
                value,
            } => {
                let op = Comparison::parse(operator)?;
                Ok(entity
                    .symptom_severity(symptom)
                    .is_some_and(|severity| op.holds(&severity, value)))
            }
            Self::Observation {
                selector,
                operator,
                value,
            } => {
                let op = Comparison::parse(operator)?;
                Ok(entity
                    .observation_value(selector)
                    .is_some_and(|observed| op.holds(&observed, value)))
            }
            Self::Attribute {
                attribute,
                operator,
                value,
            } => test_attribute(entity, attribute, operator, value.as_ref()),
            Self::ActiveCondition { selector } => Ok(entity.is_active(RecordKind::Condition, selector)),
            Self::ActiveMedication { selector } => Ok(entity.is_active(RecordKind::Medication, selector)),
            Self::ActiveCarePlan { selector } => Ok(entity.is_active(RecordKind::CarePlan, selector)),
            Self::PriorState { name } => Ok(entity.has_visited(name)),
            Self::And(conditions) => {
                for condition in conditions {
                    if !condition.test(entity, time)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(conditions) => {
                for condition in conditions {
                    if condition.test(entity, time)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::AtLeast { minimum, conditions } => Ok(count_true(conditions, entity, time)? >= *minimum),
            Self::AtMost { maximum, conditions } => Ok(count_true(conditions, entity, time)? <= *maximum),
            Self::Not(condition) => Ok(!condition.test(entity, time)?),
            Self::True => Ok(true),
            Self::False => Ok(false),
        }
    }
}

fn count_true(conditions: &[Condition], entity: &dyn Entity, time: DateTime<Utc>) -> Result<usize, ConditionError> {
    let mut count = 0_usize;
    for condition in conditions {
        if condition.test(entity, time)? {
            count = count.saturating_add(1);
        }
    }
    Ok(count)
}

fn test_attribute(
    entity: &dyn Entity,
    attribute: &str,
    operator: &str,
    literal: Option<&AttributeValue>,
) -> Result<bool, ConditionError> {
    let current = entity.attribute(attribute);
    match operator {
        IS_NIL => return Ok(current.is_none()),
        IS_NOT_NIL => return Ok(current.is_some()),
        _ => {}
    }
    let op = Comparison::parse(operator)?;
    let (Some(current), Some(literal)) = (current, literal) else {
        return Ok(false);
    };
    let wrap = |source| ConditionError::Attribute {
        attribute: attribute.to_owned(),
        source,
    };
    let holds = match literal {
        AttributeValue::Text(text) => op.holds(current.as_text().map_err(wrap)?, text.as_str()),
        AttributeValue::Number(number) => op.holds(&current.as_number().map_err(wrap)?, number),
        AttributeValue::Boolean(flag) => op.holds(&current.as_bool().map_err(wrap)?, flag),
    };
    Ok(holds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use synthea_types::Code;

    use super::*;
    use crate::entity::StubEntity;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 1, 0, 0, 0).unwrap()
    }

    fn patient() -> StubEntity {
        StubEntity::new(Utc.with_ymd_and_hms(1980, 6, 1, 0, 0, 0).unwrap(), Gender::Female)
    }

    fn age(operator: &str, quantity: f64, unit: &str) -> Condition {
        Condition::Age {
            operator: operator.to_owned(),
            quantity,
            unit: unit.to_owned(),
        }
    }

    #[test]
    fn age_comparisons() {
        let p = patient();
        assert!(age(">=", 39.0, "years").test(&p, now()).unwrap());
        assert!(!age(">=", 40.0, "years").test(&p, now()).unwrap());
        assert!(age("==", 39.0, "years").test(&p, now()).unwrap());
        assert!(age("<", 500.0, "months").test(&p, now()).unwrap());
    }

    #[test]
    fn unknown_operator_and_unit_fail_at_test_time() {
        let p = patient();
        assert_eq!(
            age("=<", 1.0, "years").test(&p, now()),
            Err(ConditionError::InvalidOperator("=<".to_owned()))
        );
        assert_eq!(
            age("<", 1.0, "decades").test(&p, now()),
            Err(ConditionError::InvalidUnit("decades".to_owned()))
        );
    }

    #[test]
    fn age_before_birth_is_an_error() {
        let p = patient();
        let early = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(age(">", 1.0, "years").test(&p, early), Err(ConditionError::NotBorn(early)));
    }

    #[test]
    fn categorical_leaves_match_exactly() {
        let p = patient();
        let female = Condition::Gender { gender: "F".to_owned() };
        let male = Condition::Gender { gender: "M".to_owned() };
        assert!(female.test(&p, now()).unwrap());
        assert!(!male.test(&p, now()).unwrap());
        assert!(
            Condition::Gender { gender: "X".to_owned() }
                .test(&p, now())
                .is_err()
        );
        assert!(Condition::Race { race: "White".to_owned() }.test(&p, now()).unwrap());
        assert!(
            !Condition::SocioeconomicStatus { category: "High".to_owned() }
                .test(&p, now())
                .unwrap()
        );
    }

    #[test]
    fn date_compares_calendar_year() {
        let p = patient();
        let before = Condition::Date {
            operator: "<".to_owned(),
            year: 2021,
        };
        assert!(before.test(&p, now()).unwrap());
    }

    #[test]
    fn attribute_comparisons_and_nil_checks() {
        let mut p = patient();
        p.set_attribute("food", AttributeValue::from("Fried"));
        p.set_attribute("count", AttributeValue::from(3_i64));
        let attr = |name: &str, op: &str, value: Option<AttributeValue>| Condition::Attribute {
            attribute: name.to_owned(),
            operator: op.to_owned(),
            value,
        };
        assert!(attr("food", "==", Some("Fried".into())).test(&p, now()).unwrap());
        assert!(attr("count", ">", Some(2.0.into())).test(&p, now()).unwrap());
        assert!(attr("missing", "is nil", None).test(&p, now()).unwrap());
        assert!(attr("food", "is not nil", None).test(&p, now()).unwrap());
        assert!(!attr("missing", "==", Some(1.0.into())).test(&p, now()).unwrap());
        assert!(matches!(
            attr("food", "==", Some(true.into())).test(&p, now()),
            Err(ConditionError::Attribute { .. })
        ));
    }

    #[test]
    fn absent_symptom_and_observation_are_false() {
        let mut p = patient();
        let symptom = Condition::Symptom {
            symptom: "Cough".to_owned(),
            operator: ">".to_owned(),
            value: 10.0,
        };
        assert!(!symptom.test(&p, now()).unwrap());
        p.symptoms.insert("Cough".to_owned(), 50.0);
        assert!(symptom.test(&p, now()).unwrap());

        let code = Code::new("LOINC", "8302-2", "Body Height");
        let observation = Condition::Observation {
            selector: RecordSelector::Codes(vec![code]),
            operator: "<=".to_owned(),
            value: 170.0,
        };
        assert!(!observation.test(&p, now()).unwrap());
        p.observations.insert("8302-2".to_owned(), 165.0);
        assert!(observation.test(&p, now()).unwrap());
    }

    #[test]
    fn active_records_and_prior_state() {
        let mut p = patient();
        p.active.push((RecordKind::Medication, "Prescribe".to_owned(), Vec::new()));
        p.visited.insert("Diagnose".to_owned());
        let by_state = RecordSelector::State("Prescribe".to_owned());
        assert!(
            Condition::ActiveMedication { selector: by_state.clone() }
                .test(&p, now())
                .unwrap()
        );
        assert!(!Condition::ActiveCondition { selector: by_state }.test(&p, now()).unwrap());
        assert!(Condition::PriorState { name: "Diagnose".to_owned() }.test(&p, now()).unwrap());
    }

    #[test]
    fn combinators() {
        let p = patient();
        let mixed = vec![Condition::True, Condition::False, Condition::True];
        assert!(!Condition::And(mixed.clone()).test(&p, now()).unwrap());
        assert!(Condition::Or(mixed.clone()).test(&p, now()).unwrap());
        assert!(
            Condition::AtLeast {
                minimum: 2,
                conditions: mixed.clone()
            }
            .test(&p, now())
            .unwrap()
        );
        assert!(
            !Condition::AtMost {
                maximum: 1,
                conditions: mixed
            }
            .test(&p, now())
            .unwrap()
        );
        assert!(Condition::Not(Box::new(Condition::False)).test(&p, now()).unwrap());
        assert!(Condition::And(Vec::new()).test(&p, now()).unwrap());
        assert!(!Condition::Or(Vec::new()).test(&p, now()).unwrap());
    }

    #[test]
    fn and_short_circuits_before_a_failing_child() {
        let p = patient();
        let broken = age("??", 1.0, "years");
        assert!(!Condition::And(vec![Condition::False, broken.clone()]).test(&p, now()).unwrap());
        assert!(Condition::Or(vec![Condition::True, broken.clone()]).test(&p, now()).unwrap());
        assert!(Condition::And(vec![Condition::True, broken]).test(&p, now()).is_err());
    }
}
