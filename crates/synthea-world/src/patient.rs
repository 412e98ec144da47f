//! Demographic profile of a newly generated patient.

use chrono::{DateTime, Months, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use synthea_types::Gender;

use crate::demographics::{BirthplaceChange, Demographics};
use crate::error::DemographicsError;

/// Average length at birth, in centimetres.
pub const BIRTH_HEIGHT_CM: f64 = 51.0;

/// Average weight at birth, in kilograms.
pub const BIRTH_WEIGHT_KG: f64 = 3.5;

/// Fixed facts drawn once when a patient is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    /// Administrative gender.
    pub gender: Gender,
    /// Birth instant.
    pub birth_date: DateTime<Utc>,
    /// Race label.
    pub race: String,
    /// Ethnicity label, drawn from the race's table.
    pub ethnicity: String,
    /// Blood type, drawn from the race's table.
    pub blood_type: String,
    /// How far the patient now lives from their place of birth.
    pub birthplace_change: BirthplaceChange,
    /// Socioeconomic category (`"High"`, `"Middle"`, `"Low"`).
    pub socioeconomic_category: String,
    /// Height at birth.
    pub height_cm: f64,
    /// Weight at birth.
    pub weight_kg: f64,
}

impl PatientProfile {
    /// Draw a profile for a patient whose age at `end` is below `max_age`
    /// years.
    ///
    /// Race is drawn first; ethnicity and blood type are then drawn from
    /// that race's tables.
    ///
    /// # Errors
    ///
    /// Returns a [`DemographicsError`] if a table cannot be sampled or the
    /// birth date falls outside the representable range.
    pub fn sample<R: Rng + ?Sized>(
        demographics: &Demographics,
        end: DateTime<Utc>,
        max_age: u32,
        rng: &mut R,
    ) -> Result<Self, DemographicsError> {
        let target_age = rng.random_range(0..max_age.max(1));
        let race = demographics.pick_race(rng)?.to_owned();
        let ethnicity = demographics.pick_ethnicity(&race, rng)?.to_owned();
        let blood_type = demographics.pick_blood_type(&race, rng)?.to_owned();

        Ok(Self {
            gender: demographics.pick_gender(rng)?,
            birth_date: pick_birth_date(end, target_age, rng)?,
            ethnicity,
            blood_type,
            birthplace_change: demographics.pick_birthplace_change(rng)?,
            socioeconomic_category: demographics.pick_socioeconomic(rng)?.to_owned(),
            race,
            height_cm: BIRTH_HEIGHT_CM,
            weight_kg: BIRTH_WEIGHT_KG,
        })
    }
}

/// Pick a birth instant so the patient is exactly `age` whole years old
/// at `end`.
///
/// The window runs from one day after `end` minus `age + 1` years up to
/// `end` minus `age` years, sampled uniformly to the second.
///
/// # Errors
///
/// Returns [`DemographicsError::BirthDateOutOfRange`] if the window falls
/// outside the calendar chrono can represent.
pub fn pick_birth_date<R: Rng + ?Sized>(
    end: DateTime<Utc>,
    age: u32,
    rng: &mut R,
) -> Result<DateTime<Utc>, DemographicsError> {
    let out_of_range = || DemographicsError::BirthDateOutOfRange { age, end };

    let years_before = |years: u32| {
        years
            .checked_mul(12)
            .and_then(|months| end.checked_sub_months(Months::new(months)))
    };
    let latest = years_before(age).ok_or_else(out_of_range)?;
    let earliest = age
        .checked_add(1)
        .and_then(years_before)
        .and_then(|t| t.checked_add_signed(TimeDelta::days(1)))
        .ok_or_else(out_of_range)?;

    let span = latest.signed_duration_since(earliest).num_seconds();
    if span <= 0 {
        return Ok(earliest);
    }
    let offset = TimeDelta::try_seconds(rng.random_range(0..span)).ok_or_else(out_of_range)?;
    earliest.checked_add_signed(offset).ok_or_else(out_of_range)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use synthea_gmf::{AgeUnit, Entity, StubEntity};

    use super::*;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn birth_date_gives_requested_age() {
        let mut rng = SmallRng::seed_from_u64(3);
        for age in [0_u32, 1, 17, 45, 99] {
            for _ in 0..50 {
                let birth = pick_birth_date(end(), age, &mut rng).unwrap();
                let patient = StubEntity::new(birth, Gender::Female);
                assert_eq!(
                    patient.age_at(end(), AgeUnit::Years),
                    Some(i64::from(age)),
                    "born {birth} for age {age}"
                );
            }
        }
    }

    #[test]
    fn birth_date_window_bounds() {
        let mut rng = SmallRng::seed_from_u64(11);
        let earliest = Utc.with_ymd_and_hms(1989, 6, 16, 12, 0, 0).unwrap();
        let latest = Utc.with_ymd_and_hms(1990, 6, 15, 12, 0, 0).unwrap();
        for _ in 0..500 {
            let birth = pick_birth_date(end(), 30, &mut rng).unwrap();
            assert!(birth >= earliest && birth < latest, "{birth}");
        }
    }

    #[test]
    fn profile_draws_are_reproducible() {
        let demographics = Demographics::massachusetts().unwrap();
        let first = PatientProfile::sample(&demographics, end(), 100, &mut SmallRng::seed_from_u64(9)).unwrap();
        let second = PatientProfile::sample(&demographics, end(), 100, &mut SmallRng::seed_from_u64(9)).unwrap();
        assert_eq!(first, second);
        assert!(first.birth_date <= end());
        assert!((first.height_cm - BIRTH_HEIGHT_CM).abs() < f64::EPSILON);
    }

    #[test]
    fn profile_ethnicity_matches_race() {
        let demographics = Demographics::massachusetts().unwrap();
        let mut rng = SmallRng::seed_from_u64(21);
        for _ in 0..200 {
            let profile = PatientProfile::sample(&demographics, end(), 100, &mut rng).unwrap();
            let table = demographics.ethnicity.get(&profile.race).unwrap();
            assert!(table.iter().any(|c| c.item == profile.ethnicity));
        }
    }

    #[test]
    fn zero_max_age_means_newborns() {
        let demographics = Demographics::massachusetts().unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        let profile = PatientProfile::sample(&demographics, end(), 0, &mut rng).unwrap();
        let patient = StubEntity::new(profile.birth_date, profile.gender);
        assert_eq!(patient.age_at(end(), AgeUnit::Years), Some(0));
    }
}
