//! Population tables used to sample new patients.
//!
//! A [`Demographics`] value is loaded once at startup and handed to every
//! patient generator by reference. The built-in tables describe
//! Massachusetts and are embedded from `data/demographics.yaml`; a
//! deployment can supply its own file with the same shape.
//!
//! Every table is a list of weighted choices. Ethnicity and blood type are
//! keyed by race, so each race in the `race` table must have an entry in
//! both. [`Demographics::parse`] checks this up front so sampling never
//! meets a missing table.

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use synthea_gmf::{Choice, clean_weights, weighted_choice};
use synthea_types::Gender;

use crate::error::DemographicsError;

const MASSACHUSETTS: &str = include_str!("../data/demographics.yaml");

/// How far a patient lives from their place of birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BirthplaceChange {
    /// Still lives in the city of birth.
    Same,
    /// Born elsewhere in the same state.
    City,
    /// Born in another state.
    State,
    /// Born abroad.
    Country,
}

/// Weighted population tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    /// Race shares.
    pub race: Vec<Choice<String>>,
    /// Ethnicity shares per race.
    pub ethnicity: BTreeMap<String, Vec<Choice<String>>>,
    /// Blood type shares per race.
    pub blood_type: BTreeMap<String, Vec<Choice<String>>>,
    /// Place-of-birth change categories.
    pub birthplace_change: Vec<Choice<BirthplaceChange>>,
    /// Gender shares.
    #[serde(default = "default_gender")]
    pub gender: Vec<Choice<Gender>>,
    /// Socioeconomic category shares.
    #[serde(default = "default_socioeconomic")]
    pub socioeconomic: Vec<Choice<String>>,
}

impl Demographics {
    /// The built-in Massachusetts tables.
    ///
    /// # Errors
    ///
    /// Only fails if the embedded file is malformed.
    pub fn massachusetts() -> Result<Self, DemographicsError> {
        Self::parse(MASSACHUSETTS)
    }

    /// Load tables from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Io`] if the file cannot be read, or any
    /// error [`Demographics::parse`] returns.
    pub fn from_file(path: &Path) -> Result<Self, DemographicsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| DemographicsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse and validate tables from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Yaml`] for malformed YAML,
    /// [`DemographicsError::MissingTable`] when a race lacks an ethnicity
    /// or blood type table, and [`DemographicsError::InvalidWeights`] when
    /// a table is empty or holds a non-positive weight.
    pub fn parse(yaml: &str) -> Result<Self, DemographicsError> {
        let demographics: Self = serde_yml::from_str(yaml)?;
        demographics.validate()?;
        Ok(demographics)
    }

    fn validate(&self) -> Result<(), DemographicsError> {
        check("race", &self.race)?;
        check("birthplace_change", &self.birthplace_change)?;
        check("gender", &self.gender)?;
        check("socioeconomic", &self.socioeconomic)?;
        for choice in &self.race {
            let race = &choice.item;
            for (table, tables) in [("ethnicity", &self.ethnicity), ("blood_type", &self.blood_type)] {
                let choices = tables.get(race).ok_or_else(|| DemographicsError::MissingTable {
                    table,
                    race: race.clone(),
                })?;
                check(&format!("{table}.{race}"), choices)?;
            }
        }
        Ok(())
    }

    /// Draw a race.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Choice`] if the table cannot be sampled.
    pub fn pick_race<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&str, DemographicsError> {
        Ok(&weighted_choice(&self.race, rng)?.item)
    }

    /// Draw an ethnicity for `race`.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::MissingTable`] for a race with no table.
    pub fn pick_ethnicity<R: Rng + ?Sized>(&self, race: &str, rng: &mut R) -> Result<&str, DemographicsError> {
        pick_for_race(&self.ethnicity, "ethnicity", race, rng)
    }

    /// Draw a blood type for `race`.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::MissingTable`] for a race with no table.
    pub fn pick_blood_type<R: Rng + ?Sized>(&self, race: &str, rng: &mut R) -> Result<&str, DemographicsError> {
        pick_for_race(&self.blood_type, "blood_type", race, rng)
    }

    /// Draw a place-of-birth change category.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Choice`] if the table cannot be sampled.
    pub fn pick_birthplace_change<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<BirthplaceChange, DemographicsError> {
        Ok(weighted_choice(&self.birthplace_change, rng)?.item)
    }

    /// Draw a gender.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Choice`] if the table cannot be sampled.
    pub fn pick_gender<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Gender, DemographicsError> {
        Ok(weighted_choice(&self.gender, rng)?.item)
    }

    /// Draw a socioeconomic category.
    ///
    /// # Errors
    ///
    /// Returns [`DemographicsError::Choice`] if the table cannot be sampled.
    pub fn pick_socioeconomic<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&str, DemographicsError> {
        Ok(&weighted_choice(&self.socioeconomic, rng)?.item)
    }
}

fn pick_for_race<'a, R: Rng + ?Sized>(
    tables: &'a BTreeMap<String, Vec<Choice<String>>>,
    table: &'static str,
    race: &str,
    rng: &mut R,
) -> Result<&'a str, DemographicsError> {
    let choices = tables.get(race).ok_or_else(|| DemographicsError::MissingTable {
        table,
        race: race.to_owned(),
    })?;
    Ok(&weighted_choice(choices, rng)?.item)
}

fn check<T>(table: &str, choices: &[Choice<T>]) -> Result<(), DemographicsError> {
    let weights: Vec<f64> = choices.iter().map(|c| c.weight).collect();
    clean_weights(&weights).map_err(|source| DemographicsError::InvalidWeights {
        table: table.to_owned(),
        source,
    })?;
    Ok(())
}

fn default_gender() -> Vec<Choice<Gender>> {
    vec![Choice::new(0.5, Gender::Male), Choice::new(0.5, Gender::Female)]
}

fn default_socioeconomic() -> Vec<Choice<String>> {
    vec![
        Choice::new(0.25, "High".to_owned()),
        Choice::new(0.5, "Middle".to_owned()),
        Choice::new(0.25, "Low".to_owned()),
    ]
}
