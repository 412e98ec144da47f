//! Patients and the population they are drawn from.
//!
//! This crate supplies everything the module framework treats as an
//! external collaborator: demographic tables, the patient profile sampled
//! from them, the health record that clinical states write into, and the
//! [`Person`] entity that ties them together.
//!
//! # Modules
//!
//! - [`demographics`] -- Weighted population tables loaded from YAML, with
//!   built-in Massachusetts data.
//! - [`error`] -- Error types for loading tables and sampling patients.
//! - [`patient`] -- [`PatientProfile`] sampling and birth date placement.
//! - [`person`] -- [`Person`], the [`Entity`] implementation driven by
//!   modules.
//! - [`record`] -- [`HealthRecord`], the in-memory clinical history.
//!
//! [`Entity`]: synthea_gmf::Entity

pub mod demographics;
pub mod error;
pub mod patient;
pub mod person;
pub mod record;

pub use demographics::{BirthplaceChange, Demographics};
pub use error::DemographicsError;
pub use patient::{BIRTH_HEIGHT_CM, BIRTH_WEIGHT_KG, PatientProfile, pick_birth_date};
pub use person::{Person, StateVisit};
pub use record::{Encounter, Entry, HealthRecord, Observation, Procedure};
