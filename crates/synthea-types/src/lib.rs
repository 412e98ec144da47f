//! Shared value types for the Synthea patient generator.
//!
//! Types defined here are used by the module framework, the patient world
//! and the simulation driver alike.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for simulated entities
//! - [`enums`] -- Small enumerations (gender)
//! - [`structs`] -- Clinical code triples
//! - [`value`] -- Tagged attribute values and their typed accessors

pub mod enums;
pub mod ids;
pub mod structs;
pub mod value;

// Re-export all public types at crate root for convenience.
pub use enums::Gender;
pub use ids::PatientId;
pub use structs::Code;
pub use value::{AttributeValue, ValueError};
