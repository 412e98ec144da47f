//! Generic Module Framework (GMF) for the Synthea patient generator.
//!
//! Modules are JSON-encoded state machines describing how a disease or
//! care pathway unfolds. This crate parses them into an immutable typed
//! tree and walks simulated patients through that tree over simulated
//! time.
//!
//! # Modules
//!
//! - [`choice`] -- Weighted random selection shared with demographic sampling
//! - [`quantity`] -- Exact and ranged quantities, time and age units
//! - [`condition`] -- Boolean predicates over an entity and logical combinators
//! - [`transition`] -- Direct, conditional, distributed and complex transitions
//! - [`state`] -- The eighteen state variants and their processing rules
//! - [`module`] -- Parsed modules, per-entity contexts and the execution loop
//! - [`parser`] -- Module JSON decoding and structural validation
//! - [`loader`] -- Directory loading of module files
//! - [`entity`] -- The boundary to the simulated patient and its record
//! - [`error`] -- Parse, load and execution error types

pub mod choice;
pub mod condition;
pub mod entity;
pub mod error;
pub mod loader;
pub mod module;
pub mod parser;
pub mod quantity;
pub mod state;
pub mod transition;

pub use choice::{Choice, ChoiceError, clean_weights, weighted_choice};
pub use condition::{Condition, ConditionError};
pub use entity::{ClinicalEvent, Entity, RecordKind, RecordSelector, StubEntity};
pub use error::{EvalError, ExecutionError, LoadError, ParseError, StateError};
pub use loader::{load_module, load_modules};
pub use module::{Context, INITIAL, MAX_TRANSITIONS_PER_PROCESS, Module, ModuleGraph};
pub use parser::{parse_module, parse_module_str};
pub use quantity::{AgeUnit, Exact, Quantity, QuantityError, Range, TimeUnit};
pub use state::{CounterAction, DelayTimer, RecordStart, State, StateKind};
pub use transition::{ComplexArm, Conditional, Distribution, TERMINAL, Transition};
