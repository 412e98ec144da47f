//! Error types for the synthea-gmf crate.
//!
//! Parsing, loading and execution each have their own enum so callers can
//! tell a malformed module file apart from a module that misbehaves at run
//! time. Leaf failures (sampling, quantities, conditions) are defined next
//! to the code that raises them and collected here in [`EvalError`].

use std::path::PathBuf;

use synthea_types::ValueError;

use crate::choice::ChoiceError;
use crate::condition::ConditionError;
use crate::quantity::QuantityError;

/// Structural problems with a single state record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The record has no `type` field.
    #[error("No state type found")]
    MissingStateType,

    /// The `type` field names no known state.
    #[error("Unknown state type '{0}'")]
    UnknownStateType(String),

    /// A field has the wrong JSON shape (a string where a list belongs,
    /// a weight that is not a number, ...).
    #[error("malformed state record: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },

    /// A non-Terminal state declares no transition.
    #[error("No valid transition found")]
    NoTransitionFound,

    /// A condition record has no `condition_type`.
    #[error("No condition type found")]
    MissingConditionType,

    /// A condition record's `condition_type` names no known condition.
    #[error("Unknown condition type '{0}'")]
    UnknownConditionType(String),

    /// A field the state or condition needs is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but holds an unusable value.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised while turning module JSON into a [`crate::Module`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The bytes are not a well-formed module document.
    #[error("malformed module JSON: {source}")]
    Json {
        /// The underlying decoder error.
        #[from]
        source: serde_json::Error,
    },

    /// One state record is invalid.
    #[error("Invalid State '{state}': {source}")]
    InvalidState {
        /// Name of the offending state.
        state: String,
        /// What is wrong with it.
        source: StateError,
    },
}

/// Errors raised while loading module files from disk.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A file or directory could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// Path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A module file could not be parsed.
    #[error("failed to parse module {}: {source}", .path.display())]
    Parse {
        /// Path of the module file.
        path: PathBuf,
        /// The underlying parse error.
        source: ParseError,
    },
}

/// Failures while a state processes or a transition is followed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Weighted sampling failed.
    #[error("weighted choice failed: {source}")]
    Choice {
        /// The underlying sampler error.
        #[from]
        source: ChoiceError,
    },

    /// A quantity could not be resolved.
    #[error("quantity resolution failed: {0}")]
    Quantity(#[from] QuantityError),

    /// A condition could not be tested.
    #[error("condition evaluation failed: {0}")]
    Condition(#[from] ConditionError),

    /// An attribute held the wrong kind of value.
    #[error("attribute value error: {0}")]
    Value(#[from] ValueError),
}

/// Fatal errors for one entity's run of one module.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A state or its transition failed to evaluate.
    #[error("module '{module}', state '{state}': {source}")]
    State {
        /// Module name.
        module: String,
        /// State being processed.
        state: String,
        /// The underlying failure.
        source: EvalError,
    },

    /// A transition names a state the module does not define.
    #[error("module '{module}': state '{state}' transitions to unknown state '{target}'")]
    UnresolvedTransitionTarget {
        /// Module name.
        module: String,
        /// State holding the transition.
        state: String,
        /// The missing target.
        target: String,
    },

    /// The module has no state named `Initial`.
    #[error("no Initial state found in module '{0}'")]
    MissingInitialState(String),

    /// A non-blocking state has no outgoing transition.
    #[error("module '{module}': state '{state}' has no transition")]
    NoTransition {
        /// Module name.
        module: String,
        /// The stuck state.
        state: String,
    },

    /// The context was created for a different module.
    #[error("context belongs to module '{found}', not '{expected}'")]
    ContextMismatch {
        /// Module being processed.
        expected: String,
        /// Module the context was created for.
        found: String,
    },

    /// One processing call followed too many transitions without blocking.
    #[error("module '{module}' followed more than {limit} transitions without blocking")]
    TransitionLimitExceeded {
        /// Module name.
        module: String,
        /// The limit that was hit.
        limit: usize,
    },
}
