//! Parsed modules and the per-entity execution loop.
//!
//! A [`Module`] is read-only after parsing and can be shared by reference
//! across any number of entities (and threads). Everything that changes
//! while an entity walks the graph lives in that entity's [`Context`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::Entity;
use crate::error::{EvalError, ExecutionError};
use crate::state::{DelayTimer, State};

/// Name every module's entry state must have.
pub const INITIAL: &str = "Initial";

/// Most transitions a single [`Module::process`] call may follow before it
/// gives up on the module ever blocking.
pub const MAX_TRANSITIONS_PER_PROCESS: usize = 10_000;

/// A named graph of states.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    states: BTreeMap<String, State>,
}

/// One entity's position in one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    module: String,
    current: String,
    history: Vec<String>,
    delay: Option<DelayTimer>,
}

/// Structural shape of a module: each state and the names it can reach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleGraph {
    /// Module name.
    pub name: String,
    /// Outgoing target names per state, in declaration order.
    pub states: BTreeMap<String, Vec<String>>,
}

impl Module {
    /// Build a module from its states. A later state with a duplicate name
    /// replaces the earlier one.
    pub fn new(name: impl Into<String>, states: impl IntoIterator<Item = State>) -> Self {
        Self {
            name: name.into(),
            states: states
                .into_iter()
                .map(|state| (state.name().to_owned(), state))
                .collect(),
        }
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    /// All states, ordered by name.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the module has no states at all.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Start a fresh context positioned on the Initial state.
    pub fn init(&self) -> Result<Context, ExecutionError> {
        Context::new(self)
    }

    /// Advance `context` through every non-blocking state at `time`.
    ///
    /// Returns once a state blocks. Each state left behind is appended to
    /// the context's history and reported to the entity.
    pub fn process<R: Rng + ?Sized>(
        &self,
        context: &mut Context,
        entity: &mut dyn Entity,
        time: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<(), ExecutionError> {
        if context.module != self.name {
            return Err(ExecutionError::ContextMismatch {
                expected: self.name.clone(),
                found: context.module.clone(),
            });
        }

        let mut followed = 0_usize;
        loop {
            let state = self.lookup(&context.current, &context.current)?;
            let advance = state
                .process(&mut context.delay, entity, time, rng)
                .map_err(|source| self.state_error(state, source))?;
            if !advance {
                return Ok(());
            }

            let target = state
                .next(&*entity, time, rng)
                .map_err(|source| self.state_error(state, source))?
                .ok_or_else(|| ExecutionError::NoTransition {
                    module: self.name.clone(),
                    state: state.name().to_owned(),
                })?;
            let next = self.lookup(state.name(), target)?;

            followed = followed.saturating_add(1);
            if followed > MAX_TRANSITIONS_PER_PROCESS {
                return Err(ExecutionError::TransitionLimitExceeded {
                    module: self.name.clone(),
                    limit: MAX_TRANSITIONS_PER_PROCESS,
                });
            }

            debug!(module = %self.name, from = state.name(), to = next.name(), "Transition");
            entity.record_state_visit(&self.name, state.name(), time);
            let left = std::mem::replace(&mut context.current, next.name().to_owned());
            context.history.push(left);
            context.delay = None;
        }
    }

    /// Whether `context` sits in a Terminal state of this module.
    pub fn is_terminated(&self, context: &Context) -> bool {
        self.state(&context.current).is_some_and(State::is_terminal)
    }

    /// The state/target structure of this module.
    pub fn topology(&self) -> ModuleGraph {
        ModuleGraph {
            name: self.name.clone(),
            states: self
                .states
                .values()
                .map(|state| {
                    let targets = state
                        .transition()
                        .map(|t| t.targets().into_iter().map(str::to_owned).collect())
                        .unwrap_or_default();
                    (state.name().to_owned(), targets)
                })
                .collect(),
        }
    }

    /// Transition targets that name no state, as `(state, target)` pairs.
    pub fn dangling_targets(&self) -> Vec<(&str, &str)> {
        let mut dangling = Vec::new();
        for state in self.states.values() {
            let Some(transition) = state.transition() else {
                continue;
            };
            for target in transition.targets() {
                if !self.states.contains_key(target) {
                    dangling.push((state.name(), target));
                }
            }
        }
        dangling
    }

    fn lookup(&self, from: &str, target: &str) -> Result<&State, ExecutionError> {
        self.states
            .get(target)
            .ok_or_else(|| ExecutionError::UnresolvedTransitionTarget {
                module: self.name.clone(),
                state: from.to_owned(),
                target: target.to_owned(),
            })
    }

    fn state_error(&self, state: &State, source: EvalError) -> ExecutionError {
        ExecutionError::State {
            module: self.name.clone(),
            state: state.name().to_owned(),
            source,
        }
    }
}

impl Context {
    /// A context for `module`, positioned on its Initial state with an
    /// empty history.
    pub fn new(module: &Module) -> Result<Self, ExecutionError> {
        if module.state(INITIAL).is_none() {
            return Err(ExecutionError::MissingInitialState(module.name.clone()));
        }
        Ok(Self {
            module: module.name.clone(),
            current: INITIAL.to_owned(),
            history: Vec::new(),
            delay: None,
        })
    }

    /// Name of the module this context runs.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Name of the state the entity is in.
    pub fn current_state(&self) -> &str {
        &self.current
    }

    /// States left so far, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Wait window of the current Delay state, if one is running.
    pub const fn delay(&self) -> Option<&DelayTimer> {
        self.delay.as_ref()
    }
}
