//! Sequential population driver.
//!
//! [`run_population`] generates patients one after another. Each patient
//! gets its own RNG seeded from the configured base seed plus the patient
//! index, so a run is reproducible and any single patient can be replayed
//! on its own with [`simulate_patient`].
//!
//! A patient is simulated from birth to the end of the window in fixed
//! steps. At every step each still-running module context is processed.
//! A module that fails at run time is dropped for that patient only; the
//! patient keeps running every other module. A recorded death stops the
//! patient at the first step on or after the time of death.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use synthea_gmf::{Context, ExecutionError, Module};
use synthea_world::{Demographics, DemographicsError, Person};
use tracing::{debug, info, warn};

use crate::clock::{ClockError, SimClock};
use crate::config::SimulationConfig;

/// Errors that abort a population run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The simulated clock could not be built or advanced.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// A patient could not be sampled.
    #[error("demographics error: {source}")]
    Demographics {
        /// The underlying sampling error.
        #[from]
        source: DemographicsError,
    },

    /// A module cannot be started at all.
    #[error("module error: {source}")]
    Module {
        /// The underlying execution error.
        #[from]
        source: ExecutionError,
    },
}

/// Totals for a finished population run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulationSummary {
    /// Patients generated.
    pub generated: u32,
    /// Patients alive at the end of the window.
    pub alive: u32,
    /// Patients who died within the window.
    pub dead: u32,
    /// Module runs dropped after a runtime error, across all patients.
    pub module_failures: u32,
}

/// One simulated patient and how their run went.
#[derive(Debug, Clone)]
pub struct PatientOutcome {
    /// The patient with their full record.
    pub person: Person,
    /// Whether the patient is alive at the end of the window.
    pub alive: bool,
    /// Module runs dropped after a runtime error.
    pub module_failures: u32,
    /// Clock steps simulated.
    pub steps: u64,
}

/// Generate and simulate `config.generation.population` patients.
///
/// # Errors
///
/// Returns [`RunnerError::Module`] up front if any module has no Initial
/// state, and [`RunnerError::Clock`] or [`RunnerError::Demographics`] if a
/// patient cannot be set up.
pub fn run_population(
    config: &SimulationConfig,
    demographics: &Demographics,
    modules: &[Module],
) -> Result<PopulationSummary, RunnerError> {
    for module in modules {
        module.init()?;
    }

    let end = config.generation.end_date.unwrap_or_else(Utc::now);
    info!(
        population = config.generation.population,
        seed = config.generation.seed,
        modules = modules.len(),
        end = %end,
        "Population run starting"
    );

    let mut summary = PopulationSummary::default();
    for index in 0..config.generation.population {
        let outcome = simulate_patient(config, demographics, modules, end, index)?;
        summary.generated = summary.generated.saturating_add(1);
        summary.module_failures = summary.module_failures.saturating_add(outcome.module_failures);
        if outcome.alive {
            summary.alive = summary.alive.saturating_add(1);
        } else {
            summary.dead = summary.dead.saturating_add(1);
            info!(
                patient = %outcome.person.id(),
                index,
                death = ?outcome.person.death_date(),
                "Patient died"
            );
        }
    }

    info!(
        generated = summary.generated,
        alive = summary.alive,
        dead = summary.dead,
        module_failures = summary.module_failures,
        "Population run complete"
    );
    Ok(summary)
}

/// Generate patient `index` and run every module over their lifetime up
/// to `end`.
///
/// # Errors
///
/// Returns a [`RunnerError`] if the patient cannot be sampled, a module
/// has no Initial state, or the clock overflows.
pub fn simulate_patient(
    config: &SimulationConfig,
    demographics: &Demographics,
    modules: &[Module],
    end: DateTime<Utc>,
    index: u32,
) -> Result<PatientOutcome, RunnerError> {
    let generation = &config.generation;
    let mut rng = SmallRng::seed_from_u64(generation.seed.wrapping_add(u64::from(index)));
    let mut person = Person::generate(demographics, end, generation.years_of_history, &mut rng)?;

    let mut running = modules
        .iter()
        .map(|module| Ok((module, module.init()?)))
        .collect::<Result<Vec<(&Module, Context)>, ExecutionError>>()?;

    let mut clock = SimClock::with_step_days(person.profile().birth_date, end, generation.time_step_days)?;
    let mut module_failures = 0_u32;

    while !clock.is_finished() && !running.is_empty() {
        let time = clock.now();
        if !person.is_alive(time) {
            break;
        }
        running.retain_mut(|(module, context)| {
            // A death recorded earlier in this step ends the step for the
            // remaining modules.
            if !person.is_alive(time) {
                return true;
            }
            match module.process(context, &mut person, time, &mut rng) {
                Ok(()) => !module.is_terminated(context),
                Err(error) => {
                    warn!(
                        patient = %person.id(),
                        module = module.name(),
                        state = context.current_state(),
                        error = %error,
                        "Module failed, dropping it for this patient"
                    );
                    module_failures = module_failures.saturating_add(1);
                    false
                }
            }
        });
        clock.advance()?;
    }

    debug!(
        patient = %person.id(),
        steps = clock.steps(),
        unfinished_modules = running.len(),
        "Patient simulated"
    );
    Ok(PatientOutcome {
        alive: person.is_alive(end),
        steps: clock.steps(),
        person,
        module_failures,
    })
}
