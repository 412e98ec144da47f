//! End-to-end population runs over the bundled module library.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use synthea_core::config::SimulationConfig;
use synthea_core::runner::{run_population, simulate_patient};
use synthea_gmf::{Module, load_modules};
use synthea_world::Demographics;

fn library() -> Vec<Module> {
    let dir: PathBuf = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..").join("modules");
    load_modules(&dir).unwrap()
}

fn config(population: u32) -> SimulationConfig {
    let yaml = format!(
        "generation:\n  seed: 1234\n  population: {population}\n  years_of_history: 80\n  end_date: \"2020-01-01T00:00:00Z\"\n"
    );
    SimulationConfig::parse(&yaml).unwrap()
}

#[test]
fn library_loads_in_file_name_order() {
    let names: Vec<String> = library().iter().map(|m| m.name().to_owned()).collect();
    assert_eq!(names, vec!["Appendicitis", "Diabetes", "Wellness Encounters"]);
    for module in library() {
        assert!(module.dangling_targets().is_empty(), "{}", module.name());
    }
}

#[test]
fn population_runs_without_module_failures() {
    let demographics = Demographics::massachusetts().unwrap();
    let summary = run_population(&config(20), &demographics, &library()).unwrap();
    assert_eq!(summary.generated, 20);
    assert_eq!(summary.alive + summary.dead, 20);
    assert_eq!(summary.module_failures, 0);
}

#[test]
fn runs_are_reproducible() {
    let demographics = Demographics::massachusetts().unwrap();
    let modules = library();
    let first = run_population(&config(10), &demographics, &modules).unwrap();
    let second = run_population(&config(10), &demographics, &modules).unwrap();
    assert_eq!(first, second);
}

#[test]
fn adults_get_yearly_checkups() {
    let demographics = Demographics::massachusetts().unwrap();
    let modules = library();
    let cfg = config(1);
    let end = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    for index in 0..10 {
        let outcome = simulate_patient(&cfg, &demographics, &modules, end, index).unwrap();
        let person = &outcome.person;
        let lived_until = person.death_date().map_or(end, |d| d.min(end));
        let lived_years = lived_until.signed_duration_since(person.profile().birth_date).num_days() / 365;
        let checkups = person.health_record().encounters.iter().filter(|e| e.wellness).count();
        if lived_years >= 2 {
            assert!(checkups >= 1, "patient {index} lived {lived_years} years without a checkup");
        }
        for observation in &person.health_record().observations {
            assert!(observation.time >= person.profile().birth_date);
        }
    }
}
