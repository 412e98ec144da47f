//! Configuration, simulated time and the population driver.
//!
//! This crate turns a set of parsed modules and a demographic table into a
//! generated population.
//!
//! # Modules
//!
//! - [`clock`] -- [`SimClock`], fixed-step simulated time with checked
//!   advancement.
//! - [`config`] -- Configuration loading from `synthea-config.yaml` into
//!   strongly-typed structs, with environment overrides.
//! - [`runner`] -- [`run_population`], the sequential driver that
//!   simulates each patient from birth to the end of the window.
//!
//! [`SimClock`]: clock::SimClock
//! [`run_population`]: runner::run_population

pub mod clock;
pub mod config;
pub mod runner;
