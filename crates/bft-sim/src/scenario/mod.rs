//! Scenario driver for beamforming training sessions
//!
//! Composes a [`ScenarioConfig`], a [`MeasurementSource`] and a
//! [`ScenarioRunner`] that plays transport, sweep driver and poll timer
//! around a `TrainingSession`.

pub mod config;
pub mod runner;
pub mod source;

pub use config::{LinkScenario, ScenarioConfig};
pub use runner::{rx_combinations, PhaseOutcome, ScenarioReport, ScenarioRunner};
pub use source::{MeasurementSource, RandomSource, ScriptedSource};
