//! # Beam Training Simulator
//!
//! Deterministic discrete-event harness for `bft-core`. It feeds training
//! coordinators with scripted or seeded-random measurements, on virtual
//! time, through the same event interface a real transport would use.
//!
//! ## Example
//!
//! ```rust
//! use bft_sim::scenario::{LinkScenario, RandomSource, ScenarioConfig, ScenarioRunner};
//!
//! let config = ScenarioConfig {
//!     seed: 7,
//!     links: vec![LinkScenario::new(1, 2, 1, 4)],
//!     ..Default::default()
//! };
//! let source = RandomSource::from_config(&config).unwrap();
//! let report = ScenarioRunner::new(config, source).unwrap().run().unwrap();
//!
//! assert!(report.outcomes[0].succeeded());
//! ```

pub mod error;
pub mod scenario;
pub mod scheduler;

pub use error::{SimError, SimResult};
pub use scenario::{
    LinkScenario, MeasurementSource, PhaseOutcome, RandomSource, ScenarioConfig, ScenarioReport,
    ScenarioRunner, ScriptedSource,
};
pub use scheduler::{EventQueue, QueueStats, SimTime};
