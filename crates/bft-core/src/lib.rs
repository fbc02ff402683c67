//! # MU-MIMO Beam Training Selection Engine
//!
//! Selects transmit/receive antenna-sector combinations for multi-user
//! MIMO beamforming training. Given per-sector SNR feedback from a SISO
//! warm-up phase, the engine
//!
//! - ranks the best sectors of each peer antenna ([`ranker`]),
//! - expands them into joint multi-antenna combinations ([`expander`]),
//! - keeps the K best joint candidates for a MIMO sweep, and
//! - reduces the sweep to ordered, deduplicated results ([`reducer`]).
//!
//! A [`PhaseCoordinator`] sequences this per link; a [`TrainingSession`]
//! holds one coordinator per link and routes events.
//!
//! ## Protocol Flow
//!
//! ```text
//!  feedback ──► SnrFeedbackStore ──rank──► per-antenna lists ──expand──► joint combos
//!                                                                            │ K best
//!                                                                            ▼
//!  MimoReduction ◄──reduce── MeasurementSweep ◄── external sweep ◄── RankedCandidateSet
//! ```
//!
//! All qualities are linear power ratios. dB appears only in [`report`]
//! rows and log fields.
//!
//! ## Example
//!
//! ```rust
//! use bft_core::{
//!     JointCombination, JointEntry, LinkTopology, MeasurementSweep, PhaseState,
//!     StaticTopology, TrainingConfig, TrainingEvents, TrainingSession,
//! };
//!
//! let topology = StaticTopology::new().with_link(LinkTopology::new(1, 2, 1, 2));
//! let mut session = TrainingSession::from_topology(TrainingConfig::default(), &topology, &[1]).unwrap();
//!
//! session.start_phase(1).unwrap();
//! for (antenna, sector, snr) in [(1, 1, 3.0), (1, 2, 8.0), (2, 1, 5.0), (2, 2, 0.0)] {
//!     session.on_feedback(antenna, sector, snr, 1).unwrap();
//! }
//! assert_eq!(session.state(1).unwrap(), PhaseState::MimoCandidatesSelected);
//!
//! let rx = vec![JointCombination::new(vec![JointEntry::sector(1, 1)]).unwrap()];
//! let candidates = session.begin_sweep(1, rx).unwrap();
//! assert_eq!(candidates.len(), 2);
//!
//! let sweep = MeasurementSweep::new(vec![vec![2.0, 6.0], vec![4.0, 1.0]]);
//! session.on_sweep_measurements(1, sweep, 2, 1, 1).unwrap();
//! assert_eq!(session.result(1).unwrap().unwrap().reduced().best().unwrap().tx_id, 1);
//! ```

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod expander;
pub mod feedback;
pub mod logging;
pub mod ranker;
pub mod reducer;
pub mod report;
pub mod session;
pub mod stats;
pub mod types;
pub mod units;

pub use config::TrainingConfig;
pub use coordinator::{PhaseCoordinator, PhaseState};
pub use error::{BftError, BftResult};
pub use events::{EventLog, PhaseEvent, PhaseObserver, TrainingEvents};
pub use expander::JointCombinationExpander;
pub use feedback::SnrFeedbackStore;
pub use ranker::{CombinationRanker, SisoRanking};
pub use reducer::{sweep_index, MeasurementSweep, MimoReduction, MimoScoreReducer};
pub use session::{StaticTopology, Topology, TrainingSession};
pub use stats::SessionStats;
pub use types::{
    AntennaId, AntennaSectors, AwvId, CombinationScore, JointCombination, JointEntry, LinkId,
    LinkTopology, RankedCandidateSet, SectorId, SectorMeasurement, SnrRatio,
};
