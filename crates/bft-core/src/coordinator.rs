//! Per-link training phase coordinator
//!
//! Sequences one MU-MIMO beamforming training for a single link:
//!
//! ```text
//!   Idle ──start_phase──► SisoFeedbackCollecting
//!                              │ all feedback in, or poll budget spent
//!                              ▼
//!                         SisoFeedbackComplete ──rank/expand/select──► MimoCandidatesSelected
//!                                                                           │ begin_sweep
//!                                                                           ▼
//!   MimoPhaseComplete ◄──────────reduce──────────────────────────── MimoSweepInProgress
//!
//!   any state ──abort_phase──► Idle          fatal error ──► Idle
//! ```
//!
//! The coordinator never initiates radio activity. It records what the
//! transport reports, computes the selections and hands them to the external
//! driver and to its [`PhaseObserver`].
//!
//! ## Example
//!
//! ```rust
//! use bft_core::config::TrainingConfig;
//! use bft_core::coordinator::{PhaseCoordinator, PhaseState};
//! use bft_core::events::TrainingEvents;
//! use bft_core::reducer::MeasurementSweep;
//! use bft_core::types::{JointCombination, JointEntry, LinkTopology};
//!
//! let topology = LinkTopology::new(1, 1, 1, 2);
//! let mut coord = PhaseCoordinator::new(topology, TrainingConfig::default()).unwrap();
//!
//! coord.start_phase().unwrap();
//! coord.on_feedback(1, 1, 4.0, 1).unwrap();
//! coord.on_feedback(1, 2, 9.0, 1).unwrap();
//! assert_eq!(coord.state(), PhaseState::MimoCandidatesSelected);
//!
//! let candidates = coord
//!     .begin_sweep(vec![JointCombination::new(vec![JointEntry::sector(1, 1)]).unwrap()])
//!     .unwrap();
//! assert_eq!(candidates.len(), 2);
//!
//! let sweep = MeasurementSweep::new(vec![vec![3.0], vec![5.0]]);
//! coord.on_sweep_measurements(1, sweep, 1, 1, 1).unwrap();
//! assert_eq!(coord.state(), PhaseState::MimoPhaseComplete);
//! assert_eq!(coord.result().unwrap().reduced().best().unwrap().tx_id, 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::TrainingConfig;
use crate::error::{BftError, BftResult};
use crate::events::{PhaseObserver, TrainingEvents};
use crate::expander::JointCombinationExpander;
use crate::feedback::SnrFeedbackStore;
use crate::ranker::CombinationRanker;
use crate::reducer::{MeasurementSweep, MimoReduction, MimoScoreReducer};
use crate::types::{
    AntennaId, JointCombination, LinkId, LinkTopology, RankedCandidateSet, SectorId, SnrRatio,
};

/// Training phase of one link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseState {
    /// No training in progress
    Idle,
    /// Waiting for SISO feedback
    SisoFeedbackCollecting,
    /// Feedback complete, selection running
    SisoFeedbackComplete,
    /// Candidates ready for the MIMO sweep
    MimoCandidatesSelected,
    /// External driver is sweeping the candidates
    MimoSweepInProgress,
    /// Sweep reduced; terminal until the next `start_phase`
    MimoPhaseComplete,
}

impl PhaseState {
    pub fn name(&self) -> &'static str {
        match self {
            PhaseState::Idle => "Idle",
            PhaseState::SisoFeedbackCollecting => "SisoFeedbackCollecting",
            PhaseState::SisoFeedbackComplete => "SisoFeedbackComplete",
            PhaseState::MimoCandidatesSelected => "MimoCandidatesSelected",
            PhaseState::MimoSweepInProgress => "MimoSweepInProgress",
            PhaseState::MimoPhaseComplete => "MimoPhaseComplete",
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State machine driving the training of one link
pub struct PhaseCoordinator {
    topology: LinkTopology,
    config: TrainingConfig,
    expander: JointCombinationExpander,
    ranker: CombinationRanker,
    reducer: MimoScoreReducer,
    state: PhaseState,
    store: SnrFeedbackStore,
    poll_attempts: u32,
    degraded: Vec<AntennaId>,
    candidates: Option<RankedCandidateSet>,
    sweep_tx: Vec<JointCombination>,
    sweep_rx: Vec<JointCombination>,
    result: Option<MimoReduction>,
    observer: Option<Box<dyn PhaseObserver>>,
}

impl PhaseCoordinator {
    /// Create an idle coordinator for one link.
    pub fn new(topology: LinkTopology, config: TrainingConfig) -> BftResult<Self> {
        config.validate()?;
        if topology.tx_antennas == 0 || topology.rx_antennas == 0 {
            return Err(BftError::InvalidConfig(format!(
                "link {} needs antennas on both sides (tx={}, rx={})",
                topology.link, topology.tx_antennas, topology.rx_antennas
            )));
        }
        if topology.tx_antennas > AntennaId::MAX as usize {
            return Err(BftError::InvalidConfig(format!(
                "link {} has {} tx antennas, beyond the antenna id range",
                topology.link, topology.tx_antennas
            )));
        }
        if topology.sectors_per_antenna == 0 {
            return Err(BftError::InvalidConfig(format!(
                "link {} sweeps no sectors",
                topology.link
            )));
        }
        if topology.sectors_per_antenna > SectorId::MAX as usize {
            return Err(BftError::InvalidConfig(format!(
                "link {} sweeps {} sectors, beyond the sector id range",
                topology.link, topology.sectors_per_antenna
            )));
        }

        let expander = config.expander()?;
        let reducer = MimoScoreReducer::new(config.k_best_combinations);
        Ok(Self {
            topology,
            config,
            expander,
            ranker: CombinationRanker::new(),
            reducer,
            state: PhaseState::Idle,
            store: SnrFeedbackStore::new(),
            poll_attempts: 0,
            degraded: Vec::new(),
            candidates: None,
            sweep_tx: Vec::new(),
            sweep_rx: Vec::new(),
            result: None,
            observer: None,
        })
    }

    /// Register the observer for this link, replacing any previous one.
    pub fn with_observer(mut self, observer: Box<dyn PhaseObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn set_observer(&mut self, observer: Box<dyn PhaseObserver>) {
        self.observer = Some(observer);
    }

    pub fn link(&self) -> LinkId {
        self.topology.link
    }

    pub fn topology(&self) -> &LinkTopology {
        &self.topology
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn store(&self) -> &SnrFeedbackStore {
        &self.store
    }

    pub fn poll_attempts(&self) -> u32 {
        self.poll_attempts
    }

    /// Antennas left out of the current phase for lack of usable feedback
    pub fn degraded_antennas(&self) -> &[AntennaId] {
        &self.degraded
    }

    /// Candidates selected for the sweep, until `begin_sweep` takes them
    pub fn candidates(&self) -> Option<&RankedCandidateSet> {
        self.candidates.as_ref()
    }

    /// TX combinations under test in the current sweep
    pub fn sweep_tx(&self) -> &[JointCombination] {
        &self.sweep_tx
    }

    pub fn result(&self) -> Option<&MimoReduction> {
        self.result.as_ref()
    }

    pub fn take_result(&mut self) -> Option<MimoReduction> {
        self.result.take()
    }

    /// Antennas taking part in the MIMO sweep
    pub fn active_tx_antennas(&self) -> usize {
        self.topology.tx_antennas - self.degraded.len()
    }

    /// Begin a new training phase.
    ///
    /// Allowed from `Idle` and from the terminal `MimoPhaseComplete`.
    pub fn start_phase(&mut self) -> BftResult<()> {
        match self.state {
            PhaseState::Idle => {}
            PhaseState::MimoPhaseComplete => {
                self.reset();
                self.transition(PhaseState::Idle);
            }
            other => return Err(self.invalid(other, "start phase")),
        }
        self.reset();
        self.transition(PhaseState::SisoFeedbackCollecting);
        Ok(())
    }

    /// Cancel the phase from any state; nothing partial is exposed.
    pub fn abort_phase(&mut self) {
        let was = self.state;
        self.reset();
        if was != PhaseState::Idle {
            self.transition(PhaseState::Idle);
            info!(link = self.topology.link, from = %was, "training phase aborted");
            if let Some(observer) = self.observer.as_mut() {
                observer.on_phase_aborted(self.topology.link);
            }
        }
    }

    /// Hand the selected candidates to the sweep driver.
    ///
    /// `rx_combinations` are the receive configurations the driver will test
    /// against each candidate.
    pub fn begin_sweep(&mut self, rx_combinations: Vec<JointCombination>) -> BftResult<RankedCandidateSet> {
        if self.state != PhaseState::MimoCandidatesSelected {
            return Err(self.invalid(self.state, "begin sweep"));
        }
        if rx_combinations.is_empty() {
            return Err(self.fail(BftError::EmptyCandidateSet { side: "rx" }));
        }
        let candidates = match self.candidates.take() {
            Some(c) => c,
            None => return Err(self.fail(BftError::EmptyCandidateSet { side: "tx" })),
        };

        self.sweep_rx = rx_combinations;
        self.transition(PhaseState::MimoSweepInProgress);
        debug!(
            link = self.topology.link,
            tx = self.sweep_tx.len(),
            rx = self.sweep_rx.len(),
            "MIMO sweep started"
        );
        Ok(candidates)
    }

    fn check_link(&self, link: LinkId) -> BftResult<()> {
        if link != self.topology.link {
            return Err(BftError::LinkMismatch {
                expected: self.topology.link,
                actual: link,
            });
        }
        Ok(())
    }

    fn feedback_complete(&self) -> bool {
        self.topology
            .tx_antenna_ids()
            .all(|a| self.store.sector_count(a) >= self.topology.sectors_per_antenna)
    }

    fn complete_siso(&mut self) -> BftResult<()> {
        self.transition(PhaseState::SisoFeedbackComplete);
        match self.select_candidates() {
            Ok(set) => {
                self.sweep_tx = set.tx_combinations();
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_siso_complete(self.topology.link, &set);
                }
                info!(
                    link = self.topology.link,
                    candidates = set.len(),
                    degraded = self.degraded.len(),
                    "SISO phase complete"
                );
                self.candidates = Some(set);
                self.transition(PhaseState::MimoCandidatesSelected);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn select_candidates(&mut self) -> BftResult<RankedCandidateSet> {
        let ranking = self.ranker.rank(
            &self.store,
            self.config.k_per_antenna,
            self.topology.tx_antennas,
            self.topology.rx_antennas,
        )?;

        for &antenna in ranking.no_valid_sectors() {
            warn!(
                link = self.topology.link,
                antenna,
                "antenna has no usable feedback, excluded from MIMO phase"
            );
            self.degraded.push(antenna);
            if let Some(observer) = self.observer.as_mut() {
                observer.on_antenna_degraded(self.topology.link, antenna);
            }
        }

        let lists = ranking.ranked();
        let joint = self.expander.expand(lists, lists.len())?;
        self.ranker
            .select_k_best(&self.store, joint, self.config.k_best_combinations)
    }

    fn reduce_sweep(
        &mut self,
        sweep: &MeasurementSweep,
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
    ) -> BftResult<MimoReduction> {
        let active = self.active_tx_antennas();
        if n_tx != active {
            return Err(BftError::AntennaCountMismatch {
                side: "tx",
                expected: active,
                actual: n_tx,
            });
        }
        if n_rx != self.topology.rx_antennas {
            return Err(BftError::AntennaCountMismatch {
                side: "rx",
                expected: self.topology.rx_antennas,
                actual: n_rx,
            });
        }
        self.reducer.reduce(
            sweep,
            &self.sweep_tx,
            &self.sweep_rx,
            n_tx,
            n_rx,
            rx_tested,
            self.config.allow_different_rx_per_tx,
        )
    }

    /// Abort on a fatal error: one diagnostic, back to `Idle`.
    fn fail(&mut self, err: BftError) -> BftError {
        error!(
            link = self.topology.link,
            state = %self.state,
            error = %err,
            "training phase failed"
        );
        self.reset();
        self.transition(PhaseState::Idle);
        if let Some(observer) = self.observer.as_mut() {
            observer.on_phase_failed(self.topology.link, &err);
        }
        err
    }

    fn invalid(&self, state: PhaseState, event: &'static str) -> BftError {
        debug!(link = self.topology.link, state = %state, event, "event rejected");
        BftError::InvalidTransition {
            state: state.name(),
            event,
        }
    }

    fn transition(&mut self, to: PhaseState) {
        if self.state != to {
            info!(link = self.topology.link, from = %self.state, to = %to, "phase transition");
            self.state = to;
        }
    }

    fn reset(&mut self) {
        self.store.clear();
        self.poll_attempts = 0;
        self.degraded.clear();
        self.candidates = None;
        self.sweep_tx.clear();
        self.sweep_rx.clear();
        self.result = None;
    }
}

impl TrainingEvents for PhaseCoordinator {
    fn on_feedback(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
        quality: SnrRatio,
        source_link: LinkId,
    ) -> BftResult<()> {
        self.check_link(source_link)?;
        if self.state != PhaseState::SisoFeedbackCollecting {
            return Err(self.invalid(self.state, "record feedback"));
        }
        if antenna == 0 || antenna as usize > self.topology.tx_antennas {
            return Err(BftError::InvalidConfig(format!(
                "antenna {} outside link {} topology ({} tx antennas)",
                antenna, self.topology.link, self.topology.tx_antennas
            )));
        }

        self.store.record(antenna, sector, quality)?;
        if self.feedback_complete() {
            debug!(link = self.topology.link, measurements = self.store.len(), "all SISO feedback received");
            self.complete_siso()?;
        }
        Ok(())
    }

    fn on_sweep_measurements(
        &mut self,
        link: LinkId,
        sweep: MeasurementSweep,
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
    ) -> BftResult<()> {
        self.check_link(link)?;
        if self.state != PhaseState::MimoSweepInProgress {
            return Err(self.invalid(self.state, "deliver sweep"));
        }

        match self.reduce_sweep(&sweep, n_tx, n_rx, rx_tested) {
            Ok(reduction) => {
                if let Some(observer) = self.observer.as_mut() {
                    observer.on_mimo_complete(self.topology.link, &reduction);
                }
                info!(
                    link = self.topology.link,
                    full = reduction.full().len(),
                    reduced = reduction.reduced().len(),
                    "MIMO phase complete"
                );
                self.result = Some(reduction);
                self.transition(PhaseState::MimoPhaseComplete);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn poll_feedback(&mut self, link: LinkId) -> BftResult<()> {
        self.check_link(link)?;
        if self.state != PhaseState::SisoFeedbackCollecting {
            return Err(self.invalid(self.state, "poll feedback"));
        }

        self.poll_attempts += 1;
        debug!(
            link = self.topology.link,
            attempt = self.poll_attempts,
            max = self.config.max_poll_attempts,
            "feedback poll"
        );
        if self.poll_attempts >= self.config.max_poll_attempts {
            warn!(
                link = self.topology.link,
                attempts = self.poll_attempts,
                "feedback poll budget spent, completing SISO phase with what was received"
            );
            self.complete_siso()?;
        }
        Ok(())
    }
}
