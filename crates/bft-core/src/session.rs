//! Multi-link training session
//!
//! A [`TrainingSession`] owns one [`PhaseCoordinator`] per link and routes
//! every inbound event by link id. Coordinators never share stores, so
//! training on one link cannot disturb another.
//!
//! ```text
//!   on_feedback(.., source_link=7) ──► coordinators[7]
//!   poll_feedback(3)               ──► coordinators[3]
//!   unknown link                   ──► UnknownLink
//! ```
//!
//! Link parameters come from a [`Topology`] implementation supplied by the
//! caller; the session never builds topology itself.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::coordinator::{PhaseCoordinator, PhaseState};
use crate::error::{BftError, BftResult};
use crate::events::{PhaseObserver, TrainingEvents};
use crate::reducer::{MeasurementSweep, MimoReduction};
use crate::stats::SessionStats;
use crate::types::{
    AntennaId, JointCombination, LinkId, LinkTopology, RankedCandidateSet, SectorId, SnrRatio,
};

/// Source of per-link antenna topology
pub trait Topology {
    fn link_topology(&self, link: LinkId) -> Option<LinkTopology>;
}

/// Fixed topology backed by a map
#[derive(Debug, Clone, Default)]
pub struct StaticTopology {
    links: HashMap<LinkId, LinkTopology>,
}

impl StaticTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_link(mut self, topology: LinkTopology) -> Self {
        self.insert(topology);
        self
    }

    pub fn insert(&mut self, topology: LinkTopology) {
        self.links.insert(topology.link, topology);
    }

    /// Link ids in ascending order
    pub fn links(&self) -> Vec<LinkId> {
        let mut ids: Vec<_> = self.links.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Topology for StaticTopology {
    fn link_topology(&self, link: LinkId) -> Option<LinkTopology> {
        self.links.get(&link).cloned()
    }
}

/// Per-link coordinators with shared configuration
pub struct TrainingSession {
    config: TrainingConfig,
    coordinators: HashMap<LinkId, PhaseCoordinator>,
    stats: SessionStats,
}

impl TrainingSession {
    /// Empty session; links are added with [`add_link`](Self::add_link).
    pub fn new(config: TrainingConfig) -> BftResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            coordinators: HashMap::new(),
            stats: SessionStats::new(),
        })
    }

    /// Session with one coordinator for each of `links`.
    pub fn from_topology<T: Topology + ?Sized>(
        config: TrainingConfig,
        topology: &T,
        links: &[LinkId],
    ) -> BftResult<Self> {
        let mut session = Self::new(config)?;
        for &link in links {
            let link_topology = topology
                .link_topology(link)
                .ok_or(BftError::UnknownLink(link))?;
            session.add_link(link_topology)?;
        }
        Ok(session)
    }

    /// Add a coordinator for a new link, replacing any previous one.
    pub fn add_link(&mut self, topology: LinkTopology) -> BftResult<()> {
        let link = topology.link;
        let coordinator = PhaseCoordinator::new(topology, self.config.clone())?;
        if self.coordinators.insert(link, coordinator).is_some() {
            debug!(link, "replaced coordinator");
        }
        Ok(())
    }

    /// Register an observer on one link.
    pub fn set_observer(&mut self, link: LinkId, observer: Box<dyn PhaseObserver>) -> BftResult<()> {
        self.coordinator_mut(link)?.set_observer(observer);
        Ok(())
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn links(&self) -> Vec<LinkId> {
        let mut ids: Vec<_> = self.coordinators.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn coordinator(&self, link: LinkId) -> BftResult<&PhaseCoordinator> {
        self.coordinators.get(&link).ok_or(BftError::UnknownLink(link))
    }

    fn coordinator_mut(&mut self, link: LinkId) -> BftResult<&mut PhaseCoordinator> {
        self.coordinators
            .get_mut(&link)
            .ok_or(BftError::UnknownLink(link))
    }

    pub fn state(&self, link: LinkId) -> BftResult<PhaseState> {
        Ok(self.coordinator(link)?.state())
    }

    pub fn result(&self, link: LinkId) -> BftResult<Option<&MimoReduction>> {
        Ok(self.coordinator(link)?.result())
    }

    pub fn take_result(&mut self, link: LinkId) -> BftResult<Option<MimoReduction>> {
        Ok(self.coordinator_mut(link)?.take_result())
    }

    pub fn start_phase(&mut self, link: LinkId) -> BftResult<()> {
        self.coordinator_mut(link)?.start_phase()?;
        self.stats.phases_started += 1;
        Ok(())
    }

    pub fn abort_phase(&mut self, link: LinkId) -> BftResult<()> {
        let coordinator = self.coordinator_mut(link)?;
        let was_active = coordinator.state() != PhaseState::Idle;
        coordinator.abort_phase();
        if was_active {
            self.stats.phases_aborted += 1;
        }
        Ok(())
    }

    /// Abort every link that is mid-phase.
    pub fn abort_all(&mut self) {
        for link in self.links() {
            // links come from the map itself
            let _ = self.abort_phase(link);
        }
        info!(stats = %self.stats.summary(), "all links aborted");
    }

    pub fn begin_sweep(
        &mut self,
        link: LinkId,
        rx_combinations: Vec<JointCombination>,
    ) -> BftResult<RankedCandidateSet> {
        let (before, result) = {
            let coordinator = self.coordinator_mut(link)?;
            let before = coordinator.state();
            (before, coordinator.begin_sweep(rx_combinations))
        };
        self.account(link, before, result.as_ref().err())?;
        result
    }

    /// Update counters from the state change an event caused.
    fn account(&mut self, link: LinkId, before: PhaseState, err: Option<&BftError>) -> BftResult<()> {
        let coordinator = self.coordinator(link)?;
        let after = coordinator.state();
        let degraded = coordinator.degraded_antennas().len() as u64;

        if before == PhaseState::SisoFeedbackCollecting && after == PhaseState::MimoCandidatesSelected {
            self.stats.siso_completed += 1;
            self.stats.degraded_antennas += degraded;
        }
        if before == PhaseState::MimoSweepInProgress && after == PhaseState::MimoPhaseComplete {
            self.stats.mimo_completed += 1;
        }
        if err.is_some() && before != PhaseState::Idle && after == PhaseState::Idle {
            self.stats.phases_failed += 1;
        }
        Ok(())
    }
}

impl TrainingEvents for TrainingSession {
    fn on_feedback(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
        quality: SnrRatio,
        source_link: LinkId,
    ) -> BftResult<()> {
        let (before, result) = {
            let coordinator = self.coordinator_mut(source_link)?;
            let before = coordinator.state();
            (before, coordinator.on_feedback(antenna, sector, quality, source_link))
        };
        match &result {
            Ok(()) => self.stats.feedback_events += 1,
            Err(_) => self.stats.feedback_rejected += 1,
        }
        self.account(source_link, before, result.as_ref().err())?;
        result
    }

    fn on_sweep_measurements(
        &mut self,
        link: LinkId,
        sweep: MeasurementSweep,
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
    ) -> BftResult<()> {
        let (before, result) = {
            let coordinator = self.coordinator_mut(link)?;
            let before = coordinator.state();
            (before, coordinator.on_sweep_measurements(link, sweep, n_tx, n_rx, rx_tested))
        };
        self.account(link, before, result.as_ref().err())?;
        result
    }

    fn poll_feedback(&mut self, link: LinkId) -> BftResult<()> {
        let (before, result) = {
            let coordinator = self.coordinator_mut(link)?;
            let before = coordinator.state();
            (before, coordinator.poll_feedback(link))
        };
        if result.is_ok() || before == PhaseState::SisoFeedbackCollecting {
            self.stats.polls += 1;
        }
        self.account(link, before, result.as_ref().err())?;
        result
    }
}
