//! Scenario runner
//!
//! Drives a [`TrainingSession`] through the full protocol on virtual time:
//!
//! ```text
//!   t0        StartPhase(link)
//!   t0 + n·Δf Feedback(link, antenna, sector)   one per TX sector
//!   t0 + m·Δp Poll(link)                        until feedback completes
//!   ...       (candidates selected) → sweep scheduled
//!   t + P·Δs  SweepDone(link)                   P = tested pairs
//!   + gap     StartPhase(link)                  next round
//! ```
//!
//! The runner plays the roles the core leaves outside: transport, sweep
//! driver and poll timer. Measurements come from a [`MeasurementSource`].

use serde::Serialize;
use tracing::{debug, info, warn};

use bft_core::report::{candidate_rows, mimo_rows, MimoTraceRow, SisoCandidateRow};
use bft_core::{
    AntennaId, BftError, JointCombination, JointEntry, LinkId, MeasurementSweep, MimoReduction,
    PhaseState, SectorId, SessionStats, TrainingEvents, TrainingSession,
};

use crate::error::SimResult;
use crate::scenario::config::ScenarioConfig;
use crate::scenario::source::MeasurementSource;
use crate::scheduler::{EventQueue, SimTime};

/// Simulator events
#[derive(Debug)]
enum SimEvent {
    StartPhase {
        link: LinkId,
        round: usize,
    },
    Feedback {
        link: LinkId,
        round: usize,
        antenna: AntennaId,
        sector: SectorId,
    },
    Poll {
        link: LinkId,
        round: usize,
    },
    SweepDone {
        link: LinkId,
        sweep: MeasurementSweep,
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
    },
}

/// Result of one phase on one link
#[derive(Debug, Clone, Serialize)]
pub struct PhaseOutcome {
    pub link: LinkId,
    pub round: usize,
    /// Time the phase ended
    pub finished_at_ns: SimTime,
    pub degraded_antennas: Vec<AntennaId>,
    pub candidates: Vec<SisoCandidateRow>,
    /// Full MIMO stream
    pub full: Vec<MimoTraceRow>,
    /// Reduced MIMO stream
    pub reduced: Vec<MimoTraceRow>,
    /// Fatal error that ended the phase, if any
    pub error: Option<String>,
    #[serde(skip)]
    pub reduction: Option<MimoReduction>,
}

impl PhaseOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.reduction.is_some()
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub seed: u64,
    pub outcomes: Vec<PhaseOutcome>,
    pub stats: SessionStats,
    pub events_processed: u64,
    pub end_time_ns: SimTime,
}

impl ScenarioReport {
    pub fn outcomes_for(&self, link: LinkId) -> impl Iterator<Item = &PhaseOutcome> {
        self.outcomes.iter().filter(move |o| o.link == link)
    }

    pub fn to_json_string(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// In-flight bookkeeping of one link
#[derive(Debug, Default)]
struct LinkProgress {
    round: usize,
    candidates: Vec<SisoCandidateRow>,
}

/// Discrete-event driver of a training session
pub struct ScenarioRunner<S> {
    config: ScenarioConfig,
    session: TrainingSession,
    source: S,
    queue: EventQueue<SimEvent>,
    progress: Vec<(LinkId, LinkProgress)>,
    outcomes: Vec<PhaseOutcome>,
}

impl<S: MeasurementSource> ScenarioRunner<S> {
    pub fn new(config: ScenarioConfig, source: S) -> SimResult<Self> {
        config.validate()?;
        let links = config.link_ids();
        let session = TrainingSession::from_topology(config.training.clone(), &config, &links)?;
        let progress = links.iter().map(|&l| (l, LinkProgress::default())).collect();
        Ok(Self {
            config,
            session,
            source,
            queue: EventQueue::new(),
            progress,
            outcomes: Vec::new(),
        })
    }

    pub fn session(&self) -> &TrainingSession {
        &self.session
    }

    /// Mutable access, e.g. to register observers before running.
    pub fn session_mut(&mut self) -> &mut TrainingSession {
        &mut self.session
    }

    /// Run every configured round on every link to completion.
    pub fn run(mut self) -> SimResult<ScenarioReport> {
        for (i, link) in self.config.link_ids().into_iter().enumerate() {
            let at = self.config.link_stagger_ns * i as SimTime;
            self.queue.schedule_at(at, SimEvent::StartPhase { link, round: 1 });
        }

        while let Some((now, event)) = self.queue.pop() {
            self.handle(now, event)?;
        }

        let stats = self.session.stats().clone();
        info!(
            seed = self.config.seed,
            phases = self.outcomes.len(),
            end_ns = self.queue.now(),
            stats = %stats.summary(),
            "scenario finished"
        );
        Ok(ScenarioReport {
            seed: self.config.seed,
            outcomes: self.outcomes,
            stats,
            events_processed: self.queue.stats().delivered,
            end_time_ns: self.queue.now(),
        })
    }

    fn handle(&mut self, now: SimTime, event: SimEvent) -> SimResult<()> {
        match event {
            SimEvent::StartPhase { link, round } => self.start(now, link, round),
            SimEvent::Feedback {
                link,
                round,
                antenna,
                sector,
            } => {
                if !self.collecting(link, round)? {
                    debug!(link, round, antenna, sector, "late feedback dropped");
                    return Ok(());
                }
                let Some(quality) = self.source.siso_quality(link, antenna, sector) else {
                    return Ok(());
                };
                let result = self.session.on_feedback(antenna, sector, quality, link);
                self.settle(now, link, result)
            }
            SimEvent::Poll { link, round } => {
                if !self.collecting(link, round)? {
                    return Ok(());
                }
                let result = self.session.poll_feedback(link);
                if self.session.state(link)? == PhaseState::SisoFeedbackCollecting {
                    self.queue
                        .schedule_in(self.config.poll_interval_ns, SimEvent::Poll { link, round });
                }
                self.settle(now, link, result)
            }
            SimEvent::SweepDone {
                link,
                sweep,
                n_tx,
                n_rx,
                rx_tested,
            } => {
                let result = self
                    .session
                    .on_sweep_measurements(link, sweep, n_tx, n_rx, rx_tested);
                self.settle(now, link, result)
            }
        }
    }

    fn start(&mut self, now: SimTime, link: LinkId, round: usize) -> SimResult<()> {
        self.session.start_phase(link)?;
        let progress = self.progress_mut(link);
        progress.round = round;
        progress.candidates.clear();

        let topology = *self.session.coordinator(link)?.topology();
        let mut at = now;
        for antenna in topology.tx_antenna_ids() {
            for sector in 1..=topology.sectors_per_antenna as SectorId {
                at += self.config.feedback_interval_ns;
                self.queue.schedule_at(
                    at,
                    SimEvent::Feedback {
                        link,
                        round,
                        antenna,
                        sector,
                    },
                );
            }
        }
        self.queue
            .schedule_in(self.config.poll_interval_ns, SimEvent::Poll { link, round });
        debug!(link, round, reports = topology.tx_antennas * topology.sectors_per_antenna, "phase scheduled");
        Ok(())
    }

    /// Whether `link` is collecting feedback for `round`; events of earlier rounds are stale.
    fn collecting(&mut self, link: LinkId, round: usize) -> SimResult<bool> {
        Ok(self.progress_mut(link).round == round
            && self.session.state(link)? == PhaseState::SisoFeedbackCollecting)
    }

    /// React to the state an event left the link in.
    fn settle(&mut self, now: SimTime, link: LinkId, result: Result<(), BftError>) -> SimResult<()> {
        if let Err(err) = result {
            if self.session.state(link)? == PhaseState::Idle {
                // fatal: the coordinator already reset itself
                self.finish(now, link, Some(err));
            } else {
                debug!(link, error = %err, "event rejected");
            }
            return Ok(());
        }

        match self.session.state(link)? {
            PhaseState::MimoCandidatesSelected => self.sweep(now, link),
            PhaseState::MimoPhaseComplete => {
                self.finish(now, link, None);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Act as sweep driver: measure every candidate against every RX configuration.
    fn sweep(&mut self, now: SimTime, link: LinkId) -> SimResult<()> {
        let topology = *self.session.coordinator(link)?.topology();
        let rx_tested = self.config.rx_combinations;
        let rx = rx_combinations(topology.rx_antennas, rx_tested)?;

        let candidates = match self.session.begin_sweep(link, rx.clone()) {
            Ok(c) => c,
            Err(err) => {
                self.finish(now, link, Some(err));
                return Ok(());
            }
        };
        self.progress_mut(link).candidates = candidate_rows(link, &candidates);

        let mut blocks = Vec::with_capacity(candidates.len() * rx_tested);
        for score in &candidates {
            for rx_combo in &rx {
                blocks.push(self.source.sweep_block(link, &score.tx_combination, rx_combo));
            }
        }
        let n_tx = candidates
            .best()
            .map_or(0, |s| s.tx_combination.len());
        let duration = self.config.sweep_pair_ns * blocks.len() as SimTime;

        self.queue.schedule_at(
            now + duration,
            SimEvent::SweepDone {
                link,
                sweep: MeasurementSweep::new(blocks),
                n_tx,
                n_rx: topology.rx_antennas,
                rx_tested,
            },
        );
        Ok(())
    }

    fn finish(&mut self, now: SimTime, link: LinkId, error: Option<BftError>) {
        let degraded = self
            .session
            .coordinator(link)
            .map(|c| c.degraded_antennas().to_vec())
            .unwrap_or_default();
        let reduction = match self.session.take_result(link) {
            Ok(r) => r,
            Err(_) => None,
        };
        let progress = self.progress_mut(link);
        let round = progress.round;
        let candidates = std::mem::take(&mut progress.candidates);

        if let Some(err) = &error {
            warn!(link, round, error = %err, "phase ended with error");
        }

        self.outcomes.push(PhaseOutcome {
            link,
            round,
            finished_at_ns: now,
            degraded_antennas: degraded,
            candidates,
            full: reduction
                .as_ref()
                .map(|r| mimo_rows(link, r.full()))
                .unwrap_or_default(),
            reduced: reduction
                .as_ref()
                .map(|r| mimo_rows(link, r.reduced()))
                .unwrap_or_default(),
            error: error.map(|e| e.to_string()),
            reduction,
        });

        if round < self.config.rounds {
            self.queue.schedule_at(
                now + self.config.round_gap_ns,
                SimEvent::StartPhase {
                    link,
                    round: round + 1,
                },
            );
        }
    }

    fn progress_mut(&mut self, link: LinkId) -> &mut LinkProgress {
        let idx = match self.progress.iter().position(|(l, _)| *l == link) {
            Some(idx) => idx,
            None => {
                self.progress.push((link, LinkProgress::default()));
                self.progress.len() - 1
            }
        };
        &mut self.progress[idx].1
    }
}

/// RX configurations tested in a sweep: every RX antenna on sector `s`, for `s` in `1..=count`.
pub fn rx_combinations(rx_antennas: usize, count: usize) -> SimResult<Vec<JointCombination>> {
    (1..=count as SectorId)
        .map(|sector| {
            let entries = (1..=rx_antennas as AntennaId)
                .map(|antenna| JointEntry::sector(antenna, sector))
                .collect();
            JointCombination::new(entries).map_err(Into::into)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::config::LinkScenario;
    use crate::scenario::source::{RandomSource, ScriptedSource};

    fn scripted_config() -> ScenarioConfig {
        ScenarioConfig {
            links: vec![LinkScenario::new(1, 1, 1, 2)],
            rx_combinations: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_rx_combinations() {
        let rx = rx_combinations(2, 3).unwrap();
        assert_eq!(rx.len(), 3);
        assert_eq!(
            rx[2].entries(),
            &[JointEntry::sector(1, 3), JointEntry::sector(2, 3)]
        );
    }

    #[test]
    fn test_scripted_single_link() {
        // candidates: sector 2 (tx_id 1), sector 1 (tx_id 2); 2 rx each
        let source = ScriptedSource::new()
            .with_siso(1, 1, 1, 2.0)
            .with_siso(1, 1, 2, 5.0)
            .with_blocks(1, vec![vec![1.0], vec![3.0], vec![4.0], vec![0.5]]);

        let report = ScenarioRunner::new(scripted_config(), source).unwrap().run().unwrap();
        assert_eq!(report.outcomes.len(), 1);

        let outcome = &report.outcomes[0];
        assert!(outcome.succeeded());
        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.candidates[0].tx[0].sector, 2);

        let full: Vec<_> = outcome.full.iter().map(|r| (r.tx_id, r.rx_id)).collect();
        assert_eq!(full, vec![(2, 1), (1, 2), (1, 1), (2, 2)]);
        let reduced: Vec<_> = outcome.reduced.iter().map(|r| (r.tx_id, r.rx_id)).collect();
        assert_eq!(reduced, vec![(2, 1), (1, 2)]);

        assert_eq!(report.stats.mimo_completed, 1);
        // two feedback reports, then a 4-pair sweep
        assert_eq!(outcome.finished_at_ns, 2 * 10_000 + 4 * 20_000);
    }

    #[test]
    fn test_lost_feedback_completes_by_polling() {
        // sector 2 never reported, three polls complete the phase
        let source = ScriptedSource::new().with_siso(1, 1, 1, 2.0).with_fallback(1.0);
        let report = ScenarioRunner::new(scripted_config(), source).unwrap().run().unwrap();

        let outcome = &report.outcomes[0];
        assert!(outcome.succeeded());
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(report.stats.polls, 3);
        assert_eq!(outcome.finished_at_ns, 3 * 1_000_000 + 2 * 20_000);
    }

    #[test]
    fn test_stale_round_events_dropped() {
        // polls finish each phase before its feedback train; round 1's last
        // report arrives after round 2 has started and must not count there
        let config = ScenarioConfig {
            links: vec![LinkScenario::new(1, 1, 1, 4)],
            rounds: 2,
            rx_combinations: 2,
            feedback_interval_ns: 1_000,
            poll_interval_ns: 1_200,
            sweep_pair_ns: 0,
            round_gap_ns: 100,
            ..Default::default()
        };
        let source = (1..=4)
            .fold(ScriptedSource::new(), |s, sector| s.with_siso(1, 1, sector, sector as f64))
            .with_fallback(1.0);
        let report = ScenarioRunner::new(config, source).unwrap().run().unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.succeeded()));
        assert_eq!(report.outcomes[0].finished_at_ns, 3_600);
        // round 2 starts at 3_700 and completes on its third poll
        assert_eq!(report.outcomes[1].finished_at_ns, 3_700 + 3 * 1_200);
        assert_eq!(report.stats.feedback_events, 6);
        assert_eq!(report.stats.polls, 6);
    }

    #[test]
    fn test_bad_sweep_block_fails_phase() {
        let source = ScriptedSource::new()
            .with_siso(1, 1, 1, 2.0)
            .with_siso(1, 1, 2, 5.0)
            .with_blocks(1, vec![vec![1.0, 1.0]]);
        let report = ScenarioRunner::new(scripted_config(), source).unwrap().run().unwrap();

        let outcome = &report.outcomes[0];
        assert!(!outcome.succeeded());
        assert!(outcome.error.as_deref().unwrap_or("").contains("stream values"));
        assert_eq!(report.stats.phases_failed, 1);
    }

    #[test]
    fn test_random_scenario_is_deterministic() {
        let config = ScenarioConfig {
            seed: 11,
            rounds: 2,
            links: vec![
                LinkScenario::new(1, 2, 2, 6),
                LinkScenario::new(2, 3, 1, 4).with_silent_antenna(3),
            ],
            ..Default::default()
        };
        let run = || {
            let source = RandomSource::from_config(&config).unwrap();
            ScenarioRunner::new(config.clone(), source).unwrap().run().unwrap()
        };
        let a = run();
        let b = run();

        assert_eq!(a.outcomes.len(), 4);
        assert_eq!(a.to_json_string().unwrap(), b.to_json_string().unwrap());

        for outcome in a.outcomes_for(2) {
            assert!(outcome.succeeded());
            assert_eq!(outcome.degraded_antennas, vec![3]);
            assert!(outcome.full.iter().all(|r| r.per_stream_snr_db.len() == 2));
        }
        for outcome in a.outcomes_for(1) {
            assert!(outcome.succeeded());
            assert_eq!(outcome.full.len(), 15);
            assert!(outcome.full.windows(2).all(|w| w[0].min_snr_db >= w[1].min_snr_db));
        }
        assert_eq!(a.stats.phases_started, 4);
        assert_eq!(a.stats.mimo_completed, 4);
    }
}
