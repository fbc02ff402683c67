//! Scenario configuration
//!
//! Defines the links to train, the protocol timing and the SNR statistics
//! of the seeded random measurement source.

use serde::{Deserialize, Serialize};

use bft_core::{AntennaId, LinkId, LinkTopology, Topology, TrainingConfig};

use crate::error::{SimError, SimResult};
use crate::scheduler::SimTime;

/// One link of the scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkScenario {
    pub link: LinkId,
    pub tx_antennas: usize,
    pub rx_antennas: usize,
    pub sectors_per_antenna: usize,
    /// TX antennas whose feedback never arrives
    #[serde(default)]
    pub silent_antennas: Vec<AntennaId>,
}

impl LinkScenario {
    pub fn new(link: LinkId, tx_antennas: usize, rx_antennas: usize, sectors_per_antenna: usize) -> Self {
        Self {
            link,
            tx_antennas,
            rx_antennas,
            sectors_per_antenna,
            silent_antennas: Vec::new(),
        }
    }

    pub fn with_silent_antenna(mut self, antenna: AntennaId) -> Self {
        self.silent_antennas.push(antenna);
        self
    }

    pub fn topology(&self) -> LinkTopology {
        LinkTopology::new(
            self.link,
            self.tx_antennas,
            self.rx_antennas,
            self.sectors_per_antenna,
        )
    }
}

/// Configuration for the scenario runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Selection parameters shared by every link
    pub training: TrainingConfig,
    pub links: Vec<LinkScenario>,
    /// Training phases run back to back on each link
    pub rounds: usize,
    /// Spacing of SISO feedback reports
    pub feedback_interval_ns: SimTime,
    /// Spacing of feedback polls
    pub poll_interval_ns: SimTime,
    /// Air time of one (tx, rx) pair in the MIMO sweep
    pub sweep_pair_ns: SimTime,
    /// Gap between consecutive phases on one link
    pub round_gap_ns: SimTime,
    /// Stagger of phase starts across links
    pub link_stagger_ns: SimTime,
    /// RX sector configurations tested per TX candidate
    pub rx_combinations: usize,
    /// Mean sector SNR in dB
    pub snr_mean_db: f64,
    /// Spread of sector SNR across sectors in dB
    pub snr_std_db: f64,
    /// Per-measurement noise in dB
    pub measurement_noise_db: f64,
    /// Probability that one feedback report is lost
    pub feedback_loss: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            training: TrainingConfig::default(),
            links: vec![LinkScenario::new(1, 2, 2, 8)],
            rounds: 1,
            feedback_interval_ns: 10_000,   // 10 µs per report
            poll_interval_ns: 1_000_000,    // 1 ms
            sweep_pair_ns: 20_000,          // 20 µs per pair
            round_gap_ns: 5_000_000,        // 5 ms
            link_stagger_ns: 100_000,       // 100 µs
            rx_combinations: 4,
            snr_mean_db: 15.0,
            snr_std_db: 6.0,
            measurement_noise_db: 0.5,
            feedback_loss: 0.0,
        }
    }
}

impl ScenarioConfig {
    /// Parse and validate a JSON scenario; missing fields take defaults.
    pub fn from_json_str(json: &str) -> SimResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.training.validate()?;

        if self.links.is_empty() {
            return Err(SimError::InvalidScenario("no links".into()));
        }
        for (i, link) in self.links.iter().enumerate() {
            if self.links[..i].iter().any(|l| l.link == link.link) {
                return Err(SimError::DuplicateLink(link.link));
            }
            if link.tx_antennas == 0 || link.rx_antennas == 0 || link.sectors_per_antenna == 0 {
                return Err(SimError::InvalidScenario(format!(
                    "link {} needs antennas and sectors on both sides",
                    link.link
                )));
            }
            if link.tx_antennas > AntennaId::MAX as usize
                || link.rx_antennas > AntennaId::MAX as usize
                || link.sectors_per_antenna > u8::MAX as usize
            {
                return Err(SimError::InvalidScenario(format!(
                    "link {} exceeds the antenna or sector id range",
                    link.link
                )));
            }
            if let Some(&a) = link
                .silent_antennas
                .iter()
                .find(|&&a| a == 0 || a as usize > link.tx_antennas)
            {
                return Err(SimError::InvalidScenario(format!(
                    "link {} silences antenna {} outside its topology",
                    link.link, a
                )));
            }
        }
        if self.rounds == 0 {
            return Err(SimError::InvalidScenario("rounds must be at least 1".into()));
        }
        if self.rx_combinations == 0 || self.rx_combinations > u8::MAX as usize {
            return Err(SimError::InvalidScenario(
                "rx_combinations must be within 1..=255".into(),
            ));
        }
        if self.poll_interval_ns == 0 {
            return Err(SimError::InvalidScenario("poll_interval_ns must be non-zero".into()));
        }
        if !(self.snr_std_db >= 0.0) || !(self.measurement_noise_db >= 0.0) {
            return Err(SimError::InvalidScenario("SNR spreads must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.feedback_loss) {
            return Err(SimError::InvalidScenario(
                "feedback_loss must be a probability".into(),
            ));
        }
        Ok(())
    }

    pub fn link(&self, link: LinkId) -> Option<&LinkScenario> {
        self.links.iter().find(|l| l.link == link)
    }

    pub fn link_ids(&self) -> Vec<LinkId> {
        self.links.iter().map(|l| l.link).collect()
    }
}

impl Topology for ScenarioConfig {
    fn link_topology(&self, link: LinkId) -> Option<LinkTopology> {
        self.link(link).map(LinkScenario::topology)
    }
}
