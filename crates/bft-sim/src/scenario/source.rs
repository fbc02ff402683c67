//! Measurement sources
//!
//! A [`MeasurementSource`] stands in for the radio: it answers what a SISO
//! feedback report or a MIMO sweep pair would have measured. Two sources
//! are provided:
//!
//! - [`ScriptedSource`]: fixed values, for tests that need exact numbers
//! - [`RandomSource`]: seeded log-normal sector gains, reproducible per seed

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::trace;

use bft_core::units::db_to_ratio;
use bft_core::{AntennaId, JointCombination, LinkId, SectorId, SnrRatio};

use crate::error::{SimError, SimResult};
use crate::scenario::config::ScenarioConfig;

/// Stand-in for the radio measurements
pub trait MeasurementSource {
    /// SISO quality reported for one TX sector, or `None` if the report is lost.
    fn siso_quality(&mut self, link: LinkId, antenna: AntennaId, sector: SectorId) -> Option<SnrRatio>;

    /// Per-stream qualities of one (tx, rx) sweep pair, `tx` antenna-major.
    fn sweep_block(&mut self, link: LinkId, tx: &JointCombination, rx: &JointCombination) -> Vec<SnrRatio>;
}

/// Source replaying fixed values
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    siso: HashMap<(LinkId, AntennaId, SectorId), SnrRatio>,
    blocks: HashMap<LinkId, VecDeque<Vec<SnrRatio>>>,
    fallback: SnrRatio,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// SISO value for one sector; unscripted sectors are lost reports.
    pub fn with_siso(mut self, link: LinkId, antenna: AntennaId, sector: SectorId, quality: SnrRatio) -> Self {
        self.siso.insert((link, antenna, sector), quality);
        self
    }

    /// Sweep blocks of one link, consumed in sweep order.
    pub fn with_blocks(mut self, link: LinkId, blocks: Vec<Vec<SnrRatio>>) -> Self {
        self.blocks.entry(link).or_default().extend(blocks);
        self
    }

    /// Value used for every stream once a link's scripted blocks run out
    pub fn with_fallback(mut self, quality: SnrRatio) -> Self {
        self.fallback = quality;
        self
    }
}

impl MeasurementSource for ScriptedSource {
    fn siso_quality(&mut self, link: LinkId, antenna: AntennaId, sector: SectorId) -> Option<SnrRatio> {
        self.siso.get(&(link, antenna, sector)).copied()
    }

    fn sweep_block(&mut self, link: LinkId, tx: &JointCombination, rx: &JointCombination) -> Vec<SnrRatio> {
        match self.blocks.get_mut(&link).and_then(VecDeque::pop_front) {
            Some(block) => block,
            None => vec![self.fallback; tx.len() * rx.len()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Tx,
    Rx,
}

/// Seeded source with persistent per-sector gains
///
/// Each (link, side, antenna, sector) gets a gain drawn once from
/// `N(snr_mean_db, snr_std_db)`. Every measurement adds independent
/// `N(0, measurement_noise_db)` noise. A sweep stream between TX entry `i`
/// and RX entry `j` measures `tx_gain(i) + rx_gain(j) − snr_mean_db`, so the
/// SISO ranking is informative about the MIMO outcome.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: StdRng,
    gain: Normal<f64>,
    noise: Normal<f64>,
    mean_db: f64,
    loss: f64,
    silent: Vec<(LinkId, AntennaId)>,
    gains: HashMap<(LinkId, Side, AntennaId, SectorId), f64>,
}

impl RandomSource {
    pub fn new(seed: u64, mean_db: f64, std_db: f64, noise_db: f64, loss: f64) -> SimResult<Self> {
        let gain = Normal::new(mean_db, std_db)
            .map_err(|e| SimError::InvalidScenario(format!("SNR distribution: {e}")))?;
        let noise = Normal::new(0.0, noise_db)
            .map_err(|e| SimError::InvalidScenario(format!("noise distribution: {e}")))?;
        if !(0.0..=1.0).contains(&loss) {
            return Err(SimError::InvalidScenario(format!("loss probability {loss}")));
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            gain,
            noise,
            mean_db,
            loss,
            silent: Vec::new(),
            gains: HashMap::new(),
        })
    }

    /// Source matching a scenario's seed, statistics and silent antennas.
    pub fn from_config(config: &ScenarioConfig) -> SimResult<Self> {
        let mut source = Self::new(
            config.seed,
            config.snr_mean_db,
            config.snr_std_db,
            config.measurement_noise_db,
            config.feedback_loss,
        )?;
        for link in &config.links {
            for &antenna in &link.silent_antennas {
                source.silence(link.link, antenna);
            }
        }
        Ok(source)
    }

    /// Never deliver feedback for this antenna.
    pub fn silence(&mut self, link: LinkId, antenna: AntennaId) {
        self.silent.push((link, antenna));
    }

    fn gain_db(&mut self, link: LinkId, side: Side, antenna: AntennaId, sector: SectorId) -> f64 {
        let (rng, gain) = (&mut self.rng, &self.gain);
        *self
            .gains
            .entry((link, side, antenna, sector))
            .or_insert_with(|| gain.sample(rng))
    }

    fn noisy(&mut self, db: f64) -> SnrRatio {
        db_to_ratio(db + self.noise.sample(&mut self.rng))
    }
}

impl MeasurementSource for RandomSource {
    fn siso_quality(&mut self, link: LinkId, antenna: AntennaId, sector: SectorId) -> Option<SnrRatio> {
        if self.silent.contains(&(link, antenna)) {
            return None;
        }
        if self.loss > 0.0 && self.rng.gen_bool(self.loss) {
            trace!(link, antenna, sector, "feedback report lost");
            return None;
        }
        let db = self.gain_db(link, Side::Tx, antenna, sector);
        Some(self.noisy(db))
    }

    fn sweep_block(&mut self, link: LinkId, tx: &JointCombination, rx: &JointCombination) -> Vec<SnrRatio> {
        let mut block = Vec::with_capacity(tx.len() * rx.len());
        for t in tx.entries() {
            let tx_db = self.gain_db(link, Side::Tx, t.antenna, t.sector);
            for r in rx.entries() {
                let rx_db = self.gain_db(link, Side::Rx, r.antenna, r.sector);
                block.push(self.noisy(tx_db + rx_db - self.mean_db));
            }
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bft_core::JointEntry;

    fn combo(entries: &[(u8, u8)]) -> JointCombination {
        JointCombination::new(entries.iter().map(|&(a, s)| JointEntry::sector(a, s)).collect()).unwrap()
    }

    #[test]
    fn test_scripted_source() {
        let mut source = ScriptedSource::new()
            .with_siso(1, 1, 2, 4.0)
            .with_blocks(1, vec![vec![1.0, 2.0]])
            .with_fallback(0.5);

        assert_eq!(source.siso_quality(1, 1, 2), Some(4.0));
        assert_eq!(source.siso_quality(1, 1, 3), None);

        let tx = combo(&[(1, 1), (2, 1)]);
        let rx = combo(&[(1, 1)]);
        assert_eq!(source.sweep_block(1, &tx, &rx), vec![1.0, 2.0]);
        assert_eq!(source.sweep_block(1, &tx, &rx), vec![0.5, 0.5]);
    }

    #[test]
    fn test_random_source_is_reproducible() {
        let draw = || {
            let mut source = RandomSource::new(9, 10.0, 5.0, 0.5, 0.0).unwrap();
            (1..=4)
                .map(|s| source.siso_quality(1, 1, s).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(draw(), draw());
    }

    #[test]
    fn test_sector_gain_persists() {
        let mut source = RandomSource::new(3, 10.0, 5.0, 0.0, 0.0).unwrap();
        let first = source.siso_quality(1, 2, 5).unwrap();
        let again = source.siso_quality(1, 2, 5).unwrap();
        assert_relative_eq!(first, again, epsilon = 1e-12);

        // without noise a 1×1 stream is tx gain + rx gain − mean
        let tx = combo(&[(2, 5)]);
        let rx = combo(&[(1, 1)]);
        let block = source.sweep_block(1, &tx, &rx);
        let rx_db = source.gain_db(1, Side::Rx, 1, 1);
        assert_relative_eq!(
            block[0],
            db_to_ratio(10.0 * first.log10() + rx_db - 10.0),
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_silent_and_lossy() {
        let mut source = RandomSource::new(1, 10.0, 1.0, 0.0, 0.0).unwrap();
        source.silence(1, 2);
        assert!(source.siso_quality(1, 2, 1).is_none());
        assert!(source.siso_quality(1, 1, 1).is_some());

        let mut lossy = RandomSource::new(1, 10.0, 1.0, 0.0, 1.0).unwrap();
        assert!(lossy.siso_quality(1, 1, 1).is_none());

        assert!(RandomSource::new(1, 10.0, -1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_block_shape() {
        let mut source = RandomSource::new(5, 10.0, 3.0, 0.5, 0.0).unwrap();
        let tx = combo(&[(1, 1), (2, 3)]);
        let rx = combo(&[(1, 2), (2, 2), (3, 2)]);
        assert_eq!(source.sweep_block(7, &tx, &rx).len(), 6);
    }
}
