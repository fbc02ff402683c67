//! SISO feedback store
//!
//! Holds the per-sector signal quality reported by the peer during the SISO
//! phase, keyed by (antenna, sector). Retransmitted feedback may repeat a
//! key; the last write wins and keeps the slot of the first one.
//!
//! ## Example
//!
//! ```rust
//! use bft_core::feedback::SnrFeedbackStore;
//!
//! let mut store = SnrFeedbackStore::new();
//! store.record(1, 1, 0.9).unwrap();
//! store.record(1, 2, 0.5).unwrap();
//! store.record(1, 1, 0.8).unwrap(); // retransmission overwrites
//!
//! assert_eq!(store.get(1, 1).unwrap(), 0.8);
//! let order: Vec<u8> = store.all_for_antenna(1).map(|(s, _)| s).collect();
//! assert_eq!(order, vec![1, 2]);
//! ```

use tracing::trace;

use crate::error::{BftError, BftResult};
use crate::types::{AntennaId, SectorId, SectorMeasurement, SnrRatio};

#[derive(Debug, Clone)]
struct AntennaFeedback {
    antenna: AntennaId,
    sectors: Vec<(SectorId, SnrRatio)>,
}

/// Per-link SISO measurements
#[derive(Debug, Clone, Default)]
pub struct SnrFeedbackStore {
    antennas: Vec<AntennaFeedback>,
    len: usize,
}

impl SnrFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the quality of one sector.
    ///
    /// Fails with [`BftError::InvalidMeasurement`] for negative, NaN or
    /// infinite ratios.
    pub fn record(&mut self, antenna: AntennaId, sector: SectorId, quality: SnrRatio) -> BftResult<()> {
        if !quality.is_finite() || quality < 0.0 {
            return Err(BftError::InvalidMeasurement { value: quality });
        }

        let slot = match self.antennas.iter().position(|a| a.antenna == antenna) {
            Some(idx) => idx,
            None => {
                self.antennas.push(AntennaFeedback {
                    antenna,
                    sectors: Vec::new(),
                });
                self.antennas.len() - 1
            }
        };
        let sectors = &mut self.antennas[slot].sectors;

        match sectors.iter_mut().find(|(s, _)| *s == sector) {
            Some(entry) => {
                trace!(antenna, sector, old = entry.1, new = quality, "feedback overwritten");
                entry.1 = quality;
            }
            None => {
                sectors.push((sector, quality));
                self.len += 1;
            }
        }
        Ok(())
    }

    /// Record a whole measurement.
    pub fn record_measurement(&mut self, m: SectorMeasurement) -> BftResult<()> {
        self.record(m.antenna, m.sector, m.quality)
    }

    /// Quality of one sector, or [`BftError::NotMeasured`].
    pub fn get(&self, antenna: AntennaId, sector: SectorId) -> BftResult<SnrRatio> {
        self.find(antenna)
            .and_then(|a| a.sectors.iter().find(|(s, _)| *s == sector))
            .map(|(_, q)| *q)
            .ok_or(BftError::NotMeasured { antenna, sector })
    }

    /// Sectors of one antenna in insertion order; empty for an unknown antenna.
    pub fn all_for_antenna(&self, antenna: AntennaId) -> impl Iterator<Item = (SectorId, SnrRatio)> + '_ {
        self.find(antenna)
            .into_iter()
            .flat_map(|a| a.sectors.iter().copied())
    }

    /// Antennas in the order their first feedback arrived
    pub fn antennas(&self) -> impl Iterator<Item = AntennaId> + '_ {
        self.antennas.iter().map(|a| a.antenna)
    }

    /// Number of distinct sectors recorded for an antenna
    pub fn sector_count(&self, antenna: AntennaId) -> usize {
        self.find(antenna).map_or(0, |a| a.sectors.len())
    }

    /// Number of distinct (antenna, sector) keys
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.antennas.clear();
        self.len = 0;
    }

    fn find(&self, antenna: AntennaId) -> Option<&AntennaFeedback> {
        self.antennas.iter().find(|a| a.antenna == antenna)
    }
}
