//! Core types for beamforming training
//!
//! This module defines the identifiers and value types shared by every stage
//! of the selection engine.
//!
//! ## Signal quality
//!
//! All qualities are **linear power ratios** (SNR as a ratio, not dB). A value
//! of exactly `0.0` marks a sector that could not be measured (blocked, or
//! never heard) and never takes part in ranking. Conversion to dB happens only
//! in [`crate::report`] and in log output.
//!
//! ## Joint combinations
//!
//! A joint combination is what one side of the link applies simultaneously,
//! one entry per antenna, in antenna enumeration order:
//!
//! ```text
//!   TX side, 2 antennas, no AWV refinement
//!   ┌──────────────────────┬──────────────────────┐
//!   │ antenna 1, sector 4  │ antenna 2, sector 9  │
//!   └──────────────────────┴──────────────────────┘
//!
//!   TX side, 2 antennas, AWV refinement
//!   ┌──────────────────────────┬──────────────────────────┐
//!   │ antenna 1, sector 4, #22 │ antenna 2, sector 9, #47 │
//!   └──────────────────────────┴──────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BftError, BftResult};

/// Antenna (phased array) identifier, 1-based
pub type AntennaId = u8;

/// Sector identifier within one antenna's codebook, 1-based
pub type SectorId = u8;

/// Antenna weight vector identifier, unique within one antenna's codebook
pub type AwvId = u16;

/// Identifier of an AP-station link
pub type LinkId = u32;

/// Linear power ratio
pub type SnrRatio = f64;

/// A single SISO measurement for one (antenna, sector) pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorMeasurement {
    pub antenna: AntennaId,
    pub sector: SectorId,
    pub quality: SnrRatio,
}

impl SectorMeasurement {
    pub fn new(antenna: AntennaId, sector: SectorId, quality: SnrRatio) -> Self {
        Self {
            antenna,
            sector,
            quality,
        }
    }
}

/// Ranked sectors of one antenna, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaSectors {
    pub antenna: AntennaId,
    pub sectors: Vec<SectorMeasurement>,
}

/// One antenna's setting inside a joint combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JointEntry {
    pub antenna: AntennaId,
    pub sector: SectorId,
    /// `None` for a plain sector beam
    pub awv: Option<AwvId>,
}

impl JointEntry {
    pub fn sector(antenna: AntennaId, sector: SectorId) -> Self {
        Self {
            antenna,
            sector,
            awv: None,
        }
    }

    pub fn refined(antenna: AntennaId, sector: SectorId, awv: AwvId) -> Self {
        Self {
            antenna,
            sector,
            awv: Some(awv),
        }
    }
}

/// Settings applied simultaneously on one side of a link
///
/// Holds at most one entry per antenna; order follows the antenna
/// enumeration used when the measurements were taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JointCombination {
    entries: Vec<JointEntry>,
}

impl JointCombination {
    /// Build a combination, rejecting repeated antennas.
    pub fn new(entries: Vec<JointEntry>) -> BftResult<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.antenna == entry.antenna) {
                return Err(BftError::DuplicateAntenna {
                    antenna: entry.antenna,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Combination with no entries (unspecified side)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[JointEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn antennas(&self) -> impl Iterator<Item = AntennaId> + '_ {
        self.entries.iter().map(|e| e.antenna)
    }

    pub fn entry_for(&self, antenna: AntennaId) -> Option<&JointEntry> {
        self.entries.iter().find(|e| e.antenna == antenna)
    }
}

impl fmt::Display for JointCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match e.awv {
                Some(awv) => write!(f, "{}:{}/{}", e.antenna, e.sector, awv)?,
                None => write!(f, "{}:{}", e.antenna, e.sector)?,
            }
        }
        write!(f, "]")
    }
}

/// Score of one (tx, rx) joint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationScore {
    /// 1-based index into the tested TX combinations
    pub tx_id: usize,
    /// 1-based index into the tested RX combinations (0 when no RX side was tested)
    pub rx_id: usize,
    pub tx_combination: JointCombination,
    pub rx_combination: JointCombination,
    /// Stream qualities, tx-antenna major
    pub per_stream_quality: Vec<SnrRatio>,
    /// Minimum of `per_stream_quality`
    pub min_quality: SnrRatio,
}

impl CombinationScore {
    /// Build a score; `min_quality` is derived from the stream values.
    pub fn new(
        tx_id: usize,
        rx_id: usize,
        tx_combination: JointCombination,
        rx_combination: JointCombination,
        per_stream_quality: Vec<SnrRatio>,
    ) -> Self {
        let min_quality = min_stream_quality(&per_stream_quality);
        Self {
            tx_id,
            rx_id,
            tx_combination,
            rx_combination,
            per_stream_quality,
            min_quality,
        }
    }
}

/// Minimum stream quality; an empty block scores 0 (unusable).
pub fn min_stream_quality(values: &[SnrRatio]) -> SnrRatio {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Top-K combination scores, best first
///
/// Sorted descending by `min_quality`. Equal scores keep the order in which
/// they were produced, so the earlier candidate wins ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidateSet {
    scores: Vec<CombinationScore>,
    capacity: usize,
}

impl RankedCandidateSet {
    /// Rank `scores` and keep at most `capacity` of them.
    pub fn from_scores(mut scores: Vec<CombinationScore>, capacity: usize) -> Self {
        // stable: ties keep production order
        scores.sort_by(|a, b| b.min_quality.total_cmp(&a.min_quality));
        scores.truncate(capacity);
        Self { scores, capacity }
    }

    /// Wrap scores that are already ranked.
    pub(crate) fn from_ranked(scores: Vec<CombinationScore>, capacity: usize) -> Self {
        debug_assert!(scores
            .windows(2)
            .all(|w| w[0].min_quality >= w[1].min_quality));
        Self { scores, capacity }
    }

    pub fn scores(&self) -> &[CombinationScore] {
        &self.scores
    }

    pub fn into_scores(self) -> Vec<CombinationScore> {
        self.scores
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn best(&self) -> Option<&CombinationScore> {
        self.scores.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CombinationScore> {
        self.scores.iter()
    }

    /// TX combinations in rank order
    pub fn tx_combinations(&self) -> Vec<JointCombination> {
        self.scores.iter().map(|s| s.tx_combination.clone()).collect()
    }
}

impl<'a> IntoIterator for &'a RankedCandidateSet {
    type Item = &'a CombinationScore;
    type IntoIter = std::slice::Iter<'a, CombinationScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.scores.iter()
    }
}

/// Antenna layout of one link, as answered by the topology layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTopology {
    pub link: LinkId,
    /// Antennas on the transmitting (trained) side
    pub tx_antennas: usize,
    /// Antennas on the receiving side
    pub rx_antennas: usize,
    /// Sectors each transmit antenna sweeps during SISO feedback
    pub sectors_per_antenna: usize,
}

impl LinkTopology {
    pub fn new(link: LinkId, tx_antennas: usize, rx_antennas: usize, sectors_per_antenna: usize) -> Self {
        Self {
            link,
            tx_antennas,
            rx_antennas,
            sectors_per_antenna,
        }
    }

    /// Number of per-stream values in one MIMO measurement block
    pub fn streams(&self) -> usize {
        self.tx_antennas * self.rx_antennas
    }

    /// TX antenna ids in enumeration order
    pub fn tx_antenna_ids(&self) -> impl Iterator<Item = AntennaId> {
        (1..=self.tx_antennas).map(|a| a as AntennaId)
    }
}
