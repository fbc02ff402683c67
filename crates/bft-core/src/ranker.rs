//! SISO candidate ranking
//!
//! Two selections happen on SISO feedback:
//!
//! 1. [`CombinationRanker::rank`] keeps the `k` best sectors of every peer
//!    antenna. Zero-quality sectors never survive. An antenna left with
//!    nothing is reported as [`BftError::NoValidSectors`] instead of silently
//!    disappearing.
//! 2. [`CombinationRanker::select_k_best`] scores the joint combinations built
//!    from those lists by their weakest antenna and keeps the best K for the
//!    MIMO sweep.
//!
//! ```text
//!  store ──rank(k)──► per-antenna lists ──expand──► joint combos ──select_k_best(K)──► RankedCandidateSet
//! ```
//!
//! ## Example
//!
//! ```rust
//! use bft_core::feedback::SnrFeedbackStore;
//! use bft_core::ranker::CombinationRanker;
//!
//! let mut store = SnrFeedbackStore::new();
//! store.record(1, 1, 0.9).unwrap();
//! store.record(1, 2, 0.5).unwrap();
//! store.record(2, 1, 0.3).unwrap();
//!
//! let ranking = CombinationRanker::new().rank(&store, 2, 2, 1).unwrap();
//! assert_eq!(ranking.ranked()[0].sectors.len(), 2);
//! assert_eq!(ranking.ranked()[1].sectors.len(), 1);
//! assert!(ranking.no_valid_sectors().is_empty());
//! ```

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::error::{BftError, BftResult};
use crate::feedback::SnrFeedbackStore;
use crate::types::{
    AntennaId, AntennaSectors, CombinationScore, JointCombination, RankedCandidateSet,
    SectorMeasurement,
};

/// Outcome of per-antenna ranking
#[derive(Debug, Clone, PartialEq)]
pub struct SisoRanking {
    ranked: Vec<AntennaSectors>,
    no_valid: Vec<AntennaId>,
    tx_antennas: usize,
    rx_antennas: usize,
}

impl SisoRanking {
    /// Antennas that kept at least one sector, in enumeration order
    pub fn ranked(&self) -> &[AntennaSectors] {
        &self.ranked
    }

    /// Antennas with no usable sector
    pub fn no_valid_sectors(&self) -> &[AntennaId] {
        &self.no_valid
    }

    pub fn tx_antennas(&self) -> usize {
        self.tx_antennas
    }

    pub fn rx_antennas(&self) -> usize {
        self.rx_antennas
    }

    /// Sectors kept for one antenna, or `NoValidSectors`.
    pub fn for_antenna(&self, antenna: AntennaId) -> BftResult<&[SectorMeasurement]> {
        self.ranked
            .iter()
            .find(|a| a.antenna == antenna)
            .map(|a| a.sectors.as_slice())
            .ok_or(BftError::NoValidSectors { antenna })
    }

    /// Fail on the first antenna that has no usable sector.
    pub fn require_all(&self) -> BftResult<&[AntennaSectors]> {
        match self.no_valid.first() {
            Some(&antenna) => Err(BftError::NoValidSectors { antenna }),
            None => Ok(&self.ranked),
        }
    }

    pub fn into_ranked(self) -> Vec<AntennaSectors> {
        self.ranked
    }
}

/// Ranks sectors per antenna and joint combinations per SISO quality
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinationRanker;

impl CombinationRanker {
    pub fn new() -> Self {
        Self
    }

    /// Keep the `k` best sectors of each antenna `1..=tx_antennas`.
    ///
    /// Sectors are ordered by descending quality; equal qualities put the
    /// lower sector id first so the result does not depend on arrival order.
    pub fn rank(
        &self,
        store: &SnrFeedbackStore,
        k: usize,
        tx_antennas: usize,
        rx_antennas: usize,
    ) -> BftResult<SisoRanking> {
        if k == 0 {
            return Err(BftError::InvalidConfig("k must be at least 1".into()));
        }
        if tx_antennas == 0 || rx_antennas == 0 {
            return Err(BftError::InvalidConfig(format!(
                "antenna counts must be non-zero (tx={}, rx={})",
                tx_antennas, rx_antennas
            )));
        }
        if tx_antennas > AntennaId::MAX as usize {
            return Err(BftError::InvalidConfig(format!(
                "{} tx antennas exceed the antenna id range",
                tx_antennas
            )));
        }

        let mut ranked = Vec::with_capacity(tx_antennas);
        let mut no_valid = Vec::new();

        for antenna in 1..=tx_antennas as AntennaId {
            let sectors = Self::top_sectors(store, antenna, k);
            if sectors.is_empty() {
                warn!(antenna, "no valid sectors in SISO feedback");
                no_valid.push(antenna);
            } else {
                debug!(
                    antenna,
                    kept = sectors.len(),
                    best_sector = sectors[0].sector,
                    "ranked antenna sectors"
                );
                ranked.push(AntennaSectors { antenna, sectors });
            }
        }

        Ok(SisoRanking {
            ranked,
            no_valid,
            tx_antennas,
            rx_antennas,
        })
    }

    /// Score joint TX combinations by their weakest SISO entry and keep the best `k_best`.
    ///
    /// Each score carries one stream value per antenna of the combination and
    /// an empty RX side; `tx_id` is the 1-based position in `joint`. Equal
    /// scores keep expansion order.
    pub fn select_k_best(
        &self,
        store: &SnrFeedbackStore,
        joint: Vec<JointCombination>,
        k_best: usize,
    ) -> BftResult<RankedCandidateSet> {
        if k_best == 0 {
            return Err(BftError::InvalidConfig("k_best must be at least 1".into()));
        }
        if joint.is_empty() {
            return Err(BftError::EmptyCandidateSet { side: "tx" });
        }

        let mut scores = Vec::with_capacity(joint.len());
        for (idx, combination) in joint.into_iter().enumerate() {
            let qualities = combination
                .entries()
                .iter()
                .map(|e| store.get(e.antenna, e.sector))
                .collect::<BftResult<Vec<_>>>()?;
            scores.push(CombinationScore::new(
                idx + 1,
                0,
                combination,
                JointCombination::empty(),
                qualities,
            ));
        }

        let set = RankedCandidateSet::from_scores(scores, k_best);
        debug!(
            selected = set.len(),
            best = set.best().map(|s| s.min_quality),
            "selected K best joint combinations"
        );
        Ok(set)
    }

    fn top_sectors(store: &SnrFeedbackStore, antenna: AntennaId, k: usize) -> Vec<SectorMeasurement> {
        let mut valid: Vec<SectorMeasurement> = store
            .all_for_antenna(antenna)
            .filter(|&(_, q)| q > 0.0)
            .map(|(sector, quality)| SectorMeasurement::new(antenna, sector, quality))
            .collect();

        valid.sort_by(|a, b| match b.quality.total_cmp(&a.quality) {
            Ordering::Equal => a.sector.cmp(&b.sector),
            other => other,
        });
        valid.truncate(k);
        valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointEntry;

    fn scenario_a() -> SnrFeedbackStore {
        let mut store = SnrFeedbackStore::new();
        store.record(1, 1, 0.9).unwrap();
        store.record(1, 2, 0.5).unwrap();
        store.record(2, 1, 0.3).unwrap();
        store
    }

    #[test]
    fn test_scenario_a_rank() {
        let ranking = CombinationRanker::new().rank(&scenario_a(), 2, 2, 2).unwrap();
        assert_eq!(
            ranking.for_antenna(1).unwrap(),
            &[SectorMeasurement::new(1, 1, 0.9), SectorMeasurement::new(1, 2, 0.5)]
        );
        assert_eq!(
            ranking.for_antenna(2).unwrap(),
            &[SectorMeasurement::new(2, 1, 0.3)]
        );
    }

    #[test]
    fn test_length_capped_and_sorted() {
        let mut store = SnrFeedbackStore::new();
        for (sector, q) in [(1, 0.2), (2, 0.8), (3, 0.5), (4, 0.9), (5, 0.1)] {
            store.record(1, sector, q).unwrap();
        }
        let ranking = CombinationRanker::new().rank(&store, 3, 1, 1).unwrap();
        let sectors: Vec<_> = ranking.for_antenna(1).unwrap().iter().map(|m| m.sector).collect();
        assert_eq!(sectors, vec![4, 2, 3]);
    }

    #[test]
    fn test_ties_prefer_lower_sector() {
        let mut store = SnrFeedbackStore::new();
        store.record(1, 7, 1.0).unwrap();
        store.record(1, 3, 1.0).unwrap();
        store.record(1, 5, 1.0).unwrap();
        let ranking = CombinationRanker::new().rank(&store, 2, 1, 1).unwrap();
        let sectors: Vec<_> = ranking.for_antenna(1).unwrap().iter().map(|m| m.sector).collect();
        assert_eq!(sectors, vec![3, 5]);
    }

    #[test]
    fn test_all_zero_antenna_is_no_valid_sectors() {
        let mut store = scenario_a();
        store.record(3, 1, 0.0).unwrap();
        store.record(3, 2, 0.0).unwrap();
        let ranking = CombinationRanker::new().rank(&store, 2, 3, 1).unwrap();

        assert_eq!(ranking.no_valid_sectors(), &[3]);
        assert_eq!(ranking.ranked().len(), 2);
        assert_eq!(
            ranking.for_antenna(3),
            Err(BftError::NoValidSectors { antenna: 3 })
        );
        assert_eq!(
            ranking.require_all().unwrap_err(),
            BftError::NoValidSectors { antenna: 3 }
        );
    }

    #[test]
    fn test_missing_antenna_is_no_valid_sectors() {
        let ranking = CombinationRanker::new().rank(&scenario_a(), 2, 3, 1).unwrap();
        assert_eq!(ranking.no_valid_sectors(), &[3]);
    }

    #[test]
    fn test_rank_is_idempotent() {
        let store = scenario_a();
        let ranker = CombinationRanker::new();
        let first = ranker.rank(&store, 2, 2, 2).unwrap();
        let second = ranker.rank(&store, 2, 2, 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_arguments() {
        let ranker = CombinationRanker::new();
        let store = scenario_a();
        assert!(matches!(ranker.rank(&store, 0, 2, 2), Err(BftError::InvalidConfig(_))));
        assert!(matches!(ranker.rank(&store, 2, 0, 2), Err(BftError::InvalidConfig(_))));
        assert!(matches!(ranker.rank(&store, 2, 2, 0), Err(BftError::InvalidConfig(_))));
    }

    #[test]
    fn test_select_k_best_scores_weakest_antenna() {
        let store = scenario_a();
        let joint = vec![
            JointCombination::new(vec![JointEntry::sector(1, 1), JointEntry::sector(2, 1)]).unwrap(),
            JointCombination::new(vec![JointEntry::sector(1, 2), JointEntry::sector(2, 1)]).unwrap(),
        ];
        let set = CombinationRanker::new().select_k_best(&store, joint, 5).unwrap();
        assert_eq!(set.len(), 2);
        // both limited by antenna 2 at 0.3, so expansion order decides
        assert_eq!(set.scores()[0].tx_id, 1);
        assert_eq!(set.scores()[1].tx_id, 2);
        assert_eq!(set.scores()[0].per_stream_quality, vec![0.9, 0.3]);
        assert!(set.scores()[0].rx_combination.is_empty());
    }

    #[test]
    fn test_select_k_best_truncates() {
        let mut store = SnrFeedbackStore::new();
        for sector in 1..=6 {
            store.record(1, sector, sector as f64).unwrap();
        }
        let joint = (1..=6)
            .map(|s| JointCombination::new(vec![JointEntry::sector(1, s)]).unwrap())
            .collect();
        let set = CombinationRanker::new().select_k_best(&store, joint, 3).unwrap();
        let ids: Vec<_> = set.iter().map(|s| s.tx_id).collect();
        assert_eq!(ids, vec![6, 5, 4]);
    }

    #[test]
    fn test_select_k_best_unmeasured_entry() {
        let store = scenario_a();
        let joint = vec![JointCombination::new(vec![JointEntry::sector(1, 9)]).unwrap()];
        assert_eq!(
            CombinationRanker::new().select_k_best(&store, joint, 1).unwrap_err(),
            BftError::NotMeasured { antenna: 1, sector: 9 }
        );
    }
}
