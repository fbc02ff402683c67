//! MIMO sweep reduction
//!
//! The MIMO phase measures every tested (tx, rx) joint configuration. Each
//! measurement is a block of `n_tx × n_rx` per-stream qualities; spatial
//! multiplexing is limited by the weakest stream, so a configuration scores
//! the minimum of its block.
//!
//! ## Sweep layout
//!
//! Blocks are stored linearly, tx-major, with 1-based external indices:
//!
//! ```text
//!   index(tx, rx) = (tx − 1) × rx_tested + rx − 1
//!
//!   rx_tested = 3
//!   ┌───────┬───────┬───────┬───────┬───────┬───────┐
//!   │ (1,1) │ (1,2) │ (1,3) │ (2,1) │ (2,2) │ (2,3) │ ...
//!   └───────┴───────┴───────┴───────┴───────┴───────┘
//!       0       1       2       3       4       5
//! ```
//!
//! ## Output streams
//!
//! Two result streams are produced, both descending by min quality:
//!
//! - **full**: every scored pair (up to K)
//! - **reduced**: every scored pair with repeated TX ids dropped, keeping the
//!   best RX for each TX, unless different RX configurations per TX are allowed
//!   (up to K)
//!
//! Deduplication runs over the whole sorted sweep before either stream is
//! capped, so a TX whose best pair falls below position K in the full stream
//! still reaches the reduced one. Equal scores are ordered by sweep index, so
//! the pair measured first wins.
//!
//! ## Example
//!
//! ```rust
//! use bft_core::reducer::{MeasurementSweep, MimoScoreReducer};
//! use bft_core::types::{JointCombination, JointEntry};
//!
//! let tx: Vec<_> = (1..=2)
//!     .map(|s| JointCombination::new(vec![JointEntry::sector(1, s)]).unwrap())
//!     .collect();
//! let rx = vec![
//!     JointCombination::new(vec![JointEntry::sector(1, 1)]).unwrap(),
//!     JointCombination::new(vec![JointEntry::sector(1, 2)]).unwrap(),
//! ];
//! let sweep = MeasurementSweep::new(vec![vec![0.1], vec![0.9], vec![0.4], vec![0.9]]);
//!
//! let reduction = MimoScoreReducer::new(15)
//!     .reduce(&sweep, &tx, &rx, 1, 1, 2, false)
//!     .unwrap();
//! let order: Vec<_> = reduction.full().iter().map(|s| (s.tx_id, s.rx_id)).collect();
//! assert_eq!(order, vec![(1, 2), (2, 2), (2, 1), (1, 1)]);
//! assert_eq!(reduction.reduced().len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{BftError, BftResult};
use crate::types::{CombinationScore, JointCombination, RankedCandidateSet, SnrRatio};

/// Linear sweep index of the 1-based (tx, rx) pair, `None` for a 0 id.
#[inline]
pub fn sweep_index(tx_id: usize, rx_id: usize, rx_tested: usize) -> Option<usize> {
    Some(tx_id.checked_sub(1)? * rx_tested + rx_id.checked_sub(1)?)
}

/// Per-stream measurement blocks of one MIMO sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSweep {
    blocks: Vec<Vec<SnrRatio>>,
}

impl MeasurementSweep {
    pub fn new(blocks: Vec<Vec<SnrRatio>>) -> Self {
        Self { blocks }
    }

    /// Split a flat value sequence into blocks of `streams` values.
    pub fn from_flat(values: &[SnrRatio], streams: usize) -> BftResult<Self> {
        if streams == 0 || values.len() % streams != 0 {
            return Err(BftError::StreamCountMismatch {
                index: values.len() / streams.max(1),
                expected: streams,
                actual: values.len() % streams.max(1),
            });
        }
        Ok(Self {
            blocks: values.chunks(streams).map(<[f64]>::to_vec).collect(),
        })
    }

    /// Number of (tx, rx) blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Vec<SnrRatio>] {
        &self.blocks
    }

    /// Block of the 1-based (tx, rx) pair
    pub fn block(&self, tx_id: usize, rx_id: usize, rx_tested: usize) -> Option<&[SnrRatio]> {
        if rx_id > rx_tested {
            return None;
        }
        self.blocks
            .get(sweep_index(tx_id, rx_id, rx_tested)?)
            .map(Vec::as_slice)
    }
}

/// Full and reduced result streams of one MIMO sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimoReduction {
    full: RankedCandidateSet,
    reduced: RankedCandidateSet,
    allow_different_rx_per_tx: bool,
}

impl MimoReduction {
    /// Every scored pair, best first
    pub fn full(&self) -> &RankedCandidateSet {
        &self.full
    }

    /// At most one pair per TX id unless different RX configs are allowed
    pub fn reduced(&self) -> &RankedCandidateSet {
        &self.reduced
    }

    pub fn allow_different_rx_per_tx(&self) -> bool {
        self.allow_different_rx_per_tx
    }

    pub fn into_parts(self) -> (RankedCandidateSet, RankedCandidateSet) {
        (self.full, self.reduced)
    }
}

/// Scores a MIMO sweep by its weakest stream and keeps the top K
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimoScoreReducer {
    k_best: usize,
}

impl MimoScoreReducer {
    pub fn new(k_best: usize) -> Self {
        Self { k_best }
    }

    pub fn k_best(&self) -> usize {
        self.k_best
    }

    /// Reduce a sweep over `tx` × the first `rx_tested` entries of `rx`.
    #[allow(clippy::too_many_arguments)]
    pub fn reduce(
        &self,
        sweep: &MeasurementSweep,
        tx: &[JointCombination],
        rx: &[JointCombination],
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
        allow_different_rx_per_tx: bool,
    ) -> BftResult<MimoReduction> {
        if tx.is_empty() {
            return Err(BftError::EmptyCandidateSet { side: "tx" });
        }
        if rx.is_empty() || rx_tested == 0 {
            return Err(BftError::EmptyCandidateSet { side: "rx" });
        }
        if rx_tested > rx.len() {
            return Err(BftError::InvalidConfig(format!(
                "{} rx combinations tested but only {} supplied",
                rx_tested,
                rx.len()
            )));
        }
        if self.k_best == 0 {
            return Err(BftError::InvalidConfig("k_best must be at least 1".into()));
        }

        let expected = tx.len() * rx_tested;
        if sweep.len() != expected {
            return Err(BftError::SweepSizeMismatch {
                expected,
                actual: sweep.len(),
            });
        }

        let streams = n_tx * n_rx;
        for (index, block) in sweep.blocks().iter().enumerate() {
            if block.len() != streams {
                return Err(BftError::StreamCountMismatch {
                    index,
                    expected: streams,
                    actual: block.len(),
                });
            }
            if let Some(&value) = block.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(BftError::InvalidMeasurement { value });
            }
        }

        // Linear order is tx-major, matching sweep_index, so the stable sort
        // below leaves tied pairs in sweep order.
        let mut scores = Vec::with_capacity(expected);
        let mut blocks = sweep.blocks().iter();
        for (tx_idx, tx_combo) in tx.iter().enumerate() {
            for (rx_idx, rx_combo) in rx.iter().take(rx_tested).enumerate() {
                let tx_id = tx_idx + 1;
                let rx_id = rx_idx + 1;
                let Some(block) = blocks.next() else {
                    break;
                };
                let score = CombinationScore::new(
                    tx_id,
                    rx_id,
                    tx_combo.clone(),
                    rx_combo.clone(),
                    block.clone(),
                );
                trace!(tx_id, rx_id, min_quality = score.min_quality, "scored pair");
                scores.push(score);
            }
        }

        scores.sort_by(|a, b| b.min_quality.total_cmp(&a.min_quality));
        let reduced = Self::dedup_tx(&scores, self.k_best, allow_different_rx_per_tx);
        scores.truncate(self.k_best);
        let full = RankedCandidateSet::from_ranked(scores, self.k_best);

        debug!(
            pairs = expected,
            full = full.len(),
            reduced = reduced.len(),
            allow_different_rx_per_tx,
            "reduced MIMO sweep"
        );

        Ok(MimoReduction {
            full,
            reduced,
            allow_different_rx_per_tx,
        })
    }

    /// First `capacity` entries of the sorted scores, one per TX id.
    fn dedup_tx(sorted: &[CombinationScore], capacity: usize, allow_different_rx: bool) -> RankedCandidateSet {
        let mut emitted: Vec<usize> = Vec::new();
        let kept = sorted
            .iter()
            .filter(|s| {
                if allow_different_rx || !emitted.contains(&s.tx_id) {
                    emitted.push(s.tx_id);
                    true
                } else {
                    false
                }
            })
            .take(capacity)
            .cloned()
            .collect();
        RankedCandidateSet::from_ranked(kept, capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JointEntry;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn combos(antenna: u8, n: usize) -> Vec<JointCombination> {
        (1..=n)
            .map(|s| JointCombination::new(vec![JointEntry::sector(antenna, s as u8)]).unwrap())
            .collect()
    }

    fn scenario_b() -> (MeasurementSweep, Vec<JointCombination>, Vec<JointCombination>) {
        let sweep = MeasurementSweep::new(vec![vec![0.1], vec![0.9], vec![0.4], vec![0.9]]);
        (sweep, combos(1, 2), combos(1, 2))
    }

    #[test]
    fn test_sweep_index_convention() {
        assert_eq!(sweep_index(1, 1, 4), Some(0));
        assert_eq!(sweep_index(1, 4, 4), Some(3));
        assert_eq!(sweep_index(2, 1, 4), Some(4));
        assert_eq!(sweep_index(3, 2, 4), Some(9));
        assert_eq!(sweep_index(0, 1, 4), None);
        assert_eq!(sweep_index(1, 0, 4), None);
        assert_eq!(MeasurementSweep::new(vec![vec![1.0]]).block(0, 1, 1), None);
    }

    #[test]
    fn test_scenario_b_tie_keeps_sweep_order() {
        let (sweep, tx, rx) = scenario_b();
        let reduction = MimoScoreReducer::new(15)
            .reduce(&sweep, &tx, &rx, 1, 1, 2, false)
            .unwrap();
        let indices: Vec<_> = reduction
            .full()
            .iter()
            .filter_map(|s| sweep_index(s.tx_id, s.rx_id, 2))
            .map(|i| i + 1)
            .collect();
        assert_eq!(indices, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_reduced_keeps_one_entry_per_tx() {
        let (sweep, tx, rx) = scenario_b();
        let reduction = MimoScoreReducer::new(15)
            .reduce(&sweep, &tx, &rx, 1, 1, 2, false)
            .unwrap();
        let pairs: Vec<_> = reduction.reduced().iter().map(|s| (s.tx_id, s.rx_id)).collect();
        assert_eq!(pairs, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_reduced_equals_full_when_different_rx_allowed() {
        let (sweep, tx, rx) = scenario_b();
        let reduction = MimoScoreReducer::new(15)
            .reduce(&sweep, &tx, &rx, 1, 1, 2, true)
            .unwrap();
        assert_eq!(reduction.full(), reduction.reduced());
        assert!(reduction.allow_different_rx_per_tx());
    }

    #[test]
    fn test_scenario_c_size_mismatch() {
        let sweep = MeasurementSweep::new(vec![vec![1.0]; 10]);
        let err = MimoScoreReducer::new(15)
            .reduce(&sweep, &combos(1, 3), &combos(1, 4), 1, 1, 4, false)
            .unwrap_err();
        assert_eq!(err, BftError::SweepSizeMismatch { expected: 12, actual: 10 });
    }

    #[test]
    fn test_empty_candidate_sets() {
        let sweep = MeasurementSweep::default();
        let reducer = MimoScoreReducer::new(15);
        assert_eq!(
            reducer.reduce(&sweep, &[], &combos(1, 1), 1, 1, 1, false).unwrap_err(),
            BftError::EmptyCandidateSet { side: "tx" }
        );
        assert_eq!(
            reducer.reduce(&sweep, &combos(1, 1), &[], 1, 1, 1, false).unwrap_err(),
            BftError::EmptyCandidateSet { side: "rx" }
        );
    }

    #[test]
    fn test_min_over_all_streams() {
        // 2x2: four streams per block
        let sweep = MeasurementSweep::new(vec![vec![4.0, 2.0, 8.0, 3.0], vec![1.0, 9.0, 9.0, 9.0]]);
        let reduction = MimoScoreReducer::new(5)
            .reduce(&sweep, &combos(1, 2), &combos(1, 1), 2, 2, 1, false)
            .unwrap();
        let best = reduction.full().best().unwrap();
        assert_eq!(best.tx_id, 1);
        assert_relative_eq!(best.min_quality, 2.0);
        assert_eq!(best.per_stream_quality.len(), 4);
    }

    #[test]
    fn test_stream_count_mismatch() {
        let sweep = MeasurementSweep::new(vec![vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0]]);
        let err = MimoScoreReducer::new(5)
            .reduce(&sweep, &combos(1, 2), &combos(1, 1), 2, 2, 1, false)
            .unwrap_err();
        assert_eq!(
            err,
            BftError::StreamCountMismatch { index: 1, expected: 4, actual: 2 }
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let sweep = MeasurementSweep::new(vec![vec![1.0], vec![f64::NAN]]);
        let err = MimoScoreReducer::new(5)
            .reduce(&sweep, &combos(1, 2), &combos(1, 1), 1, 1, 1, false)
            .unwrap_err();
        assert!(matches!(err, BftError::InvalidMeasurement { .. }));
    }

    #[test]
    fn test_output_length_is_min_k_pairs() {
        let blocks: Vec<_> = (0..12).map(|i| vec![i as f64]).collect();
        let sweep = MeasurementSweep::new(blocks);
        let reducer = MimoScoreReducer::new(5);
        let reduction = reducer
            .reduce(&sweep, &combos(1, 3), &combos(1, 4), 1, 1, 4, true)
            .unwrap();
        assert_eq!(reduction.full().len(), 5);

        let reduction = MimoScoreReducer::new(50)
            .reduce(&sweep, &combos(1, 3), &combos(1, 4), 1, 1, 4, true)
            .unwrap();
        assert_eq!(reduction.full().len(), 12);
    }

    #[test]
    fn test_round_trip_known_order() {
        // assign decreasing quality along a fixed permutation of the 3x3 grid
        let order = [(2, 3), (1, 1), (3, 2), (1, 3), (2, 1), (3, 3), (1, 2), (3, 1), (2, 2)];
        let mut blocks = vec![Vec::new(); 9];
        for (rank, &(tx, rx)) in order.iter().enumerate() {
            blocks[sweep_index(tx, rx, 3).unwrap()] = vec![100.0 - rank as f64, 200.0];
        }
        let sweep = MeasurementSweep::new(blocks);
        let reduction = MimoScoreReducer::new(9)
            .reduce(&sweep, &combos(1, 3), &combos(2, 3), 2, 1, 3, true)
            .unwrap();
        let got: Vec<_> = reduction.full().iter().map(|s| (s.tx_id, s.rx_id)).collect();
        assert_eq!(got, order.to_vec());
    }

    #[test]
    fn test_reduced_has_unique_tx_and_stays_sorted() {
        let blocks: Vec<_> = [5.0, 7.0, 1.0, 7.0, 2.0, 6.0, 3.0, 3.0, 9.0]
            .iter()
            .map(|&q| vec![q])
            .collect();
        let sweep = MeasurementSweep::new(blocks);
        let reduction = MimoScoreReducer::new(9)
            .reduce(&sweep, &combos(1, 3), &combos(2, 3), 1, 1, 3, false)
            .unwrap();

        let full = reduction.full().scores();
        assert!(full.windows(2).all(|w| w[0].min_quality >= w[1].min_quality));

        let reduced = reduction.reduced().scores();
        let txs: HashSet<_> = reduced.iter().map(|s| s.tx_id).collect();
        assert_eq!(txs.len(), reduced.len());
        assert!(reduced.windows(2).all(|w| w[0].min_quality >= w[1].min_quality));
        let pairs: Vec<_> = reduced.iter().map(|s| (s.tx_id, s.rx_id)).collect();
        assert_eq!(pairs, vec![(3, 3), (1, 2), (2, 1)]);
    }

    #[test]
    fn test_reduced_keeps_tx_beyond_full_cap() {
        // tx 1 owns both slots of the full stream; tx 2 still gets its best rx
        let sweep = MeasurementSweep::new(vec![vec![0.9], vec![0.8], vec![0.5], vec![0.4]]);
        let reduction = MimoScoreReducer::new(2)
            .reduce(&sweep, &combos(1, 2), &combos(1, 2), 1, 1, 2, false)
            .unwrap();
        let full: Vec<_> = reduction.full().iter().map(|s| (s.tx_id, s.rx_id)).collect();
        assert_eq!(full, vec![(1, 1), (1, 2)]);
        let reduced: Vec<_> = reduction.reduced().iter().map(|s| (s.tx_id, s.rx_id)).collect();
        assert_eq!(reduced, vec![(1, 1), (2, 1)]);
        assert_relative_eq!(reduction.reduced().scores()[1].min_quality, 0.5);
    }

    #[test]
    fn test_reduced_capped_at_k() {
        let blocks: Vec<_> = (0..8).map(|i| vec![10.0 - i as f64]).collect();
        let sweep = MeasurementSweep::new(blocks);
        let reduction = MimoScoreReducer::new(3)
            .reduce(&sweep, &combos(1, 4), &combos(2, 2), 1, 1, 2, false)
            .unwrap();
        assert_eq!(reduction.full().len(), 3);
        let reduced: Vec<_> = reduction.reduced().iter().map(|s| s.tx_id).collect();
        assert_eq!(reduced, vec![1, 2, 3]);
    }

    #[test]
    fn test_from_flat() {
        let sweep = MeasurementSweep::from_flat(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 4).unwrap();
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.block(1, 2, 2), Some(&[5.0, 6.0, 7.0, 8.0][..]));
        assert_eq!(sweep.block(1, 3, 2), None);
        assert!(MeasurementSweep::from_flat(&[1.0, 2.0, 3.0], 2).is_err());
    }
}
