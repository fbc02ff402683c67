//! Reporting rows
//!
//! Flat, serializable records of what a training phase measured and
//! selected. This is the only place qualities are converted to dB; the
//! selection path works on linear ratios throughout.
//!
//! No file format is imposed. Rows derive `Serialize`, so a caller can hand
//! them to `serde_json` or any other serializer.

use serde::{Deserialize, Serialize};

use crate::feedback::SnrFeedbackStore;
use crate::types::{AntennaId, AwvId, CombinationScore, JointCombination, LinkId, RankedCandidateSet, SectorId};
use crate::units::{ratio_to_db, ratios_to_db};

/// One SISO feedback measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SisoMeasurementRow {
    pub link: LinkId,
    pub antenna: AntennaId,
    pub sector: SectorId,
    pub snr_db: f64,
}

/// One (antenna, sector, awv) element of a reported combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRow {
    pub antenna: AntennaId,
    pub sector: SectorId,
    pub awv: Option<AwvId>,
}

/// One joint TX candidate selected for the MIMO sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SisoCandidateRow {
    pub link: LinkId,
    /// 1-based position in the ranked set
    pub rank: usize,
    pub tx_id: usize,
    pub tx: Vec<EntryRow>,
    pub per_antenna_snr_db: Vec<f64>,
    pub min_snr_db: f64,
}

/// One scored (tx, rx) pair of a MIMO sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MimoTraceRow {
    pub link: LinkId,
    pub rank: usize,
    pub tx_id: usize,
    pub rx_id: usize,
    pub tx: Vec<EntryRow>,
    pub rx: Vec<EntryRow>,
    pub per_stream_snr_db: Vec<f64>,
    pub min_snr_db: f64,
}

fn entry_rows(combination: &JointCombination) -> Vec<EntryRow> {
    combination
        .entries()
        .iter()
        .map(|e| EntryRow {
            antenna: e.antenna,
            sector: e.sector,
            awv: e.awv,
        })
        .collect()
}

/// Every stored measurement, antennas and sectors in insertion order.
pub fn siso_rows(link: LinkId, store: &SnrFeedbackStore) -> Vec<SisoMeasurementRow> {
    store
        .antennas()
        .flat_map(move |antenna| {
            store
                .all_for_antenna(antenna)
                .map(move |(sector, quality)| SisoMeasurementRow {
                    link,
                    antenna,
                    sector,
                    snr_db: ratio_to_db(quality),
                })
        })
        .collect()
}

pub fn candidate_rows(link: LinkId, set: &RankedCandidateSet) -> Vec<SisoCandidateRow> {
    set.iter()
        .enumerate()
        .map(|(i, score)| SisoCandidateRow {
            link,
            rank: i + 1,
            tx_id: score.tx_id,
            tx: entry_rows(&score.tx_combination),
            per_antenna_snr_db: ratios_to_db(&score.per_stream_quality),
            min_snr_db: ratio_to_db(score.min_quality),
        })
        .collect()
}

/// Rows of either the full or the reduced MIMO stream.
pub fn mimo_rows(link: LinkId, set: &RankedCandidateSet) -> Vec<MimoTraceRow> {
    set.iter()
        .enumerate()
        .map(|(i, score)| mimo_row(link, i + 1, score))
        .collect()
}

fn mimo_row(link: LinkId, rank: usize, score: &CombinationScore) -> MimoTraceRow {
    MimoTraceRow {
        link,
        rank,
        tx_id: score.tx_id,
        rx_id: score.rx_id,
        tx: entry_rows(&score.tx_combination),
        rx: entry_rows(&score.rx_combination),
        per_stream_snr_db: ratios_to_db(&score.per_stream_quality),
        min_snr_db: ratio_to_db(score.min_quality),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::{MeasurementSweep, MimoScoreReducer};
    use crate::types::JointEntry;
    use approx::assert_relative_eq;

    #[test]
    fn test_siso_rows_in_db() {
        let mut store = SnrFeedbackStore::new();
        store.record(2, 5, 100.0).unwrap();
        store.record(1, 3, 10.0).unwrap();
        store.record(2, 1, 1.0).unwrap();

        let rows = siso_rows(4, &store);
        assert_eq!(rows.len(), 3);
        assert_eq!((rows[0].antenna, rows[0].sector), (2, 5));
        assert_relative_eq!(rows[0].snr_db, 20.0, epsilon = 1e-9);
        assert_eq!((rows[1].antenna, rows[1].sector), (2, 1));
        assert_relative_eq!(rows[1].snr_db, 0.0, epsilon = 1e-9);
        assert_relative_eq!(rows[2].snr_db, 10.0, epsilon = 1e-9);
        assert!(rows.iter().all(|r| r.link == 4));
    }

    #[test]
    fn test_mimo_rows_follow_ranking() {
        let tx: Vec<_> = (1..=2)
            .map(|s| JointCombination::new(vec![JointEntry::refined(1, s, 10 + s as u16)]).unwrap())
            .collect();
        let rx = vec![JointCombination::new(vec![JointEntry::sector(1, 7)]).unwrap()];
        let sweep = MeasurementSweep::new(vec![vec![10.0], vec![1000.0]]);
        let reduction = MimoScoreReducer::new(15)
            .reduce(&sweep, &tx, &rx, 1, 1, 1, false)
            .unwrap();

        let rows = mimo_rows(1, reduction.full());
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[0].tx_id, 2);
        assert_eq!(rows[0].tx[0].awv, Some(12));
        assert_eq!(rows[0].rx[0].sector, 7);
        assert_relative_eq!(rows[0].min_snr_db, 30.0, epsilon = 1e-9);
        assert_relative_eq!(rows[1].min_snr_db, 10.0, epsilon = 1e-9);

        let json = serde_json::to_string(&rows).unwrap();
        assert!(json.contains("\"min_snr_db\""));
    }

    #[test]
    fn test_candidate_rows() {
        let mut store = SnrFeedbackStore::new();
        store.record(1, 1, 10.0).unwrap();
        let joint = vec![JointCombination::new(vec![JointEntry::sector(1, 1)]).unwrap()];
        let set = crate::ranker::CombinationRanker::new()
            .select_k_best(&store, joint, 4)
            .unwrap();
        let rows = candidate_rows(3, &set);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tx_id, 1);
        assert_relative_eq!(rows[0].per_antenna_snr_db[0], 10.0, epsilon = 1e-9);
    }
}
