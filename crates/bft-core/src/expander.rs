//! Joint combination expansion
//!
//! Builds the cartesian product of per-antenna ranked sectors. The first
//! antenna varies slowest:
//!
//! ```text
//!   antenna 1: [a, b]      antenna 2: [x, y, z]
//!
//!   (a,x) (a,y) (a,z) (b,x) (b,y) (b,z)
//! ```
//!
//! Lists arrive already capped at `k` by the ranker, so the output size is
//! bounded by `k^n`.
//!
//! With steering refinement enabled, each surviving sector is first replaced
//! by `awvs_per_sector` AWV variants, multiplying the output by
//! `awvs_per_sector^n`. The flag is never inferred.

use tracing::debug;

use crate::error::{BftError, BftResult};
use crate::types::{AntennaId, AntennaSectors, AwvId, JointCombination, JointEntry};

/// AWV variants appended per sector in refinement mode by default
pub const DEFAULT_AWVS_PER_SECTOR: u16 = 5;

/// Largest refinement that keeps every AWV id of a 255-sector codebook in range
pub const MAX_AWVS_PER_SECTOR: u16 = 255;

/// Cartesian expander with optional AWV refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointCombinationExpander {
    steering_refinement: bool,
    awvs_per_sector: u16,
}

impl Default for JointCombinationExpander {
    fn default() -> Self {
        Self::new()
    }
}

impl JointCombinationExpander {
    /// Sector-level expansion, no refinement
    pub fn new() -> Self {
        Self {
            steering_refinement: false,
            awvs_per_sector: DEFAULT_AWVS_PER_SECTOR,
        }
    }

    /// Expansion with `awvs_per_sector` AWV variants per sector.
    pub fn with_refinement(awvs_per_sector: u16) -> BftResult<Self> {
        if awvs_per_sector == 0 || awvs_per_sector > MAX_AWVS_PER_SECTOR {
            return Err(BftError::InvalidConfig(format!(
                "awvs_per_sector must be within 1..={}, got {}",
                MAX_AWVS_PER_SECTOR, awvs_per_sector
            )));
        }
        Ok(Self {
            steering_refinement: true,
            awvs_per_sector,
        })
    }

    pub fn steering_refinement(&self) -> bool {
        self.steering_refinement
    }

    pub fn awvs_per_sector(&self) -> u16 {
        self.awvs_per_sector
    }

    /// AWV id of `variant` within `sector`.
    ///
    /// Ids are laid out sector-major so they stay unique inside the codebook.
    pub fn awv_id(&self, sector: u8, variant: u16) -> AwvId {
        sector as AwvId * self.awvs_per_sector + variant
    }

    /// Number of combinations `expand` will produce for these lists
    pub fn expected_len(&self, per_antenna: &[AntennaSectors]) -> usize {
        let factor = if self.steering_refinement {
            self.awvs_per_sector as usize
        } else {
            1
        };
        per_antenna
            .iter()
            .map(|a| a.sectors.len() * factor)
            .product()
    }

    /// Cartesian product across `per_antenna`, which must hold `n_antennas` lists.
    pub fn expand(
        &self,
        per_antenna: &[AntennaSectors],
        n_antennas: usize,
    ) -> BftResult<Vec<JointCombination>> {
        if per_antenna.len() != n_antennas {
            return Err(BftError::InvalidConfig(format!(
                "expected {} antenna lists, got {}",
                n_antennas,
                per_antenna.len()
            )));
        }
        if n_antennas == 0 {
            return Err(BftError::EmptyCandidateSet { side: "tx" });
        }

        let mut seen: Vec<AntennaId> = Vec::with_capacity(n_antennas);
        let mut choices: Vec<Vec<JointEntry>> = Vec::with_capacity(n_antennas);
        for list in per_antenna {
            if seen.contains(&list.antenna) {
                return Err(BftError::DuplicateAntenna {
                    antenna: list.antenna,
                });
            }
            seen.push(list.antenna);

            if list.sectors.is_empty() {
                return Err(BftError::NoValidSectors {
                    antenna: list.antenna,
                });
            }
            choices.push(self.entries_for(list));
        }

        let total: usize = choices.iter().map(Vec::len).product();
        let mut out = Vec::with_capacity(total);
        let mut cursor = vec![0usize; n_antennas];

        for _ in 0..total {
            let entries = cursor
                .iter()
                .zip(&choices)
                .map(|(&i, options)| options[i])
                .collect();
            out.push(JointCombination::new(entries)?);

            // odometer, last antenna fastest
            for pos in (0..n_antennas).rev() {
                cursor[pos] += 1;
                if cursor[pos] < choices[pos].len() {
                    break;
                }
                cursor[pos] = 0;
            }
        }

        debug!(
            antennas = n_antennas,
            refinement = self.steering_refinement,
            combinations = out.len(),
            "expanded joint combinations"
        );
        Ok(out)
    }

    fn entries_for(&self, list: &AntennaSectors) -> Vec<JointEntry> {
        if !self.steering_refinement {
            return list
                .sectors
                .iter()
                .map(|m| JointEntry::sector(list.antenna, m.sector))
                .collect();
        }
        list.sectors
            .iter()
            .flat_map(|m| {
                (0..self.awvs_per_sector).map(move |v| {
                    JointEntry::refined(list.antenna, m.sector, self.awv_id(m.sector, v))
                })
            })
            .collect()
    }
}
