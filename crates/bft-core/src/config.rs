//! Training configuration
//!
//! Parameters shared by every coordinator of a session. Serializable so a
//! driver can load them from JSON alongside its own settings.

use serde::{Deserialize, Serialize};

use crate::error::{BftError, BftResult};
use crate::expander::{JointCombinationExpander, DEFAULT_AWVS_PER_SECTOR, MAX_AWVS_PER_SECTOR};

/// Selection parameters for one training phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Sectors kept per antenna after SISO ranking
    pub k_per_antenna: usize,
    /// Joint combinations kept for the MIMO sweep and in the MIMO result
    pub k_best_combinations: usize,
    /// Replace each surviving sector by AWV variants before expansion
    pub steering_refinement: bool,
    /// AWV variants per sector when refinement is on
    pub awvs_per_sector: u16,
    /// Keep several RX configurations per TX id in the reduced MIMO result
    pub allow_different_rx_per_tx: bool,
    /// Feedback polls before missing antennas are given up on
    pub max_poll_attempts: u32,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            k_per_antenna: 4,
            k_best_combinations: 15,
            steering_refinement: false,
            awvs_per_sector: DEFAULT_AWVS_PER_SECTOR,
            allow_different_rx_per_tx: false,
            max_poll_attempts: 3,
        }
    }
}

impl TrainingConfig {
    /// Parse and validate a JSON document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> BftResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> BftResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges.
    pub fn validate(&self) -> BftResult<()> {
        if self.k_per_antenna == 0 {
            return Err(BftError::InvalidConfig("k_per_antenna must be at least 1".into()));
        }
        if self.k_best_combinations == 0 {
            return Err(BftError::InvalidConfig(
                "k_best_combinations must be at least 1".into(),
            ));
        }
        if self.steering_refinement
            && (self.awvs_per_sector == 0 || self.awvs_per_sector > MAX_AWVS_PER_SECTOR)
        {
            return Err(BftError::InvalidConfig(format!(
                "awvs_per_sector must be within 1..={}",
                MAX_AWVS_PER_SECTOR
            )));
        }
        if self.max_poll_attempts == 0 {
            return Err(BftError::InvalidConfig(
                "max_poll_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Expander matching the refinement settings
    pub fn expander(&self) -> BftResult<JointCombinationExpander> {
        if self.steering_refinement {
            JointCombinationExpander::with_refinement(self.awvs_per_sector)
        } else {
            Ok(JointCombinationExpander::new())
        }
    }

    pub fn with_k_best(mut self, k: usize) -> Self {
        self.k_best_combinations = k;
        self
    }

    pub fn with_refinement(mut self, awvs_per_sector: u16) -> Self {
        self.steering_refinement = true;
        self.awvs_per_sector = awvs_per_sector;
        self
    }
}
