//! Simulation errors

use bft_core::{BftError, LinkId};

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised while building or running a scenario
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Scenario parse error: {0}")]
    Parse(String),

    #[error("Link {0} appears twice in the scenario")]
    DuplicateLink(LinkId),

    #[error("Training error: {0}")]
    Training(#[from] BftError),
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Parse(err.to_string())
    }
}
