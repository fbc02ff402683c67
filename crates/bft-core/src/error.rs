//! Error types for beamforming training

use thiserror::Error;

use crate::types::{AntennaId, LinkId, SectorId};

/// Result type for training operations
pub type BftResult<T> = Result<T, BftError>;

/// Errors raised by the selection engine and the phase coordinator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BftError {
    /// No measurement recorded for the requested sector
    #[error("No measurement for antenna {antenna}, sector {sector}")]
    NotMeasured { antenna: AntennaId, sector: SectorId },

    /// Antenna contributed no usable (non-zero) sector
    #[error("Antenna {antenna} has no valid sectors")]
    NoValidSectors { antenna: AntennaId },

    /// Sweep length does not match the tested (tx, rx) grid
    #[error("Sweep size mismatch: expected {expected} measurement blocks, got {actual}")]
    SweepSizeMismatch { expected: usize, actual: usize },

    /// A combination list handed to the reducer or expander is empty
    #[error("Empty {side} candidate set")]
    EmptyCandidateSet { side: &'static str },

    /// A sweep block carries the wrong number of per-stream values
    #[error("Sweep block {index} has {actual} stream values, expected {expected}")]
    StreamCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Reported antenna counts disagree with the link topology
    #[error("Antenna count mismatch on {side} side: topology has {expected}, sweep reports {actual}")]
    AntennaCountMismatch {
        side: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Quality value is negative or NaN
    #[error("Invalid signal quality {value}: must be a non-negative linear ratio")]
    InvalidMeasurement { value: f64 },

    /// Joint combination would use the same antenna twice
    #[error("Antenna {antenna} appears more than once in a joint combination")]
    DuplicateAntenna { antenna: AntennaId },

    /// Event arrived while the coordinator was in a state that cannot accept it
    #[error("Invalid transition: cannot {event} while {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    /// Event addressed to a coordinator for a different link
    #[error("Event for link {actual} delivered to coordinator of link {expected}")]
    LinkMismatch { expected: LinkId, actual: LinkId },

    /// No coordinator exists for the link
    #[error("Unknown link {0}")]
    UnknownLink(LinkId),

    /// Configuration or argument out of range
    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    /// Configuration could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BftError {
    fn from(err: serde_json::Error) -> Self {
        BftError::Config(err.to_string())
    }
}

impl BftError {
    /// Recoverable conditions degrade a phase without aborting it
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BftError::NotMeasured { .. } | BftError::NoValidSectors { .. }
        )
    }

    /// Structural contract violations that abort the current phase
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BftError::SweepSizeMismatch { .. }
                | BftError::EmptyCandidateSet { .. }
                | BftError::StreamCountMismatch { .. }
                | BftError::AntennaCountMismatch { .. }
                | BftError::InvalidMeasurement { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(BftError::NoValidSectors { antenna: 2 }.is_recoverable());
        assert!(!BftError::NoValidSectors { antenna: 2 }.is_fatal());
        assert!(BftError::SweepSizeMismatch { expected: 12, actual: 10 }.is_fatal());
        assert!(BftError::EmptyCandidateSet { side: "tx" }.is_fatal());
        assert!(!BftError::UnknownLink(3).is_fatal());
        assert!(!BftError::UnknownLink(3).is_recoverable());
    }

    #[test]
    fn test_messages_name_dimensions() {
        let msg = BftError::SweepSizeMismatch { expected: 12, actual: 10 }.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));

        let msg = BftError::NoValidSectors { antenna: 3 }.to_string();
        assert!(msg.contains("Antenna 3"));
    }

    #[test]
    fn test_config_error_from_json() {
        let err: BftError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, BftError::Config(_)));
    }
}
