//! Session counters
//!
//! Plain counters kept by a [`TrainingSession`](crate::session::TrainingSession).
//! Everything runs on one thread, so no atomics are needed.

use serde::{Deserialize, Serialize};

/// Counters of one training session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Phases started
    pub phases_started: u64,
    /// Feedback reports accepted
    pub feedback_events: u64,
    /// Feedback reports rejected (wrong state, bad value, unknown antenna)
    pub feedback_rejected: u64,
    /// Feedback polls delivered
    pub polls: u64,
    /// Antennas excluded for lack of usable feedback
    pub degraded_antennas: u64,
    /// SISO phases that produced candidates
    pub siso_completed: u64,
    /// MIMO phases reduced to a result
    pub mimo_completed: u64,
    /// Phases cancelled from outside
    pub phases_aborted: u64,
    /// Phases reset by a fatal error
    pub phases_failed: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of started phases that reached the MIMO result.
    pub fn completion_rate(&self) -> f64 {
        if self.phases_started == 0 {
            0.0
        } else {
            self.mimo_completed as f64 / self.phases_started as f64
        }
    }

    /// Phases started but not yet completed, aborted or failed
    pub fn in_flight(&self) -> u64 {
        self.phases_started
            .saturating_sub(self.mimo_completed + self.phases_aborted + self.phases_failed)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "started={} siso={} mimo={} aborted={} failed={} feedback={} polls={} degraded={}",
            self.phases_started,
            self.siso_completed,
            self.mimo_completed,
            self.phases_aborted,
            self.phases_failed,
            self.feedback_events,
            self.polls,
            self.degraded_antennas
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rates_and_in_flight() {
        let mut stats = SessionStats::new();
        assert_relative_eq!(stats.completion_rate(), 0.0);

        stats.phases_started = 4;
        stats.mimo_completed = 2;
        stats.phases_aborted = 1;
        assert_relative_eq!(stats.completion_rate(), 0.5);
        assert_eq!(stats.in_flight(), 1);

        stats.reset();
        assert_eq!(stats, SessionStats::default());
    }

    #[test]
    fn test_summary_mentions_counts() {
        let stats = SessionStats {
            phases_started: 3,
            polls: 7,
            ..Default::default()
        };
        let line = stats.summary();
        assert!(line.contains("started=3"));
        assert!(line.contains("polls=7"));
    }
}
