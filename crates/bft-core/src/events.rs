//! Event interfaces between the coordinator and the outside world
//!
//! ```text
//!   transport / sweep driver                         reporting layer
//!          │                                                ▲
//!          │ TrainingEvents                                 │ PhaseObserver
//!          ▼                                                │
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ PhaseCoordinator (one per link)                              │
//!   └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Inbound events arrive through [`TrainingEvents`], one method per event
//! kind. Outbound notifications go to the [`PhaseObserver`] registered on each
//! coordinator. [`EventLog`] is an observer that simply records everything.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BftError, BftResult};
use crate::reducer::{MeasurementSweep, MimoReduction};
use crate::types::{AntennaId, LinkId, RankedCandidateSet, SectorId, SnrRatio};

/// Inbound events delivered by the transport and the sweep driver
pub trait TrainingEvents {
    /// A peer reported the quality of one of our sectors.
    fn on_feedback(
        &mut self,
        antenna: AntennaId,
        sector: SectorId,
        quality: SnrRatio,
        source_link: LinkId,
    ) -> BftResult<()>;

    /// The joint sweep finished and its measurements were collected.
    fn on_sweep_measurements(
        &mut self,
        link: LinkId,
        sweep: MeasurementSweep,
        n_tx: usize,
        n_rx: usize,
        rx_tested: usize,
    ) -> BftResult<()>;

    /// One externally timed feedback poll elapsed.
    fn poll_feedback(&mut self, link: LinkId) -> BftResult<()>;
}

/// Outbound notifications of one coordinator
///
/// All methods default to no-ops.
pub trait PhaseObserver {
    /// SISO phase done; `candidates` drive the MIMO sweep.
    fn on_siso_complete(&mut self, _link: LinkId, _candidates: &RankedCandidateSet) {}

    /// An antenna contributed nothing usable and was left out.
    fn on_antenna_degraded(&mut self, _link: LinkId, _antenna: AntennaId) {}

    /// MIMO phase done.
    fn on_mimo_complete(&mut self, _link: LinkId, _reduction: &MimoReduction) {}

    /// Fatal condition; the coordinator is back in `Idle`.
    fn on_phase_failed(&mut self, _link: LinkId, _error: &BftError) {}

    /// Phase cancelled from outside.
    fn on_phase_aborted(&mut self, _link: LinkId) {}
}

/// Recorded notification
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    SisoComplete {
        link: LinkId,
        candidates: RankedCandidateSet,
    },
    AntennaDegraded {
        link: LinkId,
        antenna: AntennaId,
    },
    MimoComplete {
        link: LinkId,
        reduction: MimoReduction,
    },
    PhaseFailed {
        link: LinkId,
        error: BftError,
    },
    PhaseAborted {
        link: LinkId,
    },
}

impl PhaseEvent {
    pub fn link(&self) -> LinkId {
        match self {
            PhaseEvent::SisoComplete { link, .. }
            | PhaseEvent::AntennaDegraded { link, .. }
            | PhaseEvent::MimoComplete { link, .. }
            | PhaseEvent::PhaseFailed { link, .. }
            | PhaseEvent::PhaseAborted { link } => *link,
        }
    }
}

/// Observer that records every notification
///
/// Clones share the same log, so a caller can keep one handle and give the
/// other to a coordinator.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<PhaseEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events
    pub fn events(&self) -> Vec<PhaseEvent> {
        self.events.borrow().clone()
    }

    /// Take the recorded events, leaving the log empty.
    pub fn drain(&self) -> Vec<PhaseEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    fn push(&self, event: PhaseEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl PhaseObserver for EventLog {
    fn on_siso_complete(&mut self, link: LinkId, candidates: &RankedCandidateSet) {
        self.push(PhaseEvent::SisoComplete {
            link,
            candidates: candidates.clone(),
        });
    }

    fn on_antenna_degraded(&mut self, link: LinkId, antenna: AntennaId) {
        self.push(PhaseEvent::AntennaDegraded { link, antenna });
    }

    fn on_mimo_complete(&mut self, link: LinkId, reduction: &MimoReduction) {
        self.push(PhaseEvent::MimoComplete {
            link,
            reduction: reduction.clone(),
        });
    }

    fn on_phase_failed(&mut self, link: LinkId, error: &BftError) {
        self.push(PhaseEvent::PhaseFailed {
            link,
            error: error.clone(),
        });
    }

    fn on_phase_aborted(&mut self, link: LinkId) {
        self.push(PhaseEvent::PhaseAborted { link });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_shares_state() {
        let log = EventLog::new();
        let mut handle = log.clone();
        handle.on_antenna_degraded(4, 2);
        handle.on_phase_aborted(4);

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.events()[0],
            PhaseEvent::AntennaDegraded { link: 4, antenna: 2 }
        );
        assert!(log.events().iter().all(|e| e.link() == 4));

        let drained = log.drain();
        assert_eq!(drained.len(), 2);
        assert!(log.is_empty());
    }
}
