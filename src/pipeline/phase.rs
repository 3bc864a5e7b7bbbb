//! Run lifecycle state machine
//!
//! ```text
//! Idle --Start--> Processing --InputDrained--> Merging --Finish--> Done(Complete)
//!   |                 |                           |
//!   +-----Cancel------+-----------Cancel----------+--> Cancelling --Finish--> Done(Cancelled)
//! ```
//!
//! `Processing` covers reading and working, which run in parallel. Repeating
//! `Cancel` while already cancelling is allowed. `Done` is terminal.

use crate::aggregate::RunStatus;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Processing,
    Merging,
    Cancelling,
    Done(RunStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    Start,
    InputDrained,
    Cancel,
    Finish,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("Invalid transition {transition:?} from {phase:?}")]
    InvalidTransition {
        phase: RunPhase,
        transition: PhaseTransition,
    },
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done(_))
    }
}

pub fn apply_transition(
    phase: RunPhase,
    transition: PhaseTransition,
) -> Result<RunPhase, PhaseError> {
    use PhaseTransition::*;
    use RunPhase::*;

    match (phase, transition) {
        (Idle, Start) => Ok(Processing),
        (Processing, InputDrained) => Ok(Merging),
        (Merging, Finish) => Ok(Done(RunStatus::Complete)),
        (Idle | Processing | Merging | Cancelling, Cancel) => Ok(Cancelling),
        (Cancelling, Finish) => Ok(Done(RunStatus::Cancelled)),
        (phase, transition) => Err(PhaseError::InvalidTransition { phase, transition }),
    }
}

/// Current phase of a run, with every transition logged
#[derive(Debug)]
pub struct PhaseTracker {
    phase: RunPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, transition: PhaseTransition) -> Result<RunPhase, PhaseError> {
        let next = apply_transition(self.phase, transition)?;
        tracing::debug!(from = ?self.phase, to = ?next, "Run phase transition");
        self.phase = next;
        Ok(next)
    }
}
