//! Update State Machine
//!
//! Defines the closed set of legal update lifecycle transitions. The machine
//! is pure: it validates and records transitions, while the agent drives the
//! backend and reports state around it.

use crate::{codes, UpdatePhase, UpdateResult, UpdateState};
use thiserror::Error;

/// A transition attempt that was rejected. The machine state is never
/// mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The requested phase is not legal from the current state.
    #[error("cannot {phase:?} while in state {from:?}")]
    InvalidState { from: UpdateState, phase: UpdatePhase },

    /// Download requested before both TargetVersion and Files were set.
    #[error("download requires TargetVersion and Files to be set")]
    ManifestIncomplete,

    /// The backend returned a result belonging to a different phase. This is
    /// a processing error, not a lifecycle outcome.
    #[error("unexpected backend result {result:?} while finishing {phase:?}")]
    UnexpectedResult { phase: UpdatePhase, result: UpdateResult },
}

/// How a phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCompletion {
    /// The phase succeeded and the machine advanced to the contained state.
    Advanced(UpdateState),
    /// The phase failed; the machine is now in [`UpdateState::Failed`] and
    /// the fixed code pair identifies which phase failed.
    Failed {
        result_code: i64,
        extended_result_code: i64,
    },
}

/// The update state machine for one device. Single-threaded with respect to
/// event delivery; the session worker owns it for the session lifetime.
#[derive(Debug, Default)]
pub struct UpdateStateMachine {
    state: UpdateState,
}

impl UpdateStateMachine {
    /// Create a new state machine in Idle state.
    pub fn new() -> Self {
        Self {
            state: UpdateState::Idle,
        }
    }

    /// Get current state.
    pub fn state(&self) -> UpdateState {
        self.state
    }

    /// Attempt to begin a phase, moving to its `*Started` state.
    ///
    /// `manifest_ready` must be true for Download: the cloud has to push
    /// TargetVersion and Files before a download is legal.
    pub fn begin_phase(
        &mut self,
        phase: UpdatePhase,
        manifest_ready: bool,
    ) -> Result<UpdateState, TransitionError> {
        let required = match phase {
            UpdatePhase::Download => UpdateState::Idle,
            UpdatePhase::Install => UpdateState::DownloadSucceeded,
            UpdatePhase::Apply => UpdateState::InstallSucceeded,
        };

        if self.state != required {
            return Err(TransitionError::InvalidState {
                from: self.state,
                phase,
            });
        }

        if phase == UpdatePhase::Download && !manifest_ready {
            return Err(TransitionError::ManifestIncomplete);
        }

        self.state = phase.started_state();
        Ok(self.state)
    }

    /// Record the backend outcome for a running phase.
    ///
    /// On success the machine advances to the phase's succeeded state (Idle
    /// for Apply). On failure it moves to `Failed` and returns the fixed
    /// result code pair. A result from the wrong phase leaves the state
    /// unchanged and is reported as an error to the caller.
    pub fn finish_phase(
        &mut self,
        phase: UpdatePhase,
        result: UpdateResult,
    ) -> Result<PhaseCompletion, TransitionError> {
        if result.phase() != phase {
            return Err(TransitionError::UnexpectedResult { phase, result });
        }

        if result.is_success() {
            self.state = phase.succeeded_state();
            Ok(PhaseCompletion::Advanced(self.state))
        } else {
            self.state = UpdateState::Failed;
            Ok(PhaseCompletion::Failed {
                result_code: phase.failed_result_code(),
                extended_result_code: codes::EXTENDED_RESULT_SIMULATED,
            })
        }
    }

    /// Cancel is unconditional: regardless of the current state, including
    /// `Failed`, the machine returns to Idle. This is the only escape from
    /// the `Failed` state.
    pub fn cancel(&mut self) -> UpdateState {
        self.state = UpdateState::Idle;
        self.state
    }
}

/// Check if a transition from one state to another is generally valid.
pub fn is_valid_transition(from: UpdateState, to: UpdateState) -> bool {
    use UpdateState::*;

    match (from, to) {
        // Same state is always valid
        (a, b) if a == b => true,

        // Cancel returns to Idle from anywhere
        (_, Idle) => true,

        // Failure can be reached from any running phase
        (DownloadStarted | InstallStarted | ApplyStarted, Failed) => true,

        // The happy path
        (Idle, DownloadStarted) => true,
        (DownloadStarted, DownloadSucceeded) => true,
        (DownloadSucceeded, InstallStarted) => true,
        (InstallStarted, InstallSucceeded) => true,
        (InstallSucceeded, ApplyStarted) => true,

        _ => false,
    }
}
