//! OTA Shared Protocol Types
//!
//! This crate provides the twin wire contract (property and field names,
//! status and result codes, desired/reported document shapes) and the update
//! state machine shared between the device agent and its tests.

pub mod state_machine;
pub mod twin;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Twin interface identity from the service perspective.
pub const INTERFACE_ID: &str = "urn:azureiot:AzureDeviceUpdateCore:1";
pub const INTERFACE_NAME: &str = "azureDeviceUpdateCore";

/// Device to cloud (read-only) property and field names.
pub const CLIENT_PROPERTY: &str = "Client";
pub const STATE_FIELD: &str = "State";
pub const RESULT_CODE_FIELD: &str = "ResultCode";
pub const EXTENDED_RESULT_CODE_FIELD: &str = "ExtendedResultCode";

/// Cloud to device (writable) property and field names.
pub const ORCHESTRATOR_PROPERTY: &str = "Orchestrator";
pub const TARGET_VERSION_FIELD: &str = "TargetVersion";
pub const ACTION_FIELD: &str = "Action";
pub const FILES_FIELD: &str = "Files";

/// Fixed numeric codes shared with the cloud side. These are part of the
/// wire contract and must not be renumbered.
pub mod codes {
    /// Property acknowledgement: field updated successfully.
    pub const ACK_UPDATED: u16 = 200;
    /// Property acknowledgement: storage failure while copying the value.
    pub const ACK_OUT_OF_MEMORY: u16 = 500;
    /// Property acknowledgement: value is not a valid enum member.
    pub const ACK_INVALID_VALUE: u16 = 505;
    /// Property acknowledgement: value was valid but processing it failed.
    pub const ACK_PROCESSING_ERROR: u16 = 506;

    /// Result code reported when a download phase fails.
    pub const RESULT_DOWNLOAD_FAILED: i64 = 502;
    /// Result code reported when an install phase fails.
    pub const RESULT_INSTALL_FAILED: i64 = 503;
    /// Result code reported when an apply phase fails.
    pub const RESULT_APPLY_FAILED: i64 = 504;
    /// Extended result code for any simulated phase failure.
    pub const EXTENDED_RESULT_SIMULATED: i64 = 900;
    /// Result code reported while no failure is recorded.
    pub const RESULT_NONE: i64 = 0;
}

/// The update lifecycle state of the device. Exactly one value holds at any
/// time; it is the sole source of truth for which actions are legal.
///
/// Reported to the cloud as the numeric discriminant in the `State` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum UpdateState {
    Idle = 0,
    DownloadStarted = 1,
    DownloadSucceeded = 2,
    InstallStarted = 3,
    InstallSucceeded = 4,
    ApplyStarted = 5,
    Failed = 6,
}

impl Default for UpdateState {
    fn default() -> Self {
        UpdateState::Idle
    }
}

/// The last command accepted from the cloud. Transient: re-read on each
/// desired-property push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum UpdateAction {
    Download = 0,
    Install = 1,
    Apply = 2,
    Cancel = 3,
}

impl TryFrom<i64> for UpdateAction {
    type Error = InvalidAction;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UpdateAction::Download),
            1 => Ok(UpdateAction::Install),
            2 => Ok(UpdateAction::Apply),
            3 => Ok(UpdateAction::Cancel),
            other => Err(InvalidAction(other)),
        }
    }
}

impl UpdateAction {
    /// The lifecycle phase this action drives, if any. Cancel has no phase.
    pub fn phase(self) -> Option<UpdatePhase> {
        match self {
            UpdateAction::Download => Some(UpdatePhase::Download),
            UpdateAction::Install => Some(UpdatePhase::Install),
            UpdateAction::Apply => Some(UpdatePhase::Apply),
            UpdateAction::Cancel => None,
        }
    }
}

/// Rejected action value, produced before the state machine is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid update action value {0}")]
pub struct InvalidAction(pub i64);

/// Outcome of one backend invocation, decoupled from [`UpdateState`] so
/// failure handling stays uniform across phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i64)]
pub enum UpdateResult {
    DownloadFailed = 0,
    DownloadSuccessful = 1,
    InstallationFailed = 2,
    InstallationSuccessful = 3,
    ApplyFailed = 4,
    ApplySuccessful = 5,
}

impl UpdateResult {
    /// The phase this result belongs to.
    pub fn phase(self) -> UpdatePhase {
        match self {
            UpdateResult::DownloadFailed | UpdateResult::DownloadSuccessful => {
                UpdatePhase::Download
            }
            UpdateResult::InstallationFailed | UpdateResult::InstallationSuccessful => {
                UpdatePhase::Install
            }
            UpdateResult::ApplyFailed | UpdateResult::ApplySuccessful => UpdatePhase::Apply,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            UpdateResult::DownloadSuccessful
                | UpdateResult::InstallationSuccessful
                | UpdateResult::ApplySuccessful
        )
    }
}

/// One discrete step of the update lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Download,
    Install,
    Apply,
}

impl UpdatePhase {
    /// State entered when the phase begins.
    pub fn started_state(self) -> UpdateState {
        match self {
            UpdatePhase::Download => UpdateState::DownloadStarted,
            UpdatePhase::Install => UpdateState::InstallStarted,
            UpdatePhase::Apply => UpdateState::ApplyStarted,
        }
    }

    /// State entered when the phase completes successfully. A successful
    /// Apply ends the lifecycle and returns to Idle.
    pub fn succeeded_state(self) -> UpdateState {
        match self {
            UpdatePhase::Download => UpdateState::DownloadSucceeded,
            UpdatePhase::Install => UpdateState::InstallSucceeded,
            UpdatePhase::Apply => UpdateState::Idle,
        }
    }

    /// The fixed result code reported when this phase fails.
    pub fn failed_result_code(self) -> i64 {
        match self {
            UpdatePhase::Download => codes::RESULT_DOWNLOAD_FAILED,
            UpdatePhase::Install => codes::RESULT_INSTALL_FAILED,
            UpdatePhase::Apply => codes::RESULT_APPLY_FAILED,
        }
    }

    pub fn failure_kind(self) -> FailureKind {
        match self {
            UpdatePhase::Download => FailureKind::Download,
            UpdatePhase::Install => FailureKind::Install,
            UpdatePhase::Apply => FailureKind::Apply,
        }
    }
}

/// Fixed failure catalog, used for diagnostics only; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Download,
    Install,
    Apply,
    Commanded,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::Download => "Download Failure",
            FailureKind::Install => "Install Failure",
            FailureKind::Apply => "Apply Failure",
            FailureKind::Commanded => "Failure commanded",
        }
    }
}

/// A named, deterministic assignment of success/failure outcomes to each
/// phase, fixed at session creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    AllFailed,
    DownloadSuccessful,
    InstallationSuccessful,
    AllSuccessful,
}

/// Per-phase outcome table derived from a [`Scenario`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioParams {
    pub download: UpdateResult,
    pub installation: UpdateResult,
    pub application: UpdateResult,
}

impl Scenario {
    pub fn params(self) -> ScenarioParams {
        match self {
            Scenario::AllFailed => ScenarioParams {
                download: UpdateResult::DownloadFailed,
                installation: UpdateResult::InstallationFailed,
                application: UpdateResult::ApplyFailed,
            },
            Scenario::DownloadSuccessful => ScenarioParams {
                download: UpdateResult::DownloadSuccessful,
                installation: UpdateResult::InstallationFailed,
                application: UpdateResult::ApplyFailed,
            },
            Scenario::InstallationSuccessful => ScenarioParams {
                download: UpdateResult::DownloadSuccessful,
                installation: UpdateResult::InstallationSuccessful,
                application: UpdateResult::ApplyFailed,
            },
            Scenario::AllSuccessful => ScenarioParams {
                download: UpdateResult::DownloadSuccessful,
                installation: UpdateResult::InstallationSuccessful,
                application: UpdateResult::ApplySuccessful,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_valid_values() {
        assert_eq!(UpdateAction::try_from(0), Ok(UpdateAction::Download));
        assert_eq!(UpdateAction::try_from(3), Ok(UpdateAction::Cancel));
    }

    #[test]
    fn test_action_from_out_of_range_values() {
        assert_eq!(UpdateAction::try_from(-1), Err(InvalidAction(-1)));
        assert_eq!(UpdateAction::try_from(4), Err(InvalidAction(4)));
        assert_eq!(UpdateAction::try_from(99), Err(InvalidAction(99)));
    }

    #[test]
    fn test_result_phase_and_success() {
        assert_eq!(UpdateResult::DownloadFailed.phase(), UpdatePhase::Download);
        assert_eq!(
            UpdateResult::InstallationSuccessful.phase(),
            UpdatePhase::Install
        );
        assert!(UpdateResult::ApplySuccessful.is_success());
        assert!(!UpdateResult::ApplyFailed.is_success());
    }

    #[test]
    fn test_phase_state_mapping() {
        assert_eq!(
            UpdatePhase::Download.started_state(),
            UpdateState::DownloadStarted
        );
        assert_eq!(
            UpdatePhase::Install.succeeded_state(),
            UpdateState::InstallSucceeded
        );
        // Apply completes the lifecycle.
        assert_eq!(UpdatePhase::Apply.succeeded_state(), UpdateState::Idle);
    }

    #[test]
    fn test_failed_result_codes() {
        assert_eq!(UpdatePhase::Download.failed_result_code(), 502);
        assert_eq!(UpdatePhase::Install.failed_result_code(), 503);
        assert_eq!(UpdatePhase::Apply.failed_result_code(), 504);
    }

    #[test]
    fn test_scenario_outcome_tables() {
        let params = Scenario::AllSuccessful.params();
        assert!(params.download.is_success());
        assert!(params.installation.is_success());
        assert!(params.application.is_success());

        let params = Scenario::DownloadSuccessful.params();
        assert!(params.download.is_success());
        assert!(!params.installation.is_success());
        assert!(!params.application.is_success());

        let params = Scenario::AllFailed.params();
        assert!(!params.download.is_success());
    }

    #[test]
    fn test_failure_labels() {
        assert_eq!(FailureKind::Download.label(), "Download Failure");
        assert_eq!(FailureKind::Commanded.label(), "Failure commanded");
    }

    #[test]
    fn test_state_wire_discriminants() {
        assert_eq!(UpdateState::Idle as i64, 0);
        assert_eq!(UpdateState::Failed as i64, 6);
        assert_eq!(
            serde_json::to_value(UpdateState::DownloadSucceeded).unwrap(),
            serde_json::json!(2)
        );
    }
}
