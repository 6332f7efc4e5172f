//! Update orchestrator - drives the state machine against the backend
//!
//! Each accepted action runs the same cycle: validate the transition, report
//! the `*Started` state before the backend call so observers see partial
//! progress, await the backend, then either advance and report the next
//! state or move to `Failed` and report the combined failure document.

use anyhow::Result;
use ota_shared::state_machine::{PhaseCompletion, UpdateStateMachine};
use ota_shared::twin::PropertyReport;
use ota_shared::{
    codes, UpdateAction, UpdatePhase, UpdateState, EXTENDED_RESULT_CODE_FIELD, RESULT_CODE_FIELD,
    STATE_FIELD,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::backend::UpdateBackend;
use crate::device_info::DeviceInfoClient;
use crate::reports::ReportSink;

/// Mutable per-device context. One instance per session, owned by the
/// session worker; never shared across devices.
#[derive(Debug, Default)]
pub struct ApplicationState {
    pub machine: UpdateStateMachine,
    pub action: Option<UpdateAction>,
    pub target_version: Option<String>,
    pub files: Option<String>,
}

impl ApplicationState {
    /// Download is only legal once the cloud has pushed both manifest
    /// fields.
    pub fn manifest_ready(&self) -> bool {
        self.target_version.is_some() && self.files.is_some()
    }
}

/// Owns the update lifecycle for one device.
pub struct UpdateOrchestrator {
    state: ApplicationState,
    backend: Box<dyn UpdateBackend>,
    reports: Arc<dyn ReportSink>,
    device_info: Arc<dyn DeviceInfoClient>,
}

impl UpdateOrchestrator {
    pub fn new(
        backend: Box<dyn UpdateBackend>,
        reports: Arc<dyn ReportSink>,
        device_info: Arc<dyn DeviceInfoClient>,
    ) -> Self {
        Self {
            state: ApplicationState::default(),
            backend,
            reports,
            device_info,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state.machine.state()
    }

    pub fn application_state(&self) -> &ApplicationState {
        &self.state
    }

    /// Store the desired target version, replacing any prior value.
    pub fn set_target_version(&mut self, version: String) {
        self.state.target_version = Some(version);
    }

    /// Store the serialized file manifest, replacing any prior value.
    pub fn set_files(&mut self, files: String) {
        self.state.files = Some(files);
    }

    /// Announce the initial reported state after interface registration:
    /// one combined document with a zeroed result-code pair.
    pub fn announce_initial(&self) {
        self.submit(PropertyReport::client(json!({
            STATE_FIELD: UpdateState::Idle,
            RESULT_CODE_FIELD: codes::RESULT_NONE,
            EXTENDED_RESULT_CODE_FIELD: codes::RESULT_NONE,
        })));
    }

    /// Run one validated action through the state machine. An error means
    /// the action could not be processed (precondition violation or an
    /// out-of-contract backend result); backend phase failures are a normal
    /// outcome and return `Ok` after the `Failed` state is reported.
    pub async fn process_action(&mut self, action: UpdateAction) -> Result<()> {
        self.state.action = Some(action);
        info!(state = ?self.state(), ?action, "processing action");

        match action.phase() {
            Some(phase) => self.run_phase(phase).await,
            None => {
                let state = self.state.machine.cancel();
                self.report_state(state);
                Ok(())
            }
        }
    }

    async fn run_phase(&mut self, phase: UpdatePhase) -> Result<()> {
        let started = self
            .state
            .machine
            .begin_phase(phase, self.state.manifest_ready())
            .map_err(|e| {
                error!(
                    state = ?self.state(),
                    target_version = self.state.target_version.as_deref(),
                    files = self.state.files.as_deref(),
                    "{e}"
                );
                e
            })?;

        // Partial progress is visible before the backend call returns.
        self.report_state(started);

        if phase == UpdatePhase::Download {
            info!(
                target_version = self.state.target_version.as_deref(),
                files = self.state.files.as_deref(),
                "starting download"
            );
        }

        let result = match phase {
            UpdatePhase::Download => self.backend.download().await,
            UpdatePhase::Install => self.backend.install().await,
            UpdatePhase::Apply => self.backend.apply().await,
        };

        match self.state.machine.finish_phase(phase, result)? {
            PhaseCompletion::Advanced(next) => {
                info!(state = ?next, "phase completed");
                self.report_state(next);

                if phase == UpdatePhase::Apply {
                    if let Some(version) = self.state.target_version.as_deref() {
                        info!(version, "update applied, notifying device info");
                        self.device_info.notify_version_applied(version);
                    }
                }
                Ok(())
            }
            PhaseCompletion::Failed {
                result_code,
                extended_result_code,
            } => {
                error!(
                    failure = phase.failure_kind().label(),
                    result_code, extended_result_code, "phase failed"
                );
                self.submit(PropertyReport::client(json!({
                    STATE_FIELD: UpdateState::Failed,
                    RESULT_CODE_FIELD: result_code,
                    EXTENDED_RESULT_CODE_FIELD: extended_result_code,
                })));
                Ok(())
            }
        }
    }

    fn report_state(&self, state: UpdateState) {
        self.submit(PropertyReport::client(json!({ STATE_FIELD: state })));
    }

    fn submit(&self, report: PropertyReport) {
        // Correctness does not depend on delivery; a failed submit is only
        // logged.
        if let Err(e) = self.reports.submit(report) {
            error!(error = %e, "failed to queue report");
        }
    }
}
