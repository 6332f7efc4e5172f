//! Property sync adapter
//!
//! Inbound direction of the twin channel: a desired-property push carries an
//! opaque JSON body; the adapter inspects the optional fields it knows about
//! (`TargetVersion`, `Files`, `Action`) and runs a dedicated handler for
//! each field that is present. Every handled field is reported back with an
//! acknowledgement carrying a status code and the desired version it
//! responds to. Unknown property names have no reverse channel and are
//! dropped with a log line.

use ota_shared::twin::{DesiredOrchestrator, PropertyAck, PropertyReport, PropertyUpdate};
use ota_shared::{
    codes, UpdateAction, ACTION_FIELD, FILES_FIELD, ORCHESTRATOR_PROPERTY, TARGET_VERSION_FIELD,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::orchestrator::UpdateOrchestrator;
use crate::reports::ReportSink;

pub struct PropertyAdapter {
    reports: Arc<dyn ReportSink>,
}

impl PropertyAdapter {
    pub fn new(reports: Arc<dyn ReportSink>) -> Self {
        Self { reports }
    }

    /// Dispatch one desired-property push. Field handlers run for exactly
    /// the fields present in the body; a malformed body dispatches none.
    pub async fn handle_desired(
        &self,
        update: &PropertyUpdate,
        orchestrator: &mut UpdateOrchestrator,
    ) {
        if update.property_name != ORCHESTRATOR_PROPERTY {
            error!(
                property = update.property_name,
                "property is not associated with this interface, dropping"
            );
            return;
        }

        info!(
            desired_version = update.desired_version,
            body = %String::from_utf8_lossy(&update.desired_json),
            "desired property update received"
        );

        let desired: DesiredOrchestrator = match serde_json::from_slice(&update.desired_json) {
            Ok(desired) => desired,
            Err(e) => {
                error!(error = %e, "failed to parse desired property body");
                return;
            }
        };

        if let Some(version) = desired.target_version.as_deref() {
            self.handle_target_version(version, update.desired_version, orchestrator);
        }

        if let Some(files) = &desired.files {
            self.handle_files(files, update.desired_version, orchestrator);
        }

        if let Some(action) = &desired.action {
            self.handle_action(action, update.desired_version, orchestrator)
                .await;
        }
    }

    fn handle_target_version(
        &self,
        version: &str,
        desired_version: i64,
        orchestrator: &mut UpdateOrchestrator,
    ) {
        info!(target_version = version, "TargetVersion field updated");
        orchestrator.set_target_version(version.to_owned());

        self.respond(
            json!({ TARGET_VERSION_FIELD: version }),
            PropertyAck::updated(desired_version),
        );
    }

    fn handle_files(
        &self,
        files: &Value,
        desired_version: i64,
        orchestrator: &mut UpdateOrchestrator,
    ) {
        // Stored by serialized copy; the manifest's nested shape is opaque
        // to the agent.
        let serialized = files.to_string();
        info!(files = %serialized, "Files field updated");
        orchestrator.set_files(serialized);

        self.respond(
            json!({ FILES_FIELD: files }),
            PropertyAck::updated(desired_version),
        );
    }

    async fn handle_action(
        &self,
        raw: &serde_json::Number,
        desired_version: i64,
        orchestrator: &mut UpdateOrchestrator,
    ) {
        info!(action = %raw, "Action field updated");

        // Range-validate before the state machine sees the value; a bad
        // value never mutates the stored action.
        let ack = match raw.as_i64().map(UpdateAction::try_from) {
            Some(Ok(action)) => match orchestrator.process_action(action).await {
                Ok(()) => PropertyAck::updated(desired_version),
                Err(e) => {
                    error!(?action, error = %e, "error processing Action");
                    PropertyAck::failed(
                        desired_version,
                        codes::ACK_PROCESSING_ERROR,
                        "Error processing Action",
                    )
                }
            },
            Some(Err(_)) | None => {
                error!(action = %raw, "invalid Action value");
                PropertyAck::failed(desired_version, codes::ACK_INVALID_VALUE, "Invalid Action")
            }
        };

        self.respond(json!({ ACTION_FIELD: raw.clone() }), ack);
    }

    fn respond(&self, body: Value, ack: PropertyAck) {
        if let Err(e) = self
            .reports
            .submit(PropertyReport::orchestrator(body, ack))
        {
            error!(error = %e, "failed to queue property response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;
    use crate::testing::{RecordingDeviceInfo, RecordingSink};
    use ota_shared::{Scenario, UpdateState, CLIENT_PROPERTY};
    use std::time::Duration;

    struct Fixture {
        adapter: PropertyAdapter,
        orchestrator: UpdateOrchestrator,
        sink: Arc<RecordingSink>,
        device_info: Arc<RecordingDeviceInfo>,
    }

    fn fixture(scenario: Scenario) -> Fixture {
        let sink = Arc::new(RecordingSink::default());
        let device_info = Arc::new(RecordingDeviceInfo::default());
        let backend = Box::new(SimulatedBackend::with_time_unit(scenario, Duration::ZERO));
        Fixture {
            adapter: PropertyAdapter::new(sink.clone()),
            orchestrator: UpdateOrchestrator::new(backend, sink.clone(), device_info.clone()),
            sink,
            device_info,
        }
    }

    fn desired(body: Value, version: i64) -> PropertyUpdate {
        PropertyUpdate::new(ORCHESTRATOR_PROPERTY, &body, version)
    }

    #[tokio::test]
    async fn test_all_fields_dispatch_once_each() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = desired(
            json!({
                "TargetVersion": "11.0.1",
                "Files": {"f1": "payload.swu"},
                "Action": 3,
            }),
            7,
        );

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        let state = f.orchestrator.application_state();
        assert_eq!(state.target_version.as_deref(), Some("11.0.1"));
        assert_eq!(state.files.as_deref(), Some(r#"{"f1":"payload.swu"}"#));
        assert_eq!(state.action, Some(UpdateAction::Cancel));

        // One acknowledged response per field, plus the Cancel state report.
        let acked: Vec<_> = f
            .sink
            .reports()
            .into_iter()
            .filter(|r| r.ack.is_some())
            .collect();
        assert_eq!(acked.len(), 3);
        for report in &acked {
            let ack = report.ack.as_ref().unwrap();
            assert_eq!(ack.status_code, codes::ACK_UPDATED);
            assert_eq!(ack.responds_to_desired_version, 7);
        }
        assert_eq!(acked[0].body, json!({"TargetVersion": "11.0.1"}));
        assert_eq!(acked[1].body, json!({"Files": {"f1": "payload.swu"}}));
        assert_eq!(acked[2].body, json!({"Action": 3}));
    }

    #[tokio::test]
    async fn test_empty_body_dispatches_nothing() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = desired(json!({}), 1);

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        assert!(f.sink.reports().is_empty());
        assert!(f.orchestrator.application_state().target_version.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_dispatches_nothing() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = PropertyUpdate {
            property_name: ORCHESTRATOR_PROPERTY.into(),
            desired_json: bytes::Bytes::from_static(b"{not json"),
            desired_version: 1,
        };

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        assert!(f.sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_property_dropped_without_response() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = PropertyUpdate::new("Telemetry", &json!({"Action": 0}), 1);

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        assert!(f.sink.reports().is_empty());
        assert!(f.orchestrator.application_state().action.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_action_acks_505() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = desired(json!({"Action": 99}), 4);

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        // Action left unchanged, state machine untouched.
        assert!(f.orchestrator.application_state().action.is_none());
        assert_eq!(f.orchestrator.state(), UpdateState::Idle);

        let reports = f.sink.reports();
        assert_eq!(reports.len(), 1);
        let ack = reports[0].ack.as_ref().unwrap();
        assert_eq!(ack.status_code, codes::ACK_INVALID_VALUE);
        assert_eq!(ack.description, "Invalid Action");
        assert_eq!(ack.responds_to_desired_version, 4);
    }

    #[tokio::test]
    async fn test_non_integer_action_acks_505() {
        let mut f = fixture(Scenario::AllSuccessful);
        let update = desired(json!({"Action": 1.5}), 2);

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        let reports = f.sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(
            reports[0].ack.as_ref().unwrap().status_code,
            codes::ACK_INVALID_VALUE
        );
    }

    #[tokio::test]
    async fn test_state_machine_rejection_acks_506() {
        let mut f = fixture(Scenario::AllSuccessful);
        // Install straight from Idle: syntactically valid, semantically not.
        let update = desired(json!({"Action": 1}), 9);

        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        assert_eq!(f.orchestrator.state(), UpdateState::Idle);
        let reports = f.sink.reports();
        assert_eq!(reports.len(), 1);
        let ack = reports[0].ack.as_ref().unwrap();
        assert_eq!(ack.status_code, codes::ACK_PROCESSING_ERROR);
        assert_eq!(ack.description, "Error processing Action");
    }

    #[tokio::test]
    async fn test_full_update_via_desired_documents() {
        let mut f = fixture(Scenario::AllSuccessful);

        let manifest = desired(
            json!({"TargetVersion": "2.4.0", "Files": {"f": "a"}}),
            1,
        );
        f.adapter
            .handle_desired(&manifest, &mut f.orchestrator)
            .await;

        for (version, action) in [(2, 0i64), (3, 1), (4, 2)] {
            let update = desired(json!({ "Action": action }), version);
            f.adapter
                .handle_desired(&update, &mut f.orchestrator)
                .await;
        }

        assert_eq!(f.orchestrator.state(), UpdateState::Idle);
        assert_eq!(f.device_info.versions(), vec!["2.4.0".to_string()]);

        // Every action acked 200 against its own desired version.
        let action_acks: Vec<_> = f
            .sink
            .reports()
            .into_iter()
            .filter(|r| r.body.get(ACTION_FIELD).is_some())
            .map(|r| r.ack.unwrap())
            .collect();
        assert_eq!(action_acks.len(), 3);
        for (ack, expected_version) in action_acks.iter().zip([2i64, 3, 4]) {
            assert_eq!(ack.status_code, codes::ACK_UPDATED);
            assert_eq!(ack.responds_to_desired_version, expected_version);
        }

        // State reports went to the read-only Client property.
        assert!(f
            .sink
            .reports()
            .iter()
            .filter(|r| r.ack.is_none())
            .all(|r| r.property == CLIENT_PROPERTY));
    }

    #[tokio::test]
    async fn test_backend_failure_still_acks_200() {
        let mut f = fixture(Scenario::AllFailed);

        let manifest = desired(
            json!({"TargetVersion": "2.4.0", "Files": {"f": "a"}}),
            1,
        );
        f.adapter
            .handle_desired(&manifest, &mut f.orchestrator)
            .await;
        f.sink.clear();

        let update = desired(json!({"Action": 0}), 2);
        f.adapter
            .handle_desired(&update, &mut f.orchestrator)
            .await;

        // The download failed, but the Action field itself was processed:
        // the device lands in Failed and the ack is still a 200.
        assert_eq!(f.orchestrator.state(), UpdateState::Failed);
        let ack_report = f
            .sink
            .reports()
            .into_iter()
            .find(|r| r.ack.is_some())
            .unwrap();
        assert_eq!(
            ack_report.ack.unwrap().status_code,
            codes::ACK_UPDATED
        );
    }

    #[tokio::test]
    async fn test_replacing_target_version() {
        let mut f = fixture(Scenario::AllSuccessful);

        for (version, value) in [(1, "1.0.0"), (2, "1.0.1")] {
            let update = desired(json!({ "TargetVersion": value }), version);
            f.adapter
                .handle_desired(&update, &mut f.orchestrator)
                .await;
        }

        assert_eq!(
            f.orchestrator.application_state().target_version.as_deref(),
            Some("1.0.1")
        );
    }
}
