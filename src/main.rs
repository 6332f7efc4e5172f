mod backend;
mod device_info;
mod orchestrator;
mod properties;
mod reports;
mod session;
#[cfg(test)]
mod testing;
mod twin;

use device_info::LoggingDeviceInfo;
use ota_shared::twin::{PropertyUpdate, RegistrationStatus};
use ota_shared::{Scenario, ORCHESTRATOR_PROPERTY};
use serde_json::json;
use session::{SessionEvent, UpdateSession};
use std::sync::Arc;
use twin::LoopbackTwin;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let scenario = scenario_from_args();
    info!(?scenario, "update agent starting");

    let (transport, mut reported) = LoopbackTwin::pair();
    let session = UpdateSession::create(scenario, transport, Arc::new(LoggingDeviceInfo));
    let events = session.events();

    // The "cloud side": print every report the device publishes.
    let cloud = tokio::spawn(async move {
        while let Some(report) = reported.recv().await {
            match &report.ack {
                Some(ack) => info!(
                    property = report.property,
                    body = %report.body,
                    status = ack.status_code,
                    responds_to = ack.responds_to_desired_version,
                    "cloud received response"
                ),
                None => info!(
                    property = report.property,
                    body = %report.body,
                    "cloud received report"
                ),
            }
        }
    });

    events
        .send(SessionEvent::Registration(RegistrationStatus::Ok))
        .await?;

    // Scripted desired sequence: manifest first, then the three actions.
    let documents = [
        json!({
            "TargetVersion": "11.0.1",
            "Files": {"f4509f0a": "host/payload-11.0.1.swu"},
        }),
        json!({"Action": 0}),
        json!({"Action": 1}),
        json!({"Action": 2}),
    ];

    for (i, body) in documents.iter().enumerate() {
        let desired_version = i as i64 + 1;
        events
            .send(SessionEvent::Desired(PropertyUpdate::new(
                ORCHESTRATOR_PROPERTY,
                body,
                desired_version,
            )))
            .await?;
    }

    drop(events);
    session.close().await;

    // The delivery worker drains and drops the transport once the session
    // is gone, which ends the cloud task naturally.
    cloud.await?;

    info!("update agent finished");
    Ok(())
}

fn scenario_from_args() -> Scenario {
    match std::env::args().nth(1).as_deref() {
        Some("all-failed") => Scenario::AllFailed,
        Some("download-successful") => Scenario::DownloadSuccessful,
        Some("installation-successful") => Scenario::InstallationSuccessful,
        Some("all-successful") | None => Scenario::AllSuccessful,
        Some(other) => {
            warn!(scenario = other, "unknown scenario, using all-successful");
            Scenario::AllSuccessful
        }
    }
}
