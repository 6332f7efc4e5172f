//! Twin session lifecycle
//!
//! One session per device. All registration events and desired-property
//! pushes flow through a single mpsc queue into one worker task that owns
//! the orchestrator, so a Download and a concurrent Cancel can never
//! interleave. Closing the session drops the queue and awaits the worker,
//! which guarantees in-flight events drain before owned state is released.

use ota_shared::twin::{PropertyUpdate, RegistrationStatus};
use ota_shared::Scenario;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::backend::{SimulatedBackend, UpdateBackend};
use crate::device_info::DeviceInfoClient;
use crate::orchestrator::UpdateOrchestrator;
use crate::properties::PropertyAdapter;
use crate::reports::Reporter;
use crate::twin::TwinTransport;

/// Typed events delivered to the session worker, replacing the transport's
/// opaque-context callbacks.
#[derive(Debug)]
pub enum SessionEvent {
    Registration(RegistrationStatus),
    Desired(PropertyUpdate),
}

const EVENT_QUEUE_DEPTH: usize = 32;

/// Handle to one device's update session.
pub struct UpdateSession {
    event_tx: mpsc::Sender<SessionEvent>,
    worker: JoinHandle<()>,
}

impl UpdateSession {
    /// Create a session simulating the given scenario.
    pub fn create(
        scenario: Scenario,
        transport: Arc<dyn TwinTransport>,
        device_info: Arc<dyn DeviceInfoClient>,
    ) -> Self {
        Self::with_backend(Box::new(SimulatedBackend::new(scenario)), transport, device_info)
    }

    /// Create a session over an explicit backend implementation.
    pub fn with_backend(
        backend: Box<dyn UpdateBackend>,
        transport: Arc<dyn TwinTransport>,
        device_info: Arc<dyn DeviceInfoClient>,
    ) -> Self {
        let reporter = Reporter::spawn(transport);
        let orchestrator = UpdateOrchestrator::new(backend, reporter.clone(), device_info);
        let adapter = PropertyAdapter::new(reporter);

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let worker = tokio::spawn(async move {
            let mut worker = SessionWorker::new(orchestrator, adapter);
            worker.run(event_rx).await;
        });

        Self { event_tx, worker }
    }

    /// The sender the transport delivers its callbacks through.
    pub fn events(&self) -> mpsc::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    /// Tear down: stop accepting events, then block until the worker has
    /// drained everything in flight.
    pub async fn close(self) {
        drop(self.event_tx);
        if let Err(e) = self.worker.await {
            error!(error = %e, "session worker terminated abnormally");
        }
        info!("session closed");
    }
}

/// Owns all mutable per-device state; runs on exactly one task.
struct SessionWorker {
    orchestrator: UpdateOrchestrator,
    adapter: PropertyAdapter,
    registered: bool,
    unregistering: bool,
}

impl SessionWorker {
    fn new(orchestrator: UpdateOrchestrator, adapter: PropertyAdapter) -> Self {
        Self {
            orchestrator,
            adapter,
            registered: false,
            unregistering: false,
        }
    }

    async fn run(&mut self, mut event_rx: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = event_rx.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Registration(RegistrationStatus::Ok) => {
                info!("interface successfully registered");
                self.orchestrator.announce_initial();
                self.registered = true;
            }
            SessionEvent::Registration(RegistrationStatus::InterfaceUnregistering) => {
                // Terminal: no further transport calls are permitted.
                info!("interface unregistering");
                self.unregistering = true;
            }
            SessionEvent::Registration(RegistrationStatus::Error(code)) => {
                error!(code, "interface registration failed");
            }
            SessionEvent::Desired(update) => {
                if self.unregistering {
                    warn!(
                        property = update.property_name,
                        "dropping desired update received while unregistering"
                    );
                    return;
                }
                if !self.registered {
                    warn!(
                        property = update.property_name,
                        "desired update received before registration completed"
                    );
                }
                self.adapter
                    .handle_desired(&update, &mut self.orchestrator)
                    .await;
            }
        }
    }
}
