//! Outbound report queue
//!
//! Reported-property writes are fire-and-forget: the state machine submits a
//! report and proceeds without waiting for delivery. [`Reporter`] implements
//! that as a bounded best-effort queue in front of the transport; a worker
//! task forwards each report and logs the completion with the field name as
//! context. Transport backpressure never reaches the state machine.

use anyhow::{anyhow, Result};
use ota_shared::twin::PropertyReport;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::twin::TwinTransport;

/// Where the orchestrator and property adapter submit reports.
/// `submit` means "queued", not "delivered".
pub trait ReportSink: Send + Sync {
    fn submit(&self, report: PropertyReport) -> Result<()>;
}

/// Capacity of the outbound queue. Overflow drops the report with a log
/// line; reporting is best-effort by contract.
const OUTBOUND_QUEUE_DEPTH: usize = 32;

/// Bounded queue plus delivery worker in front of a [`TwinTransport`].
pub struct Reporter {
    outbound_tx: mpsc::Sender<PropertyReport>,
}

impl Reporter {
    /// Spawn the delivery worker and return the queue handle.
    pub fn spawn(transport: Arc<dyn TwinTransport>) -> Arc<Self> {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);

        tokio::spawn(async move {
            delivery_loop(transport, outbound_rx).await;
        });

        Arc::new(Self { outbound_tx })
    }
}

impl ReportSink for Reporter {
    fn submit(&self, report: PropertyReport) -> Result<()> {
        match self.outbound_tx.try_send(report) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(report)) => {
                // Best-effort: drop, but make it visible.
                warn!(
                    field = report.field_name(),
                    "outbound report queue full, dropping report"
                );
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(anyhow!("report worker stopped")),
        }
    }
}

async fn delivery_loop(
    transport: Arc<dyn TwinTransport>,
    mut outbound_rx: mpsc::Receiver<PropertyReport>,
) {
    while let Some(report) = outbound_rx.recv().await {
        let field = report.field_name().to_owned();
        let property = report.property;

        match transport.report(report).await {
            Ok(()) => {
                info!(property, field, "report delivered");
            }
            Err(e) => {
                error!(property, field, error = %e, "report delivery failed");
            }
        }
    }
}
