//! In-process twin transport used by the demo binary and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ota_shared::twin::PropertyReport;
use tokio::sync::mpsc;

use super::TwinTransport;

/// Loopback transport: reports submitted by the device side surface on a
/// channel the "cloud side" holds.
pub struct LoopbackTwin {
    reports: mpsc::UnboundedSender<PropertyReport>,
}

impl LoopbackTwin {
    /// Create the device-side transport handle and the cloud-side receiver.
    pub fn pair() -> (std::sync::Arc<Self>, mpsc::UnboundedReceiver<PropertyReport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (std::sync::Arc::new(Self { reports: tx }), rx)
    }
}

#[async_trait]
impl TwinTransport for LoopbackTwin {
    async fn report(&self, report: PropertyReport) -> Result<()> {
        self.reports
            .send(report)
            .map_err(|_| anyhow!("twin channel closed"))
    }
}
