//! Twin transport seam
//!
//! The agent never talks to a broker directly; it reports through the
//! [`TwinTransport`] trait and receives registration/desired events through
//! the session's event queue. Production backends implement the trait over a
//! real property-sync channel; [`loopback::LoopbackTwin`] provides the
//! in-process pair used by the demo binary and tests.

mod loopback;

pub use loopback::LoopbackTwin;

use anyhow::Result;
use async_trait::async_trait;
use ota_shared::twin::PropertyReport;

/// Outbound half of the twin channel. `report` queues one reported-property
/// document for delivery and returns once it is accepted by the transport;
/// delivery itself is asynchronous and best-effort.
#[async_trait]
pub trait TwinTransport: Send + Sync {
    async fn report(&self, report: PropertyReport) -> Result<()>;
}
