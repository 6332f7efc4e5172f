//! Update execution backend
//!
//! The state machine is decoupled from how a phase is actually performed:
//! anything that can download, install, and apply an update and answer with
//! an [`UpdateResult`] per phase can sit behind [`UpdateBackend`]. The
//! simulator drives scripted outcomes with fixed delays; a production
//! implementation replaces it while keeping the same three-outcome contract.

mod simulator;

pub use simulator::SimulatedBackend;

use async_trait::async_trait;
use ota_shared::UpdateResult;

/// One operation per update phase. Each call blocks (from the caller's
/// perspective) until the phase finishes and reports its outcome.
#[async_trait]
pub trait UpdateBackend: Send + Sync {
    async fn download(&self) -> UpdateResult;
    async fn install(&self) -> UpdateResult;
    async fn apply(&self) -> UpdateResult;
}
