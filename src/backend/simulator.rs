//! Scripted update backend with fixed per-phase delays.

use async_trait::async_trait;
use ota_shared::{Scenario, ScenarioParams, UpdateResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use super::UpdateBackend;

// Simulated work, in time units (seconds by default).
const DOWNLOAD_UNITS: u32 = 5;
const INSTALL_UNITS: u32 = 10;
const APPLY_UNITS: u32 = 5;

/// Backend that waits out each phase and returns the outcome fixed at
/// construction time from a named scenario.
pub struct SimulatedBackend {
    params: ScenarioParams,
    time_unit: Duration,
}

impl SimulatedBackend {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_time_unit(scenario, Duration::from_secs(1))
    }

    /// Tests shrink the time unit to zero to run phases instantly.
    pub fn with_time_unit(scenario: Scenario, time_unit: Duration) -> Self {
        Self {
            params: scenario.params(),
            time_unit,
        }
    }

    async fn run_phase(&self, name: &str, units: u32, outcome: UpdateResult) -> UpdateResult {
        info!("{name} started");
        sleep(self.time_unit * units).await;
        if outcome.is_success() {
            info!("{name} successful");
        } else {
            error!("{name} failed");
        }
        outcome
    }
}

#[async_trait]
impl UpdateBackend for SimulatedBackend {
    async fn download(&self) -> UpdateResult {
        self.run_phase("download", DOWNLOAD_UNITS, self.params.download)
            .await
    }

    async fn install(&self) -> UpdateResult {
        self.run_phase("installation", INSTALL_UNITS, self.params.installation)
            .await
    }

    async fn apply(&self) -> UpdateResult {
        self.run_phase("apply", APPLY_UNITS, self.params.application)
            .await
    }
}
