//! Recording doubles shared by the unit tests.

use anyhow::Result;
use ota_shared::twin::PropertyReport;
use std::sync::Mutex;

use crate::device_info::DeviceInfoClient;
use crate::reports::ReportSink;

/// Captures submitted reports synchronously so tests can assert on exact
/// report sequences without racing a delivery task.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<PropertyReport>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<PropertyReport> {
        self.reports.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.reports.lock().unwrap().clear();
    }
}

impl ReportSink for RecordingSink {
    fn submit(&self, report: PropertyReport) -> Result<()> {
        self.reports.lock().unwrap().push(report);
        Ok(())
    }
}

/// Captures version notifications from successful Apply transitions.
#[derive(Default)]
pub struct RecordingDeviceInfo {
    versions: Mutex<Vec<String>>,
}

impl RecordingDeviceInfo {
    pub fn versions(&self) -> Vec<String> {
        self.versions.lock().unwrap().clone()
    }
}

impl DeviceInfoClient for RecordingDeviceInfo {
    fn notify_version_applied(&self, version: &str) {
        self.versions.lock().unwrap().push(version.to_owned());
    }
}
