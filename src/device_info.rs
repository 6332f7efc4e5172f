//! Device-info collaborator
//!
//! A separate component owns the device's reported software version. The
//! orchestrator only notifies it once, after a successful Apply.

use tracing::info;

/// Receives the applied version string exactly once per completed update.
pub trait DeviceInfoClient: Send + Sync {
    fn notify_version_applied(&self, version: &str);
}

/// Default collaborator: records the handoff in the log.
pub struct LoggingDeviceInfo;

impl DeviceInfoClient for LoggingDeviceInfo {
    fn notify_version_applied(&self, version: &str) {
        info!(version, "device info notified of applied version");
    }
}
