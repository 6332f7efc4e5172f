//! Twin property sync wire types
//!
//! Shapes exchanged with the twin transport: cloud-pushed desired documents,
//! device-reported documents, and the per-field acknowledgement the cloud
//! uses to correlate a response with the desired version that triggered it.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codes;

/// Registration status delivered by the transport for the twin interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    /// Interface registered; reporting is now allowed.
    Ok,
    /// Interface is being torn down; no further transport calls permitted.
    InterfaceUnregistering,
    /// Registration failed with a transport error code.
    Error(i32),
}

/// A desired-property push from the cloud: an opaque JSON body plus the
/// monotonically increasing version number identifying this write.
#[derive(Debug, Clone)]
pub struct PropertyUpdate {
    pub property_name: String,
    pub desired_json: Bytes,
    pub desired_version: i64,
}

impl PropertyUpdate {
    pub fn new(property_name: impl Into<String>, body: &Value, desired_version: i64) -> Self {
        Self {
            property_name: property_name.into(),
            desired_json: Bytes::from(body.to_string()),
            desired_version,
        }
    }
}

/// Acknowledgement attached to a per-field report so the cloud can match
/// success/failure with the specific desired version that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAck {
    pub status_code: u16,
    pub description: String,
    pub responds_to_desired_version: i64,
}

impl PropertyAck {
    /// The field was stored and processed successfully.
    pub fn updated(responds_to_desired_version: i64) -> Self {
        Self {
            status_code: codes::ACK_UPDATED,
            description: "Property updated successfully".into(),
            responds_to_desired_version,
        }
    }

    /// The field was rejected or processing it failed.
    pub fn failed(
        responds_to_desired_version: i64,
        status_code: u16,
        description: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            description: description.into(),
            responds_to_desired_version,
        }
    }
}

/// One device-to-cloud report call: a JSON body published under a top-level
/// property name, optionally carrying an acknowledgement.
#[derive(Debug, Clone)]
pub struct PropertyReport {
    pub property: &'static str,
    pub body: Value,
    pub ack: Option<PropertyAck>,
}

impl PropertyReport {
    /// A report on the read-only `Client` property (no acknowledgement).
    pub fn client(body: Value) -> Self {
        Self {
            property: crate::CLIENT_PROPERTY,
            body,
            ack: None,
        }
    }

    /// A per-field response on the writable `Orchestrator` property.
    pub fn orchestrator(body: Value, ack: PropertyAck) -> Self {
        Self {
            property: crate::ORCHESTRATOR_PROPERTY,
            body,
            ack: Some(ack),
        }
    }

    /// The reported field name, used as context in completion logs.
    pub fn field_name(&self) -> &str {
        self.body
            .as_object()
            .and_then(|o| o.keys().next())
            .map(String::as_str)
            .unwrap_or(self.property)
    }
}

/// The parsed desired body of the `Orchestrator` property. All fields are
/// optional: presence, not ordering, determines which handlers run.
///
/// `Action` stays a raw JSON number here so that out-of-range values can be
/// rejected with a 505 acknowledgement instead of a parse failure that would
/// silently skip the other fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesiredOrchestrator {
    #[serde(rename = "TargetVersion")]
    pub target_version: Option<String>,
    #[serde(rename = "Files")]
    pub files: Option<Value>,
    #[serde(rename = "Action", alias = "UpdateAction")]
    pub action: Option<serde_json::Number>,
}
