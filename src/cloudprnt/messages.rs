//! CloudPRNT wire messages.
//!
//! Every JSON document exchanged with the server is a typed struct here.
//! Server documents are validated when they are deserialized, and unknown
//! MQTT message titles are rejected rather than ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::{AckCode, SUPPORTED_MEDIA_TYPES};
use crate::error::CloudPrntError;
use crate::printer::config::{CLIENT_TYPE, CLIENT_VERSION};

/// `statusCode` reported while the printer is healthy.
pub const STATUS_OK: &str = "200%20OK";

// ============================================================================
// HTTP POLLING
// ============================================================================

/// Body of the status POST sent on every poll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub printing_in_progress: bool,
    pub status_code: String,
    #[serde(rename = "printerMAC")]
    pub printer_mac: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub client_action: Vec<ClientActionResult>,
}

impl StatusReport {
    /// The fixed "idle, status OK" report.
    pub fn idle(printer_mac: &str) -> Self {
        Self {
            printing_in_progress: false,
            status_code: STATUS_OK.to_string(),
            printer_mac: printer_mac.to_string(),
            status: "OK".to_string(),
            client_action: Vec::new(),
        }
    }

    /// The idle report carrying answers to the server's client actions.
    pub fn with_client_actions(printer_mac: &str, results: Vec<ClientActionResult>) -> Self {
        Self {
            client_action: results,
            ..Self::idle(printer_mac)
        }
    }
}

/// Server response to a status POST.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatus {
    pub job_ready: bool,
    #[serde(default)]
    pub job_token: Option<String>,
    #[serde(default)]
    pub media_types: Option<Vec<String>>,
    #[serde(default)]
    pub client_action: Option<Vec<ClientActionRequest>>,
}

/// A capability query from the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientActionRequest {
    pub request: String,
    #[serde(default)]
    pub options: Value,
}

/// Answer to a [`ClientActionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientActionResult {
    pub request: String,
    pub result: Value,
}

impl ClientActionRequest {
    /// Compute the emulator's canned answer, or `None` for queries it does
    /// not recognize.
    pub fn answer(&self, poll_interval: Duration) -> Option<ClientActionResult> {
        let result = match self.request.as_str() {
            "GetPollInterval" => Value::from(poll_interval.as_millis() as u64),
            "Encodings" => Value::from(SUPPORTED_MEDIA_TYPES.join("; ")),
            "ClientType" => Value::from(CLIENT_TYPE),
            "ClientVersion" => Value::from(CLIENT_VERSION),
            _ => return None,
        };
        Some(ClientActionResult {
            request: self.request.clone(),
            result,
        })
    }
}

/// Answer every recognized request, preserving request order.
pub fn answer_client_actions(
    requests: &[ClientActionRequest],
    poll_interval: Duration,
) -> Vec<ClientActionResult> {
    requests
        .iter()
        .filter_map(|req| req.answer(poll_interval))
        .collect()
}

// ============================================================================
// CAPABILITY DISCOVERY
// ============================================================================

/// Body of the server settings document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default)]
    pub server_support_protocol: Vec<String>,
    #[serde(default, rename = "settingForMQTT")]
    pub setting_for_mqtt: Option<MqttSetting>,
}

impl ServerSettings {
    pub fn supports_mqtt(&self) -> bool {
        self.server_support_protocol.iter().any(|p| p == "MQTT")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttSetting {
    #[serde(default, rename = "useTriggerPOST")]
    pub use_trigger_post: bool,
    pub mqtt_connection_setting: MqttConnectionSetting,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqttConnectionSetting {
    pub host_name: String,
    pub port_number: u16,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default)]
    pub authentication_setting: Option<AuthenticationSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSetting {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

// ============================================================================
// MQTT
// ============================================================================

/// Messages the server publishes to `<ns>/to-device/<mac>/...`.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    PrintJob(PrintJob),
}

impl ServerMessage {
    /// Decode an inbound payload, dispatching on its `title`.
    ///
    /// ## Errors
    ///
    /// [`CloudPrntError::ProtocolViolation`] for invalid JSON, a missing
    /// title, or a title other than `print-job`.
    pub fn parse(payload: &[u8]) -> Result<Self, CloudPrntError> {
        let value: Value = serde_json::from_slice(payload)?;
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| CloudPrntError::ProtocolViolation("Message has no title".to_string()))?;

        match title {
            "print-job" => Ok(Self::PrintJob(serde_json::from_value(value)?)),
            other => Err(CloudPrntError::ProtocolViolation(format!(
                "Unsupported message title '{}'",
                other
            ))),
        }
    }
}

/// A `print-job` notification in Full MQTT mode.
///
/// Every field is optional on the wire; validation happens while servicing
/// the job so that a malformed job still gets its print-result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    #[serde(default)]
    pub job_token: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub media_types: Option<Vec<String>>,
    #[serde(default)]
    pub print_data: Option<String>,
}

/// Messages the device publishes to `<ns>/to-server/<mac>/<title>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "title", rename_all = "kebab-case")]
pub enum DeviceMessage {
    #[serde(rename_all = "camelCase")]
    ClientStatus {
        #[serde(rename = "printerMAC")]
        printer_mac: String,
        status_code: String,
        printing_in_progress: bool,
    },
    #[serde(rename_all = "camelCase")]
    PrintResult {
        #[serde(rename = "printerMAC")]
        printer_mac: String,
        job_token: Option<String>,
        print_succeeded: bool,
        status_code: String,
    },
    #[serde(rename_all = "camelCase")]
    ClientWill {
        #[serde(rename = "printerMAC")]
        printer_mac: String,
        reason: String,
    },
}

impl DeviceMessage {
    pub fn client_status(printer_mac: &str, printing_in_progress: bool) -> Self {
        Self::ClientStatus {
            printer_mac: printer_mac.to_string(),
            status_code: STATUS_OK.to_string(),
            printing_in_progress,
        }
    }

    pub fn print_result(printer_mac: &str, job_token: Option<String>, code: AckCode) -> Self {
        Self::PrintResult {
            printer_mac: printer_mac.to_string(),
            job_token,
            print_succeeded: code.is_success(),
            status_code: code.status_code().to_string(),
        }
    }

    pub fn client_will(printer_mac: &str) -> Self {
        Self::ClientWill {
            printer_mac: printer_mac.to_string(),
            reason: "unintentional-disconnection".to_string(),
        }
    }

    /// Last topic segment, equal to the message title.
    pub fn topic_suffix(&self) -> &'static str {
        match self {
            Self::ClientStatus { .. } => "client-status",
            Self::PrintResult { .. } => "print-result",
            Self::ClientWill { .. } => "client-will",
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, CloudPrntError> {
        serde_json::to_vec(self)
            .map_err(|e| CloudPrntError::ProtocolViolation(format!("Failed to encode message: {}", e)))
    }
}
