//! # Capability Negotiation
//!
//! Before polling, the printer asks the server whether it can push jobs
//! over MQTT. The answer comes from a settings document that lives next to
//! the poll endpoint (see [`settings_url`](crate::transport::client::settings_url)).
//!
//! | Response | Result |
//! |----------|--------|
//! | 404 | HTTP polling |
//! | 200, no `"MQTT"` in `serverSupportProtocol` | HTTP polling |
//! | 200, MQTT with `useTriggerPOST` | fatal [`CloudPrntError::UnsupportedMode`] |
//! | 200, MQTT | MQTT with the advertised connection settings |
//! | 5xx, network error, timeout | retried (3 attempts, 5 s apart) |
//! | anything else | fatal |

use std::time::Duration;

use reqwest::StatusCode;
use tracing::{info, warn};

use crate::cloudprnt::messages::{MqttSetting, ServerSettings};
use crate::error::CloudPrntError;
use crate::transport::CloudPrntClient;

/// Where and how to reach the MQTT broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConnectionSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl From<MqttSetting> for MqttConnectionSettings {
    fn from(setting: MqttSetting) -> Self {
        let conn = setting.mqtt_connection_setting;
        let auth = conn.authentication_setting.unwrap_or_default();
        Self {
            host: conn.host_name,
            port: conn.port_number,
            use_tls: conn.use_tls,
            username: auth.username,
            password: auth.password,
        }
    }
}

/// Outcome of negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    Http,
    Mqtt(MqttConnectionSettings),
}

/// How often, and how far apart, transient failures are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Determine the transport mode, retrying transient failures.
pub async fn negotiate(
    client: &CloudPrntClient,
    policy: RetryPolicy,
) -> Result<TransportMode, CloudPrntError> {
    let mut attempt = 1;
    loop {
        match negotiate_once(client).await {
            Ok(mode) => return Ok(mode),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                warn!(
                    "Settings fetch failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt, policy.attempts, e, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn negotiate_once(client: &CloudPrntClient) -> Result<TransportMode, CloudPrntError> {
    let response = client.fetch_settings().await?;
    let status = response.status();

    match status {
        StatusCode::NOT_FOUND => {
            info!("Server has no settings endpoint, using HTTP polling");
            Ok(TransportMode::Http)
        }
        StatusCode::OK => {
            let body = response.bytes().await?;
            let settings: ServerSettings = serde_json::from_slice(&body)?;
            classify(settings)
        }
        _ => Err(CloudPrntError::HttpStatus {
            status: status.as_u16(),
            url: response.url().to_string(),
        }),
    }
}

/// Map a settings document onto a transport mode.
pub fn classify(settings: ServerSettings) -> Result<TransportMode, CloudPrntError> {
    if !settings.supports_mqtt() {
        info!(
            protocols = ?settings.server_support_protocol,
            "Server does not offer MQTT, using HTTP polling"
        );
        return Ok(TransportMode::Http);
    }

    let setting = settings.setting_for_mqtt.ok_or_else(|| {
        CloudPrntError::ProtocolViolation(
            "Server lists MQTT but sent no settingForMQTT".to_string(),
        )
    })?;
    if setting.use_trigger_post {
        return Err(CloudPrntError::UnsupportedMode(
            "Server requested MQTT Trigger POST, only Full MQTT is emulated".to_string(),
        ));
    }

    let mqtt = MqttConnectionSettings::from(setting);
    info!(host = %mqtt.host, port = mqtt.port, tls = mqtt.use_tls, "Server offers MQTT");
    Ok(TransportMode::Mqtt(mqtt))
}
