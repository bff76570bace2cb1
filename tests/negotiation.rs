//! Capability negotiation against a fake server.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::http::{Method, StatusCode};
use cloudprnt_emulator::CloudPrntError;
use cloudprnt_emulator::negotiate::{self, MqttConnectionSettings, RetryPolicy, TransportMode};
use cloudprnt_emulator::transport::CloudPrntClient;
use common::{FakeServer, json, status};
use pretty_assertions::assert_eq;
use serde_json::json as j;

const FAST_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    delay: Duration::from_millis(10),
};

async fn negotiate_with(server: &FakeServer) -> Result<TransportMode, CloudPrntError> {
    let client = CloudPrntClient::new(&server.config(5)).unwrap();
    negotiate::negotiate(&client, FAST_RETRY).await
}

#[tokio::test]
async fn test_missing_settings_means_http() {
    let server = FakeServer::start(|_| status(StatusCode::NOT_FOUND)).await;

    assert_eq!(negotiate_with(&server).await.unwrap(), TransportMode::Http);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].path, "/cloudprnt/cloudprnt-setting.json");
    assert_eq!(requests[0].query["mac"], "00:11:62:00:00:01");
    assert_eq!(requests[0].query["replaced_path"], "poll");
}

#[tokio::test]
async fn test_http_only_server() {
    let server = FakeServer::start(|_| json(j!({ "serverSupportProtocol": ["HTTP"] }))).await;

    assert_eq!(negotiate_with(&server).await.unwrap(), TransportMode::Http);
}

#[tokio::test]
async fn test_full_mqtt_offer() {
    let server = FakeServer::start(|_| {
        json(j!({
            "serverSupportProtocol": ["HTTP", "MQTT"],
            "settingForMQTT": {
                "useTriggerPOST": false,
                "mqttConnectionSetting": {
                    "hostName": "broker.local",
                    "portNumber": 8883,
                    "useTls": true,
                    "authenticationSetting": { "username": "dev", "password": "pw" }
                }
            }
        }))
    })
    .await;

    assert_eq!(
        negotiate_with(&server).await.unwrap(),
        TransportMode::Mqtt(MqttConnectionSettings {
            host: "broker.local".to_string(),
            port: 8883,
            use_tls: true,
            username: Some("dev".to_string()),
            password: Some("pw".to_string()),
        })
    );
}

#[tokio::test]
async fn test_trigger_post_is_fatal() {
    let server = FakeServer::start(|_| {
        json(j!({
            "serverSupportProtocol": ["MQTT"],
            "settingForMQTT": {
                "useTriggerPOST": true,
                "mqttConnectionSetting": { "hostName": "broker", "portNumber": 1883, "useTls": false }
            }
        }))
    })
    .await;

    assert!(matches!(
        negotiate_with(&server).await,
        Err(CloudPrntError::UnsupportedMode(_))
    ));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_server_errors_are_retried_then_fatal() {
    let server = FakeServer::start(|_| status(StatusCode::SERVICE_UNAVAILABLE)).await;

    assert!(matches!(
        negotiate_with(&server).await,
        Err(CloudPrntError::HttpStatus { status: 503, .. })
    ));
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_recovers_after_transient_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let server = FakeServer::start(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            status(StatusCode::BAD_GATEWAY)
        } else {
            status(StatusCode::NOT_FOUND)
        }
    })
    .await;

    assert_eq!(negotiate_with(&server).await.unwrap(), TransportMode::Http);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = FakeServer::start(|_| status(StatusCode::FORBIDDEN)).await;

    assert!(matches!(
        negotiate_with(&server).await,
        Err(CloudPrntError::HttpStatus { status: 403, .. })
    ));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_malformed_settings_document() {
    let server = FakeServer::start(|_| (StatusCode::OK, b"{not json".to_vec())).await;

    assert!(matches!(
        negotiate_with(&server).await,
        Err(CloudPrntError::ProtocolViolation(_))
    ));
}

#[tokio::test]
async fn test_network_errors_are_retried_then_fatal() {
    // Accepts every connection and hangs up before answering
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let config =
        cloudprnt_emulator::EmulatorConfig::new(&format!("http://{}/cloudprnt/poll", addr), 5)
            .unwrap();
    let client = CloudPrntClient::new(&config).unwrap();

    assert!(matches!(
        negotiate::negotiate(&client, FAST_RETRY).await,
        Err(CloudPrntError::Transport(_))
    ));
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}
