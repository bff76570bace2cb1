//! Fake CloudPRNT server for integration tests.
//!
//! Every request is recorded; replies come from a closure so each test can
//! script the server it needs.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
};
use cloudprnt_emulator::EmulatorConfig;
use reqwest::Url;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub type Responder = Arc<dyn Fn(&Recorded) -> (StatusCode, Vec<u8>) + Send + Sync>;

#[derive(Clone)]
struct ServerState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    responder: Responder,
}

pub struct FakeServer {
    pub base: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Recorded) -> (StatusCode, Vec<u8>) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = ServerState {
            requests: requests.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base: format!("http://{}", addr),
            requests,
        }
    }

    /// Poll endpoint URL on this server.
    pub fn poll_url(&self) -> String {
        format!("{}/cloudprnt/poll", self.base)
    }

    pub fn config(&self, interval_secs: u64) -> EmulatorConfig {
        EmulatorConfig::new(&self.poll_url(), interval_secs).unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<Method> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

async fn handle(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Vec<u8>) {
    let url = Url::parse(&format!("http://fake{}", uri)).unwrap();
    let recorded = Recorded {
        method,
        path: url.path().to_string(),
        query: url.query_pairs().into_owned().collect(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
    };

    let reply = (state.responder)(&recorded);
    state.requests.lock().unwrap().push(recorded);
    reply
}

pub fn json(value: serde_json::Value) -> (StatusCode, Vec<u8>) {
    (StatusCode::OK, serde_json::to_vec(&value).unwrap())
}

pub fn status(code: StatusCode) -> (StatusCode, Vec<u8>) {
    (code, Vec::new())
}
