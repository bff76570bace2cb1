//! # Session Orchestrator
//!
//! Top-level control for one emulated printer. Negotiation runs once, then
//! the session walks an explicit state machine until the process is killed:
//!
//! ```text
//!                negotiated MQTT              MqttEnded
//!   start ──────────────────────► MqttConnected ─────────► FallbackPending
//!     │                                                         │
//!     │ negotiated HTTP                              FallbackArmed
//!     ▼                                                         │
//!   Polling ◄───────────────────────────────────────────────────┘
//!    │  ▲ ▲
//!    │  │ └── Polled(idle) / PollFailed (sleep one interval)
//!    │  └──── JobFinished (sleep one interval)
//!    ▼
//!   Servicing
//! ```
//!
//! Transitions are pure ([`SessionState::next`]); the I/O for each state is
//! done by [`Session`]. Nothing leads back to `MqttConnected`, so a failed
//! MQTT session means HTTP polling for the rest of the run.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::CloudPrntError;
use crate::negotiate::{self, MqttConnectionSettings, RetryPolicy, TransportMode};
use crate::output::{FileSink, JobSink};
use crate::printer::EmulatorConfig;
use crate::transport::mqtt::{MqttJobHandler, MqttTransport, Topics};
use crate::transport::{CloudPrntClient, HttpPoller, JobNotice, PollOutcome};

/// Where the session currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    MqttConnected(MqttConnectionSettings),
    FallbackPending,
    Polling,
    Servicing(JobNotice),
}

/// What happened while in a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    MqttEnded,
    FallbackArmed,
    Polled(PollOutcome),
    PollFailed,
    JobFinished,
}

impl SessionState {
    /// State after negotiation.
    pub fn initial(mode: TransportMode) -> Self {
        match mode {
            TransportMode::Mqtt(settings) => Self::MqttConnected(settings),
            TransportMode::Http => Self::Polling,
        }
    }

    /// Apply a step. Steps that do not belong to the current state leave
    /// it unchanged.
    pub fn next(self, step: Step) -> Self {
        match (self, step) {
            (Self::MqttConnected(_), Step::MqttEnded) => Self::FallbackPending,
            (Self::FallbackPending, Step::FallbackArmed) => Self::Polling,
            (Self::Polling, Step::Polled(PollOutcome::JobReady(notice))) => Self::Servicing(notice),
            (Self::Polling, Step::Polled(PollOutcome::Idle) | Step::PollFailed) => Self::Polling,
            (Self::Servicing(_), Step::JobFinished) => Self::Polling,
            (state, _) => state,
        }
    }
}

pub struct Session {
    config: EmulatorConfig,
    client: Arc<CloudPrntClient>,
    sink: Arc<dyn JobSink>,
    retry: RetryPolicy,
}

impl Session {
    /// A session writing jobs into the configured output directory.
    pub fn new(config: EmulatorConfig) -> Result<Self, CloudPrntError> {
        let sink = Arc::new(FileSink::new(config.output_dir.clone()));
        Self::with_sink(config, sink)
    }

    pub fn with_sink(config: EmulatorConfig, sink: Arc<dyn JobSink>) -> Result<Self, CloudPrntError> {
        let client = Arc::new(CloudPrntClient::new(&config)?);
        Ok(Self {
            config,
            client,
            sink,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run capability negotiation.
    pub async fn negotiate(&self) -> Result<TransportMode, CloudPrntError> {
        negotiate::negotiate(&self.client, self.retry).await
    }

    pub fn poller(&self) -> HttpPoller {
        HttpPoller::new(
            self.client.clone(),
            self.config.poll_interval,
            self.config.rotate,
            self.sink.clone(),
        )
    }

    fn mqtt_transport(&self, settings: MqttConnectionSettings) -> MqttTransport {
        let identity = self.config.identity.clone();
        let handler = MqttJobHandler::new(
            identity.clone(),
            Topics::new(&self.config.topic_namespace, &identity),
            self.config.rotate,
            self.sink.clone(),
        );
        MqttTransport::new(settings, identity, handler)
    }

    /// Negotiate, then run forever. Only negotiation errors are returned.
    pub async fn run(self) -> Result<(), CloudPrntError> {
        info!(
            url = %self.config.poll_url,
            mac = %self.config.identity,
            interval = ?self.config.poll_interval,
            "Starting CloudPRNT session"
        );

        let mode = self.negotiate().await?;
        let poller = self.poller();
        let mut state = SessionState::initial(mode);

        loop {
            let step = self.advance(&state, &poller).await;
            state = state.next(step);
        }
    }

    /// Do the work of one state and report what happened.
    async fn advance(&self, state: &SessionState, poller: &HttpPoller) -> Step {
        match state {
            SessionState::MqttConnected(settings) => {
                match self.mqtt_transport(settings.clone()).run().await {
                    Ok(()) => warn!("MQTT session ended"),
                    Err(e) => warn!("MQTT session failed: {}", e),
                }
                Step::MqttEnded
            }
            SessionState::FallbackPending => {
                info!("Falling back to HTTP polling for the rest of the run");
                Step::FallbackArmed
            }
            SessionState::Polling => match poller.poll().await {
                Ok(PollOutcome::JobReady(notice)) => Step::Polled(PollOutcome::JobReady(notice)),
                Ok(PollOutcome::Idle) => {
                    tokio::time::sleep(poller.poll_interval()).await;
                    Step::Polled(PollOutcome::Idle)
                }
                Err(e) => {
                    warn!("Poll failed: {}", e);
                    tokio::time::sleep(poller.poll_interval()).await;
                    Step::PollFailed
                }
            },
            SessionState::Servicing(notice) => {
                if let Err(e) = poller.service(notice.clone()).await {
                    warn!("Job cycle failed: {}", e);
                }
                tokio::time::sleep(poller.poll_interval()).await;
                Step::JobFinished
            }
        }
    }
}
