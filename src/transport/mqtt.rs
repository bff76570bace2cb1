//! # MQTT Push Transport
//!
//! CloudPRNT "Full MQTT": the server pushes complete jobs, base64-encoded,
//! to a device-addressed topic and the printer answers with a print result.
//!
//! ## Topics
//!
//! | Direction | Topic |
//! |-----------|-------|
//! | subscribe | `<ns>/to-device/<mac>/#` |
//! | publish | `<ns>/to-server/<mac>/client-status` |
//! | publish | `<ns>/to-server/<mac>/print-result` |
//! | last will | `<ns>/to-server/<mac>/client-will` |
//!
//! ## Event Flow
//!
//! ```text
//! rumqttc EventLoop ──► pump task ──► channel ──► processing loop ──► MqttLink
//!                   (ConnAck, Publish, errors)   (one message at a time)
//! ```
//!
//! The pump task only forwards events. The processing loop handles them in
//! arrival order and finishes a job's print-result and status publishes
//! before it reads the next event. A connection error or a refused
//! subscription ends the session with
//! [`CloudPrntError::MqttSession`]; reconnecting is not this module's job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Packet, QoS,
    SubscribeReasonCode, Transport,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cloudprnt::messages::PrintJob;
use crate::cloudprnt::{AckCode, DeviceMessage, Job, PendingJob, ServerMessage};
use crate::error::CloudPrntError;
use crate::negotiate::MqttConnectionSettings;
use crate::output::{self, JobSink};
use crate::printer::PrinterIdentity;
use crate::protocol::raster;

/// Capacity of the rumqttc request channel.
const REQUEST_CAPACITY: usize = 16;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Topic names for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub subscription: String,
    to_server: String,
}

impl Topics {
    pub fn new(namespace: &str, identity: &PrinterIdentity) -> Self {
        let namespace = namespace.trim_end_matches('/');
        Self {
            subscription: format!("{}/to-device/{}/#", namespace, identity),
            to_server: format!("{}/to-server/{}", namespace, identity),
        }
    }

    /// Topic a device message is published to.
    pub fn for_message(&self, message: &DeviceMessage) -> String {
        format!("{}/{}", self.to_server, message.topic_suffix())
    }
}

/// The operations the processing loop needs from an MQTT client.
#[async_trait]
pub trait MqttLink: Send + Sync {
    async fn subscribe_to(&self, filter: &str) -> Result<(), CloudPrntError>;
    async fn publish_to(&self, topic: &str, payload: Vec<u8>) -> Result<(), CloudPrntError>;
}

#[async_trait]
impl MqttLink for AsyncClient {
    async fn subscribe_to(&self, filter: &str) -> Result<(), CloudPrntError> {
        self.subscribe(filter, QoS::AtLeastOnce)
            .await
            .map_err(|e| CloudPrntError::MqttSession(format!("Subscribe failed: {}", e)))
    }

    async fn publish_to(&self, topic: &str, payload: Vec<u8>) -> Result<(), CloudPrntError> {
        self.publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| CloudPrntError::MqttSession(format!("Publish failed: {}", e)))
    }
}

/// What the pump task forwards to the processing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Message { topic: String, payload: Vec<u8> },
    Disconnected(String),
}

// ============================================================================
// JOB HANDLING
// ============================================================================

/// Turns inbound messages into printed jobs and result messages.
pub struct MqttJobHandler {
    identity: PrinterIdentity,
    topics: Topics,
    rotate: bool,
    sink: Arc<dyn JobSink>,
}

impl MqttJobHandler {
    pub fn new(
        identity: PrinterIdentity,
        topics: Topics,
        rotate: bool,
        sink: Arc<dyn JobSink>,
    ) -> Self {
        Self {
            identity,
            topics,
            rotate,
            sink,
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    async fn send(&self, link: &dyn MqttLink, message: &DeviceMessage) -> Result<(), CloudPrntError> {
        let topic = self.topics.for_message(message);
        debug!(%topic, ?message, "Publishing");
        link.publish_to(&topic, message.to_json()?).await
    }

    /// Subscribe and report idle. Runs on every (re)connect.
    pub async fn on_connected(&self, link: &dyn MqttLink) -> Result<(), CloudPrntError> {
        link.subscribe_to(&self.topics.subscription).await?;
        self.send(
            link,
            &DeviceMessage::client_status(self.identity.as_str(), false),
        )
        .await?;
        info!(topic = %self.topics.subscription, "Subscribed, waiting for jobs");
        Ok(())
    }

    /// Handle one inbound payload.
    ///
    /// Messages that fail validation are logged and dropped; only a failure
    /// to publish is returned, since it means the session is gone.
    pub async fn on_message(&self, link: &dyn MqttLink, payload: &[u8]) -> Result<(), CloudPrntError> {
        match ServerMessage::parse(payload) {
            Ok(ServerMessage::PrintJob(job)) => self.on_print_job(link, job).await.map(|_| ()),
            Err(e) => {
                warn!("Ignoring message: {}", e);
                Ok(())
            }
        }
    }

    /// Print a job, then publish exactly one print-result and one idle
    /// status, whatever happened in between.
    pub async fn on_print_job(
        &self,
        link: &dyn MqttLink,
        job: PrintJob,
    ) -> Result<AckCode, CloudPrntError> {
        let mac = self.identity.as_str();
        info!(token = ?job.job_token, job_type = ?job.job_type, "Print job received");

        let mut pending = PendingJob::new(job.job_token.clone());
        let outcome = match self
            .send(link, &DeviceMessage::client_status(mac, true))
            .await
        {
            Ok(()) => self.print(job).await,
            Err(e) => Err(e),
        };
        pending.settle(outcome);

        let ack = pending.into_ack();
        let result = self
            .send(link, &DeviceMessage::print_result(mac, ack.token, ack.code))
            .await;
        let status = self
            .send(link, &DeviceMessage::client_status(mac, false))
            .await;
        result.and(status)?;

        info!(code = %ack.code, "Job finished");
        Ok(ack.code)
    }

    async fn print(&self, job: PrintJob) -> Result<(), CloudPrntError> {
        if job.job_type.as_deref() != Some("raw") {
            return Err(CloudPrntError::ProtocolViolation(format!(
                "Unsupported job type {:?}",
                job.job_type
            )));
        }
        match job.media_types.as_deref() {
            Some([only]) if only == raster::MEDIA_TYPE => {}
            other => {
                return Err(CloudPrntError::UnsupportedMediaType(format!("{:?}", other)));
            }
        }

        let data = job.print_data.ok_or_else(|| {
            CloudPrntError::ProtocolViolation("print-job has no printData".to_string())
        })?;
        let payload = BASE64_STANDARD
            .decode(data.trim())
            .map_err(|e| CloudPrntError::ProtocolViolation(format!("Invalid printData: {}", e)))?;

        let rendered = Job {
            token: job.job_token,
            media_type: raster::MEDIA_TYPE.to_string(),
            payload,
        }
        .render(self.rotate)?;

        output::write_blocking(self.sink.clone(), rendered).await
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Consume session events until the connection fails.
///
/// Never returns `Ok`: the loop only ends on a disconnect, a closed event
/// channel or a failed publish, all reported as [`CloudPrntError::MqttSession`].
pub async fn process_events(
    handler: &MqttJobHandler,
    link: &dyn MqttLink,
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<(), CloudPrntError> {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Connected => handler.on_connected(link).await?,
            SessionEvent::Message { topic, payload } => {
                debug!(%topic, len = payload.len(), "Message received");
                handler.on_message(link, &payload).await?;
            }
            SessionEvent::Disconnected(reason) => {
                return Err(CloudPrntError::MqttSession(reason));
            }
        }
    }
    Err(CloudPrntError::MqttSession(
        "Event loop stopped".to_string(),
    ))
}

/// Map an incoming packet onto a session event. Packets the processing
/// loop does not care about map to `None`.
fn incoming_event(packet: Packet) -> Option<SessionEvent> {
    match packet {
        Packet::ConnAck(ack) if ack.code == ConnectReturnCode::Success => Some(SessionEvent::Connected),
        Packet::ConnAck(ack) => Some(SessionEvent::Disconnected(format!(
            "Connection refused: {:?}",
            ack.code
        ))),
        // A refused subscription arrives as a SUBACK failure code
        Packet::SubAck(ack)
            if ack
                .return_codes
                .iter()
                .any(|code| matches!(code, SubscribeReasonCode::Failure)) =>
        {
            Some(SessionEvent::Disconnected("Subscription refused".to_string()))
        }
        Packet::Publish(publish) => Some(SessionEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        _ => None,
    }
}

/// Poll the rumqttc event loop and forward what matters.
async fn pump_events(mut eventloop: EventLoop, events: mpsc::UnboundedSender<SessionEvent>) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(packet)) => match incoming_event(packet) {
                Some(event) => event,
                None => continue,
            },
            Ok(Event::Outgoing(_)) => continue,
            Err(e) => SessionEvent::Disconnected(e.to_string()),
        };

        let disconnected = matches!(event, SessionEvent::Disconnected(_));
        if events.send(event).is_err() || disconnected {
            break;
        }
    }
}

/// One MQTT session against the broker the server advertised.
pub struct MqttTransport {
    settings: MqttConnectionSettings,
    identity: PrinterIdentity,
    handler: MqttJobHandler,
}

impl MqttTransport {
    pub fn new(
        settings: MqttConnectionSettings,
        identity: PrinterIdentity,
        handler: MqttJobHandler,
    ) -> Self {
        Self {
            settings,
            identity,
            handler,
        }
    }

    /// Client options: MQTT 3.1.1, persistent session keyed by the MAC,
    /// last will announcing an unintentional disconnect.
    pub fn options(&self) -> Result<MqttOptions, CloudPrntError> {
        let mut options =
            MqttOptions::new(self.identity.as_str(), &self.settings.host, self.settings.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(false);

        let will = DeviceMessage::client_will(self.identity.as_str());
        options.set_last_will(LastWill::new(
            self.handler.topics().for_message(&will),
            will.to_json()?,
            QoS::AtLeastOnce,
            false,
        ));

        if let Some(username) = &self.settings.username {
            options.set_credentials(
                username.clone(),
                self.settings.password.clone().unwrap_or_default(),
            );
        }
        if self.settings.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        Ok(options)
    }

    /// Run until the session fails.
    pub async fn run(self) -> Result<(), CloudPrntError> {
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            tls = self.settings.use_tls,
            "Connecting to MQTT broker"
        );

        let (client, eventloop) = AsyncClient::new(self.options()?, REQUEST_CAPACITY);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump_events(eventloop, tx));

        let result = process_events(&self.handler, &client, &mut rx).await;
        pump.abort();
        result
    }
}
