//! # CloudPRNT Transport Layer
//!
//! How the emulated printer talks to the print server.
//!
//! ## Available Transports
//!
//! - [`http`]: HTTP polling (status POST, job GET, acknowledgment DELETE)
//! - [`mqtt`]: Full MQTT push (jobs delivered on a subscribed topic)
//!
//! Both share the [`client`] for HTTP calls: the polling transport for
//! everything, the MQTT path only for capability negotiation.

pub mod client;
pub mod http;
pub mod mqtt;

pub use client::CloudPrntClient;
pub use http::{HttpPoller, JobNotice, PollOutcome};
pub use mqtt::{MqttJobHandler, MqttTransport, Topics};
