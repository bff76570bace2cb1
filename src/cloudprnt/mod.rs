//! # CloudPRNT Protocol
//!
//! Star Micronics' cloud printing protocol. A server holds jobs for a
//! printer; the printer either polls for them over HTTP or receives them
//! pushed over MQTT, and reports how each job ended.
//!
//! ## Module Structure
//!
//! - [`messages`]: JSON documents exchanged with the server
//! - [`job`]: Media negotiation, rendering and the acknowledgment guard

pub mod job;
pub mod messages;

pub use job::{Ack, AckCode, Job, PendingJob};
pub use messages::{DeviceMessage, PollStatus, ServerMessage, StatusReport};
