//! # CloudPRNT Emulator
//!
//! Emulates a Star CloudPRNT receipt printer. The emulator talks to a
//! CloudPRNT server the way a real printer does and writes every job it
//! receives to disk instead of paper.
//!
//! - **Negotiation**: asks the server whether it offers MQTT push
//! - **HTTP polling**: status POST, job GET, acknowledgment DELETE
//! - **MQTT push**: jobs delivered as JSON messages on a subscribed topic
//! - **Star raster**: decodes `application/vnd.star.raster` into PNG
//!
//! ## Quick Start
//!
//! ```no_run
//! use cloudprnt_emulator::{EmulatorConfig, session::Session};
//!
//! # async fn run() -> Result<(), cloudprnt_emulator::CloudPrntError> {
//! let mut config = EmulatorConfig::new("http://localhost:8080/cloudprnt", 5)?;
//! config.output_dir = "jobs".into();
//!
//! Session::new(config)?.run().await
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Star raster decoding |
//! | [`cloudprnt`] | Wire messages and job handling |
//! | [`negotiate`] | Transport selection |
//! | [`transport`] | HTTP polling and MQTT push |
//! | [`session`] | Orchestration state machine |
//! | [`output`] | Writing jobs to disk |
//! | [`printer`] | Emulator configuration |
//! | [`error`] | Error types |

pub mod cloudprnt;
pub mod error;
pub mod negotiate;
pub mod output;
pub mod printer;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::CloudPrntError;
pub use printer::EmulatorConfig;
