//! # Error Types
//!
//! This module defines the error type used throughout the emulator.
//!
//! Errors fall into two groups. Startup errors (bad configuration, a failed
//! capability negotiation, a server asking for Trigger POST) are fatal and
//! end the process. Everything that happens while servicing a single job is
//! caught by the transport, mapped to an [`AckCode`] and reported back to the
//! server so the loop can carry on.

use thiserror::Error;

use crate::cloudprnt::AckCode;

/// Main error type for emulator operations
#[derive(Debug, Error)]
pub enum CloudPrntError {
    /// Network failure or timeout on an HTTP call
    #[error("Transport error: {0}")]
    Transport(String),

    /// An HTTP call completed with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// MQTT connection, subscribe or publish failure
    #[error("MQTT session error: {0}")]
    MqttSession(String),

    /// Raster payload failed header validation or is truncated
    #[error("Malformed raster: {0}")]
    MalformedRaster(String),

    /// Job offered or delivered in a media type we cannot render
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Server requested a transport mode we refuse to emulate
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    /// Server sent a message we do not understand
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid startup configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudPrntError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Network errors and 5xx responses are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The acknowledgment code reported to the server when a job fails
    /// with this error.
    pub fn ack_code(&self) -> AckCode {
        match self {
            Self::UnsupportedMediaType(_) => AckCode::UnsupportedMedia,
            _ => AckCode::Failed,
        }
    }
}

impl From<reqwest::Error> for CloudPrntError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::HttpStatus {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => Self::Transport(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CloudPrntError {
    fn from(e: serde_json::Error) -> Self {
        Self::ProtocolViolation(format!("Invalid JSON: {}", e))
    }
}
