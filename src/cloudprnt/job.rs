//! Job lifecycle: media negotiation, rendering and acknowledgment.
//!
//! ## Exactly One Acknowledgment
//!
//! Both transports follow the same pattern:
//!
//! ```text
//! PendingJob::new(token)        code = 500
//!     │
//!     ├── fetch / decode / write ──► settle(Ok)   code = 200
//!     │                         └──► settle(Err)  code = 500 | 510
//!     ▼
//! into_ack()  ──► DELETE / print-result sent by the transport
//! ```
//!
//! The work never returns early past the guard: its `Result` is folded into
//! the guard, and the guard is consumed to produce the single [`Ack`]. A
//! guard dropped without being consumed logs an error.

use std::fmt;

use tracing::{error, warn};

use crate::error::CloudPrntError;
use crate::output::JobOutput;
use crate::protocol::raster;

/// Media type passed through to the output writer untouched.
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// Media types this printer accepts, in order of preference.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[raster::MEDIA_TYPE, PNG_MEDIA_TYPE];

/// # Acknowledgment Code
///
/// | Code | Meaning |
/// |------|---------|
/// | 200 | Printed |
/// | 500 | Failed |
/// | 510 | Media type not supported |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckCode {
    Printed,
    Failed,
    UnsupportedMedia,
}

impl AckCode {
    pub fn code(self) -> u16 {
        match self {
            Self::Printed => 200,
            Self::Failed => 500,
            Self::UnsupportedMedia => 510,
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Printed
    }

    /// URL-encoded status line used in MQTT print results.
    pub fn status_code(self) -> &'static str {
        match self {
            Self::Printed => "200%20OK",
            Self::Failed => "500%20Print%20Failed",
            Self::UnsupportedMedia => "510%20Unsupported%20Media%20Type",
        }
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Pick the media type to request from the server's offer.
///
/// The first offered type we support wins. With no offer, the raster type
/// is requested.
///
/// ```
/// use cloudprnt_emulator::cloudprnt::job::select_media_type;
///
/// let offered = vec!["text/plain".to_string(), "image/png".to_string()];
/// assert_eq!(select_media_type(Some(&offered[..])).unwrap(), "image/png");
/// assert_eq!(select_media_type(None).unwrap(), "application/vnd.star.raster");
/// ```
pub fn select_media_type(offered: Option<&[String]>) -> Result<&'static str, CloudPrntError> {
    let Some(offered) = offered else {
        return Ok(raster::MEDIA_TYPE);
    };
    offered
        .iter()
        .find_map(|mt| {
            SUPPORTED_MEDIA_TYPES
                .iter()
                .copied()
                .find(|supported| mt.eq_ignore_ascii_case(supported))
        })
        .ok_or_else(|| CloudPrntError::UnsupportedMediaType(offered.join(", ")))
}

/// A fetched job payload.
#[derive(Debug, Clone)]
pub struct Job {
    pub token: Option<String>,
    pub media_type: String,
    pub payload: Vec<u8>,
}

impl Job {
    /// Turn the payload into something the output writer can store.
    ///
    /// Raster payloads are decoded (and rotated when asked); PNG payloads
    /// pass through unchanged.
    pub fn render(self, rotate: bool) -> Result<JobOutput, CloudPrntError> {
        if self.media_type.eq_ignore_ascii_case(raster::MEDIA_TYPE) {
            let image = raster::decode(&self.payload)?;
            let image = if rotate { image.rotate180() } else { image };
            Ok(JobOutput::Image(image))
        } else if self.media_type.eq_ignore_ascii_case(PNG_MEDIA_TYPE) {
            Ok(JobOutput::Passthrough {
                media_type: self.media_type,
                bytes: self.payload,
            })
        } else {
            Err(CloudPrntError::UnsupportedMediaType(self.media_type))
        }
    }
}

/// The release record of a [`PendingJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub token: Option<String>,
    pub code: AckCode,
}

/// A job that has been announced and must be acknowledged exactly once.
#[must_use = "a pending job must be turned into an Ack and sent"]
#[derive(Debug)]
pub struct PendingJob {
    token: Option<String>,
    code: AckCode,
    released: bool,
}

impl PendingJob {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            code: AckCode::Failed,
            released: false,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn code(&self) -> AckCode {
        self.code
    }

    /// Record how the work ended.
    pub fn settle(&mut self, outcome: Result<(), CloudPrntError>) {
        self.code = match outcome {
            Ok(()) => AckCode::Printed,
            Err(e) => {
                warn!(token = ?self.token, "Job failed: {}", e);
                e.ack_code()
            }
        };
    }

    /// Consume the guard, yielding the acknowledgment to send.
    pub fn into_ack(mut self) -> Ack {
        self.released = true;
        Ack {
            token: self.token.take(),
            code: self.code,
        }
    }
}

impl Drop for PendingJob {
    fn drop(&mut self) {
        if !self.released {
            error!(token = ?self.token, "Job dropped without acknowledgment");
        }
    }
}
